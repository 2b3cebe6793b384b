use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

const CPU_TARGET: &str = "thumbv7em-none-eabihf";

pub fn run(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!("{}", format!("Building CPU firmware ({mode} mode)...").cyan().bold());
    println!();

    let build_start = Instant::now();
    let mut build_cmd = Command::new("cargo");
    build_cmd
        .arg("build")
        .arg("-p")
        .arg("ft-cpu-firmware")
        .arg("--target")
        .arg(CPU_TARGET)
        .arg("--features")
        .arg("hardware");

    if release {
        build_cmd.arg("--release");
    }

    let build_output = build_cmd.output().context("failed to run cargo build")?;

    if !build_output.status.success() {
        eprintln!("{}", "Build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&build_output.stderr));
        anyhow::bail!("build failed");
    }

    println!(
        "{}",
        format!("Build successful in {:.2}s", build_start.elapsed().as_secs_f64()).green()
    );
    println!();

    show_binary_size(release)?;
    println!();

    // TODO(hardware bring-up): the CPU board's exact chip has not been
    // pinned down yet — no `embassy-stm32` (or equivalent) HAL dependency
    // is wired into `ft-cpu-firmware` until it is. Set `FT_PROBE_CHIP` to
    // the probe-rs chip name once that decision lands.
    let chip = std::env::var("FT_PROBE_CHIP")
        .context("set FT_PROBE_CHIP to the probe-rs chip name for this board before flashing")?;

    println!("{}", format!("Flashing to {chip}...").cyan().bold());
    println!("   {}", "Connecting to probe...".dimmed());

    let flash_start = Instant::now();
    let binary_path = format!("target/{CPU_TARGET}/{mode}/ft-cpu-firmware");
    let flash_output = Command::new("probe-rs")
        .arg("run")
        .arg(&binary_path)
        .arg("--chip")
        .arg(&chip)
        .arg("--probe-index")
        .arg("0")
        .output()
        .context("failed to run probe-rs — is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !flash_output.status.success() {
        eprintln!("{}", "Flash failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&flash_output.stderr));
        anyhow::bail!("flash failed — check that the probe is connected and the device is powered");
    }

    println!(
        "{}",
        format!("Flash successful in {:.2}s", flash_start.elapsed().as_secs_f64()).green()
    );
    println!();
    println!("   {}", format!("Use 'probe-rs attach --chip {chip}' to view RTT logs").dimmed());
    println!();

    Ok(())
}

fn show_binary_size(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };
    let binary_path = format!("target/{CPU_TARGET}/{mode}/ft-cpu-firmware");

    let output = Command::new("rust-size").arg(&binary_path).arg("-A").output();

    match output {
        Ok(out) if out.status.success() => {
            println!("{}", "Binary size:".cyan());
            for line in String::from_utf8_lossy(&out.stdout).lines() {
                println!("   {}", line.dimmed());
            }
        }
        _ => {
            let output = Command::new("cargo")
                .args(["size", "--", "-A", "--bin", "ft-cpu-firmware", "--target", CPU_TARGET])
                .output();
            if let Ok(out) = output {
                if out.status.success() {
                    println!("{}", "Binary size:".cyan());
                    for line in String::from_utf8_lossy(&out.stdout).lines().skip(1) {
                        println!("   {}", line.dimmed());
                    }
                }
            }
        }
    }

    Ok(())
}
