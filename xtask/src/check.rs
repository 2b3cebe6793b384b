use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Embedded target the CPU-side Cortex-M firmware builds for.
const CPU_TARGET: &str = "thumbv7em-none-eabihf";

/// `no_std` library crates checked against `CPU_TARGET` in addition to the
/// host target every `cargo check --workspace` pass already covers. This is
/// the same belt-and-braces check the reference tooling ran: a crate can
/// accidentally depend on `std` and still pass on the host target, because
/// the host target has `std` available to paper over the mistake.
const NO_STD_LIB_CRATES: &[&str] = &[
    "ft-ringbuf",
    "ft-device-io",
    "ft-protocol",
    "ft-panel-protocol",
    "ft-events",
    "ft-tick",
    "ft-kernel",
    "ft-dsp-boot",
    "ft-module-abi",
    "ft-audio-block",
];

pub fn run() -> Result<()> {
    println!();
    println!("{}", "Checking all crates...".cyan().bold());
    println!();

    let total_start = Instant::now();

    println!("{}", "  Checking host targets (workspace)...".cyan());
    let host_start = Instant::now();
    run_checked(
        Command::new("cargo").args(["check", "--workspace", "--all-targets"]),
        "host check failed",
    )?;
    println!(
        "{}",
        format!("  Host check passed in {:.2}s", host_start.elapsed().as_secs_f64()).green()
    );
    println!();

    for crate_name in NO_STD_LIB_CRATES {
        println!("{}", format!("  Checking {crate_name} on {CPU_TARGET} (no_std)...").cyan());
        let start = Instant::now();
        run_checked(
            Command::new("cargo").args([
                "check",
                "-p",
                crate_name,
                "--lib",
                "--target",
                CPU_TARGET,
                "--no-default-features",
            ]),
            &format!("{crate_name} no_std check failed"),
        )?;
        println!(
            "{}",
            format!("  {crate_name} passed in {:.2}s", start.elapsed().as_secs_f64()).green()
        );
        println!();
    }

    println!("{}", format!("  Checking ft-cpu-firmware on {CPU_TARGET} (hardware)...").cyan());
    let cpu_fw_start = Instant::now();
    run_checked(
        Command::new("cargo").args([
            "check",
            "-p",
            "ft-cpu-firmware",
            "--target",
            CPU_TARGET,
            "--features",
            "hardware",
        ]),
        "ft-cpu-firmware hardware check failed",
    )?;
    println!(
        "{}",
        format!("  ft-cpu-firmware passed in {:.2}s", cpu_fw_start.elapsed().as_secs_f64()).green()
    );
    println!();

    println!("{}", "  Checking ft-dsp-firmware library (host, no_std)...".cyan());
    let dsp_fw_start = Instant::now();
    run_checked(
        Command::new("cargo").args(["check", "-p", "ft-dsp-firmware", "--lib"]),
        "ft-dsp-firmware library check failed",
    )?;
    println!(
        "{}",
        format!("  ft-dsp-firmware passed in {:.2}s", dsp_fw_start.elapsed().as_secs_f64()).green()
    );
    println!(
        "   {}",
        "Note: the DSP binary (`--features hardware`) targets a Blackfin core,\
         which has no upstream LLVM backend — cross-check that target manually\
         with the vendor toolchain, not via this command."
            .dimmed()
    );
    println!();

    println!("{}", "  Running clippy lints...".cyan());
    let clippy_start = Instant::now();
    run_checked(
        Command::new("cargo").args(["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"]),
        "clippy check failed",
    )?;
    println!(
        "{}",
        format!("  Clippy passed in {:.2}s", clippy_start.elapsed().as_secs_f64()).green()
    );
    println!();

    println!("{}", "  Checking code formatting...".cyan());
    let fmt_output = Command::new("cargo")
        .args(["fmt", "--all", "--check"])
        .output()
        .context("failed to run cargo fmt")?;
    if !fmt_output.status.success() {
        eprintln!("{}", "  Formatting issues found".red().bold());
        eprintln!("     Run 'cargo fmt --all' to fix");
        anyhow::bail!("format check failed");
    }
    println!("{}", "  Formatting check passed".green());
    println!();

    println!(
        "{}",
        format!("All checks completed in {:.2}s", total_start.elapsed().as_secs_f64()).green().bold()
    );
    println!();

    Ok(())
}

fn run_checked(cmd: &mut Command, failure_context: &str) -> Result<()> {
    let output = cmd.output().with_context(|| failure_context.to_string())?;
    if !output.status.success() {
        eprintln!("{}", format!("  {failure_context}").red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!(failure_context.to_string());
    }
    Ok(())
}
