//! Cooperative, non-preemptive task kernel.
//!
//! Every task in this firmware is a plain function (or function-like struct)
//! polled once per scheduler pass, owning a private `{Init, Run, Error}`
//! state machine. There is no preemption and no priority: a task that blocks
//! stalls the whole system, which is why every task body must return after
//! doing a bounded amount of work. `knl_main.c`'s `_kernel_run` is the
//! reference: a fixed-order for-loop calling each service task once per
//! pass.

#![cfg_attr(not(test), no_std)]

pub mod syscall;

/// The three states every task cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Not yet initialised; `poll` keeps calling `init` until it succeeds.
    Init,
    /// Initialised; `poll` calls `run` every pass.
    Run,
    /// Hit an unrecoverable error; `poll` no longer calls into task logic.
    Error,
}

/// Outcome of a single `init`/`run` step, the input to [`error_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskResult {
    /// Step completed normally.
    Success,
    /// Step failed, but the task may recover on a later pass.
    Error,
    /// Step failed in a way the task cannot recover from.
    Unrecoverable,
}

/// The single conversion point from a [`TaskResult`] to a state transition.
///
/// Every task in the original firmware repeats this match in its own
/// `switch` statement; collecting it into one function is the direct
/// Rust-idiomatic replacement for that repeated C macro.
pub fn error_check(result: TaskResult, state: &mut TaskState) -> bool {
    match result {
        TaskResult::Success => true,
        TaskResult::Error => false,
        TaskResult::Unrecoverable => {
            *state = TaskState::Error;
            false
        }
    }
}

/// Per-task logic, polled by a [`StatefulTask`] wrapper.
pub trait TaskLogic {
    /// Attempt initialisation. Called every pass while the task is in
    /// [`TaskState::Init`], until it returns [`TaskResult::Success`].
    fn init(&mut self) -> TaskResult;

    /// Do one pass's worth of work. Called every pass while the task is in
    /// [`TaskState::Run`]. Must not block.
    fn run(&mut self) -> TaskResult;
}

/// Wraps [`TaskLogic`] with the standard `{Init, Run, Error}` state machine
/// so individual tasks don't each re-implement the match in `knl_main.c`.
pub struct StatefulTask<L: TaskLogic> {
    state: TaskState,
    logic: L,
}

impl<L: TaskLogic> StatefulTask<L> {
    /// Wraps `logic` in a fresh state machine, starting at `Init`.
    pub const fn new(logic: L) -> Self {
        Self { state: TaskState::Init, logic }
    }

    /// Current state, mainly for diagnostics.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Borrows the wrapped logic.
    pub fn logic_mut(&mut self) -> &mut L {
        &mut self.logic
    }
}

impl<L: TaskLogic> Task for StatefulTask<L> {
    fn poll(&mut self) {
        match self.state {
            TaskState::Init => {
                let result = self.logic.init();
                if error_check(result, &mut self.state) {
                    self.state = TaskState::Run;
                }
            }
            TaskState::Run => {
                let result = self.logic.run();
                error_check(result, &mut self.state);
            }
            TaskState::Error => {
                error_check(TaskResult::Unrecoverable, &mut self.state);
            }
        }
    }
}

/// Anything the scheduler can poll once per pass.
pub trait Task {
    /// Advance this task by exactly one scheduler pass. Must return promptly.
    fn poll(&mut self);
}

/// Fixed-order, round-robin cooperative scheduler.
///
/// `N` is the maximum number of tasks; every registered task is polled
/// exactly once per [`Scheduler::run_once`] call, in registration order,
/// matching `_kernel_run`'s fixed call sequence (event task, then DSP task,
/// then display task, then panel/MIDI tasks).
pub struct Scheduler<const N: usize> {
    tasks: heapless::Vec<&'static mut dyn Task, N>,
}

impl<const N: usize> Scheduler<N> {
    /// Creates a scheduler with no tasks registered.
    #[must_use]
    pub const fn new() -> Self {
        Self { tasks: heapless::Vec::new() }
    }

    /// Registers a task, appending it to the run order.
    ///
    /// # Errors
    ///
    /// Returns the task back if the scheduler is already at its `N`-task
    /// capacity.
    pub fn add(&mut self, task: &'static mut dyn Task) -> Result<(), &'static mut dyn Task> {
        self.tasks.push(task)
    }

    /// Polls every registered task exactly once, in registration order.
    pub fn run_once(&mut self) {
        for task in &mut self.tasks {
            task.poll();
        }
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True if no tasks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<const N: usize> Default for Scheduler<N> {
    fn default() -> Self {
        Self::new()
    }
}
