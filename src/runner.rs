//! Supervised execution.
//!
//! The engine itself has no step limit and never logs. This layer drives it
//! one cycle at a time so a caller can cancel a run from another thread and
//! get a trace of what executed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use crate::vm::{ControlFlow, Op, VM, VmError};

/// How a supervised run ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Instructions executed, HALT included
    pub steps: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Vm(#[from] VmError),

    /// The cancellation flag was raised before the program halted.
    #[error("execution cancelled after {steps} steps")]
    Cancelled { steps: u64 },
}

/// Run `vm` to completion, checking `cancel` before every cycle.
///
/// With `trace` set, every cycle is reported as a `trace!` event carrying
/// the pc, the opcode about to run and the operand stack depth.
pub fn run_supervised(
    vm: &mut VM,
    cancel: &AtomicBool,
    trace: bool,
) -> Result<RunSummary, RunError> {
    debug!(
        program_len = vm.program().map_or(0, |p| p.len()),
        stack_size = vm.stack().capacity(),
        return_stack_size = vm.return_stack().capacity(),
        "starting run"
    );

    let mut steps: u64 = 0;
    loop {
        if cancel.load(Ordering::Relaxed) {
            debug!(steps, pc = vm.pc(), "run cancelled");
            return Err(RunError::Cancelled { steps });
        }

        if trace {
            trace_cycle(vm);
        }

        let control = match vm.step() {
            Ok(control) => control,
            Err(e) => {
                debug!(steps, pc = vm.pc(), error = %e, "run failed");
                return Err(e.into());
            }
        };
        steps += 1;

        if control == ControlFlow::Halt {
            debug!(steps, pc = vm.pc(), "halted");
            return Ok(RunSummary { steps });
        }
    }
}

fn trace_cycle(vm: &VM) {
    let pc = vm.pc();
    let word = vm.program().and_then(|p| p.get(pc));
    let op = word.and_then(Op::from_word);
    let operand = match op {
        Some(op) if op.arity() > 0 => vm.program().and_then(|p| p.get(pc + 1)),
        _ => None,
    };
    trace!(
        pc,
        op = op.map_or("?", Op::name),
        operand,
        depth = vm.stack().len(),
        return_depth = vm.return_stack().len(),
        "step"
    );
}

/// Raise a cancellation flag after `timeout` on a background thread.
///
/// The returned flag can also be raised by the caller directly.
pub fn cancel_after(timeout: Duration) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let timer_flag = Arc::clone(&flag);
    thread::spawn(move || {
        thread::sleep(timeout);
        timer_flag.store(true, Ordering::Relaxed);
    });
    flag
}
