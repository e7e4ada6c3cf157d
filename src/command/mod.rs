// Sequenced robot behaviors
//
// Provides:
// - The four-phase command lifecycle (start / tick / is_finished / stop)
// - Timed open-loop drive, stop, and closed-loop heading centering
// - A sequential scheduler that runs a list of commands to completion

mod center;
mod drive;
mod scheduler;

pub use center::{CenterOnTargetHeading, CenterParams};
pub use drive::{DriveForDuration, Stop};
pub use scheduler::{AbortHandle, RunOutcome, Scheduler};

use crate::motor::Hardware;

/// A unit of sequenced behavior.
///
/// The scheduler calls `start` once, then `tick` followed by `is_finished`
/// every cycle, then `stop` once, whether the command finished or the run
/// was aborted. `stop` may be the only call a command ever receives.
pub trait Command: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    fn start(&mut self, _hw: &mut dyn Hardware) {}

    fn tick(&mut self, _hw: &mut dyn Hardware) {}

    /// Pure predicate over the command's own state
    fn is_finished(&self) -> bool {
        true
    }

    /// Bring the actuator to rest
    fn stop(&mut self, _hw: &mut dyn Hardware) {}
}
