// Open-loop commands: timed drive and stop

use std::time::{Duration, Instant};
use tracing::info;

use super::Command;
use crate::messages::DriveSignal;
use crate::motor::Hardware;

/// Hold a drive signal for a fixed wall-clock duration
#[derive(Debug, Clone)]
pub struct DriveForDuration {
    signal: DriveSignal,
    duration: Duration,
    started_at: Option<Instant>,
}

impl DriveForDuration {
    pub fn new(signal: DriveSignal, duration: Duration) -> Self {
        Self {
            signal,
            duration,
            started_at: None,
        }
    }

    pub fn signal(&self) -> DriveSignal {
        self.signal
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Command for DriveForDuration {
    fn name(&self) -> &str {
        "drive_for_duration"
    }

    fn start(&mut self, hw: &mut dyn Hardware) {
        info!("Driving {:?} for {:?}", self.signal, self.duration);
        hw.drive(self.signal);
        self.started_at = Some(Instant::now());
    }

    fn tick(&mut self, hw: &mut dyn Hardware) {
        hw.drive(self.signal);
    }

    fn is_finished(&self) -> bool {
        self.started_at.is_some_and(|t| t.elapsed() >= self.duration)
    }

    fn stop(&mut self, hw: &mut dyn Hardware) {
        hw.neutral();
    }
}

/// Command zero motion once and finish immediately.
///
/// Do not rely on this as an emergency stop: it is one best-effort frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stop;

impl Command for Stop {
    fn name(&self) -> &str {
        "stop"
    }

    fn start(&mut self, hw: &mut dyn Hardware) {
        hw.neutral();
    }
}
