// Closed-loop heading centering on a visual target
//
// Proportional control on the horizontal pixel error between the detected
// tag centroid and a reference column. Only the turn axis is driven; strafe
// and forward stay at zero for the whole behavior. The command always runs
// for its full timeout; it does not stop on reaching zero error.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::Command;
use crate::config::{CENTER_CX_REF, CENTER_KP, CENTER_TIMEOUT, CENTER_TURN_LIMIT, DETECTION_HOLD};
use crate::messages::DriveSignal;
use crate::motor::Hardware;

/// Tuning for `CenterOnTargetHeading`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterParams {
    /// Normalized turn per pixel of error
    pub kp: f32,
    /// Pixel column the target should sit on
    pub cx_ref: f32,
    /// Magnitude limit on the turn command
    pub turn_limit: f32,
    /// Hard ceiling on run time
    pub timeout: Duration,
    /// How long to keep the previous turn after losing the target
    pub hold: Duration,
}

impl Default for CenterParams {
    fn default() -> Self {
        Self {
            kp: CENTER_KP,
            cx_ref: CENTER_CX_REF,
            turn_limit: CENTER_TURN_LIMIT,
            timeout: CENTER_TIMEOUT,
            hold: DETECTION_HOLD,
        }
    }
}

/// Turn in place to keep a detected target at `cx_ref`.
///
/// Not safety rated. When the target is lost the previous turn is held for
/// `hold`, then the turn drops to zero until the target reappears.
#[derive(Debug, Clone)]
pub struct CenterOnTargetHeading {
    params: CenterParams,
    started_at: Option<Instant>,
    last_turn: f32,
    last_seen: Option<Instant>,
    target_lost: bool,
}

impl CenterOnTargetHeading {
    pub fn new(params: CenterParams) -> Self {
        let turn_limit = if params.turn_limit.is_nan() {
            0.0
        } else {
            params.turn_limit.abs()
        };
        Self {
            params: CenterParams {
                turn_limit,
                ..params
            },
            started_at: None,
            last_turn: 0.0,
            last_seen: None,
            target_lost: false,
        }
    }

    pub fn params(&self) -> &CenterParams {
        &self.params
    }

    /// Controller output for a target at `cx`, before sign inversion
    pub fn turn_for(&self, cx: f32) -> f32 {
        let error = cx - self.params.cx_ref;
        let limit = self.params.turn_limit;
        (self.params.kp * error).clamp(-limit, limit)
    }

    fn holding(&self, now: Instant) -> bool {
        self.last_seen.is_some_and(|seen| now.duration_since(seen) <= self.params.hold)
    }
}

impl Default for CenterOnTargetHeading {
    fn default() -> Self {
        Self::new(CenterParams::default())
    }
}

impl Command for CenterOnTargetHeading {
    fn name(&self) -> &str {
        "center_on_target_heading"
    }

    fn start(&mut self, hw: &mut dyn Hardware) {
        info!(
            "Centering on target: kp={}, cx_ref={}, turn_limit={}, timeout={:?}",
            self.params.kp, self.params.cx_ref, self.params.turn_limit, self.params.timeout
        );
        self.started_at = Some(Instant::now());
        self.last_turn = 0.0;
        self.last_seen = None;
        self.target_lost = false;
        hw.neutral();
    }

    fn tick(&mut self, hw: &mut dyn Hardware) {
        let now = Instant::now();

        let turn = match hw.latest_detection() {
            Some(detection) => {
                if self.target_lost {
                    info!("Target reacquired at cx={}", detection.cx);
                    self.target_lost = false;
                }
                self.last_seen = Some(now);
                self.turn_for(detection.cx)
            }
            None if self.holding(now) => self.last_turn,
            None => {
                if !self.target_lost {
                    warn!("No target detected, commanding zero turn");
                    self.target_lost = true;
                }
                0.0
            }
        };
        self.last_turn = turn;

        // Actuator turns the opposite way to pixel error
        hw.drive(DriveSignal::new(0.0, 0.0, -turn));
    }

    fn is_finished(&self) -> bool {
        self.started_at.is_some_and(|t| t.elapsed() > self.params.timeout)
    }

    fn stop(&mut self, hw: &mut dyn Hardware) {
        hw.neutral();
    }
}
