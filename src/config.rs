// Timing, wire, and controller defaults
use std::time::Duration;

// Serial link to the motion controller
pub const BAUD_RATE: u32 = 115_200;
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(100);

// Control loop frequency (scheduler and teleop)
pub const LOOP_HZ: u64 = 50;

// Teleop watchdog: neutral if no control request within this window
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Vision feed
// Older samples count as no detection
pub const DETECTION_MAX_AGE: Duration = Duration::from_millis(500);
// Hold the last turn this long after losing the target
pub const DETECTION_HOLD: Duration = Duration::from_millis(250);

// Heading centering defaults
pub const CENTER_KP: f32 = 0.002; // normalized turn per pixel of error
pub const CENTER_CX_REF: f32 = 320.0; // image center for a 640px wide frame
pub const CENTER_TURN_LIMIT: f32 = 0.3;
pub const CENTER_TIMEOUT: Duration = Duration::from_secs(20);

// Zenoh key expressions
pub const TOPIC_CMD_BASE: &str = "omni/cmd/base"; // teleop control requests
pub const TOPIC_VISION_TARGET: &str = "omni/vision/target"; // tag detections
pub const TOPIC_HEALTH: &str = "omni/state/health"; // teleop health status

/// Period of one control cycle at `hz`
pub fn loop_period(hz: u64) -> Duration {
    Duration::from_micros(1_000_000 / hz.max(1))
}
