// Normalized intent -> wire value mapping
// Converts a DriveSignal in [-1, 1] per axis into the bounded integer frame the
// motion controller accepts.

use crate::messages::DriveSignal;

/// Wire value that commands zero motion on an axis
pub const WIRE_NEUTRAL: u16 = 992;
/// Wire deflection for a full-scale (±1.0) normalized input
pub const WIRE_FULL_SCALE: f32 = 800.0;
/// Safe actuator extremes
pub const WIRE_MIN: u16 = 192;
pub const WIRE_MAX: u16 = 1792;

/// One encoded actuator frame: strafe, forward, turn in wire units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireCommand {
    pub strafe: u16,
    pub forward: u16,
    pub turn: u16,
}

impl WireCommand {
    /// Build a frame, re-clamping each value into [WIRE_MIN, WIRE_MAX]
    pub fn new(strafe: u16, forward: u16, turn: u16) -> Self {
        Self {
            strafe: clamp_wire(strafe),
            forward: clamp_wire(forward),
            turn: clamp_wire(turn),
        }
    }

    pub const fn neutral() -> Self {
        Self {
            strafe: WIRE_NEUTRAL,
            forward: WIRE_NEUTRAL,
            turn: WIRE_NEUTRAL,
        }
    }

    /// ASCII frame `<strafe,forward,turn>\n`
    pub fn to_frame(&self) -> String {
        format!("<{},{},{}>\n", self.strafe, self.forward, self.turn)
    }

    /// Returns values as array [strafe, forward, turn]
    pub fn as_array(&self) -> [u16; 3] {
        [self.strafe, self.forward, self.turn]
    }
}

impl Default for WireCommand {
    fn default() -> Self {
        Self::neutral()
    }
}

impl From<DriveSignal> for WireCommand {
    fn from(signal: DriveSignal) -> Self {
        Self {
            strafe: wire_map(signal.strafe),
            forward: wire_map(signal.forward),
            turn: wire_map(signal.turn),
        }
    }
}

/// Clamp a normalized value to [-1, 1]. NaN counts as no motion.
pub fn clamp_normalized(norm: f32) -> f32 {
    if norm.is_nan() {
        return 0.0;
    }
    norm.clamp(-1.0, 1.0)
}

/// Map a normalized value to a wire value
///
/// `round(992 + clamp(norm, -1, 1) * 800)`, then clamped to [192, 1792].
/// Inputs outside [-1, 1] saturate.
pub fn wire_map(norm: f32) -> u16 {
    let value = (WIRE_NEUTRAL as f32 + clamp_normalized(norm) * WIRE_FULL_SCALE).round() as i32;
    value.clamp(WIRE_MIN as i32, WIRE_MAX as i32) as u16
}

fn clamp_wire(value: u16) -> u16 {
    value.clamp(WIRE_MIN, WIRE_MAX)
}
