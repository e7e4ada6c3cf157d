// Message and value types shared by the commands, the facade, and the zenoh edges

use serde::{Deserialize, Serialize};

/// Normalized three-axis motion intent.
///
/// Each axis is nominally in [-1, 1] but producers do not have to clamp;
/// the hardware facade saturates out-of-range values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveSignal {
    pub strafe: f32,
    pub forward: f32,
    pub turn: f32,
}

impl DriveSignal {
    pub const fn new(strafe: f32, forward: f32, turn: f32) -> Self {
        Self {
            strafe,
            forward,
            turn,
        }
    }

    /// Zero commanded motion on every axis
    pub const fn neutral() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

// Control request from a teleop client -> runtime
// Field names match the joystick client's JSON: {"x": .., "y": .., "angular": ..}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub x: f32,       // strafe
    pub y: f32,       // forward/backward
    pub angular: f32, // turn
}

impl From<&ControlRequest> for DriveSignal {
    fn from(req: &ControlRequest) -> Self {
        Self::new(req.x, req.y, req.angular)
    }
}

// Tag detection published by the camera pipeline
// `cx` is the horizontal pixel centroid, null when nothing was detected in the frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetObservation {
    pub frame_id: u64,
    pub cx: Option<f32>,
}

/// Health status published by the teleop loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
