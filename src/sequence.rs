// Command sequences loaded from JSON
//
// File format is an array of steps, e.g.
//   [{"type": "drive", "forward": 0.4, "duration_s": 4.0},
//    {"type": "center_on_target", "kp": 0.002},
//    {"type": "stop"}]
// Omitted fields take the defaults in config.rs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::command::{CenterOnTargetHeading, CenterParams, Command, DriveForDuration, Stop};
use crate::messages::DriveSignal;

/// Error types for sequence loading
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("Cannot read sequence file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse sequence: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid step {index}: {reason}")]
    Invalid { index: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, SequenceError>;

/// One step of a sequence file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepSpec {
    Drive {
        #[serde(default)]
        strafe: f32,
        #[serde(default)]
        forward: f32,
        #[serde(default)]
        turn: f32,
        duration_s: f64,
    },
    Stop,
    CenterOnTarget {
        kp: Option<f32>,
        cx_ref: Option<f32>,
        turn_limit: Option<f32>,
        timeout_s: Option<f64>,
        hold_s: Option<f64>,
    },
}

impl StepSpec {
    /// Build the command this step describes
    pub fn build(&self, index: usize) -> Result<Box<dyn Command>> {
        let invalid = |reason: String| SequenceError::Invalid { index, reason };

        match *self {
            StepSpec::Drive {
                strafe,
                forward,
                turn,
                duration_s,
            } => {
                if ![strafe, forward, turn].iter().all(|v| v.is_finite()) {
                    return Err(invalid("drive values must be finite".to_string()));
                }
                let duration = seconds(duration_s).map_err(invalid)?;
                Ok(Box::new(DriveForDuration::new(
                    DriveSignal::new(strafe, forward, turn),
                    duration,
                )))
            }
            StepSpec::Stop => Ok(Box::new(Stop)),
            StepSpec::CenterOnTarget {
                kp,
                cx_ref,
                turn_limit,
                timeout_s,
                hold_s,
            } => {
                let defaults = CenterParams::default();
                let params = CenterParams {
                    kp: kp.unwrap_or(defaults.kp),
                    cx_ref: cx_ref.unwrap_or(defaults.cx_ref),
                    turn_limit: turn_limit.unwrap_or(defaults.turn_limit),
                    timeout: timeout_s
                        .map(seconds)
                        .transpose()
                        .map_err(invalid)?
                        .unwrap_or(defaults.timeout),
                    hold: hold_s
                        .map(seconds)
                        .transpose()
                        .map_err(invalid)?
                        .unwrap_or(defaults.hold),
                };
                if !(params.kp.is_finite() && params.kp >= 0.0) {
                    return Err(invalid(format!("kp must be finite and >= 0, got {}", params.kp)));
                }
                if !params.cx_ref.is_finite() {
                    return Err(invalid("cx_ref must be finite".to_string()));
                }
                if !(params.turn_limit.is_finite() && params.turn_limit >= 0.0) {
                    return Err(invalid(format!(
                        "turn_limit must be finite and >= 0, got {}",
                        params.turn_limit
                    )));
                }
                Ok(Box::new(CenterOnTargetHeading::new(params)))
            }
        }
    }
}

fn seconds(secs: f64) -> std::result::Result<Duration, String> {
    Duration::try_from_secs_f64(secs).map_err(|_| format!("invalid duration {} s", secs))
}

/// Parse a JSON sequence into steps
pub fn parse_steps(json: &str) -> Result<Vec<StepSpec>> {
    Ok(serde_json::from_str(json)?)
}

/// Build commands from steps, rejecting the whole sequence on the first bad step
pub fn build_commands(steps: &[StepSpec]) -> Result<Vec<Box<dyn Command>>> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| step.build(index))
        .collect()
}

/// Load and build a sequence file
pub fn load(path: &Path) -> Result<Vec<Box<dyn Command>>> {
    let json = std::fs::read_to_string(path).map_err(|source| SequenceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let steps = parse_steps(&json)?;
    info!("Loaded {} steps from {}", steps.len(), path.display());
    build_commands(&steps)
}

/// Center on the tag, then stop
pub fn default_steps() -> Vec<StepSpec> {
    vec![
        StepSpec::CenterOnTarget {
            kp: None,
            cx_ref: None,
            turn_limit: None,
            timeout_s: None,
            hold_s: None,
        },
        StepSpec::Stop,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_step_types() {
        let steps = parse_steps(
            r#"[
                {"type": "drive", "forward": 0.4, "duration_s": 4.0},
                {"type": "center_on_target", "kp": 0.01, "turn_limit": 0.5},
                {"type": "stop"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            steps[0],
            StepSpec::Drive {
                strafe: 0.0,
                forward: 0.4,
                turn: 0.0,
                duration_s: 4.0
            }
        );
        assert!(matches!(
            steps[1],
            StepSpec::CenterOnTarget {
                kp: Some(_),
                cx_ref: None,
                ..
            }
        ));
        assert_eq!(steps[2], StepSpec::Stop);

        let commands = build_commands(&steps).unwrap();
        let names: Vec<&str> = commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["drive_for_duration", "center_on_target_heading", "stop"]);
    }

    #[test]
    fn test_unknown_step_type_rejected() {
        let err = parse_steps(r#"[{"type": "spin"}]"#).unwrap_err();
        assert!(matches!(err, SequenceError::Parse(_)));
    }

    #[test]
    fn test_drive_requires_duration() {
        assert!(parse_steps(r#"[{"type": "drive", "forward": 0.4}]"#).is_err());
    }

    #[test]
    fn test_negative_duration_rejected() {
        let steps = parse_steps(r#"[{"type": "stop"}, {"type": "drive", "duration_s": -1.0}]"#)
            .unwrap();
        match build_commands(&steps) {
            Err(SequenceError::Invalid { index, .. }) => assert_eq!(index, 1),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("negative duration accepted"),
        }
    }

    #[test]
    fn test_negative_gain_rejected() {
        let steps = parse_steps(r#"[{"type": "center_on_target", "kp": -0.1}]"#).unwrap();
        assert!(matches!(
            build_commands(&steps),
            Err(SequenceError::Invalid { index: 0, .. })
        ));
    }

    #[test]
    fn test_default_steps_build() {
        let commands = build_commands(&default_steps()).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].name(), "stop");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let res = load(Path::new("/nonexistent/omni-drive/sequence.json"));
        assert!(matches!(res, Err(SequenceError::Io { .. })));
    }
}
