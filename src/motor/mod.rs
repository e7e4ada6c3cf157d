// Actuator output for the drive base
//
// Provides:
// - Normalized intent -> wire value mapping and frame encoding
// - The serial actuator link (fire-and-forget ASCII frames)
// - The hardware facade the commands drive through

mod hardware;
pub mod link;
pub mod mapping;

pub use hardware::{Hardware, RobotHardware};
pub use link::{ActuatorLink, LinkError};
pub use mapping::{WIRE_MAX, WIRE_MIN, WIRE_NEUTRAL, WireCommand, wire_map};
