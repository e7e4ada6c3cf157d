// Hardware facade for the drive base
//
// Combines the actuator link, the wire mapping, and the vision subsystem
// behind the small API the commands and teleop loop use.

use serialport::SerialPort;
use std::io::Write;
use tracing::{debug, info, warn};

use super::link::{ActuatorLink, LinkError};
use super::mapping::{WireCommand, clamp_normalized};
use crate::messages::DriveSignal;
use crate::vision::{Detection, NoVision, Vision};

/// What a command sees of the robot
pub trait Hardware {
    /// Send normalized intents. Each axis is clamped to [-1, 1], mapped to
    /// wire units, and written as one frame. The last write wins.
    fn send_values(&mut self, strafe: f32, forward: f32, turn: f32)
    -> Result<WireCommand, LinkError>;

    /// Advance auxiliary subsystems. Called once per control cycle.
    fn tick(&mut self);

    /// Latest target detection from the vision subsystem
    fn latest_detection(&self) -> Option<Detection>;

    /// Send a signal, dropping the frame on write failure.
    ///
    /// Frames are absolute commands, so the next cycle's frame replaces a
    /// lost one.
    fn drive(&mut self, signal: DriveSignal) -> Option<WireCommand> {
        match self.send_values(signal.strafe, signal.forward, signal.turn) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                warn!("Dropping frame {:?}: {}", signal, e);
                None
            }
        }
    }

    /// Command zero motion on every axis
    fn neutral(&mut self) -> Option<WireCommand> {
        self.drive(DriveSignal::neutral())
    }
}

/// The robot: one actuator link plus a vision subsystem
pub struct RobotHardware<P: Write = Box<dyn SerialPort>, V: Vision = NoVision> {
    link: ActuatorLink<P>,
    vision: V,
}

impl RobotHardware {
    /// Open the serial device with no vision subsystem
    pub fn open(port: &str, baudrate: u32) -> Result<Self, LinkError> {
        let link = ActuatorLink::open_with_baudrate(port, baudrate)?;
        Ok(Self::new(link, NoVision))
    }
}

impl<P: Write, V: Vision> RobotHardware<P, V> {
    pub fn new(link: ActuatorLink<P>, vision: V) -> Self {
        Self { link, vision }
    }

    /// Replace the vision subsystem
    pub fn with_vision<W: Vision>(self, vision: W) -> RobotHardware<P, W> {
        RobotHardware {
            link: self.link,
            vision,
        }
    }

    pub fn link(&self) -> &ActuatorLink<P> {
        &self.link
    }

    pub fn vision(&self) -> &V {
        &self.vision
    }

    /// Command neutral and close the link
    pub fn shutdown(self) -> Result<(), LinkError> {
        info!("Shutting down hardware");
        self.link.close()
    }
}

impl<P: Write, V: Vision> Hardware for RobotHardware<P, V> {
    fn send_values(
        &mut self,
        strafe: f32,
        forward: f32,
        turn: f32,
    ) -> Result<WireCommand, LinkError> {
        let signal = DriveSignal::new(
            clamp_normalized(strafe),
            clamp_normalized(forward),
            clamp_normalized(turn),
        );
        let cmd = WireCommand::from(signal);
        debug!(
            "Drive strafe={:.3} forward={:.3} turn={:.3} -> {:?}",
            signal.strafe,
            signal.forward,
            signal.turn,
            cmd.as_array()
        );
        self.link.send_command(cmd)?;
        Ok(cmd)
    }

    fn tick(&mut self) {
        self.vision.tick();
    }

    fn latest_detection(&self) -> Option<Detection> {
        self.vision.latest_detection()
    }
}
