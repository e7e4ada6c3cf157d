// Serial link to the motion controller
//
// Protocol is a single ASCII line per frame, host -> controller only:
//   <strafe,forward,turn>\n
// with each value in [192, 1792] and 992 as neutral. No acknowledgment is
// sent back, so each write is fire-and-forget. Every frame is a complete
// absolute command, so a dropped frame is superseded by the next one.

use serialport::{self, SerialPort};
use std::io::Write;
use tracing::{debug, info, warn};

use super::mapping::WireCommand;
use crate::config::{BAUD_RATE, WRITE_TIMEOUT};

/// Error types for the actuator link
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port {port} unavailable: {source}")]
    Unavailable {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Write to actuator failed: {0}")]
    Write(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Byte-stream connection to the motion controller.
///
/// Generic over the writer so tests can capture frames in memory; the
/// default is an open serial port.
pub struct ActuatorLink<P: Write = Box<dyn SerialPort>> {
    port: P,
    last_sent: Option<WireCommand>,
    parked: bool,
}

impl ActuatorLink {
    /// Open the serial device at the default baud rate
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, BAUD_RATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        info!("Opening actuator link on {} @ {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|source| LinkError::Unavailable {
                port: port_name.to_string(),
                source,
            })?;

        Ok(Self::from_port(port))
    }
}

impl<P: Write> ActuatorLink<P> {
    /// Wrap an already-open writer
    pub fn from_port(port: P) -> Self {
        Self {
            port,
            last_sent: None,
            parked: false,
        }
    }

    /// Write one frame. Values are re-clamped to the safe wire range.
    pub fn send(&mut self, strafe: u16, forward: u16, turn: u16) -> Result<WireCommand> {
        let cmd = WireCommand::new(strafe, forward, turn);
        self.send_command(cmd)?;
        Ok(cmd)
    }

    /// Write an encoded frame
    pub fn send_command(&mut self, cmd: WireCommand) -> Result<()> {
        let frame = cmd.to_frame();
        debug!("Frame {}", frame.trim_end());
        self.port.write_all(frame.as_bytes())?;
        self.port.flush()?;
        self.last_sent = Some(cmd);
        Ok(())
    }

    /// Last frame accepted by the transport
    pub fn last_sent(&self) -> Option<WireCommand> {
        self.last_sent
    }

    /// Underlying writer
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Command neutral and release the link
    pub fn close(mut self) -> Result<()> {
        let res = self.park();
        info!("Actuator link closed");
        res
    }

    fn park(&mut self) -> Result<()> {
        self.parked = true;
        self.send_command(WireCommand::neutral())
    }
}

impl<P: Write> Drop for ActuatorLink<P> {
    fn drop(&mut self) {
        if self.parked {
            return;
        }
        // Leave the actuator at neutral whichever path dropped the link
        if let Err(e) = self.park() {
            warn!("Failed to send neutral frame on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Writer that rejects every write
    struct BrokenPort;

    impl Write for BrokenPort {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frames(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_send_writes_frame() {
        let mut link = ActuatorLink::from_port(Vec::new());
        let sent = link.send(992, 1312, 992).unwrap();
        assert_eq!(sent, WireCommand::new(992, 1312, 992));
        assert_eq!(frames(link.port()), vec!["<992,1312,992>"]);
        assert_eq!(link.last_sent(), Some(sent));
    }

    #[test]
    fn test_send_reclamps_out_of_range() {
        let mut link = ActuatorLink::from_port(Vec::new());
        link.send(0, 65535, 1000).unwrap();
        assert_eq!(frames(link.port()), vec!["<192,1792,1000>"]);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let mut link = ActuatorLink::from_port(BrokenPort);
        let err = link.send(992, 992, 992).unwrap_err();
        assert!(matches!(err, LinkError::Write(_)));
        assert_eq!(link.last_sent(), None);
    }

    #[test]
    fn test_open_missing_device_is_unavailable() {
        let res = ActuatorLink::open("/dev/does-not-exist-omni-drive");
        assert!(matches!(res, Err(LinkError::Unavailable { .. })));
    }

    #[test]
    fn test_drop_sends_neutral() {
        use std::cell::RefCell;
        use std::rc::Rc;

        #[derive(Clone, Default)]
        struct SharedPort(Rc<RefCell<Vec<u8>>>);

        impl Write for SharedPort {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let port = SharedPort::default();
        {
            let mut link = ActuatorLink::from_port(port.clone());
            link.send(1792, 1792, 1792).unwrap();
        }
        assert_eq!(
            frames(&port.0.borrow()),
            vec!["<1792,1792,1792>", "<992,992,992>"]
        );
    }

    #[test]
    fn test_close_sends_neutral_once() {
        let mut buf = Vec::new();
        {
            let mut link = ActuatorLink::from_port(&mut buf);
            link.send(192, 992, 992).unwrap();
            link.close().unwrap();
        }
        assert_eq!(frames(&buf), vec!["<192,992,992>", "<992,992,992>"]);
    }
}
