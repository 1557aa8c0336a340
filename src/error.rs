//! Error types for nxt-link

use crate::protocol::{DeviceStatus, SensorPort};

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// nxt-link error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command issued while the communicator is closed
    #[error("Not connected to a brick")]
    NotConnected,

    /// Motor or sensor operation without a brick/port assignment
    #[error("Not attached: {0}")]
    NotAttached(&'static str),

    /// No complete reply within the read timeout
    #[error("Timed out waiting for reply")]
    Timeout,

    /// I2C status polling exhausted its attempt budget
    #[error("I2C read on {port:?} gave up after {attempts} status polls")]
    I2cTimeout {
        /// Sensor port being read
        port: SensorPort,
        /// Number of LSGetStatus polls issued
        attempts: u32,
    },

    /// First reply byte was not the reply marker
    #[error("Unexpected reply type: {0:#04x}")]
    UnexpectedReplyType(u8),

    /// Reply echoed a different command than the one sent
    #[error("Reply command mismatch: sent {sent:#04x}, received {received:#04x}")]
    CommandMismatch {
        /// Opcode of the request
        sent: u8,
        /// Opcode echoed by the reply
        received: u8,
    },

    /// Invalid packet or reply payload
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Non-zero status byte reported by the brick
    #[error("Device error {status} ({code:#04x}) in reply to command {command:#04x}", code = .status.code())]
    Device {
        /// Decoded status
        status: DeviceStatus,
        /// Opcode of the failed command
        command: u8,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background worker panicked
    #[error("Worker thread panicked")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Device errors the I2C tunnel reports while a transaction is still in flight.
    ///
    /// Callers polling the low-speed bus retry on these instead of failing.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Device {
                status: DeviceStatus::ChannelBusy | DeviceStatus::CommBusError,
                ..
            }
        )
    }

    /// Errors after which the byte stream can no longer be trusted.
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedReplyType(_) | Error::CommandMismatch { .. }
        )
    }

    /// Device status code, if this is a device-reported failure
    pub fn device_code(&self) -> Option<u8> {
        match self {
            Error::Device { status, .. } => Some(status.code()),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let busy = Error::Device {
            status: DeviceStatus::ChannelBusy,
            command: 0x0E,
        };
        let bus = Error::Device {
            status: DeviceStatus::CommBusError,
            command: 0x0E,
        };
        let bad = Error::Device {
            status: DeviceStatus::BadArguments,
            command: 0x0E,
        };

        assert!(busy.is_transient());
        assert!(bus.is_transient());
        assert!(!bad.is_transient());
        assert!(!Error::Timeout.is_transient());
    }

    #[test]
    fn test_device_error_message_carries_codes() {
        let err = Error::Device {
            status: DeviceStatus::ChannelBusy,
            command: 0x04,
        };
        let text = err.to_string();
        assert!(text.contains("0xe0"));
        assert!(text.contains("0x04"));
        assert_eq!(err.device_code(), Some(0xE0));
    }
}
