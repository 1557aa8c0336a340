//! Outgoing telegrams
//!
//! Wire layout: `[LEN_LO] [LEN_HI] [TYPE] [OPCODE] [PAYLOAD...]`
//!
//! LEN counts TYPE + OPCODE + PAYLOAD. All multi-byte fields are little-endian.

use super::opcode::{parse_type_byte, type_byte, CommandKind, Opcode};
use super::types::{MotorPort, OutputCommand, SensorMode, SensorPort, SensorType};
use crate::error::{Error, Result};

/// Largest mailbox message body (the brick adds a NUL, 58 bytes total)
pub const MAX_MAILBOX_PAYLOAD: usize = 57;

/// Highest mailbox id
pub const MAX_MAILBOX: u8 = 9;

/// Low-speed bus transfer limit, both directions
pub const MAX_LS_DATA: usize = 16;

/// Characters of a brick name that survive on the device
pub const BRICK_NAME_LEN: usize = 14;

/// Fixed width of the SetBrickName payload
const BRICK_NAME_FIELD: usize = 16;

/// A length-prefixed telegram, before or after the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: CommandKind,
    pub expects_reply: bool,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Serialize with the 2-byte length prefix
    pub fn encode(&self) -> Vec<u8> {
        let body_len = 2 + self.payload.len();
        let mut bytes = Vec::with_capacity(2 + body_len);
        bytes.extend_from_slice(&(body_len as u16).to_le_bytes());
        bytes.push(type_byte(self.kind, self.expects_reply));
        bytes.push(self.opcode);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse one complete length-prefixed telegram
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::InvalidPacket(format!(
                "frame too short: {} bytes",
                bytes.len()
            )));
        }

        let declared = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        if declared != bytes.len() - 2 {
            return Err(Error::InvalidPacket(format!(
                "length prefix {} does not match body of {} bytes",
                declared,
                bytes.len() - 2
            )));
        }

        let (kind, expects_reply) = parse_type_byte(bytes[2])
            .ok_or_else(|| Error::InvalidPacket(format!("bad type byte {:#04x}", bytes[2])))?;

        Ok(Frame {
            kind,
            expects_reply,
            opcode: bytes[3],
            payload: bytes[4..].to_vec(),
        })
    }
}

/// Typed commands understood by this driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetOutputState {
        port: MotorPort,
        output: OutputCommand,
    },
    SetInputMode {
        port: SensorPort,
        sensor_type: SensorType,
        mode: SensorMode,
    },
    GetOutputState(MotorPort),
    GetInputValues(SensorPort),
    ResetMotorPosition {
        port: MotorPort,
        /// Reset the block counter instead of the program counter
        relative: bool,
    },
    MessageWrite {
        mailbox: u8,
        data: Vec<u8>,
    },
    MessageRead {
        remote_inbox: u8,
        local_inbox: u8,
        remove: bool,
    },
    KeepAlive,
    GetBatteryLevel,
    LsGetStatus(SensorPort),
    LsWrite {
        port: SensorPort,
        data: Vec<u8>,
        /// Bytes the device should buffer for the following LsRead
        rx_len: u8,
    },
    LsRead(SensorPort),
    SetBrickName(String),
}

impl Command {
    /// Opcode for this command
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::SetOutputState { .. } => Opcode::SetOutputState,
            Command::SetInputMode { .. } => Opcode::SetInputMode,
            Command::GetOutputState(_) => Opcode::GetOutputState,
            Command::GetInputValues(_) => Opcode::GetInputValues,
            Command::ResetMotorPosition { .. } => Opcode::ResetMotorPosition,
            Command::MessageWrite { .. } => Opcode::MessageWrite,
            Command::MessageRead { .. } => Opcode::MessageRead,
            Command::KeepAlive => Opcode::KeepAlive,
            Command::GetBatteryLevel => Opcode::GetBatteryLevel,
            Command::LsGetStatus(_) => Opcode::LsGetStatus,
            Command::LsWrite { .. } => Opcode::LsWrite,
            Command::LsRead(_) => Opcode::LsRead,
            Command::SetBrickName(_) => Opcode::SetBrickName,
        }
    }

    /// Whether the brick answers this command
    pub fn expects_reply(&self) -> bool {
        !matches!(
            self,
            Command::SetOutputState { .. }
                | Command::ResetMotorPosition { .. }
                | Command::MessageWrite { .. }
                | Command::SetBrickName(_)
        )
    }

    /// Check argument ranges; runs before any I/O
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::SetOutputState { port, output } => {
                require_motor_port(*port, true)?;
                require_range("power", output.power)?;
                require_range("turn ratio", output.turn_ratio)?;
            }
            Command::ResetMotorPosition { port, .. } => require_motor_port(*port, true)?,
            Command::GetOutputState(port) => require_motor_port(*port, false)?,
            Command::SetInputMode { port, .. }
            | Command::GetInputValues(port)
            | Command::LsGetStatus(port)
            | Command::LsRead(port) => require_sensor_port(*port)?,
            Command::LsWrite { port, data, rx_len } => {
                require_sensor_port(*port)?;
                if data.is_empty() || data.len() > MAX_LS_DATA {
                    return Err(Error::InvalidParameter(format!(
                        "LSWrite data must be 1..={} bytes, got {}",
                        MAX_LS_DATA,
                        data.len()
                    )));
                }
                if *rx_len as usize > MAX_LS_DATA {
                    return Err(Error::InvalidParameter(format!(
                        "LSWrite return length must be <= {}, got {}",
                        MAX_LS_DATA, rx_len
                    )));
                }
            }
            Command::MessageWrite { mailbox, data } => {
                require_mailbox(*mailbox)?;
                if data.len() > MAX_MAILBOX_PAYLOAD {
                    return Err(Error::InvalidParameter(format!(
                        "mailbox message must be <= {} bytes, got {}",
                        MAX_MAILBOX_PAYLOAD,
                        data.len()
                    )));
                }
            }
            Command::MessageRead {
                remote_inbox,
                local_inbox,
                ..
            } => {
                // Remote inboxes 10-19 are the brick's outgoing queues
                if *remote_inbox > 19 || *local_inbox > 19 {
                    return Err(Error::InvalidParameter(format!(
                        "inbox ids must be <= 19, got {}/{}",
                        remote_inbox, local_inbox
                    )));
                }
            }
            Command::KeepAlive | Command::GetBatteryLevel | Command::SetBrickName(_) => {}
        }
        Ok(())
    }

    /// Payload bytes following the opcode
    fn build_payload(&self) -> Vec<u8> {
        match self {
            Command::SetOutputState { port, output } => {
                let mut payload = Vec::with_capacity(10);
                payload.push(port.code());
                payload.push(output.power as u8);
                payload.push(output.mode.bits());
                payload.push(output.regulation.code());
                payload.push(output.turn_ratio as u8);
                payload.push(output.run_state.code());
                payload.extend_from_slice(&output.tacho_limit.to_le_bytes());
                payload
            }
            Command::SetInputMode {
                port,
                sensor_type,
                mode,
            } => vec![port.code(), sensor_type.code(), mode.code()],
            Command::GetOutputState(port) => vec![port.code()],
            Command::GetInputValues(port) => vec![port.code()],
            Command::ResetMotorPosition { port, relative } => {
                vec![port.code(), u8::from(*relative)]
            }
            Command::MessageWrite { mailbox, data } => {
                let mut payload = Vec::with_capacity(data.len() + 3);
                payload.push(*mailbox);
                payload.push((data.len() + 1) as u8);
                payload.extend_from_slice(data);
                payload.push(0x00);
                payload
            }
            Command::MessageRead {
                remote_inbox,
                local_inbox,
                remove,
            } => vec![*remote_inbox, *local_inbox, u8::from(*remove)],
            Command::KeepAlive | Command::GetBatteryLevel => Vec::new(),
            Command::LsGetStatus(port) | Command::LsRead(port) => vec![port.code()],
            Command::LsWrite { port, data, rx_len } => {
                let mut payload = Vec::with_capacity(data.len() + 3);
                payload.push(port.code());
                payload.push(data.len() as u8);
                payload.push(*rx_len);
                payload.extend_from_slice(data);
                payload
            }
            Command::SetBrickName(name) => {
                let mut payload = vec![0u8; BRICK_NAME_FIELD];
                for (slot, byte) in payload.iter_mut().zip(ascii_bytes(name).take(BRICK_NAME_LEN)) {
                    *slot = byte;
                }
                payload
            }
        }
    }

    /// Validate and build the frame
    pub fn to_frame(&self) -> Result<Frame> {
        self.validate()?;
        let opcode = self.opcode();
        Ok(Frame {
            kind: opcode.kind(),
            expects_reply: self.expects_reply(),
            opcode: opcode.code(),
            payload: self.build_payload(),
        })
    }

    /// Validate and serialize for the wire
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.to_frame()?.encode())
    }
}

/// ASCII encoding; anything outside 7-bit becomes '?'
pub(crate) fn ascii_bytes(text: &str) -> impl Iterator<Item = u8> + '_ {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
}

fn require_range(what: &str, value: i8) -> Result<()> {
    if !(-100..=100).contains(&value) {
        return Err(Error::InvalidParameter(format!(
            "{} must be within -100..=100, got {}",
            what, value
        )));
    }
    Ok(())
}

fn require_motor_port(port: MotorPort, allow_all: bool) -> Result<()> {
    match port {
        MotorPort::None => Err(Error::InvalidParameter(
            "motor port None cannot be addressed".into(),
        )),
        MotorPort::All if !allow_all => Err(Error::InvalidParameter(
            "motor port All cannot be queried".into(),
        )),
        _ => Ok(()),
    }
}

fn require_sensor_port(port: SensorPort) -> Result<()> {
    if port == SensorPort::None {
        return Err(Error::InvalidParameter(
            "sensor port None cannot be addressed".into(),
        ));
    }
    Ok(())
}

fn require_mailbox(mailbox: u8) -> Result<()> {
    if mailbox > MAX_MAILBOX {
        return Err(Error::InvalidParameter(format!(
            "mailbox must be 0..={}, got {}",
            MAX_MAILBOX, mailbox
        )));
    }
    Ok(())
}
