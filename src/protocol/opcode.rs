//! Command opcodes and the telegram type byte

/// Direct/system command opcodes used by this driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Drive a motor (direct)
    SetOutputState = 0x04,
    /// Configure a sensor port (direct)
    SetInputMode = 0x05,
    /// Read motor state (direct)
    GetOutputState = 0x06,
    /// Read sensor values (direct)
    GetInputValues = 0x07,
    /// Write to a mailbox (direct)
    MessageWrite = 0x09,
    /// Reset tacho counters (direct)
    ResetMotorPosition = 0x0A,
    /// Battery voltage in millivolts (direct)
    GetBatteryLevel = 0x0B,
    /// Reset the sleep timer (direct)
    KeepAlive = 0x0D,
    /// Bytes ready on the low-speed bus (direct)
    LsGetStatus = 0x0E,
    /// Low-speed bus write (direct)
    LsWrite = 0x0F,
    /// Low-speed bus read (direct)
    LsRead = 0x10,
    /// Read from a mailbox (direct)
    MessageRead = 0x13,
    /// Rename the brick (system)
    SetBrickName = 0x98,
}

impl Opcode {
    /// Wire value
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire value
    pub fn from_code(code: u8) -> Option<Self> {
        let op = match code {
            0x04 => Opcode::SetOutputState,
            0x05 => Opcode::SetInputMode,
            0x06 => Opcode::GetOutputState,
            0x07 => Opcode::GetInputValues,
            0x09 => Opcode::MessageWrite,
            0x0A => Opcode::ResetMotorPosition,
            0x0B => Opcode::GetBatteryLevel,
            0x0D => Opcode::KeepAlive,
            0x0E => Opcode::LsGetStatus,
            0x0F => Opcode::LsWrite,
            0x10 => Opcode::LsRead,
            0x13 => Opcode::MessageRead,
            0x98 => Opcode::SetBrickName,
            _ => return None,
        };
        Some(op)
    }

    /// Command family this opcode belongs to
    pub const fn kind(self) -> CommandKind {
        match self {
            Opcode::SetBrickName => CommandKind::System,
            _ => CommandKind::Direct,
        }
    }
}

/// Direct commands drive the VM; system commands touch firmware/settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Direct,
    System,
}

/// Bit set in the type byte when no reply is wanted
pub const NO_REPLY_BIT: u8 = 0x80;

/// Build the telegram type byte
///
/// | kind   | reply | byte |
/// |--------|-------|------|
/// | direct | yes   | 0x00 |
/// | system | yes   | 0x01 |
/// | direct | no    | 0x80 |
/// | system | no    | 0x81 |
pub const fn type_byte(kind: CommandKind, expects_reply: bool) -> u8 {
    let base = match kind {
        CommandKind::Direct => 0x00,
        CommandKind::System => 0x01,
    };
    if expects_reply {
        base
    } else {
        base | NO_REPLY_BIT
    }
}

/// Split a telegram type byte back into (kind, expects_reply)
pub fn parse_type_byte(byte: u8) -> Option<(CommandKind, bool)> {
    let kind = match byte & !NO_REPLY_BIT {
        0x00 => CommandKind::Direct,
        0x01 => CommandKind::System,
        _ => return None,
    };
    Some((kind, byte & NO_REPLY_BIT == 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_byte_table() {
        assert_eq!(type_byte(CommandKind::Direct, true), 0x00);
        assert_eq!(type_byte(CommandKind::System, true), 0x01);
        assert_eq!(type_byte(CommandKind::Direct, false), 0x80);
        assert_eq!(type_byte(CommandKind::System, false), 0x81);

        assert_eq!(parse_type_byte(0x81), Some((CommandKind::System, false)));
        assert_eq!(parse_type_byte(0x00), Some((CommandKind::Direct, true)));
        assert_eq!(parse_type_byte(0x02), None);
    }

    #[test]
    fn test_opcode_codes() {
        assert_eq!(Opcode::SetOutputState.code(), 0x04);
        assert_eq!(Opcode::MessageRead.code(), 0x13);
        assert_eq!(Opcode::from_code(0x98), Some(Opcode::SetBrickName));
        assert_eq!(Opcode::from_code(0x01), None);
        assert_eq!(Opcode::SetBrickName.kind(), CommandKind::System);
        assert_eq!(Opcode::LsWrite.kind(), CommandKind::Direct);
    }
}
