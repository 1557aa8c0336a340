//! Status byte taxonomy carried in every reply

use std::fmt;

/// Status codes the brick reports in byte 2 of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    PendingCommunication,
    MailboxEmpty,
    RequestFailed,
    UnknownCommand,
    InsanePacket,
    OutOfRangeData,
    CommBusError,
    OutOfCommBufferMemory,
    ChannelInvalid,
    ChannelBusy,
    NoActiveProgram,
    IllegalSize,
    IllegalMailboxId,
    InvalidFieldAccess,
    BadData,
    OutOfMemory,
    BadArguments,
    /// Anything the firmware documents outside the table above
    Unknown(u8),
}

impl DeviceStatus {
    /// Map a non-zero status byte
    pub fn from_code(code: u8) -> Self {
        match code {
            0x20 => DeviceStatus::PendingCommunication,
            0x40 => DeviceStatus::MailboxEmpty,
            0xBD => DeviceStatus::RequestFailed,
            0xBE => DeviceStatus::UnknownCommand,
            0xBF => DeviceStatus::InsanePacket,
            0xC0 => DeviceStatus::OutOfRangeData,
            0xDD => DeviceStatus::CommBusError,
            0xDE => DeviceStatus::OutOfCommBufferMemory,
            0xDF => DeviceStatus::ChannelInvalid,
            0xE0 => DeviceStatus::ChannelBusy,
            0xEC => DeviceStatus::NoActiveProgram,
            0xED => DeviceStatus::IllegalSize,
            0xEE => DeviceStatus::IllegalMailboxId,
            0xEF => DeviceStatus::InvalidFieldAccess,
            0xF0 => DeviceStatus::BadData,
            0xFB => DeviceStatus::OutOfMemory,
            0xFF => DeviceStatus::BadArguments,
            other => DeviceStatus::Unknown(other),
        }
    }

    /// Wire value
    pub fn code(self) -> u8 {
        match self {
            DeviceStatus::PendingCommunication => 0x20,
            DeviceStatus::MailboxEmpty => 0x40,
            DeviceStatus::RequestFailed => 0xBD,
            DeviceStatus::UnknownCommand => 0xBE,
            DeviceStatus::InsanePacket => 0xBF,
            DeviceStatus::OutOfRangeData => 0xC0,
            DeviceStatus::CommBusError => 0xDD,
            DeviceStatus::OutOfCommBufferMemory => 0xDE,
            DeviceStatus::ChannelInvalid => 0xDF,
            DeviceStatus::ChannelBusy => 0xE0,
            DeviceStatus::NoActiveProgram => 0xEC,
            DeviceStatus::IllegalSize => 0xED,
            DeviceStatus::IllegalMailboxId => 0xEE,
            DeviceStatus::InvalidFieldAccess => 0xEF,
            DeviceStatus::BadData => 0xF0,
            DeviceStatus::OutOfMemory => 0xFB,
            DeviceStatus::BadArguments => 0xFF,
            DeviceStatus::Unknown(code) => code,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceStatus::PendingCommunication => "pending communication transaction",
            DeviceStatus::MailboxEmpty => "mailbox queue empty",
            DeviceStatus::RequestFailed => "request failed",
            DeviceStatus::UnknownCommand => "unknown command opcode",
            DeviceStatus::InsanePacket => "insane packet",
            DeviceStatus::OutOfRangeData => "data out of range",
            DeviceStatus::CommBusError => "communication bus error",
            DeviceStatus::OutOfCommBufferMemory => "no free memory in communication buffer",
            DeviceStatus::ChannelInvalid => "channel/connection not valid",
            DeviceStatus::ChannelBusy => "channel/connection busy",
            DeviceStatus::NoActiveProgram => "no active program",
            DeviceStatus::IllegalSize => "illegal size specified",
            DeviceStatus::IllegalMailboxId => "illegal mailbox queue id",
            DeviceStatus::InvalidFieldAccess => "invalid field access",
            DeviceStatus::BadData => "bad input or output specified",
            DeviceStatus::OutOfMemory => "insufficient memory",
            DeviceStatus::BadArguments => "bad arguments",
            DeviceStatus::Unknown(_) => "unknown status",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_map_both_ways() {
        for code in [0x20, 0x40, 0xBD, 0xC0, 0xDD, 0xE0, 0xEE, 0xFF] {
            assert_eq!(DeviceStatus::from_code(code).code(), code);
        }
        assert_eq!(DeviceStatus::from_code(0xE0), DeviceStatus::ChannelBusy);
        assert_eq!(DeviceStatus::from_code(0xDD), DeviceStatus::CommBusError);
        assert_eq!(DeviceStatus::from_code(0x33), DeviceStatus::Unknown(0x33));
    }
}
