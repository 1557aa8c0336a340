//! NXT direct/system command protocol
//!
//! Every exchange is one telegram out and, for reply-expecting commands, one
//! telegram back. Both directions share the same framing:
//!
//! ```text
//! Outgoing: [LEN u16-LE] [TYPE] [OPCODE] [PAYLOAD...]
//! Reply:    [LEN u16-LE] [0x02] [OPCODE] [STATUS] [PAYLOAD...]
//! ```
//!
//! TYPE is 0x00/0x01 (direct/system, reply wanted) or 0x80/0x81 (no reply).
//! STATUS is zero on success; anything else maps to [`DeviceStatus`].

mod command;
mod opcode;
mod reply;
mod status;
mod types;

pub use command::{
    Command, Frame, BRICK_NAME_LEN, MAX_LS_DATA, MAX_MAILBOX, MAX_MAILBOX_PAYLOAD,
};
pub(crate) use command::ascii_bytes;
pub use opcode::{parse_type_byte, type_byte, CommandKind, Opcode, NO_REPLY_BIT};
pub use reply::{PayloadReader, Reply, REPLY_HEADER_LEN, REPLY_MARKER};
pub use status::DeviceStatus;
pub use types::{
    InputValues, MotorMode, MotorPort, OutputCommand, OutputState, RegulationMode, RunState,
    SensorMode, SensorPort, SensorType,
};

/// I2C bus address shared by the ultrasonic and HiTechnic compass sensors
pub const I2C_DEVICE_ADDRESS: u8 = 0x02;
