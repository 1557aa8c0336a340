//! Incoming replies
//!
//! Body layout (after the 2-byte length prefix): `[0x02] [OPCODE] [STATUS] [PAYLOAD...]`
//!
//! Payload offsets below are relative to the first byte after STATUS.

use super::status::DeviceStatus;
use super::types::{
    InputValues, MotorMode, OutputState, RegulationMode, RunState, SensorMode, SensorType,
};
use crate::error::{Error, Result};

/// First byte of every reply telegram
pub const REPLY_MARKER: u8 = 0x02;

/// Reply header length (marker + opcode + status)
pub const REPLY_HEADER_LEN: usize = 3;

/// A validated reply with a zero status byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl Reply {
    /// Validate a reply body against the opcode that was sent
    ///
    /// A non-zero status short-circuits before any payload is looked at.
    pub fn parse(sent_opcode: u8, body: &[u8]) -> Result<Self> {
        if body.len() < REPLY_HEADER_LEN {
            return Err(Error::InvalidPacket(format!(
                "reply too short: {} bytes",
                body.len()
            )));
        }
        if body[0] != REPLY_MARKER {
            return Err(Error::UnexpectedReplyType(body[0]));
        }
        if body[1] != sent_opcode {
            return Err(Error::CommandMismatch {
                sent: sent_opcode,
                received: body[1],
            });
        }
        if body[2] != 0 {
            return Err(Error::Device {
                status: DeviceStatus::from_code(body[2]),
                command: sent_opcode,
            });
        }

        Ok(Reply {
            opcode: body[1],
            payload: body[REPLY_HEADER_LEN..].to_vec(),
        })
    }

    /// Cursor over the payload
    pub fn reader(&self) -> PayloadReader<'_> {
        PayloadReader::new(&self.payload)
    }

    /// GetOutputState: port, power, mode, regulation, turn ratio, run state,
    /// tacho limit (u32), tacho count, block tacho count, rotation count (i32)
    pub fn output_state(&self) -> Result<OutputState> {
        let mut r = self.reader();
        let port = r.u8()?;
        let power = r.i8()?;
        let mode = MotorMode::from_bits(r.u8()?);
        let regulation_code = r.u8()?;
        let regulation = RegulationMode::from_code(regulation_code).ok_or_else(|| {
            Error::InvalidPacket(format!("unknown regulation mode {:#04x}", regulation_code))
        })?;
        let turn_ratio = r.i8()?;
        let run_state_code = r.u8()?;
        let run_state = RunState::from_code(run_state_code).ok_or_else(|| {
            Error::InvalidPacket(format!("unknown run state {:#04x}", run_state_code))
        })?;

        Ok(OutputState {
            port,
            power,
            mode,
            regulation,
            turn_ratio,
            run_state,
            tacho_limit: r.u32()?,
            tacho_count: r.i32()?,
            block_tacho_count: r.i32()?,
            rotation_count: r.i32()?,
        })
    }

    /// GetInputValues: port, valid, calibrated, type, mode, raw (u16),
    /// normalized (u16), scaled (i16), calibrated (i16)
    pub fn input_values(&self) -> Result<InputValues> {
        let mut r = self.reader();
        let _port = r.u8()?;
        Ok(InputValues {
            valid: r.u8()? == 1,
            calibrated: r.u8()? == 1,
            sensor_type: SensorType::from_code(r.u8()?),
            mode: SensorMode::from_code(r.u8()?),
            raw_ad: r.u16()?,
            normalized_ad: r.u16()?,
            scaled_value: r.i16()?,
            calibrated_value: r.i16()?,
        })
    }

    /// GetBatteryLevel: millivolts (u16)
    pub fn battery_millivolts(&self) -> Result<u16> {
        self.reader().u16()
    }

    /// LSGetStatus: bytes ready
    pub fn bytes_ready(&self) -> Result<u8> {
        self.reader().u8()
    }

    /// LSRead: count byte followed by a 16-byte padded buffer
    pub fn ls_data(&self) -> Result<Vec<u8>> {
        let mut r = self.reader();
        let count = r.u8()? as usize;
        Ok(r.bytes(count)?.to_vec())
    }

    /// MessageRead: local inbox, size, then the message bytes
    pub fn message(&self) -> Result<Vec<u8>> {
        let mut r = self.reader();
        let _inbox = r.u8()?;
        let size = r.u8()? as usize;
        Ok(r.bytes(size)?.to_vec())
    }
}

/// Bounds-checked little-endian field reader
pub struct PayloadReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Take the next `len` bytes
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset + len;
        if end > self.data.len() {
            return Err(Error::InvalidPacket(format!(
                "payload truncated: need {} bytes at offset {}, have {}",
                len,
                self.offset,
                self.data.len()
            )));
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Bytes left unread
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_reply() {
        let reply = Reply::parse(0x0B, &[0x02, 0x0B, 0x00, 0x1C, 0x20]).unwrap();
        assert_eq!(reply.opcode, 0x0B);
        assert_eq!(reply.battery_millivolts().unwrap(), 0x201C);
    }

    #[test]
    fn test_status_byte_short_circuits_payload() {
        // ChannelBusy in reply to SetOutputState, with no payload at all
        let err = Reply::parse(0x04, &[0x02, 0x04, 0xE0]).unwrap_err();
        match err {
            Error::Device { status, command } => {
                assert_eq!(status, DeviceStatus::ChannelBusy);
                assert_eq!(status.code(), 0xE0);
                assert_eq!(command, 0x04);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_mismatch_and_marker_errors() {
        assert!(matches!(
            Reply::parse(0x07, &[0x02, 0x06, 0x00]),
            Err(Error::CommandMismatch {
                sent: 0x07,
                received: 0x06
            })
        ));
        assert!(matches!(
            Reply::parse(0x07, &[0x01, 0x07, 0x00]),
            Err(Error::UnexpectedReplyType(0x01))
        ));
        assert!(matches!(
            Reply::parse(0x07, &[0x02]),
            Err(Error::InvalidPacket(_))
        ));
    }

    #[test]
    fn test_input_values_offsets() {
        let mut body = vec![0x02, 0x07, 0x00];
        body.extend_from_slice(&[
            0x02, // port
            0x01, // valid
            0x00, // calibrated
            0x05, // light active
            0x80, // percentage
        ]);
        body.extend_from_slice(&512u16.to_le_bytes());
        body.extend_from_slice(&600u16.to_le_bytes());
        body.extend_from_slice(&(-42i16).to_le_bytes());
        body.extend_from_slice(&7i16.to_le_bytes());

        let values = Reply::parse(0x07, &body).unwrap().input_values().unwrap();
        assert!(values.valid);
        assert!(!values.calibrated);
        assert_eq!(values.sensor_type, SensorType::LightActive);
        assert_eq!(values.mode, SensorMode::Percentage);
        assert_eq!(values.raw_ad, 512);
        assert_eq!(values.normalized_ad, 600);
        assert_eq!(values.scaled_value, -42);
        assert_eq!(values.calibrated_value, 7);
    }

    #[test]
    fn test_output_state_offsets() {
        let mut body = vec![0x02, 0x06, 0x00, 0x01, (-75i8) as u8, 0x07, 0x02, 0x9C, 0x20];
        body.extend_from_slice(&720u32.to_le_bytes());
        body.extend_from_slice(&(-10i32).to_le_bytes());
        body.extend_from_slice(&300i32.to_le_bytes());
        body.extend_from_slice(&(-1200i32).to_le_bytes());

        let state = Reply::parse(0x06, &body).unwrap().output_state().unwrap();
        assert_eq!(state.port, 1);
        assert_eq!(state.power, -75);
        assert!(state.mode.contains(MotorMode::BRAKE));
        assert_eq!(state.regulation, RegulationMode::Sync);
        assert_eq!(state.turn_ratio, -100);
        assert_eq!(state.run_state, RunState::Running);
        assert_eq!(state.tacho_limit, 720);
        assert_eq!(state.tacho_count, -10);
        assert_eq!(state.block_tacho_count, 300);
        assert_eq!(state.rotation_count, -1200);
    }

    #[test]
    fn test_truncated_payload_is_invalid_packet() {
        let reply = Reply::parse(0x07, &[0x02, 0x07, 0x00, 0x00, 0x01]).unwrap();
        assert!(matches!(reply.input_values(), Err(Error::InvalidPacket(_))));
    }

    #[test]
    fn test_ls_data_uses_count_byte() {
        let mut body = vec![0x02, 0x10, 0x00, 0x02, 0xAA, 0xBB];
        body.extend_from_slice(&[0u8; 14]);
        let reply = Reply::parse(0x10, &body).unwrap();
        assert_eq!(reply.ls_data().unwrap(), vec![0xAA, 0xBB]);
    }
}
