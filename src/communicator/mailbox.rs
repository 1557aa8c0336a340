//! Mailbox messaging with a program running on the brick
//!
//! Writes go to inboxes 0-9; reads always come from the matching outbox
//! (mailbox + 10), removing the message.

use super::Communicator;
use crate::error::{Error, Result};
use crate::protocol::{ascii_bytes, Command};

/// Offset between a mailbox id and the brick's outgoing queue for it
const RESPONSE_MAILBOX_OFFSET: u8 = 10;

impl Communicator {
    /// Send raw bytes (at most 57) to `mailbox`
    pub fn message_write(&self, mailbox: u8, data: &[u8]) -> Result<()> {
        self.send(Command::MessageWrite {
            mailbox,
            data: data.to_vec(),
        })
    }

    pub fn message_write_str(&self, mailbox: u8, text: &str) -> Result<()> {
        let data: Vec<u8> = ascii_bytes(text).collect();
        self.message_write(mailbox, &data)
    }

    pub fn message_write_i32(&self, mailbox: u8, value: i32) -> Result<()> {
        self.message_write(mailbox, &value.to_le_bytes())
    }

    pub fn message_write_bool(&self, mailbox: u8, value: bool) -> Result<()> {
        self.message_write(mailbox, &[u8::from(value)])
    }

    /// Take the next message from the brick's queue for `mailbox`
    pub fn message_read(&self, mailbox: u8) -> Result<Vec<u8>> {
        if mailbox > crate::protocol::MAX_MAILBOX {
            return Err(Error::InvalidParameter(format!(
                "mailbox must be 0..={}, got {}",
                crate::protocol::MAX_MAILBOX,
                mailbox
            )));
        }
        let inbox = mailbox + RESPONSE_MAILBOX_OFFSET;
        self.request(Command::MessageRead {
            remote_inbox: inbox,
            local_inbox: inbox,
            remove: true,
        })?
        .message()
    }

    /// Read a string message, dropping the NUL terminator
    pub fn message_read_string(&self, mailbox: u8) -> Result<String> {
        let data = self.message_read(mailbox)?;
        let text = match data.iter().position(|&b| b == 0) {
            Some(end) => &data[..end],
            None => &data[..],
        };
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    pub fn message_read_i32(&self, mailbox: u8) -> Result<i32> {
        let data = self.message_read(mailbox)?;
        let bytes: [u8; 4] = data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                Error::InvalidPacket(format!("expected 4-byte number, got {} bytes", data.len()))
            })?;
        Ok(i32::from_le_bytes(bytes))
    }

    pub fn message_read_bool(&self, mailbox: u8) -> Result<bool> {
        let data = self.message_read(mailbox)?;
        data.first()
            .map(|&b| b != 0)
            .ok_or_else(|| Error::InvalidPacket("empty boolean message".to_string()))
    }
}
