//! Mock transport for testing
//!
//! Behaves like a brick on the other end of the wire: every complete telegram
//! written is decoded and recorded, and reply-expecting telegrams are answered
//! from a responder closure or a queue of canned reply bodies.

use super::Transport;
use crate::error::{Error, Result};
use crate::protocol::{Frame, REPLY_MARKER};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

type Responder = Box<dyn FnMut(&Frame) -> Option<Vec<u8>> + Send>;

/// Mock transport for unit testing
#[derive(Clone)]
pub struct MockTransport {
    name: Arc<str>,
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    open: bool,
    fail_open: bool,
    open_count: usize,
    close_count: usize,
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    pending: Vec<u8>,
    frames: Vec<Frame>,
    replies: VecDeque<Vec<u8>>,
    responder: Option<Responder>,
    awaiting_reply: bool,
    overlapping_writes: usize,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Create a mock transport reporting the given port name
    pub fn named(name: &str) -> Self {
        MockTransport {
            name: Arc::from(name),
            inner: Arc::new(Mutex::new(MockTransportInner {
                open: false,
                fail_open: false,
                open_count: 0,
                close_count: 0,
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
                pending: Vec::new(),
                frames: Vec::new(),
                replies: VecDeque::new(),
                responder: None,
                awaiting_reply: false,
                overlapping_writes: 0,
            })),
        }
    }

    /// Success reply body: `[0x02, opcode, 0x00, payload...]`
    pub fn ok_reply(opcode: u8, payload: &[u8]) -> Vec<u8> {
        Self::status_reply(opcode, 0x00, payload)
    }

    /// Reply body carrying an explicit status byte
    pub fn status_reply(opcode: u8, status: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![REPLY_MARKER, opcode, status];
        body.extend_from_slice(payload);
        body
    }

    /// Answer reply-expecting telegrams with a closure
    ///
    /// The closure returns a reply body (no length prefix) or `None` to stay
    /// silent. Queued replies take precedence.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&Frame) -> Option<Vec<u8>> + Send + 'static,
    {
        self.inner.lock().responder = Some(Box::new(responder));
    }

    /// Queue a reply body for the next reply-expecting telegram
    pub fn queue_reply(&self, body: Vec<u8>) {
        self.inner.lock().replies.push_back(body);
    }

    /// Make subsequent `open` calls fail
    pub fn set_fail_open(&self, fail: bool) {
        self.inner.lock().fail_open = fail;
    }

    /// Inject raw bytes to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Every decoded telegram written so far
    pub fn frames(&self) -> Vec<Frame> {
        self.inner.lock().frames.clone()
    }

    /// Number of telegrams written with the given opcode
    pub fn count_opcode(&self, opcode: u8) -> usize {
        self.inner
            .lock()
            .frames
            .iter()
            .filter(|f| f.opcode == opcode)
            .count()
    }

    /// Clear written data and recorded telegrams
    pub fn clear_written(&self) {
        let mut inner = self.inner.lock();
        inner.write_buffer.clear();
        inner.frames.clear();
    }

    /// Clear read buffer
    pub fn clear_read(&self) {
        let mut inner = self.inner.lock();
        inner.read_buffer.clear();
        inner.awaiting_reply = false;
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.inner.lock().close_count
    }

    /// Telegrams that arrived while a previous reply was still unread
    pub fn overlapping_writes(&self) -> usize {
        self.inner.lock().overlapping_writes
    }
}

impl MockTransportInner {
    fn take_complete_frames(&mut self) {
        while self.pending.len() >= 2 {
            let len = u16::from_le_bytes([self.pending[0], self.pending[1]]) as usize;
            if self.pending.len() < len + 2 {
                break;
            }
            let raw: Vec<u8> = self.pending.drain(..len + 2).collect();
            match Frame::decode(&raw) {
                Ok(frame) => self.handle_frame(frame),
                Err(e) => log::warn!("Mock transport dropped malformed telegram: {}", e),
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        if self.awaiting_reply {
            self.overlapping_writes += 1;
        }

        if frame.expects_reply {
            let body = match self.replies.pop_front() {
                Some(body) => Some(body),
                None => self.responder.as_mut().and_then(|respond| respond(&frame)),
            };
            if let Some(body) = body {
                self.awaiting_reply = true;
                self.read_buffer
                    .extend((body.len() as u16).to_le_bytes().iter().copied());
                self.read_buffer.extend(body);
            }
        }

        self.frames.push(frame);
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_open {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} unavailable", self.name),
            )));
        }
        inner.open = true;
        inner.open_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.open {
            inner.open = false;
            inner.close_count += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(Error::NotConnected);
        }

        let available = inner.read_buffer.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..available)) {
            *slot = byte;
        }
        if inner.read_buffer.is_empty() {
            inner.awaiting_reply = false;
        }

        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(Error::NotConnected);
        }

        inner.write_buffer.extend_from_slice(data);
        inner.pending.extend_from_slice(data);
        inner.take_complete_frames();
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.inner.lock().read_buffer.len())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
