//! Transport layer for I/O abstraction

use crate::error::{Error, Result};
use std::thread;
use std::time::Instant;

mod mock;
mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// Byte-stream connection to a brick
///
/// Implementations own the open/close lifecycle; the communicator decides when
/// to call them and serializes all access.
pub trait Transport: Send {
    /// Port name or address this transport connects to
    fn name(&self) -> &str;

    /// Open the underlying connection
    fn open(&mut self) -> Result<()>;

    /// Close the underlying connection (no-op when already closed)
    fn close(&mut self) -> Result<()>;

    /// Whether the connection is currently open
    fn is_open(&self) -> bool;

    /// Read data into buffer, returns number of bytes read (0 on read timeout)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0)
    }

    /// Write the whole buffer
    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let written = self.write(data)?;
            if written == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "transport accepted no bytes",
                )));
            }
            data = &data[written..];
        }
        Ok(())
    }

    /// Fill `buffer` completely or fail with [`Error::Timeout`] at `deadline`
    fn read_exact_until(&mut self, buffer: &mut [u8], deadline: Instant) -> Result<()> {
        let mut filled = 0;
        while filled < buffer.len() {
            let n = self.read(&mut buffer[filled..])?;
            filled += n;
            if filled < buffer.len() {
                if Instant::now() >= deadline {
                    return Err(Error::Timeout);
                }
                if n == 0 {
                    thread::yield_now();
                }
            }
        }
        Ok(())
    }
}
