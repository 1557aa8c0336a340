//! Low-speed (I2C) bus tunnelled through direct commands
//!
//! A register read is LSWrite `[addr, reg]` → LSGetStatus until bytes are
//! ready → LSRead. The status loop is bounded by
//! [`CommunicatorSettings::i2c_max_status_polls`](super::CommunicatorSettings).

use super::Communicator;
use crate::error::{Error, Result};
use crate::protocol::{Command, SensorPort, I2C_DEVICE_ADDRESS};

impl Communicator {
    /// Write `data` on the bus and tell the device how many bytes to buffer back
    pub fn ls_write(&self, port: SensorPort, data: &[u8], rx_len: u8) -> Result<()> {
        self.request(Command::LsWrite {
            port,
            data: data.to_vec(),
            rx_len,
        })
        .map(|_| ())
    }

    /// Bytes waiting to be read with [`ls_read`](Self::ls_read)
    pub fn ls_get_status(&self, port: SensorPort) -> Result<u8> {
        self.request(Command::LsGetStatus(port))?.bytes_ready()
    }

    pub fn ls_read(&self, port: SensorPort) -> Result<Vec<u8>> {
        self.request(Command::LsRead(port))?.ls_data()
    }

    /// Read one register of the I2C device on `port`
    ///
    /// ChannelBusy and CommBusError during the status loop count as "nothing
    /// ready yet". Fails with [`Error::I2cTimeout`] once the poll budget is spent.
    pub fn i2c_get_byte(&self, port: SensorPort, register: u8) -> Result<u8> {
        let _bus = self.bus.lock();

        self.ls_write(port, &[I2C_DEVICE_ADDRESS, register], 1)?;

        let max_polls = self.settings.i2c_max_status_polls;
        let mut attempts = 0;
        loop {
            if attempts >= max_polls {
                log::warn!(
                    "I2C read of register {:#04x} on {:?} not ready after {} polls",
                    register,
                    port,
                    attempts
                );
                return Err(Error::I2cTimeout { port, attempts });
            }
            attempts += 1;

            let ready = match self.ls_get_status(port) {
                Ok(n) => n,
                Err(e) if e.is_transient() => {
                    log::trace!("LSGetStatus on {:?}: {}", port, e);
                    0
                }
                Err(e) => return Err(e),
            };
            if ready > 0 {
                break;
            }
        }

        let data = self.ls_read(port)?;
        data.first().copied().ok_or_else(|| {
            Error::InvalidPacket(format!("LSRead on {:?} returned no data", port))
        })
    }

    /// Write one register of the I2C device on `port`; nothing is read back
    pub fn i2c_set_byte(&self, port: SensorPort, register: u8, value: u8) -> Result<()> {
        let _bus = self.bus.lock();
        self.ls_write(port, &[I2C_DEVICE_ADDRESS, register, value], 0)
    }
}
