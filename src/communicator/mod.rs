//! Synchronous request/reply engine
//!
//! One telegram is in flight at a time: the transport lock is held across
//! encode, write and (when a reply is expected) the full reply read.

use crate::error::{Error, Result};
use crate::protocol::{
    Command, InputValues, MotorPort, OutputCommand, OutputState, Reply, SensorMode, SensorPort,
    SensorType,
};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

mod lowspeed;
mod mailbox;

/// Default per-reply deadline
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default bound on LSGetStatus polls per I2C register read
pub const DEFAULT_I2C_MAX_STATUS_POLLS: u32 = 250;

/// Tunables for the request/reply engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunicatorSettings {
    /// Deadline for a complete reply after the request was written
    pub read_timeout: Duration,
    /// LSGetStatus polls before an I2C read gives up
    pub i2c_max_status_polls: u32,
}

impl Default for CommunicatorSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            i2c_max_status_polls: DEFAULT_I2C_MAX_STATUS_POLLS,
        }
    }
}

/// Typed command surface over one transport
pub struct Communicator {
    transport: Mutex<Box<dyn Transport>>,
    /// Serializes multi-telegram low-speed transactions
    bus: Mutex<()>,
    connected: AtomicBool,
    settings: CommunicatorSettings,
}

impl Communicator {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::with_settings(transport, CommunicatorSettings::default())
    }

    pub fn with_settings<T: Transport + 'static>(
        transport: T,
        settings: CommunicatorSettings,
    ) -> Self {
        Self {
            transport: Mutex::new(Box::new(transport)),
            bus: Mutex::new(()),
            connected: AtomicBool::new(false),
            settings,
        }
    }

    pub fn settings(&self) -> CommunicatorSettings {
        self.settings
    }

    /// Transport name (serial port path)
    pub fn port_name(&self) -> String {
        self.transport.lock().name().to_string()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Open the transport, closing any previous connection first
    pub fn connect(&self) -> Result<()> {
        let mut transport = self.transport.lock();
        if transport.is_open() {
            log::info!("Reconnecting {}: closing previous connection", transport.name());
            transport.close()?;
        }
        self.connected.store(false, Ordering::Release);

        transport.open()?;
        self.connected.store(true, Ordering::Release);
        log::info!("Connected to {}", transport.name());
        Ok(())
    }

    /// Close the transport (no-op when already disconnected)
    pub fn disconnect(&self) -> Result<()> {
        let mut transport = self.transport.lock();
        if !self.connected.swap(false, Ordering::AcqRel) && !transport.is_open() {
            return Ok(());
        }
        transport.close()?;
        log::info!("Disconnected from {}", transport.name());
        Ok(())
    }

    /// Run one command and return its reply, if it has one
    ///
    /// Validation happens before the lock is taken; the connection check and
    /// all transport I/O happen under it. Stale bytes are discarded before a
    /// reply-expecting telegram goes out, and again after a timeout or a
    /// reply that does not belong to this request.
    pub fn execute(&self, command: &Command) -> Result<Option<Reply>> {
        let frame = command.to_frame()?;
        let bytes = frame.encode();

        let mut transport = self.transport.lock();
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        if frame.expects_reply {
            discard_pending(&mut **transport)?;
        }

        log::debug!("-> {:?}", command);
        log::trace!("TX {:02X?}", bytes);
        transport.write_all(&bytes)?;
        transport.flush()?;

        if !frame.expects_reply {
            return Ok(None);
        }

        let deadline = Instant::now() + self.settings.read_timeout;
        let result = read_reply(&mut **transport, deadline)
            .and_then(|body| Reply::parse(frame.opcode, &body));

        if let Err(e) = &result {
            if matches!(e, Error::Timeout) || e.is_protocol_mismatch() {
                log::warn!("{:?}: {}; resynchronizing", command.opcode(), e);
                discard_pending(&mut **transport)?;
            }
        }
        result.map(Some)
    }

    /// Run a reply-expecting command
    fn request(&self, command: Command) -> Result<Reply> {
        self.execute(&command)?.ok_or_else(|| {
            Error::Other(format!("{:?} produced no reply", command.opcode()))
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.execute(&command).map(|_| ())
    }

    /// Discard whatever is waiting in the receive buffer
    pub fn drain(&self) -> Result<usize> {
        let mut transport = self.transport.lock();
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        discard_pending(&mut **transport)
    }

    // ---- Outputs ----

    pub fn set_output_state(&self, port: MotorPort, output: OutputCommand) -> Result<()> {
        self.send(Command::SetOutputState { port, output })
    }

    pub fn get_output_state(&self, port: MotorPort) -> Result<OutputState> {
        self.request(Command::GetOutputState(port))?.output_state()
    }

    /// Reset the tacho counter; `relative` resets the block counter only
    pub fn reset_motor_position(&self, port: MotorPort, relative: bool) -> Result<()> {
        self.send(Command::ResetMotorPosition { port, relative })
    }

    // ---- Inputs ----

    pub fn set_input_mode(
        &self,
        port: SensorPort,
        sensor_type: SensorType,
        mode: SensorMode,
    ) -> Result<()> {
        self.request(Command::SetInputMode {
            port,
            sensor_type,
            mode,
        })
        .map(|_| ())
    }

    pub fn get_input_values(&self, port: SensorPort) -> Result<InputValues> {
        self.request(Command::GetInputValues(port))?.input_values()
    }

    // ---- System ----

    /// Reset the brick's sleep timer
    pub fn keep_alive(&self) -> Result<()> {
        self.request(Command::KeepAlive).map(|_| ())
    }

    /// Battery voltage in millivolts
    pub fn get_battery_level(&self) -> Result<u16> {
        self.request(Command::GetBatteryLevel)?.battery_millivolts()
    }

    /// Rename the brick; longer names are cut to 14 characters
    pub fn set_brick_name(&self, name: &str) -> Result<()> {
        self.send(Command::SetBrickName(name.to_string()))
    }
}

/// Read one length-prefixed reply body
fn read_reply(transport: &mut dyn Transport, deadline: Instant) -> Result<Vec<u8>> {
    let mut len = [0u8; 2];
    transport.read_exact_until(&mut len, deadline)?;
    let mut body = vec![0u8; u16::from_le_bytes(len) as usize];
    transport.read_exact_until(&mut body, deadline)?;
    log::trace!("RX {:02X?}", body);
    Ok(body)
}

/// Drop every byte already received
fn discard_pending(transport: &mut dyn Transport) -> Result<usize> {
    let mut total = 0;
    let mut scratch = [0u8; 64];
    while transport.available()? > 0 {
        let n = transport.read(&mut scratch)?;
        if n == 0 {
            break;
        }
        total += n;
    }
    if total > 0 {
        log::debug!("Discarded {} stale bytes", total);
    }
    Ok(total)
}

impl Drop for Communicator {
    fn drop(&mut self) {
        if let Err(e) = self.transport.get_mut().close() {
            log::warn!("Failed to close transport: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MotorMode, RegulationMode, RunState};
    use crate::transport::MockTransport;

    fn connected() -> (Communicator, MockTransport) {
        let mock = MockTransport::new();
        let comm = Communicator::new(mock.clone());
        comm.connect().unwrap();
        (comm, mock)
    }

    #[test]
    fn test_not_connected_guard() {
        let mock = MockTransport::new();
        let comm = Communicator::new(mock.clone());

        let result = comm.set_output_state(MotorPort::A, OutputCommand::coast());
        assert!(matches!(result, Err(Error::NotConnected)));
        assert!(mock.get_written().is_empty());
        assert_eq!(mock.open_count(), 0);
    }

    #[test]
    fn test_validation_before_io() {
        let (comm, mock) = connected();
        let output = OutputCommand {
            power: 101,
            ..OutputCommand::coast()
        };
        assert!(matches!(
            comm.set_output_state(MotorPort::A, output),
            Err(Error::InvalidParameter(_))
        ));
        assert!(mock.get_written().is_empty());
    }

    #[test]
    fn test_reconnect_closes_previous_handle() {
        let (comm, mock) = connected();
        comm.connect().unwrap();

        assert_eq!(mock.open_count(), 2);
        assert_eq!(mock.close_count(), 1);
        assert!(comm.is_connected());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (comm, mock) = connected();
        comm.disconnect().unwrap();
        comm.disconnect().unwrap();

        assert_eq!(mock.close_count(), 1);
        assert!(!comm.is_connected());
        assert!(matches!(comm.keep_alive(), Err(Error::NotConnected)));
    }

    #[test]
    fn test_failed_open_leaves_disconnected() {
        let mock = MockTransport::new();
        mock.set_fail_open(true);
        let comm = Communicator::new(mock);
        assert!(comm.connect().is_err());
        assert!(!comm.is_connected());
    }

    #[test]
    fn test_set_output_state_wire_bytes() {
        let (comm, mock) = connected();
        let output = OutputCommand {
            power: -50,
            mode: MotorMode::ON | MotorMode::REGULATED,
            regulation: RegulationMode::Speed,
            turn_ratio: 0,
            run_state: RunState::Running,
            tacho_limit: 360,
        };
        comm.set_output_state(MotorPort::B, output).unwrap();

        assert_eq!(
            mock.get_written(),
            vec![0x0C, 0x00, 0x80, 0x04, 0x01, 0xCE, 0x05, 0x01, 0x00, 0x20, 0x68, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn test_battery_level() {
        let (comm, mock) = connected();
        mock.queue_reply(MockTransport::ok_reply(0x0B, &7400u16.to_le_bytes()));
        assert_eq!(comm.get_battery_level().unwrap(), 7400);
    }

    #[test]
    fn test_device_status_propagates() {
        let (comm, mock) = connected();
        mock.queue_reply(MockTransport::status_reply(0x07, 0xC0, &[]));

        match comm.get_input_values(SensorPort::S1) {
            Err(Error::Device { status, command }) => {
                assert_eq!(status.code(), 0xC0);
                assert_eq!(command, 0x07);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_echo_mismatch_is_protocol_error() {
        let (comm, mock) = connected();
        mock.queue_reply(MockTransport::ok_reply(0x06, &[]));
        let err = comm.keep_alive().unwrap_err();
        assert!(err.is_protocol_mismatch());
    }

    #[test]
    fn test_missing_reply_times_out() {
        let mock = MockTransport::new();
        let comm = Communicator::with_settings(
            mock,
            CommunicatorSettings {
                read_timeout: Duration::from_millis(20),
                ..CommunicatorSettings::default()
            },
        );
        comm.connect().unwrap();
        assert!(matches!(comm.keep_alive(), Err(Error::Timeout)));
    }

    #[test]
    fn test_drain_discards_stale_bytes() {
        let (comm, mock) = connected();
        mock.inject_read(&[0xAA, 0xBB, 0xCC]);
        assert_eq!(comm.drain().unwrap(), 3);

        mock.queue_reply(MockTransport::ok_reply(0x0D, &[0, 0, 0, 0]));
        comm.keep_alive().unwrap();
    }

    fn length_prefixed(body: Vec<u8>) -> Vec<u8> {
        let mut bytes = (body.len() as u16).to_le_bytes().to_vec();
        bytes.extend(body);
        bytes
    }

    #[test]
    fn test_late_reply_after_timeout_is_discarded() {
        let mock = MockTransport::new();
        let comm = Communicator::with_settings(
            mock.clone(),
            CommunicatorSettings {
                read_timeout: Duration::from_millis(20),
                ..CommunicatorSettings::default()
            },
        );
        comm.connect().unwrap();

        assert!(matches!(comm.get_battery_level(), Err(Error::Timeout)));
        mock.inject_read(&length_prefixed(MockTransport::ok_reply(
            0x0B,
            &7196u16.to_le_bytes(),
        )));

        mock.queue_reply(MockTransport::ok_reply(0x0B, &8000u16.to_le_bytes()));
        assert_eq!(comm.get_battery_level().unwrap(), 8000);
        mock.queue_reply(MockTransport::ok_reply(0x0B, &9000u16.to_le_bytes()));
        assert_eq!(comm.get_battery_level().unwrap(), 9000);
    }

    #[test]
    fn test_mismatched_reply_resyncs_stream() {
        let (comm, mock) = connected();
        mock.queue_reply(MockTransport::ok_reply(0x06, &[]));
        assert!(comm.keep_alive().unwrap_err().is_protocol_mismatch());
        // a second stale reply arriving after the mismatch is discarded
        mock.inject_read(&length_prefixed(MockTransport::ok_reply(0x06, &[])));
        assert_eq!(comm.drain().unwrap(), 5);

        mock.inject_read(&length_prefixed(MockTransport::ok_reply(
            0x0B,
            &7196u16.to_le_bytes(),
        )));
        mock.queue_reply(MockTransport::ok_reply(0x0B, &7400u16.to_le_bytes()));
        assert_eq!(comm.get_battery_level().unwrap(), 7400);
    }
}
