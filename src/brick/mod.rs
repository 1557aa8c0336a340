//! Brick device model
//!
//! Owns the communicator, three motor slots and four sensor slots, and the
//! two background workers: the keep-alive timer and the sensor poller.
//!
//! Motors and sensors point back at the brick weakly; the slots are the
//! single source of truth for which port a device sits on.

mod poller;
mod worker;

use crate::communicator::{Communicator, CommunicatorSettings};
use crate::error::{Error, Result};
use crate::events::{Observers, SubscriptionId};
use crate::motor::Motor;
use crate::protocol::{MotorPort, SensorPort};
use crate::sensor::Sensor;
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use worker::Worker;

/// Default keep-alive period (the brick sleeps after minutes of silence)
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Default poller back-off when no sensor is due
pub const DEFAULT_POLL_IDLE: Duration = Duration::from_millis(1);

/// Brick-level settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrickSettings {
    /// Start the poll scheduler on connect
    pub auto_poll: bool,
    pub keepalive_interval: Duration,
    pub poll_idle: Duration,
    pub communicator: CommunicatorSettings,
}

impl Default for BrickSettings {
    fn default() -> Self {
        Self {
            auto_poll: false,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            poll_idle: DEFAULT_POLL_IDLE,
            communicator: CommunicatorSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrickEvent {
    Connected,
    Disconnected,
}

/// Shared state behind every [`Brick`] handle
pub(crate) struct BrickCore {
    comm: Communicator,
    motors: Mutex<[Option<Arc<Motor>>; 3]>,
    sensors: Mutex<[Option<Arc<Sensor>>; 4]>,
    auto_poll: AtomicBool,
    online: AtomicBool,
    keepalive_interval: Duration,
    poll_idle: Duration,
    keepalive: Mutex<Option<Worker>>,
    poller: Mutex<Option<Worker>>,
    events: Observers<BrickEvent, Brick>,
}

impl BrickCore {
    pub(crate) fn communicator(&self) -> &Communicator {
        &self.comm
    }

    pub(crate) fn motor_port_of(&self, motor: &Motor) -> MotorPort {
        let slots = self.motors.lock();
        MotorPort::PORTS
            .into_iter()
            .zip(slots.iter())
            .find(|(_, slot)| slot.as_ref().is_some_and(|m| std::ptr::eq(Arc::as_ptr(m), motor)))
            .map_or(MotorPort::None, |(port, _)| port)
    }

    pub(crate) fn sensor_port_of(&self, sensor: &Sensor) -> SensorPort {
        let slots = self.sensors.lock();
        SensorPort::PORTS
            .into_iter()
            .zip(slots.iter())
            .find(|(_, slot)| slot.as_ref().is_some_and(|s| std::ptr::eq(Arc::as_ptr(s), sensor)))
            .map_or(SensorPort::None, |(port, _)| port)
    }

    fn remove_motor(&self, motor: &Arc<Motor>) {
        for slot in self.motors.lock().iter_mut() {
            if slot.as_ref().is_some_and(|m| Arc::ptr_eq(m, motor)) {
                *slot = None;
            }
        }
    }

    fn remove_sensor(&self, sensor: &Arc<Sensor>) {
        for slot in self.sensors.lock().iter_mut() {
            if slot.as_ref().is_some_and(|s| Arc::ptr_eq(s, sensor)) {
                *slot = None;
            }
        }
    }

    fn stop_keepalive(&self) -> Result<()> {
        let worker = self.keepalive.lock().take();
        worker.map_or(Ok(()), |mut w| w.stop())
    }

    fn stop_poller(&self) -> Result<()> {
        let worker = self.poller.lock().take();
        worker.map_or(Ok(()), |mut w| w.stop())
    }

    /// Stop both workers; both are always stopped, the first failure is returned
    fn stop_workers(&self) -> Result<()> {
        let keepalive = self.stop_keepalive();
        let poller = self.stop_poller();
        for e in [&keepalive, &poller].into_iter().filter_map(|r| r.as_ref().err()) {
            log::warn!("Brick worker shutdown: {}", e);
        }
        keepalive.and(poller)
    }
}

impl Drop for BrickCore {
    fn drop(&mut self) {
        let _ = self.stop_workers();
    }
}

/// Handle to one NXT brick; clones share the same connection and slots
#[derive(Clone)]
pub struct Brick {
    core: Arc<BrickCore>,
}

impl Brick {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::with_settings(transport, BrickSettings::default())
    }

    pub fn with_settings<T: Transport + 'static>(transport: T, settings: BrickSettings) -> Self {
        Self {
            core: Arc::new(BrickCore {
                comm: Communicator::with_settings(transport, settings.communicator),
                motors: Mutex::new([None, None, None]),
                sensors: Mutex::new([None, None, None, None]),
                auto_poll: AtomicBool::new(settings.auto_poll),
                online: AtomicBool::new(false),
                keepalive_interval: settings.keepalive_interval,
                poll_idle: settings.poll_idle,
                keepalive: Mutex::new(None),
                poller: Mutex::new(None),
                events: Observers::new(),
            }),
        }
    }

    pub(crate) fn from_core(core: Arc<BrickCore>) -> Self {
        Self { core }
    }

    /// Direct access to the command surface
    pub fn communicator(&self) -> &Communicator {
        &self.core.comm
    }

    /// True between a successful [`connect`](Self::connect) and [`disconnect`](Self::disconnect)
    pub fn is_connected(&self) -> bool {
        self.core.online.load(Ordering::Acquire)
    }

    /// Two handles to the same brick
    pub fn same_brick(&self, other: &Brick) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    // ---- Connection ----

    /// Open the link, configure every attached sensor and start the workers
    ///
    /// Calling this while connected reconnects.
    pub fn connect(&self) -> Result<()> {
        // a worker that died earlier must not keep the link from reopening
        let _ = self.core.stop_workers();
        self.core.online.store(false, Ordering::Release);

        self.core.comm.connect()?;
        if let Err(e) = self.init_sensors().and_then(|_| self.core.comm.keep_alive()) {
            log::error!("Brick initialization failed: {}", e);
            if let Err(close_err) = self.core.comm.disconnect() {
                log::warn!("Failed to close after init error: {}", close_err);
            }
            return Err(e);
        }

        self.core.online.store(true, Ordering::Release);
        log::info!("Brick connected on {}", self.core.comm.port_name());
        self.core.events.notify(BrickEvent::Connected, self);

        if self.auto_poll() {
            self.start_polling()?;
        }
        self.start_keepalive()
    }

    /// Stop the workers and close the link
    ///
    /// Safe to call when not connected; Disconnected is only raised if the
    /// brick was connected. The link is closed even when a worker fails to
    /// stop cleanly, and the first failure is returned afterwards.
    pub fn disconnect(&self) -> Result<()> {
        let workers = self.core.stop_workers();
        let closed = self.core.comm.disconnect();
        if let Err(e) = &closed {
            log::warn!("Failed to close link: {}", e);
        }

        if self.core.online.swap(false, Ordering::AcqRel) {
            log::info!("Brick disconnected");
            self.core.events.notify(BrickEvent::Disconnected, self);
        }
        workers.and(closed)
    }

    fn init_sensors(&self) -> Result<()> {
        for sensor in self.sensors() {
            sensor.init()?;
        }
        Ok(())
    }

    fn start_keepalive(&self) -> Result<()> {
        let core = Arc::downgrade(&self.core);
        let interval = self.core.keepalive_interval;
        let worker = Worker::spawn("nxt-keepalive", move |signal| {
            poller::keepalive_loop(&core, interval, &signal)
        })?;
        *self.core.keepalive.lock() = Some(worker);
        Ok(())
    }

    // ---- Polling ----

    pub fn auto_poll(&self) -> bool {
        self.core.auto_poll.load(Ordering::Relaxed)
    }

    /// Takes effect on the next connect; use [`start_polling`](Self::start_polling)
    /// to begin immediately
    pub fn set_auto_poll(&self, enabled: bool) {
        self.core.auto_poll.store(enabled, Ordering::Relaxed);
    }

    /// Start the poll scheduler over the sensors that have auto-poll set
    ///
    /// The sensor list is captured now. Does nothing if the scheduler is
    /// already running or no sensor wants polling.
    pub fn start_polling(&self) -> Result<()> {
        let mut slot = self.core.poller.lock();
        if slot.as_ref().is_some_and(|w| !w.is_finished()) {
            return Ok(());
        }

        let sensors: Vec<Arc<Sensor>> = self
            .sensors()
            .into_iter()
            .filter(|s| s.auto_poll())
            .collect();
        if sensors.is_empty() {
            log::debug!("No auto-poll sensors attached, poller not started");
            return Ok(());
        }

        log::info!("Polling {} sensor(s)", sensors.len());
        let idle = self.core.poll_idle;
        *slot = Some(Worker::spawn("nxt-poller", move |signal| {
            poller::poll_loop(&sensors, idle, &signal)
        })?);
        Ok(())
    }

    /// Stop the poll scheduler and wait until its last poll has finished
    pub fn stop_polling(&self) -> Result<()> {
        self.core.stop_poller()
    }

    pub fn is_polling(&self) -> bool {
        self.core
            .poller
            .lock()
            .as_ref()
            .is_some_and(|w| !w.is_finished())
    }

    // ---- Motor slots ----

    pub fn motor_ports(&self) -> [MotorPort; 3] {
        MotorPort::PORTS
    }

    /// Put `motor` on `port`, moving it off any slot (on any brick) it held
    ///
    /// `MotorPort::None` detaches it.
    pub fn attach_motor(&self, port: MotorPort, motor: &Arc<Motor>) -> Result<()> {
        if port == MotorPort::All {
            return Err(Error::InvalidParameter(
                "a motor cannot be attached to all ports".to_string(),
            ));
        }

        let previous = motor.brick.lock().upgrade();
        if let Some(other) = previous.filter(|b| !Arc::ptr_eq(b, &self.core)) {
            other.remove_motor(motor);
        }

        let mut slots = self.core.motors.lock();
        for slot in slots.iter_mut() {
            if slot.as_ref().is_some_and(|m| Arc::ptr_eq(m, motor)) {
                *slot = None;
            }
        }

        match port.slot() {
            Some(index) => {
                if let Some(displaced) = slots[index].replace(Arc::clone(motor)) {
                    *displaced.brick.lock() = Weak::new();
                }
                *motor.brick.lock() = Arc::downgrade(&self.core);
                log::debug!("Motor attached to {:?}", port);
            }
            None => *motor.brick.lock() = Weak::new(),
        }
        Ok(())
    }

    pub fn detach_motor(&self, motor: &Arc<Motor>) -> Result<()> {
        self.attach_motor(MotorPort::None, motor)
    }

    pub fn motor(&self, port: MotorPort) -> Option<Arc<Motor>> {
        let index = port.slot()?;
        self.core.motors.lock()[index].clone()
    }

    /// Attached motors in port order
    pub fn motors(&self) -> Vec<Arc<Motor>> {
        self.core.motors.lock().iter().flatten().cloned().collect()
    }

    // ---- Sensor slots ----

    pub fn sensor_ports(&self) -> [SensorPort; 4] {
        SensorPort::PORTS
    }

    /// Put `sensor` on `port`, moving it off any slot (on any brick) it held
    ///
    /// `SensorPort::None` detaches it.
    pub fn attach_sensor(&self, port: SensorPort, sensor: &Arc<Sensor>) -> Result<()> {
        let previous = sensor.brick.lock().upgrade();
        if let Some(other) = previous.filter(|b| !Arc::ptr_eq(b, &self.core)) {
            other.remove_sensor(sensor);
        }

        let mut slots = self.core.sensors.lock();
        for slot in slots.iter_mut() {
            if slot.as_ref().is_some_and(|s| Arc::ptr_eq(s, sensor)) {
                *slot = None;
            }
        }

        match port.slot() {
            Some(index) => {
                if let Some(displaced) = slots[index].replace(Arc::clone(sensor)) {
                    *displaced.brick.lock() = Weak::new();
                }
                *sensor.brick.lock() = Arc::downgrade(&self.core);
                log::debug!("{:?} sensor attached to {:?}", sensor.kind(), port);
            }
            None => *sensor.brick.lock() = Weak::new(),
        }
        Ok(())
    }

    pub fn detach_sensor(&self, sensor: &Arc<Sensor>) -> Result<()> {
        self.attach_sensor(SensorPort::None, sensor)
    }

    pub fn sensor(&self, port: SensorPort) -> Option<Arc<Sensor>> {
        let index = port.slot()?;
        self.core.sensors.lock()[index].clone()
    }

    /// Attached sensors in port order
    pub fn sensors(&self) -> Vec<Arc<Sensor>> {
        self.core.sensors.lock().iter().flatten().cloned().collect()
    }

    // ---- Brick-wide commands ----

    pub fn keep_alive(&self) -> Result<()> {
        self.core.comm.keep_alive()
    }

    /// Battery voltage in millivolts
    pub fn battery_level(&self) -> Result<u16> {
        self.core.comm.get_battery_level()
    }

    /// Rename the brick; longer names are cut to 14 characters
    pub fn set_name(&self, name: &str) -> Result<()> {
        self.core.comm.set_brick_name(name)
    }

    // ---- Notifications ----

    pub fn subscribe<F>(&self, event: BrickEvent, callback: F) -> SubscriptionId
    where
        F: Fn(&Brick) + Send + Sync + 'static,
    {
        self.core.events.subscribe(event, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.events.unsubscribe(id)
    }
}

impl std::fmt::Debug for Brick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Brick")
            .field("port", &self.core.comm.port_name())
            .field("connected", &self.is_connected())
            .field("auto_poll", &self.auto_poll())
            .finish()
    }
}
