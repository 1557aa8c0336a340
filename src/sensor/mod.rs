//! Sensors attached to a brick input port

mod kind;
mod registers;

pub use kind::SensorKind;
pub use registers::{CompassRegister, SonarRegister, SONAR_MODE_CONTINUOUS};

use crate::brick::{Brick, BrickCore};
use crate::error::{Error, Result};
use crate::events::{Observers, SubscriptionId};
use crate::protocol::{InputValues, SensorPort};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Default minimum time between scheduled polls
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(100);

/// One value read from a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// GetInputValues result
    Analog(InputValues),
    /// Value assembled from I2C registers (distance in cm, heading in degrees)
    Digital(i32),
}

/// Measurement plus host-side capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    pub measurement: Measurement,
    pub captured_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorEvent {
    /// Raised after every successful poll
    Polled,
    /// Raised after a poll whose value differs from the one before
    ValueChanged,
}

/// Passed to sensor listeners
#[derive(Debug, Clone, Copy)]
pub struct SensorUpdate {
    pub port: SensorPort,
    /// `None` on the first poll
    pub previous: Option<SensorReading>,
    pub current: SensorReading,
}

#[derive(Default)]
struct SensorState {
    last: Option<SensorReading>,
    previous: Option<SensorReading>,
    last_poll: Option<Instant>,
}

/// A sensor handle; attach it to a brick with [`Brick::attach_sensor`]
pub struct Sensor {
    kind: SensorKind,
    pub(crate) brick: Mutex<Weak<BrickCore>>,
    auto_poll: AtomicBool,
    auto_poll_delay: Mutex<Duration>,
    state: Mutex<SensorState>,
    events: Observers<SensorEvent, SensorUpdate>,
}

impl Sensor {
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            brick: Mutex::new(Weak::new()),
            auto_poll: AtomicBool::new(false),
            auto_poll_delay: Mutex::new(DEFAULT_POLL_DELAY),
            state: Mutex::new(SensorState::default()),
            events: Observers::new(),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    fn core(&self) -> Option<Arc<BrickCore>> {
        self.brick.lock().upgrade()
    }

    /// Brick this sensor is attached to
    pub fn brick(&self) -> Option<Brick> {
        self.core().map(Brick::from_core)
    }

    /// Port found by scanning the owning brick's slots
    pub fn port(&self) -> SensorPort {
        self.core()
            .map_or(SensorPort::None, |core| core.sensor_port_of(self))
    }

    // ---- Polling configuration ----

    /// Include this sensor when the brick's poll scheduler starts
    pub fn auto_poll(&self) -> bool {
        self.auto_poll.load(Ordering::Relaxed)
    }

    pub fn set_auto_poll(&self, enabled: bool) {
        self.auto_poll.store(enabled, Ordering::Relaxed);
    }

    /// Minimum time between scheduled polls; zero polls as often as possible
    pub fn auto_poll_delay(&self) -> Duration {
        *self.auto_poll_delay.lock()
    }

    pub fn set_auto_poll_delay(&self, delay: Duration) {
        *self.auto_poll_delay.lock() = delay;
    }

    /// When the last poll started
    pub fn last_poll(&self) -> Option<Instant> {
        self.state.lock().last_poll
    }

    /// Whether the scheduler should poll at `now`
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        match self.last_poll() {
            Some(at) => now >= at + self.auto_poll_delay(),
            None => true,
        }
    }

    // ---- Device I/O ----

    /// Send this kind's configuration to the port
    pub fn init(&self) -> Result<()> {
        let core = self.core().ok_or(Error::NotAttached("sensor has no brick"))?;
        let port = core.sensor_port_of(self);
        if port == SensorPort::None {
            return Err(Error::NotAttached("sensor has no port"));
        }
        log::debug!("Initializing {:?} sensor on {:?}", self.kind, port);
        self.kind.init(core.communicator(), port)
    }

    /// Read a fresh value and notify listeners
    ///
    /// Without a brick this does nothing and succeeds.
    pub fn poll(&self) -> Result<()> {
        let Some(core) = self.core() else {
            return Ok(());
        };
        let port = core.sensor_port_of(self);
        if port == SensorPort::None {
            return Ok(());
        }

        self.state.lock().last_poll = Some(Instant::now());
        let measurement = self.kind.read(core.communicator(), port)?;
        let current = SensorReading {
            measurement,
            captured_at: Instant::now(),
        };

        let previous = {
            let mut state = self.state.lock();
            state.previous = state.last.replace(current);
            state.previous
        };

        let update = SensorUpdate {
            port,
            previous,
            current,
        };
        self.events.notify(SensorEvent::Polled, &update);

        let baseline = previous.map_or_else(|| self.kind.baseline(), |r| r.measurement);
        if self.kind.differs(&baseline, &current.measurement) {
            log::trace!("{:?} on {:?} changed: {:?}", self.kind, port, current.measurement);
            self.events.notify(SensorEvent::ValueChanged, &update);
        }
        Ok(())
    }

    // ---- Readings ----

    pub fn last_reading(&self) -> Option<SensorReading> {
        self.state.lock().last
    }

    pub fn previous_reading(&self) -> Option<SensorReading> {
        self.state.lock().previous
    }

    /// Last GetInputValues result (analog sensors only)
    pub fn input_values(&self) -> Option<InputValues> {
        match self.last_reading()?.measurement {
            Measurement::Analog(values) => Some(values),
            Measurement::Digital(_) => None,
        }
    }

    /// Raw AD value, or the register value for digital sensors
    pub fn raw_value(&self) -> i32 {
        match self.last_reading().map(|r| r.measurement) {
            Some(Measurement::Analog(values)) => i32::from(values.raw_ad),
            Some(Measurement::Digital(value)) => value,
            None => 0,
        }
    }

    /// Scaled value (light/sound percentage), distance (sonar) or heading (compass)
    pub fn value(&self) -> i32 {
        match self.last_reading().map(|r| r.measurement) {
            Some(Measurement::Analog(values)) => i32::from(values.scaled_value),
            Some(Measurement::Digital(value)) => value,
            None => 0,
        }
    }

    /// Touch sensor state from the last poll
    pub fn is_pressed(&self) -> bool {
        self.kind == SensorKind::Pressure && self.value() == 1
    }

    // ---- Notifications ----

    pub fn subscribe<F>(&self, event: SensorEvent, callback: F) -> SubscriptionId
    where
        F: Fn(&SensorUpdate) + Send + Sync + 'static,
    {
        self.events.subscribe(event, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl std::fmt::Debug for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("kind", &self.kind)
            .field("port", &self.port())
            .field("auto_poll", &self.auto_poll())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_without_brick_is_noop() {
        let sensor = Sensor::new(SensorKind::Pressure);
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        sensor.subscribe(SensorEvent::Polled, move |_| flag.store(true, Ordering::SeqCst));

        sensor.poll().unwrap();
        assert!(!fired.load(Ordering::SeqCst));
        assert!(sensor.last_reading().is_none());
        assert!(sensor.last_poll().is_none());
        assert_eq!(sensor.port(), SensorPort::None);
    }

    #[test]
    fn test_init_requires_brick() {
        let sensor = Sensor::new(SensorKind::Sonar);
        assert!(matches!(sensor.init(), Err(Error::NotAttached(_))));
    }

    #[test]
    fn test_due_schedule() {
        let sensor = Sensor::new(SensorKind::light());
        let now = Instant::now();
        assert!(sensor.is_due(now));

        sensor.state.lock().last_poll = Some(now);
        assert!(!sensor.is_due(now));
        assert!(sensor.is_due(now + DEFAULT_POLL_DELAY));

        sensor.set_auto_poll_delay(Duration::ZERO);
        assert!(sensor.is_due(now));
    }

    #[test]
    fn test_defaults() {
        let sensor = Sensor::new(SensorKind::sound());
        assert!(!sensor.auto_poll());
        assert_eq!(sensor.auto_poll_delay(), Duration::from_millis(100));
        assert_eq!(sensor.value(), 0);
        assert!(!sensor.is_pressed());
    }
}
