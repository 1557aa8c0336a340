//! Configuration for nxt-link
//!
//! Loads the serial connection, brick behaviour and the device layout from a
//! TOML file.

use crate::brick::{Brick, BrickSettings};
use crate::communicator::CommunicatorSettings;
use crate::error::{Error, Result};
use crate::motor::Motor;
use crate::protocol::{MotorPort, SensorPort};
use crate::sensor::{Sensor, SensorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub brick: BrickConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub motors: Vec<MotorConfig>,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

/// Serial link to the brick
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Serial device, e.g. `/dev/rfcomm0` (Bluetooth) or `COM8`
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Deadline for each reply
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Brick behaviour
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BrickConfig {
    /// Start the sensor poller on connect
    #[serde(default)]
    pub auto_poll: bool,
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    /// Poller back-off when no sensor is due
    #[serde(default = "default_poll_idle_ms")]
    pub poll_idle_ms: u64,
    /// LSGetStatus attempts before an I2C read gives up
    #[serde(default = "default_i2c_max_status_polls")]
    pub i2c_max_status_polls: u32,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// One motor slot
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MotorConfig {
    /// Output port letter: A, B or C
    pub port: String,
    #[serde(default)]
    pub flip: bool,
}

/// One sensor slot
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SensorConfig {
    /// Input port number: 1-4
    pub port: u8,
    #[serde(flatten)]
    pub kind: SensorKind,
    #[serde(default = "default_true")]
    pub auto_poll: bool,
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_keepalive_interval_ms() -> u64 {
    10_000
}

fn default_poll_idle_ms() -> u64 {
    1
}

fn default_i2c_max_status_polls() -> u32 {
    250
}

fn default_poll_delay_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for BrickConfig {
    fn default() -> Self {
        Self {
            auto_poll: false,
            keepalive_interval_ms: default_keepalive_interval_ms(),
            poll_idle_ms: default_poll_idle_ms(),
            i2c_max_status_polls: default_i2c_max_status_polls(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl MotorConfig {
    pub fn motor_port(&self) -> Result<MotorPort> {
        MotorPort::from_letter(&self.port).ok_or_else(|| {
            Error::Config(format!("unknown motor port '{}', expected A, B or C", self.port))
        })
    }
}

impl SensorConfig {
    pub fn sensor_port(&self) -> Result<SensorPort> {
        SensorPort::from_number(self.port).ok_or_else(|| {
            Error::Config(format!("unknown sensor port {}, expected 1-4", self.port))
        })
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use nxt_link::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("nxt-link.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the driver cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.connection.port.is_empty() {
            return Err(Error::Config("connection.port is empty".to_string()));
        }
        if self.connection.read_timeout_ms == 0 {
            return Err(Error::Config("connection.read_timeout_ms must be > 0".to_string()));
        }
        if self.brick.i2c_max_status_polls == 0 {
            return Err(Error::Config("brick.i2c_max_status_polls must be > 0".to_string()));
        }

        let mut motor_ports = HashSet::new();
        for motor in &self.motors {
            if !motor_ports.insert(motor.motor_port()?) {
                return Err(Error::Config(format!("motor port {} listed twice", motor.port)));
            }
        }
        let mut sensor_ports = HashSet::new();
        for sensor in &self.sensors {
            if !sensor_ports.insert(sensor.sensor_port()?) {
                return Err(Error::Config(format!("sensor port {} listed twice", sensor.port)));
            }
        }
        Ok(())
    }

    pub fn brick_settings(&self) -> BrickSettings {
        BrickSettings {
            auto_poll: self.brick.auto_poll,
            keepalive_interval: Duration::from_millis(self.brick.keepalive_interval_ms),
            poll_idle: Duration::from_millis(self.brick.poll_idle_ms),
            communicator: CommunicatorSettings {
                read_timeout: Duration::from_millis(self.connection.read_timeout_ms),
                i2c_max_status_polls: self.brick.i2c_max_status_polls,
            },
        }
    }

    /// Create the configured motors and sensors and attach them to `brick`
    pub fn attach_devices(&self, brick: &Brick) -> Result<()> {
        for entry in &self.motors {
            let motor = Arc::new(Motor::new());
            motor.set_flip(entry.flip);
            brick.attach_motor(entry.motor_port()?, &motor)?;
        }
        for entry in &self.sensors {
            let sensor = Arc::new(Sensor::new(entry.kind));
            sensor.set_auto_poll(entry.auto_poll);
            sensor.set_auto_poll_delay(Duration::from_millis(entry.poll_delay_ms));
            brick.attach_sensor(entry.sensor_port()?, &sensor)?;
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                port: "/dev/rfcomm0".to_string(),
                baud_rate: default_baud_rate(),
                read_timeout_ms: default_read_timeout_ms(),
            },
            brick: BrickConfig::default(),
            logging: LoggingConfig::default(),
            motors: Vec::new(),
            sensors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    const EXAMPLE: &str = r#"
[connection]
port = "COM8"
read_timeout_ms = 500

[brick]
auto_poll = true
i2c_max_status_polls = 40

[logging]
level = "debug"

[[motors]]
port = "B"

[[motors]]
port = "C"
flip = true

[[sensors]]
port = 1
kind = "pressure"

[[sensors]]
port = 3
kind = "light"
active = true
poll_delay_ms = 50

[[sensors]]
port = 4
kind = "compass"
auto_poll = false
"#;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.connection.port, "/dev/rfcomm0");
        assert_eq!(config.connection.baud_rate, 115200);
        assert_eq!(config.brick.keepalive_interval_ms, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let config = AppConfig::from_toml_str(EXAMPLE).unwrap();

        assert_eq!(config.connection.port, "COM8");
        assert_eq!(config.connection.baud_rate, 115200);
        assert!(config.brick.auto_poll);
        assert_eq!(config.brick.poll_idle_ms, 1);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.motors[1].motor_port().unwrap(), MotorPort::C);
        assert!(config.motors[1].flip);

        assert_eq!(config.sensors[0].kind, SensorKind::Pressure);
        assert_eq!(config.sensors[1].kind, SensorKind::Light { active: true });
        assert_eq!(config.sensors[1].poll_delay_ms, 50);
        assert_eq!(
            config.sensors[2].kind,
            SensorKind::Compass {
                double_precision: true
            }
        );
        assert!(!config.sensors[2].auto_poll);

        let settings = config.brick_settings();
        assert_eq!(settings.communicator.read_timeout, Duration::from_millis(500));
        assert_eq!(settings.communicator.i2c_max_status_polls, 40);
    }

    #[test]
    fn test_invalid_ports_rejected() {
        let bad_motor = "[connection]\nport = \"x\"\n[[motors]]\nport = \"D\"\n";
        assert!(matches!(
            AppConfig::from_toml_str(bad_motor),
            Err(Error::Config(_))
        ));

        let duplicate = "[connection]\nport = \"x\"\n[[sensors]]\nport = 2\nkind = \"sonar\"\n[[sensors]]\nport = 2\nkind = \"raw\"\n";
        assert!(matches!(
            AppConfig::from_toml_str(duplicate),
            Err(Error::Config(_))
        ));

        assert!(matches!(
            AppConfig::from_toml_str("[connection]\nport = 3\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nxt-link.toml");

        let config = AppConfig::from_toml_str(EXAMPLE).unwrap();
        config.to_file(&path).unwrap();
        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_attach_devices() {
        let config = AppConfig::from_toml_str(EXAMPLE).unwrap();
        let brick = Brick::new(MockTransport::new());
        config.attach_devices(&brick).unwrap();

        assert_eq!(brick.motors().len(), 2);
        assert!(brick.motor(MotorPort::C).unwrap().is_flipped());
        let light = brick.sensor(SensorPort::S3).unwrap();
        assert_eq!(light.auto_poll_delay(), Duration::from_millis(50));
        assert!(light.auto_poll());
        assert!(brick.sensor(SensorPort::S2).is_none());
    }
}
