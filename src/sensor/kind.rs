//! Per-kind sensor behaviour
//!
//! Each kind fixes the (type, mode) pair written by SetInputMode, the way a
//! value is read, and which differences count as a change.

use super::registers::{CompassRegister, SonarRegister, SONAR_MODE_CONTINUOUS};
use super::Measurement;
use crate::communicator::Communicator;
use crate::error::Result;
use crate::protocol::{InputValues, SensorMode, SensorPort, SensorType};
use serde::{Deserialize, Serialize};

/// The sensors this driver knows how to configure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorKind {
    /// Touch sensor
    Pressure,
    /// Light sensor; `active` turns on its own LED
    Light {
        #[serde(default)]
        active: bool,
    },
    /// Sound sensor, dB(A) when adjusted for the human ear, dB otherwise
    Sound {
        #[serde(default = "default_true")]
        adjust_for_human_ear: bool,
    },
    /// Ultrasonic distance sensor (I2C)
    Sonar,
    /// HiTechnic compass (I2C)
    Compass {
        #[serde(default = "default_true")]
        double_precision: bool,
    },
    /// Unconfigured analog port, raw values only
    Raw,
}

fn default_true() -> bool {
    true
}

impl SensorKind {
    pub fn light() -> Self {
        SensorKind::Light { active: false }
    }

    pub fn sound() -> Self {
        SensorKind::Sound {
            adjust_for_human_ear: true,
        }
    }

    pub fn compass() -> Self {
        SensorKind::Compass {
            double_precision: true,
        }
    }

    pub fn sensor_type(self) -> SensorType {
        match self {
            SensorKind::Pressure => SensorType::Switch,
            SensorKind::Light { active: true } => SensorType::LightActive,
            SensorKind::Light { active: false } => SensorType::LightInactive,
            SensorKind::Sound {
                adjust_for_human_ear: true,
            } => SensorType::SoundDba,
            SensorKind::Sound {
                adjust_for_human_ear: false,
            } => SensorType::SoundDb,
            SensorKind::Sonar | SensorKind::Compass { .. } => SensorType::LowSpeed9V,
            SensorKind::Raw => SensorType::NoSensor,
        }
    }

    pub fn mode(self) -> SensorMode {
        match self {
            SensorKind::Pressure => SensorMode::Boolean,
            SensorKind::Light { .. } | SensorKind::Sound { .. } => SensorMode::Percentage,
            SensorKind::Sonar | SensorKind::Compass { .. } => SensorMode::Raw,
            SensorKind::Raw => SensorMode::Raw,
        }
    }

    /// Read over the low-speed bus instead of GetInputValues
    pub fn is_digital(self) -> bool {
        matches!(self, SensorKind::Sonar | SensorKind::Compass { .. })
    }

    /// Configure the port; digital sensors also flush stale bus data
    pub(crate) fn init(self, comm: &Communicator, port: SensorPort) -> Result<()> {
        comm.set_input_mode(port, self.sensor_type(), self.mode())?;

        match self {
            SensorKind::Sonar => {
                if ready_or_zero(comm.ls_get_status(port))? > 0 {
                    comm.ls_read(port)?;
                }
                comm.i2c_set_byte(port, SonarRegister::Mode.address(), SONAR_MODE_CONTINUOUS)
            }
            SensorKind::Compass { .. } => match comm.ls_read(port) {
                Err(e) if e.is_transient() => {
                    log::debug!("Compass on {:?}: nothing to flush ({})", port, e);
                    Ok(())
                }
                other => other.map(|_| ()),
            },
            _ => Ok(()),
        }
    }

    pub(crate) fn read(self, comm: &Communicator, port: SensorPort) -> Result<Measurement> {
        match self {
            SensorKind::Sonar => {
                let distance = comm.i2c_get_byte(port, SonarRegister::Measurement0.address())?;
                Ok(Measurement::Digital(i32::from(distance)))
            }
            SensorKind::Compass { double_precision } => {
                let mut heading = 2 * i32::from(
                    comm.i2c_get_byte(port, CompassRegister::HeadingTwoDegrees.address())?,
                );
                if double_precision {
                    heading +=
                        i32::from(comm.i2c_get_byte(port, CompassRegister::HeadingAdder.address())?);
                }
                Ok(Measurement::Digital(heading))
            }
            _ => comm.get_input_values(port).map(Measurement::Analog),
        }
    }

    /// What the first reading is compared against
    pub(crate) fn baseline(self) -> Measurement {
        if self.is_digital() {
            Measurement::Digital(0)
        } else {
            Measurement::Analog(InputValues::default())
        }
    }

    /// Whether going from `previous` to `current` is a value change
    pub fn differs(self, previous: &Measurement, current: &Measurement) -> bool {
        match (previous, current) {
            (Measurement::Analog(a), Measurement::Analog(b)) => match self {
                SensorKind::Light { .. } | SensorKind::Sound { .. } => {
                    a.scaled_value != b.scaled_value
                }
                _ => any_field_differs(a, b),
            },
            (Measurement::Digital(a), Measurement::Digital(b)) => a != b,
            _ => true,
        }
    }
}

fn ready_or_zero(status: Result<u8>) -> Result<u8> {
    match status {
        Err(e) if e.is_transient() => Ok(0),
        other => other,
    }
}

fn any_field_differs(a: &InputValues, b: &InputValues) -> bool {
    a.raw_ad != b.raw_ad
        || a.calibrated_value != b.calibrated_value
        || a.normalized_ad != b.normalized_ad
        || a.scaled_value != b.scaled_value
        || a.mode != b.mode
        || a.sensor_type != b.sensor_type
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(scaled: i16, calibrated: i16) -> Measurement {
        Measurement::Analog(InputValues {
            scaled_value: scaled,
            calibrated_value: calibrated,
            ..InputValues::default()
        })
    }

    #[test]
    fn test_type_mode_pairs() {
        assert_eq!(SensorKind::Pressure.sensor_type(), SensorType::Switch);
        assert_eq!(SensorKind::Pressure.mode(), SensorMode::Boolean);
        assert_eq!(SensorKind::light().sensor_type(), SensorType::LightInactive);
        assert_eq!(
            SensorKind::Light { active: true }.sensor_type(),
            SensorType::LightActive
        );
        assert_eq!(SensorKind::sound().sensor_type(), SensorType::SoundDba);
        assert_eq!(
            SensorKind::Sound {
                adjust_for_human_ear: false
            }
            .sensor_type(),
            SensorType::SoundDb
        );
        assert_eq!(SensorKind::Sonar.sensor_type(), SensorType::LowSpeed9V);
        assert_eq!(SensorKind::compass().mode(), SensorMode::Raw);
    }

    #[test]
    fn test_calibrated_only_change() {
        let before = values(10, 100);
        let after = values(10, 101);

        assert!(SensorKind::Pressure.differs(&before, &after));
        assert!(SensorKind::Raw.differs(&before, &after));
        assert!(!SensorKind::light().differs(&before, &after));
        assert!(!SensorKind::sound().differs(&before, &after));
    }

    #[test]
    fn test_scaled_change_counts_everywhere() {
        let before = values(10, 100);
        let after = values(11, 100);
        for kind in [SensorKind::Pressure, SensorKind::light(), SensorKind::sound()] {
            assert!(kind.differs(&before, &after), "{kind:?}");
        }
        assert!(!SensorKind::Pressure.differs(&before, &before));
    }

    #[test]
    fn test_digital_compare() {
        let kind = SensorKind::Sonar;
        assert!(!kind.differs(&kind.baseline(), &Measurement::Digital(0)));
        assert!(kind.differs(&Measurement::Digital(40), &Measurement::Digital(41)));
    }
}
