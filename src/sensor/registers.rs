//! I2C register maps of the digital sensors

/// LEGO ultrasonic sensor registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SonarRegister {
    MeasurementUnits = 0x14,
    PollInterval = 0x40,
    Mode = 0x41,
    /// Distance in cm (first echo)
    Measurement0 = 0x42,
    Measurement1 = 0x43,
    Measurement2 = 0x44,
    Measurement3 = 0x45,
    Measurement4 = 0x46,
    Measurement5 = 0x47,
    Measurement6 = 0x48,
}

impl SonarRegister {
    pub const fn address(self) -> u8 {
        self as u8
    }
}

/// Value for [`SonarRegister::Mode`]: measure continuously
pub const SONAR_MODE_CONTINUOUS: u8 = 0x02;

/// HiTechnic compass registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompassRegister {
    SensorVersion = 0x00,
    Manufacturer = 0x08,
    SensorType = 0x10,
    ModeControl = 0x41,
    /// Heading / 2 (0-179)
    HeadingTwoDegrees = 0x42,
    /// Add to 2 × HeadingTwoDegrees for 1° resolution
    HeadingAdder = 0x43,
    HeadingWord = 0x44,
}

impl CompassRegister {
    pub const fn address(self) -> u8 {
        self as u8
    }
}
