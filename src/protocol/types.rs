//! Port addressing, motor/sensor enumerations and decoded reply structs

use std::ops::BitOr;

/// Output port address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorPort {
    A,
    B,
    C,
    /// Not attached
    None,
    /// Broadcast to A, B and C
    All,
}

impl MotorPort {
    /// The three physical output ports, in slot order
    pub const PORTS: [MotorPort; 3] = [MotorPort::A, MotorPort::B, MotorPort::C];

    /// Wire value
    pub const fn code(self) -> u8 {
        match self {
            MotorPort::A => 0x00,
            MotorPort::B => 0x01,
            MotorPort::C => 0x02,
            MotorPort::None => 0xFE,
            MotorPort::All => 0xFF,
        }
    }

    /// Attachment slot index for physical ports
    pub const fn slot(self) -> Option<usize> {
        match self {
            MotorPort::A => Some(0),
            MotorPort::B => Some(1),
            MotorPort::C => Some(2),
            MotorPort::None | MotorPort::All => None,
        }
    }

    /// Parse "A"/"B"/"C" (case-insensitive)
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter.trim().to_ascii_uppercase().as_str() {
            "A" => Some(MotorPort::A),
            "B" => Some(MotorPort::B),
            "C" => Some(MotorPort::C),
            _ => None,
        }
    }
}

/// Input port address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorPort {
    S1,
    S2,
    S3,
    S4,
    /// Not attached
    None,
}

impl SensorPort {
    /// The four physical input ports, in slot order
    pub const PORTS: [SensorPort; 4] = [
        SensorPort::S1,
        SensorPort::S2,
        SensorPort::S3,
        SensorPort::S4,
    ];

    /// Wire value
    pub const fn code(self) -> u8 {
        match self {
            SensorPort::S1 => 0x00,
            SensorPort::S2 => 0x01,
            SensorPort::S3 => 0x02,
            SensorPort::S4 => 0x03,
            SensorPort::None => 0xFE,
        }
    }

    /// Attachment slot index for physical ports
    pub const fn slot(self) -> Option<usize> {
        match self {
            SensorPort::S1 => Some(0),
            SensorPort::S2 => Some(1),
            SensorPort::S3 => Some(2),
            SensorPort::S4 => Some(3),
            SensorPort::None => None,
        }
    }

    /// Parse the number printed on the brick (1-4)
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(SensorPort::S1),
            2 => Some(SensorPort::S2),
            3 => Some(SensorPort::S3),
            4 => Some(SensorPort::S4),
            _ => None,
        }
    }
}

/// Output mode bit set (on / brake / regulated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MotorMode(u8);

impl MotorMode {
    pub const NONE: MotorMode = MotorMode(0x00);
    pub const ON: MotorMode = MotorMode(0x01);
    pub const BRAKE: MotorMode = MotorMode(0x02);
    pub const REGULATED: MotorMode = MotorMode(0x04);

    pub const fn from_bits(bits: u8) -> Self {
        MotorMode(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: MotorMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MotorMode {
    type Output = MotorMode;

    fn bitor(self, rhs: MotorMode) -> MotorMode {
        MotorMode(self.0 | rhs.0)
    }
}

/// Motor regulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RegulationMode {
    #[default]
    Idle,
    /// Hold the requested speed under load
    Speed,
    /// Keep two motors in lock-step (tank drive)
    Sync,
}

impl RegulationMode {
    pub const fn code(self) -> u8 {
        match self {
            RegulationMode::Idle => 0x00,
            RegulationMode::Speed => 0x01,
            RegulationMode::Sync => 0x02,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(RegulationMode::Idle),
            0x01 => Some(RegulationMode::Speed),
            0x02 => Some(RegulationMode::Sync),
            _ => None,
        }
    }
}

/// Motor run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    #[default]
    Idle,
    RampUp,
    Running,
    RampDown,
}

impl RunState {
    pub const fn code(self) -> u8 {
        match self {
            RunState::Idle => 0x00,
            RunState::RampUp => 0x10,
            RunState::Running => 0x20,
            RunState::RampDown => 0x40,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(RunState::Idle),
            0x10 => Some(RunState::RampUp),
            0x20 => Some(RunState::Running),
            0x40 => Some(RunState::RampDown),
            _ => None,
        }
    }
}

/// Sensor type configured on an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SensorType {
    #[default]
    NoSensor,
    Switch,
    Temperature,
    Reflection,
    Angle,
    LightActive,
    LightInactive,
    SoundDb,
    SoundDba,
    Custom,
    LowSpeed,
    LowSpeed9V,
    /// Type codes newer firmware reports (colour sensors etc.)
    Other(u8),
}

impl SensorType {
    pub fn code(self) -> u8 {
        match self {
            SensorType::NoSensor => 0x00,
            SensorType::Switch => 0x01,
            SensorType::Temperature => 0x02,
            SensorType::Reflection => 0x03,
            SensorType::Angle => 0x04,
            SensorType::LightActive => 0x05,
            SensorType::LightInactive => 0x06,
            SensorType::SoundDb => 0x07,
            SensorType::SoundDba => 0x08,
            SensorType::Custom => 0x09,
            SensorType::LowSpeed => 0x0A,
            SensorType::LowSpeed9V => 0x0B,
            SensorType::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => SensorType::NoSensor,
            0x01 => SensorType::Switch,
            0x02 => SensorType::Temperature,
            0x03 => SensorType::Reflection,
            0x04 => SensorType::Angle,
            0x05 => SensorType::LightActive,
            0x06 => SensorType::LightInactive,
            0x07 => SensorType::SoundDb,
            0x08 => SensorType::SoundDba,
            0x09 => SensorType::Custom,
            0x0A => SensorType::LowSpeed,
            0x0B => SensorType::LowSpeed9V,
            other => SensorType::Other(other),
        }
    }
}

/// Value scaling applied by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SensorMode {
    #[default]
    Raw,
    Boolean,
    TransitionCounter,
    PeriodCounter,
    Percentage,
    Celsius,
    Fahrenheit,
    AngleStep,
    Other(u8),
}

impl SensorMode {
    pub fn code(self) -> u8 {
        match self {
            SensorMode::Raw => 0x00,
            SensorMode::Boolean => 0x20,
            SensorMode::TransitionCounter => 0x40,
            SensorMode::PeriodCounter => 0x60,
            SensorMode::Percentage => 0x80,
            SensorMode::Celsius => 0xA0,
            SensorMode::Fahrenheit => 0xC0,
            SensorMode::AngleStep => 0xE0,
            SensorMode::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => SensorMode::Raw,
            0x20 => SensorMode::Boolean,
            0x40 => SensorMode::TransitionCounter,
            0x60 => SensorMode::PeriodCounter,
            0x80 => SensorMode::Percentage,
            0xA0 => SensorMode::Celsius,
            0xC0 => SensorMode::Fahrenheit,
            0xE0 => SensorMode::AngleStep,
            other => SensorMode::Other(other),
        }
    }
}

/// Parameters of a SetOutputState frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCommand {
    /// -100..=100, sign is direction
    pub power: i8,
    pub mode: MotorMode,
    pub regulation: RegulationMode,
    /// -100..=100, only meaningful with [`RegulationMode::Sync`]
    pub turn_ratio: i8,
    pub run_state: RunState,
    /// Degrees to run; 0 runs forever
    pub tacho_limit: u32,
}

impl OutputCommand {
    /// Power off, no regulation
    pub const fn coast() -> Self {
        Self {
            power: 0,
            mode: MotorMode::NONE,
            regulation: RegulationMode::Idle,
            turn_ratio: 0,
            run_state: RunState::Idle,
            tacho_limit: 0,
        }
    }
}

/// Decoded GetOutputState reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputState {
    pub port: u8,
    pub power: i8,
    pub mode: MotorMode,
    pub regulation: RegulationMode,
    pub turn_ratio: i8,
    pub run_state: RunState,
    pub tacho_limit: u32,
    /// Count since the last motor command
    pub tacho_count: i32,
    /// Count since the last relative reset
    pub block_tacho_count: i32,
    /// Count since the last absolute reset
    pub rotation_count: i32,
}

/// Decoded GetInputValues reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputValues {
    pub valid: bool,
    pub calibrated: bool,
    pub sensor_type: SensorType,
    pub mode: SensorMode,
    pub raw_ad: u16,
    pub normalized_ad: u16,
    pub scaled_value: i16,
    pub calibrated_value: i16,
}
