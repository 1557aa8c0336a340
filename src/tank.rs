//! Two synchronized motors driving a tracked or differential chassis

use crate::error::{Error, Result};
use crate::motor::Motor;
use crate::protocol::{MotorMode, OutputCommand, RegulationMode, RunState};
use std::sync::Arc;

/// Turn ratio sent by [`TankDrive::turn_left`]
pub const TURN_LEFT_RATIO: i8 = -100;

/// Turn ratio sent by [`TankDrive::turn_right`]
pub const TURN_RIGHT_RATIO: i8 = 100;

/// Pair of motors moved in lock-step
#[derive(Debug, Default, Clone)]
pub struct TankDrive {
    left: Option<Arc<Motor>>,
    right: Option<Arc<Motor>>,
}

impl TankDrive {
    pub fn new(left: Arc<Motor>, right: Arc<Motor>) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
        }
    }

    pub fn left(&self) -> Option<&Arc<Motor>> {
        self.left.as_ref()
    }

    pub fn right(&self) -> Option<&Arc<Motor>> {
        self.right.as_ref()
    }

    pub fn set_left(&mut self, motor: Option<Arc<Motor>>) {
        self.left = motor;
    }

    pub fn set_right(&mut self, motor: Option<Arc<Motor>>) {
        self.right = motor;
    }

    fn motors(&self) -> Result<[&Arc<Motor>; 2]> {
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => Ok([left, right]),
            _ => Err(Error::NotAttached("tank drive needs two motors")),
        }
    }

    /// Drive forward; the sign of `power` is ignored
    pub fn move_forward(&self, power: i8, tacho_limit: u32) -> Result<()> {
        self.move_by(power.saturating_abs(), tacho_limit)
    }

    /// Drive backward; the sign of `power` is ignored
    pub fn move_back(&self, power: i8, tacho_limit: u32) -> Result<()> {
        self.move_by(-power.saturating_abs(), tacho_limit)
    }

    /// Drive straight, negative power reverses
    pub fn move_by(&self, power: i8, tacho_limit: u32) -> Result<()> {
        self.turn(power, tacho_limit, 0)
    }

    /// Spin left on the spot
    pub fn turn_left(&self, power: i8, tacho_limit: u32) -> Result<()> {
        self.turn(power, tacho_limit, TURN_LEFT_RATIO)
    }

    /// Spin right on the spot
    pub fn turn_right(&self, power: i8, tacho_limit: u32) -> Result<()> {
        self.turn(power, tacho_limit, TURN_RIGHT_RATIO)
    }

    /// Synchronized move with a turn ratio (-100..=100)
    ///
    /// Block counters are reset first so both motors share the same origin.
    pub fn turn(&self, power: i8, tacho_limit: u32, turn_ratio: i8) -> Result<()> {
        let motors = self.motors()?;
        self.reset(true)?;

        let output = OutputCommand {
            power,
            mode: MotorMode::ON | MotorMode::BRAKE | MotorMode::REGULATED,
            regulation: RegulationMode::Sync,
            turn_ratio,
            run_state: RunState::Running,
            tacho_limit,
        };
        for motor in motors {
            motor.set_output_state(output)?;
        }
        Ok(())
    }

    pub fn coast(&self) -> Result<()> {
        for motor in self.motors()? {
            motor.coast()?;
        }
        Ok(())
    }

    pub fn brake(&self) -> Result<()> {
        for motor in self.motors()? {
            motor.brake()?;
        }
        Ok(())
    }

    pub fn reset(&self, relative: bool) -> Result<()> {
        for motor in self.motors()? {
            motor.reset_position(relative)?;
        }
        Ok(())
    }
}
