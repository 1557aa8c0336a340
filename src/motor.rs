//! Motor attached to a brick output port
//!
//! A motor is stateless on the host: every call sends one SetOutputState
//! frame. The flip flag mirrors power and turn ratio for motors mounted the
//! other way round.

use crate::brick::{Brick, BrickCore};
use crate::error::{Error, Result};
use crate::protocol::{MotorMode, MotorPort, OutputCommand, OutputState, RegulationMode, RunState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// A motor handle; attach it to a brick with [`Brick::attach_motor`]
pub struct Motor {
    pub(crate) brick: Mutex<Weak<BrickCore>>,
    flip: AtomicBool,
}

impl Motor {
    pub fn new() -> Self {
        Self {
            brick: Mutex::new(Weak::new()),
            flip: AtomicBool::new(false),
        }
    }

    /// A motor whose direction is inverted
    pub fn flipped() -> Self {
        let motor = Self::new();
        motor.set_flip(true);
        motor
    }

    pub fn is_flipped(&self) -> bool {
        self.flip.load(Ordering::Relaxed)
    }

    pub fn set_flip(&self, flip: bool) {
        self.flip.store(flip, Ordering::Relaxed);
    }

    fn core(&self) -> Option<Arc<BrickCore>> {
        self.brick.lock().upgrade()
    }

    pub fn brick(&self) -> Option<Brick> {
        self.core().map(Brick::from_core)
    }

    /// Port found by scanning the owning brick's slots
    pub fn port(&self) -> MotorPort {
        self.core()
            .map_or(MotorPort::None, |core| core.motor_port_of(self))
    }

    fn target(&self) -> Result<(Arc<BrickCore>, MotorPort)> {
        let core = self
            .core()
            .ok_or(Error::NotAttached("motor is not connected to a brick"))?;
        let port = core.motor_port_of(self);
        if port == MotorPort::None {
            return Err(Error::NotAttached("motor has no port"));
        }
        Ok((core, port))
    }

    /// Send a raw output frame to this motor's port, applying flip
    pub fn set_output_state(&self, mut output: OutputCommand) -> Result<()> {
        let (core, port) = self.target()?;
        if self.is_flipped() {
            output.power = output.power.saturating_neg();
            output.turn_ratio = output.turn_ratio.saturating_neg();
        }
        log::debug!("Motor {:?}: {:?}", port, output);
        core.communicator().set_output_state(port, output)
    }

    /// Run at `speed` (-100..=100) for `degrees`; 0 runs until told otherwise
    ///
    /// The brick coasts to a stop once the limit is reached, usually 10-30°
    /// past it.
    pub fn turn(&self, speed: i8, degrees: u32) -> Result<()> {
        self.set_output_state(OutputCommand {
            power: speed,
            mode: MotorMode::ON | MotorMode::REGULATED,
            regulation: RegulationMode::Speed,
            turn_ratio: 0,
            run_state: RunState::Running,
            tacho_limit: degrees,
        })
    }

    /// Cut power and let the motor spin down
    pub fn coast(&self) -> Result<()> {
        self.set_output_state(OutputCommand::coast())
    }

    /// Actively hold the current position
    pub fn brake(&self) -> Result<()> {
        self.set_output_state(OutputCommand {
            power: 0,
            mode: MotorMode::ON | MotorMode::BRAKE | MotorMode::REGULATED,
            regulation: RegulationMode::Speed,
            turn_ratio: 0,
            run_state: RunState::Running,
            tacho_limit: 0,
        })
    }

    pub fn reset_position(&self, relative: bool) -> Result<()> {
        let (core, port) = self.target()?;
        core.communicator().reset_motor_position(port, relative)
    }

    /// Live output state (tacho counters etc.)
    pub fn output_state(&self) -> Result<OutputState> {
        let (core, port) = self.target()?;
        core.communicator().get_output_state(port)
    }
}

impl Default for Motor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Motor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Motor")
            .field("port", &self.port())
            .field("flip", &self.is_flipped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_without_brick_fail() {
        let motor = Motor::new();
        assert!(matches!(motor.turn(50, 0), Err(Error::NotAttached(_))));
        assert!(matches!(motor.coast(), Err(Error::NotAttached(_))));
        assert!(matches!(motor.output_state(), Err(Error::NotAttached(_))));
        assert_eq!(motor.port(), MotorPort::None);
        assert!(motor.brick().is_none());
    }

    #[test]
    fn test_flip_flag() {
        let motor = Motor::flipped();
        assert!(motor.is_flipped());
        motor.set_flip(false);
        assert!(!motor.is_flipped());
    }
}
