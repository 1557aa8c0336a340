//! nxt-link - host-side driver for the LEGO Mindstorms NXT brick
//!
//! Talks the NXT direct-command protocol over a serial link (USB virtual COM
//! port or Bluetooth SPP):
//!
//! - [`protocol`]: telegram encoding and reply decoding
//! - [`Communicator`]: one-request-at-a-time command engine, I2C and mailbox helpers
//! - [`Brick`]: motor/sensor slots, connection lifecycle, keep-alive and sensor polling
//! - [`Motor`], [`Sensor`], [`TankDrive`]: device handles
//!
//! ```no_run
//! use nxt_link::{Brick, Motor, SerialTransport};
//! use nxt_link::protocol::MotorPort;
//! use std::sync::Arc;
//!
//! let brick = Brick::new(SerialTransport::new("/dev/rfcomm0", 115200));
//! let motor = Arc::new(Motor::new());
//! brick.attach_motor(MotorPort::B, &motor)?;
//! brick.connect()?;
//! motor.turn(50, 360)?;
//! # Ok::<(), nxt_link::Error>(())
//! ```

pub mod brick;
pub mod communicator;
pub mod config;
pub mod error;
pub mod events;
pub mod motor;
pub mod protocol;
pub mod sensor;
pub mod tank;
pub mod transport;

// Re-export commonly used types
pub use brick::{Brick, BrickEvent, BrickSettings};
pub use communicator::{Communicator, CommunicatorSettings};
pub use error::{Error, Result};
pub use events::SubscriptionId;
pub use motor::Motor;
pub use sensor::{Sensor, SensorEvent, SensorKind};
pub use tank::TankDrive;
pub use transport::{MockTransport, SerialTransport, Transport};
