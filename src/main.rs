//! nxt-link - command-line access to a LEGO NXT brick over serial
//!
//! ```bash
//! nxt-link --port /dev/rfcomm0 battery
//! nxt-link --config nxt-link.toml monitor
//! nxt-link turn --motor B --speed -50 --degrees 360
//! ```

use clap::{Parser, Subcommand};
use nxt_link::config::AppConfig;
use nxt_link::protocol::MotorPort;
use nxt_link::sensor::SensorEvent;
use nxt_link::{Brick, Error, Motor, Result, SerialTransport};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "nxt-link")]
#[command(about = "Drive a LEGO NXT brick over a serial/Bluetooth link", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overrides the configuration file
    #[arg(short, long)]
    port: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the battery voltage
    Battery,
    /// Poll the configured sensors and log every change until Ctrl-C
    Monitor,
    /// Run a motor
    Turn {
        /// Output port letter (A, B, C)
        #[arg(short, long)]
        motor: String,
        /// Power, -100..=100
        #[arg(short, long, default_value_t = 75, allow_negative_numbers = true)]
        speed: i8,
        /// Degrees to turn, 0 = until stopped
        #[arg(short, long, default_value_t = 0)]
        degrees: u32,
    },
    /// Let a motor spin down
    Coast {
        #[arg(short, long)]
        motor: String,
    },
    /// Hold a motor in place
    Brake {
        #[arg(short, long)]
        motor: String,
    },
    /// Rename the brick (14 characters max)
    Rename { name: String },
    /// Send a text message to a mailbox
    Send {
        #[arg(short, long)]
        mailbox: u8,
        text: String,
    },
    /// Read a text message from a mailbox
    Receive {
        #[arg(short, long)]
        mailbox: u8,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match AppConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };
    if let Some(port) = &cli.port {
        config.connection.port = port.clone();
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    if let Err(e) = run(&cli.command, &config) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn open_brick(config: &AppConfig) -> Brick {
    log::info!(
        "Using {} at {} baud",
        config.connection.port,
        config.connection.baud_rate
    );
    let transport = SerialTransport::new(&config.connection.port, config.connection.baud_rate);
    Brick::with_settings(transport, config.brick_settings())
}

fn run(command: &Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Battery => {
            let brick = open_brick(config);
            brick.connect()?;
            let millivolts = brick.battery_level()?;
            println!("Battery: {} mV", millivolts);
            brick.disconnect()
        }
        Command::Monitor => monitor(config),
        Command::Turn {
            motor,
            speed,
            degrees,
        } => with_motor(config, motor, |m| m.turn(*speed, *degrees)),
        Command::Coast { motor } => with_motor(config, motor, Motor::coast),
        Command::Brake { motor } => with_motor(config, motor, Motor::brake),
        Command::Rename { name } => {
            let brick = open_brick(config);
            brick.connect()?;
            brick.set_name(name)?;
            log::info!("Brick renamed to {:?}", name);
            brick.disconnect()
        }
        Command::Send { mailbox, text } => {
            let brick = open_brick(config);
            brick.connect()?;
            brick.communicator().message_write_str(*mailbox, text)?;
            brick.disconnect()
        }
        Command::Receive { mailbox } => {
            let brick = open_brick(config);
            brick.connect()?;
            let text = brick.communicator().message_read_string(*mailbox)?;
            println!("{}", text);
            brick.disconnect()
        }
    }
}

fn with_motor<F>(config: &AppConfig, letter: &str, action: F) -> Result<()>
where
    F: FnOnce(&Motor) -> Result<()>,
{
    let port = MotorPort::from_letter(letter)
        .ok_or_else(|| Error::InvalidParameter(format!("unknown motor port '{}'", letter)))?;
    let flip = config
        .motors
        .iter()
        .any(|m| m.flip && m.motor_port().ok() == Some(port));

    let brick = open_brick(config);
    let motor = Arc::new(Motor::new());
    motor.set_flip(flip);
    brick.attach_motor(port, &motor)?;

    brick.connect()?;
    action(&motor)?;
    brick.disconnect()
}

fn monitor(config: &AppConfig) -> Result<()> {
    let brick = open_brick(config);
    config.attach_devices(&brick)?;
    brick.set_auto_poll(true);

    for sensor in brick.sensors() {
        let kind = sensor.kind();
        sensor.subscribe(SensorEvent::ValueChanged, move |update| {
            log::info!("{:?} {:?}: {:?}", update.port, kind, update.current.measurement);
        });
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| Error::Other(format!("failed to install Ctrl-C handler: {}", e)))?;

    brick.connect()?;
    if !brick.is_polling() {
        log::warn!("No sensors with auto_poll configured; nothing to monitor");
    }

    log::info!("Monitoring, press Ctrl-C to stop");
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutting down");
    brick.disconnect()
}
