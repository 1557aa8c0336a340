mod common;

use common::SimBrick;
use nxt_link::protocol::{InputValues, MotorPort, OutputCommand, SensorPort};
use nxt_link::{Communicator, Error};
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_requests_never_interleave() {
    let sim = SimBrick::new();
    for (code, scaled) in [(0u8, 100i16), (1, 200), (2, 300), (3, 400)] {
        sim.set_input(
            code,
            InputValues {
                scaled_value: scaled,
                ..InputValues::default()
            },
        );
    }

    let comm = Arc::new(Communicator::new(sim.mock.clone()));
    comm.connect().unwrap();

    let handles: Vec<_> = SensorPort::PORTS
        .into_iter()
        .enumerate()
        .map(|(i, port)| {
            let comm = Arc::clone(&comm);
            thread::spawn(move || {
                for _ in 0..50 {
                    let values = comm.get_input_values(port).unwrap();
                    assert_eq!(values.scaled_value, (i as i16 + 1) * 100);
                    comm.set_output_state(MotorPort::A, OutputCommand::coast())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(sim.mock.overlapping_writes(), 0);
    assert_eq!(sim.mock.frames().len(), 4 * 50 * 2);
}

#[test]
fn not_connected_performs_no_writes() {
    let sim = SimBrick::new();
    let comm = Communicator::new(sim.mock.clone());

    assert!(matches!(
        comm.set_output_state(MotorPort::B, OutputCommand::coast()),
        Err(Error::NotConnected)
    ));
    assert!(matches!(comm.get_battery_level(), Err(Error::NotConnected)));
    assert!(matches!(
        comm.i2c_get_byte(SensorPort::S4, 0x42),
        Err(Error::NotConnected)
    ));
    assert!(sim.mock.get_written().is_empty());
}

#[test]
fn brick_name_is_truncated_on_the_wire() {
    let sim = SimBrick::new();
    let comm = Communicator::new(sim.mock.clone());
    comm.connect().unwrap();

    comm.set_brick_name("ThisNameIsWayTooLongForTheDevice").unwrap();

    let mut expected = vec![0x12, 0x00, 0x81, 0x98];
    expected.extend_from_slice(b"ThisNameIsWayT");
    expected.extend_from_slice(&[0, 0]);
    assert_eq!(sim.mock.get_written(), expected);
}

#[test]
fn mailbox_round_trip_through_sim() {
    let sim = SimBrick::new();
    sim.state.lock().mailbox = b"pong\0".to_vec();
    let comm = Communicator::new(sim.mock.clone());
    comm.connect().unwrap();

    comm.message_write_str(1, "ping").unwrap();
    assert_eq!(comm.message_read_string(1).unwrap(), "pong");

    let frames = sim.mock.frames();
    assert_eq!(frames[0].payload, b"\x01\x05ping\x00".to_vec());
    assert_eq!(frames[1].payload, vec![11, 11, 1]);
}

#[test]
fn output_state_decodes_counters() {
    let sim = SimBrick::new();
    let comm = Communicator::new(sim.mock.clone());
    comm.connect().unwrap();

    let state = comm.get_output_state(MotorPort::C).unwrap();
    assert_eq!(state.port, 2);
    assert_eq!(state.tacho_count, 90);
    assert_eq!(state.block_tacho_count, 180);
    assert_eq!(state.rotation_count, 360);
}

#[test]
fn port_name_comes_from_transport() {
    let sim = SimBrick::new();
    let comm = Communicator::new(sim.mock.clone());
    assert_eq!(comm.port_name(), "sim");
}
