//! Simulated brick for integration tests
//!
//! Wraps a `MockTransport` with a responder that answers every
//! reply-expecting telegram the way firmware 1.x does.

#![allow(dead_code)]

use nxt_link::protocol::{Frame, InputValues, Opcode};
use nxt_link::MockTransport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct SimState {
    pub inputs: [InputValues; 4],
    pub battery_mv: u16,
    /// I2C register contents, per sensor port
    pub registers: HashMap<(u8, u8), u8>,
    /// Register requested by the last LSWrite with a read-back, per port
    pub pending_read: HashMap<u8, u8>,
    /// Opcodes answered with this status instead of success
    pub failures: HashMap<u8, u8>,
    pub mailbox: Vec<u8>,
}

#[derive(Clone)]
pub struct SimBrick {
    pub mock: MockTransport,
    pub state: Arc<Mutex<SimState>>,
}

impl SimBrick {
    pub fn new() -> Self {
        let mock = MockTransport::named("sim");
        let state = Arc::new(Mutex::new(SimState {
            battery_mv: 7900,
            ..SimState::default()
        }));

        let shared = Arc::clone(&state);
        mock.set_responder(move |frame| Some(respond(&mut shared.lock(), frame)));

        Self { mock, state }
    }

    pub fn set_input(&self, port_code: u8, values: InputValues) {
        self.state.lock().inputs[port_code as usize] = values;
    }

    pub fn set_register(&self, port_code: u8, register: u8, value: u8) {
        self.state.lock().registers.insert((port_code, register), value);
    }

    pub fn fail(&self, opcode: Opcode, status: u8) {
        self.state.lock().failures.insert(opcode.code(), status);
    }

    pub fn frames_with(&self, opcode: Opcode) -> Vec<Frame> {
        self.mock
            .frames()
            .into_iter()
            .filter(|f| f.opcode == opcode.code())
            .collect()
    }

    pub fn count(&self, opcode: Opcode) -> usize {
        self.mock.count_opcode(opcode.code())
    }
}

fn respond(state: &mut SimState, frame: &Frame) -> Vec<u8> {
    if let Some(&status) = state.failures.get(&frame.opcode) {
        return MockTransport::status_reply(frame.opcode, status, &[]);
    }

    let payload = match Opcode::from_code(frame.opcode) {
        Some(Opcode::GetInputValues) => {
            let port = frame.payload[0];
            input_payload(port, &state.inputs[port as usize])
        }
        Some(Opcode::GetOutputState) => {
            let mut payload = vec![frame.payload[0], 0, 0, 0, 0, 0];
            payload.extend_from_slice(&0u32.to_le_bytes());
            payload.extend_from_slice(&90i32.to_le_bytes());
            payload.extend_from_slice(&180i32.to_le_bytes());
            payload.extend_from_slice(&360i32.to_le_bytes());
            payload
        }
        Some(Opcode::GetBatteryLevel) => state.battery_mv.to_le_bytes().to_vec(),
        Some(Opcode::KeepAlive) => vec![0x60, 0xEA, 0x00, 0x00],
        Some(Opcode::LsWrite) => {
            let port = frame.payload[0];
            let rx_len = frame.payload[2];
            if rx_len > 0 {
                state.pending_read.insert(port, frame.payload[4]);
            }
            Vec::new()
        }
        Some(Opcode::LsGetStatus) => {
            let port = frame.payload[0];
            vec![u8::from(state.pending_read.contains_key(&port))]
        }
        Some(Opcode::LsRead) => {
            let port = frame.payload[0];
            let mut payload = match state.pending_read.remove(&port) {
                Some(register) => {
                    let value = state.registers.get(&(port, register)).copied().unwrap_or(0);
                    vec![1, value]
                }
                None => vec![0],
            };
            payload.resize(17, 0);
            payload
        }
        Some(Opcode::MessageRead) => {
            let mut payload = vec![frame.payload[1], state.mailbox.len() as u8];
            payload.extend_from_slice(&state.mailbox);
            payload.resize(61, 0);
            payload
        }
        _ => Vec::new(),
    };

    MockTransport::ok_reply(frame.opcode, &payload)
}

pub fn input_payload(port: u8, values: &InputValues) -> Vec<u8> {
    let mut payload = vec![
        port,
        u8::from(values.valid),
        u8::from(values.calibrated),
        values.sensor_type.code(),
        values.mode.code(),
    ];
    payload.extend_from_slice(&values.raw_ad.to_le_bytes());
    payload.extend_from_slice(&values.normalized_ad.to_le_bytes());
    payload.extend_from_slice(&values.scaled_value.to_le_bytes());
    payload.extend_from_slice(&values.calibrated_value.to_le_bytes());
    payload
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
