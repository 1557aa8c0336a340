//! Worker loops: sensor poll scheduler and keep-alive timer

use super::worker::StopSignal;
use super::BrickCore;
use crate::sensor::Sensor;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Poll every sensor whose delay has elapsed, until stopped
///
/// Poll failures are logged and the sensor is retried on its next slot.
pub(super) fn poll_loop(sensors: &[Arc<Sensor>], idle: Duration, signal: &StopSignal) {
    log::debug!("Poll loop started");

    while !signal.is_stopped() {
        let mut polled_any = false;

        for sensor in sensors {
            if signal.is_stopped() {
                break;
            }
            if !sensor.is_due(Instant::now()) {
                continue;
            }

            polled_any = true;
            if let Err(e) = sensor.poll() {
                log::warn!("Polling {:?} on {:?} failed: {}", sensor.kind(), sensor.port(), e);
            }
            thread::yield_now();
        }

        if !polled_any && !signal.wait(idle) {
            break;
        }
    }

    log::debug!("Poll loop exited");
}

/// Send KeepAlive every `interval` while the brick is connected
pub(super) fn keepalive_loop(core: &Weak<BrickCore>, interval: Duration, signal: &StopSignal) {
    while signal.wait(interval) {
        let Some(core) = core.upgrade() else {
            break;
        };
        if !core.online.load(std::sync::atomic::Ordering::Acquire) {
            continue;
        }
        match core.comm.keep_alive() {
            Ok(()) => log::trace!("Keep-alive sent"),
            Err(e) => log::warn!("Keep-alive failed: {}", e),
        }
    }
}
