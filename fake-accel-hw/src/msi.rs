// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::{AccessLog, Completion, Device, SimLine};
use accel_interface::RegisterBlock;
use accel_regs::gpio::{GPIO2_DATA, GPIO_DATA};
use log::{trace, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct MsiState {
    trigger: u32,
    vector: u32,
    in_flight: Option<u32>,
    acked: bool,
    pending: HashMap<u32, usize>,
    delivered: Vec<u32>,
    overlaps: usize,
}

/// Host-side MSI delivery behind the trigger/acknowledge GPIO pair. A
/// rising edge on the trigger channel sends the vector held in the second
/// channel; the controller answers on the acknowledge line and stays busy
/// until the acknowledge GPIO is cleared.
pub struct SimMsiController {
    ack_mode: Completion,
    ack_line: Arc<SimLine>,
    state: Mutex<MsiState>,
    cond: Condvar,
}
impl SimMsiController {
    pub fn new(ack_mode: Completion, ack_line: &Arc<SimLine>) -> Arc<Self> {
        Arc::new(Self {
            ack_mode,
            ack_line: ack_line.clone(),
            state: Mutex::new(MsiState::default()),
            cond: Condvar::new(),
        })
    }

    fn trigger(&self, state: &mut MsiState) {
        let vector = state.vector;
        trace!("msi: vector {}", vector);
        if let Some(busy) = state.in_flight {
            warn!("msi: vector {} sent while {} unacknowledged", vector, busy);
            state.overlaps += 1;
        }
        state.in_flight = Some(vector);
        state.acked = false;
        state.delivered.push(vector);
        if self.ack_mode == Completion::Immediate {
            state.acked = true;
            self.ack_line.raise();
        }
        self.cond.notify_all();
    }

    // A vector counts as received once its handshake completes.
    fn clear_ack(&self, state: &mut MsiState) {
        if let (Some(vector), true) = (state.in_flight, state.acked) {
            *state.pending.entry(vector).or_default() += 1;
        }
        state.in_flight = None;
        state.acked = false;
        self.ack_line.lower();
        self.cond.notify_all();
    }

    /// Acknowledges the in-flight vector, waiting up to |timeout| for one.
    /// Only meaningful with manual acknowledgement.
    pub fn acknowledge(&self, timeout: Option<Duration>) -> Option<u32> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if let (Some(vector), false) = (state.in_flight, state.acked) {
                state.acked = true;
                self.ack_line.raise();
                return Some(vector);
            }
            match deadline {
                None => self.cond.wait(&mut state),
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        return None;
                    }
                }
            }
        }
    }

    /// Consumes one completed delivery of |vector|, waiting up to
    /// |timeout|.
    pub fn take_vector(&self, vector: u32, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if let Some(count) = state.pending.get_mut(&vector).filter(|c| **c > 0) {
                *count -= 1;
                return true;
            }
            match deadline {
                None => self.cond.wait(&mut state),
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        return false;
                    }
                }
            }
        }
    }

    /// Drops every received but unconsumed delivery of |vector| and
    /// returns how many there were.
    pub fn discard(&self, vector: u32) -> usize {
        self.state.lock().pending.remove(&vector).unwrap_or(0)
    }

    /// Vectors in delivery order.
    pub fn delivered(&self) -> Vec<u32> { self.state.lock().delivered.clone() }

    /// Triggers observed while a previous vector was unacknowledged.
    pub fn overlaps(&self) -> usize { self.state.lock().overlaps }
}

/// Trigger GPIO: channel 1 is the strobe, channel 2 the vector number.
pub struct MsiTriggerGpio {
    msi: Arc<SimMsiController>,
    log: Arc<AccessLog>,
}
impl MsiTriggerGpio {
    pub fn new(msi: &Arc<SimMsiController>, log: &Arc<AccessLog>) -> Arc<Self> {
        Arc::new(Self {
            msi: msi.clone(),
            log: log.clone(),
        })
    }
}
impl RegisterBlock for MsiTriggerGpio {
    fn read(&self, offset: usize) -> u32 {
        let state = self.msi.state.lock();
        match offset {
            GPIO_DATA => state.trigger,
            GPIO2_DATA => state.vector,
            _ => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        self.log.record(Device::MsiTrigger, offset, value);
        let mut state = self.msi.state.lock();
        match offset {
            GPIO_DATA => {
                let rising = state.trigger == 0 && value != 0;
                state.trigger = value;
                if rising {
                    self.msi.trigger(&mut state);
                }
            }
            GPIO2_DATA => state.vector = value,
            _ => {}
        }
    }
}

/// Acknowledge GPIO: reads 1 while the controller has acknowledged;
/// writing 0 retires the in-flight vector.
pub struct MsiAckGpio {
    msi: Arc<SimMsiController>,
    log: Arc<AccessLog>,
}
impl MsiAckGpio {
    pub fn new(msi: &Arc<SimMsiController>, log: &Arc<AccessLog>) -> Arc<Self> {
        Arc::new(Self {
            msi: msi.clone(),
            log: log.clone(),
        })
    }
}
impl RegisterBlock for MsiAckGpio {
    fn read(&self, offset: usize) -> u32 {
        match offset {
            GPIO_DATA => self.msi.state.lock().acked as u32,
            _ => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        self.log.record(Device::MsiAck, offset, value);
        if offset == GPIO_DATA && value == 0 {
            let mut state = self.msi.state.lock();
            self.msi.clear_ack(&mut state);
        }
    }
}
