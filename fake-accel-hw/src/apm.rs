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

use crate::{AccessLog, Device, SimClock};
use accel_interface::RegisterBlock;
use accel_regs::apm::*;
use std::sync::Arc;

// Bytes per AXI burst when counting transactions.
const BURST_BYTES: u32 = 256;

#[derive(Default)]
struct ApmState {
    control: u32,
    counters: [u32; NUM_METRIC_COUNTERS],
    gcc_origin: u64,
    gcc_frozen: u64,
    gcc_latched: u64,
}
impl ApmState {
    fn counting(&self) -> bool { self.control & CONTROL_MCE != 0 }
    fn bump(&mut self, counter: usize, by: u32) {
        self.counters[counter] = self.counters[counter].wrapping_add(by);
    }
}

/// AXI performance monitor attached to one group's data path, or the
/// standalone monitor whose global clock counter timestamps every phase.
pub struct SimApm {
    device: Device,
    clock: Arc<SimClock>,
    state: spin::Mutex<ApmState>,
    log: Arc<AccessLog>,
}
impl SimApm {
    pub fn new(device: Device, clock: &Arc<SimClock>, log: &Arc<AccessLog>) -> Arc<Self> {
        Arc::new(Self {
            device,
            clock: clock.clone(),
            state: spin::Mutex::new(ApmState::default()),
            log: log.clone(),
        })
    }

    pub fn record_read(&self, bytes: u32) {
        let mut state = self.state.lock();
        if state.counting() {
            state.bump(MC_READ_TRANSACTIONS, bursts(bytes));
            state.bump(MC_READ_BYTES, bytes);
        }
    }

    pub fn record_write(&self, bytes: u32) {
        let mut state = self.state.lock();
        if state.counting() {
            state.bump(MC_WRITE_TRANSACTIONS, bursts(bytes));
            state.bump(MC_WRITE_BYTES, bytes);
        }
    }

    pub fn record_stream(&self, bytes: u32) {
        let mut state = self.state.lock();
        if state.counting() {
            state.bump(MC_PACKETS, 1);
            state.bump(MC_BYTES, bytes);
        }
    }

    pub fn counter(&self, index: usize) -> u32 { self.state.lock().counters[index] }

    fn gcc_value(&self, state: &ApmState) -> u64 {
        if state.control & CONTROL_GCC_ENABLE != 0 {
            self.clock.sample() - state.gcc_origin
        } else {
            state.gcc_frozen
        }
    }
}

fn bursts(bytes: u32) -> u32 { bytes.div_ceil(BURST_BYTES) }

impl RegisterBlock for SimApm {
    fn read(&self, offset: usize) -> u32 {
        let mut state = self.state.lock();
        match offset {
            // The upper word latches the full counter for the next lower read.
            GCC_MSW => {
                state.gcc_latched = self.gcc_value(&state);
                (state.gcc_latched >> 32) as u32
            }
            GCC_LSW => state.gcc_latched as u32,
            CONTROL => state.control,
            _ => (0..NUM_METRIC_COUNTERS)
                .find(|i| metric_counter(*i) == offset)
                .map_or(0, |i| state.counters[i]),
        }
    }

    fn write(&self, offset: usize, value: u32) {
        self.log.record(self.device, offset, value);
        if offset != CONTROL {
            return;
        }
        let mut state = self.state.lock();
        if state.control & CONTROL_GCC_ENABLE != 0 && value & CONTROL_GCC_ENABLE == 0 {
            state.gcc_frozen = self.gcc_value(&state);
        }
        if value & CONTROL_MC_RESET != 0 {
            state.counters = [0; NUM_METRIC_COUNTERS];
        }
        if value & CONTROL_GCC_RESET != 0 {
            state.gcc_origin = self.clock.now();
            state.gcc_frozen = 0;
        }
        state.control = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apm() -> Arc<SimApm> { SimApm::new(Device::TimerApm, &SimClock::new(), &AccessLog::new()) }

    fn gcc(apm: &SimApm) -> u64 {
        let hi = apm.read(GCC_MSW) as u64;
        let lo = apm.read(GCC_LSW) as u64;
        (hi << 32) | lo
    }

    #[test]
    fn counters_gated_by_enable() {
        let apm = apm();
        apm.record_read(1000);
        assert_eq!(apm.read(metric_counter(MC_READ_BYTES)), 0);
        apm.write(CONTROL, CONTROL_MCE);
        apm.record_read(1000);
        apm.record_write(256);
        apm.record_stream(1000);
        assert_eq!(apm.read(metric_counter(MC_READ_TRANSACTIONS)), 4);
        assert_eq!(apm.read(metric_counter(MC_READ_BYTES)), 1000);
        assert_eq!(apm.read(metric_counter(MC_WRITE_TRANSACTIONS)), 1);
        assert_eq!(apm.read(metric_counter(MC_PACKETS)), 1);
        apm.write(CONTROL, CONTROL_MC_RESET);
        assert_eq!(apm.counter(MC_BYTES), 0);
    }

    #[test]
    fn gcc_increases_while_enabled() {
        let apm = apm();
        assert_eq!(gcc(&apm), 0);
        apm.write(CONTROL, CONTROL_GCC_ENABLE);
        let a = gcc(&apm);
        let b = gcc(&apm);
        assert!(b > a);
        apm.write(CONTROL, 0);
        let frozen = gcc(&apm);
        assert_eq!(gcc(&apm), frozen);
        apm.write(CONTROL, CONTROL_GCC_RESET);
        assert_eq!(gcc(&apm), 0);
    }
}
