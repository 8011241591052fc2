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

use crate::{AccessLog, Completion, Device, SimBus, SimClock, SimLine};
use accel_interface::RegisterBlock;
use accel_regs::cdma::*;
use accel_regs::{IRQ_ALL_MASK, IRQ_ERROR, IRQ_IOC};
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CDMASR_IDLE: u32 = 0x2;
const CDMASR_SLV_ERR: u32 = 0x20;

#[derive(Clone, Copy, Debug)]
struct Transfer {
    source: u64,
    destination: u64,
    length: u32,
}

struct CdmaState {
    cr: u32,
    sr: u32,
    sa: u32,
    sa_msb: u32,
    da: u32,
    da_msb: u32,
    btt: u32,
    pending: Option<Transfer>,
    fail_next: bool,
    completed: u64,
}
impl Default for CdmaState {
    fn default() -> Self {
        Self {
            cr: 0,
            sr: CDMASR_IDLE,
            sa: 0,
            sa_msb: 0,
            da: 0,
            da_msb: 0,
            btt: 0,
            pending: None,
            fail_next: false,
            completed: 0,
        }
    }
}

/// AXI central DMA moving data between host memory (possibly behind the
/// PCIe bridge) and FPGA staging memory. Writing BTT starts the copy.
pub struct SimCdma {
    device: Device,
    completion: Completion,
    bus: Arc<SimBus>,
    clock: Arc<SimClock>,
    line: Arc<SimLine>,
    state: Mutex<CdmaState>,
    kicked: Condvar,
    log: Arc<AccessLog>,
}
impl SimCdma {
    pub fn new(
        device: Device,
        completion: Completion,
        bus: &Arc<SimBus>,
        clock: &Arc<SimClock>,
        line: &Arc<SimLine>,
        log: &Arc<AccessLog>,
    ) -> Arc<Self> {
        Arc::new(Self {
            device,
            completion,
            bus: bus.clone(),
            clock: clock.clone(),
            line: line.clone(),
            state: Mutex::new(CdmaState::default()),
            kicked: Condvar::new(),
            log: log.clone(),
        })
    }

    fn update_line(&self, state: &CdmaState) {
        if state.sr & state.cr & IRQ_ALL_MASK != 0 {
            if !self.line.level() {
                self.line.raise();
            }
        } else {
            self.line.lower();
        }
    }

    fn complete(&self, state: &mut CdmaState) {
        let Some(transfer) = state.pending.take() else {
            return;
        };
        trace!(
            "{:?}: {:#x} -> {:#x} len {}",
            self.device,
            transfer.source,
            transfer.destination,
            transfer.length
        );
        if core::mem::take(&mut state.fail_next) {
            state.sr |= IRQ_ERROR | CDMASR_SLV_ERR;
        } else {
            let data = self.bus.memory.read(transfer.source, transfer.length as usize);
            self.bus.memory.write(transfer.destination, &data);
            self.clock.advance(transfer.length as u64 / 4);
            state.sr |= IRQ_IOC;
        }
        state.sr |= CDMASR_IDLE;
        state.completed += 1;
        self.update_line(state);
    }

    /// Completes the pending copy, waiting up to |timeout| for one to be
    /// started. Only meaningful in manual mode.
    pub fn fire(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        while state.pending.is_none() {
            match deadline {
                None => self.kicked.wait(&mut state),
                Some(deadline) => {
                    if self.kicked.wait_until(&mut state, deadline).timed_out() {
                        return false;
                    }
                }
            }
        }
        self.complete(&mut state);
        true
    }

    pub fn fail_next(&self) { self.state.lock().fail_next = true; }

    pub fn completed(&self) -> u64 { self.state.lock().completed }
}

impl RegisterBlock for SimCdma {
    fn read(&self, offset: usize) -> u32 {
        let state = self.state.lock();
        match offset {
            CDMACR => state.cr,
            CDMASR => state.sr,
            SA => state.sa,
            SA_MSB => state.sa_msb,
            DA => state.da,
            DA_MSB => state.da_msb,
            BTT => state.btt,
            _ => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        self.log.record(self.device, offset, value);
        let mut state = self.state.lock();
        match offset {
            CDMACR => {
                if value & CDMACR_RESET != 0 {
                    // Reset self-clears and leaves interrupts disabled.
                    *state = CdmaState {
                        completed: state.completed,
                        ..Default::default()
                    };
                } else {
                    state.cr = value;
                }
                self.update_line(&state);
            }
            CDMASR => {
                state.sr &= !(value & IRQ_ALL_MASK);
                self.update_line(&state);
            }
            SA => state.sa = value,
            SA_MSB => state.sa_msb = value,
            DA => state.da = value,
            DA_MSB => state.da_msb = value,
            BTT => {
                state.btt = value;
                state.sr &= !CDMASR_IDLE;
                let source = ((state.sa_msb as u64) << 32) | state.sa as u64;
                let destination = ((state.da_msb as u64) << 32) | state.da as u64;
                state.pending = Some(Transfer {
                    source: self.bus.resolve(source),
                    destination: self.bus.resolve(destination),
                    length: value,
                });
                self.kicked.notify_all();
                if self.completion == Completion::Immediate {
                    self.complete(&mut state);
                }
            }
            _ => {}
        }
    }
}
