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

use crate::{AccessLog, Completion, Device, SimApm, SimBus, SimClock, SimLine, SimSobel};
use accel_interface::RegisterBlock;
use accel_regs::axi_dma::*;
use accel_regs::{IRQ_ERROR, IRQ_IOC, IRQ_ALL_MASK};
use log::{trace, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DMASR_SLV_ERR: u32 = 0x20;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Channel {
    Mm2s,
    S2mm,
}

#[derive(Clone, Copy, Debug)]
struct Kick {
    // Already translated through the PCIe bridge.
    address: u64,
    length: u32,
}

struct ChannelState {
    cr: u32,
    sr: u32,
    address: u32,
    address_msb: u32,
    length: u32,
    pending: Option<Kick>,
    fail_next: bool,
    completed: u64,
}
impl Default for ChannelState {
    fn default() -> Self {
        Self {
            cr: 0,
            sr: DMASR_HALTED,
            address: 0,
            address_msb: 0,
            length: 0,
            pending: None,
            fail_next: false,
            completed: 0,
        }
    }
}

#[derive(Default)]
struct DmaState {
    mm2s: ChannelState,
    s2mm: ChannelState,
    stream: VecDeque<u8>,
}
impl DmaState {
    fn channel(&mut self, channel: Channel) -> &mut ChannelState {
        match channel {
            Channel::Mm2s => &mut self.mm2s,
            Channel::S2mm => &mut self.s2mm,
        }
    }
}

#[derive(Clone, Copy)]
enum Field {
    Control,
    Status,
    Address,
    AddressMsb,
    Length,
}

fn decode(offset: usize) -> Option<(Channel, Field)> {
    [(Channel::Mm2s, MM2S), (Channel::S2mm, S2MM)]
        .iter()
        .find_map(|(channel, regs)| {
            let field = match offset {
                o if o == regs.control => Field::Control,
                o if o == regs.status => Field::Status,
                o if o == regs.address => Field::Address,
                o if o == regs.address_msb => Field::AddressMsb,
                o if o == regs.length => Field::Length,
                _ => return None,
            };
            Some((*channel, field))
        })
}

/// AXI DMA in direct-register mode. MM2S reads memory into the stream
/// (through the Sobel core when it is started); S2MM drains the stream
/// into memory. Writing a channel's LENGTH register starts it.
pub struct SimDma {
    device: Device,
    completion: Completion,
    bus: Arc<SimBus>,
    clock: Arc<SimClock>,
    apm: Arc<SimApm>,
    sobel: Option<Arc<SimSobel>>,
    mm2s_line: Arc<SimLine>,
    s2mm_line: Arc<SimLine>,
    state: Mutex<DmaState>,
    kicked: Condvar,
    log: Arc<AccessLog>,
}
impl SimDma {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: Device,
        completion: Completion,
        bus: &Arc<SimBus>,
        clock: &Arc<SimClock>,
        apm: &Arc<SimApm>,
        sobel: Option<&Arc<SimSobel>>,
        mm2s_line: &Arc<SimLine>,
        s2mm_line: &Arc<SimLine>,
        log: &Arc<AccessLog>,
    ) -> Arc<Self> {
        Arc::new(Self {
            device,
            completion,
            bus: bus.clone(),
            clock: clock.clone(),
            apm: apm.clone(),
            sobel: sobel.cloned(),
            mm2s_line: mm2s_line.clone(),
            s2mm_line: s2mm_line.clone(),
            state: Mutex::new(DmaState::default()),
            kicked: Condvar::new(),
            log: log.clone(),
        })
    }

    fn line(&self, channel: Channel) -> &SimLine {
        match channel {
            Channel::Mm2s => &self.mm2s_line,
            Channel::S2mm => &self.s2mm_line,
        }
    }

    fn update_line(&self, state: &mut DmaState, channel: Channel) {
        let ch = state.channel(channel);
        let line = self.line(channel);
        if ch.sr & ch.cr & IRQ_ALL_MASK != 0 {
            if !line.level() {
                line.raise();
            }
        } else {
            line.lower();
        }
    }

    fn finish(&self, state: &mut DmaState, channel: Channel, failed: bool) {
        let ch = state.channel(channel);
        ch.sr |= DMASR_IDLE;
        if failed {
            ch.sr |= IRQ_ERROR | DMASR_SLV_ERR | DMASR_HALTED;
        } else {
            ch.sr |= IRQ_IOC;
        }
        ch.completed += 1;
        self.update_line(state, channel);
    }

    fn complete_mm2s(&self, state: &mut DmaState) {
        let Some(kick) = state.mm2s.pending.take() else {
            return;
        };
        let failed = core::mem::take(&mut state.mm2s.fail_next);
        trace!("{:?}: mm2s {:#x} len {}", self.device, kick.address, kick.length);
        if !failed {
            let data = self.bus.memory.read(kick.address, kick.length as usize);
            self.clock.advance(kick.length as u64 / 4);
            self.apm.record_read(kick.length);
            self.apm.record_stream(kick.length);
            match self.sobel.as_ref().filter(|s| s.is_started()) {
                Some(sobel) => {
                    if let Some(out) = sobel.push(&data) {
                        state.stream.extend(out);
                    }
                }
                None => state.stream.extend(data),
            }
        }
        self.finish(state, Channel::Mm2s, failed);
    }

    fn complete_s2mm(&self, state: &mut DmaState) {
        let Some(kick) = state.s2mm.pending.take() else {
            return;
        };
        let failed = core::mem::take(&mut state.s2mm.fail_next);
        trace!("{:?}: s2mm {:#x} len {}", self.device, kick.address, kick.length);
        if !failed {
            let len = kick.length as usize;
            let available = len.min(state.stream.len());
            if available < len {
                warn!("{:?}: s2mm underrun, {} of {} bytes", self.device, available, len);
            }
            let mut data: Vec<u8> = state.stream.drain(..available).collect();
            data.resize(len, 0);
            self.bus.memory.write(kick.address, &data);
            self.clock.advance(kick.length as u64 / 4);
            self.apm.record_write(kick.length);
        }
        self.finish(state, Channel::S2mm, failed);
    }

    // Completes a waiting S2MM transfer once the stream can satisfy it.
    fn pump(&self, state: &mut DmaState) {
        if let Some(kick) = state.s2mm.pending {
            if state.s2mm.fail_next || state.stream.len() >= kick.length as usize {
                self.complete_s2mm(state);
            }
        }
    }

    fn reset(&self, state: &mut DmaState) {
        state.mm2s = ChannelState {
            completed: state.mm2s.completed,
            ..Default::default()
        };
        state.s2mm = ChannelState {
            completed: state.s2mm.completed,
            ..Default::default()
        };
        state.stream.clear();
        self.mm2s_line.lower();
        self.s2mm_line.lower();
    }

    /// Completes the oldest pending transfer on |channel|, waiting up to
    /// |timeout| for one to be started. Only meaningful in manual mode.
    pub fn fire(&self, channel: Channel, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        while state.channel(channel).pending.is_none() {
            match deadline {
                None => self.kicked.wait(&mut state),
                Some(deadline) => {
                    if self.kicked.wait_until(&mut state, deadline).timed_out() {
                        return false;
                    }
                }
            }
        }
        match channel {
            Channel::Mm2s => self.complete_mm2s(&mut state),
            Channel::S2mm => self.complete_s2mm(&mut state),
        }
        true
    }

    /// The next transfer on |channel| ends with an error interrupt.
    pub fn fail_next(&self, channel: Channel) { self.state.lock().channel(channel).fail_next = true; }

    pub fn completed(&self, channel: Channel) -> u64 { self.state.lock().channel(channel).completed }

    pub fn pending_length(&self, channel: Channel) -> Option<u32> {
        self.state.lock().channel(channel).pending.map(|k| k.length)
    }
}

impl RegisterBlock for SimDma {
    fn read(&self, offset: usize) -> u32 {
        let mut state = self.state.lock();
        match decode(offset) {
            Some((channel, field)) => {
                let ch = state.channel(channel);
                match field {
                    Field::Control => ch.cr,
                    Field::Status => ch.sr,
                    Field::Address => ch.address,
                    Field::AddressMsb => ch.address_msb,
                    Field::Length => ch.length,
                }
            }
            None => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        self.log.record(self.device, offset, value);
        let Some((channel, field)) = decode(offset) else {
            return;
        };
        let mut state = self.state.lock();
        match field {
            Field::Control => {
                if value & DMACR_RESET != 0 {
                    self.reset(&mut state);
                    return;
                }
                let ch = state.channel(channel);
                ch.cr = value;
                if value & DMACR_RUN_STOP != 0 {
                    ch.sr &= !DMASR_HALTED;
                }
                self.update_line(&mut state, channel);
            }
            Field::Status => {
                state.channel(channel).sr &= !(value & IRQ_ALL_MASK);
                self.update_line(&mut state, channel);
            }
            Field::Address => state.channel(channel).address = value,
            Field::AddressMsb => state.channel(channel).address_msb = value,
            Field::Length => {
                let ch = state.channel(channel);
                let address = ((ch.address_msb as u64) << 32) | ch.address as u64;
                ch.length = value;
                ch.sr &= !DMASR_IDLE;
                ch.pending = Some(Kick {
                    address: self.bus.resolve(address),
                    length: value,
                });
                self.kicked.notify_all();
                if self.completion == Completion::Immediate {
                    if channel == Channel::Mm2s {
                        self.complete_mm2s(&mut state);
                    }
                    self.pump(&mut state);
                }
            }
        }
    }
}
