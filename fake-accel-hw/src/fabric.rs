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

use crate::*;
use accel_regs::intr_manager;
use accel_regs::sched_buffer::SchedBufferLayout;
use accel_shared::{AccelGroup, GroupKind, NUM_ACCEL_GROUPS, NUM_SCHED_CLIENTS};
use std::sync::Arc;

/// Span of each AXI BAR window on the bridge.
pub const BAR_WINDOW_SIZE: u64 = 0x1000_0000;

#[derive(Clone, Debug)]
pub struct SimOptions {
    /// How DMA and CDMA transfers complete.
    pub completion: Completion,
    /// How the MSI controller acknowledges a vector.
    pub msi_ack: Completion,
    /// AXI base of each PCIe BAR window, indexed by BAR.
    pub bar_windows: Vec<u64>,
    /// Layout shared by the fetch and send scheduler buffers.
    pub sched_buffer: SchedBufferLayout,
}
impl Default for SimOptions {
    fn default() -> Self {
        Self {
            completion: Completion::Immediate,
            msi_ack: Completion::Immediate,
            bar_windows: vec![0x8000_0000, 0x9000_0000, 0xA000_0000, 0xB000_0000],
            sched_buffer: SchedBufferLayout::default(),
        }
    }
}

/// Devices private to one acceleration group.
pub struct GroupHw {
    pub apm: Arc<SimApm>,
    pub dma: Arc<SimDma>,
    pub sobel: Arc<SimSobel>,
    pub mm2s_line: Arc<SimLine>,
    pub s2mm_line: Arc<SimLine>,
}

/// The whole fabric: seven acceleration groups, the shared fetch/send
/// CDMAs and their scheduler buffers, the interrupt manager's request
/// slots and the MSI GPIO pair.
pub struct FakeFabric {
    pub log: Arc<AccessLog>,
    pub clock: Arc<SimClock>,
    pub memory: Arc<SimMemory>,
    pub bridge: Arc<SimPcieBridge>,
    pub bus: Arc<SimBus>,
    pub groups: Vec<GroupHw>,
    /// Notification shared by both channels of the scatter/gather group.
    pub sg_line: Arc<SimLine>,
    pub timer_apm: Arc<SimApm>,
    pub cdma_fetch: Arc<SimCdma>,
    pub cdma_fetch_line: Arc<SimLine>,
    pub cdma_send: Arc<SimCdma>,
    pub cdma_send_line: Arc<SimLine>,
    pub fetch_buffer: Arc<SimRegisterFile>,
    pub fetch_doorbell: Arc<SimLine>,
    pub send_buffer: Arc<SimRegisterFile>,
    pub send_doorbell: Arc<SimLine>,
    /// Fetch scheduler to indirect group N: staging done.
    pub start_lines: Vec<Arc<SimLine>>,
    /// Send scheduler to indirect group N: result delivered.
    pub done_lines: Vec<Arc<SimLine>>,
    pub irq_slots: Arc<SimRegisterFile>,
    pub irq_doorbell: Arc<SimLine>,
    pub msi: Arc<SimMsiController>,
    pub msi_trigger: Arc<MsiTriggerGpio>,
    pub msi_ack: Arc<MsiAckGpio>,
    pub msi_ack_line: Arc<SimLine>,
}
impl FakeFabric {
    pub fn new(options: &SimOptions) -> Self {
        let log = AccessLog::new();
        let clock = SimClock::new();
        let memory = SimMemory::new();
        let bridge = SimPcieBridge::new(&options.bar_windows, BAR_WINDOW_SIZE, &log);
        let bus = SimBus::new(&memory, &bridge);
        let sg_line = SimLine::new();

        let groups = AccelGroup::all()
            .map(|group| {
                let i = group.index();
                let (mm2s_line, s2mm_line) = match group.kind() {
                    GroupKind::ScatterGather => {
                        (SimLine::with_parent(&sg_line), SimLine::with_parent(&sg_line))
                    }
                    _ => (SimLine::new(), SimLine::new()),
                };
                let apm = SimApm::new(Device::Apm(i), &clock, &log);
                let sobel = SimSobel::new(Device::Sobel(i), &log);
                let dma = SimDma::new(
                    Device::Dma(i),
                    options.completion,
                    &bus,
                    &clock,
                    &apm,
                    Some(&sobel),
                    &mm2s_line,
                    &s2mm_line,
                    &log,
                );
                GroupHw {
                    apm,
                    dma,
                    sobel,
                    mm2s_line,
                    s2mm_line,
                }
            })
            .collect();

        let cdma_fetch_line = SimLine::new();
        let cdma_send_line = SimLine::new();
        let buffer_bytes = options.sched_buffer.base + options.sched_buffer.span();
        let msi_ack_line = SimLine::new();
        let msi = SimMsiController::new(options.msi_ack, &msi_ack_line);
        Self {
            timer_apm: SimApm::new(Device::TimerApm, &clock, &log),
            cdma_fetch: SimCdma::new(
                Device::CdmaFetch,
                options.completion,
                &bus,
                &clock,
                &cdma_fetch_line,
                &log,
            ),
            cdma_send: SimCdma::new(
                Device::CdmaSend,
                options.completion,
                &bus,
                &clock,
                &cdma_send_line,
                &log,
            ),
            cdma_fetch_line,
            cdma_send_line,
            fetch_buffer: SimRegisterFile::new(Device::FetchBuffer, buffer_bytes, &log),
            fetch_doorbell: SimLine::new(),
            send_buffer: SimRegisterFile::new(Device::SendBuffer, buffer_bytes, &log),
            send_doorbell: SimLine::new(),
            start_lines: (0..NUM_SCHED_CLIENTS).map(|_| SimLine::new()).collect(),
            done_lines: (0..NUM_SCHED_CLIENTS).map(|_| SimLine::new()).collect(),
            irq_slots: SimRegisterFile::new(
                Device::IrqSlots,
                intr_manager::request_slot(NUM_ACCEL_GROUPS),
                &log,
            ),
            irq_doorbell: SimLine::new(),
            msi_trigger: MsiTriggerGpio::new(&msi, &log),
            msi_ack: MsiAckGpio::new(&msi, &log),
            msi,
            msi_ack_line,
            groups,
            sg_line,
            log,
            clock,
            memory,
            bridge,
            bus,
        }
    }

    pub fn group(&self, group: AccelGroup) -> &GroupHw { &self.groups[group.index()] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accel_interface::{IrqLine, RegisterBlock};
    use accel_regs::axi_dma::{start_word, MM2S, S2MM};
    use accel_regs::sobel::{COLS, CTRL, CTRL_AP_START, ROWS};
    use accel_shared::SG_GROUP;

    #[test]
    fn sg_group_shares_notification() {
        let fabric = FakeFabric::new(&SimOptions::default());
        let sg = fabric.group(AccelGroup::new(SG_GROUP).unwrap());
        sg.s2mm_line.raise();
        assert!(fabric.sg_line.poll());
        let direct = fabric.group(AccelGroup::new(0).unwrap());
        fabric.sg_line.acknowledge();
        direct.s2mm_line.raise();
        assert!(!fabric.sg_line.poll());
    }

    #[test]
    fn sobel_in_stream_path() {
        let fabric = FakeFabric::new(&SimOptions::default());
        let hw = fabric.group(AccelGroup::new(1).unwrap());
        let (rows, cols) = (3u32, 3u32);
        let mut pixels = vec![0u32; 9];
        pixels[5] = 40;
        fabric.memory.write_u32s(0x1000_0000, &pixels);
        hw.sobel.write(ROWS, rows);
        hw.sobel.write(COLS, cols);
        hw.sobel.write(CTRL, CTRL_AP_START);
        for (regs, address) in [(S2MM, 0x1100_0000), (MM2S, 0x1000_0000)] {
            hw.dma.write(regs.control, start_word());
            hw.dma.write(regs.address, address);
            hw.dma.write(regs.length, rows * cols * 4);
        }
        assert!(hw.s2mm_line.poll());
        let out = fabric.memory.read_u32s(0x1100_0000, 9);
        // Only the centre pixel is interior; the edge is to its right.
        assert_eq!(out[4], 80);
        assert_eq!(hw.sobel.frames(), 1);
        assert_eq!(fabric.irq_slots.read(intr_manager::request_slot(6)), 0);
    }
}
