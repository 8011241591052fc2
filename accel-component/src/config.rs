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

use accel_regs::sched_buffer::SchedBufferLayout;
use accel_shared::DEFAULT_PAGE_SIZE;
use core::time::Duration;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// What the bootstrap code programs into the fabric before the
/// schedulers start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Route fetch/send host accesses through the PCIe AXI BARs.
    pub pcie_mode: bool,
    /// Scatter/gather page size in bytes.
    pub page_size: u32,
    /// Bound on every hardware wait; None waits forever.
    pub irq_timeout: Option<Duration>,
    /// AXI base address of each BAR window, indexed by BAR.
    pub bar_addresses: Vec<u64>,
    pub fetch_bar: usize,
    pub send_bar: usize,
    pub mm2s_sg_bar: usize,
    pub s2mm_sg_bar: usize,
    pub sched_buffer: SchedBufferLayout,
    /// FPGA-side staging memory for the indirect groups. Each group owns
    /// |staging_stride| bytes: input in the lower half, output in the
    /// upper half.
    pub staging_base: u32,
    pub staging_stride: u32,
    /// Whether the interrupt manager starts a new round by itself.
    pub auto_restart: bool,
    pub log_level: LevelFilter,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            pcie_mode: false,
            page_size: DEFAULT_PAGE_SIZE,
            irq_timeout: Some(Duration::from_secs(5)),
            bar_addresses: vec![0x8000_0000, 0x9000_0000, 0xA000_0000, 0xB000_0000],
            fetch_bar: 0,
            send_bar: 1,
            mm2s_sg_bar: 2,
            s2mm_sg_bar: 3,
            sched_buffer: SchedBufferLayout::default(),
            staging_base: 0x4000_0000,
            staging_stride: 0x20_0000,
            auto_restart: true,
            log_level: LevelFilter::Info,
        }
    }
}

impl FabricConfig {
    pub fn bar_address(&self, bar: usize) -> Option<u64> { self.bar_addresses.get(bar).copied() }
}
