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

use crate::{AccessLog, Device};
use accel_interface::RegisterBlock;
use accel_regs::pcie::{axibar2pciebar_l, axibar2pciebar_u, NUM_AXI_BARS};
use std::sync::Arc;

/// AXI-to-PCIe bridge. BAR |i| is an AXI window of |window_size| bytes at
/// |windows[i]|; accesses inside it land at the programmed host address.
pub struct SimPcieBridge {
    windows: Vec<u64>,
    window_size: u64,
    translation: spin::Mutex<[u32; 2 * NUM_AXI_BARS]>,
    log: Arc<AccessLog>,
}
impl SimPcieBridge {
    pub fn new(windows: &[u64], window_size: u64, log: &Arc<AccessLog>) -> Arc<Self> {
        assert!(windows.len() <= NUM_AXI_BARS);
        Arc::new(Self {
            windows: windows.to_vec(),
            window_size,
            translation: spin::Mutex::new([0; 2 * NUM_AXI_BARS]),
            log: log.clone(),
        })
    }

    pub fn window(&self, bar: usize) -> Option<u64> { self.windows.get(bar).copied() }

    /// Host address currently mapped behind |bar|.
    pub fn translation(&self, bar: usize) -> u64 {
        let regs = self.translation.lock();
        ((regs[2 * bar] as u64) << 32) | regs[2 * bar + 1] as u64
    }

    pub fn translate(&self, address: u64) -> u64 {
        for (bar, base) in self.windows.iter().enumerate() {
            if address >= *base && address - base < self.window_size {
                return self.translation(bar) + (address - base);
            }
        }
        address
    }

    fn register_index(offset: usize) -> Option<usize> {
        (0..NUM_AXI_BARS).find_map(|bar| {
            if offset == axibar2pciebar_u(bar) {
                Some(2 * bar)
            } else if offset == axibar2pciebar_l(bar) {
                Some(2 * bar + 1)
            } else {
                None
            }
        })
    }
}
impl RegisterBlock for SimPcieBridge {
    fn read(&self, offset: usize) -> u32 {
        Self::register_index(offset).map_or(0, |i| self.translation.lock()[i])
    }

    fn write(&self, offset: usize, value: u32) {
        self.log.record(Device::Pcie, offset, value);
        if let Some(i) = Self::register_index(offset) {
            self.translation.lock()[i] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_applies_inside_window() {
        let log = AccessLog::new();
        let bridge = SimPcieBridge::new(&[0x8000_0000, 0x9000_0000], 0x1000_0000, &log);
        bridge.write(axibar2pciebar_u(1), 0x1);
        bridge.write(axibar2pciebar_l(1), 0x2000_0000);
        assert_eq!(bridge.translate(0x9000_0010), 0x1_2000_0010);
        // BAR 0 untranslated maps to host address 0.
        assert_eq!(bridge.translate(0x8000_0004), 0x4);
        assert_eq!(bridge.translate(0x4000_0000), 0x4000_0000);
        assert_eq!(bridge.read(axibar2pciebar_l(1)), 0x2000_0000);
    }
}
