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

use crate::SimPcieBridge;
use accel_interface::MemoryPort;
use std::collections::HashMap;
use std::sync::Arc;

const PAGE_SHIFT: u64 = 12;
const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Sparse byte-addressed memory covering host and FPGA address ranges.
/// Unwritten bytes read as zero.
#[derive(Default)]
pub struct SimMemory {
    pages: spin::Mutex<HashMap<u64, Box<[u8; PAGE_SIZE]>>>,
}
impl SimMemory {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn write(&self, address: u64, data: &[u8]) {
        let mut pages = self.pages.lock();
        for (i, byte) in data.iter().enumerate() {
            let a = address + i as u64;
            let page = pages
                .entry(a >> PAGE_SHIFT)
                .or_insert_with(|| Box::new([0; PAGE_SIZE]));
            page[(a as usize) & (PAGE_SIZE - 1)] = *byte;
        }
    }

    pub fn read(&self, address: u64, len: usize) -> Vec<u8> {
        let pages = self.pages.lock();
        (0..len as u64)
            .map(|i| {
                let a = address + i;
                pages
                    .get(&(a >> PAGE_SHIFT))
                    .map_or(0, |page| page[(a as usize) & (PAGE_SIZE - 1)])
            })
            .collect()
    }

    pub fn write_u32s(&self, address: u64, words: &[u32]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.write(address, &bytes);
    }

    pub fn read_u32s(&self, address: u64, count: usize) -> Vec<u32> {
        self.read(address, count * 4)
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub fn write_u64(&self, address: u64, value: u64) { self.write(address, &value.to_le_bytes()); }
}
impl MemoryPort for SimMemory {
    fn read_u64(&self, address: u64) -> u64 {
        let bytes = self.read(address, 8);
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes);
        u64::from_le_bytes(word)
    }
}

/// The AXI interconnect as seen by a DMA master: addresses inside a PCIe
/// BAR window are forwarded through the bridge, everything else hits
/// memory directly.
pub struct SimBus {
    pub memory: Arc<SimMemory>,
    pub bridge: Arc<SimPcieBridge>,
}
impl SimBus {
    pub fn new(memory: &Arc<SimMemory>, bridge: &Arc<SimPcieBridge>) -> Arc<Self> {
        Arc::new(Self {
            memory: memory.clone(),
            bridge: bridge.clone(),
        })
    }

    pub fn resolve(&self, address: u64) -> u64 { self.bridge.translate(address) }
}
