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

use crate::Device;
use accel_interface::RegisterBlock;
use log::warn;
use std::sync::Arc;

/// One register write observed on the bus.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Access {
    pub device: Device,
    pub offset: usize,
    pub value: u32,
}

/// Ordered record of register writes across every simulated device.
#[derive(Default)]
pub struct AccessLog {
    entries: spin::Mutex<Vec<Access>>,
}
impl AccessLog {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn record(&self, device: Device, offset: usize, value: u32) {
        self.entries.lock().push(Access {
            device,
            offset,
            value,
        });
    }

    pub fn entries(&self) -> Vec<Access> { self.entries.lock().clone() }

    /// Values written to |offset| of |device|, oldest first.
    pub fn writes_to(&self, device: Device, offset: usize) -> Vec<u32> {
        self.entries
            .lock()
            .iter()
            .filter(|a| a.device == device && a.offset == offset)
            .map(|a| a.value)
            .collect()
    }

    /// Writes to |device| only, oldest first.
    pub fn device_writes(&self, device: Device) -> Vec<(usize, u32)> {
        self.entries
            .lock()
            .iter()
            .filter(|a| a.device == device)
            .map(|a| (a.offset, a.value))
            .collect()
    }

    pub fn clear(&self) { self.entries.lock().clear(); }
}

/// Plain read/write registers with no side effects, as used for the
/// scheduler buffers and the interrupt manager's request slots.
pub struct SimRegisterFile {
    device: Device,
    words: spin::Mutex<Vec<u32>>,
    log: Arc<AccessLog>,
}
impl SimRegisterFile {
    pub fn new(device: Device, size_bytes: usize, log: &Arc<AccessLog>) -> Arc<Self> {
        Arc::new(Self {
            device,
            words: spin::Mutex::new(vec![0; size_bytes / 4]),
            log: log.clone(),
        })
    }
}
impl RegisterBlock for SimRegisterFile {
    fn read(&self, offset: usize) -> u32 {
        self.words.lock().get(offset / 4).copied().unwrap_or(0)
    }

    fn write(&self, offset: usize, value: u32) {
        self.log.record(self.device, offset, value);
        match self.words.lock().get_mut(offset / 4) {
            Some(word) => *word = value,
            None => warn!("{:?}: write {:#x} beyond register file", self.device, offset),
        }
    }
}
