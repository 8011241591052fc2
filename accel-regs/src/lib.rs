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

//! Register map of the devices on the accelerator fabric. Offsets are
//! byte offsets from each device's base address.

#![cfg_attr(not(test), no_std)]

pub mod apm;
pub mod axi_dma;
pub mod cdma;
pub mod gpio;
pub mod intr_manager;
pub mod pcie;
pub mod sched_buffer;
pub mod sobel;

use static_assertions::const_assert_eq;

// Bits shared by the DMA and CDMA status/control registers.
pub const IRQ_IOC: u32 = 0x1000;
pub const IRQ_DELAY: u32 = 0x2000;
pub const IRQ_ERROR: u32 = 0x4000;
pub const IRQ_ALL_MASK: u32 = 0x7000;
pub const RESET_MASK: u32 = 0x4;
const_assert_eq!(IRQ_ALL_MASK, IRQ_IOC | IRQ_DELAY | IRQ_ERROR);

bitflags::bitflags! {
    /// Interrupt bits reported in DMASR/CDMASR and enabled in DMACR/CDMACR.
    pub struct DmaIrq: u32 {
        const IOC = IRQ_IOC;
        const DELAY = IRQ_DELAY;
        const ERROR = IRQ_ERROR;
        const ALL = IRQ_ALL_MASK;
    }
}

/// Bitfield registers are 32 bits wide, little-endian, LSB first.
pub fn to_word(bytes: [u8; 4]) -> u32 { u32::from_le_bytes(bytes) }
pub fn from_word(word: u32) -> [u8; 4] { word.to_le_bytes() }
