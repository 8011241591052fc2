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

//! AXI performance monitor: six metric counters and a 64-bit global clock
//! counter.

use modular_bitfield::prelude::*;

pub const GCC_MSW: usize = 0x0000;
pub const GCC_LSW: usize = 0x0004;
pub const CONTROL: usize = 0x0300;

pub const NUM_METRIC_COUNTERS: usize = 6;
const MC_BASE: usize = 0x0100;
const MC_STEP: usize = 0x10;

pub const fn metric_counter(index: usize) -> usize { MC_BASE + MC_STEP * index }

// Counter assignment programmed at synthesis time.
pub const MC_READ_TRANSACTIONS: usize = 0;
pub const MC_READ_BYTES: usize = 1;
pub const MC_WRITE_TRANSACTIONS: usize = 2;
pub const MC_WRITE_BYTES: usize = 3;
pub const MC_PACKETS: usize = 4;
pub const MC_BYTES: usize = 5;

pub const CONTROL_MCE: u32 = 0x0000_0001;
pub const CONTROL_MC_RESET: u32 = 0x0000_0002;
pub const CONTROL_GCC_ENABLE: u32 = 0x0001_0000;
pub const CONTROL_GCC_RESET: u32 = 0x0002_0000;

#[bitfield]
pub struct Control {
    pub metrics_counter_enable: bool,
    pub metrics_counter_reset: bool,
    #[skip]
    _unused0: B14,
    pub gcc_enable: bool,
    pub gcc_reset: bool,
    #[skip]
    _unused1: B14,
}
