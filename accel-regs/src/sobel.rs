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

//! HLS-generated AXI-lite control interface of the Sobel core.

use modular_bitfield::prelude::*;

pub const CTRL: usize = 0x00;
pub const GIE: usize = 0x04;
pub const IER: usize = 0x08;
pub const ISR: usize = 0x0C;
pub const ROWS: usize = 0x18;
pub const COLS: usize = 0x20;

pub const CTRL_AP_START: u32 = 0x01;
pub const CTRL_AP_DONE: u32 = 0x02;
pub const CTRL_AP_IDLE: u32 = 0x04;
pub const CTRL_AUTO_RESTART: u32 = 0x80;

#[bitfield]
pub struct Ctrl {
    pub ap_start: bool,
    pub ap_done: bool,
    pub ap_idle: bool,
    pub ap_ready: bool,
    #[skip]
    _unused0: B3,
    pub auto_restart: bool,
    #[skip]
    _unused1: B24,
}
