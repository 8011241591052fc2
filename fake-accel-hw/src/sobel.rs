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
use accel_regs::sobel::*;
use log::trace;
use std::sync::Arc;

#[derive(Default)]
struct SobelState {
    ctrl: u32,
    gie: u32,
    ier: u32,
    isr: u32,
    rows: u32,
    cols: u32,
    input: Vec<u8>,
    frames: u64,
}

/// The Sobel core on a group's stream path. While started it consumes a
/// rows x cols frame of 32-bit pixels and emits the filtered frame once
/// the last pixel arrives.
pub struct SimSobel {
    device: Device,
    state: spin::Mutex<SobelState>,
    log: Arc<AccessLog>,
}
impl SimSobel {
    pub fn new(device: Device, log: &Arc<AccessLog>) -> Arc<Self> {
        Arc::new(Self {
            device,
            state: spin::Mutex::new(SobelState {
                ctrl: CTRL_AP_IDLE,
                ..Default::default()
            }),
            log: log.clone(),
        })
    }

    pub fn is_started(&self) -> bool { self.state.lock().ctrl & CTRL_AP_START != 0 }

    pub fn frames(&self) -> u64 { self.state.lock().frames }

    /// Feeds stream bytes. Returns the filtered frame once complete.
    pub fn push(&self, data: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        state.input.extend_from_slice(data);
        let frame_bytes = (state.rows as usize) * (state.cols as usize) * 4;
        if state.input.len() < frame_bytes {
            return None;
        }
        let rest = state.input.split_off(frame_bytes);
        let frame = core::mem::replace(&mut state.input, rest);
        let output = filter(&frame, state.rows as usize, state.cols as usize);
        state.frames += 1;
        state.isr |= 1;
        state.ctrl |= CTRL_AP_DONE;
        if state.ctrl & CTRL_AUTO_RESTART == 0 {
            state.ctrl = (state.ctrl & !CTRL_AP_START) | CTRL_AP_IDLE;
        }
        trace!("{:?}: frame {} done", self.device, state.frames);
        Some(output)
    }
}

/// 3x3 Sobel gradient magnitude over the low byte of each pixel. Border
/// pixels are zero.
pub fn filter(frame: &[u8], rows: usize, cols: usize) -> Vec<u8> {
    let pixel = |r: usize, c: usize| frame[4 * (r * cols + c)] as i32;
    let mut out = vec![0u8; rows * cols * 4];
    for r in 1..rows.saturating_sub(1) {
        for c in 1..cols.saturating_sub(1) {
            let gx = pixel(r - 1, c + 1) + 2 * pixel(r, c + 1) + pixel(r + 1, c + 1)
                - pixel(r - 1, c - 1)
                - 2 * pixel(r, c - 1)
                - pixel(r + 1, c - 1);
            let gy = pixel(r + 1, c - 1) + 2 * pixel(r + 1, c) + pixel(r + 1, c + 1)
                - pixel(r - 1, c - 1)
                - 2 * pixel(r - 1, c)
                - pixel(r - 1, c + 1);
            out[4 * (r * cols + c)] = (gx.abs() + gy.abs()).min(255) as u8;
        }
    }
    out
}

impl RegisterBlock for SimSobel {
    fn read(&self, offset: usize) -> u32 {
        let mut state = self.state.lock();
        match offset {
            CTRL => {
                let ctrl = state.ctrl;
                // ap_done clears on read.
                state.ctrl &= !CTRL_AP_DONE;
                ctrl
            }
            GIE => state.gie,
            IER => state.ier,
            ISR => state.isr,
            ROWS => state.rows,
            COLS => state.cols,
            _ => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        self.log.record(self.device, offset, value);
        let mut state = self.state.lock();
        match offset {
            CTRL => {
                let keep = state.ctrl & CTRL_AP_DONE;
                state.ctrl = (value & (CTRL_AP_START | CTRL_AUTO_RESTART)) | keep;
                if value & CTRL_AP_START != 0 {
                    state.ctrl &= !CTRL_AP_IDLE;
                    state.input.clear();
                } else {
                    state.ctrl |= CTRL_AP_IDLE;
                }
            }
            GIE => state.gie = value,
            IER => state.ier = value,
            ISR => state.isr &= !value,
            ROWS => state.rows = value,
            COLS => state.cols = value,
            _ => {}
        }
    }
}
