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

//! Per-group performance record read by the host driver.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// Phases bracketed by a start/end timestamp pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Phase {
    CdmaFetch,
    CdmaSend,
    DmaAccel,
    // Reported by the kernel driver and userspace, never by the fabric.
    Total,
    Sleep,
}
impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::CdmaFetch,
        Phase::CdmaSend,
        Phase::DmaAccel,
        Phase::Total,
        Phase::Sleep,
    ];
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Edge {
    Start,
    End,
}

/// Layout shared with the host driver; 64-bit values are split into
/// lower/upper 32-bit halves. The first 80 bytes are written by the fabric,
/// the trailing 40 by the host.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub apm_read_transactions: u32,
    pub apm_read_bytes: u32,
    pub apm_write_transactions: u32,
    pub apm_write_bytes: u32,
    pub apm_packets: u32,
    pub apm_bytes: u32,
    pub apm_gcc_l: u32,
    pub apm_gcc_u: u32,
    pub cdma_fetch_time_start_l: u32,
    pub cdma_fetch_time_start_u: u32,
    pub cdma_fetch_time_end_l: u32,
    pub cdma_fetch_time_end_u: u32,
    pub cdma_send_time_start_l: u32,
    pub cdma_send_time_start_u: u32,
    pub cdma_send_time_end_l: u32,
    pub cdma_send_time_end_u: u32,
    pub dma_accel_time_start_l: u32,
    pub dma_accel_time_start_u: u32,
    pub dma_accel_time_end_l: u32,
    pub dma_accel_time_end_u: u32,

    pub image_rows: u32,
    pub image_cols: u32,
    pub total_time_start_l: u32,
    pub total_time_start_u: u32,
    pub total_time_end_l: u32,
    pub total_time_end_u: u32,
    pub sleep_time_start_l: u32,
    pub sleep_time_start_u: u32,
    pub sleep_time_end_l: u32,
    pub sleep_time_end_u: u32,
}
pub const METRICS_SIZE: usize = 120;
const_assert_eq!(core::mem::size_of::<Metrics>(), METRICS_SIZE);

pub const fn split_u64(value: u64) -> (u32, u32) { (value as u32, (value >> 32) as u32) }
pub const fn join_u64(lower: u32, upper: u32) -> u64 { ((upper as u64) << 32) | lower as u64 }

impl Metrics {
    fn stamp_mut(&mut self, phase: Phase, edge: Edge) -> (&mut u32, &mut u32) {
        match (phase, edge) {
            (Phase::CdmaFetch, Edge::Start) => (
                &mut self.cdma_fetch_time_start_l,
                &mut self.cdma_fetch_time_start_u,
            ),
            (Phase::CdmaFetch, Edge::End) => (
                &mut self.cdma_fetch_time_end_l,
                &mut self.cdma_fetch_time_end_u,
            ),
            (Phase::CdmaSend, Edge::Start) => (
                &mut self.cdma_send_time_start_l,
                &mut self.cdma_send_time_start_u,
            ),
            (Phase::CdmaSend, Edge::End) => (
                &mut self.cdma_send_time_end_l,
                &mut self.cdma_send_time_end_u,
            ),
            (Phase::DmaAccel, Edge::Start) => (
                &mut self.dma_accel_time_start_l,
                &mut self.dma_accel_time_start_u,
            ),
            (Phase::DmaAccel, Edge::End) => (
                &mut self.dma_accel_time_end_l,
                &mut self.dma_accel_time_end_u,
            ),
            (Phase::Total, Edge::Start) => (
                &mut self.total_time_start_l,
                &mut self.total_time_start_u,
            ),
            (Phase::Total, Edge::End) => (&mut self.total_time_end_l, &mut self.total_time_end_u),
            (Phase::Sleep, Edge::Start) => (
                &mut self.sleep_time_start_l,
                &mut self.sleep_time_start_u,
            ),
            (Phase::Sleep, Edge::End) => (&mut self.sleep_time_end_l, &mut self.sleep_time_end_u),
        }
    }

    pub fn set_stamp(&mut self, phase: Phase, edge: Edge, value: u64) {
        let (lower, upper) = self.stamp_mut(phase, edge);
        (*lower, *upper) = split_u64(value);
    }

    pub fn stamp(&self, phase: Phase, edge: Edge) -> u64 {
        let (lower, upper) = match (phase, edge) {
            (Phase::CdmaFetch, Edge::Start) => {
                (self.cdma_fetch_time_start_l, self.cdma_fetch_time_start_u)
            }
            (Phase::CdmaFetch, Edge::End) => {
                (self.cdma_fetch_time_end_l, self.cdma_fetch_time_end_u)
            }
            (Phase::CdmaSend, Edge::Start) => {
                (self.cdma_send_time_start_l, self.cdma_send_time_start_u)
            }
            (Phase::CdmaSend, Edge::End) => (self.cdma_send_time_end_l, self.cdma_send_time_end_u),
            (Phase::DmaAccel, Edge::Start) => {
                (self.dma_accel_time_start_l, self.dma_accel_time_start_u)
            }
            (Phase::DmaAccel, Edge::End) => {
                (self.dma_accel_time_end_l, self.dma_accel_time_end_u)
            }
            (Phase::Total, Edge::Start) => (self.total_time_start_l, self.total_time_start_u),
            (Phase::Total, Edge::End) => (self.total_time_end_l, self.total_time_end_u),
            (Phase::Sleep, Edge::Start) => (self.sleep_time_start_l, self.sleep_time_start_u),
            (Phase::Sleep, Edge::End) => (self.sleep_time_end_l, self.sleep_time_end_u),
        };
        join_u64(lower, upper)
    }

    /// Starting a phase invalidates any end stamp left from the previous
    /// pass so a hung transfer is visible as a missing end.
    pub fn record_start(&mut self, phase: Phase, now: u64) {
        self.set_stamp(phase, Edge::Start, now);
        self.set_stamp(phase, Edge::End, 0);
    }

    pub fn record_end(&mut self, phase: Phase, now: u64) { self.set_stamp(phase, Edge::End, now); }

    /// Elapsed clock ticks for a completed phase; None if the phase never
    /// started or has not finished.
    pub fn elapsed(&self, phase: Phase) -> Option<u64> {
        let start = self.stamp(phase, Edge::Start);
        let end = self.stamp(phase, Edge::End);
        if start == 0 || end == 0 {
            return None;
        }
        end.checked_sub(start)
    }

    pub fn gcc(&self) -> u64 { join_u64(self.apm_gcc_l, self.apm_gcc_u) }
    pub fn set_gcc(&mut self, value: u64) { (self.apm_gcc_l, self.apm_gcc_u) = split_u64(value); }
}
