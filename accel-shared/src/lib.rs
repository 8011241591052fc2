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

#![cfg_attr(not(test), no_std)]

// Data structures shared by the acceleration schedulers, the simulated
// fabric and the host side. Nothing here touches hardware.

use core::fmt;
use core::ops::{Index, IndexMut};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

mod metrics;
pub use metrics::*;

/// Number of acceleration groups in the fabric; also the number of
/// interrupt-manager request slots and of records in the shared repository.
pub const NUM_ACCEL_GROUPS: usize = 7;

/// Clients multiplexed by one fetch or send scheduler.
pub const NUM_SCHED_CLIENTS: usize = 4;

/// Groups whose source/destination buffers are directly addressable.
pub const NUM_DIRECT_GROUPS: usize = 2;

/// Index of the first indirect group. Fetch/send slot N serves group
/// ACCEL_GROUP_JUMP + N.
pub const ACCEL_GROUP_JUMP: usize = NUM_DIRECT_GROUPS;

/// The scatter/gather group sits after the indirect groups.
pub const SG_GROUP: usize = ACCEL_GROUP_JUMP + NUM_SCHED_CLIENTS;
const_assert_eq!(SG_GROUP + 1, NUM_ACCEL_GROUPS);

/// Pixels are streamed as 32-bit words.
pub const BYTES_PER_PIXEL: u32 = 4;

pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Scatter/gather lists are arrays of 64-bit physical page addresses.
pub const SG_ENTRY_SIZE: u64 = core::mem::size_of::<u64>() as u64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupKind {
    Direct,
    Indirect,
    ScatterGather,
}

/// Typed index of an acceleration group. Construction validates the range
/// so a held value always addresses a real record/slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct AccelGroup(u8);
impl AccelGroup {
    pub const fn new(index: usize) -> Option<Self> {
        if index < NUM_ACCEL_GROUPS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Maps a fetch/send scheduler slot to the indirect group it serves.
    pub const fn from_sched_slot(slot: usize) -> Option<Self> {
        if slot < NUM_SCHED_CLIENTS {
            Self::new(ACCEL_GROUP_JUMP + slot)
        } else {
            None
        }
    }

    pub const fn index(self) -> usize { self.0 as usize }

    pub fn kind(self) -> GroupKind {
        match self.index() {
            i if i < ACCEL_GROUP_JUMP => GroupKind::Direct,
            i if i < SG_GROUP => GroupKind::Indirect,
            _ => GroupKind::ScatterGather,
        }
    }

    /// Fetch/send scheduler slot owned by an indirect group.
    pub fn sched_slot(self) -> Option<usize> {
        match self.kind() {
            GroupKind::Indirect => Some(self.index() - ACCEL_GROUP_JUMP),
            _ => None,
        }
    }

    /// MSI vector raised when a pass for this group completes.
    pub const fn vector(self) -> u32 { self.0 as u32 }

    pub fn all() -> impl Iterator<Item = AccelGroup> { (0..NUM_ACCEL_GROUPS).filter_map(Self::new) }
}
impl fmt::Display for AccelGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "AG{}", self.0) }
}

// Interrupt-manager request slots hold 0 when idle and vector + 1 when a
// notification is pending.
pub const fn encode_irq_request(vector: u32) -> u32 { vector + 1 }
pub const fn decode_irq_request(raw: u32) -> Option<u32> { raw.checked_sub(1) }

/// One scheduler-buffer entry. A non-zero |data_size| is the claim that a
/// request is pending; the consumer zeroes the entry once served.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_address: u32,
    pub destination_address: u32,
    pub data_size: u32,
    pub offset: u32,
}

/// Host-driver bookkeeping. The fabric only reads it to refuse a pass on a
/// group that is already running.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct StatusFlags {
    pub accelerator_busy: u32,
    pub open_modules: u32,
    pub occupied_pid: [u32; NUM_ACCEL_GROUPS],
}
impl StatusFlags {
    pub fn is_occupied(&self, group: AccelGroup) -> bool { self.occupied_pid[group.index()] != 0 }

    /// Claims |group| for |pid|. Returns false if someone else holds it.
    pub fn occupy(&mut self, group: AccelGroup, pid: u32) -> bool {
        assert!(pid != 0, "pid 0 marks a free group");
        if self.is_occupied(group) {
            return false;
        }
        self.occupied_pid[group.index()] = pid;
        self.accelerator_busy = 1;
        true
    }

    pub fn release(&mut self, group: AccelGroup) {
        self.occupied_pid[group.index()] = 0;
        if self.occupied_pid.iter().all(|pid| *pid == 0) {
            self.accelerator_busy = 0;
        }
    }
}

/// One metrics record per acceleration group plus the host's status
/// flags, indexed by group rather than by byte offset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SharedRepository {
    pub metrics: [Metrics; NUM_ACCEL_GROUPS],
    pub status: StatusFlags,
}
impl Index<AccelGroup> for SharedRepository {
    type Output = Metrics;
    fn index(&self, group: AccelGroup) -> &Metrics { &self.metrics[group.index()] }
}
impl IndexMut<AccelGroup> for SharedRepository {
    fn index_mut(&mut self, group: AccelGroup) -> &mut Metrics { &mut self.metrics[group.index()] }
}

/// Bytes streamed for a |rows| x |cols| image, or None on overflow.
pub fn image_bytes(rows: u32, cols: u32) -> Option<u32> {
    rows.checked_mul(cols)?.checked_mul(BYTES_PER_PIXEL)
}

/// Number of pages needed to move |size| bytes.
pub fn pages_for(size: u32, page_size: u32) -> u32 {
    assert!(page_size != 0);
    ((size as u64 + page_size as u64 - 1) / page_size as u64) as u32
}

/// Length of page |page| of a |size|-byte transfer: a full page, or the
/// remainder for the last one.
pub fn page_len(size: u32, page_size: u32, page: u32) -> u32 {
    let transferred = page as u64 * page_size as u64;
    let remaining = (size as u64).saturating_sub(transferred);
    remaining.min(page_size as u64) as u32
}
