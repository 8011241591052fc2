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

use crate::{Regs, Signal};
use accel_interface::{AccelError, IrqLine, OutputLine};
use accel_regs::sched_buffer::{SchedBufferLayout, NUM_CLIENT_SLOTS};
use accel_shared::TransferRequest;
use log::{trace, warn};

/// Scheduler buffer shared by up to four producers and one consumer. A
/// non-zero size field is the claim on a slot; the producer writes it
/// last and the consumer clears it last.
pub struct SchedulerBuffer {
    regs: Regs,
    layout: SchedBufferLayout,
    doorbell: Option<Signal>,
    // Orders a consumer's release-and-signal against a producer's settle.
    handoff: spin::Mutex<()>,
}
impl SchedulerBuffer {
    pub fn new(regs: Regs, layout: SchedBufferLayout, doorbell: Option<Signal>) -> Self {
        Self {
            regs,
            layout,
            doorbell,
            handoff: spin::Mutex::new(()),
        }
    }

    fn check_slot(slot: usize) -> Result<(), AccelError> {
        if slot < NUM_CLIENT_SLOTS {
            Ok(())
        } else {
            Err(AccelError::InvalidSlot)
        }
    }

    pub fn is_free(&self, slot: usize) -> bool { self.regs.read(self.layout.size(slot)) == 0 }

    /// Posts |request| into |slot|. Fails if the slot still holds a
    /// request or if |request| could not be told apart from an empty slot.
    pub fn post(&self, slot: usize, request: &TransferRequest) -> Result<(), AccelError> {
        Self::check_slot(slot)?;
        if request.data_size == 0 {
            warn!("slot {}: zero-size request", slot);
            return Err(AccelError::InvalidRequest);
        }
        if !self.is_free(slot) {
            warn!("slot {}: still claimed", slot);
            return Err(AccelError::SlotBusy);
        }
        trace!("slot {}: post {:?}", slot, request);
        self.regs.write(self.layout.source(slot), request.source_address);
        self.regs.write(self.layout.destination(slot), request.destination_address);
        self.regs.write(self.layout.offset(slot), request.offset);
        self.regs.write(self.layout.size(slot), request.data_size);
        if let Some(doorbell) = &self.doorbell {
            doorbell.raise();
        }
        Ok(())
    }

    /// Reads |slot| if it holds a request.
    pub fn peek(&self, slot: usize) -> Option<TransferRequest> {
        let data_size = self.regs.read(self.layout.size(slot));
        if data_size == 0 {
            return None;
        }
        Some(TransferRequest {
            source_address: self.regs.read(self.layout.source(slot)),
            destination_address: self.regs.read(self.layout.destination(slot)),
            data_size,
            offset: self.regs.read(self.layout.offset(slot)),
        })
    }

    /// Zeroes all four fields, size last, handing |slot| back to its
    /// producer.
    pub fn release(&self, slot: usize) {
        self.regs.write(self.layout.source(slot), 0);
        self.regs.write(self.layout.destination(slot), 0);
        self.regs.write(self.layout.offset(slot), 0);
        self.regs.write(self.layout.size(slot), 0);
    }

    /// Releases |slot| and raises its completion |signal| as one step, so
    /// a producer that finds the slot free never sees that completion
    /// arrive later.
    pub fn complete(&self, slot: usize, signal: &dyn OutputLine) {
        let _handoff = self.handoff.lock();
        self.release(slot);
        signal.raise();
    }

    /// Readies |slot| for a new request. Fails with SlotBusy while an
    /// earlier request is still claimed; otherwise lowers |completion| so
    /// a signal left by an abandoned request cannot complete the next one.
    pub fn settle(&self, slot: usize, completion: &dyn IrqLine) -> Result<(), AccelError> {
        Self::check_slot(slot)?;
        let _handoff = self.handoff.lock();
        if !self.is_free(slot) {
            warn!("slot {}: earlier request still queued", slot);
            return Err(AccelError::SlotBusy);
        }
        completion.acknowledge();
        Ok(())
    }
}
