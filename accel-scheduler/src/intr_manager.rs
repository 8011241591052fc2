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

use crate::{Line, Regs, Signal};
use accel_interface::{wait_line, AccelError};
use accel_regs::gpio::{GPIO2_DATA, GPIO_DATA};
use accel_regs::intr_manager::{request_slot, NUM_IRQ_SLOTS};
use accel_shared::{decode_irq_request, encode_irq_request, AccelGroup};
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use log::{error, trace, warn};

/// Producer side: posts a completion notification into a group's slot.
pub struct InterruptRequester {
    slots: Regs,
    doorbell: Signal,
    // Held by the manager while it retires a delivered vector.
    handoff: spin::Mutex<()>,
}
impl InterruptRequester {
    pub fn new(slots: Regs, doorbell: Signal) -> Self {
        Self {
            slots,
            doorbell,
            handoff: spin::Mutex::new(()),
        }
    }

    pub fn request(&self, group: AccelGroup) -> Result<(), AccelError> {
        let offset = request_slot(group.index());
        if self.slots.read(offset) != 0 {
            warn!("{}: previous notification not yet delivered", group);
            return Err(AccelError::SlotBusy);
        }
        trace!("{}: request vector {}", group, group.vector());
        self.slots.write(offset, encode_irq_request(group.vector()));
        self.doorbell.raise();
        Ok(())
    }

    /// Runs |drain| once |group|'s slot is empty, when every vector it
    /// requested earlier has reached the host. Fails with SlotBusy while
    /// an earlier request is still undelivered.
    pub fn settle(&self, group: AccelGroup, drain: impl FnOnce()) -> Result<(), AccelError> {
        let _handoff = self.handoff.lock();
        if self.slots.read(request_slot(group.index())) != 0 {
            warn!("{}: earlier notification still undelivered", group);
            return Err(AccelError::SlotBusy);
        }
        drain();
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct InterruptManagerStats {
    pub rounds: u64,
    pub delivered: u64,
    pub ack_timeouts: u64,
}

/// Serializes notifications from all groups onto the single MSI trigger
/// GPIO. One vector is in flight at a time: the slot is cleared only
/// after the host acknowledges.
pub struct InterruptManager {
    requester: Arc<InterruptRequester>,
    trigger: Regs,
    ack_gpio: Regs,
    ack_line: Line,
    doorbell: Line,
    timeout: Option<Duration>,
    auto_restart: bool,
    stats: spin::Mutex<InterruptManagerStats>,
}
impl InterruptManager {
    pub fn new(
        requester: Arc<InterruptRequester>,
        trigger: Regs,
        ack_gpio: Regs,
        ack_line: Line,
        doorbell: Line,
        timeout: Option<Duration>,
        auto_restart: bool,
    ) -> Self {
        Self {
            requester,
            trigger,
            ack_gpio,
            ack_line,
            doorbell,
            timeout,
            auto_restart,
            stats: spin::Mutex::new(InterruptManagerStats::default()),
        }
    }

    pub fn stats(&self) -> InterruptManagerStats { *self.stats.lock() }

    fn deliver(&self, slot: usize, vector: u32) -> Result<(), AccelError> {
        trace!("slot {}: vector {}", slot, vector);
        self.trigger.write(GPIO2_DATA, vector);
        self.trigger.write(GPIO_DATA, 0);
        self.trigger.write(GPIO_DATA, 1);
        if let Err(e) = wait_line(self.ack_line.as_ref(), self.timeout, AccelError::AckTimeout) {
            // Retire the trigger; the slot stays set and is retried.
            self.ack_gpio.write(GPIO_DATA, 0);
            return Err(e);
        }
        let _handoff = self.requester.handoff.lock();
        self.requester.slots.write(request_slot(slot), 0);
        // Counted before the host can consume the vector.
        self.stats.lock().delivered += 1;
        self.ack_gpio.write(GPIO_DATA, 0);
        Ok(())
    }

    /// Visits all slots once in order 0..N, delivering every pending
    /// vector. Returns the number delivered.
    pub fn service_round(&self) -> Result<usize, AccelError> {
        let mut delivered = 0;
        for slot in 0..NUM_IRQ_SLOTS {
            let pending = self.requester.slots.read(request_slot(slot));
            let Some(vector) = decode_irq_request(pending) else {
                continue;
            };
            if let Err(e) = self.deliver(slot, vector) {
                self.stats.lock().ack_timeouts += 1;
                return Err(e);
            }
            delivered += 1;
        }
        self.stats.lock().rounds += 1;
        Ok(delivered)
    }

    /// Services rounds until |shutdown| is set, sleeping on the doorbell
    /// when a round finds nothing. Without auto-restart a single round is
    /// run.
    pub fn run(&self, shutdown: &AtomicBool) {
        loop {
            self.doorbell.acknowledge();
            if shutdown.load(Ordering::Acquire) {
                return;
            }
            let idle = match self.service_round() {
                Ok(delivered) => delivered == 0,
                Err(e) => {
                    error!("interrupt manager: {:?}", e);
                    false
                }
            };
            if !self.auto_restart {
                return;
            }
            if idle {
                self.doorbell.wait(None);
            }
        }
    }
}
