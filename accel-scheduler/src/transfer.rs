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

use crate::{check_irq, Apm, Cdma, InterruptRequester, Line, MetricsRepository, PcieBridge};
use crate::{SchedulerBuffer, Signal};
use accel_interface::{wait_line, AccelError};
use accel_regs::sched_buffer::NUM_CLIENT_SLOTS;
use accel_shared::{AccelGroup, Phase, TransferRequest};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use log::{error, info, trace};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferKind {
    /// Host to FPGA staging; completion pulses the group's start line.
    Fetch,
    /// FPGA staging to host; completion notifies the host.
    Send,
}
impl TransferKind {
    fn phase(self) -> Phase {
        match self {
            TransferKind::Fetch => Phase::CdmaFetch,
            TransferKind::Send => Phase::CdmaSend,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TransferStats {
    pub served: u64,
    pub failed: u64,
}

/// Fetch or send scheduler: drains the four client slots of one
/// scheduler buffer through a CDMA, in fixed slot order.
pub struct TransferScheduler {
    kind: TransferKind,
    buffer: Arc<SchedulerBuffer>,
    cdma: Cdma,
    cdma_line: Line,
    bridge: PcieBridge,
    bar: usize,
    bar_address: u64,
    pcie_mode: bool,
    timer: Arc<Apm>,
    repository: Arc<MetricsRepository>,
    // Per-slot completion output: start lines for fetch, done lines for send.
    signals: Vec<Signal>,
    requester: Option<Arc<InterruptRequester>>,
    doorbell: Line,
    timeout: Option<Duration>,
    stats: spin::Mutex<TransferStats>,
}
impl TransferScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TransferKind,
        buffer: Arc<SchedulerBuffer>,
        cdma: Cdma,
        cdma_line: Line,
        bridge: PcieBridge,
        bar: usize,
        bar_address: u64,
        pcie_mode: bool,
        timer: Arc<Apm>,
        repository: Arc<MetricsRepository>,
        signals: Vec<Signal>,
        requester: Option<Arc<InterruptRequester>>,
        doorbell: Line,
        timeout: Option<Duration>,
    ) -> Result<Self, AccelError> {
        if signals.len() != NUM_CLIENT_SLOTS {
            return Err(AccelError::InvalidSlot);
        }
        Ok(Self {
            kind,
            buffer,
            cdma,
            cdma_line,
            bridge,
            bar,
            bar_address,
            pcie_mode,
            timer,
            repository,
            signals,
            requester,
            doorbell,
            timeout,
            stats: spin::Mutex::new(TransferStats::default()),
        })
    }

    pub fn kind(&self) -> TransferKind { self.kind }
    pub fn stats(&self) -> TransferStats { *self.stats.lock() }

    // Returns the CDMA source and destination for |request|. With PCIe
    // the host side goes through the BAR window, retargeted at the
    // request's host address.
    fn resolve(&self, request: &TransferRequest) -> (u64, u64) {
        let source = request.source_address as u64;
        let destination = request.destination_address as u64;
        let offset = request.offset as u64;
        match (self.kind, self.pcie_mode) {
            (TransferKind::Fetch, true) => {
                self.bridge.set_translation(self.bar, source);
                (self.bar_address + offset, destination)
            }
            (TransferKind::Fetch, false) => (source + offset, destination),
            (TransferKind::Send, true) => {
                self.bridge.set_translation(self.bar, destination);
                (source, self.bar_address + offset)
            }
            (TransferKind::Send, false) => (source, destination + offset),
        }
    }

    fn serve(&self, slot: usize, request: &TransferRequest) -> Result<(), AccelError> {
        let group = AccelGroup::from_sched_slot(slot).ok_or(AccelError::InvalidSlot)?;
        let phase = self.kind.phase();
        trace!("{:?} slot {}: {:?}", self.kind, slot, request);

        self.cdma.enable_irqs();
        let (source, destination) = self.resolve(request);
        self.cdma.program(source, destination);
        let now = self.timer.global_clock();
        self.repository.update(group, |m| m.record_start(phase, now));
        self.cdma.start(request.data_size);
        let waited = wait_line(self.cdma_line.as_ref(), self.timeout, AccelError::CdmaTimeout);
        if waited.is_ok() {
            let now = self.timer.global_clock();
            self.repository.update(group, |m| m.record_end(phase, now));
        }
        let irq = self.cdma.ack();
        self.cdma.reset();
        let result = waited
            .and_then(|_| check_irq(irq, AccelError::CdmaError))
            .and_then(|_| self.notify_host(group));
        if let Err(e) = result {
            self.buffer.release(slot);
            return Err(e);
        }
        self.stats.lock().served += 1;
        self.buffer.complete(slot, self.signals[slot].as_ref());
        info!("{:?} slot {}: {} bytes", self.kind, slot, request.data_size);
        Ok(())
    }

    fn notify_host(&self, group: AccelGroup) -> Result<(), AccelError> {
        match (&self.requester, self.kind, self.pcie_mode) {
            (Some(requester), TransferKind::Send, true) => requester.request(group),
            _ => Ok(()),
        }
    }

    /// Visits the four slots once in order 0..N and serves every claimed
    /// one. A failed transfer frees its slot without signalling, so the
    /// client sees its own timeout. Returns the number of slots visited
    /// with a request.
    pub fn scan_once(&self) -> usize {
        let mut claimed = 0;
        for slot in 0..NUM_CLIENT_SLOTS {
            let Some(request) = self.buffer.peek(slot) else {
                continue;
            };
            claimed += 1;
            if let Err(e) = self.serve(slot, &request) {
                error!("{:?} slot {}: {:?}", self.kind, slot, e);
                self.stats.lock().failed += 1;
            }
        }
        claimed
    }

    /// Scans until |shutdown| is set, sleeping on the doorbell when a
    /// scan finds nothing.
    pub fn run(&self, shutdown: &AtomicBool) {
        loop {
            self.doorbell.acknowledge();
            if shutdown.load(Ordering::Acquire) {
                return;
            }
            if self.scan_once() == 0 {
                self.doorbell.wait(None);
            }
        }
    }
}
