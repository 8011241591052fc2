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

use crate::{check_irq, Apm, AxiDma, MetricsRepository, SobelCore};
use accel_interface::{AccelError, IrqLine};
use accel_regs::DmaIrq;
use accel_shared::{image_bytes, AccelGroup, Phase};
use alloc::sync::Arc;
use core::time::Duration;
use log::{error, trace};

/// Devices private to one acceleration group.
#[derive(Clone)]
pub struct GroupDevices {
    pub apm: Apm,
    pub dma: AxiDma,
    pub sobel: SobelCore,
}

/// The part of an acceleration pass shared by every group kind: metrics
/// bracketing, Sobel kickoff and DMA completion handling.
pub struct AccelEngine {
    group: AccelGroup,
    devices: GroupDevices,
    timer: Arc<Apm>,
    repository: Arc<MetricsRepository>,
    timeout: Option<Duration>,
}
impl AccelEngine {
    pub fn new(
        group: AccelGroup,
        devices: GroupDevices,
        timer: Arc<Apm>,
        repository: Arc<MetricsRepository>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            group,
            devices,
            timer,
            repository,
            timeout,
        }
    }

    pub fn group(&self) -> AccelGroup { self.group }
    pub fn dma(&self) -> &AxiDma { &self.devices.dma }
    pub fn timeout(&self) -> Option<Duration> { self.timeout }

    /// Bytes moved for a |rows| x |cols| image; empty or oversized images
    /// are rejected.
    pub fn transfer_size(&self, rows: u32, cols: u32) -> Result<u32, AccelError> {
        match image_bytes(rows, cols) {
            Some(size) if size != 0 => Ok(size),
            _ => Err(AccelError::InvalidRequest),
        }
    }

    /// Enables the counters, stamps the start of the pass and starts the
    /// Sobel core.
    pub fn begin(&self, rows: u32, cols: u32) {
        self.devices.apm.enable();
        let now = self.timer.global_clock();
        self.repository.update(self.group, |m| {
            m.record_start(Phase::DmaAccel, now);
            m.image_rows = rows;
            m.image_cols = cols;
        });
        self.devices.sobel.configure(rows, cols);
        self.devices.sobel.start();
        trace!("{}: begin {}x{}", self.group, rows, cols);
    }

    /// Waits for the S2MM channel. On expiry the engine is torn down and
    /// a pending error interrupt takes precedence over the timeout.
    pub fn wait_s2mm(&self, line: &dyn IrqLine) -> Result<(), AccelError> {
        if line.wait(self.timeout) {
            return Ok(());
        }
        let irq = self.devices.dma.ack_both();
        self.abort();
        let err = if irq.contains(DmaIrq::ERROR) {
            AccelError::DmaError
        } else {
            AccelError::DmaTimeout
        };
        error!("{}: s2mm never completed: {:?}", self.group, err);
        Err(err)
    }

    /// Stamps the end of the pass and stops the counters.
    pub fn end(&self) {
        let now = self.timer.global_clock();
        self.repository
            .update(self.group, |m| m.record_end(Phase::DmaAccel, now));
        self.devices.apm.disable();
    }

    /// Snapshots the counters into the group's record and re-arms them.
    /// |irq| are the interrupt bits acknowledged for the pass.
    pub fn collect(&self, irq: DmaIrq) -> Result<(), AccelError> {
        let apm = &self.devices.apm;
        self.repository.update(self.group, |m| apm.snapshot(m));
        apm.reset_and_enable();
        check_irq(irq, AccelError::DmaError).map_err(|e| {
            error!("{}: DMA reported an error", self.group);
            e
        })
    }

    /// Leaves the group ready for another pass after a failure. The end
    /// stamp stays unwritten.
    pub fn abort(&self) {
        self.devices.dma.reset();
        self.devices.apm.reset_and_enable();
    }
}
