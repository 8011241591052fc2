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

use crate::{AccelEngine, Line, SchedulerBuffer};
use accel_interface::{wait_line, AccelError, ImageJob};
use accel_shared::TransferRequest;
use alloc::sync::Arc;
use log::{error, info};

/// FPGA-local buffers a group's image is staged through.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StagingArea {
    pub source: u32,
    pub destination: u32,
}

/// Acceleration scheduler for a group whose host buffers are reached
/// through the shared fetch and send schedulers.
pub struct IndirectScheduler {
    engine: AccelEngine,
    slot: usize,
    staging: StagingArea,
    fetch: Arc<SchedulerBuffer>,
    send: Arc<SchedulerBuffer>,
    start_line: Line,
    s2mm_line: Line,
}
impl IndirectScheduler {
    pub fn new(
        engine: AccelEngine,
        staging: StagingArea,
        fetch: Arc<SchedulerBuffer>,
        send: Arc<SchedulerBuffer>,
        start_line: Line,
        s2mm_line: Line,
    ) -> Result<Self, AccelError> {
        let slot = engine.group().sched_slot().ok_or(AccelError::InvalidGroup)?;
        Ok(Self {
            engine,
            slot,
            staging,
            fetch,
            send,
            start_line,
            s2mm_line,
        })
    }

    pub fn engine(&self) -> &AccelEngine { &self.engine }
    pub fn slot(&self) -> usize { self.slot }

    /// Stages the image in, runs the pass on the staging buffers and
    /// queues the result for the send scheduler, which notifies the host.
    pub fn run_pass(&self, job: &ImageJob) -> Result<(), AccelError> {
        let group = self.engine.group();
        let size = self.engine.transfer_size(job.rows, job.cols)?;

        self.fetch.settle(self.slot, self.start_line.as_ref())?;
        self.fetch.post(
            self.slot,
            &TransferRequest {
                source_address: job.source_address,
                destination_address: self.staging.source,
                data_size: size,
                offset: job.offset,
            },
        )?;
        wait_line(self.start_line.as_ref(), self.engine.timeout(), AccelError::StartTimeout)
            .map_err(|e| {
                error!("{}: staging never completed", group);
                e
            })?;
        self.start_line.acknowledge();

        self.engine.begin(job.rows, job.cols);
        self.engine.dma().start_s2mm(self.staging.destination as u64, size);
        self.engine.dma().start_mm2s(self.staging.source as u64, size);
        self.engine.wait_s2mm(self.s2mm_line.as_ref())?;
        self.engine.end();
        let irq = self.engine.dma().ack_both();
        self.engine.collect(irq)?;

        self.send.post(
            self.slot,
            &TransferRequest {
                source_address: self.staging.destination,
                destination_address: job.destination_address,
                data_size: size,
                offset: job.offset,
            },
        )?;
        info!("{}: pass done, {} bytes queued for send", group, size);
        Ok(())
    }
}
