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

use crate::{AccelEngine, InterruptRequester, Line};
use accel_interface::{AccelError, ImageJob};
use alloc::sync::Arc;
use log::info;

/// Acceleration scheduler for a group whose host buffers the DMA can
/// reach directly.
pub struct DirectScheduler {
    engine: AccelEngine,
    s2mm_line: Line,
    requester: Arc<InterruptRequester>,
}
impl DirectScheduler {
    pub fn new(engine: AccelEngine, s2mm_line: Line, requester: Arc<InterruptRequester>) -> Self {
        Self {
            engine,
            s2mm_line,
            requester,
        }
    }

    pub fn engine(&self) -> &AccelEngine { &self.engine }

    /// Runs one pass to completion and posts the group's notification.
    pub fn run_pass(&self, job: &ImageJob) -> Result<(), AccelError> {
        let size = self.engine.transfer_size(job.rows, job.cols)?;
        let destination = job.destination_address as u64 + job.offset as u64;
        let source = job.source_address as u64 + job.offset as u64;

        self.engine.begin(job.rows, job.cols);
        self.engine.dma().start_s2mm(destination, size);
        self.engine.dma().start_mm2s(source, size);
        self.engine.wait_s2mm(self.s2mm_line.as_ref())?;
        self.engine.end();
        let irq = self.engine.dma().ack_both();
        self.engine.collect(irq)?;
        self.requester.request(self.engine.group())?;
        info!("{}: pass done, {} bytes", self.engine.group(), size);
        Ok(())
    }
}
