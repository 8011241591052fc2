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

use crate::{AccelEngine, AxiDma, InterruptRequester, Line, PcieBridge};
use accel_interface::{AccelError, MemoryPort, SgJob};
use accel_regs::axi_dma::{ChannelRegs, MM2S, S2MM};
use accel_regs::DmaIrq;
use accel_shared::{page_len, pages_for, SG_ENTRY_SIZE};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::time::Duration;
use log::{error, info, trace};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SgChannel {
    Mm2s,
    S2mm,
}
impl SgChannel {
    fn regs(self) -> &'static ChannelRegs {
        match self {
            SgChannel::Mm2s => &MM2S,
            SgChannel::S2mm => &S2MM,
        }
    }
}

/// PCIe BAR a channel reaches host pages through, and the AXI address of
/// its window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SgWindow {
    pub bar: usize,
    pub address: u64,
}

/// Outcome of one scatter/gather transfer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SgReport {
    /// Pages per channel.
    pub pages: u32,
    /// Page completions in the order they were observed.
    pub completions: Vec<SgChannel>,
}

// Walk state private to one channel.
struct Walk {
    channel: SgChannel,
    list: u64,
    pages: u32,
    completed: u32,
    done: bool,
}

/// Moves an image between two paged host buffers: MM2S reads pages listed
/// at one scatter/gather list while S2MM writes pages listed at another.
/// The channels advance independently, each retargeting its own BAR
/// before every page.
pub struct SgDmaScheduler {
    dma: AxiDma,
    mm2s_line: Line,
    s2mm_line: Line,
    // Raised by either channel's line.
    shared_line: Line,
    memory: Arc<dyn MemoryPort>,
    bridge: PcieBridge,
    mm2s_window: SgWindow,
    s2mm_window: SgWindow,
    timeout: Option<Duration>,
}
impl SgDmaScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dma: AxiDma,
        mm2s_line: Line,
        s2mm_line: Line,
        shared_line: Line,
        memory: Arc<dyn MemoryPort>,
        bridge: PcieBridge,
        mm2s_window: SgWindow,
        s2mm_window: SgWindow,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            dma,
            mm2s_line,
            s2mm_line,
            shared_line,
            memory,
            bridge,
            mm2s_window,
            s2mm_window,
            timeout,
        }
    }

    fn line(&self, channel: SgChannel) -> &Line {
        match channel {
            SgChannel::Mm2s => &self.mm2s_line,
            SgChannel::S2mm => &self.s2mm_line,
        }
    }

    fn window(&self, channel: SgChannel) -> SgWindow {
        match channel {
            SgChannel::Mm2s => self.mm2s_window,
            SgChannel::S2mm => self.s2mm_window,
        }
    }

    // Maps the next page of |walk| and starts it. The translation must be
    // in place before the length write starts the channel.
    fn kick(&self, walk: &Walk, size: u32, page_size: u32) {
        let page = walk.completed;
        let entry = self
            .memory
            .read_u64(walk.list + page as u64 * SG_ENTRY_SIZE);
        let window = self.window(walk.channel);
        let len = page_len(size, page_size, page);
        trace!("{:?} page {}: {:#x} len {}", walk.channel, page, entry, len);
        self.bridge.set_translation(window.bar, entry);
        self.dma.start(walk.channel.regs(), window.address, len);
    }

    /// Transfers |size| bytes in |page_size| pages in both directions at
    /// once. Returns when both channels have finished their last page.
    pub fn transfer(
        &self,
        size: u32,
        page_size: u32,
        mm2s_list: u64,
        s2mm_list: u64,
    ) -> Result<SgReport, AccelError> {
        if size == 0 || page_size == 0 {
            return Err(AccelError::InvalidRequest);
        }
        let pages = pages_for(size, page_size);
        let new_walk = |channel, list| Walk {
            channel,
            list,
            pages,
            completed: 0,
            done: false,
        };
        let mut s2mm = new_walk(SgChannel::S2mm, s2mm_list);
        let mut mm2s = new_walk(SgChannel::Mm2s, mm2s_list);
        let mut report = SgReport {
            pages,
            completions: Vec::new(),
        };

        self.kick(&s2mm, size, page_size);
        self.kick(&mm2s, size, page_size);
        let mut both_done = 0;
        while both_done < 2 {
            self.shared_line.acknowledge();
            let mut progressed = false;
            for walk in [&mut mm2s, &mut s2mm] {
                if walk.done || !self.line(walk.channel).poll() {
                    continue;
                }
                progressed = true;
                let irq = self.dma.ack(walk.channel.regs());
                if irq.contains(DmaIrq::ERROR) {
                    error!("{:?}: error on page {}", walk.channel, walk.completed);
                    self.dma.reset();
                    return Err(AccelError::DmaError);
                }
                walk.completed += 1;
                report.completions.push(walk.channel);
                if walk.completed == walk.pages {
                    walk.done = true;
                    both_done += 1;
                } else {
                    self.kick(walk, size, page_size);
                }
            }
            if !progressed && !self.shared_line.wait(self.timeout) {
                error!(
                    "sg: timeout with mm2s {}/{} s2mm {}/{} pages",
                    mm2s.completed, pages, s2mm.completed, pages
                );
                self.dma.reset();
                return Err(AccelError::DmaTimeout);
            }
        }
        Ok(report)
    }
}

/// Acceleration scheduler for the scatter/gather group: a regular pass
/// whose data movement is the paged transfer above.
pub struct SgAccelScheduler {
    engine: AccelEngine,
    walker: SgDmaScheduler,
    page_size: u32,
    requester: Arc<InterruptRequester>,
}
impl SgAccelScheduler {
    pub fn new(
        engine: AccelEngine,
        walker: SgDmaScheduler,
        page_size: u32,
        requester: Arc<InterruptRequester>,
    ) -> Self {
        Self {
            engine,
            walker,
            page_size,
            requester,
        }
    }

    pub fn engine(&self) -> &AccelEngine { &self.engine }

    pub fn run_pass(&self, job: &SgJob) -> Result<SgReport, AccelError> {
        let size = self.engine.transfer_size(job.rows, job.cols)?;
        self.engine.begin(job.rows, job.cols);
        let report = self
            .walker
            .transfer(size, self.page_size, job.mm2s_sg_list, job.s2mm_sg_list)
            .map_err(|e| {
                self.engine.abort();
                e
            })?;
        self.engine.end();
        // Every page interrupt was acknowledged by the walker.
        self.engine.collect(DmaIrq::empty())?;
        self.requester.request(self.engine.group())?;
        info!(
            "{}: pass done, {} bytes in {} pages",
            self.engine.group(),
            size,
            report.pages
        );
        Ok(report)
    }
}
