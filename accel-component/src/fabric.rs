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

use crate::FabricConfig;
use accel_interface::*;
use accel_regs::intr_manager::request_slot;
use accel_scheduler::*;
use accel_shared::*;
use fake_accel_hw::{Completion, FakeFabric, SimOptions};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The accelerator fabric with its schedulers running. Passes on
/// different groups may run concurrently from different threads; a group
/// already running rejects a second pass with GroupBusy.
pub struct Fabric {
    config: FabricConfig,
    hw: Arc<FakeFabric>,
    timer: Arc<Apm>,
    repository: Arc<MetricsRepository>,
    fetch_buffer: Arc<SchedulerBuffer>,
    send_buffer: Arc<SchedulerBuffer>,
    requester: Arc<InterruptRequester>,
    direct: Vec<DirectScheduler>,
    indirect: Vec<IndirectScheduler>,
    sg: SgAccelScheduler,
    fetch: Arc<TransferScheduler>,
    send: Arc<TransferScheduler>,
    manager: Arc<InterruptManager>,
    shutdown: Arc<AtomicBool>,
    threads: spin::Mutex<Vec<JoinHandle<()>>>,
}

impl Fabric {
    pub fn new(config: FabricConfig) -> Result<Self, AccelError> {
        let options = SimOptions {
            completion: Completion::Immediate,
            msi_ack: Completion::Immediate,
            bar_windows: config.bar_addresses.clone(),
            sched_buffer: config.sched_buffer,
        };
        Self::with_hardware(config, FakeFabric::new(&options))
    }

    /// Wires the schedulers over |hw| and starts the service threads.
    pub fn with_hardware(config: FabricConfig, hw: FakeFabric) -> Result<Self, AccelError> {
        let hw = Arc::new(hw);
        let timeout = config.irq_timeout;
        let bar = |index| config.bar_address(index).ok_or(AccelError::InvalidRequest);

        let timer = Arc::new(Apm::new(hw.timer_apm.clone()));
        timer.enable_clock();
        let repository = Arc::new(MetricsRepository::new());
        let requester = Arc::new(InterruptRequester::new(
            hw.irq_slots.clone(),
            hw.irq_doorbell.clone(),
        ));
        let fetch_buffer = Arc::new(SchedulerBuffer::new(
            hw.fetch_buffer.clone(),
            config.sched_buffer,
            Some(hw.fetch_doorbell.clone() as Signal),
        ));
        let send_buffer = Arc::new(SchedulerBuffer::new(
            hw.send_buffer.clone(),
            config.sched_buffer,
            Some(hw.send_doorbell.clone() as Signal),
        ));

        let engine = |group: AccelGroup| {
            let g = hw.group(group);
            AccelEngine::new(
                group,
                GroupDevices {
                    apm: Apm::new(g.apm.clone()),
                    dma: AxiDma::new(g.dma.clone()),
                    sobel: SobelCore::new(g.sobel.clone()),
                },
                timer.clone(),
                repository.clone(),
                timeout,
            )
        };

        let mut direct = Vec::new();
        let mut indirect = Vec::new();
        let mut sg = None;
        for group in AccelGroup::all() {
            let g = hw.group(group);
            match group.kind() {
                GroupKind::Direct => direct.push(DirectScheduler::new(
                    engine(group),
                    g.s2mm_line.clone(),
                    requester.clone(),
                )),
                GroupKind::Indirect => {
                    let slot = group.sched_slot().ok_or(AccelError::InvalidGroup)?;
                    let source = config.staging_base + slot as u32 * config.staging_stride;
                    indirect.push(IndirectScheduler::new(
                        engine(group),
                        StagingArea {
                            source,
                            destination: source + config.staging_stride / 2,
                        },
                        fetch_buffer.clone(),
                        send_buffer.clone(),
                        hw.start_lines[slot].clone(),
                        g.s2mm_line.clone(),
                    )?)
                }
                GroupKind::ScatterGather => {
                    let walker = SgDmaScheduler::new(
                        AxiDma::new(g.dma.clone()),
                        g.mm2s_line.clone(),
                        g.s2mm_line.clone(),
                        hw.sg_line.clone(),
                        hw.memory.clone(),
                        PcieBridge::new(hw.bridge.clone()),
                        SgWindow {
                            bar: config.mm2s_sg_bar,
                            address: bar(config.mm2s_sg_bar)?,
                        },
                        SgWindow {
                            bar: config.s2mm_sg_bar,
                            address: bar(config.s2mm_sg_bar)?,
                        },
                        timeout,
                    );
                    sg = Some(SgAccelScheduler::new(
                        engine(group),
                        walker,
                        config.page_size,
                        requester.clone(),
                    ));
                }
            }
        }
        let sg = sg.ok_or(AccelError::InvalidGroup)?;

        let fetch = Arc::new(TransferScheduler::new(
            TransferKind::Fetch,
            fetch_buffer.clone(),
            Cdma::new(hw.cdma_fetch.clone()),
            hw.cdma_fetch_line.clone(),
            PcieBridge::new(hw.bridge.clone()),
            config.fetch_bar,
            bar(config.fetch_bar)?,
            config.pcie_mode,
            timer.clone(),
            repository.clone(),
            hw.start_lines.iter().map(|l| l.clone() as Signal).collect(),
            None,
            hw.fetch_doorbell.clone(),
            timeout,
        )?);
        let send = Arc::new(TransferScheduler::new(
            TransferKind::Send,
            send_buffer.clone(),
            Cdma::new(hw.cdma_send.clone()),
            hw.cdma_send_line.clone(),
            PcieBridge::new(hw.bridge.clone()),
            config.send_bar,
            bar(config.send_bar)?,
            config.pcie_mode,
            timer.clone(),
            repository.clone(),
            hw.done_lines.iter().map(|l| l.clone() as Signal).collect(),
            Some(requester.clone()),
            hw.send_doorbell.clone(),
            timeout,
        )?);
        let manager = Arc::new(InterruptManager::new(
            requester.clone(),
            hw.msi_trigger.clone(),
            hw.msi_ack.clone(),
            hw.msi_ack_line.clone(),
            hw.irq_doorbell.clone(),
            timeout,
            config.auto_restart,
        ));

        let fabric = Self {
            config,
            hw,
            timer,
            repository,
            fetch_buffer,
            send_buffer,
            requester,
            direct,
            indirect,
            sg,
            fetch,
            send,
            manager,
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: spin::Mutex::new(Vec::new()),
        };
        fabric.start()?;
        info!(
            "fabric up: pcie_mode {} page_size {} timeout {:?}",
            fabric.config.pcie_mode, fabric.config.page_size, fabric.config.irq_timeout
        );
        Ok(fabric)
    }

    fn spawn(&self, name: &str, body: impl FnOnce() + Send + 'static) -> Result<(), AccelError> {
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(body)
            .map_err(|e| {
                error!("{}: spawn failed: {}", name, e);
                AccelError::UnknownError
            })?;
        self.threads.lock().push(handle);
        Ok(())
    }

    fn start(&self) -> Result<(), AccelError> {
        let (fetch, shutdown) = (self.fetch.clone(), self.shutdown.clone());
        self.spawn("fetch", move || fetch.run(&shutdown))?;
        let (send, shutdown) = (self.send.clone(), self.shutdown.clone());
        self.spawn("send", move || send.run(&shutdown))?;

        let (manager, shutdown) = (self.manager.clone(), self.shutdown.clone());
        let doorbell = self.hw.irq_doorbell.clone();
        let auto_restart = self.config.auto_restart;
        self.spawn("intr-manager", move || {
            // Without auto-restart each round is started again from here
            // once another request rings the doorbell.
            while !shutdown.load(Ordering::Acquire) {
                manager.run(&shutdown);
                if !auto_restart {
                    doorbell.wait(None);
                }
            }
        })
    }

    /// Stops the service threads between rounds and joins them.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.hw.fetch_doorbell.raise();
        self.hw.send_doorbell.raise();
        self.hw.irq_doorbell.raise();
        for handle in self.threads.lock().drain(..) {
            let _ = handle.join();
        }
        info!("fabric down");
    }

    pub fn config(&self) -> &FabricConfig { &self.config }

    /// The simulated hardware, for host-side memory access.
    pub fn hw(&self) -> &FakeFabric { &self.hw }

    pub fn metrics(&self, group: AccelGroup) -> Metrics { self.repository.read(group) }

    pub fn repository(&self) -> SharedRepository { self.repository.snapshot() }

    pub fn fetch_stats(&self) -> TransferStats { self.fetch.stats() }
    pub fn send_stats(&self) -> TransferStats { self.send.stats() }
    pub fn interrupt_stats(&self) -> InterruptManagerStats { self.manager.stats() }

    fn stamp(&self, group: AccelGroup, phase: Phase, edge: Edge) {
        let now = self.timer.global_clock();
        self.repository.update(group, |m| match edge {
            Edge::Start => m.record_start(phase, now),
            Edge::End => m.record_end(phase, now),
        });
    }

    // Clears what an abandoned pass on |group| may have left behind, so a
    // late done line or vector cannot complete this pass.
    fn settle(&self, group: AccelGroup) -> Result<(), AccelError> {
        if let Some(slot) = group.sched_slot() {
            self.send_buffer.settle(slot, self.hw.done_lines[slot].as_ref())?;
        }
        self.requester.settle(group, || {
            let stale = self.hw.msi.discard(group.vector());
            if stale > 0 {
                warn!("{}: dropped {} late completion vectors", group, stale);
            }
        })
    }

    // Blocks until the host has received |group|'s completion.
    fn wait_notification(&self, group: AccelGroup) -> Result<(), AccelError> {
        self.stamp(group, Phase::Sleep, Edge::Start);
        if let Some(slot) = group.sched_slot() {
            let done = &self.hw.done_lines[slot];
            wait_line(done.as_ref(), self.config.irq_timeout, AccelError::CompletionTimeout)?;
            done.acknowledge();
        }
        let routed_to_host = group.kind() != GroupKind::Indirect || self.config.pcie_mode;
        if routed_to_host && !self.hw.msi.take_vector(group.vector(), self.config.irq_timeout) {
            error!("{}: completion vector never arrived", group);
            return Err(AccelError::CompletionTimeout);
        }
        self.stamp(group, Phase::Sleep, Edge::End);
        Ok(())
    }

    fn run_exclusive(
        &self,
        group: AccelGroup,
        pid: u32,
        pass: impl FnOnce() -> Result<(), AccelError>,
    ) -> Result<Metrics, AccelError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(AccelError::ShuttingDown);
        }
        self.repository.occupy(group, pid)?;
        self.stamp(group, Phase::Total, Edge::Start);
        let result = self
            .settle(group)
            .and_then(|_| pass())
            .and_then(|_| self.wait_notification(group));
        if result.is_ok() {
            self.stamp(group, Phase::Total, Edge::End);
        }
        self.repository.release(group);
        result.map(|_| self.repository.read(group)).map_err(|e| {
            warn!("{}: pass for pid {} failed: {:?}", group, pid, e);
            e
        })
    }

    /// Runs one pass of |job| on a direct or indirect |group| for |pid| and
    /// returns once the host has been notified.
    pub fn accelerate(
        &self,
        group: AccelGroup,
        pid: u32,
        job: &ImageJob,
    ) -> Result<Metrics, AccelError> {
        match group.kind() {
            GroupKind::Direct => {
                let scheduler = &self.direct[group.index()];
                self.run_exclusive(group, pid, || scheduler.run_pass(job))
            }
            GroupKind::Indirect => {
                let slot = group.sched_slot().ok_or(AccelError::InvalidGroup)?;
                let scheduler = &self.indirect[slot];
                self.run_exclusive(group, pid, || scheduler.run_pass(job))
            }
            GroupKind::ScatterGather => Err(AccelError::InvalidGroup),
        }
    }

    /// Runs one pass on the scatter/gather group.
    pub fn accelerate_sg(&self, pid: u32, job: &SgJob) -> Result<Metrics, AccelError> {
        let group = self.sg.engine().group();
        self.run_exclusive(group, pid, || self.sg.run_pass(job).map(|_| ()))
    }

    /// Logs scheduler buffers, interrupt slots, occupancy and metrics.
    pub fn debug_state(&self) {
        let status = self.repository.status();
        info!(
            "busy {} pids {:?}",
            status.accelerator_busy, status.occupied_pid
        );
        for slot in 0..NUM_SCHED_CLIENTS {
            info!(
                "slot {}: fetch {:?} send {:?}",
                slot,
                self.fetch_buffer.peek(slot),
                self.send_buffer.peek(slot)
            );
        }
        let pending: Vec<u32> = (0..NUM_ACCEL_GROUPS)
            .map(|i| self.hw.irq_slots.read(request_slot(i)))
            .collect();
        info!("irq slots {:?} {:?}", pending, self.manager.stats());
        info!("fetch {:?} send {:?}", self.fetch.stats(), self.send.stats());
        for group in AccelGroup::all() {
            let m = self.repository.read(group);
            info!(
                "{}: {}x{} dma {:?} fetch {:?} send {:?} total {:?} bytes r{} w{}",
                group,
                m.image_rows,
                m.image_cols,
                m.elapsed(Phase::DmaAccel),
                m.elapsed(Phase::CdmaFetch),
                m.elapsed(Phase::CdmaSend),
                m.elapsed(Phase::Total),
                m.apm_read_bytes,
                m.apm_write_bytes
            );
        }
    }

    /// Decodes one postcard request, serves it and encodes the reply.
    /// Returns the reply length.
    pub fn dispatch(
        &self,
        request_buffer: &[u8],
        reply_buffer: &mut [u8],
    ) -> Result<usize, AccelError> {
        let request = match postcard::from_bytes::<AccelRequest>(request_buffer) {
            Ok(request) => request,
            Err(_) => return Err(AccelError::DeserializeFailed),
        };
        match request {
            AccelRequest::Accelerate { group, pid, job } => {
                let group = AccelGroup::new(group as usize).ok_or(AccelError::InvalidGroup)?;
                let metrics = self.accelerate(group, pid, &job)?;
                Self::reply(&AccelerateResponse { group, metrics }, reply_buffer)
            }
            AccelRequest::AccelerateSg { pid, job } => {
                let metrics = self.accelerate_sg(pid, &job)?;
                let group = self.sg.engine().group();
                Self::reply(&AccelerateResponse { group, metrics }, reply_buffer)
            }
            AccelRequest::GetMetrics { group } => {
                let group = AccelGroup::new(group as usize).ok_or(AccelError::InvalidGroup)?;
                let metrics = self.metrics(group);
                Self::reply(&GetMetricsResponse { metrics }, reply_buffer)
            }
            AccelRequest::DebugState => {
                self.debug_state();
                Self::reply(&(), reply_buffer)
            }
        }
    }

    fn reply<T: serde::Serialize>(reply: &T, reply_buffer: &mut [u8]) -> Result<usize, AccelError> {
        let reply_slice =
            postcard::to_slice(reply, reply_buffer).or(Err(AccelError::SerializeFailed))?;
        Ok(reply_slice.len())
    }
}

impl AccelTransport for Fabric {
    fn call(&self, request: &[u8], reply: &mut [u8]) -> AccelError {
        match self.dispatch(request, reply) {
            Ok(_) => AccelError::Success,
            Err(e) => e,
        }
    }
}

impl Drop for Fabric {
    fn drop(&mut self) { self.shutdown(); }
}
