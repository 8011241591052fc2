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

//! Control plane of the Sobel accelerator fabric: the scheduler buffers,
//! the interrupt manager, the per-group acceleration schedulers, the
//! shared fetch/send schedulers and the scatter/gather page walker.
//!
//! Every scheduler is a plain struct over the register/line seams from
//! accel-interface. Free-running services (fetch, send, interrupt
//! manager) expose a `run` loop meant for a dedicated thread; the
//! acceleration schedulers expose a synchronous `run_pass`.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod devices;
mod direct;
mod engine;
mod indirect;
mod intr_manager;
mod repository;
mod sched_buffer;
mod sg;
mod transfer;

pub use devices::*;
pub use direct::DirectScheduler;
pub use engine::{AccelEngine, GroupDevices};
pub use indirect::{IndirectScheduler, StagingArea};
pub use intr_manager::{InterruptManager, InterruptManagerStats, InterruptRequester};
pub use repository::MetricsRepository;
pub use sched_buffer::SchedulerBuffer;
pub use sg::{SgAccelScheduler, SgChannel, SgDmaScheduler, SgReport, SgWindow};
pub use transfer::{TransferKind, TransferScheduler, TransferStats};

use accel_interface::{IrqLine, OutputLine, RegisterBlock};
use alloc::sync::Arc;

pub type Regs = Arc<dyn RegisterBlock>;
pub type Line = Arc<dyn IrqLine>;
pub type Signal = Arc<dyn OutputLine>;
