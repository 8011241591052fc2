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

//! In-process stand-in for the accelerator fabric: register files, DMA
//! engines, the Sobel core, the PCIe bridge and the MSI controller, all
//! driven through the same seams the schedulers use on hardware.

mod apm;
mod cdma;
mod clock;
mod dma;
mod fabric;
mod line;
mod memory;
mod msi;
mod pcie;
mod regfile;
mod sobel;

pub use apm::SimApm;
pub use cdma::SimCdma;
pub use clock::SimClock;
pub use dma::{Channel, SimDma};
pub use fabric::{FakeFabric, GroupHw, SimOptions, BAR_WINDOW_SIZE};
pub use line::SimLine;
pub use memory::{SimBus, SimMemory};
pub use msi::{MsiAckGpio, MsiTriggerGpio, SimMsiController};
pub use pcie::SimPcieBridge;
pub use regfile::{Access, AccessLog, SimRegisterFile};
pub use sobel::{filter as sobel_filter, SimSobel};

/// How a simulated engine finishes a transfer once kicked.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Completion {
    /// The transfer completes inside the register write that starts it.
    Immediate,
    /// The transfer stays pending until a test fires it.
    Manual,
}

/// Identifies a device in the access log.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Device {
    Dma(usize),
    Apm(usize),
    TimerApm,
    Sobel(usize),
    CdmaFetch,
    CdmaSend,
    FetchBuffer,
    SendBuffer,
    IrqSlots,
    MsiTrigger,
    MsiAck,
    Pcie,
}
