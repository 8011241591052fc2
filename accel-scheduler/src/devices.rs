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

//! Thin drivers for the devices each scheduler touches. Register writes
//! follow the order the hardware requires: the final write of each start
//! sequence is the one that triggers the engine.

use crate::Regs;
use accel_interface::AccelError;
use accel_regs::axi_dma::{self, ChannelRegs};
use accel_regs::{apm, cdma, pcie, sobel, DmaIrq, IRQ_ALL_MASK};
use accel_shared::Metrics;
use log::trace;

fn split(address: u64) -> (u32, u32) { (address as u32, (address >> 32) as u32) }

/// Maps acknowledged interrupt bits to the error they report, if any.
pub fn check_irq(irq: DmaIrq, err: AccelError) -> Result<(), AccelError> {
    if irq.contains(DmaIrq::ERROR) {
        Err(err)
    } else {
        Ok(())
    }
}

#[derive(Clone)]
pub struct AxiDma {
    regs: Regs,
}
impl AxiDma {
    pub fn new(regs: Regs) -> Self { Self { regs } }

    /// Starts |channel| moving |length| bytes at |address|. Writing LENGTH
    /// starts the transfer so it goes last.
    pub fn start(&self, channel: &ChannelRegs, address: u64, length: u32) {
        trace!("dma start {:#x} {:#x} len {}", channel.control, address, length);
        let (lower, upper) = split(address);
        self.regs.write(channel.control, axi_dma::start_word());
        self.regs.write(channel.address, lower);
        self.regs.write(channel.address_msb, upper);
        self.regs.write(channel.length, length);
    }

    pub fn start_s2mm(&self, destination: u64, length: u32) {
        self.start(&axi_dma::S2MM, destination, length)
    }

    pub fn start_mm2s(&self, source: u64, length: u32) {
        self.start(&axi_dma::MM2S, source, length)
    }

    /// Reads |channel|'s interrupt bits and clears all of them in a single
    /// write. Returns the bits that were set.
    pub fn ack(&self, channel: &ChannelRegs) -> DmaIrq {
        let irq = DmaIrq::from_bits_truncate(self.regs.read(channel.status));
        self.regs.write(channel.status, IRQ_ALL_MASK);
        irq
    }

    pub fn ack_both(&self) -> DmaIrq { self.ack(&axi_dma::S2MM) | self.ack(&axi_dma::MM2S) }

    pub fn reset(&self) { self.regs.write(axi_dma::MM2S_DMACR, axi_dma::DMACR_RESET); }
}

#[derive(Clone)]
pub struct Cdma {
    regs: Regs,
}
impl Cdma {
    pub fn new(regs: Regs) -> Self { Self { regs } }

    pub fn enable_irqs(&self) { self.regs.write(cdma::CDMACR, cdma::irq_enable_word()); }

    pub fn program(&self, source: u64, destination: u64) {
        let (sa, sa_msb) = split(source);
        let (da, da_msb) = split(destination);
        self.regs.write(cdma::SA, sa);
        self.regs.write(cdma::SA_MSB, sa_msb);
        self.regs.write(cdma::DA, da);
        self.regs.write(cdma::DA_MSB, da_msb);
    }

    /// Writing the byte count starts the copy.
    pub fn start(&self, bytes: u32) { self.regs.write(cdma::BTT, bytes); }

    pub fn ack(&self) -> DmaIrq {
        let irq = DmaIrq::from_bits_truncate(self.regs.read(cdma::CDMASR));
        self.regs.write(cdma::CDMASR, IRQ_ALL_MASK);
        irq
    }

    /// Resets the core; interrupts must be re-enabled afterwards.
    pub fn reset(&self) {
        self.regs.write(cdma::CDMACR, cdma::CDMACR_RESET);
        self.enable_irqs();
    }
}

#[derive(Clone)]
pub struct Apm {
    regs: Regs,
}
impl Apm {
    pub fn new(regs: Regs) -> Self { Self { regs } }

    pub fn enable(&self) {
        self.regs.write(apm::CONTROL, apm::CONTROL_GCC_ENABLE | apm::CONTROL_MCE);
    }

    pub fn disable(&self) { self.regs.write(apm::CONTROL, 0); }

    /// Starts only the global clock counter, as on the timer monitor.
    pub fn enable_clock(&self) { self.regs.write(apm::CONTROL, apm::CONTROL_GCC_ENABLE); }

    pub fn reset_and_enable(&self) {
        self.regs.write(apm::CONTROL, apm::CONTROL_GCC_RESET | apm::CONTROL_MC_RESET);
        self.enable();
    }

    pub fn global_clock(&self) -> u64 {
        let upper = self.regs.read(apm::GCC_MSW);
        let lower = self.regs.read(apm::GCC_LSW);
        ((upper as u64) << 32) | lower as u64
    }

    /// Copies the metric counters and the global clock counter into
    /// |metrics|.
    pub fn snapshot(&self, metrics: &mut Metrics) {
        let counter = |i| self.regs.read(apm::metric_counter(i));
        metrics.apm_read_transactions = counter(apm::MC_READ_TRANSACTIONS);
        metrics.apm_read_bytes = counter(apm::MC_READ_BYTES);
        metrics.apm_write_transactions = counter(apm::MC_WRITE_TRANSACTIONS);
        metrics.apm_write_bytes = counter(apm::MC_WRITE_BYTES);
        metrics.apm_packets = counter(apm::MC_PACKETS);
        metrics.apm_bytes = counter(apm::MC_BYTES);
        metrics.set_gcc(self.global_clock());
    }
}

#[derive(Clone)]
pub struct SobelCore {
    regs: Regs,
}
impl SobelCore {
    pub fn new(regs: Regs) -> Self { Self { regs } }

    pub fn configure(&self, rows: u32, cols: u32) {
        self.regs.write(sobel::ROWS, rows);
        self.regs.write(sobel::COLS, cols);
    }

    pub fn start(&self) { self.regs.write(sobel::CTRL, sobel::CTRL_AP_START); }
}

#[derive(Clone)]
pub struct PcieBridge {
    regs: Regs,
}
impl PcieBridge {
    pub fn new(regs: Regs) -> Self { Self { regs } }

    /// Points AXI BAR |bar| at host address |address|.
    pub fn set_translation(&self, bar: usize, address: u64) {
        let (lower, upper) = split(address);
        self.regs.write(pcie::axibar2pciebar_u(bar), upper);
        self.regs.write(pcie::axibar2pciebar_l(bar), lower);
    }
}
