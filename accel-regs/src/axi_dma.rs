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

//! AXI DMA in direct-register mode.

use modular_bitfield::prelude::*;

pub const MM2S_DMACR: usize = 0x00;
pub const MM2S_DMASR: usize = 0x04;
pub const MM2S_SA: usize = 0x18;
pub const MM2S_SA_MSB: usize = 0x1C;
pub const MM2S_LENGTH: usize = 0x28;

pub const S2MM_DMACR: usize = 0x30;
pub const S2MM_DMASR: usize = 0x34;
pub const S2MM_DA: usize = 0x48;
pub const S2MM_DA_MSB: usize = 0x4C;
pub const S2MM_LENGTH: usize = 0x58;

pub const DMACR_RUN_STOP: u32 = 0x1;
pub const DMACR_RESET: u32 = crate::RESET_MASK;
pub const DMASR_HALTED: u32 = 0x1;
pub const DMASR_IDLE: u32 = 0x2;

/// Register offsets of one direction of the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChannelRegs {
    pub control: usize,
    pub status: usize,
    pub address: usize,
    pub address_msb: usize,
    pub length: usize,
}
pub const MM2S: ChannelRegs = ChannelRegs {
    control: MM2S_DMACR,
    status: MM2S_DMASR,
    address: MM2S_SA,
    address_msb: MM2S_SA_MSB,
    length: MM2S_LENGTH,
};
pub const S2MM: ChannelRegs = ChannelRegs {
    control: S2MM_DMACR,
    status: S2MM_DMASR,
    address: S2MM_DA,
    address_msb: S2MM_DA_MSB,
    length: S2MM_LENGTH,
};

#[bitfield]
pub struct DmaCr {
    pub run_stop: bool,
    #[skip]
    _unused0: B1,
    pub reset: bool,
    pub keyhole: bool,
    pub cyclic_bd_enable: bool,
    #[skip]
    _unused1: B7,
    pub ioc_irq_en: bool,
    pub dly_irq_en: bool,
    pub err_irq_en: bool,
    #[skip]
    _unused2: B1,
    pub irq_threshold: B8,
    pub irq_delay: B8,
}

#[bitfield]
pub struct DmaSr {
    pub halted: bool,
    pub idle: bool,
    #[skip]
    _unused0: B1,
    pub sg_incld: bool,
    pub dma_int_err: bool,
    pub dma_slv_err: bool,
    pub dma_dec_err: bool,
    #[skip]
    _unused1: B1,
    pub sg_int_err: bool,
    pub sg_slv_err: bool,
    pub sg_dec_err: bool,
    #[skip]
    _unused2: B1,
    pub ioc_irq: bool,
    pub dly_irq: bool,
    pub err_irq: bool,
    #[skip]
    _unused3: B1,
    pub irq_threshold_sts: B8,
    pub irq_delay_sts: B8,
}

/// Control word that starts a channel with every interrupt enabled.
pub fn start_word() -> u32 {
    crate::to_word(
        DmaCr::new()
            .with_run_stop(true)
            .with_ioc_irq_en(true)
            .with_dly_irq_en(true)
            .with_err_irq_en(true)
            .into_bytes(),
    )
}
