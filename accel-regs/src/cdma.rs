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

//! AXI central DMA, simple mode. Writing BTT starts the copy.

use modular_bitfield::prelude::*;

pub const CDMACR: usize = 0x00;
pub const CDMASR: usize = 0x04;
pub const SA: usize = 0x18;
pub const SA_MSB: usize = 0x1C;
pub const DA: usize = 0x20;
pub const DA_MSB: usize = 0x24;
pub const BTT: usize = 0x28;

pub const CDMACR_RESET: u32 = crate::RESET_MASK;

#[bitfield]
pub struct CdmaCr {
    #[skip]
    _unused0: B2,
    pub reset: bool,
    pub sg_mode: bool,
    pub key_hole_read: bool,
    pub key_hole_write: bool,
    pub cyclic_bd_enable: bool,
    #[skip]
    _unused1: B5,
    pub ioc_irq_en: bool,
    pub dly_irq_en: bool,
    pub err_irq_en: bool,
    #[skip]
    _unused2: B1,
    pub irq_threshold: B8,
    pub irq_delay: B8,
}

#[bitfield]
pub struct CdmaSr {
    #[skip]
    _unused0: B1,
    pub idle: bool,
    #[skip]
    _unused1: B1,
    pub sg_incld: bool,
    pub dma_int_err: bool,
    pub dma_slv_err: bool,
    pub dma_dec_err: bool,
    #[skip]
    _unused2: B1,
    pub sg_int_err: bool,
    pub sg_slv_err: bool,
    pub sg_dec_err: bool,
    #[skip]
    _unused3: B1,
    pub ioc_irq: bool,
    pub dly_irq: bool,
    pub err_irq: bool,
    #[skip]
    _unused4: B1,
    pub irq_threshold_sts: B8,
    pub irq_delay_sts: B8,
}

pub fn irq_enable_word() -> u32 {
    crate::to_word(
        CdmaCr::new()
            .with_ioc_irq_en(true)
            .with_dly_irq_en(true)
            .with_err_irq_en(true)
            .into_bytes(),
    )
}
