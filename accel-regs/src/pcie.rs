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

//! AXI-to-PCIe bridge address translation. Each AXI BAR window forwards
//! to the host address held in its translation register pair.

pub const NUM_AXI_BARS: usize = 6;
const AXIBAR2PCIEBAR_BASE: usize = 0x208;

/// Offset of the upper 32 bits of BAR |bar|'s translation.
pub const fn axibar2pciebar_u(bar: usize) -> usize { AXIBAR2PCIEBAR_BASE + 8 * bar }
/// Offset of the lower 32 bits of BAR |bar|'s translation.
pub const fn axibar2pciebar_l(bar: usize) -> usize { axibar2pciebar_u(bar) + 4 }
