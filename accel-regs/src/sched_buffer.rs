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

//! Layout of a scheduler buffer: repeating four-register blocks, one per
//! client, at a configurable stride.

use serde::{Deserialize, Serialize};

pub const NUM_CLIENT_SLOTS: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SchedBufferLayout {
    pub base: usize,
    pub step_offset: usize,
    pub source_offset: usize,
    pub destination_offset: usize,
    pub size_offset: usize,
    pub offset_offset: usize,
}
impl Default for SchedBufferLayout {
    fn default() -> Self {
        Self {
            base: 0,
            step_offset: 0x10,
            source_offset: 0x0,
            destination_offset: 0x4,
            size_offset: 0x8,
            offset_offset: 0xC,
        }
    }
}
impl SchedBufferLayout {
    fn slot_base(&self, slot: usize) -> usize { self.base + self.step_offset * slot }
    pub fn source(&self, slot: usize) -> usize { self.slot_base(slot) + self.source_offset }
    pub fn destination(&self, slot: usize) -> usize {
        self.slot_base(slot) + self.destination_offset
    }
    pub fn size(&self, slot: usize) -> usize { self.slot_base(slot) + self.size_offset }
    pub fn offset(&self, slot: usize) -> usize { self.slot_base(slot) + self.offset_offset }

    /// Bytes spanned by all client blocks.
    pub fn span(&self) -> usize { self.slot_base(NUM_CLIENT_SLOTS) - self.base }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let layout = SchedBufferLayout::default();
        assert_eq!(layout.source(0), 0x0);
        assert_eq!(layout.size(1), 0x18);
        assert_eq!(layout.offset(3), 0x3C);
        assert_eq!(layout.span(), 0x40);
    }

    #[test]
    fn custom_stride() {
        let layout = SchedBufferLayout {
            base: 0x100,
            step_offset: 0x20,
            ..Default::default()
        };
        assert_eq!(layout.destination(2), 0x144);
        assert_eq!(layout.span(), 0x80);
    }
}
