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

//! Request slots of the interrupt manager. Slot N belongs to acceleration
//! group N and holds 0 or vector + 1.

pub const NUM_IRQ_SLOTS: usize = 7;
const SLOT_BASE: usize = 0x10;
const SLOT_STEP: usize = 0x8;

pub const fn request_slot(slot: usize) -> usize { SLOT_BASE + SLOT_STEP * slot }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_offsets() {
        assert_eq!(request_slot(0), 0x10);
        assert_eq!(request_slot(NUM_IRQ_SLOTS - 1), 0x40);
    }
}
