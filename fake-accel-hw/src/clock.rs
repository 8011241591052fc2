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

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Fabric clock feeding the APM global clock counters. Every sample
/// advances it, so successive samples are strictly increasing.
#[derive(Default)]
pub struct SimClock {
    cycles: AtomicU64,
}
impl SimClock {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn now(&self) -> u64 { self.cycles.load(Ordering::SeqCst) }

    pub fn sample(&self) -> u64 { self.cycles.fetch_add(1, Ordering::SeqCst) + 1 }

    /// Accounts for |cycles| spent moving data.
    pub fn advance(&self, cycles: u64) { self.cycles.fetch_add(cycles, Ordering::SeqCst); }
}
