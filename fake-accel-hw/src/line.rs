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

use accel_interface::{IrqLine, OutputLine};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A latched single-bit signal. Raising a line also raises its parent,
/// which models several interrupts wired to one notification.
pub struct SimLine {
    level: Mutex<bool>,
    cond: Condvar,
    parent: Option<Arc<SimLine>>,
    raises: AtomicUsize,
}
impl SimLine {
    pub fn new() -> Arc<Self> { Self::build(None) }

    pub fn with_parent(parent: &Arc<SimLine>) -> Arc<Self> { Self::build(Some(parent.clone())) }

    fn build(parent: Option<Arc<SimLine>>) -> Arc<Self> {
        Arc::new(Self {
            level: Mutex::new(false),
            cond: Condvar::new(),
            parent,
            raises: AtomicUsize::new(0),
        })
    }

    pub fn raise(&self) {
        {
            let mut level = self.level.lock();
            *level = true;
            self.raises.fetch_add(1, Ordering::SeqCst);
            self.cond.notify_all();
        }
        if let Some(parent) = &self.parent {
            parent.raise();
        }
    }

    pub fn lower(&self) { *self.level.lock() = false; }

    pub fn level(&self) -> bool { *self.level.lock() }

    /// Number of times the line has been raised.
    pub fn raise_count(&self) -> usize { self.raises.load(Ordering::SeqCst) }
}

impl IrqLine for SimLine {
    fn poll(&self) -> bool { self.level() }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut level = self.level.lock();
        while !*level {
            match deadline {
                None => self.cond.wait(&mut level),
                Some(deadline) => {
                    if self.cond.wait_until(&mut level, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        *level
    }

    fn acknowledge(&self) { self.lower(); }
}

impl OutputLine for SimLine {
    fn raise(&self) { SimLine::raise(self) }
}
