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

use accel_interface::AccelError;
use accel_shared::{AccelGroup, Metrics, SharedRepository, StatusFlags};
use log::warn;

/// The shared repository: one metrics record per group plus the status
/// flags, behind a lock shared by every scheduler.
#[derive(Default)]
pub struct MetricsRepository {
    inner: spin::Mutex<SharedRepository>,
}
impl MetricsRepository {
    pub fn new() -> Self { Self::default() }

    pub fn update<R>(&self, group: AccelGroup, f: impl FnOnce(&mut Metrics) -> R) -> R {
        f(&mut self.inner.lock()[group])
    }

    pub fn read(&self, group: AccelGroup) -> Metrics { self.inner.lock()[group] }

    pub fn snapshot(&self) -> SharedRepository { *self.inner.lock() }

    pub fn status(&self) -> StatusFlags { self.inner.lock().status }

    /// Marks |group| as running for |pid|.
    pub fn occupy(&self, group: AccelGroup, pid: u32) -> Result<(), AccelError> {
        if pid == 0 {
            return Err(AccelError::InvalidRequest);
        }
        let mut inner = self.inner.lock();
        if !inner.status.occupy(group, pid) {
            warn!(
                "{}: busy with pid {}, rejecting pid {}",
                group,
                inner.status.occupied_pid[group.index()],
                pid
            );
            return Err(AccelError::GroupBusy);
        }
        Ok(())
    }

    pub fn release(&self, group: AccelGroup) { self.inner.lock().status.release(group); }
}
