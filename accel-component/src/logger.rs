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

use arrayvec::ArrayString;
use core::fmt::{self, Write};
use log::{LevelFilter, Metadata, Record};

pub const MAX_MSG_LEN: usize = 2048;

// Fills the buffer as far as it goes and then fails.
struct Bounded<'a>(&'a mut ArrayString<MAX_MSG_LEN>);
impl Write for Bounded<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            self.0.try_push(c).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

/// Formats |record| as "<target>::<message>" in at most MAX_MSG_LEN bytes.
pub fn format_record(record: &Record) -> ArrayString<MAX_MSG_LEN> {
    let mut buf = ArrayString::new();
    if write!(Bounded(&mut buf), "{}::{}", record.target(), record.args()).is_err() {
        // Too big, indicate overflow with a trailing "...".
        let mut end = buf.len().min(MAX_MSG_LEN - 3);
        while !buf.is_char_boundary(end) {
            end -= 1;
        }
        buf.truncate(end);
        buf.push_str("...");
    }
    buf
}

pub struct FabricLogger;

impl log::Log for FabricLogger {
    fn enabled(&self, metadata: &Metadata) -> bool { metadata.level() <= log::max_level() }
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_record(record));
        }
    }
    fn flush(&self) {}
}

static FABRIC_LOGGER: FabricLogger = FabricLogger;

/// Installs the logger on first use; later calls only adjust the level.
pub fn init_logger(level: LevelFilter) {
    let _ = log::set_logger(&FABRIC_LOGGER);
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_target() {
        let msg = format_record(
            &Record::builder()
                .args(format_args!("pass done, {} bytes", 64))
                .target("accel_scheduler::direct")
                .build(),
        );
        assert_eq!(msg.as_str(), "accel_scheduler::direct::pass done, 64 bytes");
    }

    #[test]
    fn overflow_is_marked() {
        let long = "x".repeat(3 * MAX_MSG_LEN);
        let msg = format_record(&Record::builder().args(format_args!("{}", long)).target("t").build());
        assert_eq!(msg.len(), MAX_MSG_LEN);
        assert!(msg.starts_with("t::xxx"));
        assert!(msg.ends_with("xx..."));
    }

    #[test]
    fn overflow_respects_char_boundaries() {
        let long = "é".repeat(MAX_MSG_LEN);
        let msg = format_record(&Record::builder().args(format_args!("{}", long)).target("t").build());
        assert!(msg.len() <= MAX_MSG_LEN);
        assert!(msg.ends_with("é..."));
    }
}
