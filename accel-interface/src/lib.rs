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

//! Seams between the acceleration schedulers and the fabric they drive,
//! plus the request protocol served by the accelerator component.

#![cfg_attr(not(test), no_std)]

use accel_shared::{AccelGroup, Metrics};
use core::time::Duration;
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A memory-mapped register window addressed by byte offset.
pub trait RegisterBlock: Send + Sync {
    fn read(&self, offset: usize) -> u32;
    fn write(&self, offset: usize, value: u32);

    /// Read-modify-write helper.
    fn set_bits(&self, offset: usize, mask: u32) { self.write(offset, self.read(offset) | mask); }
}

/// A single-bit input signal: a device interrupt, a start strobe or a
/// doorbell.
pub trait IrqLine: Send + Sync {
    /// Current level, non-blocking.
    fn poll(&self) -> bool;
    /// Blocks until the line is asserted or |timeout| expires (None waits
    /// forever). Returns the level observed on exit.
    fn wait(&self, timeout: Option<Duration>) -> bool;
    /// Lowers a latched signal. Device interrupts are instead cleared
    /// through the device's status register.
    fn acknowledge(&self);
}

/// A single-bit output signal.
pub trait OutputLine: Send + Sync {
    fn raise(&self);
}

/// AXI master access to memory holding scatter/gather lists.
pub trait MemoryPort: Send + Sync {
    fn read_u64(&self, address: u64) -> u64;
}

/// Return codes from the accelerator fabric.
#[repr(usize)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum AccelError {
    Success = 0,
    DmaTimeout,
    DmaError,
    CdmaTimeout,
    CdmaError,
    StartTimeout,
    AckTimeout,
    CompletionTimeout,
    SlotBusy,
    InvalidRequest,
    InvalidGroup,
    InvalidSlot,
    GroupBusy,
    SerializeFailed,
    DeserializeFailed,
    ShuttingDown,
    #[default]
    UnknownError,
}
impl From<AccelError> for Result<(), AccelError> {
    fn from(err: AccelError) -> Result<(), AccelError> {
        if err == AccelError::Success {
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// Blocks on |line| and maps expiry to |on_timeout|.
pub fn wait_line(
    line: &dyn IrqLine,
    timeout: Option<Duration>,
    on_timeout: AccelError,
) -> Result<(), AccelError> {
    if line.wait(timeout) {
        Ok(())
    } else {
        Err(on_timeout)
    }
}

/// One image for a direct or indirect group. Addresses are host
/// addresses; |offset| is added to both when the transfer is not routed
/// through the PCIe bridge.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ImageJob {
    pub rows: u32,
    pub cols: u32,
    pub source_address: u32,
    pub destination_address: u32,
    pub offset: u32,
}

/// One image for the scatter/gather group. The lists are arrays of 64-bit
/// page addresses in host memory, one entry per page.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SgJob {
    pub rows: u32,
    pub cols: u32,
    pub mm2s_sg_list: u64,
    pub s2mm_sg_list: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum AccelRequest {
    Accelerate { group: u8, pid: u32, job: ImageJob }, // -> AccelerateResponse
    AccelerateSg { pid: u32, job: SgJob },             // -> AccelerateResponse
    GetMetrics { group: u8 },                          // -> GetMetricsResponse

    DebugState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccelerateResponse {
    pub group: AccelGroup,
    pub metrics: Metrics,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetMetricsResponse {
    pub metrics: Metrics,
}

// Size of the buffer carrying a serialized AccelRequest.
pub const ACCEL_REQUEST_DATA_SIZE: usize = 64;
// A serialized Metrics record is at most 30 five-byte varints.
pub const ACCEL_REPLY_DATA_SIZE: usize = 256;

/// Carries an encoded request to the component and the encoded reply back.
pub trait AccelTransport {
    fn call(&self, request: &[u8], reply: &mut [u8]) -> AccelError;
}

#[inline]
fn accel_request<T: DeserializeOwned>(
    transport: &dyn AccelTransport,
    request: &AccelRequest,
) -> Result<T, AccelError> {
    let mut request_buffer = [0u8; ACCEL_REQUEST_DATA_SIZE];
    let mut reply_buffer = [0u8; ACCEL_REPLY_DATA_SIZE];
    let request_slice =
        postcard::to_slice(request, &mut request_buffer).or(Err(AccelError::SerializeFailed))?;
    match transport.call(request_slice, &mut reply_buffer) {
        AccelError::Success => {
            postcard::from_bytes(&reply_buffer).or(Err(AccelError::DeserializeFailed))
        }
        err => Err(err),
    }
}

/// Runs one pass of |job| on |group| on behalf of |pid| and returns the
/// metrics recorded for it.
#[inline]
pub fn accel_accelerate(
    transport: &dyn AccelTransport,
    group: AccelGroup,
    pid: u32,
    job: ImageJob,
) -> Result<Metrics, AccelError> {
    accel_request(
        transport,
        &AccelRequest::Accelerate {
            group: group.index() as u8,
            pid,
            job,
        },
    )
    .map(|reply: AccelerateResponse| reply.metrics)
}

/// Runs one pass on the scatter/gather group.
#[inline]
pub fn accel_accelerate_sg(
    transport: &dyn AccelTransport,
    pid: u32,
    job: SgJob,
) -> Result<Metrics, AccelError> {
    accel_request(transport, &AccelRequest::AccelerateSg { pid, job })
        .map(|reply: AccelerateResponse| reply.metrics)
}

#[inline]
pub fn accel_get_metrics(
    transport: &dyn AccelTransport,
    group: AccelGroup,
) -> Result<Metrics, AccelError> {
    accel_request(
        transport,
        &AccelRequest::GetMetrics {
            group: group.index() as u8,
        },
    )
    .map(|reply: GetMetricsResponse| reply.metrics)
}

#[inline]
pub fn accel_debug_state(transport: &dyn AccelTransport) -> Result<(), AccelError> {
    accel_request(transport, &AccelRequest::DebugState)
}
