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

//! Dual-channel AXI GPIO.

pub const GPIO_DATA: usize = 0x00;
pub const GPIO_TRI: usize = 0x04;
pub const GPIO2_DATA: usize = 0x08;
pub const GPIO2_TRI: usize = 0x0C;
