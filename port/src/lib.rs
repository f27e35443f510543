// Copyright 2024 The Runnel Developers
// This file is part of the runnel library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:

// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

#[macro_use]
extern crate tracing;

pub use runnel_port_events as events;

pub mod helpers;

mod endpoint;
pub use endpoint::*;

mod local;
pub use local::*;

mod port;
pub use port::*;

mod tunnel;
pub use tunnel::*;

/// The minimum backoff applied after a rejected token transfer.
pub const MIN_BACKOFF_IN_MS: u64 = 100; // ms
/// The maximum backoff between throttled retransmissions.
pub const MAX_BACKOFF_IN_MS: u64 = 1000; // ms
