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

use std::time::Duration;

/// A wake-up handle into the scheduler loop.
///
/// Endpoints invoke it when inbound data arrived and readers may progress,
/// or when a throttled retransmission must happen at a future time. The
/// scheduler coalesces triggers; the call must only schedule a pass, never
/// run one synchronously.
pub trait TriggerLoop: Send + Sync {
    /// Requests a scheduler pass after the given delay.
    fn trigger(&self, delay: Duration);
}
