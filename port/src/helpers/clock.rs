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

use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// A monotonic clock observed by the sender pacing logic.
///
/// Injected rather than read from the environment so that tests can advance
/// time deterministically.
pub trait Clock: Send + Sync {
    /// Returns the time elapsed since the clock's epoch.
    fn now(&self) -> Duration;
}

/// A clock backed by [`Instant`], anchored at construction.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Initializes a new system clock.
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: RwLock<Duration>,
}

impl ManualClock {
    /// Initializes a new manual clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, delta: Duration) {
        *self.now.write() += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.read()
    }
}
