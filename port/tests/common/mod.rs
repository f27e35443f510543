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

use runnel_port::{
    events::{Event, TokenReply, TokenTransfer},
    helpers::TriggerLoop,
    Tunnel,
};

use parking_lot::Mutex;
use std::time::Duration;

/// A tunnel that records every event for the test to inspect and replay.
#[derive(Default)]
pub struct VecTunnel {
    events: Mutex<Vec<Event>>,
}

impl VecTunnel {
    /// Removes and returns the recorded events.
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Removes the recorded events, expecting only token transfers.
    pub fn drain_transfers(&self) -> Vec<TokenTransfer> {
        self.drain()
            .into_iter()
            .map(|event| match event {
                Event::TokenTransfer(transfer) => transfer,
                event => panic!("unexpected event: {event:?}"),
            })
            .collect()
    }

    /// Removes the recorded events, expecting only token replies.
    pub fn drain_replies(&self) -> Vec<TokenReply> {
        self.drain()
            .into_iter()
            .map(|event| match event {
                Event::TokenReply(reply) => reply,
                event => panic!("unexpected event: {event:?}"),
            })
            .collect()
    }
}

impl Tunnel for VecTunnel {
    fn send(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// A trigger that records the requested wake-up delays.
#[derive(Default)]
pub struct RecordingTrigger {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingTrigger {
    /// Removes and returns the recorded delays.
    pub fn drain(&self) -> Vec<Duration> {
        std::mem::take(&mut *self.delays.lock())
    }
}

impl TriggerLoop for RecordingTrigger {
    fn trigger(&self, delay: Duration) {
        self.delays.lock().push(delay);
    }
}
