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

use crate::{
    events::{PortId, Token},
    helpers::FifoQueue,
};

use std::fmt;

/// An actor's connection point for one token stream.
///
/// An output port owns the queue its tokens are written into. An input port
/// owns a queue that a tunnel endpoint fills, or registers as a reader on
/// the peer port's queue when both sides live in the same process.
///
/// The scheduler owns its ports; endpoints only ever hold weak references
/// back to them.
#[derive(Debug)]
pub struct Port {
    /// The port ID.
    id: PortId,
    /// The port name within its owning actor.
    name: String,
    /// The name of the owning actor (for logging purposes).
    owner: String,
    /// The token queue.
    queue: FifoQueue,
}

impl Port {
    /// Initializes a new port with a queue of the given capacity.
    pub fn new(name: impl Into<String>, owner: impl Into<String>, capacity: usize) -> Self {
        Self { id: PortId::new(), name: name.into(), owner: owner.into(), queue: FifoQueue::new(capacity) }
    }

    /// Returns the port ID.
    pub const fn id(&self) -> PortId {
        self.id
    }

    /// Returns the port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the owning actor.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the token queue.
    pub const fn queue(&self) -> &FifoQueue {
        &self.queue
    }

    /// Writes a token produced by the owning actor, returning `false` if
    /// the queue is full. Actors are expected to gate on the endpoint's
    /// `tokens_available` first; a failed write is a scheduling contract
    /// violation.
    pub fn write(&self, token: Token) -> bool {
        self.queue.write(token)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}
