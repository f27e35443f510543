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

use crate::{EventTrait, PortId, Token};

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Carries one token from a producer port to its remote consumer.
///
/// Sequence numbers are per (producer port, consumer port) pair, start at 0
/// and never reset for the lifetime of the pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    /// The ID of the sending (producer) port.
    pub port_id: PortId,
    /// The ID of the receiving (consumer) port.
    pub peer_port_id: PortId,
    /// The position of the token in the producer's queue.
    pub sequencenbr: u64,
    /// The token being transferred.
    pub token: Token,
}

impl TokenTransfer {
    /// Initializes a new token transfer event.
    pub fn new(port_id: PortId, peer_port_id: PortId, sequencenbr: u64, token: Token) -> Self {
        Self { port_id, peer_port_id, sequencenbr, token }
    }
}

impl EventTrait for TokenTransfer {
    /// Returns the event name.
    #[inline]
    fn name(&self) -> Cow<'static, str> {
        "TokenTransfer".into()
    }
}
