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

use crate::{EventTrait, PortId, TokenTransfer};

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The acknowledgement status carried by a token reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyValue {
    /// The token was written at the consumer, or was already present.
    Ack,
    /// The token was dropped; the producer must retransmit it later.
    Nack,
    /// Reserved for aborting a stream; never sent.
    Abort,
}

/// Reports the fate of a transferred token back to its producer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReply {
    /// The ID of the port that sent the token.
    pub port_id: PortId,
    /// The ID of the port that received the token.
    pub peer_port_id: PortId,
    /// The sequence number of the token being acknowledged.
    pub sequencenbr: u64,
    /// The acknowledgement status.
    pub value: ReplyValue,
}

impl TokenReply {
    /// Initializes a new token reply event.
    pub const fn new(port_id: PortId, peer_port_id: PortId, sequencenbr: u64, value: ReplyValue) -> Self {
        Self { port_id, peer_port_id, sequencenbr, value }
    }

    /// Initializes the reply for the given transfer, preserving its routing.
    pub fn for_transfer(transfer: &TokenTransfer, value: ReplyValue) -> Self {
        Self::new(transfer.port_id, transfer.peer_port_id, transfer.sequencenbr, value)
    }
}

impl EventTrait for TokenReply {
    /// Returns the event name.
    #[inline]
    fn name(&self) -> Cow<'static, str> {
        "TokenReply".into()
    }
}
