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
    events::{NodeId, PortId, Token},
    helpers::fmt_id,
    Port,
};

use anyhow::{bail, Result};
use std::{
    fmt,
    sync::{Arc, Weak},
};

/// The transport-specific peer of an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Peer {
    /// No live transport; the previous peer port may be remembered for a
    /// later migration handover.
    Disconnected(Option<PortId>),
    /// The peer port lives in the same process.
    Local(PortId),
    /// The peer port lives on another node, behind a tunnel.
    Remote(NodeId, PortId),
}

impl Peer {
    /// Returns the peer port ID, if one is known.
    pub const fn port_id(&self) -> Option<PortId> {
        match self {
            Self::Disconnected(port_id) => *port_id,
            Self::Local(port_id) | Self::Remote(_, port_id) => Some(*port_id),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected(Some(port_id)) => write!(f, "disconnected (was {})", fmt_id(port_id)),
            Self::Disconnected(None) => write!(f, "disconnected"),
            Self::Local(port_id) => write!(f, "local:{}", fmt_id(port_id)),
            Self::Remote(node_id, port_id) => write!(f, "{}:{}", fmt_id(node_id), fmt_id(port_id)),
        }
    }
}

/// The transport-specific object that moves tokens to or from a port.
///
/// Not every variant uses every capability: output endpoints never peek,
/// and input endpoints are never polled to communicate. The defaults
/// describe a detached endpoint.
pub trait Endpoint {
    /// Returns `true` if the endpoint has a live transport.
    fn is_connected(&self) -> bool {
        false
    }

    /// Called by the scheduler once the endpoint is installed on its port.
    fn attached(&self) {}

    /// Called by the scheduler when the endpoint is removed from its port.
    fn detached(&self) {}

    /// Releases any transport resources held by the endpoint.
    fn destroy(&self) {}

    /// Returns the endpoint's peer.
    fn get_peer(&self) -> Peer;

    /// Called by the scheduler when data may be transferable to the
    /// counterpart; returns `true` if any token was sent.
    ///
    /// Polling an endpoint without a live transport is a scheduler bug.
    fn communicate(&self) -> Result<bool> {
        bail!("cannot communicate on an endpoint with peer '{}'", self.get_peer())
    }

    /// Returns `true` if at least `length` tokens (input side) or free
    /// slots (output side) are available.
    fn tokens_available(&self, length: u64) -> bool {
        let _ = length;
        false
    }

    /// Returns the token at the read cursor and advances it speculatively.
    fn peek_token(&self) -> Option<Token> {
        None
    }

    /// Retracts all speculative reads back to the last commit.
    fn peek_rewind(&self) {}

    /// Confirms all speculative reads.
    fn commit_peek_as_read(&self) {}
}

/// The placeholder endpoint installed while a port has no transport.
pub struct DisconnectedEndpoint {
    /// The port this endpoint serves.
    port: Weak<Port>,
    /// The peer port this port was connected to before, if any.
    former_peer_id: Option<PortId>,
}

impl DisconnectedEndpoint {
    /// Initializes a new disconnected endpoint.
    pub fn new(port: &Arc<Port>, former_peer_id: Option<PortId>) -> Self {
        Self { port: Arc::downgrade(port), former_peer_id }
    }
}

impl Endpoint for DisconnectedEndpoint {
    fn get_peer(&self) -> Peer {
        Peer::Disconnected(self.former_peer_id)
    }

    fn communicate(&self) -> Result<bool> {
        match self.port.upgrade() {
            Some(port) => {
                bail!("cannot communicate on the disconnected port {} with id {}", port, fmt_id(port.id()))
            }
            None => bail!("cannot communicate on a dropped port"),
        }
    }
}

impl fmt::Display for DisconnectedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port.upgrade() {
            Some(port) => write!(f, "DisconnectedEndpoint(port_id={})", fmt_id(port.id())),
            None => write!(f, "DisconnectedEndpoint(port_id=<dropped>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_endpoint_rejects_polling() {
        let port = Arc::new(Port::new("out", "source", 4));
        let endpoint = DisconnectedEndpoint::new(&port, None);

        assert!(!endpoint.is_connected());
        assert!(endpoint.communicate().is_err());
        assert_eq!(endpoint.get_peer(), Peer::Disconnected(None));
    }

    #[test]
    fn disconnected_endpoint_remembers_its_former_peer() {
        let port = Arc::new(Port::new("out", "source", 4));
        let former = PortId::new();
        let endpoint = DisconnectedEndpoint::new(&port, Some(former));

        assert_eq!(endpoint.get_peer().port_id(), Some(former));
    }

    #[test]
    fn idle_capabilities_default_to_empty() {
        let port = Arc::new(Port::new("out", "source", 4));
        let endpoint = DisconnectedEndpoint::new(&port, None);

        assert!(!endpoint.tokens_available(1));
        assert!(endpoint.peek_token().is_none());
        endpoint.peek_rewind();
        endpoint.commit_peek_as_read();
    }
}
