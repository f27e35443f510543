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
    endpoint::{Endpoint, Peer},
    events::{PortId, Token},
    helpers::fmt_id,
    Port,
};

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

/// The consumer half of a local port pairing.
///
/// Reads bypass any tunnel and draw directly from the peer (producer)
/// port's queue. Right after a remote-to-local migration the local queue
/// may still hold residual tokens from the old tunnel path, and the peer
/// queue may hold duplicates whose acknowledgements were lost before the
/// handover; both hazards are repaired on first access.
pub struct LocalInEndpoint {
    /// The consumer port this endpoint serves.
    port: Weak<Port>,
    /// The producer port on the other side of the pairing.
    peer_port: Weak<Port>,
    /// Whether the local queue may still hold tokens from a previous
    /// tunnel attachment.
    data_in_local_fifo: AtomicBool,
    /// Whether the peer queue may hold duplicates of tokens that already
    /// arrived through the old remote path.
    fifo_mismatch: AtomicBool,
}

impl LocalInEndpoint {
    /// Initializes a new local input endpoint over the peer port's queue.
    pub fn new(port: &Arc<Port>, peer_port: &Arc<Port>) -> Self {
        Self {
            port: Arc::downgrade(port),
            peer_port: Arc::downgrade(peer_port),
            data_in_local_fifo: AtomicBool::new(true),
            fifo_mismatch: AtomicBool::new(true),
        }
    }

    /// Upgrades both port references, or reports the pairing as gone.
    fn ports(&self) -> Option<(Arc<Port>, Arc<Port>)> {
        Some((self.port.upgrade()?, self.peer_port.upgrade()?))
    }

    /// Discards tokens in the peer queue that were already delivered
    /// through the old remote path but whose acknowledgements were lost.
    /// Runs once, before the first read after the migration.
    fn fifo_mismatch_fix(&self, port: &Port, peer_port: &Port) {
        let reader = port.id();
        let mut dropped = 0u64;
        while peer_port.queue().can_read(reader)
            && port.queue().write_pos() > peer_port.queue().read_pos(reader).unwrap_or(u64::MAX)
        {
            peer_port.queue().read(reader);
            peer_port.queue().commit_one_read(reader, true);
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {dropped} duplicate token(s) on port {port} after migration");
        }
        self.fifo_mismatch.store(false, Ordering::SeqCst);
    }

    /// Aligns the local queue's positions with the peer's durable cursor,
    /// as they would be after a pure-local attach.
    fn sync_local_fifos(&self, port: &Port, peer_port: &Port) {
        let reader = port.id();
        if let Some(pos) = peer_port.queue().read_pos(reader) {
            port.queue().rebase(reader, pos);
        }
    }
}

impl Endpoint for LocalInEndpoint {
    fn is_connected(&self) -> bool {
        true
    }

    fn attached(&self) {
        if let Some((port, peer_port)) = self.ports() {
            // The local queue may need draining after a migration, so the
            // reader is kept (or created) on both queues. Registration is
            // idempotent; an earlier attachment's cursors survive.
            port.queue().add_reader(port.id());
            peer_port.queue().add_reader(port.id());
        }
    }

    fn get_peer(&self) -> Peer {
        match self.peer_port.upgrade() {
            Some(peer_port) => Peer::Local(peer_port.id()),
            None => Peer::Disconnected(None),
        }
    }

    fn tokens_available(&self, length: u64) -> bool {
        let Some((port, peer_port)) = self.ports() else { return false };
        if self.fifo_mismatch.load(Ordering::SeqCst) {
            self.fifo_mismatch_fix(&port, &peer_port);
        }

        let reader = port.id();
        let mut tokens = 0;
        if self.data_in_local_fifo.load(Ordering::SeqCst) {
            // Count the local queue in case it still holds residue.
            tokens += port.queue().available_tokens(reader);
            if tokens == 0 {
                self.data_in_local_fifo.store(false, Ordering::SeqCst);
            }
        }
        tokens += peer_port.queue().available_tokens(reader);
        tokens >= length
    }

    fn peek_token(&self) -> Option<Token> {
        let (port, peer_port) = self.ports()?;
        if self.fifo_mismatch.load(Ordering::SeqCst) {
            self.fifo_mismatch_fix(&port, &peer_port);
        }

        let reader = port.id();
        if self.data_in_local_fifo.load(Ordering::SeqCst) {
            // Empty the local queue first in case it still holds residue.
            if let Some(token) = port.queue().read(reader) {
                return Some(token);
            }
        }
        peer_port.queue().read(reader)
    }

    fn peek_rewind(&self) {
        let Some((port, peer_port)) = self.ports() else { return };
        let reader = port.id();
        if self.data_in_local_fifo.load(Ordering::SeqCst) {
            port.queue().rollback_reads(reader);
        }
        peer_port.queue().rollback_reads(reader);
    }

    fn commit_peek_as_read(&self) {
        let Some((port, peer_port)) = self.ports() else { return };
        let reader = port.id();
        if self.data_in_local_fifo.load(Ordering::SeqCst) {
            port.queue().commit_reads(reader, true);
            if port.queue().can_read(reader) {
                // Data is left in the local queue; the peer stays untouched
                // and the positions must not be synced yet.
                return;
            }
            self.data_in_local_fifo.store(false, Ordering::SeqCst);
        }
        peer_port.queue().commit_reads(reader, true);
        self.sync_local_fifos(&port, &peer_port);
    }
}

impl fmt::Display for LocalInEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port.upgrade() {
            Some(port) => write!(f, "LocalInEndpoint(port_id={})", fmt_id(port.id())),
            None => write!(f, "LocalInEndpoint(port_id=<dropped>)"),
        }
    }
}

/// The producer half of a local port pairing.
///
/// Registers the consumer as a reader on the producer's own queue; the
/// consumer endpoint then reads from that queue directly.
pub struct LocalOutEndpoint {
    /// The producer port this endpoint serves.
    port: Weak<Port>,
    /// The ID of the consumer port reading from the local queue.
    peer_id: PortId,
}

impl LocalOutEndpoint {
    /// Initializes a new local output endpoint paired with the given port.
    pub fn new(port: &Arc<Port>, peer_port: &Arc<Port>) -> Self {
        Self { port: Arc::downgrade(port), peer_id: peer_port.id() }
    }
}

impl Endpoint for LocalOutEndpoint {
    fn is_connected(&self) -> bool {
        true
    }

    fn attached(&self) {
        if let Some(port) = self.port.upgrade() {
            port.queue().add_reader(self.peer_id);
        }
    }

    fn detached(&self) {
        // Rewind tentative reads to durable reads. For a local pairing the
        // cursors are already equal in steady state.
        if let Some(port) = self.port.upgrade() {
            port.queue().commit_reads(self.peer_id, false);
        }
    }

    fn get_peer(&self) -> Peer {
        Peer::Local(self.peer_id)
    }

    fn tokens_available(&self, length: u64) -> bool {
        // An output endpoint reports free slots, not tokens.
        match self.port.upgrade() {
            Some(port) => port.queue().available_slots() >= length,
            None => false,
        }
    }
}

impl fmt::Display for LocalOutEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port.upgrade() {
            Some(port) => write!(f, "LocalOutEndpoint(port_id={})", fmt_id(port.id())),
            None => write!(f, "LocalOutEndpoint(port_id=<dropped>)"),
        }
    }
}
