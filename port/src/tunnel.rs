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
    events::{Event, NodeId, PortId, ReplyValue, Token, TokenReply, TokenTransfer},
    helpers::{fmt_id, Clock, TriggerLoop},
    Port, MAX_BACKOFF_IN_MS, MIN_BACKOFF_IN_MS,
};

use anyhow::Result;
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};

/// The sending half of a message tunnel between two nodes.
///
/// The transport may drop or reorder frames across reconnects; the
/// endpoints recover through sequence numbers and acknowledgements.
/// `send` must only enqueue the event — delivery happens on a later
/// scheduler pass, never synchronously within the call.
pub trait Tunnel: Send + Sync {
    /// Queues an event for delivery to the peer node.
    fn send(&self, event: Event);
}

/// The consumer-side endpoint of a tunneled port pairing.
///
/// Writes arriving tokens into the consumer queue in strict sequence
/// order and acknowledges every frame, including duplicates of tokens
/// already received.
pub struct TunnelInEndpoint {
    /// The consumer port this endpoint serves.
    port: Weak<Port>,
    /// The tunnel to the producer's node.
    tunnel: Arc<dyn Tunnel>,
    /// The node hosting the producer port.
    peer_node_id: NodeId,
    /// The producer port ID; may be learned late, during connection setup.
    peer_port_id: Mutex<PortId>,
    /// The scheduler wake-up handle.
    trigger: Arc<dyn TriggerLoop>,
}

impl TunnelInEndpoint {
    /// Initializes a new tunnel input endpoint.
    pub fn new(
        port: &Arc<Port>,
        tunnel: Arc<dyn Tunnel>,
        peer_node_id: NodeId,
        peer_port_id: PortId,
        trigger: Arc<dyn TriggerLoop>,
    ) -> Self {
        Self {
            port: Arc::downgrade(port),
            tunnel,
            peer_node_id,
            peer_port_id: Mutex::new(peer_port_id),
            trigger,
        }
    }

    /// Updates the producer port ID once the connection setup reveals it.
    pub fn set_peer_port_id(&self, peer_port_id: PortId) {
        *self.peer_port_id.lock() = peer_port_id;
    }

    /// Handles one token frame from the tunnel.
    ///
    /// The token is written only if it lands exactly on the queue's write
    /// position. Duplicates below the write position are acknowledged
    /// again, so a producer whose previous ACK was lost can move on;
    /// anything else is dropped and NACKed for a later retransmission.
    pub fn recv_token(&self, transfer: TokenTransfer) {
        let Some(port) = self.port.upgrade() else { return };
        let queue = port.queue();
        let sequencenbr = transfer.sequencenbr;

        let ok = if queue.can_write() && queue.write_pos() == sequencenbr {
            queue.write(transfer.token.clone());
            // New data arrived; readers may now progress.
            self.trigger.trigger(Duration::ZERO);
            true
        } else {
            // The other side resent a token we already received (this can
            // happen after a reconnect if our previous ACK was lost); ACK
            // it again. Tokens ahead of the write position are dropped.
            queue.write_pos() > sequencenbr
        };

        let value = if ok { ReplyValue::Ack } else { ReplyValue::Nack };
        debug!("Reply {value:?} [{sequencenbr}] on port {port}/{}", fmt_id(port.id()));
        self.tunnel.send(Event::TokenReply(TokenReply::for_transfer(&transfer, value)));
    }
}

impl Endpoint for TunnelInEndpoint {
    fn is_connected(&self) -> bool {
        true
    }

    fn attached(&self) {
        if let Some(port) = self.port.upgrade() {
            port.queue().add_reader(port.id());
        }
    }

    fn get_peer(&self) -> Peer {
        Peer::Remote(self.peer_node_id, *self.peer_port_id.lock())
    }

    fn tokens_available(&self, length: u64) -> bool {
        match self.port.upgrade() {
            Some(port) => port.queue().available_tokens(port.id()) >= length,
            None => false,
        }
    }

    fn peek_token(&self) -> Option<Token> {
        let port = self.port.upgrade()?;
        port.queue().read(port.id())
    }

    fn peek_rewind(&self) {
        if let Some(port) = self.port.upgrade() {
            port.queue().rollback_reads(port.id());
        }
    }

    fn commit_peek_as_read(&self) {
        if let Some(port) = self.port.upgrade() {
            port.queue().commit_reads(port.id(), true);
        }
    }
}

impl fmt::Display for TunnelInEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port.upgrade() {
            Some(port) => write!(f, "TunnelInEndpoint(port_id={})", fmt_id(port.id())),
            None => write!(f, "TunnelInEndpoint(port_id=<dropped>)"),
        }
    }
}

/// The sender pacing state.
#[derive(Debug)]
struct Pacing {
    /// Whether the sender drains the queue on every pass (`true`) or sends
    /// one token at a time with backoff (`false`).
    bulk: bool,
    /// The wait between throttled sends.
    backoff: Duration,
    /// The earliest time the next throttled send may happen.
    time_cont: Duration,
    /// ACKed sequence numbers above the durable cursor; non-empty only
    /// while ACKs arrive out of order.
    sequencenbrs_acked: IndexSet<u64>,
}

/// The producer-side endpoint of a tunneled port pairing.
///
/// Runs the sender state machine: in bulk mode every `communicate` pass
/// drains the queue; after a NACK the sender throttles down to a single
/// in-flight token with exponential backoff, until an ACK restores bulk
/// mode. Out-of-order ACKs are buffered so the durable cursor only ever
/// advances through the contiguous acknowledged prefix.
pub struct TunnelOutEndpoint {
    /// The producer port this endpoint serves.
    port: Weak<Port>,
    /// The tunnel to the consumer's node.
    tunnel: Arc<dyn Tunnel>,
    /// The node hosting the consumer port.
    peer_node_id: NodeId,
    /// The consumer port ID; doubles as the reader name on the queue.
    peer_id: PortId,
    /// The scheduler wake-up handle.
    trigger: Arc<dyn TriggerLoop>,
    /// The injected monotonic clock driving the backoff waits.
    clock: Arc<dyn Clock>,
    /// The pacing state.
    pacing: Mutex<Pacing>,
}

impl TunnelOutEndpoint {
    /// Initializes a new tunnel output endpoint in bulk mode.
    pub fn new(
        port: &Arc<Port>,
        tunnel: Arc<dyn Tunnel>,
        peer_node_id: NodeId,
        peer_port_id: PortId,
        trigger: Arc<dyn TriggerLoop>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            port: Arc::downgrade(port),
            tunnel,
            peer_node_id,
            peer_id: peer_port_id,
            trigger,
            clock,
            pacing: Mutex::new(Pacing {
                bulk: true,
                backoff: Duration::ZERO,
                time_cont: Duration::ZERO,
                sequencenbrs_acked: IndexSet::new(),
            }),
        }
    }

    /// Returns `true` if the sender is in bulk mode.
    pub fn is_bulk(&self) -> bool {
        self.pacing.lock().bulk
    }

    /// Returns the current wait between throttled sends.
    pub fn backoff(&self) -> Duration {
        self.pacing.lock().backoff
    }

    /// Handles one token reply frame from the consumer side.
    pub fn reply(&self, sequencenbr: u64, value: ReplyValue) {
        match value {
            ReplyValue::Ack => self.reply_ack(sequencenbr),
            ReplyValue::Nack => self.reply_nack(sequencenbr),
            // Reserved; no sender emits it yet.
            ReplyValue::Abort => trace!("Ignoring an abort reply [{sequencenbr}] for port {}", fmt_id(self.peer_id)),
        }
    }

    fn reply_ack(&self, sequencenbr: u64) {
        let Some(port) = self.port.upgrade() else { return };
        let queue = port.queue();
        let mut pacing = self.pacing.lock();

        // Back to full send speed directly.
        pacing.bulk = true;
        pacing.backoff = Duration::ZERO;

        let sequencenbr_sent = queue.tentative_read_pos(self.peer_id).unwrap_or(0);
        if sequencenbr < sequencenbr_sent {
            pacing.sequencenbrs_acked.insert(sequencenbr);
        }
        // Advance the durable cursor through the contiguous ACKed prefix;
        // ACKs beyond a gap stay buffered until the gap closes.
        while let Some(sequencenbr_acked) = queue.read_pos(self.peer_id) {
            if !pacing.sequencenbrs_acked.shift_remove(&sequencenbr_acked) {
                break;
            }
            queue.commit_one_read(self.peer_id, true);
        }
        drop(pacing);

        // Maybe someone can fill the queue again.
        self.trigger.trigger(Duration::ZERO);
    }

    fn reply_nack(&self, sequencenbr: u64) {
        let Some(port) = self.port.upgrade() else { return };
        let queue = port.queue();
        let mut pacing = self.pacing.lock();
        let now = self.clock.now();

        // Only send one token at a time from here on, with increasing
        // waits in between.
        if pacing.bulk {
            pacing.time_cont = now;
        }
        let retry_due = pacing.time_cont <= now;
        pacing.bulk = false;
        pacing.backoff = if pacing.backoff < Duration::from_millis(MIN_BACKOFF_IN_MS) {
            Duration::from_millis(MIN_BACKOFF_IN_MS)
        } else {
            (pacing.backoff * 2).min(Duration::from_millis(MAX_BACKOFF_IN_MS))
        };

        let sequencenbr_sent = queue.tentative_read_pos(self.peer_id).unwrap_or(0);
        let sequencenbr_acked = queue.read_pos(self.peer_id).unwrap_or(0);
        if sequencenbr < sequencenbr_sent && sequencenbr >= sequencenbr_acked {
            // Optimistic ACKs at or above the NACKed token are now invalid.
            pacing.sequencenbrs_acked.retain(|n| *n < sequencenbr);
            // Rewind the queue to the NACKed token; the next send
            // retransmits from there.
            while queue.tentative_read_pos(self.peer_id).unwrap_or(0) > sequencenbr {
                queue.commit_one_read(self.peer_id, false);
            }
        }
        drop(pacing);

        if retry_due {
            // The retry is already due, either because the NACK arrived
            // late or because the sender just left bulk mode.
            self.trigger.trigger(Duration::ZERO);
        }
    }

    /// Pulls one token off the queue and puts it on the wire. The frame's
    /// sequence number is the position of the token just pulled.
    fn send_one_token(&self, port: &Port) {
        let queue = port.queue();
        let Some(token) = queue.read(self.peer_id) else { return };
        let Some(tentative) = queue.tentative_read_pos(self.peer_id) else { return };
        let sequencenbr_sent = tentative - 1;
        debug!("Send [{sequencenbr_sent}] on port {port} to {}", fmt_id(self.peer_id));
        self.tunnel.send(Event::TokenTransfer(TokenTransfer::new(
            port.id(),
            self.peer_id,
            sequencenbr_sent,
            token,
        )));
    }
}

impl Endpoint for TunnelOutEndpoint {
    fn is_connected(&self) -> bool {
        true
    }

    fn attached(&self) {
        if let Some(port) = self.port.upgrade() {
            port.queue().add_reader(self.peer_id);
        }
    }

    fn detached(&self) {
        // Rewind tentative reads to durable reads. Tokens after the last
        // contiguously ACKed one are resent on reattach; the receiver ACKs
        // duplicates by sequence number.
        if let Some(port) = self.port.upgrade() {
            port.queue().commit_reads(self.peer_id, false);
        }
    }

    fn get_peer(&self) -> Peer {
        Peer::Remote(self.peer_node_id, self.peer_id)
    }

    fn communicate(&self) -> Result<bool> {
        let Some(port) = self.port.upgrade() else { return Ok(false) };
        let queue = port.queue();
        let mut pacing = self.pacing.lock();
        let mut sent = false;
        let mut retry_in = None;

        if pacing.bulk {
            // Send everything we have, since the other side keeps up.
            while queue.can_read(self.peer_id) {
                sent = true;
                self.send_one_token(&port);
            }
        } else if queue.can_read(self.peer_id)
            && queue.tentative_read_pos(self.peer_id) == queue.read_pos(self.peer_id)
            && self.clock.now() >= pacing.time_cont
        {
            // The other side NACKed, likely because its queue is full.
            // Send a single token, and only once the previous one has been
            // resolved one way or the other.
            self.send_one_token(&port);
            sent = true;
            pacing.time_cont = self.clock.now() + pacing.backoff;
            retry_in = Some(pacing.backoff);
        }
        drop(pacing);

        if let Some(backoff) = retry_in {
            // Make sure the retransmission is retried after the backoff.
            self.trigger.trigger(backoff);
        }
        Ok(sent)
    }

    fn tokens_available(&self, length: u64) -> bool {
        // An output endpoint reports free slots, not tokens.
        match self.port.upgrade() {
            Some(port) => port.queue().available_slots() >= length,
            None => false,
        }
    }
}

impl fmt::Display for TunnelOutEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port.upgrade() {
            Some(port) => write!(f, "TunnelOutEndpoint(port_id={})", fmt_id(port.id())),
            None => write!(f, "TunnelOutEndpoint(port_id=<dropped>)"),
        }
    }
}
