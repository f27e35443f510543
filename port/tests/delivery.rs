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

mod common;

use common::{RecordingTrigger, VecTunnel};
use runnel_port::{
    events::{NodeId, ReplyValue, Token},
    helpers::ManualClock,
    Endpoint, Port, TunnelInEndpoint, TunnelOutEndpoint,
};

use std::{sync::Arc, time::Duration};

/// A producer and a consumer port wired together through recording tunnels.
struct Pair {
    producer: Arc<Port>,
    consumer: Arc<Port>,
    out: TunnelOutEndpoint,
    r#in: TunnelInEndpoint,
    out_tunnel: Arc<VecTunnel>,
    in_tunnel: Arc<VecTunnel>,
    clock: Arc<ManualClock>,
}

impl Pair {
    fn new(producer_capacity: usize, consumer_capacity: usize) -> Self {
        let producer = Arc::new(Port::new("out", "source", producer_capacity));
        let consumer = Arc::new(Port::new("in", "sink", consumer_capacity));
        let out_tunnel = Arc::new(VecTunnel::default());
        let in_tunnel = Arc::new(VecTunnel::default());
        let clock = Arc::new(ManualClock::new());
        let node = NodeId::new();

        let out = TunnelOutEndpoint::new(
            &producer,
            out_tunnel.clone(),
            node,
            consumer.id(),
            Arc::new(RecordingTrigger::default()),
            clock.clone(),
        );
        let r#in = TunnelInEndpoint::new(
            &consumer,
            in_tunnel.clone(),
            node,
            producer.id(),
            Arc::new(RecordingTrigger::default()),
        );
        out.attached();
        r#in.attached();

        Self { producer, consumer, out, r#in, out_tunnel, in_tunnel, clock }
    }

    /// Forwards every outbound frame to the consumer and every reply back
    /// to the producer, until the wire is quiet.
    fn pump(&self) {
        loop {
            let transfers = self.out_tunnel.drain_transfers();
            let replies = self.in_tunnel.drain_replies();
            if transfers.is_empty() && replies.is_empty() {
                break;
            }
            for transfer in transfers {
                self.r#in.recv_token(transfer);
            }
            for reply in replies {
                self.out.reply(reply.sequencenbr, reply.value);
            }
        }
    }

    /// Reads and commits every token currently visible to the consumer.
    fn consume_all(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.r#in.peek_token() {
            tokens.push(token);
        }
        self.r#in.commit_peek_as_read();
        tokens
    }
}

fn tokens(range: std::ops::Range<u8>) -> Vec<Token> {
    range.map(|byte| Token::from(vec![byte])).collect()
}

#[test]
fn bulk_pass_through_delivers_in_order() {
    let pair = Pair::new(8, 8);
    for token in tokens(0..3) {
        assert!(pair.producer.write(token));
    }
    assert!(pair.out.communicate().unwrap());

    // The wire frames carry the queue positions 0, 1, 2.
    let transfers = pair.out_tunnel.drain_transfers();
    assert_eq!(transfers.iter().map(|t| t.sequencenbr).collect::<Vec<_>>(), vec![0, 1, 2]);
    for transfer in transfers {
        pair.r#in.recv_token(transfer);
    }
    for reply in pair.in_tunnel.drain_replies() {
        assert_eq!(reply.value, ReplyValue::Ack);
        pair.out.reply(reply.sequencenbr, reply.value);
    }

    assert_eq!(pair.producer.queue().read_pos(pair.consumer.id()), Some(3));
    assert!(pair.out.is_bulk());
    assert_eq!(pair.out.backoff(), Duration::ZERO);
    assert_eq!(pair.consume_all(), tokens(0..3));
}

#[test]
fn a_nack_triggers_a_single_frame_retransmission() {
    let pair = Pair::new(8, 8);
    for token in tokens(0..4) {
        assert!(pair.producer.write(token));
    }
    assert!(pair.out.communicate().unwrap());
    for transfer in pair.out_tunnel.drain_transfers() {
        pair.r#in.recv_token(transfer);
    }
    // The consumer's own replies go missing; the producer instead observes
    // an ACK for 0 followed by a NACK for 1.
    pair.in_tunnel.drain();
    pair.out.reply(0, ReplyValue::Ack);
    pair.out.reply(1, ReplyValue::Nack);
    assert!(!pair.out.is_bulk());
    assert_eq!(pair.out.backoff(), Duration::from_millis(100));
    assert_eq!(pair.producer.queue().tentative_read_pos(pair.consumer.id()), Some(1));

    // The next pass retransmits exactly the rejected token.
    assert!(pair.out.communicate().unwrap());
    let retransmitted = pair.out_tunnel.drain_transfers();
    assert_eq!(retransmitted.len(), 1);
    assert_eq!(retransmitted[0].sequencenbr, 1);
    pair.r#in.recv_token(retransmitted[0].clone());

    // ACKs for 1, 2 and 3 restore bulk mode and drain the stream.
    for reply in pair.in_tunnel.drain_replies() {
        pair.out.reply(reply.sequencenbr, reply.value);
    }
    assert!(pair.out.is_bulk());
    pair.out.communicate().unwrap();
    pair.pump();

    assert_eq!(pair.out.backoff(), Duration::ZERO);
    assert_eq!(pair.producer.queue().read_pos(pair.consumer.id()), Some(4));
    assert_eq!(pair.consume_all(), tokens(0..4));
}

#[test]
fn consumer_backpressure_is_recovered_by_throttling() {
    let pair = Pair::new(8, 2);
    for token in tokens(0..6) {
        assert!(pair.producer.write(token));
    }

    // The bulk burst overruns the consumer's two free slots; the overflow
    // is NACKed and the sender rewinds to the first rejected token.
    assert!(pair.out.communicate().unwrap());
    for transfer in pair.out_tunnel.drain_transfers() {
        pair.r#in.recv_token(transfer);
    }
    for reply in pair.in_tunnel.drain_replies() {
        pair.out.reply(reply.sequencenbr, reply.value);
    }
    assert!(!pair.out.is_bulk());
    assert_eq!(pair.producer.queue().tentative_read_pos(pair.consumer.id()), Some(2));

    // Alternate consumer drains and throttled sends until done.
    let mut delivered = Vec::new();
    for _ in 0..16 {
        delivered.extend(pair.consume_all());
        pair.clock.advance(Duration::from_secs(1));
        pair.out.communicate().unwrap();
        pair.pump();
        if delivered.len() == 6 {
            break;
        }
    }
    delivered.extend(pair.consume_all());

    assert_eq!(delivered, tokens(0..6));
    assert_eq!(pair.producer.queue().read_pos(pair.consumer.id()), Some(6));
}

#[test]
fn lost_and_reordered_acks_deliver_exactly_once() {
    let pair = Pair::new(8, 8);
    for token in tokens(0..3) {
        assert!(pair.producer.write(token));
    }
    assert!(pair.out.communicate().unwrap());
    for transfer in pair.out_tunnel.drain_transfers() {
        pair.r#in.recv_token(transfer);
    }

    // The ACK for 0 is lost, and the remaining two arrive reordered; the
    // durable cursor may not move past the gap.
    let replies = pair.in_tunnel.drain_replies();
    pair.out.reply(replies[2].sequencenbr, replies[2].value);
    pair.out.reply(replies[1].sequencenbr, replies[1].value);
    assert_eq!(pair.producer.queue().read_pos(pair.consumer.id()), Some(0));

    // The tunnel reconnects; unacknowledged tokens are replayed and the
    // receiver deduplicates them by sequence number.
    pair.out.detached();
    assert_eq!(pair.producer.queue().tentative_read_pos(pair.consumer.id()), Some(0));
    pair.out.attached();
    assert!(pair.out.communicate().unwrap());
    pair.pump();

    assert_eq!(pair.producer.queue().read_pos(pair.consumer.id()), Some(3));
    assert_eq!(pair.consumer.queue().write_pos(), 3);
    assert_eq!(pair.consume_all(), tokens(0..3));
}

#[test]
fn a_duplicate_frame_leaves_the_consumer_stream_unchanged() {
    let pair = Pair::new(8, 8);
    for token in tokens(0..5) {
        assert!(pair.producer.write(token));
    }
    pair.out.communicate().unwrap();
    let transfers = pair.out_tunnel.drain_transfers();
    for transfer in &transfers {
        pair.r#in.recv_token(transfer.clone());
    }
    pair.in_tunnel.drain();
    assert_eq!(pair.consumer.queue().write_pos(), 5);

    // Replaying an old frame yields a fresh ACK and nothing else.
    pair.r#in.recv_token(transfers[3].clone());
    let replies = pair.in_tunnel.drain_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].sequencenbr, 3);
    assert_eq!(replies[0].value, ReplyValue::Ack);
    assert_eq!(pair.consumer.queue().write_pos(), 5);
    assert_eq!(pair.consume_all(), tokens(0..5));
}
