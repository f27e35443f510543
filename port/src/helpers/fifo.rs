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

use crate::events::{PortId, Token};

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// A bounded, multi-reader, single-writer token queue.
///
/// Positions grow monotonically for the lifetime of the queue; the slot of a
/// position is `position % capacity`. Each registered reader advances in two
/// phases: `read` moves its tentative cursor, and a later `commit_reads`
/// either confirms the reads (the durable cursor catches up) or retracts
/// them. A slot is reclaimed for writing only once every reader's durable
/// cursor has passed it, so `read_pos <= tentative_read_pos <= write_pos`
/// and `write_pos - min(read_pos) <= capacity` hold at all times.
///
/// Writing to a full queue and reading past the last token return sentinels
/// (`false` / `None`); callers are expected to gate on `can_write` and
/// `can_read`.
#[derive(Clone, Debug)]
pub struct FifoQueue {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug)]
struct Inner {
    /// The ring of token slots.
    slots: Vec<Option<Token>>,
    /// The position of the next slot to be written.
    write_pos: u64,
    /// The durably consumed position of each reader.
    read_pos: IndexMap<PortId, u64>,
    /// The speculatively consumed position of each reader.
    tentative_read_pos: IndexMap<PortId, u64>,
}

impl Inner {
    /// Returns the smallest durable cursor over all readers.
    fn min_read_pos(&self) -> u64 {
        self.read_pos.values().copied().min().unwrap_or(self.write_pos)
    }

    /// Returns `true` if a token can be written without overwriting
    /// unacknowledged data.
    fn can_write(&self) -> bool {
        self.write_pos - self.min_read_pos() < self.slots.len() as u64
    }

    /// Returns `true` if the reader has unread tokens.
    fn can_read(&self, reader: PortId) -> bool {
        self.tentative_read_pos.get(&reader).is_some_and(|tentative| *tentative < self.write_pos)
    }
}

impl FifoQueue {
    /// Initializes a new queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "a token queue requires a nonzero capacity");
        Self {
            inner: Arc::new(RwLock::new(Inner {
                slots: vec![None; capacity],
                write_pos: 0,
                read_pos: Default::default(),
                tentative_read_pos: Default::default(),
            })),
        }
    }

    /// Returns the queue capacity.
    pub fn capacity(&self) -> usize {
        self.inner.read().slots.len()
    }

    /// Registers a reader with all cursors at the current write position, so
    /// it observes only future writes. Re-registering keeps the cursors.
    pub fn add_reader(&self, reader: PortId) {
        let mut inner = self.inner.write();
        let pos = inner.write_pos;
        inner.read_pos.entry(reader).or_insert(pos);
        inner.tentative_read_pos.entry(reader).or_insert(pos);
    }

    /// Returns `true` if a token can be written without overwriting
    /// unacknowledged data.
    pub fn can_write(&self) -> bool {
        self.inner.read().can_write()
    }

    /// Appends a token, returning `false` if the queue is full.
    pub fn write(&self, token: Token) -> bool {
        let mut inner = self.inner.write();
        if !inner.can_write() {
            return false;
        }
        let slot = (inner.write_pos % inner.slots.len() as u64) as usize;
        inner.slots[slot] = Some(token);
        inner.write_pos += 1;
        true
    }

    /// Returns `true` if the reader has unread tokens.
    pub fn can_read(&self, reader: PortId) -> bool {
        self.inner.read().can_read(reader)
    }

    /// Returns the token at the reader's tentative cursor and advances the
    /// cursor, or `None` if there is nothing to read.
    pub fn read(&self, reader: PortId) -> Option<Token> {
        let mut inner = self.inner.write();
        if !inner.can_read(reader) {
            return None;
        }
        let pos = *inner.tentative_read_pos.get(&reader)?;
        let slot = (pos % inner.slots.len() as u64) as usize;
        let token = inner.slots[slot].clone();
        *inner.tentative_read_pos.get_mut(&reader)? = pos + 1;
        token
    }

    /// Retracts the reader's tentative cursor back to its durable cursor.
    pub fn rollback_reads(&self, reader: PortId) {
        let mut inner = self.inner.write();
        if let Some(pos) = inner.read_pos.get(&reader).copied() {
            if let Some(tentative) = inner.tentative_read_pos.get_mut(&reader) {
                *tentative = pos;
            }
        }
    }

    /// Confirms (`ack = true`) or retracts (`ack = false`) all of the
    /// reader's tentative reads.
    pub fn commit_reads(&self, reader: PortId, ack: bool) {
        if ack {
            let mut inner = self.inner.write();
            if let Some(pos) = inner.tentative_read_pos.get(&reader).copied() {
                if let Some(read) = inner.read_pos.get_mut(&reader) {
                    *read = pos;
                }
            }
        } else {
            self.rollback_reads(reader);
        }
    }

    /// Confirms (`ack = true`) or retracts (`ack = false`) a single read.
    pub fn commit_one_read(&self, reader: PortId, ack: bool) {
        let mut inner = self.inner.write();
        let Some(read) = inner.read_pos.get(&reader).copied() else { return };
        let Some(tentative) = inner.tentative_read_pos.get(&reader).copied() else { return };
        if ack {
            if read < tentative {
                if let Some(pos) = inner.read_pos.get_mut(&reader) {
                    *pos = read + 1;
                }
            }
        } else if tentative > read {
            if let Some(pos) = inner.tentative_read_pos.get_mut(&reader) {
                *pos = tentative - 1;
            }
        }
    }

    /// Returns the number of tokens available to the reader.
    pub fn available_tokens(&self, reader: PortId) -> u64 {
        let inner = self.inner.read();
        match inner.tentative_read_pos.get(&reader) {
            Some(tentative) => inner.write_pos.saturating_sub(*tentative),
            None => 0,
        }
    }

    /// Returns the number of slots available to the writer.
    pub fn available_slots(&self) -> u64 {
        let inner = self.inner.read();
        (inner.slots.len() as u64).saturating_sub(inner.write_pos - inner.min_read_pos())
    }

    /// Returns the position of the next slot to be written.
    pub fn write_pos(&self) -> u64 {
        self.inner.read().write_pos
    }

    /// Returns the durable cursor of the reader.
    pub fn read_pos(&self, reader: PortId) -> Option<u64> {
        self.inner.read().read_pos.get(&reader).copied()
    }

    /// Returns the tentative cursor of the reader.
    pub fn tentative_read_pos(&self, reader: PortId) -> Option<u64> {
        self.inner.read().tentative_read_pos.get(&reader).copied()
    }

    /// Rebases the queue so that it reads as empty at `pos` for the given
    /// reader: the write position and both of the reader's cursors are set
    /// to `pos`. Used on the local migration seam, where the queue has
    /// exactly one reader.
    pub fn rebase(&self, reader: PortId, pos: u64) {
        let mut inner = self.inner.write();
        inner.write_pos = pos;
        if let Some(read) = inner.read_pos.get_mut(&reader) {
            *read = pos;
        }
        if let Some(tentative) = inner.tentative_read_pos.get_mut(&reader) {
            *tentative = pos;
        }
    }
}
