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

use crate::Event;

use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};
use tracing::*;

/// The maximum size of an event that can be transmitted through a tunnel.
const MAX_EVENT_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// The codec used to decode and encode tunnel `Event`s.
pub struct EventCodec {
    codec: LengthDelimitedCodec,
}

impl Default for EventCodec {
    fn default() -> Self {
        Self { codec: LengthDelimitedCodec::builder().max_frame_length(MAX_EVENT_SIZE).little_endian().new_codec() }
    }
}

impl Encoder<Event> for EventCodec {
    type Error = io::Error;

    fn encode(&mut self, event: Event, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = bincode::serialize(&event)
            // This error should never happen, the conversion is for greater compatibility.
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "serialization error"))?;

        self.codec.encode(Bytes::from(payload), dst)
    }
}

impl Decoder for EventCodec {
    type Error = io::Error;
    type Item = Event;

    fn decode(&mut self, source: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Decode a frame containing bytes belonging to an event.
        let bytes = match self.codec.decode(source)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        // Convert the bytes to an event, or fail if it is not valid.
        match bincode::deserialize(&bytes) {
            Ok(event) => Ok(Some(event)),
            Err(error) => {
                warn!("Failed to deserialize an event: {error}");
                Err(io::ErrorKind::InvalidData.into())
            }
        }
    }
}
