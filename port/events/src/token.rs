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

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One unit of dataflow: an opaque payload produced by an actor action, or
/// the end-of-stream marker that terminates a token stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Token {
    /// An opaque data payload.
    Data(Bytes),
    /// The end-of-stream marker.
    End,
}

impl Token {
    /// Returns `true` if this token is the end-of-stream marker.
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl From<Bytes> for Token {
    fn from(payload: Bytes) -> Self {
        Self::Data(payload)
    }
}

impl From<Vec<u8>> for Token {
    fn from(payload: Vec<u8>) -> Self {
        Self::Data(Bytes::from(payload))
    }
}

impl From<&'static str> for Token {
    fn from(payload: &'static str) -> Self {
        Self::Data(Bytes::from_static(payload.as_bytes()))
    }
}
