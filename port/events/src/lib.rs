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

#![forbid(unsafe_code)]

mod helpers;
pub use helpers::*;

mod ids;
pub use ids::*;

mod token;
pub use token::*;

mod token_reply;
pub use token_reply::*;

mod token_transfer;
pub use token_transfer::*;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub trait EventTrait {
    /// Returns the event name.
    fn name(&self) -> Cow<'static, str>;
}

/// The events exchanged between paired tunnel endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    TokenTransfer(TokenTransfer),
    TokenReply(TokenReply),
}

impl Event {
    /// The version of the event protocol; it can be incremented in order to force users to update.
    pub const VERSION: u32 = 1;

    /// Returns the event name.
    #[inline]
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            Self::TokenTransfer(event) => event.name(),
            Self::TokenReply(event) => event.name(),
        }
    }

    /// Returns the event ID.
    #[inline]
    pub fn id(&self) -> u16 {
        match self {
            Self::TokenTransfer(..) => 0,
            Self::TokenReply(..) => 1,
        }
    }
}

impl From<TokenTransfer> for Event {
    fn from(event: TokenTransfer) -> Self {
        Self::TokenTransfer(event)
    }
}

impl From<TokenReply> for Event {
    fn from(event: TokenReply) -> Self {
        Self::TokenReply(event)
    }
}
