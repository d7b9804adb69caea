// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for reward reconstruction.

use alloy::{primitives::U256, rpc::types::BlockNumberOrTag};
use thiserror::Error;

/// Errors surfaced to callers of this crate.
///
/// [RewardsError::InvalidArgument] means the request was malformed and retrying it will not
/// help. [RewardsError::Read] means the chain could not be read, or did not contain what the
/// request needed.
#[derive(Error, Debug)]
pub enum RewardsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Failures reading from the chain gateway, or post-conditions on what was read.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("RPC error {0:?}")]
    Transport(#[from] alloy::transports::TransportError),

    #[error("Contract call error {0:?}")]
    Contract(#[from] alloy::contract::Error),

    #[error("Failed to decode {event} log: {source}")]
    Decode { event: &'static str, source: alloy::sol_types::Error },

    #[error("Log is missing {0}; pending logs cannot be ordered")]
    MissingLogField(&'static str),

    #[error("Block {0} not found")]
    BlockNotFound(BlockNumberOrTag),

    #[error("Could not find any rebase events")]
    NoRebaseEvents,

    #[error("Transfer of {transferred} shares at block {block} exceeds balance of {balance}")]
    InconsistentLedger { block: u64, balance: U256, transferred: U256 },
}

impl RewardsError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Whether this error was caused by the request rather than the chain.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

impl From<alloy::transports::TransportError> for RewardsError {
    fn from(err: alloy::transports::TransportError) -> Self {
        Self::Read(err.into())
    }
}

impl From<alloy::contract::Error> for RewardsError {
    fn from(err: alloy::contract::Error) -> Self {
        Self::Read(err.into())
    }
}

pub type Result<T, E = RewardsError> = std::result::Result<T, E>;
