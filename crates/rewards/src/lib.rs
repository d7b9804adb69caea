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

//! Historical stETH reward reconstruction.
//!
//! Rebuilds the balance history of an account from `TransferShares` and `TokenRebased` logs,
//! starting from on-chain state read just before the window, and classifies every change.

pub mod block_time;
pub mod error;
pub mod events;
pub mod gateway;
pub mod history;
pub mod ledger;

#[cfg(test)]
mod test_utils;

pub use block_time::{BlockOffset, BlockTimeResolver};
pub use error::{ReadError, Result, RewardsError};
pub use events::{
    fetch_ledger_events, fetch_rebase_events, query_logs_chunked, scan, BlockRanges,
    LedgerStreams, RawEvent, Rebase, SharesTransfer,
};
pub use gateway::{Baseline, Block, ChainGateway, LogQuery, ProviderGateway};
pub use history::{
    BlockRef, RangeStart, RebaseEventsQuery, RewardsClient, RewardsConfig, RewardsHistory,
    RewardsQuery,
};
pub use ledger::{
    Ledger, LedgerEvent, Reward, RewardKind, RewardLedgerBuilder, ShareRate, PRECISION,
};

/// Chunk size for log queries to stay within provider range limits
pub const LOG_QUERY_CHUNK_SIZE: u64 = 50_000;
/// Block time used to seed timestamp searches
pub const APPROX_SECONDS_PER_BLOCK: u64 = 12;
/// Days scanned by [RewardsClient::last_rebase_event]
pub const LAST_REBASE_LOOKBACK_DAYS: u64 = 2;
