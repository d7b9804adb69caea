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

//! Event fetching, chunked log scanning, and stETH event decoding.

use std::future::Future;

use alloy::{
    primitives::{Address, B256, U256},
    rpc::types::Log,
    sol_types::SolEvent,
};
use serde::Serialize;
use steth_contracts::IStETH;

use crate::{
    error::{ReadError, Result, RewardsError},
    gateway::{ChainGateway, LogQuery},
};

/// Consecutive closed sub-ranges covering `[from, to]`.
///
/// Sub-range boundaries fall at `from + k * step`, so every sub-range satisfies
/// `end - start <= step` and no two overlap or leave a gap.
#[derive(Debug, Clone)]
pub struct BlockRanges {
    start: u64,
    anchor: u64,
    to: u64,
    step: u64,
    done: bool,
}

impl BlockRanges {
    pub fn new(step: u64, from: u64, to: u64) -> Result<Self> {
        if step == 0 {
            return Err(RewardsError::invalid("step must be positive"));
        }
        if to < from {
            return Err(RewardsError::invalid(format!(
                "block range end {to} is before its start {from}"
            )));
        }
        Ok(Self { start: from, anchor: from, to, step, done: false })
    }
}

impl Iterator for BlockRanges {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.start;
        let end = self.anchor.saturating_add(self.step).min(self.to);
        if end >= self.to {
            self.done = true;
        } else {
            self.start = end + 1;
            self.anchor = end;
        }
        Some((start, end))
    }
}

/// Fetch one logical stream over `[from_block, to_block]` one sub-range at a time.
///
/// Sub-ranges are fetched sequentially and concatenated in order. With `max_count`, only the
/// most recent `max_count` items are kept, although the whole range is still scanned.
pub async fn scan<T, F, Fut>(
    step: u64,
    from_block: u64,
    to_block: u64,
    max_count: Option<usize>,
    mut fetch_range: F,
) -> Result<Vec<T>>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut all = Vec::new();
    for (from, to) in BlockRanges::new(step, from_block, to_block)? {
        tracing::debug!("Fetching logs in blocks [{from}, {to}]");
        all.extend(fetch_range(from, to).await?);
    }

    if let Some(max_count) = max_count {
        let excess = all.len().saturating_sub(max_count);
        all.drain(..excess);
    }
    Ok(all)
}

/// Query logs in chunks to avoid hitting provider limits
pub async fn query_logs_chunked<G: ChainGateway + ?Sized>(
    gateway: &G,
    query: &LogQuery,
    from_block: u64,
    to_block: u64,
    step: u64,
    max_count: Option<usize>,
) -> Result<Vec<Log>> {
    scan(step, from_block, to_block, max_count, |from, to| gateway.get_logs(query, from, to)).await
}

fn log_position(log: &Log) -> Result<(u64, u64), ReadError> {
    let block_number = log.block_number.ok_or(ReadError::MissingLogField("block number"))?;
    let log_index = log.log_index.ok_or(ReadError::MissingLogField("log index"))?;
    Ok((block_number, log_index))
}

fn decode<E: SolEvent>(log: &Log) -> Result<E, ReadError> {
    log.log_decode::<E>()
        .map(|decoded| decoded.inner.data)
        .map_err(|source| ReadError::Decode { event: E::SIGNATURE, source })
}

/// A decoded `TransferShares` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharesTransfer {
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: Option<B256>,
    pub from: Address,
    pub to: Address,
    pub shares_value: U256,
}

impl SharesTransfer {
    pub fn from_log(log: &Log) -> Result<Self, ReadError> {
        let (block_number, log_index) = log_position(log)?;
        let event = decode::<IStETH::TransferShares>(log)?;
        Ok(Self {
            block_number,
            log_index,
            transaction_hash: log.transaction_hash,
            from: event.from,
            to: event.to,
            shares_value: event.sharesValue,
        })
    }
}

/// A decoded `TokenRebased` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rebase {
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: Option<B256>,
    pub report_timestamp: U256,
    pub time_elapsed: U256,
    pub pre_total_shares: U256,
    pub pre_total_ether: U256,
    pub post_total_shares: U256,
    pub post_total_ether: U256,
    pub shares_minted_as_fees: U256,
}

impl Rebase {
    pub fn from_log(log: &Log) -> Result<Self, ReadError> {
        let (block_number, log_index) = log_position(log)?;
        let event = decode::<IStETH::TokenRebased>(log)?;
        Ok(Self {
            block_number,
            log_index,
            transaction_hash: log.transaction_hash,
            report_timestamp: event.reportTimestamp,
            time_elapsed: event.timeElapsed,
            pre_total_shares: event.preTotalShares,
            pre_total_ether: event.preTotalEther,
            post_total_shares: event.postTotalShares,
            post_total_ether: event.postTotalEther,
            shares_minted_as_fees: event.sharesMintedAsFees,
        })
    }
}

/// A stETH event as it was emitted on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum RawEvent {
    TransferShares(SharesTransfer),
    TokenRebased(Rebase),
}

impl RawEvent {
    pub fn block_number(&self) -> u64 {
        match self {
            Self::TransferShares(event) => event.block_number,
            Self::TokenRebased(event) => event.block_number,
        }
    }

    pub fn log_index(&self) -> u64 {
        match self {
            Self::TransferShares(event) => event.log_index,
            Self::TokenRebased(event) => event.log_index,
        }
    }
}

/// The three raw streams a reward ledger is built from.
#[derive(Debug, Clone, Default)]
pub struct LedgerStreams {
    /// Transfers whose sender is the account.
    pub shares_out: Vec<SharesTransfer>,
    /// Transfers whose recipient is the account.
    pub shares_in: Vec<SharesTransfer>,
    pub rebases: Vec<Rebase>,
}

pub(crate) fn transfer_query(steth: Address) -> LogQuery {
    LogQuery::new(steth, IStETH::TransferShares::SIGNATURE_HASH)
}

pub(crate) fn rebase_query(steth: Address) -> LogQuery {
    LogQuery::new(steth, IStETH::TokenRebased::SIGNATURE_HASH)
}

/// Fetch the most recent `max_count` rebase events in `[from_block, to_block]`.
pub async fn fetch_rebase_events<G: ChainGateway + ?Sized>(
    gateway: &G,
    steth: Address,
    from_block: u64,
    to_block: u64,
    step: u64,
    max_count: Option<usize>,
) -> Result<Vec<Rebase>> {
    let logs =
        query_logs_chunked(gateway, &rebase_query(steth), from_block, to_block, step, max_count)
            .await?;
    Ok(logs.iter().map(Rebase::from_log).collect::<Result<Vec<_>, _>>()?)
}

/// Fetch the share transfers out of and into `account`, and all rebases, in
/// `[from_block, to_block]`. The three streams are scanned concurrently.
pub async fn fetch_ledger_events<G: ChainGateway + ?Sized>(
    gateway: &G,
    steth: Address,
    account: Address,
    from_block: u64,
    to_block: u64,
    step: u64,
) -> Result<LedgerStreams> {
    tracing::info!(
        "Fetching ledger events ({} blocks)...",
        to_block.saturating_sub(from_block).saturating_add(1)
    );

    let out_query = transfer_query(steth).topic1(account.into_word());
    let in_query = transfer_query(steth).topic2(account.into_word());

    let (shares_out, shares_in, rebases) = tokio::join!(
        async {
            let logs =
                query_logs_chunked(gateway, &out_query, from_block, to_block, step, None).await?;
            logs.iter().map(SharesTransfer::from_log).collect::<Result<Vec<_>, _>>().map_err(
                |err| {
                    tracing::error!("Failed to decode outgoing share transfers: {err}");
                    RewardsError::from(err)
                },
            )
        },
        async {
            let logs =
                query_logs_chunked(gateway, &in_query, from_block, to_block, step, None).await?;
            logs.iter().map(SharesTransfer::from_log).collect::<Result<Vec<_>, _>>().map_err(
                |err| {
                    tracing::error!("Failed to decode incoming share transfers: {err}");
                    RewardsError::from(err)
                },
            )
        },
        fetch_rebase_events(gateway, steth, from_block, to_block, step, None),
    );

    let streams =
        LedgerStreams { shares_out: shares_out?, shares_in: shares_in?, rebases: rebases? };
    tracing::info!(
        "Fetched {} outgoing transfers, {} incoming transfers, {} rebases",
        streams.shares_out.len(),
        streams.shares_in.len(),
        streams.rebases.len()
    );
    Ok(streams)
}
