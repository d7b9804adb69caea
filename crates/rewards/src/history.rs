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

//! Caller-facing queries: reward history over a window given by blocks, timestamps or offsets,
//! and the rebase event helpers.

use alloy::{
    primitives::{Address, I256, U256},
    rpc::types::BlockNumberOrTag,
};
use serde::Serialize;
use steth_contracts::Deployment;

use crate::{
    block_time::{BlockOffset, BlockTimeResolver, SECONDS_PER_DAY},
    error::{ReadError, Result, RewardsError},
    events::{fetch_rebase_events, Rebase},
    gateway::{Block, ChainGateway},
    ledger::{Reward, RewardKind, RewardLedgerBuilder},
    APPROX_SECONDS_PER_BLOCK, LAST_REBASE_LOOKBACK_DAYS, LOG_QUERY_CHUNK_SIZE,
};

/// Tunables shared by every query of a [RewardsClient].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardsConfig {
    /// Widest block range requested from the gateway in one log query.
    pub step_block: u64,
    /// Block time used to seed timestamp searches and day look-backs.
    pub approx_seconds_per_block: u64,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            step_block: LOG_QUERY_CHUNK_SIZE,
            approx_seconds_per_block: APPROX_SECONDS_PER_BLOCK,
        }
    }
}

/// A block given by tag, number or timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    Tag(BlockNumberOrTag),
    /// The last block at or before this unix timestamp.
    Timestamp(u64),
}

impl BlockRef {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Tag(BlockNumberOrTag::Pending) => {
                Err(RewardsError::invalid("pending block cannot anchor a window"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for BlockRef {
    fn default() -> Self {
        Self::Tag(BlockNumberOrTag::Latest)
    }
}

impl From<u64> for BlockRef {
    fn from(number: u64) -> Self {
        Self::Tag(BlockNumberOrTag::Number(number))
    }
}

impl From<BlockNumberOrTag> for BlockRef {
    fn from(tag: BlockNumberOrTag) -> Self {
        Self::Tag(tag)
    }
}

/// Start of a window: a block of its own, or an offset back from the window end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStart {
    Block(BlockRef),
    Back(BlockOffset),
}

impl RangeStart {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Block(block) => block.validate(),
            Self::Back(_) => Ok(()),
        }
    }
}

impl From<BlockRef> for RangeStart {
    fn from(block: BlockRef) -> Self {
        Self::Block(block)
    }
}

impl From<BlockOffset> for RangeStart {
    fn from(offset: BlockOffset) -> Self {
        Self::Back(offset)
    }
}

/// Request for [RewardsClient::rewards_history].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardsQuery {
    pub account: Address,
    pub from: RangeStart,
    pub to: BlockRef,
    /// Overrides [RewardsConfig::step_block].
    pub step_block: Option<u64>,
    /// Keep rebase records that did not change the balance.
    pub include_zero_rebases: bool,
    /// Drop every record that is not a rebase.
    pub include_only_rebases: bool,
}

impl RewardsQuery {
    pub fn new(account: Address, from: impl Into<RangeStart>) -> Self {
        Self {
            account,
            from: from.into(),
            to: BlockRef::default(),
            step_block: None,
            include_zero_rebases: false,
            include_only_rebases: false,
        }
    }

    pub fn to(self, to: impl Into<BlockRef>) -> Self {
        Self { to: to.into(), ..self }
    }

    pub fn step_block(self, step_block: u64) -> Self {
        Self { step_block: Some(step_block), ..self }
    }

    pub fn include_zero_rebases(self, include: bool) -> Self {
        Self { include_zero_rebases: include, ..self }
    }

    pub fn include_only_rebases(self, include: bool) -> Self {
        Self { include_only_rebases: include, ..self }
    }
}

/// Reward history of one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardsHistory {
    pub rewards: Vec<Reward>,
    pub base_balance_shares: U256,
    pub base_share_rate: f64,
    pub base_balance: U256,
    /// Sum of the balance changes of every rebase in the window, filtered or not.
    pub total_rewards: I256,
    pub from_block: u64,
    pub to_block: u64,
}

/// Request for [RewardsClient::rebase_events].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseEventsQuery {
    pub from: RangeStart,
    pub to: BlockRef,
    /// Keep only the most recent events.
    pub max_count: Option<usize>,
    pub step_block: Option<u64>,
}

impl RebaseEventsQuery {
    pub fn new(from: impl Into<RangeStart>) -> Self {
        Self { from: from.into(), to: BlockRef::default(), max_count: None, step_block: None }
    }

    pub fn to(self, to: impl Into<BlockRef>) -> Self {
        Self { to: to.into(), ..self }
    }

    pub fn max_count(self, max_count: usize) -> Self {
        Self { max_count: Some(max_count), ..self }
    }

    pub fn step_block(self, step_block: u64) -> Self {
        Self { step_block: Some(step_block), ..self }
    }
}

/// Reward and rebase queries against one stETH deployment.
#[derive(Debug)]
pub struct RewardsClient<G> {
    gateway: G,
    deployment: Deployment,
    config: RewardsConfig,
}

impl<G: ChainGateway> RewardsClient<G> {
    pub fn new(gateway: G, deployment: Deployment) -> Self {
        Self { gateway, deployment, config: RewardsConfig::default() }
    }

    pub fn with_config(self, config: RewardsConfig) -> Self {
        Self { config, ..self }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn config(&self) -> &RewardsConfig {
        &self.config
    }

    pub fn resolver(&self) -> BlockTimeResolver<'_, G> {
        BlockTimeResolver::new(&self.gateway, self.config.approx_seconds_per_block)
    }

    /// Resolve a [BlockRef] to a concrete block.
    pub async fn resolve_block(&self, block: BlockRef) -> Result<Block> {
        block.validate()?;
        match block {
            BlockRef::Tag(tag) => self.gateway.get_block(tag).await,
            BlockRef::Timestamp(timestamp) => self.resolver().block_at_or_before(timestamp).await,
        }
    }

    /// Resolve a window to `(from_block, to_block)`, checking that it is not inverted.
    pub async fn resolve_range(&self, from: RangeStart, to: BlockRef) -> Result<(u64, u64)> {
        from.validate()?;
        to.validate()?;

        let to_block = self.resolve_block(to).await?;
        let from_block = match from {
            RangeStart::Block(block) => self.resolve_block(block).await?.number,
            RangeStart::Back(offset) => self.resolver().offset_block(to_block, offset).await?,
        };
        if from_block > to_block.number {
            return Err(RewardsError::invalid(format!(
                "window start {from_block} is after its end {}",
                to_block.number
            )));
        }
        Ok((from_block, to_block.number))
    }

    fn step(&self, step_block: Option<u64>) -> Result<u64> {
        match step_block.unwrap_or(self.config.step_block) {
            0 => Err(RewardsError::invalid("step must be positive")),
            step => Ok(step),
        }
    }

    /// Reconstruct the reward history of `query.account` over the requested window.
    pub async fn rewards_history(&self, query: &RewardsQuery) -> Result<RewardsHistory> {
        let step = self.step(query.step_block)?;
        let (from_block, to_block) = self.resolve_range(query.from, query.to).await?;

        let ledger = RewardLedgerBuilder::new(&self.gateway, &self.deployment)
            .with_step_block(step)
            .build(query.account, from_block, to_block)
            .await?;

        let total_rewards = ledger
            .rewards
            .iter()
            .filter(|reward| reward.kind == RewardKind::Rebase)
            .fold(I256::ZERO, |total, reward| total + reward.change);

        let rewards = ledger
            .rewards
            .into_iter()
            .filter(|reward| match reward.kind {
                RewardKind::Rebase => query.include_zero_rebases || !reward.change.is_zero(),
                _ => !query.include_only_rebases,
            })
            .collect();

        Ok(RewardsHistory {
            rewards,
            base_balance_shares: ledger.base_balance_shares,
            base_share_rate: ledger.base_share_rate,
            base_balance: ledger.base_balance,
            total_rewards,
            from_block,
            to_block,
        })
    }

    /// Rebase events of the stETH contract in the requested window.
    pub async fn rebase_events(&self, query: &RebaseEventsQuery) -> Result<Vec<Rebase>> {
        let step = self.step(query.step_block)?;
        let (from_block, to_block) = self.resolve_range(query.from, query.to).await?;
        fetch_rebase_events(
            &self.gateway,
            self.deployment.steth_address,
            from_block,
            to_block,
            step,
            query.max_count,
        )
        .await
    }

    /// Approximate number of blocks in `days` days.
    fn day_blocks(&self, days: u64) -> Result<u64> {
        if self.config.approx_seconds_per_block == 0 {
            return Err(RewardsError::invalid("approximate seconds per block must be positive"));
        }
        Ok(days.saturating_mul(SECONDS_PER_DAY) / self.config.approx_seconds_per_block)
    }

    fn floor_block(&self) -> u64 {
        self.deployment.deployment_block.unwrap_or(0)
    }

    /// The most recent rebase event, looked for over the last two days.
    pub async fn last_rebase_event(&self) -> Result<Rebase> {
        let lookback = self.day_blocks(LAST_REBASE_LOOKBACK_DAYS)?;
        let latest = self.gateway.get_block(BlockNumberOrTag::Latest).await?;
        let from_block = latest.number.saturating_sub(lookback).max(self.floor_block());

        let mut events = fetch_rebase_events(
            &self.gateway,
            self.deployment.steth_address,
            from_block.min(latest.number),
            latest.number,
            self.config.step_block,
            Some(1),
        )
        .await?;
        events.pop().ok_or_else(|| ReadError::NoRebaseEvents.into())
    }

    /// The `count` most recent rebase events, oldest first.
    ///
    /// Rebases are reported about daily, so the first pass looks `count + 1` days back. While
    /// fewer than `count` events are found, the look-back doubles and the window is re-anchored
    /// at the newest event found so far, until the deployment block is reached. Fewer than
    /// `count` events are returned only when the whole history holds fewer.
    pub async fn last_rebase_events(&self, count: usize) -> Result<Vec<Rebase>> {
        if count == 0 {
            return Err(RewardsError::invalid("count must be positive"));
        }

        let floor = self.floor_block();
        let mut lookback = self.day_blocks((count as u64).saturating_add(1))?.max(1);
        let mut to_block = self.gateway.get_block(BlockNumberOrTag::Latest).await?.number;
        loop {
            let from_block = to_block.saturating_sub(lookback).max(floor).min(to_block);
            let events = fetch_rebase_events(
                &self.gateway,
                self.deployment.steth_address,
                from_block,
                to_block,
                self.config.step_block,
                Some(count),
            )
            .await?;
            tracing::debug!(
                from_block,
                to_block,
                found = events.len(),
                "Scanned for rebase events"
            );

            if events.len() >= count || from_block <= floor {
                if events.is_empty() {
                    return Err(ReadError::NoRebaseEvents.into());
                }
                return Ok(events);
            }

            // Everything after the newest event found was already scanned and holds no rebase.
            if let Some(last) = events.last() {
                to_block = last.block_number;
            }
            lookback = lookback.saturating_mul(2);
        }
    }
}
