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

use alloy::primitives::{utils::format_ether, Address};
use clap::Args;
use steth_rewards::{BlockOffset, BlockRef, RangeStart, RewardKind, RewardsQuery};

use crate::config::GlobalConfig;

/// Start of the history window. Exactly one option must be given.
#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
pub struct StartArgs {
    /// First block of the window.
    #[clap(long)]
    pub from_block: Option<u64>,
    /// Start at the last block at or before this unix timestamp.
    #[clap(long)]
    pub from_timestamp: Option<u64>,
    /// Start this many blocks before the end of the window.
    #[clap(long)]
    pub back_blocks: Option<u64>,
    /// Start this many days before the end of the window.
    #[clap(long)]
    pub back_days: Option<u64>,
    /// Start this many seconds before the end of the window.
    #[clap(long)]
    pub back_seconds: Option<u64>,
}

impl StartArgs {
    pub fn range_start(&self) -> anyhow::Result<RangeStart> {
        if let Some(block) = self.from_block {
            return Ok(BlockRef::from(block).into());
        }
        if let Some(timestamp) = self.from_timestamp {
            return Ok(BlockRef::Timestamp(timestamp).into());
        }
        Ok(BlockOffset::from_parts(self.back_blocks, self.back_days, self.back_seconds)?.into())
    }
}

/// End of a window. Defaults to the latest block.
#[derive(Args, Clone, Debug)]
#[group(required = false, multiple = false)]
pub struct EndArgs {
    /// Last block of the window.
    #[clap(long)]
    pub to_block: Option<u64>,
    /// End at the last block at or before this unix timestamp.
    #[clap(long)]
    pub to_timestamp: Option<u64>,
}

impl EndArgs {
    pub fn block_ref(&self) -> BlockRef {
        match (self.to_block, self.to_timestamp) {
            (Some(block), _) => block.into(),
            (None, Some(timestamp)) => BlockRef::Timestamp(timestamp),
            (None, None) => BlockRef::default(),
        }
    }
}

/// Command to reconstruct the stETH reward history of an account.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct StethHistory {
    /// Address to build the history for.
    pub account: Address,
    #[clap(flatten, next_help_heading = "Window start")]
    pub start: StartArgs,
    #[clap(flatten, next_help_heading = "Window end")]
    pub end: EndArgs,
    /// Keep rebases that did not change the balance.
    #[clap(long)]
    pub include_zero_rebases: bool,
    /// Show rebases only.
    #[clap(long)]
    pub only_rebases: bool,
    /// Print the history as JSON to stdout.
    #[clap(long)]
    pub json: bool,
}

impl StethHistory {
    pub fn query(&self) -> anyhow::Result<RewardsQuery> {
        Ok(RewardsQuery::new(self.account, self.start.range_start()?)
            .to(self.end.block_ref())
            .include_zero_rebases(self.include_zero_rebases)
            .include_only_rebases(self.only_rebases))
    }

    /// Run the [StethHistory] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let query = self.query()?;
        let client = global_config.build_client().await?;
        let history = client.rewards_history(&query).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&history)?);
            return Ok(());
        }

        tracing::info!(
            "Blocks {} to {}; starting balance {} stETH ({} shares, share rate {})",
            history.from_block,
            history.to_block,
            format_ether(history.base_balance),
            history.base_balance_shares,
            history.base_share_rate
        );
        for reward in &history.rewards {
            let kind = match reward.kind {
                RewardKind::Submit => "submit",
                RewardKind::Withdrawal => "withdrawal",
                RewardKind::TransferIn => "transfer in",
                RewardKind::TransferOut => "transfer out",
                RewardKind::Rebase => "rebase",
            };
            tracing::info!(
                "Block {}: {kind}, change {} stETH, balance {} stETH",
                reward.original_event.block_number(),
                format_ether(reward.change),
                format_ether(reward.balance)
            );
        }
        tracing::info!("Total rebase rewards: {} stETH", format_ether(history.total_rewards));

        Ok(())
    }
}
