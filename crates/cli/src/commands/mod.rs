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

//! Commands of the stETH rewards CLI.

mod block_at;
mod history;
mod rebases;

pub use block_at::StethBlockAt;
pub use history::{EndArgs, StartArgs, StethHistory};
pub use rebases::StethRebases;

use chrono::DateTime;
use clap::Subcommand;

use crate::config::GlobalConfig;

/// Commands for stETH reward queries.
#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Reconstruct the reward history of an account.
    History(StethHistory),
    /// Show the most recent rebase events.
    Rebases(StethRebases),
    /// Find the last block at or before a unix timestamp.
    BlockAt(StethBlockAt),
}

impl Command {
    /// Run the command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        match self {
            Self::History(cmd) => cmd.run(global_config).await,
            Self::Rebases(cmd) => cmd.run(global_config).await,
            Self::BlockAt(cmd) => cmd.run(global_config).await,
        }
    }
}

/// Format a unix timestamp as a UTC date, falling back to the raw number.
pub(crate) fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
