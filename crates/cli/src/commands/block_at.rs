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

use clap::Args;
use steth_rewards::BlockRef;

use super::format_timestamp;
use crate::config::GlobalConfig;

/// Command to find the last block at or before a timestamp.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct StethBlockAt {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
}

impl StethBlockAt {
    /// Run the [StethBlockAt] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let client = global_config.build_client().await?;
        let block = client.resolve_block(BlockRef::Timestamp(self.timestamp)).await?;

        tracing::info!("Block {} at {}", block.number, format_timestamp(block.timestamp));
        if block.timestamp < self.timestamp {
            tracing::info!(
                "{} seconds before {}",
                self.timestamp - block.timestamp,
                format_timestamp(self.timestamp)
            );
        }

        Ok(())
    }
}
