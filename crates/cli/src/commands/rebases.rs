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

use alloy::primitives::utils::format_ether;
use clap::Args;
use steth_rewards::ShareRate;

use super::format_timestamp;
use crate::config::GlobalConfig;

/// Command to show the most recent stETH rebase events.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct StethRebases {
    /// Number of events to show.
    #[clap(long, default_value_t = 1)]
    pub count: usize,
    /// Print the events as JSON to stdout.
    #[clap(long)]
    pub json: bool,
}

impl StethRebases {
    /// Run the [StethRebases] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let client = global_config.build_client().await?;
        let events = client.last_rebase_events(self.count).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&events)?);
            return Ok(());
        }

        for event in &events {
            let rate = ShareRate::new(event.post_total_ether, event.post_total_shares);
            let reported_at = format_timestamp(event.report_timestamp.saturating_to());
            tracing::info!(
                "Block {} (report {reported_at}): total pooled {} ETH, share rate {}",
                event.block_number,
                format_ether(event.post_total_ether),
                rate.as_f64()
            );
        }
        if events.len() < self.count {
            tracing::warn!("Only {} rebase events exist for this deployment", events.len());
        }

        Ok(())
    }
}
