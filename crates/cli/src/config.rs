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

//! Common configuration options for commands in the stETH rewards CLI.

use alloy::providers::{DynProvider, Provider};
use anyhow::{Context, Result};
use clap::Args;
use steth_contracts::Deployment;
use steth_rewards::{ProviderGateway, RewardsClient, RewardsConfig};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Client type built by [GlobalConfig::build_client].
pub type Client = RewardsClient<ProviderGateway<DynProvider>>;

/// Common configuration options for all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalConfig {
    /// URL of the Ethereum RPC endpoint
    #[clap(short, long, env = "RPC_URL", global = true)]
    pub rpc_url: Option<Url>,

    /// Log level (error, warn, info, debug, trace)
    #[clap(long, env = "LOG_LEVEL", global = true, default_value = "info")]
    pub log_level: LevelFilter,

    /// Whether to log in JSON format.
    #[clap(long, env, global = true, default_value_t = false)]
    pub log_json: bool,

    /// Widest block range requested in one log query.
    ///
    /// Lower this when the RPC provider rejects wide `eth_getLogs` ranges.
    #[clap(long, env = "STEP_BLOCK", global = true)]
    pub step_block: Option<u64>,

    /// Configuration for the stETH deployment to use.
    #[clap(flatten, next_help_heading = "stETH Deployment")]
    pub deployment: Option<Deployment>,
}

impl GlobalConfig {
    /// Access [Self::rpc_url] or return an error that can be shown to the user.
    pub fn require_rpc_url(&self) -> Result<Url> {
        self.rpc_url
            .clone()
            .context("Blockchain RPC URL not provided; please set --rpc-url or the RPC_URL env var")
    }

    /// Library settings derived from these options.
    pub fn rewards_config(&self) -> RewardsConfig {
        let defaults = RewardsConfig::default();
        RewardsConfig { step_block: self.step_block.unwrap_or(defaults.step_block), ..defaults }
    }

    /// Connect to [Self::rpc_url] and build a [RewardsClient].
    ///
    /// Without an explicit deployment, it is looked up from the chain ID of the endpoint.
    pub async fn build_client(&self) -> Result<Client> {
        let rpc_url = self.require_rpc_url()?;
        let gateway = ProviderGateway::connect_http(rpc_url.clone());

        let deployment = match self.deployment.clone() {
            Some(deployment) => deployment,
            None => {
                let chain_id = gateway
                    .provider()
                    .get_chain_id()
                    .await
                    .with_context(|| format!("failed to query chain ID from {rpc_url}"))?;
                Deployment::from_chain_id(chain_id).context(
                    "could not determine stETH deployment from chain ID; \
                     please specify deployment explicitly",
                )?
            }
        };
        tracing::debug!("Using stETH deployment {deployment:?}");

        Ok(RewardsClient::new(gateway, deployment).with_config(self.rewards_config()))
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use clap::Parser;

    use super::*;

    #[derive(Parser, Debug)]
    struct Cli {
        #[clap(flatten)]
        config: GlobalConfig,
    }

    #[test]
    fn deployment_is_optional() {
        let cli = Cli::try_parse_from(["steth-rewards", "--rpc-url", "http://localhost:8545"])
            .unwrap();
        assert!(cli.config.deployment.is_none());
        assert_eq!(cli.config.require_rpc_url().unwrap().as_str(), "http://localhost:8545/");
    }

    #[test]
    fn explicit_deployment() {
        let cli = Cli::try_parse_from([
            "steth-rewards",
            "--steth-address",
            "0x00000000000000000000000000000000005e7e70",
            "--withdrawal-queue-address",
            "0x0000000000000000000000000000000000000999",
            "--deployment-block",
            "42",
        ])
        .unwrap();
        let deployment = cli.config.deployment.unwrap();
        assert_eq!(
            deployment.steth_address,
            address!("0x00000000000000000000000000000000005e7e70")
        );
        assert_eq!(deployment.deployment_block, Some(42));
    }

    #[test]
    fn step_block_overrides_default() {
        let cli = Cli::try_parse_from(["steth-rewards", "--step-block", "2500"]).unwrap();
        assert_eq!(cli.config.rewards_config().step_block, 2500);
        assert_eq!(
            cli.config.rewards_config().approx_seconds_per_block,
            RewardsConfig::default().approx_seconds_per_block
        );
    }
}
