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

//! Live checks against Ethereum mainnet. Requires an archive node at `ETH_MAINNET_RPC_URL`.

use std::env;

use alloy::primitives::{address, Address};
use steth_contracts::deployments::MAINNET;
use steth_rewards::{
    BlockOffset, BlockRef, ChainGateway, ProviderGateway, RewardKind, RewardsClient, RewardsQuery,
};
use tracing_subscriber::EnvFilter;
use url::Url;

/// The wstETH contract; it holds shares and moves them in most blocks.
const WSTETH: Address = address!("0x7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0");

const TO_BLOCK: u64 = 20_000_000;

fn client() -> RewardsClient<ProviderGateway<alloy::providers::DynProvider>> {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    let rpc_url = env::var("ETH_MAINNET_RPC_URL")
        .expect("ETH_MAINNET_RPC_URL environment variable must be set");
    let gateway = ProviderGateway::connect_http(Url::parse(&rpc_url).expect("invalid RPC URL"));
    RewardsClient::new(gateway, MAINNET)
}

#[tokio::test]
#[ignore = "requires ETH_MAINNET_RPC_URL"]
async fn replay_matches_onchain_balance() {
    let client = client();
    let query = RewardsQuery::new(WSTETH, BlockOffset::Days(2)).to(TO_BLOCK);
    let history = client.rewards_history(&query.include_zero_rebases(true)).await.unwrap();

    assert_eq!(history.to_block, TO_BLOCK);
    assert!(history.rewards.iter().any(|r| r.kind == RewardKind::Rebase));

    let end = client
        .gateway()
        .read_baseline(MAINNET.steth_address, WSTETH, TO_BLOCK)
        .await
        .unwrap();
    let last = history.rewards.last().unwrap();
    assert_eq!(last.balance_shares, end.shares);
}

#[tokio::test]
#[ignore = "requires ETH_MAINNET_RPC_URL"]
async fn timestamp_resolution() {
    let client = client();
    let block = client.resolve_block(BlockRef::from(TO_BLOCK)).await.unwrap();

    let found = client.resolve_block(BlockRef::Timestamp(block.timestamp + 5)).await.unwrap();
    assert_eq!(found, block);
}

#[tokio::test]
#[ignore = "requires ETH_MAINNET_RPC_URL"]
async fn last_rebase_events_are_ordered() {
    let client = client();
    let events = client.last_rebase_events(3).await.unwrap();

    assert_eq!(events.len(), 3);
    assert!(events.windows(2).all(|pair| pair[0].block_number < pair[1].block_number));

    let last = client.last_rebase_event().await.unwrap();
    assert_eq!(&last, events.last().unwrap());
}
