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

//! The chain gateway: the read-only view of the chain that reward reconstruction runs against.

use alloy::{
    eips::BlockId,
    primitives::{Address, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::{
        client::RpcClient,
        types::{BlockNumberOrTag, Filter, Log},
    },
    transports::layers::RetryBackoffLayer,
};
use async_trait::async_trait;
use serde::Serialize;
use steth_contracts::IStETH;
use url::Url;

use crate::error::{ReadError, Result, RewardsError};

/// A block reduced to its position in the chain and its time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Block {
    pub number: u64,
    pub timestamp: u64,
}

/// Selects the logs of one event emitted by one contract, optionally narrowed by the first two
/// indexed topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub event_signature: B256,
    pub topic1: Option<B256>,
    pub topic2: Option<B256>,
}

impl LogQuery {
    pub fn new(address: Address, event_signature: B256) -> Self {
        Self { address, event_signature, topic1: None, topic2: None }
    }

    pub fn topic1(mut self, topic: impl Into<B256>) -> Self {
        self.topic1 = Some(topic.into());
        self
    }

    pub fn topic2(mut self, topic: impl Into<B256>) -> Self {
        self.topic2 = Some(topic.into());
        self
    }

    /// Build the `eth_getLogs` filter for this query over `[from_block, to_block]`.
    pub fn to_filter(&self, from_block: u64, to_block: u64) -> Filter {
        let mut filter = Filter::new()
            .address(self.address)
            .event_signature(self.event_signature)
            .from_block(from_block)
            .to_block(to_block);
        if let Some(topic) = self.topic1 {
            filter = filter.topic1(topic);
        }
        if let Some(topic) = self.topic2 {
            filter = filter.topic2(topic);
        }
        filter
    }

    /// Whether `log` would be returned by this query, ignoring its block range.
    pub fn matches(&self, log: &Log) -> bool {
        let topics = log.inner.data.topics();
        log.inner.address == self.address
            && topics.first() == Some(&self.event_signature)
            && self.topic1.is_none_or(|t| topics.get(1) == Some(&t))
            && self.topic2.is_none_or(|t| topics.get(2) == Some(&t))
    }
}

/// Share state of one account and of the whole pool, read at a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub block: u64,
    pub shares: U256,
    pub total_ether: U256,
    pub total_shares: U256,
}

/// Read-only access to blocks, logs and stETH state.
///
/// Implementations own their retry policy; callers in this crate never retry.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Fetch a block by number or tag.
    async fn get_block(&self, block: BlockNumberOrTag) -> Result<Block>;

    /// Fetch the logs matching `query` in `[from_block, to_block]`, ordered by
    /// `(block_number, log_index)`.
    async fn get_logs(&self, query: &LogQuery, from_block: u64, to_block: u64)
        -> Result<Vec<Log>>;

    /// Read the share balance of `account` and the pool totals, all pinned to `block`.
    async fn read_baseline(&self, steth: Address, account: Address, block: u64)
        -> Result<Baseline>;
}

/// [ChainGateway] backed by an alloy [Provider].
#[derive(Clone, Debug)]
pub struct ProviderGateway<P> {
    provider: P,
}

impl<P: Provider> ProviderGateway<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl ProviderGateway<DynProvider> {
    /// Connect to an HTTP RPC endpoint, retrying rate-limited requests with backoff.
    pub fn connect_http(rpc_url: Url) -> Self {
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_client(
                RpcClient::builder().layer(RetryBackoffLayer::new(3, 1000, 200)).http(rpc_url),
            )
            .erased();
        Self::new(provider)
    }
}

#[async_trait]
impl<P: Provider> ChainGateway for ProviderGateway<P> {
    async fn get_block(&self, block: BlockNumberOrTag) -> Result<Block> {
        if matches!(block, BlockNumberOrTag::Pending) {
            return Err(RewardsError::invalid("pending block has no fixed number"));
        }
        let fetched = self
            .provider
            .get_block_by_number(block)
            .await?
            .ok_or(ReadError::BlockNotFound(block))?;
        Ok(Block { number: fetched.header.number, timestamp: fetched.header.timestamp })
    }

    async fn get_logs(
        &self,
        query: &LogQuery,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>> {
        Ok(self.provider.get_logs(&query.to_filter(from_block, to_block)).await?)
    }

    async fn read_baseline(
        &self,
        steth: Address,
        account: Address,
        block: u64,
    ) -> Result<Baseline> {
        let steth = IStETH::new(steth, &self.provider);
        let at = BlockId::number(block);

        let (shares, total_ether, total_shares) = tokio::try_join!(
            async { steth.sharesOf(account).block(at).call().await },
            async { steth.getTotalPooledEther().block(at).call().await },
            async { steth.getTotalShares().block(at).call().await },
        )?;

        Ok(Baseline { block, shares, total_ether, total_shares })
    }
}
