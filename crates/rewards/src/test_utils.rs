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

//! In-memory [ChainGateway] over a synthetic chain, for tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use alloy::{
    primitives::{Address, LogData, U256},
    rpc::types::{BlockNumberOrTag, Log},
    sol_types::SolEvent,
};
use async_trait::async_trait;
use steth_contracts::IStETH;

use crate::{
    error::{ReadError, Result, RewardsError},
    gateway::{Baseline, Block, ChainGateway, LogQuery},
};

pub(crate) const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

pub(crate) struct MockGateway {
    blocks: Vec<Block>,
    logs: Vec<Log>,
    baseline: Baseline,
    block_calls: AtomicUsize,
    log_ranges: Mutex<Vec<(u64, u64)>>,
    baseline_reads: Mutex<Vec<(Address, u64)>>,
}

impl MockGateway {
    /// Chain whose block `n + 1` comes `spacing(n)` seconds after block `n`.
    pub(crate) fn with_spacing(len: u64, spacing: impl Fn(u64) -> u64) -> Self {
        let mut blocks = Vec::with_capacity(len as usize);
        let mut timestamp = GENESIS_TIMESTAMP;
        for number in 0..len {
            blocks.push(Block { number, timestamp });
            timestamp += spacing(number);
        }
        Self {
            blocks,
            logs: Vec::new(),
            baseline: Baseline {
                block: 0,
                shares: U256::ZERO,
                total_ether: U256::from(1_000_000u64),
                total_shares: U256::from(1_000_000u64),
            },
            block_calls: AtomicUsize::new(0),
            log_ranges: Mutex::new(Vec::new()),
            baseline_reads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn uniform(len: u64, seconds_per_block: u64) -> Self {
        Self::with_spacing(len, |_| seconds_per_block)
    }

    pub(crate) fn with_baseline(
        mut self,
        shares: u64,
        total_ether: u64,
        total_shares: u64,
    ) -> Self {
        self.baseline.shares = U256::from(shares);
        self.baseline.total_ether = U256::from(total_ether);
        self.baseline.total_shares = U256::from(total_shares);
        self
    }

    pub(crate) fn with_log(mut self, log: Log) -> Self {
        self.logs.push(log);
        self.logs.sort_by_key(|log| (log.block_number, log.log_index));
        self
    }

    pub(crate) fn block(&self, number: u64) -> Block {
        self.blocks[number as usize]
    }

    pub(crate) fn latest(&self) -> Block {
        self.blocks[self.blocks.len() - 1]
    }

    pub(crate) fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn log_ranges(&self) -> Vec<(u64, u64)> {
        self.log_ranges.lock().unwrap().clone()
    }

    pub(crate) fn baseline_reads(&self) -> Vec<(Address, u64)> {
        self.baseline_reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn get_block(&self, block: BlockNumberOrTag) -> Result<Block> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        match block {
            BlockNumberOrTag::Pending => Err(RewardsError::invalid("pending")),
            BlockNumberOrTag::Earliest => Ok(self.blocks[0]),
            BlockNumberOrTag::Number(number) => self
                .blocks
                .get(number as usize)
                .copied()
                .ok_or_else(|| ReadError::BlockNotFound(block).into()),
            _ => Ok(self.latest()),
        }
    }

    async fn get_logs(
        &self,
        query: &LogQuery,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>> {
        self.log_ranges.lock().unwrap().push((from_block, to_block));
        Ok(self
            .logs
            .iter()
            .filter(|log| {
                log.block_number.is_some_and(|n| n >= from_block && n <= to_block)
                    && query.matches(log)
            })
            .cloned()
            .collect())
    }

    async fn read_baseline(
        &self,
        _steth: Address,
        account: Address,
        block: u64,
    ) -> Result<Baseline> {
        self.baseline_reads.lock().unwrap().push((account, block));
        Ok(Baseline { block, ..self.baseline })
    }
}

pub(crate) fn rpc_log(address: Address, data: LogData, block: u64, log_index: u64) -> Log {
    Log {
        inner: alloy::primitives::Log { address, data },
        block_number: Some(block),
        log_index: Some(log_index),
        ..Default::default()
    }
}

pub(crate) fn transfer_log(
    steth: Address,
    from: Address,
    to: Address,
    shares: u64,
    block: u64,
    log_index: u64,
) -> Log {
    let event = IStETH::TransferShares { from, to, sharesValue: U256::from(shares) };
    rpc_log(steth, event.encode_log_data(), block, log_index)
}

pub(crate) fn rebase_log(
    steth: Address,
    post_total_ether: u64,
    post_total_shares: u64,
    block: u64,
    log_index: u64,
) -> Log {
    let event = IStETH::TokenRebased {
        reportTimestamp: U256::from(GENESIS_TIMESTAMP + block * 12),
        timeElapsed: U256::from(86_400u64),
        preTotalShares: U256::ZERO,
        preTotalEther: U256::ZERO,
        postTotalShares: U256::from(post_total_shares),
        postTotalEther: U256::from(post_total_ether),
        sharesMintedAsFees: U256::ZERO,
    };
    rpc_log(steth, event.encode_log_data(), block, log_index)
}
