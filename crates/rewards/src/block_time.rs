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

//! Mapping between wall-clock time and block numbers.

use alloy::rpc::types::BlockNumberOrTag;

use crate::{
    error::{Result, RewardsError},
    gateway::{Block, ChainGateway},
};

/// Seconds in a day, used by [BlockOffset::Days].
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Distance back from a reference block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOffset {
    Blocks(u64),
    Days(u64),
    Seconds(u64),
}

impl BlockOffset {
    /// Build an offset from optional parts, of which exactly one must be set.
    pub fn from_parts(
        blocks: Option<u64>,
        days: Option<u64>,
        seconds: Option<u64>,
    ) -> Result<Self> {
        match (blocks, days, seconds) {
            (Some(n), None, None) => Ok(Self::Blocks(n)),
            (None, Some(n), None) => Ok(Self::Days(n)),
            (None, None, Some(n)) => Ok(Self::Seconds(n)),
            (None, None, None) => {
                Err(RewardsError::invalid("offset requires one of blocks, days or seconds"))
            }
            _ => Err(RewardsError::invalid("offset accepts only one of blocks, days or seconds")),
        }
    }
}

/// Resolves timestamps and offsets to blocks with an estimate followed by a binary search.
#[derive(Debug)]
pub struct BlockTimeResolver<'a, G: ?Sized> {
    gateway: &'a G,
    approx_seconds_per_block: u64,
}

impl<'a, G: ChainGateway + ?Sized> BlockTimeResolver<'a, G> {
    pub fn new(gateway: &'a G, approx_seconds_per_block: u64) -> Self {
        Self { gateway, approx_seconds_per_block }
    }

    /// Returns the block with the greatest timestamp not after `target`, or the latest block
    /// when `target` is at or beyond the chain head.
    pub async fn block_at_or_before(&self, target: u64) -> Result<Block> {
        if self.approx_seconds_per_block == 0 {
            return Err(RewardsError::invalid("approximate seconds per block must be positive"));
        }

        let latest = self.gateway.get_block(BlockNumberOrTag::Latest).await?;
        if latest.timestamp <= target {
            return Ok(latest);
        }

        let blocks_back = (latest.timestamp - target) / self.approx_seconds_per_block;
        let guess = latest.number.checked_sub(blocks_back).ok_or_else(|| {
            RewardsError::invalid(format!(
                "estimate for timestamp {target} falls before genesis; \
                 raise the approximate seconds per block"
            ))
        })?;

        let guessed = self.gateway.get_block(BlockNumberOrTag::Number(guess)).await?;
        if guessed.timestamp == target {
            return Ok(guessed);
        }

        // The guess bounds the search from one side; the other side is genesis or the head.
        let (mut left, mut right, mut best) = if guessed.timestamp < target {
            (guess + 1, latest.number, Some(guessed))
        } else if guess == 0 {
            (1, 0, None)
        } else {
            (0, guess - 1, None)
        };

        while left <= right {
            let mid = left + (right - left) / 2;
            let block = self.gateway.get_block(BlockNumberOrTag::Number(mid)).await?;
            tracing::debug!(left, right, mid, timestamp = block.timestamp, "Probing block");

            if block.timestamp == target {
                return Ok(block);
            }
            if block.timestamp < target {
                best = Some(block);
                left = mid + 1;
            } else if mid == 0 {
                break;
            } else {
                right = mid - 1;
            }
        }

        best.ok_or_else(|| RewardsError::invalid(format!("timestamp {target} predates the chain")))
    }

    /// Returns the number of the block `offset` back from `reference`.
    pub async fn offset_block(&self, reference: Block, offset: BlockOffset) -> Result<u64> {
        let seconds = match offset {
            BlockOffset::Blocks(n) => {
                return reference.number.checked_sub(n).ok_or_else(|| {
                    RewardsError::invalid(format!(
                        "cannot go back {n} blocks from block {}",
                        reference.number
                    ))
                });
            }
            BlockOffset::Days(n) => n.checked_mul(SECONDS_PER_DAY),
            BlockOffset::Seconds(n) => Some(n),
        };

        let target = seconds
            .and_then(|seconds| reference.timestamp.checked_sub(seconds))
            .ok_or_else(|| {
                RewardsError::invalid(format!(
                    "offset {offset:?} from block {} predates the epoch",
                    reference.number
                ))
            })?;

        Ok(self.block_at_or_before(target).await?.number)
    }
}
