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

//! Chronological reward ledger: replays share transfers and rebases for one account against
//! the evolving share rate.

use alloy::primitives::{uint, Address, I256, U256, U512};
use serde::Serialize;
use steth_contracts::Deployment;

use crate::{
    error::{ReadError, Result, RewardsError},
    events::{fetch_ledger_events, LedgerStreams, RawEvent, Rebase, SharesTransfer},
    gateway::{Baseline, ChainGateway},
    LOG_QUERY_CHUNK_SIZE,
};

/// Fixed-point scale used by share conversions.
pub const PRECISION: U256 = uint!(1_000_000_000_000_000_000_000_000_000_U256);

const PRECISION_F64: f64 = 1e27;

/// Pooled ether and total shares; the pair that defines the share rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShareRate {
    pub total_ether: U256,
    pub total_shares: U256,
}

impl ShareRate {
    pub fn new(total_ether: U256, total_shares: U256) -> Self {
        Self { total_ether, total_shares }
    }

    /// Convert shares to stETH as `shares * total_ether * PRECISION / total_shares / PRECISION`.
    ///
    /// The product is taken in 512 bits so it cannot overflow. Panics if `total_shares` is zero,
    /// which only holds before the first deposit.
    pub fn shares_to_steth(&self, shares: U256) -> U256 {
        let precision = U512::from(PRECISION);
        let wide = U512::from(shares) * U512::from(self.total_ether) * precision
            / U512::from(self.total_shares)
            / precision;
        U256::saturating_from(wide)
    }

    /// Convert stETH to shares as `ether * total_shares * PRECISION / total_ether / PRECISION`.
    pub fn steth_to_shares(&self, ether: U256) -> U256 {
        let precision = U512::from(PRECISION);
        let wide = U512::from(ether) * U512::from(self.total_shares) * precision
            / U512::from(self.total_ether)
            / precision;
        U256::saturating_from(wide)
    }

    /// Ether per share as a float, computed as
    /// `total_ether * PRECISION / total_shares / PRECISION`.
    pub fn as_f64(&self) -> f64 {
        let fixed = self.total_ether * PRECISION / self.total_shares;
        f64::from(fixed) / PRECISION_F64
    }
}

/// Semantic classification of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// Shares minted to the account by a deposit.
    Submit,
    /// Shares sent to the withdrawal queue.
    Withdrawal,
    TransferIn,
    TransferOut,
    Rebase,
}

/// One entry of the reward ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reward {
    #[serde(rename = "type")]
    pub kind: RewardKind,
    /// Share balance after the event.
    pub balance_shares: U256,
    pub change_shares: I256,
    /// stETH balance after the event, at the share rate active after it.
    pub balance: U256,
    pub change: I256,
    /// Share rate active after the event.
    pub share_rate: f64,
    pub original_event: RawEvent,
}

/// An event of one of the three ledger streams.
///
/// The stream an event came from decides its direction, so a self-transfer appears once in
/// each direction and nets to zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    SharesIn(SharesTransfer),
    SharesOut(SharesTransfer),
    Rebase(Rebase),
}

impl LedgerEvent {
    /// Ordering key of the event on chain.
    pub fn position(&self) -> (u64, u64) {
        match self {
            Self::SharesIn(event) | Self::SharesOut(event) => (event.block_number, event.log_index),
            Self::Rebase(event) => (event.block_number, event.log_index),
        }
    }

    pub fn to_raw(&self) -> RawEvent {
        match self {
            Self::SharesIn(event) | Self::SharesOut(event) => {
                RawEvent::TransferShares(event.clone())
            }
            Self::Rebase(event) => RawEvent::TokenRebased(event.clone()),
        }
    }
}

/// Merge the three streams into one sequence ordered by `(block_number, log_index)`.
///
/// The sort is stable, so events sharing a position keep the out, in, rebase stream order.
pub fn merge_streams(streams: LedgerStreams) -> Vec<LedgerEvent> {
    let LedgerStreams { shares_out, shares_in, rebases } = streams;
    let mut events: Vec<LedgerEvent> = shares_out
        .into_iter()
        .map(LedgerEvent::SharesOut)
        .chain(shares_in.into_iter().map(LedgerEvent::SharesIn))
        .chain(rebases.into_iter().map(LedgerEvent::Rebase))
        .collect();
    events.sort_by_key(LedgerEvent::position);
    events
}

fn signed_delta(after: U256, before: U256) -> I256 {
    if after >= before {
        I256::from_raw(after - before)
    } else {
        -I256::from_raw(before - after)
    }
}

/// Running state threaded through the replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerState {
    pub rate: ShareRate,
    pub share_rate: f64,
    pub balance_shares: U256,
}

impl LedgerState {
    pub fn from_baseline(baseline: &Baseline) -> Self {
        let rate = ShareRate::new(baseline.total_ether, baseline.total_shares);
        Self { rate, share_rate: rate.as_f64(), balance_shares: baseline.shares }
    }

    pub fn balance(&self) -> U256 {
        self.rate.shares_to_steth(self.balance_shares)
    }

    /// Apply one event, returning the next state and the ledger entry for the event.
    pub fn apply(
        self,
        event: &LedgerEvent,
        withdrawal_queue: Address,
    ) -> Result<(Self, Reward), ReadError> {
        let previous_balance = self.balance();
        let (kind, next) = match event {
            LedgerEvent::SharesIn(transfer) => {
                let kind = if transfer.from == Address::ZERO {
                    RewardKind::Submit
                } else {
                    RewardKind::TransferIn
                };
                let balance_shares = self.balance_shares + transfer.shares_value;
                (kind, Self { balance_shares, ..self })
            }
            LedgerEvent::SharesOut(transfer) => {
                let kind = if transfer.to == withdrawal_queue {
                    RewardKind::Withdrawal
                } else {
                    RewardKind::TransferOut
                };
                let balance_shares =
                    self.balance_shares.checked_sub(transfer.shares_value).ok_or(
                        ReadError::InconsistentLedger {
                            block: transfer.block_number,
                            balance: self.balance_shares,
                            transferred: transfer.shares_value,
                        },
                    )?;
                (kind, Self { balance_shares, ..self })
            }
            LedgerEvent::Rebase(rebase) => {
                let rate = ShareRate::new(rebase.post_total_ether, rebase.post_total_shares);
                (RewardKind::Rebase, Self { rate, share_rate: rate.as_f64(), ..self })
            }
        };

        let balance = next.balance();
        let reward = Reward {
            kind,
            balance_shares: next.balance_shares,
            change_shares: signed_delta(next.balance_shares, self.balance_shares),
            balance,
            change: signed_delta(balance, previous_balance),
            share_rate: next.share_rate,
            original_event: event.to_raw(),
        };
        Ok((next, reward))
    }
}

/// Replay `events` from `baseline`, producing one [Reward] per event.
pub fn replay(
    baseline: &Baseline,
    events: &[LedgerEvent],
    withdrawal_queue: Address,
) -> Result<Vec<Reward>, ReadError> {
    let mut state = LedgerState::from_baseline(baseline);
    let mut rewards = Vec::with_capacity(events.len());
    for event in events {
        let (next, reward) = state.apply(event, withdrawal_queue)?;
        tracing::trace!(
            "{:?} at {:?}: {} shares, change {}",
            reward.kind,
            event.position(),
            reward.balance_shares,
            reward.change
        );
        rewards.push(reward);
        state = next;
    }
    Ok(rewards)
}

/// A reconstructed reward ledger for one account over one block window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ledger {
    pub rewards: Vec<Reward>,
    pub base_balance_shares: U256,
    pub base_share_rate: f64,
    pub base_balance: U256,
    pub from_block: u64,
    pub to_block: u64,
}

/// Builds [Ledger]s from chain data.
#[derive(Debug)]
pub struct RewardLedgerBuilder<'a, G: ?Sized> {
    gateway: &'a G,
    steth: Address,
    withdrawal_queue: Address,
    step_block: u64,
}

impl<'a, G: ChainGateway + ?Sized> RewardLedgerBuilder<'a, G> {
    pub fn new(gateway: &'a G, deployment: &Deployment) -> Self {
        Self {
            gateway,
            steth: deployment.steth_address,
            withdrawal_queue: deployment.withdrawal_queue_address,
            step_block: LOG_QUERY_CHUNK_SIZE,
        }
    }

    pub fn with_step_block(self, step_block: u64) -> Self {
        Self { step_block, ..self }
    }

    /// Build the ledger of `account` over `[from_block, to_block]`.
    ///
    /// The baseline is read at the block before `from_block` (block 0 when `from_block` is 0).
    /// Either the whole ledger is returned or an error; never a partial replay.
    pub async fn build(&self, account: Address, from_block: u64, to_block: u64) -> Result<Ledger> {
        if self.step_block == 0 {
            return Err(RewardsError::invalid("step must be positive"));
        }
        if to_block < from_block {
            return Err(RewardsError::invalid(format!(
                "window end {to_block} is before its start {from_block}"
            )));
        }

        let baseline_block = from_block.saturating_sub(1);
        let (baseline, streams) = tokio::try_join!(
            self.gateway.read_baseline(self.steth, account, baseline_block),
            fetch_ledger_events(
                self.gateway,
                self.steth,
                account,
                from_block,
                to_block,
                self.step_block
            ),
        )?;

        let events = merge_streams(streams);
        let rewards = replay(&baseline, &events, self.withdrawal_queue)?;
        let base = LedgerState::from_baseline(&baseline);

        Ok(Ledger {
            rewards,
            base_balance_shares: base.balance_shares,
            base_share_rate: base.share_rate,
            base_balance: base.balance(),
            from_block,
            to_block,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use tracing_test::traced_test;

    use super::*;
    use crate::test_utils::{rebase_log, transfer_log, MockGateway};

    const STETH: Address = address!("0x00000000000000000000000000000000005e7e70");
    const QUEUE: Address = address!("0x0000000000000000000000000000000000000999");
    const ACCOUNT: Address = address!("0x00000000000000000000000000000000000000aa");
    const OTHER: Address = address!("0x00000000000000000000000000000000000000bb");

    fn deployment() -> Deployment {
        Deployment::builder().steth_address(STETH).withdrawal_queue_address(QUEUE).build().unwrap()
    }

    fn transfer(
        from: Address,
        to: Address,
        shares: u64,
        block: u64,
        log_index: u64,
    ) -> SharesTransfer {
        SharesTransfer {
            block_number: block,
            log_index,
            transaction_hash: None,
            from,
            to,
            shares_value: U256::from(shares),
        }
    }

    fn rebase(total_ether: u64, total_shares: u64, block: u64, log_index: u64) -> Rebase {
        Rebase {
            block_number: block,
            log_index,
            transaction_hash: None,
            report_timestamp: U256::ZERO,
            time_elapsed: U256::ZERO,
            pre_total_shares: U256::ZERO,
            pre_total_ether: U256::ZERO,
            post_total_shares: U256::from(total_shares),
            post_total_ether: U256::from(total_ether),
            shares_minted_as_fees: U256::ZERO,
        }
    }

    fn baseline(shares: u64, total_ether: u64, total_shares: u64) -> Baseline {
        Baseline {
            block: 0,
            shares: U256::from(shares),
            total_ether: U256::from(total_ether),
            total_shares: U256::from(total_shares),
        }
    }

    fn assert_rate(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-12, "rate {actual} != {expected}");
    }

    #[test]
    fn precision_constant() {
        assert_eq!(PRECISION, U256::from(10).pow(U256::from(27)));
    }

    #[test]
    fn exact_conversion_has_no_error() {
        let rate = ShareRate::new(U256::from(1_050_000), U256::from(1_000_000));
        assert_eq!(rate.shares_to_steth(U256::from(100)), U256::from(105));
        assert_eq!(rate.shares_to_steth(U256::from(1_000_000)), U256::from(1_050_000));
        assert_eq!(rate.steth_to_shares(U256::from(105)), U256::from(100));
        assert_rate(rate.as_f64(), 1.05);
    }

    #[test]
    fn inexact_conversion_truncates_by_at_most_one() {
        let rate = ShareRate::new(U256::from(3), U256::from(2));
        assert_eq!(rate.shares_to_steth(U256::from(1)), U256::from(1));

        let rate = ShareRate::new(U256::from(1_000_003), U256::from(999_999));
        for shares in [1u64, 7, 999, 123_456, 999_999_999] {
            let converted = rate.shares_to_steth(U256::from(shares));
            let exact = shares as u128 * 1_000_003 / 999_999;
            assert!(converted.to::<u128>() <= exact);
            assert!(exact - converted.to::<u128>() <= 1);
        }
    }

    #[test]
    fn conversion_does_not_overflow_at_mainnet_scale() {
        let total_ether = U256::from(9_500_000u64) * U256::from(10).pow(U256::from(18));
        let total_shares = U256::from(8_000_000u64) * U256::from(10).pow(U256::from(18));
        let rate = ShareRate::new(total_ether, total_shares);
        assert_eq!(rate.shares_to_steth(total_shares), total_ether);
    }

    #[test]
    fn classification() {
        let events = vec![
            LedgerEvent::SharesIn(transfer(Address::ZERO, ACCOUNT, 100, 10, 0)),
            LedgerEvent::SharesOut(transfer(ACCOUNT, QUEUE, 40, 11, 0)),
            LedgerEvent::SharesIn(transfer(OTHER, ACCOUNT, 5, 12, 0)),
            LedgerEvent::SharesOut(transfer(ACCOUNT, OTHER, 15, 13, 0)),
            LedgerEvent::Rebase(rebase(2_000_000, 1_000_000, 14, 0)),
        ];
        let rewards = replay(&baseline(0, 1_000_000, 1_000_000), &events, QUEUE).unwrap();

        let kinds: Vec<_> = rewards.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RewardKind::Submit,
                RewardKind::Withdrawal,
                RewardKind::TransferIn,
                RewardKind::TransferOut,
                RewardKind::Rebase
            ]
        );
        assert_eq!(rewards[0].balance_shares, U256::from(100));
        assert_eq!(rewards[0].change_shares, I256::try_from(100).unwrap());
        assert_eq!(rewards[1].balance_shares, U256::from(60));
        assert_eq!(rewards[1].change_shares, I256::try_from(-40).unwrap());
        assert_eq!(rewards[4].balance_shares, U256::from(50));
        assert_eq!(rewards[4].balance, U256::from(100));
        assert_eq!(rewards[4].change, I256::try_from(50).unwrap());
    }

    #[test]
    fn conservation_and_rebase_neutrality() {
        let mut events = Vec::new();
        for i in 0..60u64 {
            let event = match i % 4 {
                0 => LedgerEvent::SharesIn(transfer(OTHER, ACCOUNT, 1_000 + i * 17, i, 0)),
                1 => LedgerEvent::SharesOut(transfer(ACCOUNT, OTHER, 300 + i, i, 1)),
                2 => LedgerEvent::Rebase(rebase(1_000_000 + i * 3_331, 1_000_000 + i * 7, i, 2)),
                _ => LedgerEvent::SharesOut(transfer(ACCOUNT, QUEUE, 11 * i, i, 3)),
            };
            events.push(event);
        }
        let base = baseline(5_000, 1_000_000, 1_000_000);
        let rewards = replay(&base, &events, QUEUE).unwrap();

        let mut expected = I256::from_raw(base.shares);
        let mut previous = base.shares;
        for reward in &rewards {
            expected += reward.change_shares;
            assert_eq!(I256::from_raw(reward.balance_shares), expected);
            assert_eq!(
                I256::from_raw(reward.balance_shares) - I256::from_raw(previous),
                reward.change_shares
            );
            if reward.kind == RewardKind::Rebase {
                assert_eq!(reward.change_shares, I256::ZERO);
                assert_eq!(reward.balance_shares, previous);
            }
            previous = reward.balance_shares;
        }
    }

    #[test]
    fn rebase_converts_at_old_and_new_rate() {
        let events = vec![
            LedgerEvent::SharesIn(transfer(Address::ZERO, ACCOUNT, 1_000, 5, 0)),
            LedgerEvent::Rebase(rebase(1_100_000, 1_000_000, 6, 0)),
            LedgerEvent::SharesIn(transfer(OTHER, ACCOUNT, 1_000, 7, 0)),
        ];
        let rewards = replay(&baseline(0, 1_000_000, 1_000_000), &events, QUEUE).unwrap();

        assert_eq!(rewards[0].balance, U256::from(1_000));
        assert_rate(rewards[0].share_rate, 1.0);

        assert_eq!(rewards[1].balance, U256::from(1_100));
        assert_eq!(rewards[1].change, I256::try_from(100).unwrap());
        assert_rate(rewards[1].share_rate, 1.1);

        // The later transfer converts at the post-rebase rate and carries it unchanged.
        assert_eq!(rewards[2].balance, U256::from(2_200));
        assert_eq!(rewards[2].change, I256::try_from(1_100).unwrap());
        assert_rate(rewards[2].share_rate, 1.1);
    }

    #[test]
    fn overdrawn_balance_is_a_read_error() {
        let events = vec![LedgerEvent::SharesOut(transfer(ACCOUNT, OTHER, 10, 5, 0))];
        let err = replay(&baseline(9, 1, 1), &events, QUEUE).unwrap_err();
        assert!(matches!(err, ReadError::InconsistentLedger { block: 5, .. }));
    }

    #[test]
    fn merge_orders_by_block_then_log_index() {
        let streams = LedgerStreams {
            shares_out: vec![
                transfer(ACCOUNT, OTHER, 1, 20, 5),
                transfer(ACCOUNT, OTHER, 2, 30, 0),
            ],
            shares_in: vec![
                transfer(OTHER, ACCOUNT, 3, 20, 1),
                transfer(ACCOUNT, ACCOUNT, 4, 30, 0),
            ],
            rebases: vec![rebase(1, 1, 10, 9), rebase(1, 1, 20, 3)],
        };
        let positions: Vec<_> =
            merge_streams(streams.clone()).iter().map(|e| e.position()).collect();
        assert_eq!(positions, vec![(10, 9), (20, 1), (20, 3), (20, 5), (30, 0), (30, 0)]);

        // The self-transfer keeps out-then-in order and nets to zero.
        let merged = merge_streams(streams);
        assert!(matches!(merged[4], LedgerEvent::SharesOut(_)));
        assert!(matches!(merged[5], LedgerEvent::SharesIn(_)));
    }

    fn ledger_gateway() -> MockGateway {
        MockGateway::uniform(500, 12)
            .with_baseline(1_000, 1_000_000, 1_000_000)
            .with_log(transfer_log(STETH, Address::ZERO, ACCOUNT, 100, 120, 4))
            .with_log(rebase_log(STETH, 1_010_000, 1_000_000, 150, 2))
            .with_log(transfer_log(STETH, ACCOUNT, QUEUE, 40, 150, 7))
            .with_log(transfer_log(STETH, OTHER, OTHER, 999, 160, 0))
            .with_log(transfer_log(STETH, OTHER, ACCOUNT, 10, 210, 1))
            .with_log(rebase_log(STETH, 1_030_000, 1_000_000, 260, 0))
            .with_log(transfer_log(STETH, ACCOUNT, OTHER, 10, 300, 0))
    }

    #[tokio::test]
    async fn build_from_chain() {
        let gateway = ledger_gateway();
        let builder = RewardLedgerBuilder::new(&gateway, &deployment()).with_step_block(50);
        let ledger = builder.build(ACCOUNT, 100, 299).await.unwrap();

        assert_eq!(gateway.baseline_reads(), vec![(ACCOUNT, 99)]);
        assert_eq!(ledger.base_balance_shares, U256::from(1_000));
        assert_eq!(ledger.base_balance, U256::from(1_000));
        assert_rate(ledger.base_share_rate, 1.0);
        assert_eq!((ledger.from_block, ledger.to_block), (100, 299));

        let kinds: Vec<_> = ledger.rewards.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RewardKind::Submit,
                RewardKind::Rebase,
                RewardKind::Withdrawal,
                RewardKind::TransferIn,
                RewardKind::Rebase
            ]
        );
        let last = ledger.rewards.last().unwrap();
        assert_eq!(last.balance_shares, U256::from(1_070));
        assert_eq!(last.balance, U256::from(1_102));
        assert_eq!(last.original_event.block_number(), 260);
    }

    #[tokio::test]
    async fn baseline_at_genesis() {
        let gateway = ledger_gateway();
        let builder = RewardLedgerBuilder::new(&gateway, &deployment());
        let ledger = builder.build(ACCOUNT, 0, 0).await.unwrap();

        assert_eq!(gateway.baseline_reads(), vec![(ACCOUNT, 0)]);
        assert!(ledger.rewards.is_empty());
    }

    #[tokio::test]
    async fn rebuild_is_identical() {
        let gateway = ledger_gateway();
        let builder = RewardLedgerBuilder::new(&gateway, &deployment()).with_step_block(64);

        let first = builder.build(ACCOUNT, 1, 499).await.unwrap();
        let second = builder.build(ACCOUNT, 1, 499).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.rewards.len(), 6);
    }

    #[tokio::test]
    async fn invalid_windows_make_no_calls() {
        let gateway = ledger_gateway();
        let builder = RewardLedgerBuilder::new(&gateway, &deployment());
        assert!(builder.build(ACCOUNT, 10, 9).await.unwrap_err().is_invalid_argument());

        let builder = builder.with_step_block(0);
        assert!(builder.build(ACCOUNT, 1, 9).await.unwrap_err().is_invalid_argument());

        assert!(gateway.baseline_reads().is_empty());
        assert!(gateway.log_ranges().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn build_reports_stream_sizes() {
        let gateway = ledger_gateway();
        let builder = RewardLedgerBuilder::new(&gateway, &deployment());
        builder.build(ACCOUNT, 1, 499).await.unwrap();

        assert!(logs_contain("Fetched 2 outgoing transfers, 2 incoming transfers, 2 rebases"));
    }
}
