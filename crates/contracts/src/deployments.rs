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

use alloy::primitives::{address, Address};
use clap::Args;
use derive_builder::Builder;

pub use alloy_chains::NamedChain;

/// Configuration for a deployment of the stETH token.
// NOTE: See https://github.com/clap-rs/clap/issues/5092#issuecomment-1703980717 about clap usage.
#[non_exhaustive]
#[derive(Clone, Debug, Builder, Args)]
#[group(requires = "steth_address", requires = "withdrawal_queue_address")]
pub struct Deployment {
    /// EIP-155 chain ID of the network.
    #[clap(long, env)]
    #[builder(setter(into, strip_option), default)]
    pub chain_id: Option<u64>,

    /// Address of the [IStETH] contract.
    ///
    /// [IStETH]: crate::contracts::IStETH
    #[clap(long, env, required = false, long_help = "Address of the stETH token contract")]
    #[builder(setter(into))]
    pub steth_address: Address,

    /// Address of the withdrawal queue.
    ///
    /// Shares sent to this address are classified as withdrawals rather than transfers.
    #[clap(long, env, required = false, long_help = "Address of the withdrawal queue contract")]
    #[builder(setter(into))]
    pub withdrawal_queue_address: Address,

    /// First block at which the stETH contract emitted events.
    ///
    /// Look-back scans never go below this block. Defaults to genesis when unknown.
    #[clap(long, env)]
    #[builder(setter(into, strip_option), default)]
    pub deployment_block: Option<u64>,
}

impl Deployment {
    /// Create a new [DeploymentBuilder].
    pub fn builder() -> DeploymentBuilder {
        Default::default()
    }

    /// Lookup the [Deployment] for a named chain.
    pub const fn from_chain(chain: NamedChain) -> Option<Deployment> {
        match chain {
            NamedChain::Mainnet => Some(MAINNET),
            NamedChain::Holesky => Some(HOLESKY),
            NamedChain::Sepolia => Some(SEPOLIA),
            _ => None,
        }
    }

    /// Lookup the [Deployment] by chain ID.
    pub fn from_chain_id(chain_id: impl Into<u64>) -> Option<Deployment> {
        let chain = NamedChain::try_from(chain_id.into()).ok()?;
        Self::from_chain(chain)
    }
}

/// [Deployment] for Ethereum mainnet.
pub const MAINNET: Deployment = Deployment {
    chain_id: Some(NamedChain::Mainnet as u64),
    steth_address: address!("0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84"),
    withdrawal_queue_address: address!("0x889edC2eDab5f40e902b864aD4d7AdE8E412F9B1"),
    deployment_block: Some(11473216),
};

/// [Deployment] for the Holesky testnet.
pub const HOLESKY: Deployment = Deployment {
    chain_id: Some(NamedChain::Holesky as u64),
    steth_address: address!("0x3F1c547b21f65e10480dE3ad8E19fAAC46C95034"),
    withdrawal_queue_address: address!("0xc7cc160b58F8Bb0baC94b80847E2CF2800565C50"),
    deployment_block: None,
};

/// [Deployment] for the Sepolia testnet.
pub const SEPOLIA: Deployment = Deployment {
    chain_id: Some(NamedChain::Sepolia as u64),
    steth_address: address!("0x3e3FE7dBc6B4C189E7128855dD526361c49b40Af"),
    withdrawal_queue_address: address!("0x1583C7b3f4C3B008720E6BcE5726336b0aB25fdd"),
    deployment_block: None,
};
