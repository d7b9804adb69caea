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

//! Smart contract interfaces for the stETH token.

alloy::sol!(
    /// Subset of the stETH token interface used for share accounting and reward history.
    #[sol(rpc, all_derives)]
    interface IStETH {
        /// Emitted on every share movement, including mints (`from` is zero) and burns.
        event TransferShares(address indexed from, address indexed to, uint256 sharesValue);

        /// Emitted once per oracle report with the pooled ether and share totals after it.
        event TokenRebased(
            uint256 indexed reportTimestamp,
            uint256 timeElapsed,
            uint256 preTotalShares,
            uint256 preTotalEther,
            uint256 postTotalShares,
            uint256 postTotalEther,
            uint256 sharesMintedAsFees
        );

        function sharesOf(address account) external view returns (uint256);
        function getTotalPooledEther() external view returns (uint256);
        function getTotalShares() external view returns (uint256);
        function getPooledEthByShares(uint256 sharesAmount) external view returns (uint256);
        function getSharesByPooledEth(uint256 ethAmount) external view returns (uint256);
    }
);
