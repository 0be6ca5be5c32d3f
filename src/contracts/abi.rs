// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solidity ABI of the ledger and relay proxy.
//!
//! Wallets and external tooling talk to the contracts with these
//! definitions; [`Chain::send_raw`](crate::blockchain::Chain::send_raw)
//! dispatches on the generated selectors.

use alloy::sol;

sol! {
    /// Confidential report ledger.
    interface IConfidentialReporter {
        event ReportSubmitted(uint256 indexed reportId, address indexed owner);
        event AccessGranted(uint256 indexed reportId, address indexed owner, address indexed viewer);

        function submitReport(string payload) external returns (uint256 reportId);
        function submitReportFor(address user, string payload) external returns (uint256 reportId);
        function getReportPayload(uint256 reportId) external view returns (string payload);
        function grantAccess(uint256 reportId, address viewer) external;
        function setGaslessProxy(address proxy) external;
        function totalReportCount() external view returns (uint256 count);
        function gaslessProxy() external view returns (address proxy);
        function owner() external view returns (address admin);
        function reportOwner(uint256 reportId) external view returns (address reportOwner);
        function isAuthorized(uint256 reportId, address account) external view returns (bool allowed);
    }

    /// Signature-authorized relay into the ledger.
    interface IGaslessProxy {
        event GaslessTransactionExecuted(address indexed user, uint256 nonce, bytes32 txHash);

        function executeGaslessSubmitReport(address user, string payload, uint256 nonce, bytes signature) external returns (uint256 reportId);
        function getNonce(address user) external view returns (uint256 nonce);
        function getMessageHash(address user, string payload, uint256 nonce) external view returns (bytes32 digest);
        function updateGaslessSigner(address signer) external;
        function targetContract() external view returns (address target);
        function gaslessSignerAddress() external view returns (address signer);
        function owner() external view returns (address admin);
    }
}
