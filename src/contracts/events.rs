// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Events emitted by the contracts.
//!
//! The event log is the only public history of the ledger: the indexer
//! rebuilds report ownership and grants from it alone.

use alloy::primitives::{Address, LogData, B256, U256};
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use super::abi::{IConfidentialReporter, IGaslessProxy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "args")]
pub enum LedgerEvent {
    ReportSubmitted {
        report_id: u64,
        owner: Address,
    },
    AccessGranted {
        report_id: u64,
        owner: Address,
        viewer: Address,
    },
    GaslessTransactionExecuted {
        user: Address,
        nonce: u64,
        /// Digest the user signed.
        tx_hash: B256,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::ReportSubmitted { .. } => "ReportSubmitted",
            LedgerEvent::AccessGranted { .. } => "AccessGranted",
            LedgerEvent::GaslessTransactionExecuted { .. } => "GaslessTransactionExecuted",
        }
    }

    /// Standard EVM log encoding (topics and data).
    pub fn to_log_data(&self) -> LogData {
        match *self {
            LedgerEvent::ReportSubmitted { report_id, owner } => {
                IConfidentialReporter::ReportSubmitted {
                    reportId: U256::from(report_id),
                    owner,
                }
                .encode_log_data()
            }
            LedgerEvent::AccessGranted {
                report_id,
                owner,
                viewer,
            } => IConfidentialReporter::AccessGranted {
                reportId: U256::from(report_id),
                owner,
                viewer,
            }
            .encode_log_data(),
            LedgerEvent::GaslessTransactionExecuted {
                user,
                nonce,
                tx_hash,
            } => IGaslessProxy::GaslessTransactionExecuted {
                user,
                nonce: U256::from(nonce),
                txHash: tx_hash,
            }
            .encode_log_data(),
        }
    }
}
