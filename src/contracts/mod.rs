// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Contracts
//!
//! Contract logic executed by the [`Chain`](crate::blockchain::Chain)
//! runtime:
//!
//! - [`ReportLedger`]: confidential reports with an owner-managed ACL
//! - [`RelayProxy`]: signature-authorized, nonce-protected relay into the ledger
//!
//! Contract handles are plain addresses. Each operation takes the
//! [`CallContext`] of the enclosing transaction, so nested calls share its
//! atomicity. Every handle also offers `*_tx` / `*_call` / `*_view` wrappers
//! running a single operation as its own transaction or query.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, U256};

use crate::blockchain::{CallContext, ChainError};

pub mod abi;
pub mod events;
pub mod ledger;
pub mod proxy;

pub use events::LedgerEvent;
pub use ledger::{Report, ReportLedger};
pub use proxy::{message_hash, RelayProxy};

/// Revert reasons raised by contract code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// Caller lacks the required relationship to the resource.
    #[error("{0}")]
    Unauthorized(String),

    #[error("Report {report_id} does not exist.")]
    NotFound { report_id: u64 },

    /// Recovered signer does not match the claimed user.
    #[error("Invalid signature.")]
    InvalidSignature,

    #[error("Invalid nonce: expected {expected}, got {provided}.")]
    NonceMismatch { expected: u64, provided: u64 },

    /// Administrative setup is incomplete.
    #[error("{0}")]
    Configuration(String),
}

impl ContractError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        ContractError::Unauthorized(reason.into())
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        ContractError::Configuration(reason.into())
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ContractError::Unauthorized(_) => "unauthorized",
            ContractError::NotFound { .. } => "not_found",
            ContractError::InvalidSignature => "invalid_signature",
            ContractError::NonceMismatch { .. } => "nonce_mismatch",
            ContractError::Configuration(_) => "configuration_error",
        }
    }
}

/// Contract types the runtime knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    ReportLedger,
    RelayProxy,
}

impl ContractKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractKind::ReportLedger => "report_ledger",
            ContractKind::RelayProxy => "relay_proxy",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "report_ledger" => Ok(ContractKind::ReportLedger),
            "relay_proxy" => Ok(ContractKind::RelayProxy),
            other => Err(format!("unknown contract kind `{other}`")),
        }
    }
}

/// Route ABI calldata to the contract deployed at `to`.
pub fn dispatch(
    ctx: &mut CallContext<'_>,
    to: Address,
    calldata: &[u8],
) -> Result<Vec<u8>, ChainError> {
    let kind = ctx
        .state()
        .code_kind(to)?
        .ok_or(ChainError::NoContract(to))?;

    match kind.parse::<ContractKind>().map_err(ChainError::Abi)? {
        ContractKind::ReportLedger => ReportLedger::at(to).dispatch(ctx, calldata),
        ContractKind::RelayProxy => RelayProxy::at(to).dispatch(ctx, calldata),
    }
}

/// Narrow an ABI `uint256` argument to the `u64` range used in storage.
pub(crate) fn u64_arg(value: U256, name: &str) -> Result<u64, ChainError> {
    u64::try_from(value).map_err(|_| ChainError::Abi(format!("{name} out of range: {value}")))
}
