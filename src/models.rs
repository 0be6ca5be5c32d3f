// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the relay service. All types derive
//! `Serialize`, `Deserialize` and `ToSchema`; the HTTP client in
//! [`crate::relay::http`] reuses them.
//!
//! Addresses, hashes and signatures travel as `0x`-prefixed hex strings,
//! wei amounts as decimal strings.
//!
//! ## Model Categories
//!
//! - **Relay**: status, nonces, digests and relayed submissions
//! - **Ledger**: statistics, event history and the per-owner report index

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// =============================================================================
// Relay
// =============================================================================

/// Relay availability and the addresses a wallet needs to sign against.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RelayStatusResponse {
    /// Network identifier (e.g. `sapphire_testnet`)
    pub network: String,
    pub chain_id: u64,
    /// Report ledger contract
    pub ledger_address: String,
    /// Relay proxy contract; message hashes are bound to it
    pub proxy_address: String,
    /// Relay identity that pays gas
    pub signer_address: String,
    /// Whether the relay holds key material
    pub can_sign: bool,
    /// Whether a relay submission would currently be accepted
    pub available: bool,
    /// Fee charged to the user, in wei
    pub fee_estimate_wei: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NonceResponse {
    pub user: String,
    /// Nonce the next authorization must carry
    pub nonce: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageHashRequest {
    pub user: String,
    pub payload: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MessageHashResponse {
    /// Digest to sign as an EIP-191 personal message (32 bytes, hex)
    pub message_hash: String,
}

/// A user-signed report submission for the relay to execute.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitReportRequest {
    /// Report owner; must be the signer of `signature`
    pub user: String,
    pub payload: String,
    /// 65-byte `r ‖ s ‖ v` signature over the message hash (hex)
    pub signature: String,
    /// Nonce the signature covers; the user's current nonce when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SubmitReportResponse {
    pub report_id: u64,
    pub user: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    /// Fee paid by the relay identity, in wei
    pub fee_paid_wei: String,
    pub explorer_url: String,
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct LedgerStatsResponse {
    pub ledger_address: String,
    /// Ledger administrator
    pub owner: String,
    /// Registered gasless proxy, absent until configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gasless_proxy: Option<String>,
    pub total_report_count: u64,
    pub block_number: u64,
}

/// Query parameters for event pagination.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct EventQuery {
    /// First event sequence number to return
    pub from: Option<u64>,
    /// Maximum number of events (default 50, capped at 500)
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EventResponse {
    pub seq: u64,
    pub block_number: u64,
    pub tx_hash: String,
    /// Emitting contract
    pub contract: String,
    /// Event name (`ReportSubmitted`, `AccessGranted`, `GaslessTransactionExecuted`)
    pub event: String,
    /// Decoded event arguments
    #[schema(value_type = Object)]
    pub args: serde_json::Value,
    /// EVM log topics; topic 0 is the event signature hash
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed arguments (hex)
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EventListResponse {
    pub events: Vec<EventResponse>,
    /// Cursor for the next page, absent when exhausted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_seq: Option<u64>,
}

/// Reports an account owns or was granted, as rebuilt from the event log.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct OwnerReportsResponse {
    pub owner: String,
    pub owned: Vec<u64>,
    pub granted: Vec<u64>,
}
