// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # State Storage
//!
//! All chain state lives in one redb database:
//!
//! ```text
//! contract_code    address -> contract kind
//! contract_slots   address ‖ slot -> value
//! reports          ledger ‖ report id -> report JSON
//! relay_nonces     proxy ‖ user -> nonce
//! balances         address -> wei
//! events           seq -> event record JSON
//! chain_meta       key -> value (block number, deployment record)
//! owner_index      ledger ‖ owner ‖ report id  (indexer)
//! viewer_index     ledger ‖ viewer ‖ report id (indexer)
//! ```
//!
//! Writers go through [`StateTxn`], one per chain transaction.

pub mod state_db;

pub use state_db::{StateDb, StateDbError, StateDbResult, StateTxn};
