// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Confidential Reporter - Report Ledger & Gasless Relay Service
//!
//! Users submit confidential reports whose payloads only the owner and the
//! viewers the owner grants can read. Submissions either pay their own fee
//! or go through a relay proxy that checks a signed, nonce-bound
//! authorization and lets an operator-funded identity pay instead.
//!
//! ## Modules
//!
//! - `blockchain` - Serialized transaction runtime, signing, networks
//! - `contracts` - Report ledger and relay proxy
//! - `relay` - Relay signer, user-side clients
//! - `deployment` - Deploying and verifying the trust chain
//! - `indexer` - Ownership index rebuilt from the event log
//! - `api` - HTTP API handlers (Axum)
//! - `storage` - redb-backed state

pub mod api;
pub mod blockchain;
pub mod config;
pub mod contracts;
pub mod deployment;
pub mod error;
pub mod indexer;
pub mod models;
pub mod relay;
pub mod state;
pub mod storage;
