// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain layer.
//!
//! This module provides:
//! - The serialized transaction runtime contracts execute on
//! - Key loading and EIP-191 message signing
//! - Network descriptors

pub mod runtime;
pub mod signing;
pub mod types;

pub use runtime::{CallContext, Chain, ChainError, EventRecord, Executed, GasSchedule, TxReceipt};
pub use signing::{MessageSigner, SigningError};
pub use types::*;
