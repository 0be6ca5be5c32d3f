// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gasless relay: the operator's signer and the user-side clients.

pub mod client;
pub mod http;
pub mod signer;

pub use client::{GaslessClient, Submission, SubmissionPath};
pub use http::{ClientError, RelayHttpClient};
pub use signer::RelaySigner;
