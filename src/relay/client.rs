// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User-side submission flow.
//!
//! Mirrors what a wallet front-end does: read the nonce, fetch the digest,
//! sign it, hand it to the relay. Falls back to a direct, self-paid
//! submission when the relay is not usable.

use alloy::primitives::{Address, U256};
use serde::Serialize;

use crate::blockchain::{Chain, ChainError, MessageSigner, TxReceipt};
use crate::contracts::{RelayProxy, ReportLedger};

use super::signer::RelaySigner;

/// How a report reached the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPath {
    Gasless,
    Direct,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub report_id: u64,
    pub path: SubmissionPath,
    pub receipt: TxReceipt,
}

pub struct GaslessClient<'a> {
    chain: &'a Chain,
    ledger: ReportLedger,
    relay: &'a RelaySigner,
}

impl<'a> GaslessClient<'a> {
    pub fn new(chain: &'a Chain, ledger: ReportLedger, relay: &'a RelaySigner) -> Self {
        Self {
            chain,
            ledger,
            relay,
        }
    }

    fn proxy(&self) -> RelayProxy {
        self.relay.proxy()
    }

    pub fn user_nonce(&self, user: Address) -> Result<u64, ChainError> {
        self.proxy().nonce_view(self.chain, user)
    }

    /// Sign the relay digest for `(user, payload, nonce)` as `user`.
    pub fn create_signature(
        &self,
        user: &dyn MessageSigner,
        payload: &str,
        nonce: u64,
    ) -> Result<Vec<u8>, ChainError> {
        let digest = self
            .proxy()
            .message_hash_view(self.chain, user.address(), payload, nonce)?;
        let signature = user.sign_message(digest.as_slice())?;
        Ok(signature.as_bytes().to_vec())
    }

    /// Relay path: the user signs, the relay identity pays.
    pub fn submit_gasless_report(
        &self,
        user: &dyn MessageSigner,
        payload: &str,
    ) -> Result<Submission, ChainError> {
        let nonce = self.user_nonce(user.address())?;
        let signature = self.create_signature(user, payload, nonce)?;
        let executed = self.relay.sign_and_execute_report_submission(
            self.chain,
            user.address(),
            payload,
            &signature,
        )?;
        Ok(Submission {
            report_id: executed.value,
            path: SubmissionPath::Gasless,
            receipt: executed.receipt,
        })
    }

    /// Direct path: the user's own funded identity submits.
    pub fn submit_direct_report(
        &self,
        user: &dyn MessageSigner,
        payload: &str,
    ) -> Result<Submission, ChainError> {
        let executed = self.ledger.submit_report_tx(self.chain, user, payload)?;
        Ok(Submission {
            report_id: executed.value,
            path: SubmissionPath::Direct,
            receipt: executed.receipt,
        })
    }

    /// Whether the relay would currently accept a submission.
    pub fn is_gasless_available(&self) -> bool {
        match self.relay.is_ready(self.chain) {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!(error = %e, "relay availability check failed");
                false
            }
        }
    }

    /// Fee charged to the user on the relay path.
    pub fn fee_estimate(&self) -> U256 {
        U256::ZERO
    }

    /// Prefer the relay; submit directly when it is unavailable.
    pub fn submit_report(
        &self,
        user: &dyn MessageSigner,
        payload: &str,
    ) -> Result<Submission, ChainError> {
        if self.is_gasless_available() {
            self.submit_gasless_report(user, payload)
        } else {
            tracing::info!(user = %user.address(), "relay unavailable, submitting directly");
            self.submit_direct_report(user, payload)
        }
    }
}
