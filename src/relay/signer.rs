// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Delegated relay signer.
//!
//! The operator-held identity that pays gas for relayed submissions. It
//! never signs on behalf of users: it only wraps an already user-signed
//! authorization in a transaction of its own.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::{Chain, ChainError, Executed, MessageSigner};
use crate::contracts::{ContractError, RelayProxy};

pub struct RelaySigner {
    key: Option<PrivateKeySigner>,
    proxy: RelayProxy,
}

impl RelaySigner {
    /// A signer without key material can report its state but never execute.
    pub fn new(proxy: RelayProxy, key: Option<PrivateKeySigner>) -> Self {
        Self { key, proxy }
    }

    pub fn proxy(&self) -> RelayProxy {
        self.proxy
    }

    /// Relay identity; zero when no key is loaded.
    pub fn signer_address(&self) -> Address {
        self.key
            .as_ref()
            .map(MessageSigner::address)
            .unwrap_or(Address::ZERO)
    }

    /// Whether key material is available.
    pub fn can_sign(&self) -> bool {
        self.key.is_some()
    }

    /// Whether this identity can sign *and* is the proxy's registered
    /// executor, i.e. a relay attempt would not fail on configuration.
    pub fn is_ready(&self, chain: &Chain) -> Result<bool, ChainError> {
        if !self.can_sign() {
            return Ok(false);
        }
        Ok(self.proxy.gasless_signer_view(chain)? == Some(self.signer_address()))
    }

    /// Submit `payload` for `user` through the proxy, using the user's
    /// current nonce and passing `user_signature` through unchanged.
    ///
    /// Nonce lookup and execution share one transaction, so a failure
    /// leaves neither the nonce nor the ledger changed.
    pub fn sign_and_execute_report_submission(
        &self,
        chain: &Chain,
        user: Address,
        payload: &str,
        user_signature: &[u8],
    ) -> Result<Executed<u64>, ChainError> {
        self.relay(chain, user, payload, None, user_signature)
    }

    /// Like [`sign_and_execute_report_submission`], but with the nonce the
    /// user signed over. A signature made for a nonce that is no longer
    /// current fails with `NonceMismatch` instead of `InvalidSignature`.
    ///
    /// [`sign_and_execute_report_submission`]: Self::sign_and_execute_report_submission
    pub fn execute_report_submission_at(
        &self,
        chain: &Chain,
        user: Address,
        payload: &str,
        nonce: u64,
        user_signature: &[u8],
    ) -> Result<Executed<u64>, ChainError> {
        self.relay(chain, user, payload, Some(nonce), user_signature)
    }

    fn relay(
        &self,
        chain: &Chain,
        user: Address,
        payload: &str,
        nonce: Option<u64>,
        user_signature: &[u8],
    ) -> Result<Executed<u64>, ChainError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| ContractError::configuration("Relay signer has no signing key."))?;

        let executed = chain.transact(
            key,
            self.proxy.address(),
            "signAndExecuteReportSubmission",
            |ctx| {
                let nonce = match nonce {
                    Some(nonce) => nonce,
                    None => self.proxy.get_nonce(ctx, user)?,
                };
                self.proxy
                    .execute_gasless_submit_report(ctx, user, payload, nonce, user_signature)
            },
        );

        match &executed {
            Ok(done) => tracing::info!(
                %user,
                report_id = done.value,
                tx_hash = %done.receipt.tx_hash,
                fee = %done.receipt.fee_paid,
                "relay submission executed"
            ),
            Err(e) => tracing::warn!(%user, error = %e, "relay submission failed"),
        }
        executed
    }
}
