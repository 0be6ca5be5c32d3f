// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay Proxy
//!
//! Forwards user-signed report submissions to the ledger so the user never
//! pays gas.
//!
//! Two independent checks guard every relay:
//! - the **user signature** over `(user, payload, nonce)` stops anyone,
//!   including the relay operator, from attributing reports to a user who
//!   did not sign them;
//! - the **caller restriction** lets only the registered relay signer spend
//!   gas through the proxy.
//!
//! Each user has a nonce starting at 0 that advances by exactly one per
//! successful relay. Out-of-order nonces are rejected, not queued.

use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::sol_types::{SolInterface, SolValue};
use serde::{Deserialize, Serialize};

use super::abi::IGaslessProxy::IGaslessProxyCalls;
use super::{u64_arg, ContractError, ContractKind, LedgerEvent, ReportLedger};
use crate::blockchain::signing::recover_signer;
use crate::blockchain::{CallContext, Chain, ChainError, Executed, MessageSigner};

const OWNER_SLOT: &str = "owner";
const TARGET_SLOT: &str = "target_contract";
const SIGNER_SLOT: &str = "gasless_signer";

const ONLY_ADMIN: &str = "Only the contract owner can call this.";
const ONLY_SIGNER: &str = "Only the gasless signer can execute.";

/// Digest a user signs to authorize one relayed submission.
///
/// `keccak256(chainId ‖ proxy ‖ user ‖ payload ‖ nonce)` with Solidity
/// packed encoding: 32-byte chain id, 20-byte addresses, raw payload bytes,
/// 32-byte nonce.
pub fn message_hash(chain_id: u64, proxy: Address, user: Address, payload: &str, nonce: u64) -> B256 {
    let mut packed = Vec::with_capacity(32 + 20 + 20 + payload.len() + 32);
    packed.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    packed.extend_from_slice(proxy.as_slice());
    packed.extend_from_slice(user.as_slice());
    packed.extend_from_slice(payload.as_bytes());
    packed.extend_from_slice(&U256::from(nonce).to_be_bytes::<32>());
    keccak256(&packed)
}

/// Handle to a deployed relay proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProxy {
    address: Address,
}

impl RelayProxy {
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    // =========================================================================
    // Contract code
    // =========================================================================

    /// Constructor: relay into `target`, executable by `gasless_signer`.
    ///
    /// A zero `gasless_signer` leaves the proxy unconfigured until
    /// [`update_gasless_signer`](Self::update_gasless_signer) is called.
    pub fn construct(
        ctx: &mut CallContext<'_>,
        address: Address,
        target: Address,
        gasless_signer: Address,
    ) -> Result<Self, ChainError> {
        ctx.expect_code(target, ContractKind::ReportLedger)?;
        let state = ctx.state();
        state.set_address_slot(address, OWNER_SLOT, ctx.sender())?;
        state.set_address_slot(address, TARGET_SLOT, target)?;
        if gasless_signer != Address::ZERO {
            state.set_address_slot(address, SIGNER_SLOT, gasless_signer)?;
        }
        Ok(Self::at(address))
    }

    /// Next nonce `user` must sign; 0 for unseen users.
    pub fn get_nonce(&self, ctx: &mut CallContext<'_>, user: Address) -> Result<u64, ChainError> {
        ctx.expect_code(self.address, ContractKind::RelayProxy)?;
        Ok(ctx.state().nonce(self.address, user)?)
    }

    pub fn get_message_hash(
        &self,
        ctx: &mut CallContext<'_>,
        user: Address,
        payload: &str,
        nonce: u64,
    ) -> Result<B256, ChainError> {
        ctx.expect_code(self.address, ContractKind::RelayProxy)?;
        Ok(message_hash(ctx.chain_id(), self.address, user, payload, nonce))
    }

    /// Verify `user`'s authorization and submit `payload` to the ledger as
    /// owned by `user`. Only the registered relay signer may call this.
    pub fn execute_gasless_submit_report(
        &self,
        ctx: &mut CallContext<'_>,
        user: Address,
        payload: &str,
        nonce: u64,
        signature: &[u8],
    ) -> Result<u64, ChainError> {
        ctx.expect_code(self.address, ContractKind::RelayProxy)?;
        let state = ctx.state();

        let relay_signer = state
            .address_slot(self.address, SIGNER_SLOT)?
            .ok_or_else(|| ContractError::configuration("Gasless signer not configured."))?;
        if ctx.sender() != relay_signer {
            return Err(ContractError::unauthorized(ONLY_SIGNER).into());
        }

        let digest = message_hash(ctx.chain_id(), self.address, user, payload, nonce);
        match recover_signer(digest.as_slice(), signature) {
            Ok(recovered) if recovered == user => {}
            _ => return Err(ContractError::InvalidSignature.into()),
        }

        let expected = state.nonce(self.address, user)?;
        if nonce != expected {
            return Err(ContractError::NonceMismatch {
                expected,
                provided: nonce,
            }
            .into());
        }
        state.set_nonce(self.address, user, expected + 1)?;

        let ledger = ReportLedger::at(self.target(ctx)?);
        let report_id = ctx.call_from(self.address, |ctx| ledger.submit_report_for(ctx, user, payload))?;

        ctx.emit(
            self.address,
            LedgerEvent::GaslessTransactionExecuted {
                user,
                nonce,
                tx_hash: digest,
            },
        );
        tracing::info!(proxy = %self.address, %user, nonce, report_id, "gasless report relayed");
        Ok(report_id)
    }

    /// Rotate the relay signer. Administrator only.
    pub fn update_gasless_signer(
        &self,
        ctx: &mut CallContext<'_>,
        signer: Address,
    ) -> Result<(), ChainError> {
        ctx.expect_code(self.address, ContractKind::RelayProxy)?;
        if ctx.sender() != self.admin(ctx)? {
            return Err(ContractError::unauthorized(ONLY_ADMIN).into());
        }
        if signer == Address::ZERO {
            return Err(ContractError::configuration("Gasless signer cannot be the zero address.").into());
        }
        ctx.state().set_address_slot(self.address, SIGNER_SLOT, signer)?;
        tracing::info!(proxy = %self.address, %signer, "gasless signer updated");
        Ok(())
    }

    pub fn target_contract(&self, ctx: &mut CallContext<'_>) -> Result<Address, ChainError> {
        ctx.expect_code(self.address, ContractKind::RelayProxy)?;
        self.target(ctx)
    }

    /// Registered relay signer, `None` until one is set.
    pub fn gasless_signer_address(
        &self,
        ctx: &mut CallContext<'_>,
    ) -> Result<Option<Address>, ChainError> {
        ctx.expect_code(self.address, ContractKind::RelayProxy)?;
        Ok(ctx.state().address_slot(self.address, SIGNER_SLOT)?)
    }

    pub fn owner(&self, ctx: &mut CallContext<'_>) -> Result<Address, ChainError> {
        ctx.expect_code(self.address, ContractKind::RelayProxy)?;
        self.admin(ctx)
    }

    fn admin(&self, ctx: &CallContext<'_>) -> Result<Address, ChainError> {
        Ok(ctx
            .state()
            .address_slot(self.address, OWNER_SLOT)?
            .unwrap_or(Address::ZERO))
    }

    fn target(&self, ctx: &CallContext<'_>) -> Result<Address, ChainError> {
        ctx.state()
            .address_slot(self.address, TARGET_SLOT)?
            .ok_or_else(|| ContractError::configuration("Target contract not configured.").into())
    }

    pub(crate) fn dispatch(
        &self,
        ctx: &mut CallContext<'_>,
        calldata: &[u8],
    ) -> Result<Vec<u8>, ChainError> {
        let call =
            IGaslessProxyCalls::abi_decode(calldata).map_err(|e| ChainError::Abi(e.to_string()))?;

        let output = match call {
            IGaslessProxyCalls::executeGaslessSubmitReport(c) => {
                let nonce = u64_arg(c.nonce, "nonce")?;
                let report_id =
                    self.execute_gasless_submit_report(ctx, c.user, &c.payload, nonce, &c.signature)?;
                U256::from(report_id).abi_encode()
            }
            IGaslessProxyCalls::getNonce(c) => U256::from(self.get_nonce(ctx, c.user)?).abi_encode(),
            IGaslessProxyCalls::getMessageHash(c) => {
                let nonce = u64_arg(c.nonce, "nonce")?;
                self.get_message_hash(ctx, c.user, &c.payload, nonce)?.abi_encode()
            }
            IGaslessProxyCalls::updateGaslessSigner(c) => {
                self.update_gasless_signer(ctx, c.signer)?;
                Vec::new()
            }
            IGaslessProxyCalls::targetContract(_) => self.target_contract(ctx)?.abi_encode(),
            IGaslessProxyCalls::gaslessSignerAddress(_) => self
                .gasless_signer_address(ctx)?
                .unwrap_or(Address::ZERO)
                .abi_encode(),
            IGaslessProxyCalls::owner(_) => self.owner(ctx)?.abi_encode(),
        };
        Ok(output)
    }

    // =========================================================================
    // Transactions and queries
    // =========================================================================

    pub fn deploy(
        chain: &Chain,
        deployer: &dyn MessageSigner,
        target: Address,
        gasless_signer: Address,
    ) -> Result<Executed<Self>, ChainError> {
        chain.deploy(deployer, ContractKind::RelayProxy, |ctx, address| {
            Self::construct(ctx, address, target, gasless_signer)
        })
    }

    /// Relay a signed submission; `relay` must be the registered signer.
    pub fn execute_gasless_submit_report_tx(
        &self,
        chain: &Chain,
        relay: &dyn MessageSigner,
        user: Address,
        payload: &str,
        nonce: u64,
        signature: &[u8],
    ) -> Result<Executed<u64>, ChainError> {
        chain.transact(relay, self.address, "executeGaslessSubmitReport", |ctx| {
            self.execute_gasless_submit_report(ctx, user, payload, nonce, signature)
        })
    }

    pub fn update_gasless_signer_tx(
        &self,
        chain: &Chain,
        sender: &dyn MessageSigner,
        signer: Address,
    ) -> Result<Executed<()>, ChainError> {
        chain.transact(sender, self.address, "updateGaslessSigner", |ctx| {
            self.update_gasless_signer(ctx, signer)
        })
    }

    pub fn nonce_view(&self, chain: &Chain, user: Address) -> Result<u64, ChainError> {
        chain.view(self.address, "getNonce", |ctx| self.get_nonce(ctx, user))
    }

    pub fn message_hash_view(
        &self,
        chain: &Chain,
        user: Address,
        payload: &str,
        nonce: u64,
    ) -> Result<B256, ChainError> {
        chain.view(self.address, "getMessageHash", |ctx| {
            self.get_message_hash(ctx, user, payload, nonce)
        })
    }

    pub fn target_contract_view(&self, chain: &Chain) -> Result<Address, ChainError> {
        chain.view(self.address, "targetContract", |ctx| self.target_contract(ctx))
    }

    pub fn gasless_signer_view(&self, chain: &Chain) -> Result<Option<Address>, ChainError> {
        chain.view(self.address, "gaslessSignerAddress", |ctx| {
            self.gasless_signer_address(ctx)
        })
    }

    pub fn owner_view(&self, chain: &Chain) -> Result<Address, ChainError> {
        chain.view(self.address, "owner", |ctx| self.owner(ctx))
    }
}

#[cfg(test)]
mod tests {
    use alloy::signers::local::PrivateKeySigner;
    use alloy::sol_types::SolCall;

    use super::*;
    use crate::blockchain::signing::test_signer;
    use crate::blockchain::{GasSchedule, SAPPHIRE_LOCALNET};
    use crate::contracts::abi::IGaslessProxy;

    struct Fixture {
        chain: Chain,
        admin: PrivateKeySigner,
        relay: PrivateKeySigner,
        ledger: ReportLedger,
        proxy: RelayProxy,
    }

    fn fixture() -> Fixture {
        let chain = Chain::in_memory(SAPPHIRE_LOCALNET, GasSchedule::default()).unwrap();
        let admin = test_signer(1);
        let relay = test_signer(2);
        let ledger = ReportLedger::deploy(&chain, &admin).unwrap().value;
        let proxy = RelayProxy::deploy(&chain, &admin, ledger.address(), relay.address())
            .unwrap()
            .value;
        ledger
            .set_gasless_proxy_tx(&chain, &admin, proxy.address())
            .unwrap();
        Fixture {
            chain,
            admin,
            relay,
            ledger,
            proxy,
        }
    }

    fn sign(f: &Fixture, user: &PrivateKeySigner, payload: &str, nonce: u64) -> Vec<u8> {
        let digest = f
            .proxy
            .message_hash_view(&f.chain, user.address(), payload, nonce)
            .unwrap();
        MessageSigner::sign_message(user, digest.as_slice())
            .unwrap()
            .as_bytes()
            .to_vec()
    }

    fn relay(
        f: &Fixture,
        user: Address,
        payload: &str,
        nonce: u64,
        signature: &[u8],
    ) -> Result<Executed<u64>, ChainError> {
        f.proxy
            .execute_gasless_submit_report_tx(&f.chain, &f.relay, user, payload, nonce, signature)
    }

    fn revert_of<T: std::fmt::Debug>(result: Result<T, ChainError>) -> ContractError {
        result.unwrap_err().revert().cloned().expect("expected a revert")
    }

    #[test]
    fn message_hash_binds_every_field() {
        let proxy = Address::repeat_byte(1);
        let user = Address::repeat_byte(2);
        let base = message_hash(23295, proxy, user, "p", 0);
        assert_eq!(base, message_hash(23295, proxy, user, "p", 0));
        assert_ne!(base, message_hash(23295, proxy, user, "q", 0));
        assert_ne!(base, message_hash(23295, proxy, user, "p", 1));
        assert_ne!(base, message_hash(23295, proxy, Address::repeat_byte(3), "p", 0));
        assert_ne!(base, message_hash(23295, Address::repeat_byte(4), user, "p", 0));
        assert_ne!(base, message_hash(23294, proxy, user, "p", 0));
    }

    #[test]
    fn relayed_reports_belong_to_the_user() {
        let f = fixture();
        let user = test_signer(10);
        assert_eq!(f.proxy.nonce_view(&f.chain, user.address()).unwrap(), 0);

        let signature = sign(&f, &user, "relayed", 0);
        let executed = relay(&f, user.address(), "relayed", 0, &signature).unwrap();

        assert_eq!(executed.value, 0);
        assert_eq!(executed.receipt.from, f.relay.address());
        assert_eq!(f.ledger.report_owner_view(&f.chain, 0).unwrap(), user.address());
        assert_eq!(
            f.ledger.report_payload_call(&f.chain, &user, 0).unwrap(),
            "relayed"
        );
        assert!(matches!(
            revert_of(f.ledger.report_payload_call(&f.chain, &f.relay, 0)),
            ContractError::Unauthorized(_)
        ));
        assert_eq!(f.proxy.nonce_view(&f.chain, user.address()).unwrap(), 1);

        let events: Vec<_> = executed.receipt.logs.iter().map(|l| &l.event).collect();
        let digest = f
            .proxy
            .message_hash_view(&f.chain, user.address(), "relayed", 0)
            .unwrap();
        assert_eq!(
            events,
            vec![
                &LedgerEvent::ReportSubmitted {
                    report_id: 0,
                    owner: user.address()
                },
                &LedgerEvent::GaslessTransactionExecuted {
                    user: user.address(),
                    nonce: 0,
                    tx_hash: digest
                },
            ]
        );
        assert_eq!(executed.receipt.logs[0].address, f.ledger.address());
        assert_eq!(executed.receipt.logs[1].address, f.proxy.address());
    }

    #[test]
    fn replayed_authorizations_fail_with_nonce_mismatch() {
        let f = fixture();
        let user = test_signer(10);
        let signature = sign(&f, &user, "once", 0);

        relay(&f, user.address(), "once", 0, &signature).unwrap();
        assert_eq!(
            revert_of(relay(&f, user.address(), "once", 0, &signature)),
            ContractError::NonceMismatch {
                expected: 1,
                provided: 0
            }
        );
        assert_eq!(f.ledger.total_report_count_view(&f.chain).unwrap(), 1);
        assert_eq!(f.proxy.nonce_view(&f.chain, user.address()).unwrap(), 1);
    }

    #[test]
    fn future_nonces_are_rejected_not_queued() {
        let f = fixture();
        let user = test_signer(10);
        let signature = sign(&f, &user, "early", 1);
        assert_eq!(
            revert_of(relay(&f, user.address(), "early", 1, &signature)),
            ContractError::NonceMismatch {
                expected: 0,
                provided: 1
            }
        );
        assert_eq!(f.proxy.nonce_view(&f.chain, user.address()).unwrap(), 0);
    }

    #[test]
    fn signatures_do_not_transfer_to_other_arguments() {
        let f = fixture();
        let user = test_signer(10);
        let other = test_signer(11);
        let signature = sign(&f, &user, "original", 0);

        for (claimed, payload, nonce) in [
            (user.address(), "tampered", 0),
            (user.address(), "original", 1),
            (other.address(), "original", 0),
        ] {
            assert_eq!(
                revert_of(relay(&f, claimed, payload, nonce, &signature)),
                ContractError::InvalidSignature
            );
        }
        assert_eq!(
            revert_of(relay(&f, user.address(), "original", 0, &[0u8; 10])),
            ContractError::InvalidSignature
        );
        assert_eq!(f.ledger.total_report_count_view(&f.chain).unwrap(), 0);
        assert_eq!(f.proxy.nonce_view(&f.chain, user.address()).unwrap(), 0);
    }

    #[test]
    fn only_the_registered_signer_may_execute() {
        let f = fixture();
        let user = test_signer(10);
        let signature = sign(&f, &user, "x", 0);

        for caller in [&user, &f.admin] {
            let result = f.proxy.execute_gasless_submit_report_tx(
                &f.chain,
                caller,
                user.address(),
                "x",
                0,
                &signature,
            );
            assert_eq!(
                revert_of(result),
                ContractError::unauthorized("Only the gasless signer can execute.")
            );
        }
        assert_eq!(f.proxy.nonce_view(&f.chain, user.address()).unwrap(), 0);
    }

    #[test]
    fn rotation_moves_execution_rights() {
        let f = fixture();
        let user = test_signer(10);
        let new_relay = test_signer(3);

        assert!(matches!(
            revert_of(f.proxy.update_gasless_signer_tx(&f.chain, &user, new_relay.address())),
            ContractError::Unauthorized(_)
        ));
        assert!(matches!(
            revert_of(f.proxy.update_gasless_signer_tx(&f.chain, &f.admin, Address::ZERO)),
            ContractError::Configuration(_)
        ));
        f.proxy
            .update_gasless_signer_tx(&f.chain, &f.admin, new_relay.address())
            .unwrap();
        assert_eq!(
            f.proxy.gasless_signer_view(&f.chain).unwrap(),
            Some(new_relay.address())
        );

        let signature = sign(&f, &user, "x", 0);
        assert!(matches!(
            revert_of(relay(&f, user.address(), "x", 0, &signature)),
            ContractError::Unauthorized(_)
        ));
        f.proxy
            .execute_gasless_submit_report_tx(&f.chain, &new_relay, user.address(), "x", 0, &signature)
            .unwrap();
    }

    #[test]
    fn unconfigured_proxies_report_configuration_errors() {
        let chain = Chain::in_memory(SAPPHIRE_LOCALNET, GasSchedule::default()).unwrap();
        let admin = test_signer(1);
        let relay_key = test_signer(2);
        let user = test_signer(10);
        let ledger = ReportLedger::deploy(&chain, &admin).unwrap().value;

        // no relay signer registered
        let proxy = RelayProxy::deploy(&chain, &admin, ledger.address(), Address::ZERO)
            .unwrap()
            .value;
        assert_eq!(proxy.gasless_signer_view(&chain).unwrap(), None);
        let digest = proxy.message_hash_view(&chain, user.address(), "x", 0).unwrap();
        let signature = MessageSigner::sign_message(&user, digest.as_slice())
            .unwrap()
            .as_bytes();
        assert!(matches!(
            revert_of(proxy.execute_gasless_submit_report_tx(
                &chain,
                &relay_key,
                user.address(),
                "x",
                0,
                &signature
            )),
            ContractError::Configuration(_)
        ));

        // signer registered but the ledger does not trust this proxy yet
        proxy
            .update_gasless_signer_tx(&chain, &admin, relay_key.address())
            .unwrap();
        assert!(matches!(
            revert_of(proxy.execute_gasless_submit_report_tx(
                &chain,
                &relay_key,
                user.address(),
                "x",
                0,
                &signature
            )),
            ContractError::Configuration(_)
        ));
        assert_eq!(proxy.nonce_view(&chain, user.address()).unwrap(), 0);
        assert_eq!(ledger.total_report_count_view(&chain).unwrap(), 0);
    }

    #[test]
    fn proxies_must_target_a_ledger() {
        let chain = Chain::in_memory(SAPPHIRE_LOCALNET, GasSchedule::default()).unwrap();
        let admin = test_signer(1);
        let err = RelayProxy::deploy(&chain, &admin, Address::repeat_byte(5), Address::ZERO)
            .unwrap_err();
        assert!(matches!(err, ChainError::NoContract(_)));
    }

    #[test]
    fn relay_fees_are_paid_by_the_relay_identity() {
        let chain = Chain::in_memory(
            SAPPHIRE_LOCALNET,
            GasSchedule {
                gas_price: U256::from(1u64),
                ..GasSchedule::default()
            },
        )
        .unwrap();
        let admin = test_signer(1);
        let relay_key = test_signer(2);
        let user = test_signer(10);
        chain.fund(admin.address(), U256::from(1_000_000u64)).unwrap();
        chain.fund(relay_key.address(), U256::from(100_000u64)).unwrap();

        let ledger = ReportLedger::deploy(&chain, &admin).unwrap().value;
        let proxy = RelayProxy::deploy(&chain, &admin, ledger.address(), relay_key.address())
            .unwrap()
            .value;
        ledger
            .set_gasless_proxy_tx(&chain, &admin, proxy.address())
            .unwrap();

        let digest = proxy.message_hash_view(&chain, user.address(), "free", 0).unwrap();
        let signature = MessageSigner::sign_message(&user, digest.as_slice())
            .unwrap()
            .as_bytes();
        let executed = proxy
            .execute_gasless_submit_report_tx(&chain, &relay_key, user.address(), "free", 0, &signature)
            .unwrap();

        assert_eq!(chain.balance_of(user.address()).unwrap(), U256::ZERO);
        assert_eq!(
            chain.balance_of(relay_key.address()).unwrap(),
            U256::from(100_000u64) - executed.receipt.fee_paid
        );
        assert_eq!(executed.receipt.gas_used, 21_000 + 2 * 2_000);
    }

    #[test]
    fn abi_relay_round_trip() {
        let f = fixture();
        let user = test_signer(10);

        let hash_call = IGaslessProxy::getMessageHashCall {
            user: user.address(),
            payload: "abi".into(),
            nonce: U256::ZERO,
        }
        .abi_encode();
        let output = f.chain.call_raw(&user, f.proxy.address(), &hash_call).unwrap();
        let digest = B256::abi_decode(&output).unwrap();

        let signature = MessageSigner::sign_message(&user, digest.as_slice()).unwrap();
        let execute = IGaslessProxy::executeGaslessSubmitReportCall {
            user: user.address(),
            payload: "abi".into(),
            nonce: U256::ZERO,
            signature: signature.as_bytes().to_vec().into(),
        }
        .abi_encode();
        let executed = f.chain.send_raw(&f.relay, f.proxy.address(), &execute).unwrap();
        assert_eq!(U256::abi_decode(&executed.value).unwrap(), U256::ZERO);

        let nonce_call = IGaslessProxy::getNonceCall {
            user: user.address(),
        }
        .abi_encode();
        let output = f.chain.call_raw(&user, f.proxy.address(), &nonce_call).unwrap();
        assert_eq!(U256::abi_decode(&output).unwrap(), U256::from(1u64));
        assert_eq!(f.proxy.target_contract_view(&f.chain).unwrap(), f.ledger.address());
        assert_eq!(f.proxy.owner_view(&f.chain).unwrap(), f.admin.address());
    }
}
