// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gasless System Deployment
//!
//! Brings up the ledger, the relay proxy and their trust chain:
//!
//! ```text
//! ReportLedger --trusts--> RelayProxy --trusts--> relay signer
//! (gaslessProxy slot)      (gaslessSigner slot)
//! ```
//!
//! Each link lives in the trusting contract and can be rotated on its own.
//! The resulting [`Deployment`] is stored in chain metadata so a restarted
//! service reattaches to the same contracts.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain::{Chain, ChainError, MessageSigner};
use crate::contracts::{ContractError, RelayProxy, ReportLedger};

/// Chain metadata key of the active deployment.
pub const DEPLOYMENT_RECORD_KEY: &str = "deployment";

/// Addresses of a deployed gasless reporting system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub network: String,
    pub chain_id: u64,
    pub ledger: Address,
    pub proxy: Address,
    pub relay_signer: Address,
    pub deployer: Address,
    pub deployed_at: DateTime<Utc>,
    /// Block of the last deployment transaction.
    pub block_number: u64,
}

impl Deployment {
    pub fn ledger(&self) -> ReportLedger {
        ReportLedger::at(self.ledger)
    }

    pub fn proxy(&self) -> RelayProxy {
        RelayProxy::at(self.proxy)
    }

    /// Load the deployment stored on `chain`, if any.
    pub fn load(chain: &Chain) -> Result<Option<Self>, ChainError> {
        chain.record(DEPLOYMENT_RECORD_KEY)
    }

    pub fn save(&self, chain: &Chain) -> Result<(), ChainError> {
        chain.put_record(DEPLOYMENT_RECORD_KEY, self)
    }

    /// Re-check every link of the trust chain against live contract state.
    pub fn verify(&self, chain: &Chain) -> Result<(), ChainError> {
        if self.chain_id != chain.chain_id() {
            return Err(ContractError::configuration(format!(
                "Deployment targets chain {}, connected to {}.",
                self.chain_id,
                chain.chain_id()
            ))
            .into());
        }

        let ledger = self.ledger();
        let proxy = self.proxy();

        if ledger.gasless_proxy_view(chain)? != Some(self.proxy) {
            return Err(ContractError::configuration("Ledger does not trust the relay proxy.").into());
        }
        if proxy.target_contract_view(chain)? != self.ledger {
            return Err(ContractError::configuration("Relay proxy targets a different ledger.").into());
        }
        if proxy.gasless_signer_view(chain)? != Some(self.relay_signer) {
            return Err(
                ContractError::configuration("Relay proxy does not trust the relay signer.").into(),
            );
        }
        Ok(())
    }

    /// Point the proxy at a new relay identity and persist the change.
    pub fn rotate_relay_signer(
        &mut self,
        chain: &Chain,
        admin: &dyn MessageSigner,
        new_signer: Address,
    ) -> Result<(), ChainError> {
        let executed = self.proxy().update_gasless_signer_tx(chain, admin, new_signer)?;
        self.relay_signer = new_signer;
        self.block_number = executed.receipt.block_number;
        self.save(chain)?;
        tracing::info!(proxy = %self.proxy, signer = %new_signer, "relay signer rotated");
        Ok(())
    }
}

/// Deploy ledger and proxy, register the proxy with the ledger, verify the
/// trust chain and persist the record.
pub fn deploy_gasless_system(
    chain: &Chain,
    deployer: &dyn MessageSigner,
    relay_signer: Address,
) -> Result<Deployment, ChainError> {
    tracing::info!(
        network = chain.network().name,
        chain_id = chain.chain_id(),
        deployer = %deployer.address(),
        "deploying gasless reporting system"
    );

    let ledger = ReportLedger::deploy(chain, deployer)?.value;
    tracing::info!(address = %ledger.address(), "report ledger deployed");

    let proxy = RelayProxy::deploy(chain, deployer, ledger.address(), relay_signer)?.value;
    tracing::info!(address = %proxy.address(), %relay_signer, "relay proxy deployed");

    let registered = ledger.set_gasless_proxy_tx(chain, deployer, proxy.address())?;

    let deployment = Deployment {
        network: chain.network().name.to_string(),
        chain_id: chain.chain_id(),
        ledger: ledger.address(),
        proxy: proxy.address(),
        relay_signer,
        deployer: deployer.address(),
        deployed_at: Utc::now(),
        block_number: registered.receipt.block_number,
    };
    deployment.verify(chain)?;
    deployment.save(chain)?;

    tracing::info!(
        ledger = %deployment.ledger,
        proxy = %deployment.proxy,
        relay_signer = %deployment.relay_signer,
        "gasless reporting system deployed and verified"
    );
    Ok(deployment)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::blockchain::signing::test_signer;
    use crate::blockchain::{GasSchedule, SAPPHIRE_LOCALNET, SAPPHIRE_TESTNET};
    use crate::relay::{GaslessClient, RelaySigner, SubmissionPath};

    fn chain() -> Chain {
        Chain::in_memory(SAPPHIRE_LOCALNET, GasSchedule::default()).unwrap()
    }

    #[test]
    fn deploys_a_verified_trust_chain() {
        let chain = chain();
        let deployer = test_signer(1);
        let relay = test_signer(2);

        let deployment = deploy_gasless_system(&chain, &deployer, relay.address()).unwrap();
        deployment.verify(&chain).unwrap();
        assert_eq!(deployment.chain_id, SAPPHIRE_LOCALNET.chain_id);
        assert_eq!(deployment.deployer, deployer.address());
        assert_ne!(deployment.ledger, deployment.proxy);
        assert_eq!(deployment.block_number, 3);
        assert_eq!(Deployment::load(&chain).unwrap(), Some(deployment));
    }

    #[test]
    fn deployed_system_relays_end_to_end() {
        let chain = chain();
        let deployer = test_signer(1);
        let relay_key = test_signer(2);
        let deployment = deploy_gasless_system(&chain, &deployer, relay_key.address()).unwrap();

        let relay = RelaySigner::new(deployment.proxy(), Some(relay_key));
        let client = GaslessClient::new(&chain, deployment.ledger(), &relay);
        let user = test_signer(10);

        let submission = client.submit_report(&user, r#"{"message":"test"}"#).unwrap();
        assert_eq!(submission.path, SubmissionPath::Gasless);
        assert_eq!(
            deployment
                .ledger()
                .report_owner_view(&chain, submission.report_id)
                .unwrap(),
            user.address()
        );
    }

    #[test]
    fn verify_detects_broken_links() {
        let chain = chain();
        let deployer = test_signer(1);
        let relay = test_signer(2);
        let mut deployment = deploy_gasless_system(&chain, &deployer, relay.address()).unwrap();

        // ledger re-pointed at some other proxy
        deployment
            .ledger()
            .set_gasless_proxy_tx(&chain, &deployer, Address::repeat_byte(9))
            .unwrap();
        let err = deployment.verify(&chain).unwrap_err();
        assert!(matches!(err.revert(), Some(ContractError::Configuration(_))));

        deployment
            .ledger()
            .set_gasless_proxy_tx(&chain, &deployer, deployment.proxy)
            .unwrap();
        deployment.verify(&chain).unwrap();

        // record and chain disagree on the relay signer
        deployment.relay_signer = Address::repeat_byte(8);
        assert!(deployment.verify(&chain).is_err());

        // record from another network
        let mut foreign = deployment.clone();
        foreign.relay_signer = relay.address();
        foreign.chain_id = SAPPHIRE_TESTNET.chain_id;
        assert!(foreign.verify(&chain).is_err());
    }

    #[test]
    fn rotation_updates_chain_and_record() {
        let chain = chain();
        let deployer = test_signer(1);
        let mut deployment =
            deploy_gasless_system(&chain, &deployer, test_signer(2).address()).unwrap();

        let next = test_signer(3);
        deployment
            .rotate_relay_signer(&chain, &deployer, next.address())
            .unwrap();
        deployment.verify(&chain).unwrap();
        assert_eq!(
            Deployment::load(&chain).unwrap().unwrap().relay_signer,
            next.address()
        );

        let outsider = test_signer(4);
        assert!(deployment
            .rotate_relay_signer(&chain, &outsider, outsider.address())
            .is_err());
        assert_eq!(deployment.relay_signer, next.address());
    }

    #[test]
    fn deployment_fails_atomically_without_funds() {
        let chain = Chain::in_memory(
            SAPPHIRE_LOCALNET,
            GasSchedule {
                gas_price: U256::from(1u64),
                ..GasSchedule::default()
            },
        )
        .unwrap();
        let deployer = test_signer(1);
        let err = deploy_gasless_system(&chain, &deployer, test_signer(2).address()).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds { .. }));
        assert_eq!(chain.block_number().unwrap(), 0);
        assert_eq!(Deployment::load(&chain).unwrap(), None);
    }
}
