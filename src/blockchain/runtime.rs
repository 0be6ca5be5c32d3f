// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Serialized transaction runtime.
//!
//! Every user-visible operation runs as one [`Chain::transact`] (state
//! changing, signed), [`Chain::call`] (signed query) or [`Chain::view`]
//! (unsigned query). Each of them owns exactly one [`StateTxn`]: the body
//! commits on `Ok` and aborts on `Err`, so a failing nested call can never
//! leave partial state behind. Queries run on a read-only snapshot, never
//! wait for the writer, and fail if the body tries to modify state.

use std::path::Path;

use alloy::primitives::{keccak256, Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::signing::{MessageSigner, SigningError};
use super::types::NetworkConfig;
use crate::contracts::{self, ContractError, ContractKind, LedgerEvent};
use crate::storage::{StateDb, StateDbError, StateTxn};

/// Slot on an account holding how many contracts it has deployed.
const DEPLOY_NONCE_SLOT: &str = "deploy_nonce";

/// Flat-fee gas accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSchedule {
    /// Price per unit of gas in wei. Zero disables fee charging.
    pub gas_price: U256,
    /// Gas charged for every committed transaction.
    pub base_gas: u64,
    /// Additional gas per emitted event.
    pub per_event_gas: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            gas_price: U256::ZERO,
            base_gas: 21_000,
            per_event_gas: 2_000,
        }
    }
}

impl GasSchedule {
    fn gas_used(&self, events: usize) -> u64 {
        self.base_gas
            .saturating_add(self.per_event_gas.saturating_mul(events as u64))
    }
}

/// An event as persisted in the chain's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the global event log.
    pub seq: u64,
    /// Block that emitted the event.
    pub block_number: u64,
    /// Transaction that emitted the event.
    pub tx_hash: B256,
    /// Emitting contract.
    pub address: Address,
    /// Decoded event.
    pub event: LedgerEvent,
}

/// Confirmation of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub from: Address,
    pub to: Address,
    pub gas_used: u64,
    /// Fee debited from `from`, in wei.
    pub fee_paid: U256,
    pub timestamp: DateTime<Utc>,
    pub logs: Vec<EventRecord>,
}

/// Return value of a committed transaction together with its receipt.
#[derive(Debug, Clone)]
pub struct Executed<T> {
    pub value: T,
    pub receipt: TxReceipt,
}

/// Errors surfaced by the runtime.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("execution reverted: {0}")]
    Revert(#[from] ContractError),

    #[error("insufficient funds: {account} needs {required} wei, has {available}")]
    InsufficientFunds {
        account: Address,
        required: U256,
        available: U256,
    },

    #[error("transaction signature does not match sender {0}")]
    SenderMismatch(Address),

    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("no contract deployed at {0}")]
    NoContract(Address),

    #[error("contract at {address} is not a {expected}")]
    WrongContract {
        address: Address,
        expected: ContractKind,
    },

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("state error: {0}")]
    State(#[from] StateDbError),
}

impl ChainError {
    /// The contract-level revert, if this failure is one.
    pub fn revert(&self) -> Option<&ContractError> {
        match self {
            ChainError::Revert(e) => Some(e),
            _ => None,
        }
    }
}

/// Execution context handed to contract code.
///
/// `sender` is the immediate caller (`msg.sender`).
pub struct CallContext<'t> {
    state: &'t StateTxn,
    chain_id: u64,
    sender: Address,
    block_number: u64,
    events: Vec<(Address, LedgerEvent)>,
}

impl<'t> CallContext<'t> {
    /// Immediate caller.
    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Storage of the enclosing transaction. Read-only inside queries.
    pub fn state(&self) -> &'t StateTxn {
        self.state
    }

    /// Queue an event; it is persisted only if the transaction commits.
    pub fn emit(&mut self, address: Address, event: LedgerEvent) {
        self.events.push((address, event));
    }

    /// Run `f` as a nested call whose `msg.sender` is `caller`.
    pub fn call_from<T>(
        &mut self,
        caller: Address,
        f: impl FnOnce(&mut CallContext<'t>) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let outer = std::mem::replace(&mut self.sender, caller);
        let result = f(self);
        self.sender = outer;
        result
    }

    /// Fail unless a contract of `kind` is deployed at `address`.
    pub fn expect_code(&self, address: Address, kind: ContractKind) -> Result<(), ChainError> {
        match self.state.code_kind(address)? {
            Some(found) if found == kind.as_str() => Ok(()),
            Some(_) => Err(ChainError::WrongContract {
                address,
                expected: kind,
            }),
            None => Err(ChainError::NoContract(address)),
        }
    }
}

/// The serialized ledger all contracts live on.
pub struct Chain {
    db: StateDb,
    network: NetworkConfig,
    gas: GasSchedule,
}

impl Chain {
    /// Open (or create) a persistent chain at `path`.
    pub fn open(path: &Path, network: NetworkConfig, gas: GasSchedule) -> Result<Self, ChainError> {
        Ok(Self {
            db: StateDb::open(path)?,
            network,
            gas,
        })
    }

    /// Create a volatile chain, mostly for tests and local demos.
    pub fn in_memory(network: NetworkConfig, gas: GasSchedule) -> Result<Self, ChainError> {
        Ok(Self {
            db: StateDb::in_memory()?,
            network,
            gas,
        })
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id
    }

    /// Underlying state database (read side).
    pub fn db(&self) -> &StateDb {
        &self.db
    }

    pub fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.db.block_number()?)
    }

    pub fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        Ok(self.db.balance_of(account)?)
    }

    /// Credit `amount` wei to `account` (genesis allocation / faucet).
    pub fn fund(&self, account: Address, amount: U256) -> Result<U256, ChainError> {
        let txn = self.db.begin()?;
        let balance = txn.balance(account)?.saturating_add(amount);
        txn.set_balance(account, balance)?;
        txn.commit()?;
        tracing::debug!(%account, %amount, "account funded");
        Ok(balance)
    }

    /// Credit `account` just enough to bring its balance up to `target`.
    /// Returns the amount credited, zero if it already holds `target`.
    pub fn top_up(&self, account: Address, target: U256) -> Result<U256, ChainError> {
        let txn = self.db.begin()?;
        let balance = txn.balance(account)?;
        if balance >= target {
            txn.abort()?;
            return Ok(U256::ZERO);
        }
        txn.set_balance(account, target)?;
        txn.commit()?;
        let credited = target - balance;
        tracing::debug!(%account, %credited, %target, "account topped up");
        Ok(credited)
    }

    /// Persist an operator record (e.g. the deployment) in chain metadata.
    pub fn put_record<T: Serialize>(&self, key: &str, record: &T) -> Result<(), ChainError> {
        let txn = self.db.begin()?;
        txn.set_meta_json(key, record)?;
        txn.commit()?;
        Ok(())
    }

    pub fn record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ChainError> {
        Ok(self.db.meta_json(key)?)
    }

    /// Events with sequence number `>= from`, at most `limit` of them.
    pub fn events(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>, ChainError> {
        self.db
            .events_from(from, limit)?
            .into_iter()
            .map(|(_, bytes)| {
                serde_json::from_slice(&bytes).map_err(|e| ChainError::State(e.into()))
            })
            .collect()
    }

    /// Submit a signed, state-changing transaction to `to`.
    ///
    /// `label` names the invoked operation; it feeds the transaction hash
    /// and the logs.
    pub fn transact<T>(
        &self,
        sender: &dyn MessageSigner,
        to: Address,
        label: &str,
        body: impl FnOnce(&mut CallContext<'_>) -> Result<T, ChainError>,
    ) -> Result<Executed<T>, ChainError> {
        let txn = self.begin_at(self.db.begin()?, to)?;
        let pending = self.run_in(txn, Some(sender), to, label.as_bytes(), label, body)?;
        self.commit(pending, label)
    }

    /// Signed query: `msg.sender` is the authenticated caller, state is
    /// never modified.
    pub fn call<T>(
        &self,
        caller: &dyn MessageSigner,
        to: Address,
        label: &str,
        body: impl FnOnce(&mut CallContext<'_>) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let txn = self.begin_at(self.db.snapshot()?, to)?;
        let pending = self.run_in(txn, Some(caller), to, label.as_bytes(), label, body)?;
        pending.discard()
    }

    /// Unsigned query: `msg.sender` is the zero address.
    pub fn view<T>(
        &self,
        to: Address,
        label: &str,
        body: impl FnOnce(&mut CallContext<'_>) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let txn = self.begin_at(self.db.snapshot()?, to)?;
        let pending = self.run_in(txn, None, to, label.as_bytes(), label, body)?;
        pending.discard()
    }

    /// Deploy a contract of `kind`.
    ///
    /// The address is derived from the deployer and its deployment count;
    /// `constructor` runs inside the same transaction.
    pub fn deploy<C>(
        &self,
        deployer: &dyn MessageSigner,
        kind: ContractKind,
        constructor: impl FnOnce(&mut CallContext<'_>, Address) -> Result<C, ChainError>,
    ) -> Result<Executed<C>, ChainError> {
        let txn = self.db.begin()?;
        let from = deployer.address();
        let deploy_nonce = txn.u64_slot(from, DEPLOY_NONCE_SLOT)?;
        let address = contract_address(from, deploy_nonce);
        txn.set_u64_slot(from, DEPLOY_NONCE_SLOT, deploy_nonce + 1)?;
        txn.set_code_kind(address, kind.as_str())?;

        let label = format!("deploy:{kind}");
        let pending = self.run_in(txn, Some(deployer), address, label.as_bytes(), &label, |ctx| {
            constructor(ctx, address)
        })?;
        let executed = self.commit(pending, &label)?;
        tracing::info!(%address, %kind, deployer = %from, "contract deployed");
        Ok(executed)
    }

    /// Submit an ABI-encoded transaction (`selector ‖ args`) to `to`.
    pub fn send_raw(
        &self,
        sender: &dyn MessageSigner,
        to: Address,
        calldata: &[u8],
    ) -> Result<Executed<Vec<u8>>, ChainError> {
        let txn = self.begin_at(self.db.begin()?, to)?;
        let pending = self.run_in(txn, Some(sender), to, calldata, "raw", |ctx| {
            contracts::dispatch(ctx, to, calldata)
        })?;
        self.commit(pending, "raw")
    }

    /// Signed ABI-encoded query against `to`.
    pub fn call_raw(
        &self,
        caller: &dyn MessageSigner,
        to: Address,
        calldata: &[u8],
    ) -> Result<Vec<u8>, ChainError> {
        let txn = self.begin_at(self.db.snapshot()?, to)?;
        let pending = self.run_in(txn, Some(caller), to, calldata, "raw", |ctx| {
            contracts::dispatch(ctx, to, calldata)
        })?;
        pending.discard()
    }

    /// Check that `to` holds code before running anything in `txn`.
    fn begin_at(&self, txn: StateTxn, to: Address) -> Result<StateTxn, ChainError> {
        if txn.code_kind(to)?.is_none() {
            txn.abort()?;
            return Err(ChainError::NoContract(to));
        }
        Ok(txn)
    }

    /// Authenticate the sender and run `body`. Aborts `txn` on any failure.
    fn run_in<T>(
        &self,
        txn: StateTxn,
        sender: Option<&dyn MessageSigner>,
        to: Address,
        input: &[u8],
        label: &str,
        body: impl FnOnce(&mut CallContext<'_>) -> Result<T, ChainError>,
    ) -> Result<Pending<T>, ChainError> {
        let from = sender.map(|s| s.address()).unwrap_or(Address::ZERO);
        let block_number = txn.block_number()? + 1;
        let tx_hash = self.tx_hash(from, to, block_number, input);

        if let Some(signer) = sender {
            if let Err(e) = authenticate(signer, tx_hash) {
                txn.abort()?;
                return Err(e);
            }
        }

        let outcome = {
            let mut ctx = CallContext {
                state: &txn,
                chain_id: self.network.chain_id,
                sender: from,
                block_number,
                events: Vec::new(),
            };
            body(&mut ctx).map(|value| (value, ctx.events))
        };

        match outcome {
            Ok((value, events)) => Ok(Pending {
                txn,
                value,
                events,
                from,
                to,
                tx_hash,
                block_number,
            }),
            Err(e) => {
                txn.abort()?;
                tracing::info!(%tx_hash, %from, %to, op = label, reason = %e, "transaction reverted");
                Err(e)
            }
        }
    }

    /// Charge the fee, persist events, advance the block and commit.
    fn commit<T>(&self, pending: Pending<T>, label: &str) -> Result<Executed<T>, ChainError> {
        let Pending {
            txn,
            value,
            events,
            from,
            to,
            tx_hash,
            block_number,
        } = pending;

        let gas_used = self.gas.gas_used(events.len());
        let fee = self.gas.gas_price.saturating_mul(U256::from(gas_used));

        if !fee.is_zero() {
            let available = txn.balance(from)?;
            if available < fee {
                txn.abort()?;
                tracing::info!(%tx_hash, %from, %to, op = label, "transaction reverted: insufficient funds");
                return Err(ChainError::InsufficientFunds {
                    account: from,
                    required: fee,
                    available,
                });
            }
            txn.set_balance(from, available - fee)?;
        }

        let mut logs = Vec::with_capacity(events.len());
        for (address, event) in events {
            let record = EventRecord {
                seq: txn.next_event_seq()?,
                block_number,
                tx_hash,
                address,
                event,
            };
            let json = serde_json::to_vec(&record).map_err(StateDbError::from)?;
            txn.append_event(&json)?;
            logs.push(record);
        }

        txn.advance_block()?;
        txn.commit()?;

        tracing::debug!(
            %tx_hash,
            %from,
            %to,
            op = label,
            block = block_number,
            logs = logs.len(),
            "transaction committed"
        );

        Ok(Executed {
            value,
            receipt: TxReceipt {
                tx_hash,
                block_number,
                from,
                to,
                gas_used,
                fee_paid: fee,
                timestamp: Utc::now(),
                logs,
            },
        })
    }

    /// keccak256(chain_id ‖ block_number ‖ from ‖ to ‖ input)
    fn tx_hash(&self, from: Address, to: Address, block_number: u64, input: &[u8]) -> B256 {
        let mut buf = Vec::with_capacity(8 + 8 + 20 + 20 + input.len());
        buf.extend_from_slice(&self.network.chain_id.to_be_bytes());
        buf.extend_from_slice(&block_number.to_be_bytes());
        buf.extend_from_slice(from.as_slice());
        buf.extend_from_slice(to.as_slice());
        buf.extend_from_slice(input);
        keccak256(&buf)
    }
}

/// A body that ran successfully but whose transaction is still open.
struct Pending<T> {
    txn: StateTxn,
    value: T,
    events: Vec<(Address, LedgerEvent)>,
    from: Address,
    to: Address,
    tx_hash: B256,
    block_number: u64,
}

impl<T> Pending<T> {
    /// Close the transaction without committing and hand back the value.
    fn discard(self) -> Result<T, ChainError> {
        self.txn.abort()?;
        Ok(self.value)
    }
}

/// Have `signer` sign the transaction hash and check the recovered sender.
fn authenticate(signer: &dyn MessageSigner, tx_hash: B256) -> Result<(), ChainError> {
    let claimed = signer.address();
    let signature = signer.sign_message(tx_hash.as_slice())?;
    match signature.recover_address_from_msg(tx_hash.as_slice()) {
        Ok(recovered) if recovered == claimed => Ok(()),
        _ => Err(ChainError::SenderMismatch(claimed)),
    }
}

/// CREATE-style address: last 20 bytes of keccak256(deployer ‖ nonce).
fn contract_address(deployer: Address, nonce: u64) -> Address {
    let mut buf = [0u8; 28];
    buf[..20].copy_from_slice(deployer.as_slice());
    buf[20..].copy_from_slice(&nonce.to_be_bytes());
    Address::from_slice(&keccak256(buf)[12..])
}
