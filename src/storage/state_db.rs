// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded chain state database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `contract_code`: contract address → contract kind
//! - `contract_slots`: contract address | slot name → raw value
//! - `reports`: ledger address | report id (BE) → serialized report
//! - `relay_nonces`: proxy address | user address → next nonce
//! - `balances`: account address → U256 (32 bytes BE)
//! - `events`: sequence number → serialized event record
//! - `chain_meta`: key → value (block height, counters, deployment record)
//! - `owner_index` / `viewer_index`: ledger | account | report id → report id
//! - `indexer_state`: key → value (event checkpoint)
//!
//! Every mutation of contract state goes through a [`StateTxn`], which wraps
//! one redb write transaction. Dropping or aborting a `StateTxn` discards
//! everything it wrote. Read-only calls use a snapshot `StateTxn` backed by a
//! redb read transaction instead.

use std::path::Path;

use alloy::primitives::{Address, U256};
use redb::{
    backends::InMemoryBackend, Database, ReadTransaction, ReadableDatabase, ReadableTable,
    TableDefinition, WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

/// Contract kind registered at each deployed address.
const CONTRACT_CODE: TableDefinition<&[u8], &str> = TableDefinition::new("contract_code");

/// Single-value contract storage. Key format: `contract | slot_name`.
const CONTRACT_SLOTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("contract_slots");

/// Report records. Key format: `ledger | report_id_be`.
const REPORTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("reports");

/// Relay nonces. Key format: `proxy | user`.
const RELAY_NONCES: TableDefinition<&[u8], u64> = TableDefinition::new("relay_nonces");

/// Native balances keyed by raw address bytes.
const BALANCES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("balances");

/// Append-only event log in commit order.
const EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("events");

/// Chain-level counters and records.
const CHAIN_META: TableDefinition<&str, &[u8]> = TableDefinition::new("chain_meta");

/// Index: `ledger | owner | report_id_be` → report id.
const OWNER_INDEX: TableDefinition<&[u8], u64> = TableDefinition::new("owner_index");

/// Index: `ledger | viewer | report_id_be` → report id.
const VIEWER_INDEX: TableDefinition<&[u8], u64> = TableDefinition::new("viewer_index");

/// Indexer state: key → value (e.g. "next_event_seq").
const INDEXER_STATE: TableDefinition<&str, u64> = TableDefinition::new("indexer_state");

const META_BLOCK_NUMBER: &str = "block_number";
const META_NEXT_EVENT_SEQ: &str = "next_event_seq";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StateDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt value for {0}")]
    Corrupt(String),

    #[error("state modification in a read-only transaction")]
    ReadOnly,
}

pub type StateDbResult<T> = Result<T, StateDbError>;

// =============================================================================
// Key Helpers
// =============================================================================

/// Build a key scoped to a contract: `contract | suffix`.
fn scoped_key(contract: Address, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(20 + suffix.len());
    key.extend_from_slice(contract.as_slice());
    key.extend_from_slice(suffix);
    key
}

/// Build a report key: `ledger | report_id_be`.
fn report_key(ledger: Address, report_id: u64) -> Vec<u8> {
    scoped_key(ledger, &report_id.to_be_bytes())
}

/// Build an index key: `ledger | account | report_id_be`.
///
/// Big-endian ids keep range scans in ascending report order.
fn index_key(ledger: Address, account: Address, report_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(20 + 20 + 8);
    key.extend_from_slice(ledger.as_slice());
    key.extend_from_slice(account.as_slice());
    key.extend_from_slice(&report_id.to_be_bytes());
    key
}

fn decode_u64(bytes: &[u8], what: &str) -> StateDbResult<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StateDbError::Corrupt(what.to_string()))?;
    Ok(u64::from_be_bytes(array))
}

// =============================================================================
// StateDb
// =============================================================================

/// Embedded ACID chain state database.
pub struct StateDb {
    db: Database,
}

impl StateDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StateDbResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Create a volatile database that lives only as long as this value.
    pub fn in_memory() -> StateDbResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StateDbResult<Self> {
        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CONTRACT_CODE)?;
            let _ = write_txn.open_table(CONTRACT_SLOTS)?;
            let _ = write_txn.open_table(REPORTS)?;
            let _ = write_txn.open_table(RELAY_NONCES)?;
            let _ = write_txn.open_table(BALANCES)?;
            let _ = write_txn.open_table(EVENTS)?;
            let _ = write_txn.open_table(CHAIN_META)?;
            let _ = write_txn.open_table(OWNER_INDEX)?;
            let _ = write_txn.open_table(VIEWER_INDEX)?;
            let _ = write_txn.open_table(INDEXER_STATE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a state transaction. Only one may be open at a time; callers
    /// block until the previous one commits or aborts.
    pub fn begin(&self) -> StateDbResult<StateTxn> {
        Ok(StateTxn {
            txn: Txn::Write(self.db.begin_write()?),
        })
    }

    /// Open a read-only transaction over the latest committed state. Never
    /// waits for an open writer.
    pub fn snapshot(&self) -> StateDbResult<StateTxn> {
        Ok(StateTxn {
            txn: Txn::Read(self.db.begin_read()?),
        })
    }

    // =========================================================================
    // Read-only accessors (snapshot reads, never block the writer)
    // =========================================================================

    /// Current block height (number of committed transactions).
    pub fn block_number(&self) -> StateDbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHAIN_META)?;
        match table.get(META_BLOCK_NUMBER)? {
            Some(v) => decode_u64(v.value(), META_BLOCK_NUMBER),
            None => Ok(0),
        }
    }

    /// Native balance of an account.
    pub fn balance_of(&self, account: Address) -> StateDbResult<U256> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BALANCES)?;
        match table.get(account.as_slice())? {
            Some(v) => Ok(U256::from_be_slice(v.value())),
            None => Ok(U256::ZERO),
        }
    }

    /// Read a JSON record from chain metadata.
    pub fn meta_json<T: DeserializeOwned>(&self, key: &str) -> StateDbResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHAIN_META)?;
        match table.get(key)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    /// Events with sequence number `>= from`, at most `limit` of them.
    pub fn events_from(&self, from: u64, limit: usize) -> StateDbResult<Vec<(u64, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENTS)?;

        let mut events = Vec::new();
        for entry in table.range(from..)? {
            let entry = entry?;
            events.push((entry.0.value(), entry.1.value().to_vec()));
            if events.len() >= limit {
                break;
            }
        }
        Ok(events)
    }

    // =========================================================================
    // Report index (maintained by the event indexer)
    // =========================================================================

    /// Record that `owner` owns `report_id` on `ledger`.
    pub fn index_owner(&self, ledger: Address, owner: Address, report_id: u64) -> StateDbResult<()> {
        self.index_insert(OWNER_INDEX, ledger, owner, report_id)
    }

    /// Record that `viewer` was granted access to `report_id` on `ledger`.
    pub fn index_viewer(
        &self,
        ledger: Address,
        viewer: Address,
        report_id: u64,
    ) -> StateDbResult<()> {
        self.index_insert(VIEWER_INDEX, ledger, viewer, report_id)
    }

    fn index_insert(
        &self,
        table_def: TableDefinition<'static, &'static [u8], u64>,
        ledger: Address,
        account: Address,
        report_id: u64,
    ) -> StateDbResult<()> {
        let key = index_key(ledger, account, report_id);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_def)?;
            table.insert(key.as_slice(), report_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Report ids owned by `owner` on `ledger`, ascending.
    pub fn reports_owned_by(&self, ledger: Address, owner: Address) -> StateDbResult<Vec<u64>> {
        self.index_scan(OWNER_INDEX, ledger, owner)
    }

    /// Report ids `viewer` was granted on `ledger`, ascending.
    pub fn reports_granted_to(&self, ledger: Address, viewer: Address) -> StateDbResult<Vec<u64>> {
        self.index_scan(VIEWER_INDEX, ledger, viewer)
    }

    fn index_scan(
        &self,
        table_def: TableDefinition<'static, &'static [u8], u64>,
        ledger: Address,
        account: Address,
    ) -> StateDbResult<Vec<u64>> {
        let start = index_key(ledger, account, 0);
        let end = index_key(ledger, account, u64::MAX);

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_def)?;

        let mut ids = Vec::new();
        for entry in table.range(start.as_slice()..=end.as_slice())? {
            let entry = entry?;
            ids.push(entry.1.value());
        }
        Ok(ids)
    }

    /// Next event sequence number the indexer has not processed yet.
    pub fn indexer_checkpoint(&self) -> StateDbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(INDEXER_STATE)?;
        Ok(table.get(META_NEXT_EVENT_SEQ)?.map(|v| v.value()).unwrap_or(0))
    }

    /// Persist the indexer checkpoint.
    pub fn set_indexer_checkpoint(&self, next_seq: u64) -> StateDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(INDEXER_STATE)?;
            table.insert(META_NEXT_EVENT_SEQ, next_seq)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// StateTxn
// =============================================================================

enum Txn {
    Write(WriteTransaction),
    Read(ReadTransaction),
}

/// One atomic unit of state access.
///
/// A transaction from [`StateDb::begin`] holds the single writer lock;
/// nothing written through it becomes visible until [`commit`] succeeds, and
/// [`abort`] (or dropping the value) discards all writes. A transaction from
/// [`StateDb::snapshot`] reads a consistent snapshot without taking the
/// writer lock and rejects every write with [`StateDbError::ReadOnly`].
///
/// [`commit`]: StateTxn::commit
/// [`abort`]: StateTxn::abort
pub struct StateTxn {
    txn: Txn,
}

impl StateTxn {
    /// Make every write of this transaction durable.
    pub fn commit(self) -> StateDbResult<()> {
        if let Txn::Write(txn) = self.txn {
            txn.commit()?;
        }
        Ok(())
    }

    /// Discard every write of this transaction.
    pub fn abort(self) -> StateDbResult<()> {
        if let Txn::Write(txn) = self.txn {
            txn.abort()?;
        }
        Ok(())
    }

    fn writer(&self) -> StateDbResult<&WriteTransaction> {
        match &self.txn {
            Txn::Write(txn) => Ok(txn),
            Txn::Read(_) => Err(StateDbError::ReadOnly),
        }
    }

    // ========== Contract code ==========

    /// Kind of contract deployed at `address`, if any.
    pub fn code_kind(&self, address: Address) -> StateDbResult<Option<String>> {
        match &self.txn {
            Txn::Write(txn) => get_str(&txn.open_table(CONTRACT_CODE)?, address.as_slice()),
            Txn::Read(txn) => get_str(&txn.open_table(CONTRACT_CODE)?, address.as_slice()),
        }
    }

    /// Register a contract kind at `address`.
    pub fn set_code_kind(&self, address: Address, kind: &str) -> StateDbResult<()> {
        let mut table = self.writer()?.open_table(CONTRACT_CODE)?;
        table.insert(address.as_slice(), kind)?;
        Ok(())
    }

    // ========== Contract slots ==========

    fn slot(&self, contract: Address, slot: &str) -> StateDbResult<Option<Vec<u8>>> {
        let key = scoped_key(contract, slot.as_bytes());
        match &self.txn {
            Txn::Write(txn) => get_bytes(&txn.open_table(CONTRACT_SLOTS)?, &key),
            Txn::Read(txn) => get_bytes(&txn.open_table(CONTRACT_SLOTS)?, &key),
        }
    }

    fn set_slot(&self, contract: Address, slot: &str, value: &[u8]) -> StateDbResult<()> {
        let key = scoped_key(contract, slot.as_bytes());
        let mut table = self.writer()?.open_table(CONTRACT_SLOTS)?;
        table.insert(key.as_slice(), value)?;
        Ok(())
    }

    /// Address stored in a contract slot; `None` if never set.
    pub fn address_slot(&self, contract: Address, slot: &str) -> StateDbResult<Option<Address>> {
        match self.slot(contract, slot)? {
            Some(bytes) if bytes.len() == 20 => Ok(Some(Address::from_slice(&bytes))),
            Some(_) => Err(StateDbError::Corrupt(format!("slot {slot}"))),
            None => Ok(None),
        }
    }

    /// Store an address in a contract slot.
    pub fn set_address_slot(
        &self,
        contract: Address,
        slot: &str,
        value: Address,
    ) -> StateDbResult<()> {
        self.set_slot(contract, slot, value.as_slice())
    }

    /// Counter stored in a contract slot; zero if never set.
    pub fn u64_slot(&self, contract: Address, slot: &str) -> StateDbResult<u64> {
        match self.slot(contract, slot)? {
            Some(bytes) => decode_u64(&bytes, slot),
            None => Ok(0),
        }
    }

    /// Store a counter in a contract slot.
    pub fn set_u64_slot(&self, contract: Address, slot: &str, value: u64) -> StateDbResult<()> {
        self.set_slot(contract, slot, &value.to_be_bytes())
    }

    // ========== Reports ==========

    /// Load a report record.
    pub fn report<T: DeserializeOwned>(
        &self,
        ledger: Address,
        report_id: u64,
    ) -> StateDbResult<Option<T>> {
        let key = report_key(ledger, report_id);
        let json = match &self.txn {
            Txn::Write(txn) => get_bytes(&txn.open_table(REPORTS)?, &key)?,
            Txn::Read(txn) => get_bytes(&txn.open_table(REPORTS)?, &key)?,
        };
        match json {
            Some(json) => Ok(Some(serde_json::from_slice(&json)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a report record.
    pub fn put_report<T: Serialize>(
        &self,
        ledger: Address,
        report_id: u64,
        report: &T,
    ) -> StateDbResult<()> {
        let key = report_key(ledger, report_id);
        let json = serde_json::to_vec(report)?;
        let mut table = self.writer()?.open_table(REPORTS)?;
        table.insert(key.as_slice(), json.as_slice())?;
        Ok(())
    }

    // ========== Relay nonces ==========

    /// Next expected nonce for `user` on `proxy`.
    pub fn nonce(&self, proxy: Address, user: Address) -> StateDbResult<u64> {
        let key = scoped_key(proxy, user.as_slice());
        let nonce = match &self.txn {
            Txn::Write(txn) => get_u64(&txn.open_table(RELAY_NONCES)?, &key)?,
            Txn::Read(txn) => get_u64(&txn.open_table(RELAY_NONCES)?, &key)?,
        };
        Ok(nonce.unwrap_or(0))
    }

    /// Store the next expected nonce for `user` on `proxy`.
    pub fn set_nonce(&self, proxy: Address, user: Address, nonce: u64) -> StateDbResult<()> {
        let key = scoped_key(proxy, user.as_slice());
        let mut table = self.writer()?.open_table(RELAY_NONCES)?;
        table.insert(key.as_slice(), nonce)?;
        Ok(())
    }

    // ========== Balances ==========

    /// Native balance of an account.
    pub fn balance(&self, account: Address) -> StateDbResult<U256> {
        let bytes = match &self.txn {
            Txn::Write(txn) => get_bytes(&txn.open_table(BALANCES)?, account.as_slice())?,
            Txn::Read(txn) => get_bytes(&txn.open_table(BALANCES)?, account.as_slice())?,
        };
        Ok(bytes
            .map(|b| U256::from_be_slice(&b))
            .unwrap_or(U256::ZERO))
    }

    /// Overwrite the native balance of an account.
    pub fn set_balance(&self, account: Address, amount: U256) -> StateDbResult<()> {
        let bytes = amount.to_be_bytes::<32>();
        let mut table = self.writer()?.open_table(BALANCES)?;
        table.insert(account.as_slice(), bytes.as_slice())?;
        Ok(())
    }

    // ========== Chain metadata ==========

    /// Current block height.
    pub fn block_number(&self) -> StateDbResult<u64> {
        self.meta_u64(META_BLOCK_NUMBER)
    }

    /// Advance the block height by one and return the new height.
    pub fn advance_block(&self) -> StateDbResult<u64> {
        let next = self.meta_u64(META_BLOCK_NUMBER)? + 1;
        self.set_meta(META_BLOCK_NUMBER, &next.to_be_bytes())?;
        Ok(next)
    }

    /// Counter stored in chain metadata; zero if never set.
    pub fn meta_u64(&self, key: &str) -> StateDbResult<u64> {
        let bytes = match &self.txn {
            Txn::Write(txn) => get_meta(&txn.open_table(CHAIN_META)?, key)?,
            Txn::Read(txn) => get_meta(&txn.open_table(CHAIN_META)?, key)?,
        };
        match bytes {
            Some(bytes) => decode_u64(&bytes, key),
            None => Ok(0),
        }
    }

    /// Store a counter in chain metadata.
    pub fn set_meta_u64(&self, key: &str, value: u64) -> StateDbResult<()> {
        self.set_meta(key, &value.to_be_bytes())
    }

    /// Store a JSON record in chain metadata.
    pub fn set_meta_json<T: Serialize>(&self, key: &str, value: &T) -> StateDbResult<()> {
        let json = serde_json::to_vec(value)?;
        self.set_meta(key, &json)
    }

    fn set_meta(&self, key: &str, value: &[u8]) -> StateDbResult<()> {
        let mut table = self.writer()?.open_table(CHAIN_META)?;
        table.insert(key, value)?;
        Ok(())
    }

    // ========== Events ==========

    /// Append a serialized event and return its sequence number.
    pub fn append_event(&self, record: &[u8]) -> StateDbResult<u64> {
        let seq = self.meta_u64(META_NEXT_EVENT_SEQ)?;
        {
            let mut table = self.writer()?.open_table(EVENTS)?;
            table.insert(seq, record)?;
        }
        self.set_meta_u64(META_NEXT_EVENT_SEQ, seq + 1)?;
        Ok(seq)
    }

    /// Sequence number the next appended event will receive.
    pub fn next_event_seq(&self) -> StateDbResult<u64> {
        self.meta_u64(META_NEXT_EVENT_SEQ)
    }
}

// Point lookups shared by write and snapshot transactions. Each copies the
// value out so no access guard outlives the table it borrows.

fn get_str(
    table: &impl ReadableTable<&'static [u8], &'static str>,
    key: &[u8],
) -> StateDbResult<Option<String>> {
    let value = table.get(key)?.map(|v| v.value().to_string());
    Ok(value)
}

fn get_bytes(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    key: &[u8],
) -> StateDbResult<Option<Vec<u8>>> {
    let value = table.get(key)?.map(|v| v.value().to_vec());
    Ok(value)
}

fn get_u64(
    table: &impl ReadableTable<&'static [u8], u64>,
    key: &[u8],
) -> StateDbResult<Option<u64>> {
    let value = table.get(key)?.map(|v| v.value());
    Ok(value)
}

fn get_meta(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StateDbResult<Option<Vec<u8>>> {
    let value = table.get(key)?.map(|v| v.value().to_vec());
    Ok(value)
}

// =============================================================================
// Tests
// =============================================================================
