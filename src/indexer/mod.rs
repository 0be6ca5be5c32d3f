// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Report Indexer
//!
//! Background task that rebuilds "who owns which report" and "who may view
//! which report" from the ledger's event log alone, the same way an
//! off-chain observer would.
//!
//! ## Checkpointing
//!
//! The indexer persists the next unprocessed event sequence number in redb
//! (`indexer_state` table). On restart it resumes from the checkpoint.
//! Index writes are idempotent, so replaying a batch after a crash is safe.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;

use crate::blockchain::{Chain, ChainError};
use crate::contracts::LedgerEvent;
use crate::storage::StateDbError;

/// Events processed per step.
const DEFAULT_BATCH_SIZE: usize = 500;

/// Poll interval when caught up with the log.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("storage error: {0}")]
    Storage(#[from] StateDbError),
}

pub struct ReportIndexer {
    chain: Arc<Chain>,
    ledger: Address,
    poll_interval: Duration,
    batch_size: usize,
}

impl ReportIndexer {
    /// Index events emitted by the ledger at `ledger`.
    pub fn new(chain: Arc<Chain>, ledger: Address) -> Self {
        Self {
            chain,
            ledger,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the indexer loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(indexer.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(ledger = %self.ledger, "Report indexer starting");

        loop {
            if shutdown.is_cancelled() {
                tracing::info!("Report indexer shutting down");
                return;
            }

            match self.index_step() {
                Ok(0) => {}
                Ok(indexed) => tracing::debug!(events = indexed, "Indexed ledger events"),
                Err(e) => tracing::warn!(error = %e, "Indexer step failed, will retry"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    tracing::info!("Report indexer shutting down");
                    return;
                }
            }
        }
    }

    /// Process every event past the checkpoint. Returns how many events
    /// were read.
    pub fn index_step(&self) -> Result<usize, IndexerError> {
        let db = self.chain.db();
        let mut total = 0;

        loop {
            let from = db.indexer_checkpoint()?;
            let batch = self.chain.events(from, self.batch_size)?;
            let Some(last) = batch.last().map(|record| record.seq) else {
                return Ok(total);
            };

            for record in batch.iter().filter(|record| record.address == self.ledger) {
                match record.event {
                    LedgerEvent::ReportSubmitted { report_id, owner } => {
                        db.index_owner(self.ledger, owner, report_id)?;
                    }
                    LedgerEvent::AccessGranted {
                        report_id, viewer, ..
                    } => {
                        db.index_viewer(self.ledger, viewer, report_id)?;
                    }
                    LedgerEvent::GaslessTransactionExecuted { .. } => {}
                }
            }

            db.set_indexer_checkpoint(last + 1)?;
            total += batch.len();
            if batch.len() < self.batch_size {
                return Ok(total);
            }
        }
    }

    /// Report ids owned by `owner`, ascending.
    pub fn reports_owned_by(&self, owner: Address) -> Result<Vec<u64>, IndexerError> {
        Ok(self.chain.db().reports_owned_by(self.ledger, owner)?)
    }

    /// Report ids `viewer` was granted, ascending.
    pub fn reports_viewable_by(&self, viewer: Address) -> Result<Vec<u64>, IndexerError> {
        Ok(self.chain.db().reports_granted_to(self.ledger, viewer)?)
    }
}
