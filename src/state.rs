// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::blockchain::Chain;
use crate::deployment::Deployment;
use crate::indexer::ReportIndexer;
use crate::relay::RelaySigner;

#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<Chain>,
    pub deployment: Arc<Deployment>,
    pub relay: Arc<RelaySigner>,
    /// Read side of the report index (the background task owns its own).
    pub index: Arc<ReportIndexer>,
}

impl AppState {
    pub fn new(chain: Arc<Chain>, deployment: Deployment, relay: RelaySigner) -> Self {
        let index = ReportIndexer::new(chain.clone(), deployment.ledger);
        Self {
            chain,
            deployment: Arc::new(deployment),
            relay: Arc::new(relay),
            index: Arc::new(index),
        }
    }
}
