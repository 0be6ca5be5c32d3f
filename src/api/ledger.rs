// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::parse_address;
use crate::{
    blockchain::EventRecord,
    error::ApiError,
    models::{
        EventListResponse, EventQuery, EventResponse, LedgerStatsResponse, OwnerReportsResponse,
    },
    state::AppState,
};

const DEFAULT_EVENT_LIMIT: usize = 50;
const MAX_EVENT_LIMIT: usize = 500;

#[utoipa::path(
    get,
    path = "/v1/ledger/stats",
    tag = "Ledger",
    responses((status = 200, body = LedgerStatsResponse))
)]
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<LedgerStatsResponse>, ApiError> {
    let ledger = state.deployment.ledger();
    Ok(Json(LedgerStatsResponse {
        ledger_address: ledger.address().to_string(),
        owner: ledger.owner_view(&state.chain)?.to_string(),
        gasless_proxy: ledger
            .gasless_proxy_view(&state.chain)?
            .map(|proxy| proxy.to_string()),
        total_report_count: ledger.total_report_count_view(&state.chain)?,
        block_number: state.chain.block_number()?,
    }))
}

/// Page through the public event log. Payloads never appear here.
#[utoipa::path(
    get,
    path = "/v1/ledger/events",
    params(EventQuery),
    tag = "Ledger",
    responses((status = 200, body = EventListResponse))
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Result<Json<EventListResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);

    let mut records = state.chain.events(query.from.unwrap_or(0), limit + 1)?;
    let next_seq = if records.len() > limit {
        records.truncate(limit);
        records.last().map(|record| record.seq + 1)
    } else {
        None
    };

    let events = records
        .into_iter()
        .map(event_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(EventListResponse { events, next_seq }))
}

fn event_response(record: EventRecord) -> Result<EventResponse, ApiError> {
    let mut encoded = serde_json::to_value(&record.event)
        .map_err(|e| ApiError::internal(format!("Failed to encode event: {e}")))?;
    let args = encoded
        .get_mut("args")
        .map(serde_json::Value::take)
        .unwrap_or_default();

    let log = record.event.to_log_data();

    Ok(EventResponse {
        seq: record.seq,
        block_number: record.block_number,
        tx_hash: record.tx_hash.to_string(),
        contract: record.address.to_string(),
        event: record.event.name().to_string(),
        args,
        topics: log.topics().iter().map(|topic| topic.to_string()).collect(),
        data: alloy::hex::encode_prefixed(&log.data),
    })
}

/// Reports an account owns or was granted, as of the last indexer pass.
#[utoipa::path(
    get,
    path = "/v1/ledger/owners/{owner}/reports",
    params(
        ("owner" = String, Path, description = "Account address")
    ),
    tag = "Ledger",
    responses(
        (status = 200, body = OwnerReportsResponse),
        (status = 400, body = crate::error::ErrorBody)
    )
)]
pub async fn owner_reports(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<OwnerReportsResponse>, ApiError> {
    let owner = parse_address(&owner, "owner")?;
    let index_failed = |e: crate::indexer::IndexerError| ApiError::internal(e.to_string());

    Ok(Json(OwnerReportsResponse {
        owner: owner.to_string(),
        owned: state.index.reports_owned_by(owner).map_err(index_failed)?,
        granted: state
            .index
            .reports_viewable_by(owner)
            .map_err(index_failed)?,
    }))
}
