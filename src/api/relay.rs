// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::primitives::U256;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::parse_address;
use crate::{
    error::ApiError,
    models::{
        MessageHashRequest, MessageHashResponse, NonceResponse, RelayStatusResponse,
        SubmitReportRequest, SubmitReportResponse,
    },
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/relay/status",
    tag = "Relay",
    responses((status = 200, body = RelayStatusResponse))
)]
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<RelayStatusResponse>, ApiError> {
    let network = state.chain.network();
    let available = state.relay.is_ready(&state.chain)?;

    Ok(Json(RelayStatusResponse {
        network: network.name.to_string(),
        chain_id: network.chain_id,
        ledger_address: state.deployment.ledger.to_string(),
        proxy_address: state.deployment.proxy.to_string(),
        signer_address: state.relay.signer_address().to_string(),
        can_sign: state.relay.can_sign(),
        available,
        fee_estimate_wei: U256::ZERO.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/relay/nonce/{user}",
    params(
        ("user" = String, Path, description = "Address of the report submitter")
    ),
    tag = "Relay",
    responses(
        (status = 200, body = NonceResponse),
        (status = 400, body = crate::error::ErrorBody)
    )
)]
pub async fn get_nonce(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<NonceResponse>, ApiError> {
    let user = parse_address(&user, "user")?;
    let nonce = state.deployment.proxy().nonce_view(&state.chain, user)?;
    Ok(Json(NonceResponse {
        user: user.to_string(),
        nonce,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/relay/message-hash",
    request_body = MessageHashRequest,
    tag = "Relay",
    responses(
        (status = 200, body = MessageHashResponse),
        (status = 400, body = crate::error::ErrorBody)
    )
)]
pub async fn message_hash(
    State(state): State<AppState>,
    Json(request): Json<MessageHashRequest>,
) -> Result<Json<MessageHashResponse>, ApiError> {
    let user = parse_address(&request.user, "user")?;
    let digest = state.deployment.proxy().message_hash_view(
        &state.chain,
        user,
        &request.payload,
        request.nonce,
    )?;
    Ok(Json(MessageHashResponse {
        message_hash: digest.to_string(),
    }))
}

/// Execute a user-signed submission with the relay identity.
#[utoipa::path(
    post,
    path = "/v1/relay/reports",
    request_body = SubmitReportRequest,
    tag = "Relay",
    responses(
        (status = 201, body = SubmitReportResponse),
        (status = 400, description = "Malformed request", body = crate::error::ErrorBody),
        (status = 401, description = "Signature does not match the user", body = crate::error::ErrorBody),
        (status = 402, description = "Relay identity cannot pay the fee", body = crate::error::ErrorBody),
        (status = 409, description = "Signed nonce is stale or in the future", body = crate::error::ErrorBody),
        (status = 503, description = "Relay not configured", body = crate::error::ErrorBody)
    )
)]
pub async fn submit_report(
    State(state): State<AppState>,
    Json(request): Json<SubmitReportRequest>,
) -> Result<(StatusCode, Json<SubmitReportResponse>), ApiError> {
    let user = parse_address(&request.user, "user")?;
    let signature = alloy::hex::decode(request.signature.trim())
        .map_err(|e| ApiError::bad_request(format!("Invalid signature encoding: {e}")))?;

    let relay_state = state.clone();
    let payload = request.payload;
    let nonce = request.nonce;
    let executed = tokio::task::spawn_blocking(move || {
        let AppState { chain, relay, .. } = relay_state;
        match nonce {
            Some(nonce) => {
                relay.execute_report_submission_at(&chain, user, &payload, nonce, &signature)
            }
            None => relay.sign_and_execute_report_submission(&chain, user, &payload, &signature),
        }
    })
    .await
    .map_err(|e| ApiError::internal(format!("Relay task failed: {e}")))??;

    let receipt = executed.receipt;
    Ok((
        StatusCode::CREATED,
        Json(SubmitReportResponse {
            report_id: executed.value,
            user: user.to_string(),
            tx_hash: receipt.tx_hash.to_string(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            fee_paid_wei: receipt.fee_paid.to_string(),
            explorer_url: state.chain.network().explorer_tx_url(receipt.tx_hash),
        }),
    ))
}
