// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::primitives::Address;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{ApiError, ErrorBody},
    models::{
        EventListResponse, EventResponse, LedgerStatsResponse, MessageHashRequest,
        MessageHashResponse, NonceResponse, OwnerReportsResponse, RelayStatusResponse,
        SubmitReportRequest, SubmitReportResponse,
    },
    state::AppState,
};

pub mod health;
pub mod ledger;
pub mod relay;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/relay/status", get(relay::get_status))
        .route("/relay/nonce/{user}", get(relay::get_nonce))
        .route("/relay/message-hash", post(relay::message_hash))
        .route("/relay/reports", post(relay::submit_report))
        .route("/ledger/stats", get(ledger::get_stats))
        .route("/ledger/events", get(ledger::list_events))
        .route("/ledger/owners/{owner}/reports", get(ledger::owner_reports))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Parse a hex account address from a path or body field.
pub(crate) fn parse_address(raw: &str, field: &str) -> Result<Address, ApiError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| ApiError::bad_request(format!("Invalid {field} address '{raw}': {e}")))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        relay::get_status,
        relay::get_nonce,
        relay::message_hash,
        relay::submit_report,
        ledger::get_stats,
        ledger::list_events,
        ledger::owner_reports
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            ErrorBody,
            RelayStatusResponse,
            NonceResponse,
            MessageHashRequest,
            MessageHashResponse,
            SubmitReportRequest,
            SubmitReportResponse,
            LedgerStatsResponse,
            EventResponse,
            EventListResponse,
            OwnerReportsResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Relay", description = "Signature-authorized gasless report submission"),
        (name = "Ledger", description = "Public ledger statistics and event history")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(test_state());
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn routes_map_errors_to_json_bodies() {
        use axum::body::{to_bytes, Body};
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let app = router(test_state());

        let live = app
            .clone()
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(live.status(), StatusCode::OK);

        let bad = app
            .oneshot(
                Request::builder()
                    .uri("/v1/relay/nonce/not-an-address")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(bad.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error_code, "bad_request");
    }

    #[test]
    fn openapi_lists_every_endpoint() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/v1/relay/status",
            "/v1/relay/nonce/{user}",
            "/v1/relay/message-hash",
            "/v1/relay/reports",
            "/v1/ledger/stats",
            "/v1/ledger/events",
            "/v1/ledger/owners/{owner}/reports",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn parse_address_accepts_hex_and_rejects_garbage() {
        let addr = parse_address(" 0x0000000000000000000000000000000000000001 ", "user").unwrap();
        assert_eq!(addr, Address::with_last_byte(1));
        assert!(parse_address("0x01", "user").is_err());
        assert!(parse_address("nope", "user").is_err());
    }
}
