// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// State database reachability.
    pub state_db: String,
    /// Ledger, proxy and relay signer still reference each other.
    pub deployment: String,
    /// Relay signer holds a key and is the proxy's registered executor.
    pub relay: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn check(ok: bool, failure: &str) -> String {
    if ok { "ok" } else { failure }.to_string()
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let db_ok = state.chain.block_number().is_ok();

    let deployment_ok = match state.deployment.verify(&state.chain) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "deployment check failed");
            false
        }
    };

    let relay_ok = state.relay.is_ready(&state.chain).unwrap_or(false);

    let all_ok = db_ok && deployment_ok && relay_ok;
    let response = ReadyResponse {
        status: check(all_ok, "degraded"),
        checks: HealthChecks {
            service: "ok".to_string(),
            state_db: check(db_ok, "unavailable"),
            deployment: check(deployment_ok, "misconfigured"),
            relay: check(relay_ok, "unavailable"),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 only when relay submissions would be accepted.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::test_signer;
    use crate::relay::RelaySigner;
    use crate::state::test_support::{test_state, DEPLOYER};

    #[tokio::test]
    async fn fresh_deployment_is_ready() {
        let (status, Json(body)) = readiness(State(test_state())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.relay, "ok");
    }

    #[tokio::test]
    async fn keyless_relay_is_degraded() {
        let mut state = test_state();
        state.relay = std::sync::Arc::new(RelaySigner::new(state.deployment.proxy(), None));

        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.deployment, "ok");
        assert_eq!(body.checks.relay, "unavailable");
    }

    #[tokio::test]
    async fn rotated_signer_breaks_the_deployment_check() {
        let state = test_state();
        state
            .deployment
            .proxy()
            .update_gasless_signer_tx(&state.chain, &test_signer(DEPLOYER), test_signer(3).address())
            .unwrap();

        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.checks.deployment, "misconfigured");
        assert_eq!(body.checks.relay, "unavailable");
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
    }
}
