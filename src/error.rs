// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::ChainError;
use crate::contracts::ContractError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

/// JSON error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ErrorBody {
    /// Human-readable reason (contract revert reason where applicable)
    pub error: String,
    /// Stable machine-readable code
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        let status = match err {
            ContractError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ContractError::NotFound { .. } => StatusCode::NOT_FOUND,
            ContractError::InvalidSignature => StatusCode::UNAUTHORIZED,
            ContractError::NonceMismatch { .. } => StatusCode::CONFLICT,
            ContractError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, err.error_code(), err.to_string())
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Revert(revert) => revert.into(),
            ChainError::InsufficientFunds { .. } => {
                Self::new(StatusCode::PAYMENT_REQUIRED, "insufficient_funds", err.to_string())
            }
            ChainError::Abi(_) => Self::new(StatusCode::BAD_REQUEST, "abi_error", err.to_string()),
            ChainError::NoContract(_) | ChainError::WrongContract { .. } => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "configuration_error", err.to_string())
            }
            ChainError::SenderMismatch(_) | ChainError::Signing(_) | ChainError::State(_) => {
                tracing::error!(error = %err, "chain failure");
                Self::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}
