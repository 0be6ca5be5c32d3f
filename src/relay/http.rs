// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the relay service.
//!
//! Lets a wallet that only holds its own key submit reports through a
//! remote relay operator: fetch the nonce, fetch the digest, sign locally,
//! post the signature.

use std::time::Duration;

use alloy::primitives::Address;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::blockchain::{MessageSigner, SigningError};
use crate::error::ErrorBody;
use crate::models::{
    MessageHashRequest, MessageHashResponse, NonceResponse, RelayStatusResponse,
    SubmitReportRequest, SubmitReportResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("relay request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The relay answered with an error body.
    #[error("relay returned {status} ({error_code}): {error}")]
    Api {
        status: StatusCode,
        error: String,
        error_code: String,
    },

    #[error("relay response was invalid: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

#[derive(Debug, Clone)]
pub struct RelayHttpClient {
    base_url: String,
    http: Client,
}

impl RelayHttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub async fn status(&self) -> Result<RelayStatusResponse, ClientError> {
        self.get_json("/v1/relay/status").await
    }

    pub async fn nonce(&self, user: Address) -> Result<u64, ClientError> {
        let response: NonceResponse = self.get_json(&format!("/v1/relay/nonce/{user}")).await?;
        Ok(response.nonce)
    }

    pub async fn message_hash(
        &self,
        user: Address,
        payload: &str,
        nonce: u64,
    ) -> Result<[u8; 32], ClientError> {
        let request = MessageHashRequest {
            user: user.to_string(),
            payload: payload.to_string(),
            nonce,
        };
        let response: MessageHashResponse =
            self.post_json("/v1/relay/message-hash", &request).await?;

        let bytes = alloy::hex::decode(&response.message_hash)
            .map_err(|e| ClientError::InvalidResponse(format!("message_hash: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| ClientError::InvalidResponse("message_hash is not 32 bytes".into()))
    }

    /// Post an already signed submission. `nonce` is the nonce the
    /// signature covers; `None` lets the relay use the current one.
    pub async fn submit(
        &self,
        user: Address,
        payload: &str,
        nonce: Option<u64>,
        signature: &[u8],
    ) -> Result<SubmitReportResponse, ClientError> {
        let request = SubmitReportRequest {
            user: user.to_string(),
            payload: payload.to_string(),
            signature: format!("0x{}", alloy::hex::encode(signature)),
            nonce,
        };
        self.post_json("/v1/relay/reports", &request).await
    }

    /// Full relay flow for `user`: nonce, digest, local signature, submit.
    pub async fn submit_signed(
        &self,
        user: &dyn MessageSigner,
        payload: &str,
    ) -> Result<SubmitReportResponse, ClientError> {
        let address = user.address();
        let nonce = self.nonce(address).await?;
        let digest = self.message_hash(address, payload, nonce).await?;
        let signature = user.sign_message(&digest)?;
        self.submit(address, payload, Some(nonce), &signature.as_bytes())
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorBody>(&body) {
                Ok(err) => ClientError::Api {
                    status,
                    error: err.error,
                    error_code: err.error_code,
                },
                Err(_) => ClientError::Api {
                    status,
                    error: body,
                    error_code: "unknown".to_string(),
                },
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::test_signer;
    use crate::state::test_support::test_state;
    use crate::state::AppState;

    async fn serve(state: AppState) -> RelayHttpClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, crate::api::router(state)).await.unwrap();
        });
        RelayHttpClient::new(format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn relays_a_report_over_http() {
        let state = test_state();
        let client = serve(state.clone()).await;
        let alice = test_signer(10);

        let status = client.status().await.unwrap();
        assert!(status.available);
        assert_eq!(status.chain_id, state.chain.chain_id());

        let submitted = client.submit_signed(&alice, "over the wire").await.unwrap();
        assert_eq!(submitted.report_id, 0);
        assert_eq!(client.nonce(alice.address()).await.unwrap(), 1);

        let payload = state
            .deployment
            .ledger()
            .report_payload_call(&state.chain, &alice, 0)
            .unwrap();
        assert_eq!(payload, "over the wire");
    }

    #[tokio::test]
    async fn surfaces_error_bodies() {
        let client = serve(test_state()).await;
        let alice = test_signer(10);

        let digest = client.message_hash(alice.address(), "x", 5).await.unwrap();
        let signature = MessageSigner::sign_message(&alice, &digest).unwrap();
        match client.submit(alice.address(), "x", None, &signature.as_bytes()).await {
            Err(ClientError::Api {
                status, error_code, ..
            }) => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(error_code, "invalid_signature");
            }
            other => panic!("expected an API error, got {other:?}"),
        }

        match client
            .submit(alice.address(), "x", Some(5), &signature.as_bytes())
            .await
        {
            Err(ClientError::Api {
                status, error_code, ..
            }) => {
                assert_eq!(status, StatusCode::CONFLICT);
                assert_eq!(error_code, "nonce_mismatch");
            }
            other => panic!("expected an API error, got {other:?}"),
        }
    }
}
