//! HTTP handlers.
//!
//! The callback handler is a thin adapter: it hands method, query and raw body
//! to [`CallbackEndpoint`] and maps the [`CallbackResponse`] onto a status and
//! content type. All verification happens in the endpoint.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::autoreply::AutoReply;
use crate::crypto::{verify, AesKey, KeyRing, ScratchPool};
use crate::dispatch::MessageDispatcher;
use crate::endpoint::{CallbackEndpoint, CallbackQuery, CallbackResponse};
use crate::error::ProtocolError;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub endpoint: Arc<CallbackEndpoint>,
    pub keyring: Option<Arc<KeyRing>>,
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(endpoint: CallbackEndpoint, admin_token: Option<String>) -> Self {
        let keyring = endpoint.keyring().cloned();
        Self {
            endpoint: Arc::new(endpoint),
            keyring,
            admin_token: admin_token.map(Arc::from),
        }
    }

    /// Wire the endpoint from configuration with the default auto-reply table.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.endpoint_settings()?;
        let dispatcher = MessageDispatcher::new(AutoReply::from_config(config).table());

        let mut endpoint = CallbackEndpoint::new(settings, dispatcher)
            .with_invalid_request_handler(config.invalid_request_mode.handler())
            .with_scratch_pool(ScratchPool::new(config.scratch_pool_size));
        if let Some(keyring) = config.keyring()? {
            endpoint = endpoint.with_keyring(Arc::new(keyring));
        }

        Ok(Self::new(endpoint, config.admin_token.clone()))
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Platform Callback
// =============================================================================

/// Handshake (`GET`) and delivery (`POST`) endpoint.
///
/// A query string that does not deserialize is still answered through the
/// endpoint's invalid-request handler.
pub async fn callback(
    State(state): State<AppState>,
    method: Method,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            let error = ProtocolError::MalformedQuery(rejection.body_text());
            return into_response(state.endpoint.reject_request(error.into()));
        }
    };

    info!(
        method = %method,
        encrypt_type = query.encrypt_type.as_deref().unwrap_or("raw"),
        body_length = body.len(),
        "callback_received"
    );

    into_response(state.endpoint.handle_method(method.as_str(), &query, &body))
}

fn into_response(response: CallbackResponse) -> Response {
    match response {
        CallbackResponse::Echo(echo) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            echo,
        )
            .into_response(),
        CallbackResponse::Xml(xml) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
            xml,
        )
            .into_response(),
        CallbackResponse::Empty => StatusCode::OK.into_response(),
        CallbackResponse::Rejected => StatusCode::BAD_REQUEST.into_response(),
    }
}

// =============================================================================
// Key Rotation
// =============================================================================

/// Key rotation response.
#[derive(Serialize)]
pub struct RotateResponse {
    pub status: &'static str,
}

/// Rotate the key ring to the EncodingAESKey in the request body.
///
/// Requires `Authorization: Bearer <ADMIN_TOKEN>`. The old current key stays
/// usable as the previous generation.
pub async fn rotate_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let authorized = match (&state.admin_token, bearer_token(&headers)) {
        (Some(expected), Some(presented)) => verify(presented, expected),
        _ => false,
    };
    if !authorized {
        warn!("key_rotation_unauthorized");
        return (
            StatusCode::UNAUTHORIZED,
            Json(RotateResponse {
                status: "unauthorized",
            }),
        );
    }

    let keyring = match &state.keyring {
        Some(keyring) => keyring,
        None => {
            return (
                StatusCode::CONFLICT,
                Json(RotateResponse {
                    status: "secure_mode_disabled",
                }),
            )
        }
    };

    match AesKey::from_encoding_aes_key(body.trim()) {
        Ok(key) => {
            keyring.rotate(key);
            (StatusCode::OK, Json(RotateResponse { status: "rotated" }))
        }
        Err(e) => {
            warn!(error = %e, "key_rotation_invalid_key");
            (
                StatusCode::BAD_REQUEST,
                Json(RotateResponse {
                    status: "invalid_key",
                }),
            )
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
