// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::{
    gateway::{GatewayError, SignatureError},
    session::TokenError,
    settlement::SettlementError,
};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encryption => {
                error!(error = %err, "session token encryption failed");
                Self::internal("failed to issue session token")
            }
            other => {
                warn!(error = %other, "rejected session token");
                Self::unauthorized("invalid session token")
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::Signature(SignatureError::SigningFailed) => {
                error!(error = %err, "gateway request signing failed");
                Self::internal("failed to sign gateway request")
            }
            GatewayError::Signature(_) => {
                error!(error = %err, "gateway response failed verification");
                Self::bad_gateway("payment gateway response could not be verified")
            }
            GatewayError::Transport(_) | GatewayError::InvalidResponse(_) => {
                warn!(error = %err, "gateway unavailable");
                Self::bad_gateway("payment gateway unavailable")
            }
            GatewayError::Business { message, .. } => Self::bad_request(message.clone()),
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::Gateway(inner) => inner.into(),
            SettlementError::Cancelled => Self::unavailable("service is shutting down"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
