// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway error taxonomy.

use super::{models::ResultStatus, signing::SignatureError};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request could not be signed, or a signed response failed
    /// verification against the gateway key.
    #[error("gateway request signing failed: {0}")]
    Signature(#[from] SignatureError),

    /// Connection failure or non-2xx HTTP status.
    #[error("gateway request failed: {0}")]
    Transport(String),

    /// The gateway answered but the body was not the expected JSON.
    #[error("gateway response was invalid: {0}")]
    InvalidResponse(String),

    /// The gateway explicitly rejected the operation.
    #[error("gateway rejected request ({code}): {message}")]
    Business {
        code: String,
        status: ResultStatus,
        message: String,
    },
}

impl GatewayError {
    /// Transient failures worth another attempt inside a bounded poll.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transport(_) | GatewayError::InvalidResponse(_))
    }
}
