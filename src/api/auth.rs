// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    gateway::{models::RESULT_CODE_SUCCESS, GatewayError},
    session::SessionClaims,
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyTokenBody {
    /// One-time authorization code obtained by the mini app.
    #[serde(default)]
    pub auth_code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionTokenResponse {
    /// Opaque session token to present on later calls.
    pub token: String,
}

/// Exchange an authorization code for a session token.
///
/// The gateway access token stays inside the encrypted session token.
#[utoipa::path(
    post,
    path = "/api/auth/apply-token",
    tag = "Auth",
    request_body = ApplyTokenBody,
    responses(
        (status = 200, description = "Session issued", body = SessionTokenResponse),
        (status = 400, description = "Missing or rejected auth code"),
        (status = 502, description = "Gateway unavailable")
    )
)]
pub async fn apply_token(
    State(state): State<AppState>,
    Json(body): Json<ApplyTokenBody>,
) -> Result<Json<SessionTokenResponse>, ApiError> {
    let auth_code = body.auth_code.trim();
    if auth_code.is_empty() {
        return Err(ApiError::bad_request("auth_code is required"));
    }

    let token_response = state.gateway.apply_token(auth_code).await?;
    let result = &token_response.result;
    if result.result_code != RESULT_CODE_SUCCESS {
        return Err(ApiError::bad_request(format!(
            "Invalid token response: {}",
            result.result_message
        )));
    }
    if token_response.access_token.trim().is_empty() {
        return Err(GatewayError::InvalidResponse(
            "applyToken response did not include accessToken".to_string(),
        )
        .into());
    }

    let user_info = state
        .gateway
        .inquiry_user_info(&token_response.access_token)
        .await?;
    user_info.result.ensure_success()?;
    let user_id = user_info
        .user_info
        .map(|info| info.user_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            ApiError::from(GatewayError::InvalidResponse(
                "inquiryUserInfo response did not include userId".to_string(),
            ))
        })?;

    info!(user_id = %user_id, "issuing session token");

    let token = state
        .sessions
        .encode(&SessionClaims::new(user_id, token_response.access_token))?;

    Ok(Json(SessionTokenResponse { token }))
}
