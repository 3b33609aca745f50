// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    gateway::{models::RESULT_CODE_SUCCESS, GatewayError},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserInfoBody {
    /// Session token from `/api/auth/apply-token`.
    #[serde(default)]
    pub token: String,
}

/// Profile of the wallet user behind a session.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
}

/// Fetch the session user's profile with the access token sealed in the session.
#[utoipa::path(
    post,
    path = "/api/user/info",
    tag = "Auth",
    request_body = UserInfoBody,
    responses(
        (status = 200, description = "User profile", body = UserProfileResponse),
        (status = 400, description = "Missing token or inquiry rejected"),
        (status = 401, description = "Invalid session token"),
        (status = 502, description = "Gateway unavailable")
    )
)]
pub async fn user_info(
    State(state): State<AppState>,
    Json(body): Json<UserInfoBody>,
) -> Result<Json<UserProfileResponse>, ApiError> {
    let token = body.token.trim();
    if token.is_empty() {
        return Err(ApiError::bad_request("Token is required"));
    }
    let claims = state.sessions.decode(token)?;

    let response = state.gateway.inquiry_user_info(&claims.access_token).await?;
    let result = &response.result;
    if result.result_code != RESULT_CODE_SUCCESS {
        warn!(
            user_id = %claims.user_id,
            result_code = %result.result_code,
            "user info inquiry rejected"
        );
        return Err(ApiError::bad_request(format!(
            "Failed to retrieve user info: {}",
            result.result_message
        )));
    }

    let user = response.user_info.ok_or_else(|| {
        ApiError::from(GatewayError::InvalidResponse(
            "inquiryUserInfo response did not include userInfo".to_string(),
        ))
    })?;
    info!(user_id = %user.user_id, "user info retrieved");

    let name = user.user_name.unwrap_or_default();
    Ok(Json(UserProfileResponse {
        user_id: user.user_id,
        full_name: name.full_name,
        first_name: name.first_name,
        last_name: name.last_name,
        avatar: user.avatar,
        nationality: user.nationality,
    }))
}
