// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{gateway::Amount, state::AppState};

pub mod auth;
pub mod health;
pub mod payment;
pub mod user;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/auth/apply-token", post(auth::apply_token))
        .route("/user/info", post(user::user_info))
        .route("/payment/create", post(payment::create_payment))
        .route("/payment/inquiry", post(payment::inquire_payment))
        .route("/payment/refund", post(payment::refund_payment));

    let routes = Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    routes
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::apply_token,
        user::user_info,
        payment::create_payment,
        payment::inquire_payment,
        payment::refund_payment,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            auth::ApplyTokenBody,
            auth::SessionTokenResponse,
            user::UserInfoBody,
            user::UserProfileResponse,
            payment::AmountInput,
            payment::CreatePaymentBody,
            payment::CreatePaymentResponse,
            payment::PaymentInquiryBody,
            payment::PaymentInquiryResponse,
            Amount,
            payment::RefundBody,
            payment::RefundResponseBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Authorization code exchange, session tokens and user profile"),
        (name = "Payments", description = "Payment creation and refunds"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::state::test_support::state_for;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(state_for("http://127.0.0.1:1"));
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/apply-token",
            "/api/user/info",
            "/api/payment/create",
            "/api/payment/inquiry",
            "/api/payment/refund",
            "/health",
            "/health/live",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = router(state_for("http://127.0.0.1:1"));
        let response = app
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
