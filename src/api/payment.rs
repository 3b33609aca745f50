// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    gateway::{
        models::{
            generate_request_id, Amount, InquiryPaymentRequest, Order, OrderBuyer,
            PaymentRequest, RefundRequest, PAYMENT_REQUEST_PREFIX, PRODUCT_CODE_ONLINE_PURCHASE,
            REFUND_REQUEST_PREFIX, RESULT_CODE_REFUND_NOT_EXIST, RESULT_CODE_SUCCESS,
        },
        signing::format_request_time,
    },
    session::SessionClaims,
    settlement::{settle_payment, settle_refund, PollStatus, Settlement},
    state::AppState,
};

const PAYMENT_EXPIRY_MINUTES: i64 = 30;
const PAYMENT_RESULT_PAGE: &str = "/payment-success.html";
const ORDER_DESCRIPTION: &str = "Online purchase";
const REFUND_REASON: &str = "Customer requested refund from mini app";
const DEFAULT_PAYMENT_AMOUNT: &str = "1";

/// Amount in major currency units, as a JSON number or string.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    fn as_decimal(&self) -> String {
        match self {
            AmountInput::Number(value) => format!("{value}"),
            AmountInput::Text(value) => value.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentBody {
    /// Session token from `/api/auth/apply-token`.
    #[serde(default)]
    pub token: String,
    /// Defaults to 1 unit of the configured currency.
    pub amount: Option<AmountInput>,
    pub product_id: Option<String>,
    pub quantity: Option<u32>,
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub success: bool,
    /// `SUCCESS`, `PENDING`, `FAILED` or `NOT_FOUND`. A payment that is still
    /// unresolved after polling is `PENDING`.
    pub status: String,
    pub payment_request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    /// Checkout URL to hand to the wallet when user approval is needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    pub amount: String,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundBody {
    #[serde(default)]
    pub payment_id: String,
    pub amount: Option<AmountInput>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponseBody {
    pub success: bool,
    /// `SUCCESS`, `PENDING`, `FAILED` or `NOT_FOUND`.
    pub status: String,
    pub refund_request_id: String,
    pub result_status: String,
    pub result_code: String,
    pub result_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentInquiryBody {
    /// Gateway-assigned payment ID.
    pub payment_id: Option<String>,
    /// Merchant request ID returned by `/api/payment/create`.
    pub payment_request_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInquiryResponse {
    pub success: bool,
    pub payment_id: Option<String>,
    pub payment_request_id: Option<String>,
    /// Gateway payment status, e.g. `SUCCESS`, `PROCESSING`, `FAIL`.
    pub payment_status: Option<String>,
    pub payment_time: Option<String>,
    pub payment_amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_fail_reason: Option<String>,
    /// Raw `extendInfo` JSON string attached at creation.
    pub extend_info: Option<String>,
}

/// Create a payment for the session's user.
#[utoipa::path(
    post,
    path = "/api/payment/create",
    tag = "Payments",
    request_body = CreatePaymentBody,
    responses(
        (status = 200, description = "Payment submitted", body = CreatePaymentResponse),
        (status = 400, description = "Invalid amount"),
        (status = 401, description = "Invalid session token"),
        (status = 502, description = "Gateway unavailable"),
        (status = 503, description = "Shutting down")
    )
)]
pub async fn create_payment(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<Json<CreatePaymentResponse>, ApiError> {
    if body.token.trim().is_empty() {
        return Err(ApiError::unauthorized("token is required"));
    }
    let claims = state.sessions.decode(&body.token)?;

    let currency = state.payments.currency.clone();
    let amount = body
        .amount
        .as_ref()
        .map(AmountInput::as_decimal)
        .unwrap_or_else(|| DEFAULT_PAYMENT_AMOUNT.to_string());
    let minor_units = parse_amount_to_minor(&amount, minor_unit_exponent(&currency))?;

    let request = build_payment_request(&state, &claims, &body, Amount::new(&currency, minor_units));
    info!(
        user_id = %claims.user_id,
        payment_request_id = %request.payment_request_id,
        minor_units,
        "creating payment"
    );

    let settlement = settle_payment(&state.gateway, &state.poller, &request, &state.shutdown).await?;
    Ok(Json(payment_response(settlement, amount, currency)))
}

/// Refund (part of) a payment and resolve the outcome.
///
/// An indeterminate refund is polled for up to a minute; if it is still
/// unresolved the response says `PENDING`.
#[utoipa::path(
    post,
    path = "/api/payment/refund",
    tag = "Payments",
    request_body = RefundBody,
    responses(
        (status = 200, description = "Refund outcome", body = RefundResponseBody),
        (status = 400, description = "Invalid payment ID or amount"),
        (status = 502, description = "Gateway unavailable"),
        (status = 503, description = "Shutting down")
    )
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    Json(body): Json<RefundBody>,
) -> Result<Json<RefundResponseBody>, ApiError> {
    let payment_id = body.payment_id.trim();
    if payment_id.is_empty() {
        return Err(ApiError::bad_request("paymentId is required"));
    }
    let amount = body
        .amount
        .as_ref()
        .map(AmountInput::as_decimal)
        .ok_or_else(|| ApiError::bad_request("Refund amount must be greater than 0"))?;

    let currency = &state.payments.currency;
    let minor_units = parse_amount_to_minor(&amount, minor_unit_exponent(currency))?;

    let request = RefundRequest {
        refund_request_id: generate_request_id(REFUND_REQUEST_PREFIX),
        payment_id: Some(payment_id.to_string()),
        payment_request_id: None,
        refund_amount: Amount::new(currency.as_str(), minor_units),
        refund_reason: Some(REFUND_REASON.to_string()),
    };
    info!(
        payment_id,
        refund_request_id = %request.refund_request_id,
        minor_units,
        "processing refund"
    );

    let settlement = settle_refund(&state.gateway, &state.poller, &request, &state.shutdown).await?;
    Ok(Json(refund_response(settlement)))
}

/// Look up a payment by gateway ID or merchant request ID.
#[utoipa::path(
    post,
    path = "/api/payment/inquiry",
    tag = "Payments",
    request_body = PaymentInquiryBody,
    responses(
        (status = 200, description = "Current payment state", body = PaymentInquiryResponse),
        (status = 400, description = "No identifier given or inquiry rejected"),
        (status = 502, description = "Gateway unavailable")
    )
)]
pub async fn inquire_payment(
    State(state): State<AppState>,
    Json(body): Json<PaymentInquiryBody>,
) -> Result<Json<PaymentInquiryResponse>, ApiError> {
    let non_empty = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let request = InquiryPaymentRequest {
        payment_id: non_empty(body.payment_id),
        payment_request_id: non_empty(body.payment_request_id),
    };
    if request.payment_id.is_none() && request.payment_request_id.is_none() {
        return Err(ApiError::bad_request(
            "Either paymentId or paymentRequestId is required",
        ));
    }

    let response = state.gateway.inquire_payment(&request).await?;
    response.result.ensure_success()?;

    info!(
        payment_id = ?response.payment_id,
        payment_request_id = ?response.payment_request_id,
        payment_status = ?response.payment_status,
        "payment inquiry"
    );
    if let Some(extend_info) = response.extend_info.as_deref() {
        log_extend_info(extend_info);
    }

    Ok(Json(PaymentInquiryResponse {
        success: true,
        payment_id: response.payment_id,
        payment_request_id: response.payment_request_id,
        payment_status: response.payment_status,
        payment_time: response.payment_time,
        payment_amount: response.payment_amount,
        payment_fail_reason: response.payment_fail_reason,
        extend_info: response.extend_info,
    }))
}

/// Order tracking fields stored in `extendInfo` at creation.
fn log_extend_info(extend_info: &str) {
    match serde_json::from_str::<Value>(extend_info) {
        Ok(data) => info!(
            product_id = ?data.get("productId").and_then(serde_json::Value::as_str),
            quantity = ?data.get("quantity").and_then(serde_json::Value::as_u64),
            order_id = ?data.get("orderId").and_then(serde_json::Value::as_str),
            "payment extendInfo"
        ),
        Err(e) => warn!(error = %e, extend_info, "extendInfo is not JSON"),
    }
}

fn build_payment_request(
    state: &AppState,
    claims: &SessionClaims,
    body: &CreatePaymentBody,
    amount: Amount,
) -> PaymentRequest {
    let payment_request_id = generate_request_id(PAYMENT_REQUEST_PREFIX);
    let now = Utc::now();

    let mut extend_info = json!({
        "paymentRequestId": payment_request_id,
        "userId": claims.user_id,
        "timestamp": now.timestamp(),
    });
    if let Some(product_id) = &body.product_id {
        extend_info["productId"] = json!(product_id);
    }
    if let Some(quantity) = body.quantity {
        extend_info["quantity"] = json!(quantity);
    }
    if let Some(order_id) = &body.order_id {
        extend_info["orderId"] = json!(order_id);
    }

    PaymentRequest {
        product_code: PRODUCT_CODE_ONLINE_PURCHASE.to_string(),
        payment_request_id,
        payment_amount: amount,
        order: Some(Order {
            order_description: ORDER_DESCRIPTION.to_string(),
            buyer: OrderBuyer {
                reference_buyer_id: claims.user_id.clone(),
            },
        }),
        payment_expiry_time: Some(format_request_time(
            now + TimeDelta::minutes(PAYMENT_EXPIRY_MINUTES),
        )),
        payment_notify_url: None,
        payment_redirect_url: Some(format!(
            "{}{PAYMENT_RESULT_PAGE}",
            state.payments.public_base_url
        )),
        extend_info: Some(extend_info.to_string()),
    }
}

fn payment_response(settlement: Settlement, amount: String, currency: String) -> CreatePaymentResponse {
    let (success, message) = match &settlement.status {
        PollStatus::Success { .. } => (true, None),
        PollStatus::Pending if settlement.redirect_url.is_some() => (true, None),
        PollStatus::Pending => {
            warn!(payment_request_id = %settlement.request_id, "no redirect URL in payment response");
            (
                false,
                Some("No redirect URL received from payment API".to_string()),
            )
        }
        PollStatus::TimedOut => (
            false,
            Some("Payment is being processed. Status is unknown.".to_string()),
        ),
        PollStatus::Failed { reason } => (false, reason.clone()),
        PollStatus::NotFound => (false, Some("Payment not found".to_string())),
    };

    let status = match &settlement.status {
        PollStatus::TimedOut => PollStatus::Pending.as_str(),
        other => other.as_str(),
    };
    let payment_id = match settlement.status {
        PollStatus::Success { settlement_id, .. } => settlement.payment_id.or(settlement_id),
        _ => settlement.payment_id,
    };

    CreatePaymentResponse {
        success,
        status: status.to_string(),
        payment_request_id: settlement.request_id,
        payment_id,
        payment_url: settlement.redirect_url,
        amount,
        currency,
        message,
    }
}

fn refund_response(settlement: Settlement) -> RefundResponseBody {
    let initial = settlement.result;
    let polled = settlement.attempts > 0;
    let pending_message = "Refund is being processed. Status is unknown.".to_string();

    let (success, status, result_status, result_code, result_message, message) =
        match settlement.status {
            PollStatus::Success { .. } if polled => (
                true,
                "SUCCESS",
                "S".to_string(),
                RESULT_CODE_SUCCESS.to_string(),
                "Success".to_string(),
                None,
            ),
            PollStatus::Success { .. } => (
                true,
                "SUCCESS",
                initial.result_status.to_string(),
                initial.result_code,
                initial.result_message,
                None,
            ),
            PollStatus::Failed { ref reason } if polled => {
                let reason = reason.clone().unwrap_or_default();
                (
                    false,
                    "FAILED",
                    "F".to_string(),
                    "REFUND_FAILED".to_string(),
                    reason.clone(),
                    Some(reason),
                )
            }
            PollStatus::Failed { .. } => (
                false,
                "FAILED",
                initial.result_status.to_string(),
                initial.result_code,
                initial.result_message.clone(),
                Some(initial.result_message),
            ),
            PollStatus::NotFound => (
                false,
                "NOT_FOUND",
                "F".to_string(),
                RESULT_CODE_REFUND_NOT_EXIST.to_string(),
                "Refund not found in wallet system".to_string(),
                Some("Refund not found in wallet system".to_string()),
            ),
            PollStatus::Pending | PollStatus::TimedOut => (
                false,
                "PENDING",
                initial.result_status.to_string(),
                initial.result_code,
                initial.result_message,
                Some(pending_message),
            ),
        };

    let (refund_id, refund_time) = match settlement.status {
        PollStatus::Success {
            settlement_id,
            settled_at,
        } => (settlement_id, settled_at),
        _ => (None, None),
    };

    RefundResponseBody {
        success,
        status: status.to_string(),
        refund_request_id: settlement.request_id,
        result_status,
        result_code,
        result_message,
        refund_id,
        refund_time,
        message,
    }
}

/// Decimal exponent of a currency's minor unit (ISO 4217).
pub fn minor_unit_exponent(currency: &str) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
        "CLP" | "ISK" | "JPY" | "KRW" | "UGX" | "VND" | "XAF" | "XOF" => 0,
        _ => 2,
    }
}

/// Parse a positive decimal amount into minor units.
fn parse_amount_to_minor(amount: &str, exponent: u32) -> Result<u64, ApiError> {
    let invalid = || ApiError::bad_request("amount must be a valid positive number");

    let trimmed = amount.trim();
    let (whole_part, fraction_part) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    if whole_part.is_empty() || !whole_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if !fraction_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction_part.len() > exponent as usize {
        return Err(ApiError::bad_request(format!(
            "amount must have at most {exponent} decimal places"
        )));
    }

    let too_large = || ApiError::bad_request("amount is too large");
    let scale = 10u64.pow(exponent);
    let whole = whole_part.parse::<u64>().map_err(|_| too_large())?;
    let fraction = if fraction_part.is_empty() {
        0
    } else {
        let padded = format!("{fraction_part:0<width$}", width = exponent as usize);
        padded.parse::<u64>().map_err(|_| invalid())?
    };

    let minor = whole
        .checked_mul(scale)
        .and_then(|value| value.checked_add(fraction))
        .ok_or_else(too_large)?;
    if minor == 0 {
        return Err(ApiError::bad_request("amount must be greater than 0"));
    }
    Ok(minor)
}
