// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway wire types.
//!
//! Every gateway response carries a `result` envelope:
//!
//! ```json
//! { "result": { "resultCode": "SUCCESS", "resultStatus": "S", "resultMessage": "success" } }
//! ```
//!
//! `resultStatus` is parsed into the closed [`ResultStatus`] variant so match
//! arms stay exhaustive; codes the gateway may add later land in
//! [`ResultStatus::Unrecognized`].

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::GatewayError;

pub const PRODUCT_CODE_ONLINE_PURCHASE: &str = "ONLINE_PURCHASE";
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "AUTHORIZATION_CODE";

pub const PAYMENT_REQUEST_PREFIX: &str = "PAY";
pub const REFUND_REQUEST_PREFIX: &str = "REFUND";

pub const RESULT_CODE_SUCCESS: &str = "SUCCESS";
pub const RESULT_CODE_REFUND_NOT_EXIST: &str = "REFUND_NOT_EXIST";
pub const RESULT_CODE_ORDER_NOT_EXIST: &str = "ORDER_NOT_EXIST";

/// Business outcome reported in `result.resultStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultStatus {
    /// `S`
    Success,
    /// `A`: accepted, completion happens out of band (e.g. user approval).
    Accepted,
    /// `U`: outcome not yet known; resolve by inquiry.
    Unknown,
    /// `F`
    Failed,
    Unrecognized(String),
}

impl ResultStatus {
    pub fn as_code(&self) -> &str {
        match self {
            ResultStatus::Success => "S",
            ResultStatus::Accepted => "A",
            ResultStatus::Unknown => "U",
            ResultStatus::Failed => "F",
            ResultStatus::Unrecognized(raw) => raw,
        }
    }
}

impl Default for ResultStatus {
    fn default() -> Self {
        ResultStatus::Unrecognized(String::new())
    }
}

impl From<String> for ResultStatus {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "S" => ResultStatus::Success,
            "A" => ResultStatus::Accepted,
            "U" => ResultStatus::Unknown,
            "F" => ResultStatus::Failed,
            _ => ResultStatus::Unrecognized(raw),
        }
    }
}

impl From<ResultStatus> for String {
    fn from(status: ResultStatus) -> Self {
        status.as_code().to_string()
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// The `result` object present on every gateway response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultEnvelope {
    pub result_code: String,
    pub result_status: ResultStatus,
    pub result_message: String,
}

impl ResultEnvelope {
    pub fn is_success(&self) -> bool {
        self.result_status == ResultStatus::Success
    }

    /// Turn anything other than `S` into [`GatewayError::Business`].
    pub fn ensure_success(&self) -> Result<(), GatewayError> {
        if self.is_success() {
            return Ok(());
        }
        Err(GatewayError::Business {
            code: self.result_code.clone(),
            status: self.result_status.clone(),
            message: self.result_message.clone(),
        })
    }
}

/// Money in minor units, e.g. `{"currency":"IQD","value":"1000"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Amount {
    pub currency: String,
    pub value: String,
}

impl Amount {
    pub fn new(currency: impl Into<String>, minor_units: u64) -> Self {
        Self {
            currency: currency.into(),
            value: minor_units.to_string(),
        }
    }
}

/// `{PREFIX}-{uuid}-{unix seconds}`; generated once per logical operation
/// and reused verbatim for every inquiry about it.
pub fn generate_request_id(prefix: &str) -> String {
    format!("{prefix}-{}-{}", Uuid::new_v4(), Utc::now().timestamp())
}

// ========== Authorization ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTokenRequest {
    pub grant_type: String,
    pub auth_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyTokenResponse {
    pub result: ResultEnvelope,
    pub access_token: String,
    pub access_token_expiry_time: Option<String>,
    pub refresh_token: Option<String>,
    pub refresh_token_expiry_time: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryUserInfoRequest {
    pub access_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InquiryUserInfoResponse {
    pub result: ResultEnvelope,
    pub user_info: Option<UserInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    pub user_id: String,
    pub user_name: Option<UserName>,
    pub avatar: Option<String>,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserName {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

// ========== Payments ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub product_code: String,
    pub payment_request_id: String,
    pub payment_amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_expiry_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_notify_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extend_info: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_description: String,
    pub buyer: OrderBuyer,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBuyer {
    pub reference_buyer_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentResponse {
    pub result: ResultEnvelope,
    pub payment_id: Option<String>,
    pub payment_request_id: Option<String>,
    pub payment_time: Option<String>,
    pub redirect_action_form: Option<RedirectActionForm>,
    pub extend_info: Option<String>,
}

impl PaymentResponse {
    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_action_form
            .as_ref()
            .map(|form| form.redirect_url.as_str())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedirectActionForm {
    pub redirect_url: String,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryPaymentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_request_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InquiryPaymentResponse {
    pub result: ResultEnvelope,
    pub payment_id: Option<String>,
    pub payment_request_id: Option<String>,
    pub payment_status: Option<String>,
    pub payment_time: Option<String>,
    pub payment_amount: Option<Amount>,
    pub payment_fail_reason: Option<String>,
    pub extend_info: Option<String>,
}

// ========== Refunds ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub refund_request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_request_id: Option<String>,
    pub refund_amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefundResponse {
    pub result: ResultEnvelope,
    pub refund_id: Option<String>,
    pub refund_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryRefundRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_request_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InquiryRefundResponse {
    pub result: ResultEnvelope,
    pub refund_id: Option<String>,
    pub refund_request_id: Option<String>,
    pub refund_amount: Option<Amount>,
    pub refund_time: Option<String>,
    pub refund_status: Option<String>,
    pub refund_fail_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn result_status_parses_known_and_unknown_codes() {
        assert_eq!(ResultStatus::from("S".to_string()), ResultStatus::Success);
        assert_eq!(ResultStatus::from("A".to_string()), ResultStatus::Accepted);
        assert_eq!(ResultStatus::from("U".to_string()), ResultStatus::Unknown);
        assert_eq!(ResultStatus::from("F".to_string()), ResultStatus::Failed);
        assert_eq!(
            ResultStatus::from("X".to_string()),
            ResultStatus::Unrecognized("X".to_string())
        );
    }

    #[test]
    fn envelope_deserializes_from_gateway_json() {
        let response: RefundResponse = serde_json::from_value(json!({
            "result": {
                "resultCode": "SUCCESS",
                "resultStatus": "S",
                "resultMessage": "success"
            },
            "refundId": "R1",
            "refundTime": "2024-01-01T00:00:00+00:00"
        }))
        .unwrap();

        assert!(response.result.is_success());
        assert_eq!(response.refund_id.as_deref(), Some("R1"));
        response.result.ensure_success().unwrap();
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let response: InquiryRefundResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.result.result_status, ResultStatus::default());
        assert!(response.refund_status.is_none());
    }

    #[test]
    fn ensure_success_reports_business_error() {
        let envelope = ResultEnvelope {
            result_code: "INVALID_CODE".to_string(),
            result_status: ResultStatus::Failed,
            result_message: "auth code expired".to_string(),
        };
        match envelope.ensure_success() {
            Err(GatewayError::Business { code, status, message }) => {
                assert_eq!(code, "INVALID_CODE");
                assert_eq!(status, ResultStatus::Failed);
                assert_eq!(message, "auth code expired");
            }
            other => panic!("expected business error, got {other:?}"),
        }
    }

    #[test]
    fn refund_request_serializes_camel_case_without_empty_fields() {
        let request = RefundRequest {
            refund_request_id: "REFUND-1".to_string(),
            payment_id: Some("P1".to_string()),
            payment_request_id: None,
            refund_amount: Amount::new("IQD", 1500),
            refund_reason: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "refundRequestId": "REFUND-1",
                "paymentId": "P1",
                "refundAmount": { "currency": "IQD", "value": "1500" }
            })
        );
    }

    #[test]
    fn payment_response_exposes_redirect_url() {
        let response: PaymentResponse = serde_json::from_value(json!({
            "result": { "resultCode": "ACCEPT", "resultStatus": "A", "resultMessage": "accept" },
            "paymentId": "P1",
            "redirectActionForm": { "redirectUrl": "https://pay.example.com/x" }
        }))
        .unwrap();
        assert_eq!(response.result.result_status, ResultStatus::Accepted);
        assert_eq!(response.redirect_url(), Some("https://pay.example.com/x"));

        let empty: PaymentResponse = serde_json::from_value(json!({
            "redirectActionForm": { "redirectUrl": "" }
        }))
        .unwrap();
        assert_eq!(empty.redirect_url(), None);
    }

    #[test]
    fn request_ids_follow_prefix_uuid_timestamp_layout() {
        let id = generate_request_id(REFUND_REQUEST_PREFIX);
        let rest = id.strip_prefix("REFUND-").unwrap();
        let (uuid_part, timestamp) = rest.rsplit_once('-').unwrap();
        assert!(Uuid::parse_str(uuid_part).is_ok());
        assert!(timestamp.parse::<i64>().unwrap() > 1_700_000_000);
        assert_ne!(id, generate_request_id(REFUND_REQUEST_PREFIX));
    }
}
