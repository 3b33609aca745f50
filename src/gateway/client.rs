// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the payment gateway.
//!
//! [`GatewayClient::send`] is the transport boundary: it posts one signed
//! request and hands back the raw response bytes. It never retries and never
//! inspects the business `result`; a non-2xx status or an I/O failure is a
//! [`GatewayError::Transport`]. A response that carries a `Signature` header
//! must verify against the gateway public key. The typed operations below it
//! only add (de)serialization.

use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{
    error::GatewayError,
    models::{
        ApplyTokenRequest, ApplyTokenResponse, InquiryPaymentRequest, InquiryPaymentResponse,
        InquiryRefundRequest, InquiryRefundResponse, InquiryUserInfoRequest,
        InquiryUserInfoResponse, PaymentRequest, PaymentResponse, RefundRequest, RefundResponse,
        GRANT_TYPE_AUTHORIZATION_CODE,
    },
    signing::{RequestSigner, SignedRequest},
};

pub const APPLY_TOKEN_PATH: &str = "/v1/authorizations/applyToken";
pub const INQUIRY_USER_INFO_PATH: &str = "/v1/users/inquiryUserInfo";
pub const PAY_PATH: &str = "/v1/payments/pay";
pub const INQUIRY_PAYMENT_PATH: &str = "/v1/payments/inquiryPayment";
pub const REFUND_PATH: &str = "/v1/payments/refund";
pub const INQUIRY_REFUND_PATH: &str = "/v1/payments/inquiryRefund";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
const CLIENT_ID_HEADER: &str = "Client-Id";
const REQUEST_TIME_HEADER: &str = "Request-Time";
const SIGNATURE_HEADER: &str = "Signature";
const RESPONSE_TIME_HEADER: &str = "Response-Time";

#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    signer: RequestSigner,
    http: Client,
}

impl GatewayClient {
    pub fn new(
        base_url: impl Into<String>,
        signer: RequestSigner,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signer,
            http,
        })
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    /// Serialize `payload` once, stamp the current time and sign it.
    pub fn prepare<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<SignedRequest, GatewayError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| GatewayError::InvalidResponse(format!("serialize body failed: {e}")))?;
        Ok(self.signer.sign_now(method, path, body)?)
    }

    /// Send a signed request and return the raw response body.
    pub async fn send(&self, request: &SignedRequest) -> Result<Vec<u8>, GatewayError> {
        let SignedRequest {
            method,
            path,
            request_time,
            body,
            signature_header,
        } = request;

        debug!(%method, %path, %request_time, "gateway request");

        let response = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(CLIENT_ID_HEADER, self.signer.client_id())
            .header(REQUEST_TIME_HEADER, request_time.as_str())
            .header(SIGNATURE_HEADER, signature_header.as_str())
            .body(body.clone())
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("{method} {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%method, %path, %status, "gateway returned non-success HTTP status");
            return Err(GatewayError::Transport(format!(
                "{method} {path} returned {status}: {body}"
            )));
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let response_signature = header(SIGNATURE_HEADER);
        let response_time = header(RESPONSE_TIME_HEADER);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(format!("{method} {path} body read failed: {e}")))?;

        if let Some(signature) = response_signature {
            self.signer
                .verify_response(
                    method.as_str(),
                    path,
                    response_time.as_deref(),
                    &bytes,
                    &signature,
                )
                .inspect_err(|e| warn!(%method, %path, error = %e, "gateway response signature rejected"))?;
        }

        debug!(%method, %path, %status, len = bytes.len(), "gateway response");
        Ok(bytes.to_vec())
    }

    /// Sign, send and parse one POST call.
    pub async fn post_json<T, R>(&self, path: &str, payload: &T) -> Result<R, GatewayError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let request = self.prepare(Method::POST, path, payload)?;
        let bytes = self.send(&request).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::InvalidResponse(format!("POST {path} invalid JSON: {e}")))
    }

    pub async fn apply_token(&self, auth_code: &str) -> Result<ApplyTokenResponse, GatewayError> {
        let request = ApplyTokenRequest {
            grant_type: GRANT_TYPE_AUTHORIZATION_CODE.to_string(),
            auth_code: auth_code.to_string(),
        };
        self.post_json(APPLY_TOKEN_PATH, &request).await
    }

    pub async fn inquiry_user_info(
        &self,
        access_token: &str,
    ) -> Result<InquiryUserInfoResponse, GatewayError> {
        let request = InquiryUserInfoRequest {
            access_token: access_token.to_string(),
        };
        self.post_json(INQUIRY_USER_INFO_PATH, &request).await
    }

    pub async fn pay(&self, request: &PaymentRequest) -> Result<PaymentResponse, GatewayError> {
        self.post_json(PAY_PATH, request).await
    }

    pub async fn inquiry_payment(
        &self,
        payment_request_id: &str,
    ) -> Result<InquiryPaymentResponse, GatewayError> {
        let request = InquiryPaymentRequest {
            payment_id: None,
            payment_request_id: Some(payment_request_id.to_string()),
        };
        self.inquire_payment(&request).await
    }

    /// Inquire by gateway `paymentId`, merchant `paymentRequestId`, or both.
    pub async fn inquire_payment(
        &self,
        request: &InquiryPaymentRequest,
    ) -> Result<InquiryPaymentResponse, GatewayError> {
        self.post_json(INQUIRY_PAYMENT_PATH, request).await
    }

    pub async fn refund(&self, request: &RefundRequest) -> Result<RefundResponse, GatewayError> {
        self.post_json(REFUND_PATH, request).await
    }

    pub async fn inquiry_refund(
        &self,
        refund_request_id: &str,
    ) -> Result<InquiryRefundResponse, GatewayError> {
        let request = InquiryRefundRequest {
            refund_id: None,
            refund_request_id: Some(refund_request_id.to_string()),
        };
        self.post_json(INQUIRY_REFUND_PATH, &request).await
    }
}
