// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Settlement Poller
//!
//! Resolves refunds and payments whose initial gateway call came back
//! indeterminate (`resultStatus = "U"`).
//!
//! ## Strategy
//!
//! Up to `max_attempts` inquiries (default 12), `interval` apart (default
//! 5 s, no backoff), all keyed by the request ID of the original call. Each
//! inquiry is interpreted into an [`Observation`]:
//!
//! | Observation | Effect |
//! |-------------|--------|
//! | `Settled` | stop, `SUCCESS` |
//! | `Rejected` | stop, `FAILED` with reason |
//! | `NotFound` | stop, `NOT_FOUND` |
//! | `Processing` / `Unrecognized` | keep polling |
//! | transport error | attempt consumed, keep polling |
//!
//! Running out of attempts yields `TIMED_OUT`, which callers surface as
//! "still pending", never as a failure.
//!
//! ## Cancellation
//!
//! Every inquiry and every wait races the caller's
//! `tokio_util::sync::CancellationToken`; firing it ends the poll with
//! [`SettlementError::Cancelled`]. Dropping the future also stops it.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::{
    models::{
        InquiryPaymentResponse, InquiryRefundResponse, PaymentRequest, RefundRequest,
        ResultEnvelope, ResultStatus, RESULT_CODE_ORDER_NOT_EXIST, RESULT_CODE_REFUND_NOT_EXIST,
    },
    GatewayClient, GatewayError,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 12;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("settlement polling was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Where a settlement stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Success {
        settlement_id: Option<String>,
        settled_at: Option<String>,
    },
    Failed {
        reason: Option<String>,
    },
    NotFound,
    TimedOut,
}

impl PollStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Pending => "PENDING",
            PollStatus::Success { .. } => "SUCCESS",
            PollStatus::Failed { .. } => "FAILED",
            PollStatus::NotFound => "NOT_FOUND",
            PollStatus::TimedOut => "TIMED_OUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    pub request_id: String,
    /// Number of inquiries issued, `1..=max_attempts`.
    pub attempt: u32,
    pub status: PollStatus,
}

/// What a single inquiry said about the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Settled {
        id: Option<String>,
        time: Option<String>,
    },
    Rejected {
        reason: Option<String>,
    },
    NotFound,
    Processing,
    Unrecognized(String),
}

impl Observation {
    fn into_status(self) -> PollStatus {
        match self {
            Observation::Settled { id, time } => PollStatus::Success {
                settlement_id: id,
                settled_at: time,
            },
            Observation::Rejected { reason } => PollStatus::Failed { reason },
            Observation::NotFound => PollStatus::NotFound,
            Observation::Processing | Observation::Unrecognized(_) => PollStatus::Pending,
        }
    }
}

/// One inquiry against the gateway for an in-flight operation.
#[async_trait]
pub trait SettlementSource: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn inquire(&self, request_id: &str) -> Result<Observation, GatewayError>;
}

pub struct RefundInquiry<'a> {
    client: &'a GatewayClient,
}

impl<'a> RefundInquiry<'a> {
    pub fn new(client: &'a GatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SettlementSource for RefundInquiry<'_> {
    fn kind(&self) -> &'static str {
        "refund"
    }

    async fn inquire(&self, request_id: &str) -> Result<Observation, GatewayError> {
        let response = self.client.inquiry_refund(request_id).await?;
        Ok(interpret_refund_inquiry(&response))
    }
}

pub struct PaymentInquiry<'a> {
    client: &'a GatewayClient,
}

impl<'a> PaymentInquiry<'a> {
    pub fn new(client: &'a GatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SettlementSource for PaymentInquiry<'_> {
    fn kind(&self) -> &'static str {
        "payment"
    }

    async fn inquire(&self, request_id: &str) -> Result<Observation, GatewayError> {
        let response = self.client.inquiry_payment(request_id).await?;
        Ok(interpret_payment_inquiry(&response))
    }
}

pub fn interpret_refund_inquiry(response: &InquiryRefundResponse) -> Observation {
    let result = &response.result;
    match result.result_status {
        ResultStatus::Success => match response.refund_status.as_deref().map(str::trim) {
            Some("SUCCESS") => Observation::Settled {
                id: response.refund_id.clone(),
                time: response.refund_time.clone(),
            },
            Some("FAIL") => Observation::Rejected {
                reason: response.refund_fail_reason.clone(),
            },
            Some("PROCESSING") => Observation::Processing,
            other => Observation::Unrecognized(other.unwrap_or_default().to_string()),
        },
        ResultStatus::Failed if result.result_code == RESULT_CODE_REFUND_NOT_EXIST => {
            Observation::NotFound
        }
        _ => Observation::Unrecognized(result.result_code.clone()),
    }
}

pub fn interpret_payment_inquiry(response: &InquiryPaymentResponse) -> Observation {
    let result = &response.result;
    match result.result_status {
        ResultStatus::Success => match response.payment_status.as_deref().map(str::trim) {
            Some("SUCCESS") => Observation::Settled {
                id: response.payment_id.clone(),
                time: response.payment_time.clone(),
            },
            Some("FAIL") | Some("CANCELLED") => Observation::Rejected {
                reason: response
                    .payment_fail_reason
                    .clone()
                    .or_else(|| response.payment_status.clone()),
            },
            Some("PROCESSING") => Observation::Processing,
            other => Observation::Unrecognized(other.unwrap_or_default().to_string()),
        },
        ResultStatus::Failed if result.result_code == RESULT_CODE_ORDER_NOT_EXIST => {
            Observation::NotFound
        }
        _ => Observation::Unrecognized(result.result_code.clone()),
    }
}

/// Drives bounded inquiry loops.
#[derive(Debug, Clone, Default)]
pub struct SettlementPoller {
    policy: PollPolicy,
}

impl SettlementPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy: PollPolicy {
                max_attempts: policy.max_attempts.max(1),
                interval: policy.interval,
            },
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Poll `source` for `request_id` until a terminal status.
    pub async fn poll<S>(
        &self,
        source: &S,
        request_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PollState, SettlementError>
    where
        S: SettlementSource + ?Sized,
    {
        let max_attempts = self.policy.max_attempts;
        let kind = source.kind();

        for attempt in 1..=max_attempts {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(kind, request_id, attempt)),
                outcome = source.inquire(request_id) => outcome,
            };

            let status = match outcome {
                Ok(observation) => {
                    if let Observation::Unrecognized(code) = &observation {
                        warn!(kind, request_id, attempt, code = %code, "unrecognized settlement status, treating as pending");
                    }
                    observation.into_status()
                }
                Err(e) if e.is_transient() => {
                    warn!(kind, request_id, attempt, error = %e, "settlement inquiry failed");
                    PollStatus::Pending
                }
                Err(e) => return Err(e.into()),
            };

            debug!(kind, request_id, attempt, status = status.as_str(), "settlement inquiry");

            if status.is_terminal() {
                info!(kind, request_id, attempt, status = status.as_str(), "settlement resolved");
                return Ok(PollState {
                    request_id: request_id.to_string(),
                    attempt,
                    status,
                });
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled(kind, request_id, attempt)),
                    _ = tokio::time::sleep(self.policy.interval) => {},
                }
            }
        }

        warn!(kind, request_id, attempts = max_attempts, "settlement still pending after all attempts");
        Ok(PollState {
            request_id: request_id.to_string(),
            attempt: max_attempts,
            status: PollStatus::TimedOut,
        })
    }
}

fn cancelled(kind: &str, request_id: &str, attempt: u32) -> SettlementError {
    info!(kind, request_id, attempt, "settlement polling cancelled");
    SettlementError::Cancelled
}

/// Outcome of a refund or payment flow.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub request_id: String,
    /// `result` of the initial call.
    pub result: ResultEnvelope,
    pub status: PollStatus,
    /// Inquiries issued; 0 when the initial call was conclusive.
    pub attempts: u32,
    pub payment_id: Option<String>,
    pub redirect_url: Option<String>,
}

/// Submit a refund and resolve its outcome.
///
/// `S` and `F` are conclusive, `U` is polled, anything else (including `A`)
/// is reported pending without polling.
pub async fn settle_refund(
    client: &GatewayClient,
    poller: &SettlementPoller,
    request: &RefundRequest,
    cancel: &CancellationToken,
) -> Result<Settlement, SettlementError> {
    let request_id = request.refund_request_id.as_str();
    let response = client.refund(request).await?;
    let result = response.result;

    info!(
        request_id,
        result_status = %result.result_status,
        result_code = %result.result_code,
        "refund submitted"
    );

    let (status, attempts) = match result.result_status {
        ResultStatus::Success => (
            PollStatus::Success {
                settlement_id: response.refund_id,
                settled_at: response.refund_time,
            },
            0,
        ),
        ResultStatus::Failed => (
            PollStatus::Failed {
                reason: Some(result.result_message.clone()),
            },
            0,
        ),
        ResultStatus::Unknown => {
            let state = poller
                .poll(&RefundInquiry::new(client), request_id, cancel)
                .await?;
            (state.status, state.attempt)
        }
        ResultStatus::Accepted | ResultStatus::Unrecognized(_) => (PollStatus::Pending, 0),
    };

    Ok(Settlement {
        request_id: request_id.to_string(),
        result,
        status,
        attempts,
        payment_id: request.payment_id.clone(),
        redirect_url: None,
    })
}

/// Submit a payment and resolve its outcome.
///
/// `A` means the user still has to approve; the redirect URL is returned
/// with a pending status. `U` is polled through `inquiryPayment`.
pub async fn settle_payment(
    client: &GatewayClient,
    poller: &SettlementPoller,
    request: &PaymentRequest,
    cancel: &CancellationToken,
) -> Result<Settlement, SettlementError> {
    let request_id = request.payment_request_id.as_str();
    let response = client.pay(request).await?;
    let redirect_url = response.redirect_url().map(str::to_string);
    let result = response.result;

    info!(
        request_id,
        result_status = %result.result_status,
        result_code = %result.result_code,
        "payment submitted"
    );

    let (status, attempts) = match result.result_status {
        ResultStatus::Accepted => (PollStatus::Pending, 0),
        ResultStatus::Success => (
            PollStatus::Success {
                settlement_id: response.payment_id.clone(),
                settled_at: response.payment_time,
            },
            0,
        ),
        ResultStatus::Failed => (
            PollStatus::Failed {
                reason: Some(result.result_message.clone()),
            },
            0,
        ),
        ResultStatus::Unknown => {
            let state = poller
                .poll(&PaymentInquiry::new(client), request_id, cancel)
                .await?;
            (state.status, state.attempt)
        }
        ResultStatus::Unrecognized(_) => (PollStatus::Pending, 0),
    };

    Ok(Settlement {
        request_id: request_id.to_string(),
        result,
        status,
        attempts,
        payment_id: response.payment_id,
        redirect_url,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicU32, Ordering},
            Mutex,
        },
    };

    use serde_json::{json, Value};
    use tokio::time::Instant;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::gateway::{
        client::{test_support::client_for, INQUIRY_REFUND_PATH, PAY_PATH, REFUND_PATH},
        models::{generate_request_id, Amount, REFUND_REQUEST_PREFIX},
        signing::SignatureError,
    };

    /// Replays scripted inquiry responses; repeats the last one when drained.
    struct ScriptedRefunds {
        script: Mutex<VecDeque<Result<Value, GatewayError>>>,
        last: Value,
        calls: AtomicU32,
        seen_ids: Mutex<Vec<String>>,
    }

    impl ScriptedRefunds {
        fn new(script: Vec<Result<Value, GatewayError>>, last: Value) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last,
                calls: AtomicU32::new(0),
                seen_ids: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SettlementSource for ScriptedRefunds {
        fn kind(&self) -> &'static str {
            "refund"
        }

        async fn inquire(&self, request_id: &str) -> Result<Observation, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_ids.lock().unwrap().push(request_id.to_string());
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(self.last.clone()));
            let response: InquiryRefundResponse = serde_json::from_value(next?).unwrap();
            Ok(interpret_refund_inquiry(&response))
        }
    }

    fn processing() -> Value {
        json!({
            "result": { "resultCode": "SUCCESS", "resultStatus": "S", "resultMessage": "success" },
            "refundStatus": "PROCESSING"
        })
    }

    fn refunded(refund_id: &str) -> Value {
        json!({
            "result": { "resultCode": "SUCCESS", "resultStatus": "S", "resultMessage": "success" },
            "refundId": refund_id,
            "refundTime": "2024-01-01T00:00:05+00:00",
            "refundStatus": "SUCCESS"
        })
    }

    fn not_exist() -> Value {
        json!({
            "result": {
                "resultCode": "REFUND_NOT_EXIST",
                "resultStatus": "F",
                "resultMessage": "refund does not exist"
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn processing_then_success_resolves_on_fourth_attempt() {
        let source = ScriptedRefunds::new(
            vec![Ok(processing()), Ok(processing()), Ok(processing())],
            refunded("R1"),
        );
        let started = Instant::now();

        let state = SettlementPoller::default()
            .poll(&source, "REFUND-x-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.attempt, 4);
        assert_eq!(
            state.status,
            PollStatus::Success {
                settlement_id: Some("R1".to_string()),
                settled_at: Some("2024-01-01T00:00:05+00:00".to_string()),
            }
        );
        assert_eq!(source.calls(), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn always_processing_times_out_after_twelve_attempts() {
        let source = ScriptedRefunds::new(vec![], processing());
        let started = Instant::now();

        let state = SettlementPoller::default()
            .poll(&source, "REFUND-x-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.status, PollStatus::TimedOut);
        assert_eq!(state.attempt, 12);
        assert_eq!(source.calls(), 12);
        // No wait after the final attempt.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(55) && elapsed < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn refund_not_exist_stops_immediately() {
        let source = ScriptedRefunds::new(vec![], not_exist());

        let state = SettlementPoller::default()
            .poll(&source, "REFUND-x-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.status, PollStatus::NotFound);
        assert_eq!(state.attempt, 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refund_failure_carries_reason() {
        let source = ScriptedRefunds::new(
            vec![Ok(processing())],
            json!({
                "result": { "resultCode": "SUCCESS", "resultStatus": "S", "resultMessage": "success" },
                "refundStatus": "FAIL",
                "refundFailReason": "INSUFFICIENT_MERCHANT_BALANCE"
            }),
        );

        let state = SettlementPoller::default()
            .poll(&source, "REFUND-x-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.attempt, 2);
        assert_eq!(
            state.status,
            PollStatus::Failed {
                reason: Some("INSUFFICIENT_MERCHANT_BALANCE".to_string())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_consume_attempts_without_aborting() {
        let source = ScriptedRefunds::new(
            vec![
                Err(GatewayError::Transport("connection reset".to_string())),
                Err(GatewayError::InvalidResponse("truncated body".to_string())),
            ],
            refunded("R2"),
        );

        let state = SettlementPoller::default()
            .poll(&source, "REFUND-x-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.attempt, 3);
        assert!(matches!(state.status, PollStatus::Success { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_on_every_attempt_time_out() {
        let source = ScriptedRefunds::new(
            (0..12)
                .map(|_| Err(GatewayError::Transport("unreachable".to_string())))
                .collect(),
            processing(),
        );

        let state = SettlementPoller::default()
            .poll(&source, "REFUND-x-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.status, PollStatus::TimedOut);
        assert_eq!(source.calls(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn signing_errors_abort_polling() {
        let source = ScriptedRefunds::new(
            vec![Err(GatewayError::Signature(SignatureError::SigningFailed))],
            processing(),
        );

        let result = SettlementPoller::default()
            .poll(&source, "REFUND-x-1", &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(SettlementError::Gateway(GatewayError::Signature(_)))
        ));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_codes_are_treated_as_pending() {
        let source = ScriptedRefunds::new(
            vec![
                Ok(json!({
                    "result": { "resultCode": "SYSTEM_BUSY", "resultStatus": "F", "resultMessage": "busy" }
                })),
                Ok(json!({
                    "result": { "resultCode": "SUCCESS", "resultStatus": "S", "resultMessage": "success" },
                    "refundStatus": "SOMETHING_NEW"
                })),
                Ok(json!({
                    "result": { "resultCode": "UNKNOWN_EXCEPTION", "resultStatus": "U", "resultMessage": "?" }
                })),
            ],
            refunded("R3"),
        );

        let state = SettlementPoller::default()
            .poll(&source, "REFUND-x-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.attempt, 4);
        assert!(matches!(state.status, PollStatus::Success { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn request_id_is_reused_for_every_attempt() {
        let source = ScriptedRefunds::new(vec![Ok(processing()), Ok(processing())], refunded("R1"));
        let request_id = generate_request_id(REFUND_REQUEST_PREFIX);

        SettlementPoller::default()
            .poll(&source, &request_id, &CancellationToken::new())
            .await
            .unwrap();

        let seen = source.seen_ids.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|id| id == &request_id));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_wait_stops_polling() {
        let source = ScriptedRefunds::new(vec![], processing());
        let cancel = CancellationToken::new();
        let poller = SettlementPoller::default();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let result = poller.poll(&source, "REFUND-x-1", &cancel).await;
        assert!(matches!(result, Err(SettlementError::Cancelled)));
        // Attempts at t=0, 5, 10; cancelled while waiting for t=15.
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_issues_no_inquiry() {
        let source = ScriptedRefunds::new(vec![], processing());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = SettlementPoller::default()
            .poll(&source, "REFUND-x-1", &cancel)
            .await;

        assert!(matches!(result, Err(SettlementError::Cancelled)));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_policy_is_respected() {
        let source = ScriptedRefunds::new(vec![], processing());
        let poller = SettlementPoller::new(PollPolicy {
            max_attempts: 3,
            interval: Duration::from_secs(1),
        });

        let state = poller
            .poll(&source, "REFUND-x-1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.status, PollStatus::TimedOut);
        assert_eq!(state.attempt, 3);
    }

    #[test]
    fn zero_attempt_policy_still_polls_once() {
        let poller = SettlementPoller::new(PollPolicy {
            max_attempts: 0,
            interval: Duration::ZERO,
        });
        assert_eq!(poller.policy().max_attempts, 1);
    }

    #[test]
    fn payment_inquiry_interpretation() {
        let parse = |value: Value| -> InquiryPaymentResponse { serde_json::from_value(value).unwrap() };
        let ok = json!({ "resultCode": "SUCCESS", "resultStatus": "S", "resultMessage": "success" });

        assert_eq!(
            interpret_payment_inquiry(&parse(json!({
                "result": ok, "paymentId": "P1", "paymentStatus": "SUCCESS", "paymentTime": "t"
            }))),
            Observation::Settled {
                id: Some("P1".to_string()),
                time: Some("t".to_string())
            }
        );
        assert_eq!(
            interpret_payment_inquiry(&parse(json!({ "result": ok, "paymentStatus": "CANCELLED" }))),
            Observation::Rejected {
                reason: Some("CANCELLED".to_string())
            }
        );
        assert_eq!(
            interpret_payment_inquiry(&parse(json!({ "result": ok, "paymentStatus": "PROCESSING" }))),
            Observation::Processing
        );
        assert_eq!(
            interpret_payment_inquiry(&parse(json!({
                "result": { "resultCode": "ORDER_NOT_EXIST", "resultStatus": "F", "resultMessage": "" }
            }))),
            Observation::NotFound
        );
    }

    fn refund_request() -> RefundRequest {
        RefundRequest {
            refund_request_id: "REFUND-flow-1".to_string(),
            payment_id: Some("P1".to_string()),
            payment_request_id: None,
            refund_amount: Amount::new("IQD", 1000),
            refund_reason: None,
        }
    }

    fn fast_poller() -> SettlementPoller {
        SettlementPoller::new(PollPolicy {
            max_attempts: 4,
            interval: Duration::from_millis(10),
        })
    }

    #[tokio::test]
    async fn settle_refund_polls_after_unknown_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFUND_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "resultCode": "UNKNOWN_EXCEPTION", "resultStatus": "U", "resultMessage": "unknown" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(INQUIRY_REFUND_PATH))
            .and(body_json(json!({ "refundRequestId": "REFUND-flow-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(processing()))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(INQUIRY_REFUND_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(refunded("R1")))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let settlement = settle_refund(
            &client,
            &fast_poller(),
            &refund_request(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(settlement.attempts, 3);
        assert_eq!(settlement.result.result_status, ResultStatus::Unknown);
        assert!(matches!(
            settlement.status,
            PollStatus::Success { settlement_id: Some(ref id), .. } if id == "R1"
        ));
    }

    #[tokio::test]
    async fn settle_refund_reports_immediate_outcomes_without_polling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFUND_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "resultCode": "REFUND_AMOUNT_EXCEED", "resultStatus": "F", "resultMessage": "too much" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(INQUIRY_REFUND_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(processing()))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let settlement = settle_refund(
            &client,
            &fast_poller(),
            &refund_request(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(settlement.attempts, 0);
        assert_eq!(
            settlement.status,
            PollStatus::Failed {
                reason: Some("too much".to_string())
            }
        );
    }

    #[tokio::test]
    async fn settle_refund_surfaces_initial_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFUND_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let result = settle_refund(
            &client,
            &fast_poller(),
            &refund_request(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(SettlementError::Gateway(GatewayError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn settle_payment_returns_redirect_when_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PAY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "resultCode": "ACCEPT", "resultStatus": "A", "resultMessage": "accept" },
                "paymentId": "P9",
                "paymentRequestId": "PAY-1",
                "redirectActionForm": { "redirectUrl": "https://pay.example.com/checkout" }
            })))
            .mount(&server)
            .await;

        let request = PaymentRequest {
            product_code: crate::gateway::models::PRODUCT_CODE_ONLINE_PURCHASE.to_string(),
            payment_request_id: "PAY-1".to_string(),
            payment_amount: Amount::new("IQD", 1000),
            order: None,
            payment_expiry_time: None,
            payment_notify_url: None,
            payment_redirect_url: None,
            extend_info: None,
        };

        let client = client_for(&server.uri());
        let settlement = settle_payment(&client, &fast_poller(), &request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(settlement.status, PollStatus::Pending);
        assert_eq!(settlement.payment_id.as_deref(), Some("P9"));
        assert_eq!(
            settlement.redirect_url.as_deref(),
            Some("https://pay.example.com/checkout")
        );
    }
}
