// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request signing for gateway calls.
//!
//! Every outbound call is signed over the exact byte sequence
//!
//! ```text
//! <METHOD> <PATH>\n<clientId>.<requestTime>.<body>
//! ```
//!
//! with RSA PKCS#1 v1.5 over SHA-256. The base64 signature travels in the
//! `Signature` header as `algorithm=RSA256, keyVersion=<v>, signature=<b64>`.
//! PKCS#1 v1.5 is deterministic: identical inputs give identical signatures.
//!
//! Signed gateway responses use the same layout with the `Response-Time`
//! header in place of the request time, verified with the gateway public key.

use std::sync::Arc;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use reqwest::Method;
use ring::{
    rand::SystemRandom,
    signature::{UnparsedPublicKey, RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_SHA256},
};

use super::keys::KeyMaterial;

/// Algorithm name advertised in the `Signature` header.
pub const SIGNATURE_ALGORITHM: &str = "RSA256";

/// Default `keyVersion` advertised in the `Signature` header.
pub const DEFAULT_KEY_VERSION: &str = "1";

/// Format of the `Request-Time` header (ISO-8601 with numeric offset).
const REQUEST_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Signing and verification failures. Any of these aborts the call.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("RSA signing failed")]
    SigningFailed,

    #[error("signature is not valid base64")]
    MalformedSignature,

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("signed response is missing the {0} header")]
    MissingHeader(&'static str),
}

/// A request that has been stamped and signed, ready to send.
///
/// `body` holds the exact bytes that were signed; do not mutate it.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    pub path: String,
    pub request_time: String,
    pub body: String,
    pub signature_header: String,
}

/// Produces signatures with the merchant private key.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    keys: Arc<KeyMaterial>,
    key_version: String,
    rng: SystemRandom,
}

impl RequestSigner {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self::with_key_version(keys, DEFAULT_KEY_VERSION)
    }

    pub fn with_key_version(keys: Arc<KeyMaterial>, key_version: impl Into<String>) -> Self {
        Self {
            keys,
            key_version: key_version.into(),
            rng: SystemRandom::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        self.keys.client_id()
    }

    /// Sign `body` for `method path` at `request_time`.
    pub fn sign(
        &self,
        method: Method,
        path: &str,
        request_time: &str,
        body: String,
    ) -> Result<SignedRequest, SignatureError> {
        let content =
            canonical_content(method.as_str(), path, self.client_id(), request_time, &body);
        let signature = self.sign_content(content.as_bytes())?;

        Ok(SignedRequest {
            method,
            path: path.to_string(),
            request_time: request_time.to_string(),
            body,
            signature_header: self.signature_header(&signature),
        })
    }

    /// Sign `body` stamped with the current time.
    pub fn sign_now(
        &self,
        method: Method,
        path: &str,
        body: String,
    ) -> Result<SignedRequest, SignatureError> {
        self.sign(method, path, &format_request_time(Utc::now()), body)
    }

    /// Raw base64 signature over `content`.
    pub fn sign_content(&self, content: &[u8]) -> Result<String, SignatureError> {
        let key_pair = self.keys.signing_key();
        let mut signature = vec![0u8; key_pair.public().modulus_len()];
        key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, content, &mut signature)
            .map_err(|_| SignatureError::SigningFailed)?;
        Ok(Base64::encode_string(&signature))
    }

    pub fn signature_header(&self, signature_b64: &str) -> String {
        format!(
            "algorithm={SIGNATURE_ALGORITHM}, keyVersion={}, signature={signature_b64}",
            self.key_version
        )
    }

    /// Verify a gateway-produced signature with the gateway public key.
    pub fn verify(
        &self,
        method: &str,
        path: &str,
        client_id: &str,
        request_time: &str,
        body: &str,
        signature_b64: &str,
    ) -> Result<(), SignatureError> {
        let signature = Base64::decode_vec(signature_b64.trim())
            .map_err(|_| SignatureError::MalformedSignature)?;
        let content = canonical_content(method, path, client_id, request_time, body);

        UnparsedPublicKey::new(&RSA_PKCS1_2048_8192_SHA256, self.keys.verification_key())
            .verify(content.as_bytes(), &signature)
            .map_err(|_| SignatureError::VerificationFailed)
    }

    /// Verify a signed gateway response over its raw body bytes.
    pub fn verify_response(
        &self,
        method: &str,
        path: &str,
        response_time: Option<&str>,
        body: &[u8],
        signature_header: &str,
    ) -> Result<(), SignatureError> {
        let response_time =
            response_time.ok_or(SignatureError::MissingHeader("Response-Time"))?;
        let signature = parse_signature_header(signature_header)
            .ok_or(SignatureError::MalformedSignature)?;
        let body = std::str::from_utf8(body).map_err(|_| SignatureError::VerificationFailed)?;
        self.verify(method, path, self.client_id(), response_time, body, signature)
    }
}

/// The exact string that gets signed.
pub fn canonical_content(
    method: &str,
    path: &str,
    client_id: &str,
    request_time: &str,
    body: &str,
) -> String {
    format!("{method} {path}\n{client_id}.{request_time}.{body}")
}

pub fn format_request_time(time: DateTime<Utc>) -> String {
    time.format(REQUEST_TIME_FORMAT).to_string()
}

/// Pull the `signature=` value out of a `Signature` header.
pub fn parse_signature_header(header: &str) -> Option<&str> {
    header
        .split(',')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("signature="))
        .filter(|value| !value.is_empty())
}
