// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment Gateway Bridge - backend for a wallet mini app
//!
//! This crate sits between a mini-app frontend and an Alipay+-style payment
//! gateway. It signs every outbound gateway call with the merchant RSA key,
//! keeps the gateway access token server-side inside encrypted session
//! tokens, and resolves indeterminate refunds and payments by bounded polling.
//!
//! ## Modules
//!
//! - `gateway` - Keys, request signing, wire models and the HTTP client
//! - `session` - Encrypted session tokens (AES-256-GCM JWE)
//! - `settlement` - Bounded, cancellable settlement polling
//! - `api` - HTTP API handlers (Axum)

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod settlement;
pub mod state;
