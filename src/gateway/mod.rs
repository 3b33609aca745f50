// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment gateway integration.
//!
//! This module provides:
//! - Key material loading (merchant private key, gateway public key)
//! - RSA-SHA256 request signing and verification
//! - The signed HTTP client and its wire models

pub mod client;
pub mod error;
pub mod keys;
pub mod models;
pub mod signing;

pub use client::GatewayClient;
pub use error::GatewayError;
pub use keys::{KeyError, KeyMaterial};
pub use models::*;
pub use signing::{RequestSigner, SignatureError, SignedRequest};
