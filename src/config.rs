// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Loaded once at startup from the process environment (a `.env` file is
//! read first when present). Values are trimmed; empty counts as unset.
//! Any error here is fatal to startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `GATEWAY_BASE_URL` | Payment gateway base URL | Required |
//! | `GATEWAY_CLIENT_ID` | Merchant client ID (`Client-Id` header) | Required |
//! | `GATEWAY_PRIVATE_KEY_PATH` | Merchant RSA private key (PEM) | Required |
//! | `GATEWAY_PUBLIC_KEY_PATH` | Gateway RSA public key (PEM) | Required |
//! | `GATEWAY_KEY_VERSION` | `keyVersion` in the `Signature` header | `1` |
//! | `GATEWAY_TIMEOUT_SECS` | Per-call HTTP timeout | `25` |
//! | `SESSION_TOKEN_KEY` | 32 raw bytes or base64 of 32 bytes | Required |
//! | `PAYMENT_CURRENCY` | ISO 4217 currency for payments and refunds | `IQD` |
//! | `PUBLIC_BASE_URL` | Base URL of the payment result page | `http://localhost:8080` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{path::PathBuf, sync::Arc, time::Duration};

use url::Url;

use crate::{
    gateway::{keys::KeyError, signing::DEFAULT_KEY_VERSION, KeyMaterial},
    session::SessionKey,
};

pub const GATEWAY_BASE_URL_ENV: &str = "GATEWAY_BASE_URL";
pub const GATEWAY_CLIENT_ID_ENV: &str = "GATEWAY_CLIENT_ID";
pub const GATEWAY_PRIVATE_KEY_PATH_ENV: &str = "GATEWAY_PRIVATE_KEY_PATH";
pub const GATEWAY_PUBLIC_KEY_PATH_ENV: &str = "GATEWAY_PUBLIC_KEY_PATH";
pub const GATEWAY_KEY_VERSION_ENV: &str = "GATEWAY_KEY_VERSION";
pub const GATEWAY_TIMEOUT_SECS_ENV: &str = "GATEWAY_TIMEOUT_SECS";

/// Session token key. There is no built-in fallback: a guessable default
/// key would let anyone mint session tokens.
pub const SESSION_TOKEN_KEY_ENV: &str = "SESSION_TOKEN_KEY";

pub const PAYMENT_CURRENCY_ENV: &str = "PAYMENT_CURRENCY";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for log format selection.
///
/// - `json`: Structured JSON logs (recommended for production)
/// - `pretty`: Human-readable colored output (default)
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_TIMEOUT_SECS: u64 = 25;
const DEFAULT_CURRENCY: &str = "IQD";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("unusable key material: {0}")]
    Keys(#[from] KeyError),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway_base_url: String,
    pub client_id: String,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub key_version: String,
    pub gateway_timeout: Duration,
    pub session_key: SessionKey,
    pub currency: String,
    pub public_base_url: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let gateway_base_url = parse_http_url(
            GATEWAY_BASE_URL_ENV,
            &env.required(GATEWAY_BASE_URL_ENV)?,
        )?;
        let public_base_url = parse_http_url(
            PUBLIC_BASE_URL_ENV,
            &env.or_default(PUBLIC_BASE_URL_ENV, DEFAULT_PUBLIC_BASE_URL),
        )?;

        let session_key = SessionKey::parse(&env.required(SESSION_TOKEN_KEY_ENV)?).map_err(|e| {
            ConfigError::Invalid {
                name: SESSION_TOKEN_KEY_ENV,
                reason: e.to_string(),
            }
        })?;

        let timeout_secs = env.parsed(GATEWAY_TIMEOUT_SECS_ENV, DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: GATEWAY_TIMEOUT_SECS_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let currency = env
            .or_default(PAYMENT_CURRENCY_ENV, DEFAULT_CURRENCY)
            .to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid {
                name: PAYMENT_CURRENCY_ENV,
                reason: format!("`{currency}` is not an ISO 4217 code"),
            });
        }

        Ok(Self {
            gateway_base_url,
            client_id: env.required(GATEWAY_CLIENT_ID_ENV)?,
            private_key_path: env.required(GATEWAY_PRIVATE_KEY_PATH_ENV)?.into(),
            public_key_path: env.required(GATEWAY_PUBLIC_KEY_PATH_ENV)?.into(),
            key_version: env.or_default(GATEWAY_KEY_VERSION_ENV, DEFAULT_KEY_VERSION),
            gateway_timeout: Duration::from_secs(timeout_secs),
            session_key,
            currency,
            public_base_url,
            host: env.or_default(HOST_ENV, DEFAULT_HOST),
            port: env.parsed(PORT_ENV, DEFAULT_PORT)?,
        })
    }

    /// Load the merchant and gateway keys named by this configuration.
    pub fn load_key_material(&self) -> Result<Arc<KeyMaterial>, ConfigError> {
        let keys = KeyMaterial::load(
            self.client_id.clone(),
            &self.private_key_path,
            &self.public_key_path,
        )?;
        Ok(Arc::new(keys))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

fn parse_http_url(name: &'static str, raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}
