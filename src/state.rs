// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    gateway::{GatewayClient, GatewayError, KeyMaterial, RequestSigner},
    session::SessionTokenCodec,
    settlement::SettlementPoller,
};

/// Merchant-side payment settings.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub public_base_url: String,
}

/// Everything a handler needs. All of it is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub gateway: GatewayClient,
    pub sessions: SessionTokenCodec,
    pub poller: SettlementPoller,
    pub payments: Arc<PaymentSettings>,
    /// Fired on shutdown; in-flight settlement polls stop when it fires.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        keys: Arc<KeyMaterial>,
        shutdown: CancellationToken,
    ) -> Result<Self, GatewayError> {
        let signer = RequestSigner::with_key_version(keys, config.key_version.clone());
        let gateway = GatewayClient::new(
            config.gateway_base_url.clone(),
            signer,
            config.gateway_timeout,
        )?;

        Ok(Self {
            gateway,
            sessions: SessionTokenCodec::new(Arc::new(config.session_key.clone())),
            poller: SettlementPoller::default(),
            payments: Arc::new(PaymentSettings {
                currency: config.currency.clone(),
                public_base_url: config.public_base_url.clone(),
            }),
            shutdown,
        })
    }
}
