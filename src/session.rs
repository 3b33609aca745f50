// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Tokens
//!
//! The client never sees the gateway access token. After authorization the
//! server wraps `{user_id, access_token}` in an AES-256-GCM JWE (`alg=dir`,
//! `enc=A256GCM`) and hands out the standard-base64 encoding of it:
//!
//! ```text
//! base64( b64u(header) "." "" "." b64u(iv) "." b64u(ciphertext) "." b64u(tag) )
//! ```
//!
//! The protected header is the additional authenticated data. Decoding also
//! accepts the flattened JSON serialization
//! (`{"protected","iv","ciphertext","tag"}`) inside the base64 wrapper.
//!
//! Decoding fails closed: any malformed layer, a failed tag check or
//! unparseable claims is a [`TokenError`], never partial claims.

use std::{fmt, sync::Arc};

use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use ring::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN},
    rand::{SecureRandom, SystemRandom},
};
use serde::{Deserialize, Serialize};

/// Session key length in bytes (AES-256).
pub const SESSION_KEY_LEN: usize = 32;

const TAG_LEN: usize = 16;
const JWE_ALG_DIRECT: &str = "dir";
const JWE_ENC_A256GCM: &str = "A256GCM";
const PROTECTED_HEADER: &str = r#"{"alg":"dir","enc":"A256GCM"}"#;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Base64 wrapper or JWE envelope is malformed.
    #[error("malformed session token: {0}")]
    Format(String),

    /// Authentication tag did not verify (wrong key or tampered token).
    #[error("session token could not be decrypted")]
    Decryption,

    /// Decrypted payload is not a valid claims record.
    #[error("invalid session claims: {0}")]
    Claims(String),

    #[error("session token encryption failed")]
    Encryption,
}

/// Claims carried inside a session token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: String,
    pub access_token: String,
}

impl SessionClaims {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }

    fn validate(&self) -> Result<(), TokenError> {
        if self.user_id.trim().is_empty() {
            return Err(TokenError::Claims("user_id is empty".to_string()));
        }
        if self.access_token.trim().is_empty() {
            return Err(TokenError::Claims("access_token is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for SessionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClaims")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// 256-bit symmetric key for session tokens.
#[derive(Clone)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Accept either exactly 32 raw bytes or standard base64 of 32 bytes.
    pub fn parse(value: &str) -> Result<Self, TokenError> {
        if let Ok(raw) = <[u8; SESSION_KEY_LEN]>::try_from(value.as_bytes()) {
            return Ok(Self(raw));
        }

        let decoded = Base64::decode_vec(value.trim()).map_err(|_| {
            TokenError::Format(format!(
                "session key must be {SESSION_KEY_LEN} raw bytes or base64 of {SESSION_KEY_LEN} bytes"
            ))
        })?;
        <[u8; SESSION_KEY_LEN]>::try_from(decoded.as_slice())
            .map(Self)
            .map_err(|_| {
                TokenError::Format(format!(
                    "session key decodes to {} bytes, expected {SESSION_KEY_LEN}",
                    decoded.len()
                ))
            })
    }

    fn aead_key(&self) -> Result<LessSafeKey, TokenError> {
        UnboundKey::new(&AES_256_GCM, &self.0)
            .map(LessSafeKey::new)
            .map_err(|_| TokenError::Encryption)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

#[derive(Deserialize)]
struct ProtectedHeader {
    alg: String,
    enc: String,
    #[serde(default)]
    zip: Option<String>,
}

#[derive(Deserialize)]
struct FlattenedJwe {
    protected: String,
    iv: String,
    ciphertext: String,
    tag: String,
    #[serde(default)]
    aad: Option<String>,
    #[serde(default)]
    encrypted_key: Option<String>,
}

/// Decoded JWE pieces, before decryption.
struct Envelope {
    protected: String,
    aad: Vec<u8>,
    iv: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

/// Encrypts and decrypts session tokens with a shared key.
#[derive(Debug, Clone)]
pub struct SessionTokenCodec {
    key: Arc<SessionKey>,
    rng: SystemRandom,
}

impl SessionTokenCodec {
    pub fn new(key: Arc<SessionKey>) -> Self {
        Self {
            key,
            rng: SystemRandom::new(),
        }
    }

    pub fn encode(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        claims.validate()?;

        let header = Base64UrlUnpadded::encode_string(PROTECTED_HEADER.as_bytes());
        let mut iv = [0u8; NONCE_LEN];
        self.rng.fill(&mut iv).map_err(|_| TokenError::Encryption)?;

        let mut in_out = serde_json::to_vec(claims).map_err(|_| TokenError::Encryption)?;
        let tag = self
            .key
            .aead_key()?
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(iv),
                Aad::from(header.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| TokenError::Encryption)?;

        let compact = format!(
            "{header}..{}.{}.{}",
            Base64UrlUnpadded::encode_string(&iv),
            Base64UrlUnpadded::encode_string(&in_out),
            Base64UrlUnpadded::encode_string(tag.as_ref()),
        );
        Ok(Base64::encode_string(compact.as_bytes()))
    }

    pub fn decode(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let raw = Base64::decode_vec(token.trim())
            .map_err(|_| TokenError::Format("token is not valid base64".to_string()))?;
        let serialized = String::from_utf8(raw)
            .map_err(|_| TokenError::Format("token payload is not UTF-8".to_string()))?;

        let envelope = if serialized.trim_start().starts_with('{') {
            parse_flattened(&serialized)?
        } else {
            parse_compact(&serialized)?
        };
        check_protected_header(&envelope.protected)?;

        let mut in_out = envelope.ciphertext;
        in_out.extend_from_slice(&envelope.tag);
        let plaintext = self
            .key
            .aead_key()
            .map_err(|_| TokenError::Decryption)?
            .open_in_place(
                Nonce::assume_unique_for_key(envelope.iv),
                Aad::from(envelope.aad.as_slice()),
                &mut in_out,
            )
            .map_err(|_| TokenError::Decryption)?;

        let claims: SessionClaims =
            serde_json::from_slice(plaintext).map_err(|e| TokenError::Claims(e.to_string()))?;
        claims.validate()?;
        Ok(claims)
    }
}

fn parse_compact(serialized: &str) -> Result<Envelope, TokenError> {
    let parts: Vec<&str> = serialized.trim().split('.').collect();
    let [protected, encrypted_key, iv, ciphertext, tag] = parts.as_slice() else {
        return Err(TokenError::Format(format!(
            "compact JWE has {} segments, expected 5",
            parts.len()
        )));
    };
    if !encrypted_key.is_empty() {
        return Err(TokenError::Format(
            "direct encryption must not carry an encrypted key".to_string(),
        ));
    }

    build_envelope(protected, None, iv, ciphertext, tag)
}

fn parse_flattened(serialized: &str) -> Result<Envelope, TokenError> {
    let jwe: FlattenedJwe = serde_json::from_str(serialized)
        .map_err(|e| TokenError::Format(format!("invalid JSON serialization: {e}")))?;
    if jwe.encrypted_key.as_deref().is_some_and(|key| !key.is_empty()) {
        return Err(TokenError::Format(
            "direct encryption must not carry an encrypted key".to_string(),
        ));
    }

    build_envelope(
        &jwe.protected,
        jwe.aad.as_deref(),
        &jwe.iv,
        &jwe.ciphertext,
        &jwe.tag,
    )
}

fn build_envelope(
    protected: &str,
    extra_aad: Option<&str>,
    iv: &str,
    ciphertext: &str,
    tag: &str,
) -> Result<Envelope, TokenError> {
    let iv = <[u8; NONCE_LEN]>::try_from(decode_segment("iv", iv)?.as_slice())
        .map_err(|_| TokenError::Format(format!("iv must be {NONCE_LEN} bytes")))?;
    let tag = decode_segment("tag", tag)?;
    if tag.len() != TAG_LEN {
        return Err(TokenError::Format(format!("tag must be {TAG_LEN} bytes")));
    }

    let aad = match extra_aad {
        Some(extra) => format!("{protected}.{extra}"),
        None => protected.to_string(),
    };

    Ok(Envelope {
        protected: protected.to_string(),
        aad: aad.into_bytes(),
        iv,
        ciphertext: decode_segment("ciphertext", ciphertext)?,
        tag,
    })
}

fn check_protected_header(protected: &str) -> Result<(), TokenError> {
    let header: ProtectedHeader = serde_json::from_slice(&decode_segment("protected", protected)?)
        .map_err(|e| TokenError::Format(format!("invalid protected header: {e}")))?;

    if header.alg != JWE_ALG_DIRECT || header.enc != JWE_ENC_A256GCM {
        return Err(TokenError::Format(format!(
            "unsupported JWE algorithm {}/{}",
            header.alg, header.enc
        )));
    }
    if header.zip.is_some() {
        return Err(TokenError::Format("compressed JWE is not supported".to_string()));
    }
    Ok(())
}

fn decode_segment(name: &str, value: &str) -> Result<Vec<u8>, TokenError> {
    Base64UrlUnpadded::decode_vec(value)
        .map_err(|_| TokenError::Format(format!("{name} is not valid base64url")))
}
