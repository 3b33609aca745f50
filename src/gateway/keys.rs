// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key material for gateway request signing.
//!
//! The merchant private key signs every outbound request; the gateway public
//! key verifies payloads the gateway signs. Both are loaded once at startup
//! and shared read-only (`Arc<KeyMaterial>`) for the process lifetime.
//!
//! Accepted PEM labels:
//!
//! | Key | Labels |
//! |-----|--------|
//! | Merchant private key | `PRIVATE KEY` (PKCS#8), `RSA PRIVATE KEY` (PKCS#1) |
//! | Gateway public key | `PUBLIC KEY` (SPKI), `RSA PUBLIC KEY` (PKCS#1) |

use std::{fmt, fs, path::Path};

use ring::signature::RsaKeyPair;

/// DER encoding of the rsaEncryption OID (1.2.840.113549.1.1.1).
const RSA_ENCRYPTION_OID: [u8; 9] = [0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];

const DER_SEQUENCE: u8 = 0x30;
const DER_BIT_STRING: u8 = 0x03;
const DER_OID: u8 = 0x06;

/// Errors raised while loading key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to read key file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("invalid PEM: {0}")]
    InvalidPem(String),

    #[error("unsupported PEM label `{0}`")]
    UnsupportedLabel(String),

    #[error("key rejected: {0}")]
    Rejected(String),

    #[error("client ID must not be empty")]
    MissingClientId,
}

/// Immutable signing/verification keys plus the client ID they belong to.
pub struct KeyMaterial {
    client_id: String,
    signing_key: RsaKeyPair,
    verification_key: Vec<u8>,
}

impl KeyMaterial {
    /// Load both keys from PEM files.
    pub fn load(
        client_id: impl Into<String>,
        private_key_path: impl AsRef<Path>,
        public_key_path: impl AsRef<Path>,
    ) -> Result<Self, KeyError> {
        let private_pem = read_pem_file(private_key_path.as_ref())?;
        let public_pem = read_pem_file(public_key_path.as_ref())?;
        Self::from_pem(client_id, &private_pem, &public_pem)
    }

    /// Build key material from PEM strings.
    pub fn from_pem(
        client_id: impl Into<String>,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<Self, KeyError> {
        let client_id = client_id.into().trim().to_string();
        if client_id.is_empty() {
            return Err(KeyError::MissingClientId);
        }

        Ok(Self {
            client_id,
            signing_key: parse_private_key(private_key_pem)?,
            verification_key: parse_public_key(public_key_pem)?,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn signing_key(&self) -> &RsaKeyPair {
        &self.signing_key
    }

    /// Gateway public key as a DER-encoded PKCS#1 `RSAPublicKey`.
    pub(crate) fn verification_key(&self) -> &[u8] {
        &self.verification_key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("client_id", &self.client_id)
            .field("signing_key", &"<redacted>")
            .field("verification_key_len", &self.verification_key.len())
            .finish()
    }
}

fn read_pem_file(path: &Path) -> Result<String, KeyError> {
    let contents = fs::read_to_string(path).map_err(|e| KeyError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(KeyError::Read {
            path: path.display().to_string(),
            reason: "file is empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_private_key(pem_str: &str) -> Result<RsaKeyPair, KeyError> {
    let pem = pem::parse(pem_str).map_err(|e| KeyError::InvalidPem(e.to_string()))?;
    match pem.tag() {
        "PRIVATE KEY" => RsaKeyPair::from_pkcs8(pem.contents()),
        "RSA PRIVATE KEY" => RsaKeyPair::from_der(pem.contents()),
        other => return Err(KeyError::UnsupportedLabel(other.to_string())),
    }
    .map_err(|e| KeyError::Rejected(e.to_string()))
}

fn parse_public_key(pem_str: &str) -> Result<Vec<u8>, KeyError> {
    let pem = pem::parse(pem_str).map_err(|e| KeyError::InvalidPem(e.to_string()))?;
    match pem.tag() {
        "PUBLIC KEY" => rsa_public_key_from_spki(pem.contents()),
        "RSA PUBLIC KEY" => Ok(pem.contents().to_vec()),
        other => Err(KeyError::UnsupportedLabel(other.to_string())),
    }
}

/// Extract the PKCS#1 `RSAPublicKey` from a `SubjectPublicKeyInfo`.
///
/// ```text
/// SubjectPublicKeyInfo ::= SEQUENCE {
///     algorithm        SEQUENCE { OID rsaEncryption, NULL },
///     subjectPublicKey BIT STRING  -- wraps RSAPublicKey
/// }
/// ```
fn rsa_public_key_from_spki(der: &[u8]) -> Result<Vec<u8>, KeyError> {
    let malformed = || KeyError::Rejected("malformed SubjectPublicKeyInfo".to_string());

    let (spki, trailing) = read_der(der, DER_SEQUENCE).ok_or_else(malformed)?;
    if !trailing.is_empty() {
        return Err(malformed());
    }

    let (algorithm, rest) = read_der(spki, DER_SEQUENCE).ok_or_else(malformed)?;
    let (oid, _params) = read_der(algorithm, DER_OID).ok_or_else(malformed)?;
    if oid != RSA_ENCRYPTION_OID {
        return Err(KeyError::Rejected("public key is not an RSA key".to_string()));
    }

    let (bits, _) = read_der(rest, DER_BIT_STRING).ok_or_else(malformed)?;
    match bits.split_first() {
        Some((0, key)) if !key.is_empty() => Ok(key.to_vec()),
        _ => Err(malformed()),
    }
}

/// Read one DER TLV with the expected tag, returning (contents, remainder).
fn read_der(input: &[u8], expected_tag: u8) -> Option<(&[u8], &[u8])> {
    let (&tag, rest) = input.split_first()?;
    if tag != expected_tag {
        return None;
    }

    let (&first, rest) = rest.split_first()?;
    let (len, rest) = if first < 0x80 {
        (first as usize, rest)
    } else {
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 || rest.len() < count {
            return None;
        }
        let len = rest[..count]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, &rest[count..])
    };

    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}


#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::fixtures::*;
    use super::*;

    #[test]
    fn loads_pkcs8_private_key_and_spki_public_key() {
        let keys = KeyMaterial::from_pem(CLIENT_ID, MERCHANT_PRIVATE_KEY, GATEWAY_PUBLIC_KEY)
            .expect("keys should load");
        assert_eq!(keys.client_id(), CLIENT_ID);
        assert_eq!(keys.signing_key().public().modulus_len(), 256);
    }

    #[test]
    fn loads_pkcs1_private_key() {
        let keys =
            KeyMaterial::from_pem(CLIENT_ID, GATEWAY_PRIVATE_KEY_PKCS1, GATEWAY_PUBLIC_KEY_PKCS1)
                .expect("PKCS#1 keys should load");
        assert_eq!(keys.signing_key().public().modulus_len(), 256);
    }

    #[test]
    fn spki_and_pkcs1_public_keys_yield_same_der() {
        let from_spki = parse_public_key(GATEWAY_PUBLIC_KEY).unwrap();
        let from_pkcs1 = parse_public_key(GATEWAY_PUBLIC_KEY_PKCS1).unwrap();
        assert_eq!(from_spki, from_pkcs1);
    }

    #[test]
    fn rejects_public_key_in_private_slot() {
        let result = KeyMaterial::from_pem(CLIENT_ID, GATEWAY_PUBLIC_KEY, GATEWAY_PUBLIC_KEY);
        assert!(matches!(result, Err(KeyError::UnsupportedLabel(_))));
    }

    #[test]
    fn rejects_garbage_pem() {
        let result = KeyMaterial::from_pem(CLIENT_ID, "not a pem", GATEWAY_PUBLIC_KEY);
        assert!(matches!(result, Err(KeyError::InvalidPem(_))));
    }

    #[test]
    fn rejects_empty_client_id() {
        let result = KeyMaterial::from_pem("  ", MERCHANT_PRIVATE_KEY, GATEWAY_PUBLIC_KEY);
        assert!(matches!(result, Err(KeyError::MissingClientId)));
    }

    #[test]
    fn rejects_truncated_spki() {
        let pem = pem::parse(GATEWAY_PUBLIC_KEY).unwrap();
        let truncated = &pem.contents()[..40];
        assert!(rsa_public_key_from_spki(truncated).is_err());
    }

    #[test]
    fn load_reads_key_files() {
        let dir = tempfile::tempdir().unwrap();
        let private_path = dir.path().join("merchant.pem");
        let public_path = dir.path().join("gateway.pem");
        fs::File::create(&private_path)
            .unwrap()
            .write_all(MERCHANT_PRIVATE_KEY.as_bytes())
            .unwrap();
        fs::File::create(&public_path)
            .unwrap()
            .write_all(GATEWAY_PUBLIC_KEY.as_bytes())
            .unwrap();

        let keys = KeyMaterial::load(CLIENT_ID, &private_path, &public_path).unwrap();
        assert_eq!(keys.client_id(), CLIENT_ID);
    }

    #[test]
    fn load_reports_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pem");
        let empty = dir.path().join("empty.pem");
        fs::write(&empty, "  \n").unwrap();

        assert!(matches!(
            KeyMaterial::load(CLIENT_ID, &missing, &empty),
            Err(KeyError::Read { .. })
        ));
        assert!(matches!(
            KeyMaterial::load(CLIENT_ID, &empty, &missing),
            Err(KeyError::Read { .. })
        ));
    }

    #[test]
    fn debug_output_redacts_private_key() {
        let keys = loopback_keys();
        let rendered = format!("{keys:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("BEGIN"));
    }
}
