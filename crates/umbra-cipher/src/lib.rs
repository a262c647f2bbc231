//! Optional symmetric encryption for everything umbra writes at rest.
//!
//! One primitive covers the snapshot blob, each audit-trail line, and sealed
//! configuration values. Without a key the gate is a passthrough, so callers
//! never branch on whether encryption is enabled.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix carried by every sealed payload.
pub const SEALED_PREFIX: &str = "enc:v1:";

const AES_GCM_NONCE_BYTES: usize = 12;
const AES_GCM_AAD: &[u8] = b"umbra-state-v1";
const KEY_MATERIAL_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("cipher key material has invalid length")]
    KeyMaterial,
    #[error("payload encryption failed")]
    SealFailure,
    #[error("sealed payload is missing the enc:v1: prefix")]
    MissingPrefix,
    #[error("sealed payload encoding is invalid")]
    InvalidEncoding,
    #[error("sealed payload is truncated")]
    Truncated,
    #[error("sealed payload integrity check failed")]
    IntegrityFailure,
    #[error("sealed payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Seals and opens string payloads with AES-256-GCM, or passes them through
/// unchanged when no key is configured.
///
/// The key material is `Sha256(key string)`, so any non-empty string works as
/// a key. Keyed-ness is decided once at construction; clones share it.
#[derive(Clone)]
pub struct CipherGate {
    key_material: Option<[u8; KEY_MATERIAL_BYTES]>,
}

impl CipherGate {
    /// Builds a gate from an optional key string. `None` or a blank string
    /// yields the passthrough gate.
    pub fn new(key: Option<&str>) -> Self {
        let key_material = key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| Sha256::digest(key.as_bytes()).into());
        Self { key_material }
    }

    /// The passthrough gate, spelled out for call sites that never encrypt.
    pub fn passthrough() -> Self {
        Self { key_material: None }
    }

    pub fn is_keyed(&self) -> bool {
        self.key_material.is_some()
    }

    fn cipher(key_material: &[u8; KEY_MATERIAL_BYTES]) -> Result<Aes256Gcm, CipherError> {
        Aes256Gcm::new_from_slice(key_material).map_err(|_| CipherError::KeyMaterial)
    }

    /// Seals a payload. Passthrough mode returns the input unchanged; keyed
    /// mode produces `enc:v1:` + base64(nonce || ciphertext) with a fresh
    /// random nonce per call.
    pub fn seal(&self, plaintext: &str) -> Result<String, CipherError> {
        let Some(key_material) = &self.key_material else {
            return Ok(plaintext.to_string());
        };

        let cipher = Self::cipher(key_material)?;
        let mut nonce = [0u8; AES_GCM_NONCE_BYTES];
        use aes_gcm::aead::rand_core::RngCore as _;
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(
                (&nonce).into(),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: AES_GCM_AAD,
                },
            )
            .map_err(|_| CipherError::SealFailure)?;

        let mut payload = Vec::with_capacity(AES_GCM_NONCE_BYTES + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(format!("{SEALED_PREFIX}{}", BASE64_STANDARD.encode(payload)))
    }

    /// Opens a payload. Passthrough mode is the identity for every input,
    /// including ones that happen to carry the sealed prefix. Keyed mode
    /// rejects anything that was not sealed with the same key.
    pub fn open(&self, payload: &str) -> Result<String, CipherError> {
        let Some(key_material) = &self.key_material else {
            return Ok(payload.to_string());
        };

        let encoded = payload
            .strip_prefix(SEALED_PREFIX)
            .ok_or(CipherError::MissingPrefix)?;
        let raw = BASE64_STANDARD
            .decode(encoded)
            .map_err(|_| CipherError::InvalidEncoding)?;
        if raw.len() <= AES_GCM_NONCE_BYTES {
            return Err(CipherError::Truncated);
        }

        let cipher = Self::cipher(key_material)?;
        let nonce = &raw[..AES_GCM_NONCE_BYTES];
        let ciphertext = &raw[AES_GCM_NONCE_BYTES..];
        let plaintext = cipher
            .decrypt(
                nonce.into(),
                Payload {
                    msg: ciphertext,
                    aad: AES_GCM_AAD,
                },
            )
            .map_err(|_| CipherError::IntegrityFailure)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }

    /// Generates a fresh random key suitable for `CipherGate::new`.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_MATERIAL_BYTES];
        use aes_gcm::aead::rand_core::RngCore as _;
        OsRng.fill_bytes(&mut key);
        BASE64_STANDARD.encode(key)
    }
}

impl fmt::Debug for CipherGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherGate")
            .field("keyed", &self.is_keyed())
            .finish()
    }
}
