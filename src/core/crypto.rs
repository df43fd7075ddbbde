//! Crypto engine.
//!
//! Argon2id turns secret material into a key-encryption key, and AES-256-GCM
//! seals every record under a random per-vault content key.
//!
//! # Format
//!
//! Ciphertext is `nonce (12 bytes) || ciphertext || tag (16 bytes)`. Every
//! call to [`encrypt`] draws a fresh nonce from the OS CSPRNG, so encrypting
//! the same plaintext twice never yields the same bytes.
//!
//! # Key hierarchy
//!
//! ```text
//! master key ──Argon2id(salt, params)──▶ KEK ──wrap──▶ content key ──▶ records
//! ```

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, Result};

/// Length of every symmetric key in bytes.
pub const KEY_LEN: usize = 32;

/// AES-256-GCM nonce length (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM tag length.
pub const TAG_LEN: usize = 16;

/// KDF salt length.
pub const SALT_LEN: usize = 16;

/// Minimum ciphertext length: nonce plus tag.
const MIN_CIPHERTEXT_LEN: usize = NONCE_LEN + TAG_LEN;

/// Domain separator for key fingerprints.
const KEY_ID_CONTEXT: &[u8] = b"keyswitch-key-id-v1";

/// A 256-bit symmetric key, zeroized on drop.
///
/// Used both as the derived KEK and as a vault's content key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Create a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Non-secret fingerprint used to tell keys apart.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(KEY_ID_CONTEXT);
        hasher.update(self.0);
        let digest = hasher.finalize();
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Constant-time equality.
    pub fn same_as(&self, other: &Key) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key").field("bytes", &"[REDACTED]").finish()
    }
}

/// User-held secret material a KEK is derived from.
///
/// The personal master key or a team master key. Held as raw bytes of the
/// text the user supplied, zeroized on drop.
#[derive(Clone)]
pub struct SecretMaterial(Zeroizing<Vec<u8>>);

impl SecretMaterial {
    /// Wrap user-supplied text. Surrounding whitespace is not significant.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` if the text is blank.
    pub fn new(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CryptoError::InvalidKeyMaterial("master key is empty".to_string()).into());
        }
        Ok(Self(Zeroizing::new(trimmed.as_bytes().to_vec())))
    }

    /// Generate fresh material: 32 random bytes, base64 encoded.
    pub fn generate() -> Self {
        let mut raw = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut raw[..]);
        Self(Zeroizing::new(STANDARD.encode(&raw[..]).into_bytes()))
    }

    /// Borrow the material.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The material as text, for writing to a key file.
    pub fn expose(&self) -> Zeroizing<String> {
        Zeroizing::new(String::from_utf8_lossy(&self.0).into_owned())
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretMaterial([REDACTED])")
    }
}

/// Argon2id cost parameters, persisted in every vault header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    fn to_argon2(self) -> Result<Params> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()).into())
    }

    /// Check the parameters are accepted by Argon2id.
    pub fn validate(&self) -> Result<()> {
        self.to_argon2().map(|_| ())
    }
}

/// Generate a random KDF salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a key from secret material with Argon2id.
///
/// Deterministic for the same `(secret, salt, params)`.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` for invalid parameters or a salt
/// shorter than Argon2 accepts.
pub fn derive_key(secret: &SecretMaterial, salt: &[u8], params: &KdfParams) -> Result<Key> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);
    let mut derived = [0u8; KEY_LEN];
    argon2
        .hash_password_into(secret.as_bytes(), salt, &mut derived)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let key = Key::from_bytes(derived);
    derived.zeroize();
    Ok(key)
}

/// Encrypt with AES-256-GCM under a fresh random nonce.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the AEAD operation fails.
pub fn encrypt(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypt output of [`encrypt`].
///
/// `context` names what is being decrypted and only appears in errors.
///
/// # Errors
///
/// Returns `CryptoError::CiphertextTooShort` for inputs shorter than a nonce
/// plus tag, and `CryptoError::Authentication` when the tag does not verify
/// (wrong key, truncation or tampering).
pub fn decrypt(key: &Key, combined: &[u8], context: &str) -> Result<Zeroizing<Vec<u8>>> {
    if combined.len() < MIN_CIPHERTEXT_LEN {
        return Err(CryptoError::CiphertextTooShort {
            len: combined.len(),
            min: MIN_CIPHERTEXT_LEN,
        }
        .into());
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::Authentication {
            context: context.to_string(),
        })?;
    Ok(Zeroizing::new(plaintext))
}

/// Seal a content key under a KEK.
pub fn wrap_key(kek: &Key, key: &Key) -> Result<Vec<u8>> {
    encrypt(kek, key.as_bytes())
}

/// Recover a content key sealed by [`wrap_key`].
///
/// # Errors
///
/// Returns `CryptoError::Authentication` if `kek` is not the key it was
/// wrapped under.
pub fn unwrap_key(kek: &Key, wrapped: &[u8]) -> Result<Key> {
    let plaintext = decrypt(kek, wrapped, "content key")?;
    let bytes: [u8; KEY_LEN] = plaintext.as_slice().try_into().map_err(|_| {
        CryptoError::InvalidKeyMaterial(format!(
            "unwrapped key has {} bytes, expected {}",
            plaintext.len(),
            KEY_LEN
        ))
    })?;
    Ok(Key::from_bytes(bytes))
}

/// Base64 encode binary data for text files.
pub fn encode_b64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode base64 produced by [`encode_b64`].
pub fn decode_b64(text: &str, what: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| CryptoError::InvalidKeyMaterial(format!("{}: {}", what, e)).into())
}

/// Random lowercase hex string of `bytes` random bytes.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Cheapest parameters Argon2id accepts, for tests.
#[cfg(test)]
pub(crate) fn fast_params() -> KdfParams {
    KdfParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    }
}
