//! # SecureChannel
//!
//! RSA-2048 / OAEP / SHA-256 primitives for direct messages, plus the
//! client-side keyring that pairs them with a private key vault.
//!
//! Keys travel as base64 DER: SPKI for public keys, PKCS#8 for private keys.
//! Ciphertext travels as base64 of one 256 byte OAEP block.
//!
//! Every failure is returned as a `CryptoError`. Nothing here ever falls
//! back to sending or showing plaintext on its own.
//!
//! Known limitation: private keys live only in the vault of the device that
//! generated them. There is no rotation and no multi-device sync, so a second
//! client of the same identity cannot read history encrypted to the first
//! client's key; `ClientKeyring::open` reports `MissingPrivateKey` for those
//! messages.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use dashmap::DashMap;
use domains::{DirectMessage, DomainError, CIPHERTEXT_LEN};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::rand_core::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

pub const KEY_BITS: usize = 2048;
/// Largest plaintext one OAEP-SHA256 block can carry with a 2048-bit key.
pub const MAX_PLAINTEXT_LEN: usize = CIPHERTEXT_LEN - 2 * 32 - 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("plaintext is {len} bytes, at most {max} fit in one block")]
    PlaintextTooLong { len: usize, max: usize },
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("input is not ciphertext")]
    InvalidCiphertext,
    /// Key mismatch or tampered ciphertext.
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("no private key held for identity {0}")]
    MissingPrivateKey(Uuid),
    #[error("crypto worker failed: {0}")]
    Worker(String),
}

impl From<CryptoError> for DomainError {
    fn from(err: CryptoError) -> Self {
        DomainError::CryptoFailure(err.to_string())
    }
}

pub struct KeyPair {
    /// Base64 SPKI DER. Registered on the server.
    pub public_key: String,
    /// Base64 PKCS#8 DER. Never leaves the generating client.
    pub private_key: SecretString,
}

pub fn generate_key_pair() -> Result<KeyPair, CryptoError> {
    let private = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public = RsaPublicKey::from(&private);

    let public_der = public
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let private_der = private
        .to_pkcs8_der()
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

    Ok(KeyPair {
        public_key: STANDARD.encode(public_der.as_bytes()),
        private_key: SecretString::from(STANDARD.encode(private_der.as_bytes())),
    })
}

pub fn parse_public_key(encoded: &str) -> Result<RsaPublicKey, CryptoError> {
    let der = STANDARD
        .decode(encoded.trim())
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let key = RsaPublicKey::from_public_key_der(&der).map_err(|_| CryptoError::InvalidPublicKey)?;
    if rsa::traits::PublicKeyParts::size(&key) != CIPHERTEXT_LEN {
        return Err(CryptoError::InvalidPublicKey);
    }
    Ok(key)
}

fn parse_private_key(encoded: &SecretString) -> Result<RsaPrivateKey, CryptoError> {
    let der = STANDARD
        .decode(encoded.expose_secret().trim())
        .map_err(|_| CryptoError::InvalidPrivateKey)?;
    RsaPrivateKey::from_pkcs8_der(&der).map_err(|_| CryptoError::InvalidPrivateKey)
}

pub fn encrypt(plaintext: &str, recipient_public_key: &str) -> Result<String, CryptoError> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(CryptoError::PlaintextTooLong {
            len: plaintext.len(),
            max: MAX_PLAINTEXT_LEN,
        });
    }
    let key = parse_public_key(recipient_public_key)?;
    let ciphertext = key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    Ok(STANDARD.encode(ciphertext))
}

pub fn decrypt(ciphertext: &str, own_private_key: &SecretString) -> Result<String, CryptoError> {
    let bytes = decode_ciphertext(ciphertext)?;
    let key = parse_private_key(own_private_key)?;
    let plain = key
        .decrypt(Oaep::new::<Sha256>(), &bytes)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    String::from_utf8(plain).map_err(|_| CryptoError::DecryptionFailed)
}

fn decode_ciphertext(body: &str) -> Result<Vec<u8>, CryptoError> {
    let bytes = STANDARD
        .decode(body.trim())
        .map_err(|_| CryptoError::InvalidCiphertext)?;
    if bytes.len() != CIPHERTEXT_LEN {
        return Err(CryptoError::InvalidCiphertext);
    }
    Ok(bytes)
}

/// Shape check the server runs on bodies flagged as encrypted.
pub fn check_ciphertext(body: &str) -> Result<(), CryptoError> {
    decode_ciphertext(body).map(|_| ())
}

// ── Key custody ──────────────────────────────────────────────────────────────

/// External secret store holding a client's private keys.
pub trait PrivateKeyVault: Send + Sync {
    fn store(&self, identity: Uuid, private_key: SecretString);
    fn load(&self, identity: Uuid) -> Option<SecretString>;
}

/// Process-local vault. Single device by construction.
#[derive(Default)]
pub struct MemoryKeyVault {
    keys: DashMap<Uuid, SecretString>,
}

impl MemoryKeyVault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrivateKeyVault for MemoryKeyVault {
    fn store(&self, identity: Uuid, private_key: SecretString) {
        self.keys.insert(identity, private_key);
    }

    fn load(&self, identity: Uuid) -> Option<SecretString> {
        self.keys
            .get(&identity)
            .map(|k| SecretString::from(k.expose_secret().to_owned()))
    }
}

/// Body and flag as they go into `POST /messages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBody {
    pub body: String,
    pub is_encrypted: bool,
}

impl SealedBody {
    pub fn plaintext(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            is_encrypted: false,
        }
    }
}

/// Client-side pairing of the primitives with a vault. Every RSA operation
/// runs on the blocking pool so it never stalls an event-delivery task.
#[derive(Clone)]
pub struct ClientKeyring {
    vault: Arc<dyn PrivateKeyVault>,
}

impl ClientKeyring {
    pub fn new(vault: Arc<dyn PrivateKeyVault>) -> Self {
        Self { vault }
    }

    /// Generates a key pair, keeps the private half in the vault and returns
    /// the public half for registration.
    pub async fn provision(&self, identity: Uuid) -> Result<String, CryptoError> {
        let pair = off_thread(generate_key_pair).await?;
        self.vault.store(identity, pair.private_key);
        Ok(pair.public_key)
    }

    /// Encrypts for a recipient. A failure here is final: the caller decides
    /// whether to send in the clear, explicitly, with `SealedBody::plaintext`.
    pub async fn seal(&self, plaintext: &str, recipient_public_key: &str) -> Result<SealedBody, CryptoError> {
        let plaintext = plaintext.to_owned();
        let key = recipient_public_key.to_owned();
        let body = off_thread(move || encrypt(&plaintext, &key)).await?;
        Ok(SealedBody {
            body,
            is_encrypted: true,
        })
    }

    /// Reads a stored message as `identity`, trusting only the stored flag.
    pub async fn open(&self, identity: Uuid, message: &DirectMessage) -> Result<String, CryptoError> {
        if !message.is_encrypted {
            return Ok(message.body.clone());
        }
        let key = self
            .vault
            .load(identity)
            .ok_or(CryptoError::MissingPrivateKey(identity))?;
        let body = message.body.clone();
        off_thread(move || decrypt(&body, &key)).await
    }
}

async fn off_thread<T, F>(work: F) -> Result<T, CryptoError>
where
    F: FnOnce() -> Result<T, CryptoError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CryptoError::Worker(e.to_string()))?
}
