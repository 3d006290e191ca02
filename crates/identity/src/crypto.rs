//! Cryptogram sealing
//!
//! The plaintext is sealed to the backend's X25519 public key: a fresh
//! ephemeral key is agreed against it, the shared secret is hashed into an
//! AES-256-GCM key, and the ephemeral public key travels in front of the
//! ciphertext so the backend can repeat the agreement.

use crate::cryptogram::{Cryptogram, EPHEMERAL_KEY_SIZE, PAYLOAD_SIZE};
use crate::error::{IdentityError, IdentityResult};
use crate::storage::KeyStorage;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use curve25519_dalek::montgomery::MontgomeryPoint;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;
use zeroize::Zeroizing;

const NONCE_DOMAIN: &[u8] = b"sonar-cryptogram-nonce";

/// Fields sealed inside a cryptogram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptogramPlaintext {
    /// Start of the validity window, epoch seconds
    pub valid_from: u32,
    /// End of the validity window (exclusive), epoch seconds
    pub valid_until: u32,
    pub resident_id: Uuid,
    pub country_code: [u8; 2],
}

impl CryptogramPlaintext {
    pub fn to_bytes(&self) -> [u8; PAYLOAD_SIZE] {
        let mut out = [0u8; PAYLOAD_SIZE];
        out[0..4].copy_from_slice(&self.valid_from.to_be_bytes());
        out[4..8].copy_from_slice(&self.valid_until.to_be_bytes());
        out[8..24].copy_from_slice(self.resident_id.as_bytes());
        out[24..26].copy_from_slice(&self.country_code);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> IdentityResult<Self> {
        if bytes.len() != PAYLOAD_SIZE {
            return Err(IdentityError::Format {
                what: "cryptogram payload",
                expected: PAYLOAD_SIZE,
                actual: bytes.len(),
            });
        }

        let mut from = [0u8; 4];
        from.copy_from_slice(&bytes[0..4]);
        let mut until = [0u8; 4];
        until.copy_from_slice(&bytes[4..8]);
        let mut resident = [0u8; 16];
        resident.copy_from_slice(&bytes[8..24]);

        Ok(Self {
            valid_from: u32::from_be_bytes(from),
            valid_until: u32::from_be_bytes(until),
            resident_id: Uuid::from_bytes(resident),
            country_code: [bytes[24], bytes[25]],
        })
    }
}

/// Seals cryptogram plaintexts to the backend public key held in key storage
#[derive(Clone)]
pub struct Encrypter {
    key_storage: Arc<dyn KeyStorage>,
}

impl Encrypter {
    pub fn new(key_storage: Arc<dyn KeyStorage>) -> Self {
        Self { key_storage }
    }

    pub fn can_encrypt(&self) -> bool {
        self.key_storage.server_public_key().is_some()
    }

    pub fn encrypt(&self, plaintext: &CryptogramPlaintext) -> IdentityResult<Cryptogram> {
        let server_public = self
            .key_storage
            .server_public_key()
            .ok_or(IdentityError::MissingKey("server public key"))?;

        let mut ephemeral_secret = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut ephemeral_secret[..]);

        let ephemeral_public = MontgomeryPoint::mul_base_clamped(*ephemeral_secret).to_bytes();
        let shared = Zeroizing::new(
            MontgomeryPoint(server_public)
                .mul_clamped(*ephemeral_secret)
                .to_bytes(),
        );

        let (key, nonce) = derive_cipher_material(&shared, &ephemeral_public);
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| IdentityError::Encryption(format!("Failed to create cipher: {}", e)))?;

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), &plaintext.to_bytes()[..])
            .map_err(|e| IdentityError::Encryption(format!("AES-GCM encryption failed: {}", e)))?;

        let mut bytes = Vec::with_capacity(Cryptogram::SIZE);
        bytes.extend_from_slice(&ephemeral_public);
        bytes.extend_from_slice(&sealed);
        Cryptogram::from_bytes(&bytes)
    }
}

/// Derive the public key that matches a backend secret.
pub fn public_key_for(secret: &[u8; 32]) -> [u8; 32] {
    MontgomeryPoint::mul_base_clamped(*secret).to_bytes()
}

/// Open a cryptogram with the backend secret key.
///
/// Devices never call this; the backend (and tests) do.
pub fn decrypt(server_secret: &[u8; 32], cryptogram: &Cryptogram) -> IdentityResult<CryptogramPlaintext> {
    let ephemeral_public: [u8; EPHEMERAL_KEY_SIZE] = cryptogram.ephemeral_public_key();
    let shared = Zeroizing::new(
        MontgomeryPoint(ephemeral_public)
            .mul_clamped(*server_secret)
            .to_bytes(),
    );

    let (key, nonce) = derive_cipher_material(&shared, &ephemeral_public);
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| IdentityError::Decryption(format!("Failed to create cipher: {}", e)))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), cryptogram.sealed_payload())
        .map_err(|e| IdentityError::Decryption(format!("AES-GCM decryption failed: {}", e)))?;

    CryptogramPlaintext::from_bytes(&plaintext)
}

fn derive_cipher_material(shared: &[u8; 32], ephemeral_public: &[u8; 32]) -> (Zeroizing<[u8; 32]>, [u8; 12]) {
    let mut hasher = Sha256::new();
    hasher.update(shared);
    hasher.update(ephemeral_public);
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&hasher.finalize());

    let mut hasher = Sha256::new();
    hasher.update(NONCE_DOMAIN);
    hasher.update(ephemeral_public);
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&hasher.finalize()[..12]);

    (key, nonce)
}
