//! The encrypted, day-long identity token

use crate::error::{IdentityError, IdentityResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;

/// Ephemeral X25519 public key prefix
pub const EPHEMERAL_KEY_SIZE: usize = 32;

/// Plaintext payload: two epoch-second bounds, resident id and country code
pub const PAYLOAD_SIZE: usize = 4 + 4 + 16 + 2;

/// AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Fixed-size encrypted identity blob.
///
/// Immutable once generated. Only the backend holding the matching secret key
/// can open it; everyone else treats it as opaque bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cryptogram {
    bytes: [u8; Cryptogram::SIZE],
}

impl Cryptogram {
    pub const SIZE: usize = EPHEMERAL_KEY_SIZE + PAYLOAD_SIZE + TAG_SIZE;

    pub fn from_bytes(bytes: &[u8]) -> IdentityResult<Self> {
        let bytes: [u8; Self::SIZE] = bytes.try_into().map_err(|_| IdentityError::Format {
            what: "cryptogram",
            expected: Self::SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn ephemeral_public_key(&self) -> [u8; EPHEMERAL_KEY_SIZE] {
        let mut key = [0u8; EPHEMERAL_KEY_SIZE];
        key.copy_from_slice(&self.bytes[..EPHEMERAL_KEY_SIZE]);
        key
    }

    pub fn sealed_payload(&self) -> &[u8] {
        &self.bytes[EPHEMERAL_KEY_SIZE..]
    }

    /// Short base64 excerpt suitable for logs.
    pub fn fingerprint(&self) -> String {
        STANDARD
            .encode(self.bytes)
            .chars()
            .skip(2)
            .take(12)
            .collect()
    }
}

impl fmt::Debug for Cryptogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cryptogram({}..)", self.fingerprint())
    }
}
