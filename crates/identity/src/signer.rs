//! Identifier signing with the pre-shared registration secret

use crate::error::{IdentityError, IdentityResult};
use crate::identifier::BroadcastIdentifier;
use crate::storage::KeyStorage;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Length of the truncated HMAC carried in every identifier
pub const SIGNATURE_SIZE: usize = 16;

#[derive(Clone)]
pub struct IdentifierSigner {
    key_storage: Arc<dyn KeyStorage>,
}

impl IdentifierSigner {
    pub fn new(key_storage: Arc<dyn KeyStorage>) -> Self {
        Self { key_storage }
    }

    /// HMAC-SHA256 over `country code ‖ cryptogram ‖ tx power ‖ transmission time`,
    /// truncated to [`SIGNATURE_SIZE`] bytes
    pub fn sign(
        &self,
        country_code: &[u8],
        cryptogram: &[u8],
        tx_power: i8,
        transmission_time: &[u8],
    ) -> IdentityResult<[u8; SIGNATURE_SIZE]> {
        let mac = self.mac_over(country_code, cryptogram, tx_power, transmission_time)?;
        let digest = mac.finalize().into_bytes();

        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(&digest[..SIGNATURE_SIZE]);
        Ok(signature)
    }

    /// Recompute the signature of a received identifier and compare in constant time.
    ///
    /// Whether to call this is the caller's policy; decoding alone does not verify.
    pub fn verify(&self, identifier: &BroadcastIdentifier) -> IdentityResult<bool> {
        let mac = self.mac_over(
            &identifier.country_code,
            identifier.cryptogram.as_bytes(),
            identifier.tx_power,
            &identifier.transmission_time_bytes(),
        )?;
        Ok(mac.verify_truncated_left(&identifier.hmac_signature).is_ok())
    }

    fn mac_over(
        &self,
        country_code: &[u8],
        cryptogram: &[u8],
        tx_power: i8,
        transmission_time: &[u8],
    ) -> IdentityResult<HmacSha256> {
        let key = self
            .key_storage
            .secret_key()
            .ok_or(IdentityError::MissingKey("signing secret"))?;

        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| IdentityError::Encryption(format!("Invalid HMAC key: {}", e)))?;
        mac.update(country_code);
        mac.update(cryptogram);
        mac.update(&tx_power.to_be_bytes());
        mac.update(transmission_time);
        Ok(mac)
    }
}
