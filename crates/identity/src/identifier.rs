//! Fixed-width broadcast identifier codec
//!
//! Wire layout, big-endian:
//!
//! ```text
//! countryCode(2) ‖ cryptogram(74) ‖ txPowerInProtocol(1) ‖ transmissionTime(4) ‖ hmac(16)
//! ```

use crate::cryptogram::Cryptogram;
use crate::error::{IdentityError, IdentityResult};
use crate::signer::SIGNATURE_SIZE;

const COUNTRY_CODE_SIZE: usize = 2;
const TX_POWER_SIZE: usize = 1;
const TRANSMISSION_TIME_SIZE: usize = 4;

const CRYPTOGRAM_OFFSET: usize = COUNTRY_CODE_SIZE;
const TX_POWER_OFFSET: usize = CRYPTOGRAM_OFFSET + Cryptogram::SIZE;
const TRANSMISSION_TIME_OFFSET: usize = TX_POWER_OFFSET + TX_POWER_SIZE;
const SIGNATURE_OFFSET: usize = TRANSMISSION_TIME_OFFSET + TRANSMISSION_TIME_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BroadcastIdentifier {
    pub country_code: [u8; 2],
    pub cryptogram: Cryptogram,
    pub tx_power: i8,
    /// Seconds into the UTC day at which the identifier was produced
    pub transmission_time: i32,
    pub hmac_signature: [u8; SIGNATURE_SIZE],
}

impl BroadcastIdentifier {
    pub const SIZE: usize = SIGNATURE_OFFSET + SIGNATURE_SIZE;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.extend_from_slice(&self.country_code);
        bytes.extend_from_slice(self.cryptogram.as_bytes());
        bytes.extend_from_slice(&self.tx_power.to_be_bytes());
        bytes.extend_from_slice(&self.transmission_time_bytes());
        bytes.extend_from_slice(&self.hmac_signature);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> IdentityResult<Self> {
        if bytes.len() != Self::SIZE {
            return Err(IdentityError::Format {
                what: "broadcast identifier",
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }

        let mut transmission_time = [0u8; TRANSMISSION_TIME_SIZE];
        transmission_time.copy_from_slice(&bytes[TRANSMISSION_TIME_OFFSET..SIGNATURE_OFFSET]);
        let mut hmac_signature = [0u8; SIGNATURE_SIZE];
        hmac_signature.copy_from_slice(&bytes[SIGNATURE_OFFSET..]);

        Ok(Self {
            country_code: [bytes[0], bytes[1]],
            cryptogram: Cryptogram::from_bytes(&bytes[CRYPTOGRAM_OFFSET..TX_POWER_OFFSET])?,
            tx_power: i8::from_be_bytes([bytes[TX_POWER_OFFSET]]),
            transmission_time: i32::from_be_bytes(transmission_time),
            hmac_signature,
        })
    }

    pub fn transmission_time_bytes(&self) -> [u8; TRANSMISSION_TIME_SIZE] {
        self.transmission_time.to_be_bytes()
    }

    /// The country code read as a big-endian 16-bit integer, as uploaded
    pub fn country_code_as_i16(&self) -> i16 {
        i16::from_be_bytes(self.country_code)
    }
}
