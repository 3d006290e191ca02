//! Builds the identifier this device advertises

use crate::error::IdentityResult;
use crate::identifier::BroadcastIdentifier;
use crate::provider::{start_of_day, CryptogramProvider};
use crate::signer::IdentifierSigner;
use shared::Clock;
use std::sync::Arc;
use tracing::debug;

pub struct BroadcastIdentifierProvider {
    cryptograms: Arc<CryptogramProvider>,
    signer: IdentifierSigner,
    clock: Arc<dyn Clock>,
}

impl BroadcastIdentifierProvider {
    pub fn new(cryptograms: Arc<CryptogramProvider>, signer: IdentifierSigner, clock: Arc<dyn Clock>) -> Self {
        Self {
            cryptograms,
            signer,
            clock,
        }
    }

    pub fn can_provide(&self) -> bool {
        self.cryptograms.can_provide()
    }

    /// Sign the current cryptogram for advertising at `tx_power`
    pub async fn provide_identifier(&self, tx_power: i8) -> IdentityResult<BroadcastIdentifier> {
        let cryptogram = self.cryptograms.provide().await?;
        let country_code = self.cryptograms.country_code();

        let now = self.clock.now();
        let transmission_time = i32::try_from((now - start_of_day(now)).num_seconds()).unwrap_or(0);

        let hmac_signature = self.signer.sign(
            &country_code,
            cryptogram.as_bytes(),
            tx_power,
            &transmission_time.to_be_bytes(),
        )?;

        debug!(
            "Signed identifier for cryptogram {} at +{}s",
            cryptogram.fingerprint(),
            transmission_time
        );

        Ok(BroadcastIdentifier {
            country_code,
            cryptogram,
            tx_power,
            transmission_time,
            hmac_signature,
        })
    }
}
