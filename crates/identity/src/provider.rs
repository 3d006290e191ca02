//! Cryptogram Engine
//!
//! Hands out the cryptogram for the current UTC day, generating it at most
//! once per day. The cache and the regeneration path sit behind one async
//! mutex: concurrent callers wait for an in-flight regeneration instead of
//! starting their own, and only ever observe a complete cryptogram.

use crate::crypto::{CryptogramPlaintext, Encrypter};
use crate::cryptogram::Cryptogram;
use crate::error::{IdentityError, IdentityResult};
use crate::storage::{CryptogramStorage, ResidentIdProvider, StoredCryptogram};
use chrono::{DateTime, Duration, Utc};
use shared::Clock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

pub struct CryptogramProvider {
    resident_ids: Arc<dyn ResidentIdProvider>,
    encrypter: Encrypter,
    storage: Arc<dyn CryptogramStorage>,
    clock: Arc<dyn Clock>,
    country_code: [u8; 2],
    cache: Mutex<Option<StoredCryptogram>>,
}

impl CryptogramProvider {
    pub fn new(
        resident_ids: Arc<dyn ResidentIdProvider>,
        encrypter: Encrypter,
        storage: Arc<dyn CryptogramStorage>,
        clock: Arc<dyn Clock>,
        country_code: [u8; 2],
    ) -> Self {
        Self {
            resident_ids,
            encrypter,
            storage,
            clock,
            country_code,
            cache: Mutex::new(None),
        }
    }

    /// True iff a resident identity and the sealing key are both available
    pub fn can_provide(&self) -> bool {
        self.resident_ids.has_proper_id() && self.encrypter.can_encrypt()
    }

    pub fn country_code(&self) -> [u8; 2] {
        self.country_code
    }

    /// The cryptogram valid for the current instant.
    ///
    /// Lookup order is cache, then durable storage, then generation. Storage
    /// failures are logged and treated as an empty slot.
    pub async fn provide(&self) -> IdentityResult<Cryptogram> {
        let mut cache = self.cache.lock().await;
        let now = self.clock.now();

        if let Some(cached) = cache.as_ref() {
            if is_valid_at(cached.validity_date, now) {
                return Ok(cached.cryptogram.clone());
            }
            debug!("Cached cryptogram expired at {}", start_of_next_day(cached.validity_date));
        }

        match self.storage.get().await {
            Ok(Some(stored)) if is_valid_at(stored.validity_date, now) => {
                debug!("Adopting stored cryptogram {}", stored.cryptogram.fingerprint());
                let cryptogram = stored.cryptogram.clone();
                *cache = Some(stored);
                return Ok(cryptogram);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to read stored cryptogram, regenerating: {}", e);
            }
        }

        let stored = StoredCryptogram {
            validity_date: now,
            cryptogram: self.generate(now)?,
        };
        info!("My cryptogram is now {}", stored.cryptogram.fingerprint());

        if let Err(e) = self.storage.set(stored.clone()).await {
            error!("Failed to persist cryptogram: {}", e);
        }

        let cryptogram = stored.cryptogram.clone();
        *cache = Some(stored);
        Ok(cryptogram)
    }

    fn generate(&self, validity_date: DateTime<Utc>) -> IdentityResult<Cryptogram> {
        let resident_id = self
            .resident_ids
            .resident_id()
            .ok_or(IdentityError::MissingResidentId)?;

        let plaintext = CryptogramPlaintext {
            valid_from: epoch_seconds(start_of_day(validity_date)),
            valid_until: epoch_seconds(start_of_next_day(validity_date)),
            resident_id,
            country_code: self.country_code,
        };

        self.encrypter.encrypt(&plaintext)
    }
}

pub(crate) fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(instant)
}

fn start_of_next_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(instant) + Duration::days(1)
}

/// `[start of day, start of next day)` of the validity date contains `now`
fn is_valid_at(validity_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    start_of_day(validity_date) <= now && now < start_of_next_day(validity_date)
}

fn epoch_seconds(instant: DateTime<Utc>) -> u32 {
    u32::try_from(instant.timestamp()).unwrap_or(u32::MAX)
}
