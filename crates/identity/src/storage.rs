//! Storage contracts for key material, resident identity and cryptograms
//!
//! The persistence engine itself is outside this crate; only the read/write
//! contract is specified here, plus in-memory implementations used by the
//! tracer binary and the tests.

use crate::cryptogram::Cryptogram;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::PersistenceResult;
use tokio::sync::RwLock;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Key material provisioned by registration
pub trait KeyStorage: Send + Sync {
    /// X25519 public key of the backend, used to seal cryptograms
    fn server_public_key(&self) -> Option<[u8; 32]>;

    /// Pre-shared secret used to sign broadcast identifiers
    fn secret_key(&self) -> Option<Zeroizing<Vec<u8>>>;
}

/// Source of the resident identity sealed inside each cryptogram
pub trait ResidentIdProvider: Send + Sync {
    fn resident_id(&self) -> Option<Uuid>;

    /// True once registration produced a usable identity
    fn has_proper_id(&self) -> bool {
        self.resident_id().is_some()
    }
}

/// A cryptogram together with the instant it was generated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCryptogram {
    pub validity_date: DateTime<Utc>,
    pub cryptogram: Cryptogram,
}

/// Durable slot holding the latest generated cryptogram
#[async_trait]
pub trait CryptogramStorage: Send + Sync {
    async fn get(&self) -> PersistenceResult<Option<StoredCryptogram>>;

    async fn set(&self, stored: StoredCryptogram) -> PersistenceResult<()>;
}

/// Key storage backed by values handed over at construction
pub struct InMemoryKeyStorage {
    server_public_key: Option<[u8; 32]>,
    secret_key: Option<Zeroizing<Vec<u8>>>,
}

impl InMemoryKeyStorage {
    pub fn new(server_public_key: Option<[u8; 32]>, secret_key: Option<Vec<u8>>) -> Self {
        Self {
            server_public_key,
            secret_key: secret_key.map(Zeroizing::new),
        }
    }
}

impl KeyStorage for InMemoryKeyStorage {
    fn server_public_key(&self) -> Option<[u8; 32]> {
        self.server_public_key
    }

    fn secret_key(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.secret_key.clone()
    }
}

/// Resident id fixed at construction
#[derive(Debug, Clone, Copy)]
pub struct StaticResidentIdProvider {
    resident_id: Option<Uuid>,
}

impl StaticResidentIdProvider {
    pub fn new(resident_id: Option<Uuid>) -> Self {
        Self { resident_id }
    }
}

impl ResidentIdProvider for StaticResidentIdProvider {
    fn resident_id(&self) -> Option<Uuid> {
        self.resident_id
    }
}

#[derive(Default)]
pub struct InMemoryCryptogramStorage {
    slot: RwLock<Option<StoredCryptogram>>,
}

impl InMemoryCryptogramStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stored(stored: StoredCryptogram) -> Self {
        Self {
            slot: RwLock::new(Some(stored)),
        }
    }
}

#[async_trait]
impl CryptogramStorage for InMemoryCryptogramStorage {
    async fn get(&self) -> PersistenceResult<Option<StoredCryptogram>> {
        Ok(self.slot.read().await.clone())
    }

    async fn set(&self, stored: StoredCryptogram) -> PersistenceResult<()> {
        *self.slot.write().await = Some(stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_cryptogram_slot_overwrites() {
        let storage = InMemoryCryptogramStorage::new();
        assert_eq!(storage.get().await.unwrap(), None);

        let first = StoredCryptogram {
            validity_date: Utc.with_ymd_and_hms(2020, 4, 10, 9, 0, 0).unwrap(),
            cryptogram: Cryptogram::from_bytes(&[1u8; Cryptogram::SIZE]).unwrap(),
        };
        let second = StoredCryptogram {
            validity_date: Utc.with_ymd_and_hms(2020, 4, 11, 9, 0, 0).unwrap(),
            cryptogram: Cryptogram::from_bytes(&[2u8; Cryptogram::SIZE]).unwrap(),
        };

        storage.set(first).await.unwrap();
        storage.set(second.clone()).await.unwrap();
        assert_eq!(storage.get().await.unwrap(), Some(second));
    }

    #[test]
    fn test_resident_id_presence() {
        assert!(!StaticResidentIdProvider::new(None).has_proper_id());
        assert!(StaticResidentIdProvider::new(Some(Uuid::new_v4())).has_proper_id());
    }
}
