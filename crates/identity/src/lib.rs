//! Rotating anonymous broadcast identity
//!
//! This crate produces the daily cryptogram that encodes a resident's identity
//! for the backend, and packs it into the fixed-width signed identifier that is
//! exchanged with nearby devices.

pub mod broadcast;
pub mod crypto;
pub mod cryptogram;
pub mod error;
pub mod identifier;
pub mod provider;
pub mod signer;
pub mod storage;

// Re-export main types
pub use broadcast::BroadcastIdentifierProvider;
pub use crypto::{CryptogramPlaintext, Encrypter};
pub use cryptogram::Cryptogram;
pub use error::{IdentityError, IdentityResult};
pub use identifier::BroadcastIdentifier;
pub use provider::CryptogramProvider;
pub use signer::{IdentifierSigner, SIGNATURE_SIZE};
pub use storage::{
    CryptogramStorage, InMemoryCryptogramStorage, InMemoryKeyStorage, KeyStorage,
    ResidentIdProvider, StaticResidentIdProvider, StoredCryptogram,
};
