use thiserror::Error;

/// A read or write against durable storage failed.
///
/// Callers in the identity and proximity layers contain this error: it is
/// logged and treated as "no cached value", never surfaced to a radio session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Persistence error on '{key}': {reason}")]
pub struct PersistenceError {
    pub key: String,
    pub reason: String,
}

impl PersistenceError {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_storage_key() {
        let err = PersistenceError::new("cryptogram", "disk full");
        assert_eq!(err.to_string(), "Persistence error on 'cryptogram': disk full");
    }
}
