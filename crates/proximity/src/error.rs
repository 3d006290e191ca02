use identity::IdentityError;
use shared::PersistenceError;
use thiserror::Error;

/// Failures inside the radio layer.
///
/// Everything here is contained to a single session or a single write; the
/// scanner reports it through the event emitter and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProximityError {
    #[error("Radio error on {address}: {reason}")]
    Radio { address: String, reason: String },

    #[error("Link to {0} dropped")]
    Disconnected(String),

    #[error("Timed out during {operation} on {address}")]
    Timeout {
        address: String,
        operation: &'static str,
    },

    #[error("Device {0} does not expose the identity characteristic")]
    UnsupportedDevice(String),

    #[error("Radio adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type ProximityResult<T> = std::result::Result<T, ProximityError>;

impl ProximityError {
    pub fn radio(address: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ProximityError::Radio {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// A dropped link ends a session cleanly instead of erroring it
    pub fn is_link_drop(&self) -> bool {
        matches!(self, ProximityError::Disconnected(_))
    }
}
