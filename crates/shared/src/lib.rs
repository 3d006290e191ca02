pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{PersistenceError, PersistenceResult};
