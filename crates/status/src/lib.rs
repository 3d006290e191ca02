//! Health status of the resident
//!
//! A closed set of health states, the pure transition functions that move
//! between them, their persisted JSON form, and a holder that owns the
//! current state for the process.

pub mod holder;
pub mod reminders;
pub mod serialization;
pub mod state;
pub mod test_info;
pub mod transitions;

pub use holder::{HealthStateHolder, InMemoryStateStorage, StateStorage};
pub use reminders::{MockReminderScheduler, Reminder, ReminderScheduler};
pub use serialization::{deserialize, serialize};
pub use state::{
    to_utc_normalized, DisplayState, HealthState, NonEmptySet, Symptom, NUMBER_OF_DAYS_IN_EXPOSED,
    NUMBER_OF_DAYS_IN_SYMPTOMATIC,
};
pub use test_info::{TestInfo, TestResult};
