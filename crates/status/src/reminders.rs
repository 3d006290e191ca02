use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Trait for platform reminder schedulers
pub trait ReminderScheduler: Send + Sync {
    /// Ask the resident to check in on their symptoms at `at`
    fn schedule_check_in_reminder(&self, at: DateTime<Utc>);

    /// Tell the resident their exposure isolation ends at `at`
    fn schedule_expired_exposed_reminder(&self, at: DateTime<Utc>);

    fn cancel_reminders(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reminder {
    CheckIn(DateTime<Utc>),
    ExpiredExposed(DateTime<Utc>),
}

/// Mock scheduler for testing. Keeps what was asked of it.
#[derive(Debug, Default)]
pub struct MockReminderScheduler {
    scheduled: Mutex<Vec<Reminder>>,
    cancellations: Mutex<usize>,
}

impl MockReminderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reminders still pending, oldest first
    pub fn scheduled(&self) -> Vec<Reminder> {
        match self.scheduled.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn cancellations(&self) -> usize {
        match self.cancellations.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn push(&self, reminder: Reminder) {
        tracing::info!("Mock reminder scheduled: {:?}", reminder);
        match self.scheduled.lock() {
            Ok(mut guard) => guard.push(reminder),
            Err(poisoned) => poisoned.into_inner().push(reminder),
        }
    }
}

impl ReminderScheduler for MockReminderScheduler {
    fn schedule_check_in_reminder(&self, at: DateTime<Utc>) {
        self.push(Reminder::CheckIn(at));
    }

    fn schedule_expired_exposed_reminder(&self, at: DateTime<Utc>) {
        self.push(Reminder::ExpiredExposed(at));
    }

    fn cancel_reminders(&self) {
        match self.scheduled.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
        match self.cancellations.lock() {
            Ok(mut guard) => *guard += 1,
            Err(poisoned) => *poisoned.into_inner() += 1,
        }
    }
}
