//! The resident's current health state and its persistence

use crate::reminders::ReminderScheduler;
use crate::serialization::{deserialize, serialize};
use crate::state::{HealthState, NonEmptySet, Symptom};
use crate::test_info::TestInfo;
use crate::transitions;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{Clock, PersistenceResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Durable slot for the serialized health state
#[async_trait]
pub trait StateStorage: Send + Sync {
    async fn get(&self) -> PersistenceResult<Option<String>>;

    async fn set(&self, serialized: String) -> PersistenceResult<()>;
}

#[derive(Default)]
pub struct InMemoryStateStorage {
    slot: RwLock<Option<String>>,
}

impl InMemoryStateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stored(serialized: impl Into<String>) -> Self {
        Self {
            slot: RwLock::new(Some(serialized.into())),
        }
    }
}

#[async_trait]
impl StateStorage for InMemoryStateStorage {
    async fn get(&self) -> PersistenceResult<Option<String>> {
        Ok(self.slot.read().await.clone())
    }

    async fn set(&self, serialized: String) -> PersistenceResult<()> {
        *self.slot.write().await = Some(serialized);
        Ok(())
    }
}

/// Owns the current [`HealthState`].
///
/// Each input runs through the matching transition. A changed state is
/// persisted and its reminder rescheduled. Storage failures are logged and
/// the in-memory state stays authoritative.
pub struct HealthStateHolder {
    state: RwLock<HealthState>,
    storage: Arc<dyn StateStorage>,
    scheduler: Arc<dyn ReminderScheduler>,
    clock: Arc<dyn Clock>,
}

impl HealthStateHolder {
    pub async fn load(
        storage: Arc<dyn StateStorage>,
        scheduler: Arc<dyn ReminderScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let stored = match storage.get().await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to read health state: {}", e);
                None
            }
        };
        let state = deserialize(stored.as_deref());
        info!("Loaded health state: {}", state.type_name());

        Self {
            state: RwLock::new(state),
            storage,
            scheduler,
            clock,
        }
    }

    pub async fn current(&self) -> HealthState {
        self.state.read().await.clone()
    }

    pub async fn diagnose(
        &self,
        symptoms_date: NaiveDate,
        symptoms: NonEmptySet<Symptom>,
    ) -> HealthState {
        let today = self.today();
        self.apply(|current| transitions::diagnose(current, symptoms_date, symptoms, today))
            .await
    }

    pub async fn check_in(&self, symptoms: &BTreeSet<Symptom>) -> HealthState {
        let today = self.today();
        self.apply(|current| transitions::diagnose_for_checkin(current, symptoms, today))
            .await
    }

    pub async fn on_exposure(&self, exposure_date: DateTime<Utc>) -> HealthState {
        self.apply(|current| transitions::transition_on_exposure(current, exposure_date))
            .await
    }

    pub async fn on_test_result(&self, test_info: &TestInfo) -> HealthState {
        let today = self.today();
        self.apply(|current| transitions::transition_on_test_result(current, test_info, today))
            .await
    }

    /// Clear an exposure whose isolation has ended
    pub async fn refresh(&self) -> HealthState {
        let now = self.clock.now();
        self.apply(|current| transitions::transition_on_expired_exposed_state(current, now))
            .await
    }

    /// End the current isolation as of yesterday
    pub async fn expire(&self) -> HealthState {
        let today = self.today();
        self.apply(|current| current.expire(today)).await
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    async fn apply(&self, transition: impl FnOnce(&HealthState) -> HealthState) -> HealthState {
        let mut state = self.state.write().await;
        let next = transition(&state);
        if next == *state {
            return next;
        }

        info!("Health state {} -> {}", state.type_name(), next.type_name());
        if let Err(e) = self.storage.set(serialize(&next)).await {
            error!("Failed to persist health state: {}", e);
        }
        next.schedule_reminder(self.scheduler.as_ref(), self.clock.now());

        *state = next.clone();
        next
    }
}
