use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use shared::{Clock, FixedClock};
use status::{
    deserialize, serialize, to_utc_normalized, DisplayState, HealthState, HealthStateHolder,
    InMemoryStateStorage, MockReminderScheduler, NonEmptySet, Reminder, StateStorage, Symptom,
    TestInfo, TestResult,
};
use std::collections::BTreeSet;
use std::sync::Arc;

struct Fixture {
    storage: Arc<InMemoryStateStorage>,
    scheduler: Arc<MockReminderScheduler>,
    clock: Arc<FixedClock>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            storage: Arc::new(InMemoryStateStorage::new()),
            scheduler: Arc::new(MockReminderScheduler::new()),
            clock: Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2020, 4, 10, 12, 0, 0).unwrap(),
            )),
        }
    }

    async fn holder(&self) -> HealthStateHolder {
        HealthStateHolder::load(
            self.storage.clone(),
            self.scheduler.clone(),
            self.clock.clone(),
        )
        .await
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }
}

#[tokio::test]
async fn test_exposure_expires_back_to_default() {
    let fixture = Fixture::new();
    let holder = fixture.holder().await;

    let exposed = holder.on_exposure(fixture.clock.now()).await;
    assert_eq!(exposed.display_state(), DisplayState::AtRisk);

    fixture.clock.advance(Duration::days(10));
    assert_eq!(holder.refresh().await, exposed);

    fixture.clock.advance(Duration::days(5));
    assert_eq!(holder.refresh().await, HealthState::Default);
    assert_eq!(
        deserialize(fixture.storage.get().await.unwrap().as_deref()),
        HealthState::Default
    );
    assert!(fixture.scheduler.scheduled().is_empty());
}

#[tokio::test]
async fn test_symptoms_then_positive_test_then_checkin() {
    let fixture = Fixture::new();
    let holder = fixture.holder().await;
    let onset = fixture.today() - Duration::days(2);

    let symptomatic = holder
        .diagnose(onset, NonEmptySet::of(Symptom::Temperature, [Symptom::Cough]))
        .await;
    assert_eq!(symptomatic.display_state(), DisplayState::Isolate);
    assert_eq!(
        fixture.scheduler.scheduled(),
        vec![Reminder::CheckIn(to_utc_normalized(onset + Duration::days(7)))]
    );

    let tested = Utc.with_ymd_and_hms(2020, 4, 10, 9, 0, 0).unwrap();
    let positive = holder
        .on_test_result(&TestInfo::new(TestResult::Positive, tested))
        .await;
    assert_eq!(positive.since(), symptomatic.since());
    assert_eq!(positive.symptoms(), symptomatic.symptoms());
    assert!(matches!(positive, HealthState::Positive { .. }));

    fixture.clock.advance(Duration::days(6));
    let extended = holder
        .check_in(&BTreeSet::from([Symptom::Temperature]))
        .await;
    assert_eq!(
        extended.until(),
        Some(to_utc_normalized(fixture.today() + Duration::days(1)))
    );

    fixture.clock.advance(Duration::days(1));
    assert_eq!(holder.check_in(&BTreeSet::new()).await, HealthState::Default);
}

#[tokio::test]
async fn test_state_survives_reload() {
    let fixture = Fixture::new();
    let holder = fixture.holder().await;
    let state = holder
        .diagnose(fixture.today(), NonEmptySet::of(Symptom::Anosmia, []))
        .await;

    let reloaded = fixture.holder().await;
    assert_eq!(reloaded.current().await, state);
}

#[tokio::test]
async fn test_legacy_record_loads() {
    let storage = Arc::new(InMemoryStateStorage::with_stored(
        r#"{"until":1587241302262,"type":"AmberState"}"#,
    ));
    let holder = HealthStateHolder::load(
        storage,
        Arc::new(MockReminderScheduler::new()),
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2020, 4, 10, 12, 0, 0).unwrap())),
    )
    .await;

    let until = Utc.timestamp_millis_opt(1587241302262).unwrap();
    assert_eq!(
        holder.current().await,
        HealthState::Exposed {
            since: until - Duration::days(14),
            until,
        }
    );
}

#[tokio::test]
async fn test_expire_ends_isolation() {
    let fixture = Fixture::new();
    let holder = fixture.holder().await;
    holder
        .diagnose(fixture.today(), NonEmptySet::of(Symptom::Nausea, []))
        .await;

    let expired = holder.expire().await;
    assert!(expired.has_expired(fixture.clock.now()));
    assert!(fixture.scheduler.scheduled().is_empty());
}

fn symptom() -> impl Strategy<Value = Symptom> {
    prop_oneof![
        Just(Symptom::Cough),
        Just(Symptom::Temperature),
        Just(Symptom::Anosmia),
        Just(Symptom::Sneeze),
        Just(Symptom::Nausea),
    ]
}

proptest! {
    #[test]
    fn prop_deserialize_never_panics(json in ".{0,64}") {
        let _ = deserialize(Some(&json));
    }

    #[test]
    fn prop_symptomatic_round_trips(
        since in 0i64..4_000_000_000_000,
        span in 0i64..2_000_000_000,
        symptoms in proptest::collection::btree_set(symptom(), 1..5),
    ) {
        let state = HealthState::Symptomatic {
            since: Utc.timestamp_millis_opt(since).unwrap(),
            until: Utc.timestamp_millis_opt(since + span).unwrap(),
            symptoms: NonEmptySet::create(symptoms).unwrap(),
        };
        prop_assert_eq!(deserialize(Some(&serialize(&state))), state);
    }
}
