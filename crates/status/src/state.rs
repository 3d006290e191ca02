use crate::reminders::ReminderScheduler;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Isolation length after symptom onset or a positive test
pub const NUMBER_OF_DAYS_IN_SYMPTOMATIC: i64 = 7;

/// Isolation length after an exposure alert
pub const NUMBER_OF_DAYS_IN_EXPOSED: i64 = 14;

/// Hour of the day (UTC) at which every isolation period ends
const ISOLATION_END_HOUR: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Symptom {
    Cough,
    Temperature,
    Anosmia,
    Sneeze,
    Nausea,
}

impl Symptom {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symptom::Cough => "COUGH",
            Symptom::Temperature => "TEMPERATURE",
            Symptom::Anosmia => "ANOSMIA",
            Symptom::Sneeze => "SNEEZE",
            Symptom::Nausea => "NAUSEA",
        }
    }
}

impl fmt::Display for Symptom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symptom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COUGH" => Ok(Symptom::Cough),
            "TEMPERATURE" => Ok(Symptom::Temperature),
            "ANOSMIA" => Ok(Symptom::Anosmia),
            "SNEEZE" => Ok(Symptom::Sneeze),
            "NAUSEA" => Ok(Symptom::Nausea),
            other => Err(format!("Unknown symptom: {}", other)),
        }
    }
}

/// A set that is never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptySet<T: Ord>(BTreeSet<T>);

impl<T: Ord> NonEmptySet<T> {
    pub fn create(items: BTreeSet<T>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self(items))
        }
    }

    pub fn of(first: T, rest: impl IntoIterator<Item = T>) -> Self {
        let mut items: BTreeSet<T> = rest.into_iter().collect();
        items.insert(first);
        Self(items)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.0.contains(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_set(&self) -> &BTreeSet<T> {
        &self.0
    }

    pub fn into_set(self) -> BTreeSet<T> {
        self.0
    }
}

/// Coarse status for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayState {
    Ok,
    AtRisk,
    Isolate,
}

/// The resident's current isolation status.
///
/// `until` is always 07:00 UTC on its calendar day. Symptomatic variants
/// carry at least one symptom by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthState {
    Default,
    Exposed {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    Symptomatic {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        symptoms: NonEmptySet<Symptom>,
    },
    ExposedSymptomatic {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exposed_at: DateTime<Utc>,
        symptoms: NonEmptySet<Symptom>,
    },
    Positive {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        symptoms: BTreeSet<Symptom>,
    },
}

/// 07:00 UTC on `date`
pub fn to_utc_normalized(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN + Duration::hours(ISOLATION_END_HOUR as i64))
        .and_utc()
}

pub(crate) fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

/// End of a seven-day isolation that began on `onset`, never earlier than
/// tomorrow morning
fn symptomatic_until(onset: NaiveDate, today: NaiveDate) -> DateTime<Utc> {
    if days_between(onset, today) < NUMBER_OF_DAYS_IN_SYMPTOMATIC {
        to_utc_normalized(onset + Duration::days(NUMBER_OF_DAYS_IN_SYMPTOMATIC))
    } else {
        to_utc_normalized(today + Duration::days(1))
    }
}

/// End of isolation after a positive test taken on `tested`
fn positive_until(tested: NaiveDate, today: NaiveDate) -> DateTime<Utc> {
    if days_between(tested, today) < NUMBER_OF_DAYS_IN_SYMPTOMATIC {
        to_utc_normalized(tested + Duration::days(NUMBER_OF_DAYS_IN_SYMPTOMATIC))
    } else {
        to_utc_normalized(today)
    }
}

impl HealthState {
    pub fn exposed(exposure_date: NaiveDate) -> Self {
        HealthState::Exposed {
            since: start_of_day_utc(exposure_date),
            until: to_utc_normalized(exposure_date + Duration::days(NUMBER_OF_DAYS_IN_EXPOSED)),
        }
    }

    /// Rebuild the exposure an exposed-symptomatic state started from.
    /// Any other state is returned as is.
    pub fn exposed_from(&self) -> Self {
        match self {
            HealthState::ExposedSymptomatic {
                until, exposed_at, ..
            } => HealthState::Exposed {
                since: *exposed_at,
                until: *until,
            },
            other => other.clone(),
        }
    }

    pub fn symptomatic(onset: NaiveDate, symptoms: NonEmptySet<Symptom>, today: NaiveDate) -> Self {
        HealthState::Symptomatic {
            since: to_utc_normalized(onset),
            until: symptomatic_until(onset, today),
            symptoms,
        }
    }

    /// Symptoms on top of an exposure keep the exposure's end date
    pub fn exposed_symptomatic(
        onset: NaiveDate,
        exposed_since: DateTime<Utc>,
        exposed_until: DateTime<Utc>,
        symptoms: NonEmptySet<Symptom>,
    ) -> Self {
        HealthState::ExposedSymptomatic {
            since: to_utc_normalized(onset),
            until: exposed_until,
            exposed_at: exposed_since,
            symptoms,
        }
    }

    pub fn positive(tested_at: DateTime<Utc>, today: NaiveDate) -> Self {
        HealthState::Positive {
            since: tested_at,
            until: positive_until(tested_at.date_naive(), today),
            symptoms: BTreeSet::new(),
        }
    }

    /// Reclassify a symptomatic state as positive, keeping onset and symptoms.
    /// Any other state is returned as is.
    pub fn positive_from(&self, today: NaiveDate) -> Self {
        match self {
            HealthState::Symptomatic { since, symptoms, .. }
            | HealthState::ExposedSymptomatic { since, symptoms, .. } => HealthState::Positive {
                since: *since,
                until: positive_until(since.date_naive(), today),
                symptoms: symptoms.as_set().clone(),
            },
            other => other.clone(),
        }
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            HealthState::Default => None,
            HealthState::Exposed { since, .. }
            | HealthState::Symptomatic { since, .. }
            | HealthState::ExposedSymptomatic { since, .. }
            | HealthState::Positive { since, .. } => Some(*since),
        }
    }

    pub fn until(&self) -> Option<DateTime<Utc>> {
        match self {
            HealthState::Default => None,
            HealthState::Exposed { until, .. }
            | HealthState::Symptomatic { until, .. }
            | HealthState::ExposedSymptomatic { until, .. }
            | HealthState::Positive { until, .. } => Some(*until),
        }
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.until().map(|until| until < now).unwrap_or(false)
    }

    pub fn symptoms(&self) -> BTreeSet<Symptom> {
        match self {
            HealthState::Default | HealthState::Exposed { .. } => BTreeSet::new(),
            HealthState::Symptomatic { symptoms, .. }
            | HealthState::ExposedSymptomatic { symptoms, .. } => symptoms.as_set().clone(),
            HealthState::Positive { symptoms, .. } => symptoms.clone(),
        }
    }

    pub fn display_state(&self) -> DisplayState {
        match self {
            HealthState::Default => DisplayState::Ok,
            HealthState::Exposed { .. } => DisplayState::AtRisk,
            HealthState::Symptomatic { .. }
            | HealthState::ExposedSymptomatic { .. }
            | HealthState::Positive { .. } => DisplayState::Isolate,
        }
    }

    /// True when the exposure behind an exposed-symptomatic state happened
    /// within the last [`NUMBER_OF_DAYS_IN_EXPOSED`] days
    pub fn is_within_exposure_window(&self, now: DateTime<Utc>) -> bool {
        match self {
            HealthState::ExposedSymptomatic { exposed_at, .. } => {
                *exposed_at > now - Duration::days(NUMBER_OF_DAYS_IN_EXPOSED)
            }
            _ => false,
        }
    }

    /// Move `until` to yesterday morning
    pub fn expire(&self, today: NaiveDate) -> Self {
        let yesterday = to_utc_normalized(today - Duration::days(1));
        let mut expired = self.clone();
        match &mut expired {
            HealthState::Default => {}
            HealthState::Exposed { until, .. }
            | HealthState::Symptomatic { until, .. }
            | HealthState::ExposedSymptomatic { until, .. }
            | HealthState::Positive { until, .. } => *until = yesterday,
        }
        expired
    }

    /// Extend an isolating state to tomorrow morning with the symptoms just
    /// reported. Exposure provenance is dropped.
    pub fn extend_after_checkin(&self, symptoms: &BTreeSet<Symptom>, today: NaiveDate) -> Self {
        let tomorrow = to_utc_normalized(today + Duration::days(1));
        match self {
            HealthState::Positive { since, .. } => HealthState::Positive {
                since: *since,
                until: tomorrow,
                symptoms: symptoms.clone(),
            },
            HealthState::Symptomatic { since, .. } | HealthState::ExposedSymptomatic { since, .. } => {
                match NonEmptySet::create(symptoms.clone()) {
                    Some(symptoms) => HealthState::Symptomatic {
                        since: *since,
                        until: tomorrow,
                        symptoms,
                    },
                    None => HealthState::Default,
                }
            }
            other => other.clone(),
        }
    }

    /// Replace any pending reminder with the one this state calls for
    pub fn schedule_reminder(&self, scheduler: &dyn ReminderScheduler, now: DateTime<Utc>) {
        scheduler.cancel_reminders();

        if self.has_expired(now) {
            return;
        }

        match self {
            HealthState::Default => {}
            HealthState::Exposed { until, .. } => scheduler.schedule_expired_exposed_reminder(*until),
            HealthState::Symptomatic { until, .. }
            | HealthState::ExposedSymptomatic { until, .. }
            | HealthState::Positive { until, .. } => scheduler.schedule_check_in_reminder(*until),
        }
    }

    /// Name of the variant as persisted
    pub fn type_name(&self) -> &'static str {
        match self {
            HealthState::Default => "DefaultState",
            HealthState::Exposed { .. } => "ExposedState",
            HealthState::Symptomatic { .. } => "SymptomaticState",
            HealthState::ExposedSymptomatic { .. } => "ExposedSymptomaticState",
            HealthState::Positive { .. } => "PositiveState",
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        HealthState::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::{MockReminderScheduler, Reminder};
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at7(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 7, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        date(2020, 4, 10)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 4, 10, 12, 0, 0).unwrap()
    }

    fn symptomatic() -> HealthState {
        HealthState::symptomatic(date(2020, 4, 9), NonEmptySet::of(Symptom::Cough, []), today())
    }

    fn exposed_symptomatic() -> HealthState {
        HealthState::ExposedSymptomatic {
            since: at7(2020, 4, 9),
            until: at7(2020, 4, 20),
            exposed_at: at7(2020, 4, 6),
            symptoms: NonEmptySet::of(Symptom::Temperature, []),
        }
    }

    fn positive() -> HealthState {
        HealthState::Positive {
            since: at7(2020, 4, 8),
            until: at7(2020, 4, 15),
            symptoms: BTreeSet::from([Symptom::Cough]),
        }
    }

    #[test]
    fn test_exposed_factory() {
        assert_eq!(
            HealthState::exposed(today()),
            HealthState::Exposed {
                since: Utc.with_ymd_and_hms(2020, 4, 10, 0, 0, 0).unwrap(),
                until: at7(2020, 4, 24),
            }
        );
    }

    #[test]
    fn test_exposed_from_exposed_symptomatic() {
        assert_eq!(
            exposed_symptomatic().exposed_from(),
            HealthState::Exposed {
                since: at7(2020, 4, 6),
                until: at7(2020, 4, 20),
            }
        );
        assert_eq!(HealthState::Default.exposed_from(), HealthState::Default);
    }

    #[test]
    fn test_symptomatic_factory_onset_over_seven_days_ago() {
        let symptoms = NonEmptySet::of(Symptom::Cough, [Symptom::Temperature]);
        let state = HealthState::symptomatic(date(2020, 4, 2), symptoms.clone(), today());

        assert_eq!(state.until(), Some(at7(2020, 4, 11)));
        assert_eq!(state.symptoms(), symptoms.into_set());
    }

    #[test]
    fn test_symptomatic_factory_onset_under_seven_days_ago() {
        let state = HealthState::symptomatic(date(2020, 4, 5), NonEmptySet::of(Symptom::Temperature, []), today());
        assert_eq!(state.until(), Some(at7(2020, 4, 12)));
        assert_eq!(state.since(), Some(at7(2020, 4, 5)));
    }

    #[test]
    fn test_exposed_symptomatic_factory() {
        let exposed_since = Utc.with_ymd_and_hms(2020, 4, 9, 0, 0, 0).unwrap();
        let state = HealthState::exposed_symptomatic(
            date(2020, 4, 5),
            exposed_since,
            at7(2020, 4, 23),
            NonEmptySet::of(Symptom::Temperature, []),
        );

        assert_eq!(
            state,
            HealthState::ExposedSymptomatic {
                since: at7(2020, 4, 5),
                until: at7(2020, 4, 23),
                exposed_at: exposed_since,
                symptoms: NonEmptySet::of(Symptom::Temperature, []),
            }
        );
    }

    #[test]
    fn test_positive_factory() {
        let long_ago = Utc.with_ymd_and_hms(2020, 4, 2, 11, 11, 11).unwrap();
        let state = HealthState::positive(long_ago, today());
        assert!(state.symptoms().is_empty());
        assert_eq!(state.until(), Some(at7(2020, 4, 10)));

        let recent = Utc.with_ymd_and_hms(2020, 4, 5, 10, 10, 0).unwrap();
        assert_eq!(HealthState::positive(recent, today()).until(), Some(at7(2020, 4, 12)));
    }

    #[test]
    fn test_positive_from_symptomatic() {
        let recent = HealthState::symptomatic(date(2020, 4, 7), NonEmptySet::of(Symptom::Cough, []), today());
        assert_eq!(
            recent.positive_from(today()),
            HealthState::Positive {
                since: at7(2020, 4, 7),
                until: at7(2020, 4, 14),
                symptoms: BTreeSet::from([Symptom::Cough]),
            }
        );

        let old = HealthState::symptomatic(date(2020, 3, 31), NonEmptySet::of(Symptom::Temperature, []), today());
        assert_eq!(old.positive_from(today()).until(), Some(at7(2020, 4, 10)));

        let exposed_old = HealthState::ExposedSymptomatic {
            since: at7(2020, 3, 31),
            until: at7(2020, 4, 20),
            exposed_at: at7(2020, 3, 30),
            symptoms: NonEmptySet::of(Symptom::Cough, []),
        };
        assert_eq!(
            exposed_old.positive_from(today()),
            HealthState::Positive {
                since: at7(2020, 3, 31),
                until: at7(2020, 4, 10),
                symptoms: BTreeSet::from([Symptom::Cough]),
            }
        );
    }

    #[test]
    fn test_exposure_window() {
        let mut state = exposed_symptomatic();
        assert!(state.is_within_exposure_window(now()));

        if let HealthState::ExposedSymptomatic { exposed_at, .. } = &mut state {
            *exposed_at = to_utc_normalized(today() - Duration::days(NUMBER_OF_DAYS_IN_EXPOSED + 1));
        }
        assert!(!state.is_within_exposure_window(now()));
        assert!(!HealthState::exposed(today()).is_within_exposure_window(now()));
    }

    #[test]
    fn test_extend_after_checkin() {
        let symptoms = BTreeSet::from([Symptom::Temperature, Symptom::Anosmia]);

        assert_eq!(
            positive().extend_after_checkin(&symptoms, today()),
            HealthState::Positive {
                since: at7(2020, 4, 8),
                until: at7(2020, 4, 11),
                symptoms: symptoms.clone(),
            }
        );
        assert_eq!(
            exposed_symptomatic().extend_after_checkin(&symptoms, today()),
            HealthState::Symptomatic {
                since: at7(2020, 4, 9),
                until: at7(2020, 4, 11),
                symptoms: NonEmptySet::create(symptoms.clone()).unwrap(),
            }
        );

        let exposed = HealthState::exposed(today());
        assert_eq!(exposed.extend_after_checkin(&BTreeSet::new(), today()), exposed);
        assert_eq!(
            HealthState::Default.extend_after_checkin(&BTreeSet::new(), today()),
            HealthState::Default
        );
        assert_eq!(
            symptomatic().extend_after_checkin(&BTreeSet::new(), today()),
            HealthState::Default
        );
    }

    #[test]
    fn test_expire() {
        let yesterday = at7(2020, 4, 9);
        for state in [positive(), symptomatic(), exposed_symptomatic(), HealthState::exposed(today())] {
            let expired = state.expire(today());
            assert_eq!(expired.until(), Some(yesterday));
            assert_eq!(expired.since(), state.since());
        }
        assert_eq!(HealthState::Default.expire(today()), HealthState::Default);
    }

    #[test]
    fn test_has_expired() {
        assert!(!HealthState::Default.has_expired(now()));
        assert!(!positive().has_expired(now()));
        assert!(positive().expire(today()).has_expired(now()));
        assert!(HealthState::exposed(today()).expire(today()).has_expired(now()));
    }

    #[test]
    fn test_display_state() {
        assert_eq!(HealthState::Default.display_state(), DisplayState::Ok);
        assert_eq!(HealthState::exposed(today()).display_state(), DisplayState::AtRisk);
        assert_eq!(symptomatic().display_state(), DisplayState::Isolate);
        assert_eq!(exposed_symptomatic().display_state(), DisplayState::Isolate);
        assert_eq!(positive().display_state(), DisplayState::Isolate);
    }

    #[test]
    fn test_symptoms_query() {
        assert!(HealthState::Default.symptoms().is_empty());
        assert!(HealthState::exposed(today()).symptoms().is_empty());
        assert_eq!(symptomatic().symptoms(), BTreeSet::from([Symptom::Cough]));
        assert_eq!(positive().symptoms(), BTreeSet::from([Symptom::Cough]));
    }

    #[test]
    fn test_schedule_reminder_for_live_states() {
        let exposed = HealthState::exposed(today());
        let cases = [
            (exposed.clone(), Reminder::ExpiredExposed(at7(2020, 4, 24))),
            (symptomatic(), Reminder::CheckIn(at7(2020, 4, 16))),
            (exposed_symptomatic(), Reminder::CheckIn(at7(2020, 4, 20))),
            (positive(), Reminder::CheckIn(at7(2020, 4, 15))),
        ];

        for (state, expected) in cases {
            let scheduler = MockReminderScheduler::new();
            state.schedule_reminder(&scheduler, now());
            assert_eq!(scheduler.cancellations(), 1);
            assert_eq!(scheduler.scheduled(), vec![expected]);
        }
    }

    #[test]
    fn test_schedule_reminder_for_expired_and_default() {
        for state in [
            HealthState::Default,
            positive().expire(today()),
            symptomatic().expire(today()),
            exposed_symptomatic().expire(today()),
            HealthState::exposed(today()).expire(today()),
        ] {
            let scheduler = MockReminderScheduler::new();
            state.schedule_reminder(&scheduler, now());
            assert_eq!(scheduler.cancellations(), 1);
            assert!(scheduler.scheduled().is_empty());
        }
    }
}
