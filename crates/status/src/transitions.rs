//! Health state transitions.
//!
//! Every function here is total: inputs that do not apply to the current
//! state leave it unchanged.

use crate::state::{HealthState, NonEmptySet, Symptom, NUMBER_OF_DAYS_IN_SYMPTOMATIC};
use crate::test_info::{TestInfo, TestResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use tracing::debug;

/// Apply a symptom questionnaire with onset on `symptoms_date`
pub fn diagnose(
    current: &HealthState,
    symptoms_date: NaiveDate,
    symptoms: NonEmptySet<Symptom>,
    today: NaiveDate,
) -> HealthState {
    let onset_is_old = (today - symptoms_date).num_days() >= NUMBER_OF_DAYS_IN_SYMPTOMATIC;

    if onset_is_old && !symptoms.contains(&Symptom::Temperature) {
        debug!("Old symptoms without temperature, no new isolation");
        return match current {
            HealthState::Exposed { .. } => current.clone(),
            _ => HealthState::Default,
        };
    }

    match current {
        HealthState::Exposed { since, until } => {
            HealthState::exposed_symptomatic(symptoms_date, *since, *until, symptoms)
        }
        _ => HealthState::symptomatic(symptoms_date, symptoms, today),
    }
}

/// Apply a daily check-in. Any state clears to Default unless a temperature
/// is reported.
pub fn diagnose_for_checkin(
    current: &HealthState,
    symptoms: &BTreeSet<Symptom>,
    today: NaiveDate,
) -> HealthState {
    if !symptoms.contains(&Symptom::Temperature) {
        return HealthState::Default;
    }

    current.extend_after_checkin(symptoms, today)
}

pub fn transition_on_exposure(current: &HealthState, exposure_date: DateTime<Utc>) -> HealthState {
    match current {
        HealthState::Default => HealthState::exposed(exposure_date.date_naive()),
        _ => current.clone(),
    }
}

pub fn transition_on_test_result(
    current: &HealthState,
    test_info: &TestInfo,
    today: NaiveDate,
) -> HealthState {
    if test_info.result != TestResult::Positive {
        return current.clone();
    }

    match current {
        HealthState::Default | HealthState::Exposed { .. } => {
            HealthState::positive(test_info.date, today)
        }
        HealthState::Symptomatic { .. } | HealthState::ExposedSymptomatic { .. } => {
            current.positive_from(today)
        }
        HealthState::Positive { .. } => current.clone(),
    }
}

pub fn transition_on_expired_exposed_state(
    current: &HealthState,
    now: DateTime<Utc>,
) -> HealthState {
    match current {
        HealthState::Exposed { .. } if current.has_expired(now) => HealthState::Default,
        _ => current.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::to_utc_normalized;
    use chrono::{Duration, TimeZone};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 4, 10).unwrap()
    }

    fn tomorrow_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 4, 11, 7, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 4, 10, 12, 0, 0).unwrap()
    }

    fn cough() -> NonEmptySet<Symptom> {
        NonEmptySet::of(Symptom::Cough, [])
    }

    fn temperature() -> NonEmptySet<Symptom> {
        NonEmptySet::of(Symptom::Temperature, [])
    }

    fn exposed() -> HealthState {
        HealthState::exposed(today() - Duration::days(2))
    }

    fn symptomatic() -> HealthState {
        HealthState::symptomatic(today(), cough(), today())
    }

    fn exposed_symptomatic() -> HealthState {
        HealthState::exposed_symptomatic(
            today() - Duration::days(1),
            to_utc_normalized(today() - Duration::days(3)),
            to_utc_normalized(today() + Duration::days(11)),
            temperature(),
        )
    }

    fn positive() -> HealthState {
        HealthState::positive(tomorrow_morning(), today())
    }

    #[test]
    fn test_diagnose_old_symptoms_without_temperature() {
        let onset = today() - Duration::days(7);
        assert_eq!(diagnose(&HealthState::Default, onset, cough(), today()), HealthState::Default);
        assert_eq!(diagnose(&exposed(), onset, cough(), today()), exposed());
        assert_eq!(diagnose(&symptomatic(), onset, cough(), today()), HealthState::Default);
    }

    #[test]
    fn test_diagnose_old_symptoms_with_temperature() {
        let onset = today() - Duration::days(7);
        assert_eq!(
            diagnose(&HealthState::Default, onset, temperature(), today()),
            HealthState::Symptomatic {
                since: to_utc_normalized(onset),
                until: tomorrow_morning(),
                symptoms: temperature(),
            }
        );

        let eight_days_ago = today() - Duration::days(8);
        assert_eq!(
            diagnose(&HealthState::Default, eight_days_ago, temperature(), today()).until(),
            Some(tomorrow_morning())
        );
    }

    #[test]
    fn test_diagnose_recent_symptoms() {
        let onset = today() - Duration::days(6);
        for symptoms in [cough(), temperature()] {
            assert_eq!(
                diagnose(&HealthState::Default, onset, symptoms.clone(), today()),
                HealthState::Symptomatic {
                    since: to_utc_normalized(onset),
                    until: tomorrow_morning(),
                    symptoms,
                }
            );
        }
    }

    #[test]
    fn test_diagnose_when_exposed() {
        let onset = today() - Duration::days(6);
        let exposed = HealthState::exposed(today());

        assert_eq!(
            diagnose(&exposed, onset, temperature(), today()),
            HealthState::ExposedSymptomatic {
                since: to_utc_normalized(onset),
                until: exposed.until().unwrap(),
                exposed_at: exposed.since().unwrap(),
                symptoms: temperature(),
            }
        );
    }

    #[test]
    fn test_checkin_with_temperature() {
        let state = diagnose_for_checkin(&symptomatic(), &BTreeSet::from([Symptom::Temperature]), today());
        assert_eq!(
            state,
            HealthState::Symptomatic {
                since: symptomatic().since().unwrap(),
                until: tomorrow_morning(),
                symptoms: temperature(),
            }
        );
    }

    #[test]
    fn test_checkin_positive_with_cough_and_temperature() {
        let symptoms = BTreeSet::from([Symptom::Cough, Symptom::Temperature]);
        assert_eq!(
            diagnose_for_checkin(&positive(), &symptoms, today()),
            HealthState::Positive {
                since: positive().since().unwrap(),
                until: tomorrow_morning(),
                symptoms,
            }
        );
    }

    #[test]
    fn test_checkin_without_temperature_clears() {
        assert_eq!(
            diagnose_for_checkin(&positive(), &BTreeSet::from([Symptom::Cough]), today()),
            HealthState::Default
        );
        assert_eq!(
            diagnose_for_checkin(&symptomatic(), &BTreeSet::from([Symptom::Anosmia]), today()),
            HealthState::Default
        );
        assert_eq!(
            diagnose_for_checkin(&positive(), &BTreeSet::new(), today()),
            HealthState::Default
        );
    }

    #[test]
    fn test_checkin_drops_exposure_provenance() {
        let state = diagnose_for_checkin(
            &exposed_symptomatic(),
            &BTreeSet::from([Symptom::Temperature]),
            today(),
        );
        assert!(matches!(state, HealthState::Symptomatic { .. }));
        assert_eq!(state.since(), exposed_symptomatic().since());
    }

    #[test]
    fn test_checkin_with_temperature_keeps_non_isolating_states() {
        let temperature = BTreeSet::from([Symptom::Temperature]);
        assert_eq!(
            diagnose_for_checkin(&HealthState::Default, &temperature, today()),
            HealthState::Default
        );
        assert_eq!(diagnose_for_checkin(&exposed(), &temperature, today()), exposed());
    }

    #[test]
    fn test_checkin_without_temperature_clears_exposure() {
        assert_eq!(
            diagnose_for_checkin(&exposed(), &BTreeSet::new(), today()),
            HealthState::Default
        );
        assert_eq!(
            diagnose_for_checkin(&exposed(), &BTreeSet::from([Symptom::Cough]), today()),
            HealthState::Default
        );
    }

    #[test]
    fn test_exposure_uses_alert_date() {
        let exposure = DateTime::parse_from_rfc3339("2020-04-21T16:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let state = transition_on_exposure(&HealthState::Default, exposure);

        assert!(matches!(state, HealthState::Exposed { .. }));
        assert_eq!(state.since().unwrap().date_naive(), exposure.date_naive());
    }

    #[test]
    fn test_exposure_only_changes_default() {
        for state in [exposed(), symptomatic(), exposed_symptomatic(), positive()] {
            assert_eq!(transition_on_exposure(&state, now()), state);
        }
    }

    #[test]
    fn test_positive_result() {
        let tested = Utc.with_ymd_and_hms(2020, 4, 8, 9, 0, 0).unwrap();
        let info = TestInfo::new(TestResult::Positive, tested);

        for state in [HealthState::Default, exposed()] {
            assert_eq!(
                transition_on_test_result(&state, &info, today()),
                HealthState::positive(tested, today())
            );
        }

        assert_eq!(
            transition_on_test_result(&symptomatic(), &info, today()),
            symptomatic().positive_from(today())
        );
        assert_eq!(
            transition_on_test_result(&exposed_symptomatic(), &info, today()),
            exposed_symptomatic().positive_from(today())
        );
        assert_eq!(transition_on_test_result(&positive(), &info, today()), positive());
    }

    #[test]
    fn test_negative_and_invalid_results_leave_state() {
        for result in [TestResult::Negative, TestResult::Invalid] {
            let info = TestInfo::new(result, now());
            for state in [
                HealthState::Default,
                exposed(),
                symptomatic(),
                exposed_symptomatic(),
                positive(),
            ] {
                assert_eq!(transition_on_test_result(&state, &info, today()), state);
            }
        }
    }

    #[test]
    fn test_expired_exposed_state() {
        let expired_exposed = exposed().expire(today());
        let expired_symptomatic = symptomatic().expire(today());

        assert_eq!(
            transition_on_expired_exposed_state(&HealthState::Default, now()),
            HealthState::Default
        );
        assert_eq!(transition_on_expired_exposed_state(&exposed(), now()), exposed());
        assert_eq!(transition_on_expired_exposed_state(&symptomatic(), now()), symptomatic());
        assert_eq!(
            transition_on_expired_exposed_state(&expired_symptomatic, now()),
            expired_symptomatic
        );
        assert_eq!(
            transition_on_expired_exposed_state(&expired_exposed, now()),
            HealthState::Default
        );
    }
}
