//! JSON persistence of [`HealthState`].
//!
//! Records written by older releases are still accepted: renamed variants
//! resolve through [`resolve_type`] and a missing `since` is rebuilt from
//! `until`. Anything that cannot be understood reads back as Default.

use crate::state::{
    HealthState, NonEmptySet, Symptom, NUMBER_OF_DAYS_IN_EXPOSED, NUMBER_OF_DAYS_IN_SYMPTOMATIC,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    since: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    until: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exposed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    symptoms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Default,
    Exposed,
    Symptomatic,
    ExposedSymptomatic,
    Positive,
}

/// Map current and legacy type tags to a variant
fn resolve_type(tag: &str) -> Option<Kind> {
    match tag {
        "DefaultState" => Some(Kind::Default),
        "ExposedState" | "EmberState" | "AmberState" => Some(Kind::Exposed),
        "SymptomaticState" | "RedState" | "CheckinState" => Some(Kind::Symptomatic),
        "ExposedSymptomaticState" => Some(Kind::ExposedSymptomatic),
        "PositiveState" => Some(Kind::Positive),
        _ => None,
    }
}

pub fn serialize(state: &HealthState) -> String {
    let record = to_record(state);
    match serde_json::to_string(&record) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize {}: {}", state.type_name(), e);
            r#"{"type":"DefaultState"}"#.to_string()
        }
    }
}

/// Read a persisted state. `None` and unreadable payloads yield Default.
pub fn deserialize(json: Option<&str>) -> HealthState {
    let Some(json) = json else {
        return HealthState::Default;
    };

    let record: StateRecord = match serde_json::from_str(json) {
        Ok(record) => record,
        Err(e) => {
            warn!("Unreadable health state, using default: {}", e);
            return HealthState::Default;
        }
    };

    match from_record(&record) {
        Some(state) => state,
        None => {
            warn!("Invalid {} record, using default", record.kind);
            HealthState::Default
        }
    }
}

fn to_record(state: &HealthState) -> StateRecord {
    let symptom_names =
        |symptoms: &BTreeSet<Symptom>| symptoms.iter().map(|s| s.as_str().to_string()).collect();

    let mut record = StateRecord {
        kind: state.type_name().to_string(),
        since: state.since().map(|t| t.timestamp_millis()),
        until: state.until().map(|t| t.timestamp_millis()),
        exposed_at: None,
        symptoms: None,
    };

    match state {
        HealthState::Default | HealthState::Exposed { .. } => {}
        HealthState::Symptomatic { symptoms, .. } => {
            record.symptoms = Some(symptom_names(symptoms.as_set()));
        }
        HealthState::ExposedSymptomatic {
            exposed_at,
            symptoms,
            ..
        } => {
            record.exposed_at = Some(exposed_at.timestamp_millis());
            record.symptoms = Some(symptom_names(symptoms.as_set()));
        }
        HealthState::Positive { symptoms, .. } => {
            record.symptoms = Some(symptom_names(symptoms));
        }
    }

    record
}

fn from_record(record: &StateRecord) -> Option<HealthState> {
    let kind = match resolve_type(&record.kind) {
        Some(kind) => kind,
        None => {
            warn!("Unknown health state type: {}", record.kind);
            return None;
        }
    };

    if kind == Kind::Default {
        return Some(HealthState::Default);
    }

    let until = millis(record.until)?;
    let window = match kind {
        Kind::Exposed => NUMBER_OF_DAYS_IN_EXPOSED,
        _ => NUMBER_OF_DAYS_IN_SYMPTOMATIC,
    };
    let since = millis(record.since).unwrap_or(until - Duration::days(window));
    let symptoms = parse_symptoms(record.symptoms.as_deref().unwrap_or_default());

    let state = match kind {
        Kind::Default => HealthState::Default,
        Kind::Exposed => HealthState::Exposed { since, until },
        Kind::Symptomatic => HealthState::Symptomatic {
            since,
            until,
            symptoms: NonEmptySet::create(symptoms)?,
        },
        Kind::ExposedSymptomatic => HealthState::ExposedSymptomatic {
            since,
            until,
            exposed_at: millis(record.exposed_at)?,
            symptoms: NonEmptySet::create(symptoms)?,
        },
        Kind::Positive => HealthState::Positive {
            since,
            until,
            symptoms,
        },
    };

    Some(state)
}

fn millis(value: Option<i64>) -> Option<DateTime<Utc>> {
    value.and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn parse_symptoms(names: &[String]) -> BTreeSet<Symptom> {
    names
        .iter()
        .filter_map(|name| match name.parse::<Symptom>() {
            Ok(symptom) => Some(symptom),
            Err(e) => {
                warn!("{}", e);
                None
            }
        })
        .collect()
}
