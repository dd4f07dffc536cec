use std::fmt::Display;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::projection::{LEADERBOARD_ENTRY_FIELDS, TRACK_FIELDS, project};

/// The literal used in place of a value that could not be obtained.
pub const UNKNOWN: &str = "unknown";

pub const TRACK_DIFFICULTY_NOTE: &str =
    "Track difficulty is an integer ranging from 100 to 1, where 1 is the hardest";

/// A projected metric entry.
pub type MetricRecord = Map<String, Value>;

/// Where a model's artifacts live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRef {
    bucket: String,
    key_prefix: String,
}

impl ModelRef {
    pub fn new(bucket: impl Into<String>, key_prefix: impl AsRef<str>) -> Self {
        Self {
            bucket: bucket.into(),
            key_prefix: key_prefix.as_ref().trim_end_matches('/').to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// The prefix with a trailing `/`, so listings stay inside this model's folder.
    pub fn dir_prefix(&self) -> String {
        if self.key_prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.key_prefix)
        }
    }

    /// Joins a path relative to the model prefix.
    pub fn key(&self, relative: &str) -> String {
        format!("{}{relative}", self.dir_prefix())
    }
}

/// A value that may have degraded to the `"unknown"` sentinel.
///
/// `Unknown` serializes as the JSON string `"unknown"`, which callers must
/// treat as distinct from an empty collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MaybeUnknown<T> {
    Known(T),
    #[default]
    Unknown,
}

impl<T> MaybeUnknown<T> {
    /// Converts an enrichment result, logging the cause when it failed.
    pub fn from_result<E: Display>(result: Result<T, E>, what: &str) -> Self {
        match result {
            Ok(value) => Self::Known(value),
            Err(e) => {
                tracing::warn!("Could not determine {what}: {e}");
                Self::Unknown
            }
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }

    pub fn known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MaybeUnknown<U> {
        match self {
            Self::Known(value) => MaybeUnknown::Known(f(value)),
            Self::Unknown => MaybeUnknown::Unknown,
        }
    }
}

impl<T> From<Option<T>> for MaybeUnknown<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl<T: Serialize> Serialize for MaybeUnknown<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(value) => value.serialize(serializer),
            Self::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for MaybeUnknown<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.as_str() == Some(UNKNOWN) {
            return Ok(Self::Unknown);
        }
        serde_json::from_value(value)
            .map(Self::Known)
            .map_err(D::Error::custom)
    }
}

/// Human-readable description of a track: `{name, description, difficulty}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackDescriptor(Map<String, Value>);

impl TrackDescriptor {
    pub fn from_track_record(record: &Map<String, Value>) -> Self {
        Self(project(record, &TRACK_FIELDS))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// The lap-time statistics of one leaderboard submission. May be empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaderboardEntry(Map<String, Value>);

impl LeaderboardEntry {
    pub fn from_submission(submission: &Map<String, Value>) -> Self {
        Self(project(submission, &LEADERBOARD_ENTRY_FIELDS))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    pub metrics: MaybeUnknown<Vec<MetricRecord>>,
    pub track: MaybeUnknown<TrackDescriptor>,
}

impl TrainingReport {
    pub fn unknown() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: MaybeUnknown<Vec<MetricRecord>>,
    pub track: MaybeUnknown<TrackDescriptor>,
    pub fastest_lap_time_by_others: MaybeUnknown<LeaderboardEntry>,
}

impl EvaluationReport {
    /// The fully degraded report.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Everything known about one trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub reward_function: MaybeUnknown<String>,
    pub hyperparameters: MaybeUnknown<Value>,
    pub model_metadata: MaybeUnknown<Map<String, Value>>,
    pub training: TrainingReport,
    pub evaluation: EvaluationReport,
    pub track_difficulty_note: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_ref_trims_trailing_slash() {
        let model = ModelRef::new("bucket", "models/my-model/");
        assert_eq!(model.key_prefix(), "models/my-model");
        assert_eq!(model.dir_prefix(), "models/my-model/");
        assert_eq!(
            model.key("metrics/training"),
            "models/my-model/metrics/training"
        );
    }

    #[test]
    fn test_model_ref_with_empty_prefix() {
        let model = ModelRef::new("bucket", "");
        assert_eq!(model.dir_prefix(), "");
        assert_eq!(model.key("reward_function.py"), "reward_function.py");
    }

    #[test]
    fn test_degraded_report_literal() {
        let report = EvaluationReport::unknown();
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "metrics": "unknown",
                "track": "unknown",
                "fastest_lap_time_by_others": "unknown"
            })
        );
        let parsed: EvaluationReport = serde_json::from_value(json!({
            "metrics": "unknown",
            "track": "unknown",
            "fastest_lap_time_by_others": "unknown"
        }))
        .unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_unknown_is_distinct_from_empty() {
        let empty: MaybeUnknown<LeaderboardEntry> = MaybeUnknown::Known(LeaderboardEntry::default());
        assert_eq!(serde_json::to_value(&empty).unwrap(), json!({}));
        let metrics: MaybeUnknown<Vec<MetricRecord>> = MaybeUnknown::Known(Vec::new());
        assert_eq!(serde_json::to_value(&metrics).unwrap(), json!([]));
    }

    #[test]
    fn test_from_result_keeps_value_or_degrades() {
        let ok: MaybeUnknown<u32> = MaybeUnknown::from_result(Ok::<_, String>(3), "a number");
        assert_eq!(ok, MaybeUnknown::Known(3));
        let err: MaybeUnknown<u32> =
            MaybeUnknown::from_result(Err("boom".to_string()), "a number");
        assert!(err.is_unknown());
    }

    #[test]
    fn test_track_descriptor_projection() {
        let record = json!({
            "TrackArn": "arn:aws:deepracer:us-east-1::track/reInvent2019_track",
            "TrackName": "re:Invent 2019",
            "TrackDifficulty": 40
        });
        let descriptor = TrackDescriptor::from_track_record(record.as_object().unwrap());
        assert_eq!(descriptor.name(), Some("re:Invent 2019"));
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({"name": "re:Invent 2019", "difficulty": 40})
        );
    }
}
