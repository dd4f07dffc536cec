//! Allow-list projection of raw JSON records.
//!
//! Every record we surface (metric entries, leaderboard submissions, tracks,
//! model metadata) passes through [`project`]. A field is copied only when it
//! is both allow-listed and present in the source record; absent fields are
//! omitted rather than defaulted.

use serde_json::{Map, Value};

/// One allow-listed field, optionally renamed on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub source: &'static str,
    pub target: &'static str,
}

const fn keep(name: &'static str) -> Field {
    Field {
        source: name,
        target: name,
    }
}

const fn rename(source: &'static str, target: &'static str) -> Field {
    Field { source, target }
}

/// An ordered list of fields to keep. Output fields follow this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowList(&'static [Field]);

impl AllowList {
    pub const fn new(fields: &'static [Field]) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &'static [Field] {
        self.0
    }

    /// Names a projected record may contain.
    pub fn targets(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|field| field.target)
    }

    pub fn project(&self, record: &Map<String, Value>) -> Map<String, Value> {
        project(record, self)
    }
}

pub const TRAINING_METRIC_FIELDS: AllowList = AllowList::new(&[
    keep("elapsed_time_in_milliseconds"),
    keep("completion_percentage"),
    keep("reward_score"),
    keep("episode"),
    keep("episode_status"),
]);

pub const EVALUATION_METRIC_FIELDS: AllowList = AllowList::new(&[
    keep("completion_percentage"),
    keep("elapsed_time_in_milliseconds"),
    keep("episode_status"),
    keep("crash_count"),
    keep("reset_count"),
    keep("off_track_count"),
]);

pub const LEADERBOARD_ENTRY_FIELDS: AllowList = AllowList::new(&[
    rename("AvgLapTime", "avg_lap_time"),
    rename("BestLapTime", "best_lap_time"),
    rename("AvgResets", "avg_resets"),
    rename("CollisionCount", "collision_count"),
    rename("OffTrackCount", "off_track_count"),
    rename("ResetCount", "reset_count"),
]);

pub const TRACK_FIELDS: AllowList = AllowList::new(&[
    rename("TrackName", "name"),
    rename("TrackDescription", "description"),
    rename("TrackDifficulty", "difficulty"),
]);

pub const MODEL_METADATA_FIELDS: AllowList = AllowList::new(&[
    keep("action_space"),
    keep("action_space_type"),
    keep("sensor"),
]);

/// Copies the allow-listed fields present in `record`.
pub fn project(record: &Map<String, Value>, allow_list: &AllowList) -> Map<String, Value> {
    allow_list
        .fields()
        .iter()
        .filter_map(|field| {
            record
                .get(field.source)
                .map(|value| (field.target.to_string(), value.clone()))
        })
        .collect()
}
