#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, dead_code))]
//! Shared fixtures: an in-memory bucket and a scripted racing service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use object_store::ObjectStoreExt;
use object_store::memory::InMemory;
use object_store::path::Path;
use racer_evaluator::config::StorageConfig;
use racer_evaluator::{
    Clients, Evaluator, EvaluatorConfig, ExportRequest, ObjectStoreArtifactStore, RacingService,
};
use racing_client::{Leaderboard, ListLeaderboardsResponse, Model, RacingError, RawRecord};
use serde_json::Value;

pub const BUCKET: &str = "models";

/// Puts `objects` into a fresh in-memory store.
pub async fn in_memory_bucket(objects: &[(&str, &str)]) -> Arc<InMemory> {
    let store = InMemory::new();
    for (key, contents) in objects {
        store
            .put(&Path::parse(*key).unwrap(), contents.as_bytes().to_vec().into())
            .await
            .unwrap();
    }
    Arc::new(store)
}

pub fn artifact_store(bucket: Arc<InMemory>) -> ObjectStoreArtifactStore {
    ObjectStoreArtifactStore::new(StorageConfig::default()).with_store(BUCKET, bucket)
}

pub fn evaluator(bucket: Arc<InMemory>, racing: Arc<FakeRacingService>) -> Evaluator {
    Evaluator::new(
        Clients {
            store: Arc::new(artifact_store(bucket)),
            racing,
        },
        &EvaluatorConfig::default(),
    )
}

pub fn record(value: Value) -> RawRecord {
    value.as_object().cloned().unwrap()
}

/// A racing service answering from fixed data and recording what was asked.
#[derive(Default)]
pub struct FakeRacingService {
    pub leaderboard_pages: Vec<ListLeaderboardsResponse>,
    pub submissions: HashMap<String, Vec<RawRecord>>,
    pub tracks: HashMap<String, RawRecord>,
    pub models: Vec<Model>,
    pub statuses: Mutex<Vec<String>>,
    pub fail_with: Option<u16>,
    pub leaderboard_requests: Mutex<Vec<Option<String>>>,
    pub exports: Mutex<Vec<ExportRequest>>,
}

impl FakeRacingService {
    pub fn with_track(mut self, world_name: &str, record: RawRecord) -> Self {
        self.tracks.insert(
            format!("arn:aws:deepracer:us-east-1::track/{world_name}"),
            record,
        );
        self
    }

    /// Adds a page of leaderboards; pages are chained through `page-{n}` tokens.
    pub fn with_leaderboard_page(mut self, leaderboards: &[(&str, &str)]) -> Self {
        let next_index = self.leaderboard_pages.len();
        if let Some(previous) = self.leaderboard_pages.last_mut() {
            previous.next_token = Some(format!("page-{next_index}"));
        }
        self.leaderboard_pages.push(ListLeaderboardsResponse {
            leaderboards: leaderboards
                .iter()
                .map(|(arn, world_name)| Leaderboard {
                    arn: (*arn).to_string(),
                    track_arn: format!("arn:aws:deepracer:us-east-1::track/{world_name}"),
                    name: None,
                })
                .collect(),
            next_token: None,
        });
        self
    }

    pub fn with_submissions(mut self, leaderboard_arn: &str, submissions: Vec<RawRecord>) -> Self {
        self.submissions
            .insert(leaderboard_arn.to_string(), submissions);
        self
    }

    fn check_failure(&self) -> Result<(), RacingError> {
        match self.fail_with {
            Some(status_code) => Err(RacingError::Http {
                status_code,
                error_type: Some("ServiceUnavailableException".to_string()),
                message: "unavailable".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RacingService for FakeRacingService {
    async fn list_leaderboards(
        &self,
        _max_results: u32,
        next_token: Option<String>,
    ) -> Result<ListLeaderboardsResponse, RacingError> {
        self.check_failure()?;
        self.leaderboard_requests
            .lock()
            .unwrap()
            .push(next_token.clone());
        let index = match next_token {
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap(),
            None => 0,
        };
        Ok(self
            .leaderboard_pages
            .get(index)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_leaderboard_submissions(
        &self,
        leaderboard_arn: &str,
    ) -> Result<Vec<RawRecord>, RacingError> {
        self.check_failure()?;
        Ok(self
            .submissions
            .get(leaderboard_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_track(&self, track_arn: &str) -> Result<Option<RawRecord>, RacingError> {
        self.check_failure()?;
        Ok(self.tracks.get(track_arn).cloned())
    }

    async fn list_models(&self) -> Result<Vec<Model>, RacingError> {
        self.check_failure()?;
        Ok(self.models.clone())
    }

    async fn get_model_status(&self, _model_arn: &str) -> Result<String, RacingError> {
        self.check_failure()?;
        let mut statuses = self.statuses.lock().unwrap();
        Ok(if statuses.len() > 1 {
            statuses.remove(0)
        } else {
            statuses.first().cloned().unwrap_or_else(|| "READY".to_string())
        })
    }

    async fn request_export(&self, request: ExportRequest) -> Result<(), RacingError> {
        self.check_failure()?;
        self.exports.lock().unwrap().push(request);
        Ok(())
    }
}
