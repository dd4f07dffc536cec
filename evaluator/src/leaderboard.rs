//! Finds the best result other racers posted on a track.

use std::collections::HashSet;
use std::sync::Arc;

use racing_client::RawRecord;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::LeaderboardConfig;
use crate::error::LeaderboardError;
use crate::service::RacingService;
use crate::types::LeaderboardEntry;

/// How a leaderboard search ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// A leaderboard for the track was found. The entry is empty when it has no submissions.
    Found(LeaderboardEntry),
    /// Every page was read without finding the track.
    Exhausted { pages: usize },
    /// The page limit was hit before the service ran out of pages.
    PageLimitReached { pages: usize },
}

impl LookupOutcome {
    pub fn into_entry(self) -> LeaderboardEntry {
        match self {
            LookupOutcome::Found(entry) => entry,
            LookupOutcome::Exhausted { .. } | LookupOutcome::PageLimitReached { .. } => {
                LeaderboardEntry::default()
            }
        }
    }
}

pub struct LeaderboardLookup {
    racing: Arc<dyn RacingService>,
    page_size: u32,
    max_pages: usize,
}

impl LeaderboardLookup {
    pub fn new(racing: Arc<dyn RacingService>, config: &LeaderboardConfig) -> Self {
        Self {
            racing,
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }

    /// Pages through the virtual-league leaderboards until one whose track ARN
    /// contains `track_id` turns up, then returns its best submission.
    ///
    /// Leaderboards are matched in page order, so an earlier page always wins.
    #[instrument(skip(self))]
    pub async fn lookup_best_entry(
        &self,
        track_id: &str,
    ) -> Result<LookupOutcome, LeaderboardError> {
        if track_id.is_empty() {
            return Ok(LookupOutcome::Exhausted { pages: 0 });
        }
        let mut next_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut pages = 0;
        loop {
            if pages >= self.max_pages {
                warn!(pages, "Stopped looking for a leaderboard after reaching the page limit");
                return Ok(LookupOutcome::PageLimitReached { pages });
            }
            let page = self
                .racing
                .list_leaderboards(self.page_size, next_token.take())
                .await?;
            pages += 1;
            debug!(
                pages,
                leaderboards = page.leaderboards.len(),
                has_next = page.next_token.is_some(),
                "Fetched leaderboard page"
            );

            if let Some(leaderboard) = page
                .leaderboards
                .iter()
                .find(|leaderboard| leaderboard.track_arn.contains(track_id))
            {
                debug!(arn = %leaderboard.arn, "Found leaderboard for track");
                let submissions = self
                    .racing
                    .list_leaderboard_submissions(&leaderboard.arn)
                    .await?;
                let entry = best_submission(&submissions)
                    .map(LeaderboardEntry::from_submission)
                    .unwrap_or_default();
                return Ok(LookupOutcome::Found(entry));
            }

            match page.next_token {
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(LeaderboardError::RepeatedPageToken { token, pages });
                    }
                    next_token = Some(token);
                }
                None => return Ok(LookupOutcome::Exhausted { pages }),
            }
        }
    }
}

/// The submission with the lowest `Rank`. Submissions without a rank sort
/// last, and ties go to the earliest, so an unranked list yields its first element.
pub fn best_submission(submissions: &[RawRecord]) -> Option<&RawRecord> {
    submissions
        .iter()
        .min_by(|a, b| rank(a).total_cmp(&rank(b)))
}

fn rank(submission: &RawRecord) -> f64 {
    submission
        .get("Rank")
        .and_then(Value::as_f64)
        .unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MockRacingService;
    use racing_client::{Leaderboard, ListLeaderboardsResponse};
    use serde_json::json;

    fn leaderboard(arn: &str, track_arn: &str) -> Leaderboard {
        Leaderboard {
            arn: arn.to_string(),
            track_arn: track_arn.to_string(),
            name: None,
        }
    }

    fn page(leaderboards: Vec<Leaderboard>, next_token: Option<&str>) -> ListLeaderboardsResponse {
        ListLeaderboardsResponse {
            leaderboards,
            next_token: next_token.map(str::to_string),
        }
    }

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn lookup(racing: MockRacingService, max_pages: usize) -> LeaderboardLookup {
        LeaderboardLookup::new(
            Arc::new(racing),
            &LeaderboardConfig {
                page_size: 50,
                max_pages,
            },
        )
    }

    #[test]
    fn test_best_submission_prefers_lowest_rank() {
        let submissions = vec![
            record(json!({"Rank": 2, "AvgLapTime": 11000})),
            record(json!({"Rank": 1, "AvgLapTime": 9000})),
            record(json!({"AvgLapTime": 5000})),
        ];
        assert_eq!(best_submission(&submissions).unwrap()["AvgLapTime"], 9000);
    }

    #[test]
    fn test_best_submission_accepts_float_ranks() {
        let submissions = vec![
            record(json!({"Rank": 2, "AvgLapTime": 11000})),
            record(json!({"Rank": 1.0, "AvgLapTime": 9000})),
            record(json!({"Rank": 1, "AvgLapTime": 9100})),
        ];
        assert_eq!(best_submission(&submissions).unwrap()["AvgLapTime"], 9000);
    }

    #[test]
    fn test_best_submission_without_ranks_takes_first() {
        let submissions = vec![
            record(json!({"AvgLapTime": 9500})),
            record(json!({"AvgLapTime": 9000})),
        ];
        assert_eq!(best_submission(&submissions).unwrap()["AvgLapTime"], 9500);
        assert!(best_submission(&[]).is_none());
    }

    #[tokio::test]
    async fn test_lookup_returns_empty_entry_when_no_page_matches() {
        let mut racing = MockRacingService::new();
        racing
            .expect_list_leaderboards()
            .withf(|max_results, token| *max_results == 50 && token.is_none())
            .times(1)
            .returning(|_, _| {
                Ok(page(
                    vec![leaderboard("arn:lb/1", "arn:aws:deepracer:us-east-1::track/Oval_track")],
                    Some("t1"),
                ))
            });
        racing
            .expect_list_leaderboards()
            .withf(|_, token| token.as_deref() == Some("t1"))
            .times(1)
            .returning(|_, _| Ok(page(vec![], None)));
        racing.expect_list_leaderboard_submissions().never();

        let outcome = lookup(racing, 100)
            .lookup_best_entry("reInvent2019_track")
            .await
            .unwrap();
        assert_eq!(outcome, LookupOutcome::Exhausted { pages: 2 });
        assert!(outcome.into_entry().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_takes_first_match_in_page_order() {
        let mut racing = MockRacingService::new();
        racing
            .expect_list_leaderboards()
            .times(1)
            .returning(|_, _| {
                Ok(page(
                    vec![
                        leaderboard("arn:lb/other", "arn:aws:deepracer:us-east-1::track/Oval_track"),
                        leaderboard("arn:lb/first", "arn:aws:deepracer:us-east-1::track/reInvent2019_track"),
                        leaderboard("arn:lb/second", "arn:aws:deepracer:us-east-1::track/reInvent2019_track"),
                    ],
                    Some("t1"),
                ))
            });
        racing
            .expect_list_leaderboard_submissions()
            .withf(|arn| arn == "arn:lb/first")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    record(json!({
                        "Rank": 1,
                        "AvgLapTime": 9871.2,
                        "BestLapTime": 9012.0,
                        "AvgResets": 0.0,
                        "CollisionCount": 0,
                        "OffTrackCount": 1,
                        "ResetCount": 0,
                        "RacerName": "fast"
                    })),
                    record(json!({"Rank": 2, "AvgLapTime": 10100.0})),
                ])
            });

        let entry = lookup(racing, 100)
            .lookup_best_entry("reInvent2019_track")
            .await
            .unwrap()
            .into_entry();
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "avg_lap_time": 9871.2,
                "best_lap_time": 9012.0,
                "avg_resets": 0.0,
                "collision_count": 0,
                "off_track_count": 1,
                "reset_count": 0
            })
        );
    }

    #[tokio::test]
    async fn test_lookup_match_without_submissions_is_empty() {
        let mut racing = MockRacingService::new();
        racing.expect_list_leaderboards().returning(|_, _| {
            Ok(page(
                vec![leaderboard("arn:lb/1", "arn:aws:deepracer:us-east-1::track/Oval_track")],
                None,
            ))
        });
        racing
            .expect_list_leaderboard_submissions()
            .returning(|_| Ok(vec![]));

        let outcome = lookup(racing, 100).lookup_best_entry("Oval_track").await.unwrap();
        assert_eq!(outcome, LookupOutcome::Found(LeaderboardEntry::default()));
    }

    #[tokio::test]
    async fn test_lookup_stops_at_page_limit() {
        let mut racing = MockRacingService::new();
        let mut counter = 0;
        racing
            .expect_list_leaderboards()
            .times(3)
            .returning(move |_, _| {
                counter += 1;
                Ok(page(vec![], Some(format!("t{counter}").as_str())))
            });

        let outcome = lookup(racing, 3).lookup_best_entry("Oval_track").await.unwrap();
        assert_eq!(outcome, LookupOutcome::PageLimitReached { pages: 3 });
    }

    #[tokio::test]
    async fn test_lookup_detects_cyclic_tokens() {
        let mut racing = MockRacingService::new();
        racing
            .expect_list_leaderboards()
            .times(2)
            .returning(|_, _| Ok(page(vec![], Some("same"))));

        let error = lookup(racing, 100)
            .lookup_best_entry("Oval_track")
            .await
            .unwrap_err();
        assert!(
            matches!(&error, LeaderboardError::RepeatedPageToken { token, pages: 2 } if token == "same"),
            "Unexpected error: {error:?}"
        );
    }

    #[tokio::test]
    async fn test_lookup_propagates_service_errors() {
        let mut racing = MockRacingService::new();
        racing.expect_list_leaderboards().returning(|_, _| {
            Err(racing_client::RacingError::Http {
                status_code: 403,
                error_type: Some("AccessDeniedException".to_string()),
                message: "denied".to_string(),
            })
        });

        let error = lookup(racing, 100)
            .lookup_best_entry("Oval_track")
            .await
            .unwrap_err();
        assert!(matches!(error, LeaderboardError::Service(_)), "{error:?}");
    }
}
