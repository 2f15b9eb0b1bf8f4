//! Refresh cycle for the grants dashboard.
//!
//! A refresh loads grants, pipeline and progress rows together and either
//! yields a complete [`Snapshot`] or a single failure message. Nothing from a
//! failed refresh is kept.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DataResult;
use crate::models::{Grant, PipelineEntry, ProgressEntry, SummaryStatistics, Template};
use crate::summary;

/// Read-only queries the dashboard runs against the backend.
#[async_trait]
pub trait GrantSource: Sync {
    /// Non-deleted grants ordered by deadline.
    async fn fetch_grants(&self) -> DataResult<Vec<Grant>>;
    async fn fetch_pipeline(&self) -> DataResult<Vec<PipelineEntry>>;
    async fn fetch_progress(&self) -> DataResult<Vec<ProgressEntry>>;
    /// `Ok(None)` when the grant does not exist or was deleted.
    async fn fetch_grant(&self, id: Uuid) -> DataResult<Option<Grant>>;
    /// Active templates, most used first.
    async fn fetch_active_templates(&self) -> DataResult<Vec<Template>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub grants: Vec<Grant>,
    pub pipeline: Vec<PipelineEntry>,
    pub progress: Vec<ProgressEntry>,
    pub summary: SummaryStatistics,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Ready(Snapshot),
    Failed { message: String },
}

pub async fn refresh<S>(source: &S, now: DateTime<Utc>) -> RefreshOutcome
where
    S: GrantSource + ?Sized,
{
    debug!("refreshing grants, pipeline and progress");
    let fetched = tokio::try_join!(
        source.fetch_grants(),
        source.fetch_pipeline(),
        source.fetch_progress()
    );

    match fetched {
        Ok((grants, pipeline, progress)) => {
            let summary = summary::compute_summary(&grants, now);
            info!(
                grants = grants.len(),
                pipeline = pipeline.len(),
                progress = progress.len(),
                "refresh complete"
            );
            RefreshOutcome::Ready(Snapshot {
                grants,
                pipeline,
                progress,
                summary,
                refreshed_at: now,
            })
        }
        Err(err) => {
            warn!(error = %err, "refresh failed");
            RefreshOutcome::Failed {
                message: err.to_string(),
            }
        }
    }
}

/// Looks up one grant for a detail view; a missing grant is not an error.
pub async fn lookup_grant<S>(source: &S, id: Uuid) -> DataResult<Option<Grant>>
where
    S: GrantSource + ?Sized,
{
    let grant = source.fetch_grant(id).await?;
    if grant.is_none() {
        debug!(%id, "grant not found");
    }
    Ok(grant)
}

/// Consumer-side view of the latest refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub loading: bool,
    pub snapshot: Option<Snapshot>,
    pub error: Option<String>,
}

impl DashboardState {
    pub fn begin_refresh(&mut self) {
        self.loading = true;
    }

    pub fn apply(&mut self, outcome: RefreshOutcome) {
        self.loading = false;
        match outcome {
            RefreshOutcome::Ready(snapshot) => {
                self.snapshot = Some(snapshot);
                self.error = None;
            }
            RefreshOutcome::Failed { message } => {
                self.snapshot = None;
                self.error = Some(message);
            }
        }
    }

    pub async fn refresh<S>(&mut self, source: &S, now: DateTime<Utc>)
    where
        S: GrantSource + ?Sized,
    {
        self.begin_refresh();
        let outcome = refresh(source, now).await;
        self.apply(outcome);
    }

    pub fn grants(&self) -> &[Grant] {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.grants.as_slice())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> Option<&SummaryStatistics> {
        self.snapshot.as_ref().map(|snapshot| &snapshot.summary)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::models::{GrantStatus, Priority};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};

    pub(crate) fn sample_grant(title: &str, status: GrantStatus) -> Grant {
        Grant {
            id: Uuid::new_v4(),
            title: title.to_string(),
            funder: "Harbor Trust".to_string(),
            status,
            priority: Priority::High,
            amount_requested: Some(2500.0),
            amount_awarded: None,
            deadline_date: None,
        }
    }

    #[derive(Default)]
    pub(crate) struct MemorySource {
        pub grants: Vec<Grant>,
        pub pipeline: Vec<PipelineEntry>,
        pub progress: Vec<ProgressEntry>,
        pub templates: Vec<Template>,
        pub fail_progress: AtomicBool,
        pub bad_priority: AtomicBool,
    }

    #[async_trait]
    impl GrantSource for MemorySource {
        async fn fetch_grants(&self) -> DataResult<Vec<Grant>> {
            if self.bad_priority.load(Ordering::SeqCst) {
                crate::db::priority_from_column("someday")?;
            }
            Ok(self.grants.clone())
        }

        async fn fetch_pipeline(&self) -> DataResult<Vec<PipelineEntry>> {
            Ok(self.pipeline.clone())
        }

        async fn fetch_progress(&self) -> DataResult<Vec<ProgressEntry>> {
            if self.fail_progress.load(Ordering::SeqCst) {
                return Err(DataError::Query {
                    context: "progress",
                    source: sqlx::Error::PoolTimedOut,
                });
            }
            Ok(self.progress.clone())
        }

        async fn fetch_grant(&self, id: Uuid) -> DataResult<Option<Grant>> {
            Ok(self.grants.iter().find(|grant| grant.id == id).cloned())
        }

        async fn fetch_active_templates(&self) -> DataResult<Vec<Template>> {
            Ok(self.templates.clone())
        }
    }

    struct Unconfigured;

    #[async_trait]
    impl GrantSource for Unconfigured {
        async fn fetch_grants(&self) -> DataResult<Vec<Grant>> {
            Err(DataError::NotConfigured)
        }

        async fn fetch_pipeline(&self) -> DataResult<Vec<PipelineEntry>> {
            Err(DataError::NotConfigured)
        }

        async fn fetch_progress(&self) -> DataResult<Vec<ProgressEntry>> {
            Err(DataError::NotConfigured)
        }

        async fn fetch_grant(&self, _id: Uuid) -> DataResult<Option<Grant>> {
            Err(DataError::NotConfigured)
        }

        async fn fetch_active_templates(&self) -> DataResult<Vec<Template>> {
            Err(DataError::NotConfigured)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
    }

    fn populated() -> MemorySource {
        MemorySource {
            grants: vec![
                Grant {
                    amount_awarded: Some(4000.0),
                    ..sample_grant("Arts Access", GrantStatus::Awarded)
                },
                sample_grant("Library Makerspace", GrantStatus::Submitted),
            ],
            progress: vec![ProgressEntry {
                id: Uuid::new_v4(),
                grant_id: None,
                milestone: "Budget narrative".to_string(),
                percent_complete: 40,
                due_date: None,
                completed_at: None,
            }],
            ..MemorySource::default()
        }
    }

    #[tokio::test]
    async fn successful_refresh_stores_snapshot_and_summary() {
        let source = populated();
        let mut state = DashboardState::default();
        state.refresh(&source, now()).await;

        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.grants().len(), 2);
        let summary = state.summary().unwrap();
        assert_eq!(summary.total_grants, 2);
        assert_eq!(summary.success_rate, 100.0);
        assert_eq!(summary.total_awarded, 4000.0);
        assert_eq!(state.snapshot.as_ref().unwrap().progress.len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_discards_previous_snapshot() {
        let source = populated();
        let mut state = DashboardState::default();
        state.refresh(&source, now()).await;
        assert!(state.snapshot.is_some());

        source.fail_progress.store(true, Ordering::SeqCst);
        state.refresh(&source, now()).await;

        assert!(!state.loading);
        assert!(state.snapshot.is_none());
        assert!(state.grants().is_empty());
        assert!(state.summary().is_none());
        let message = state.error.as_deref().unwrap();
        assert!(message.contains("progress"));
    }

    #[tokio::test]
    async fn unreadable_grant_row_fails_the_whole_refresh() {
        let source = populated();
        let mut state = DashboardState::default();
        state.refresh(&source, now()).await;
        assert!(state.snapshot.is_some());

        source.bad_priority.store(true, Ordering::SeqCst);
        let outcome = refresh(&source, now()).await;
        match &outcome {
            RefreshOutcome::Failed { message } => {
                assert!(message.contains("Invalid grant row"));
                assert!(message.contains("unknown priority `someday`"));
            }
            other => panic!("expected failure, got {other:?}"),
        }

        state.apply(outcome);
        assert!(state.snapshot.is_none());
        assert!(state.summary().is_none());
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn recovery_clears_the_error() {
        let source = populated();
        source.fail_progress.store(true, Ordering::SeqCst);
        let mut state = DashboardState::default();
        state.refresh(&source, now()).await;
        assert!(state.error.is_some());

        source.fail_progress.store(false, Ordering::SeqCst);
        state.refresh(&source, now()).await;
        assert!(state.error.is_none());
        assert!(state.snapshot.is_some());
    }

    #[tokio::test]
    async fn unconfigured_backend_reports_single_message() {
        match refresh(&Unconfigured, now()).await {
            RefreshOutcome::Failed { message } => {
                assert!(message.contains("DATABASE_URL"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn loading_flag_tracks_in_flight_refresh() {
        let mut state = DashboardState::default();
        state.begin_refresh();
        assert!(state.loading);
        state.apply(RefreshOutcome::Failed {
            message: "offline".to_string(),
        });
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("offline"));
    }

    #[tokio::test]
    async fn missing_grant_is_not_an_error() {
        let source = populated();
        let found = lookup_grant(&source, Uuid::new_v4()).await.unwrap();
        assert!(found.is_none());

        let known = source.grants[0].id;
        let found = lookup_grant(&source, known).await.unwrap();
        assert_eq!(found.map(|grant| grant.title), Some("Arts Access".to_string()));
    }
}
