//! Background reconciliation of processing jobs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use kubrick_core::{JobId, SharedSession, StatusUpdate, VideoId};
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::models::RemoteTaskStatus;
use crate::client_trait::KubrickApi;
use crate::error::ApiError;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub queried: usize,
    /// Terminal statuses merged into the library.
    pub updated: usize,
    /// Non-terminal reports, or reports the entry already reflected.
    pub unchanged: usize,
    /// Status queries that errored.
    pub failed: usize,
    /// Results for entries removed while the query was in flight.
    pub discarded: usize,
}

type StatusQuery = BoxFuture<'static, (VideoId, JobId, Result<RemoteTaskStatus, ApiError>)>;

pub struct StatusPoller {
    api: Arc<dyn KubrickApi>,
    session: SharedSession,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn KubrickApi>, session: SharedSession, interval: Duration) -> Self {
        Self {
            api,
            session,
            interval,
        }
    }

    /// Spawns the polling loop. It runs until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Polls every `interval` until `cancel` fires.
    ///
    /// Queries outlive the tick that issued them: a job whose query is still
    /// pending is skipped by later ticks, and every result is merged as soon
    /// as it arrives. Cancellation drops whatever is still in flight.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Status poller started (every {:?})", self.interval);
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: FuturesUnordered<StatusQuery> = FuturesUnordered::new();
        let mut querying: HashSet<JobId> = HashSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let jobs = self.session.read().await.pollable_jobs();
                    let mut issued = 0;
                    for (video_id, job_id) in jobs {
                        if querying.insert(job_id.clone()) {
                            in_flight.push(self.query(video_id, job_id));
                            issued += 1;
                        }
                    }
                    if issued > 0 || !querying.is_empty() {
                        debug!("Poll tick: {} issued, {} in flight", issued, in_flight.len());
                    }
                }
                Some((video_id, job_id, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    querying.remove(&job_id);
                    let mut report = PollReport::default();
                    self.merge(&video_id, &job_id, result, &mut report).await;
                }
            }
        }

        if !in_flight.is_empty() {
            debug!("Dropping {} status queries still in flight", in_flight.len());
        }
        info!("Status poller stopped");
    }

    /// Queries every `in_progress` job once, merging each result as it
    /// arrives. A slow query delays only its own entry.
    pub async fn tick(&self) -> PollReport {
        let jobs = self.session.read().await.pollable_jobs();
        let mut report = PollReport {
            queried: jobs.len(),
            ..PollReport::default()
        };

        let mut in_flight: FuturesUnordered<StatusQuery> = jobs
            .into_iter()
            .map(|(video_id, job_id)| self.query(video_id, job_id))
            .collect();
        while let Some((video_id, job_id, result)) = in_flight.next().await {
            self.merge(&video_id, &job_id, result, &mut report).await;
        }
        report
    }

    fn query(&self, video_id: VideoId, job_id: JobId) -> StatusQuery {
        let api = Arc::clone(&self.api);
        async move {
            let result = api.task_status(&job_id).await;
            (video_id, job_id, result)
        }
        .boxed()
    }

    async fn merge(
        &self,
        video_id: &VideoId,
        job_id: &JobId,
        result: Result<RemoteTaskStatus, ApiError>,
        report: &mut PollReport,
    ) {
        let remote = match result {
            Ok(remote) => remote,
            Err(err) => {
                warn!("Error polling job {} for video {}: {}", job_id, video_id, err);
                report.failed += 1;
                return;
            }
        };

        let Some(status) = remote.terminal_status() else {
            if remote == RemoteTaskStatus::NotFound {
                warn!("Service does not know job {} (video {})", job_id, video_id);
            }
            report.unchanged += 1;
            return;
        };

        match self.session.write().await.apply_job_status(video_id, job_id, status) {
            StatusUpdate::Applied => report.updated += 1,
            StatusUpdate::Missing => report.discarded += 1,
            StatusUpdate::Unchanged | StatusUpdate::Rejected { .. } => report.unchanged += 1,
        }
    }
}
