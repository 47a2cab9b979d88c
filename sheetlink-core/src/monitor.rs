//! Follows one job to a terminal status.
//!
//! The WebSocket is the primary source. Polling runs until the socket
//! reports `connected`, and takes over for good once the socket errors or
//! closes. Both sources merge into the same [`JobStore`] in arrival order.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::api::{JobSocket, JobsApi};
use crate::config::SheetlinkConfig;
use crate::progress::ProgressReporter;
use crate::store::JobStore;
use crate::types::{JobEvent, JobState};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Counters for one monitoring run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub socket_events: usize,
    pub polls: usize,
    pub poll_failures: usize,
    /// The socket failed or closed before the job finished.
    pub socket_lost: bool,
}

/// Drives a [`JobStore`] from socket events and status polls.
pub struct JobMonitor<'a, A: JobsApi + ?Sized> {
    api: &'a A,
    socket_url: Option<String>,
    poll_interval: Duration,
    connect_timeout: Duration,
}

impl<A: JobsApi + ?Sized> std::fmt::Debug for JobMonitor<'_, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobMonitor")
            .field("socket_url", &self.socket_url)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<'a, A: JobsApi + ?Sized> JobMonitor<'a, A> {
    /// Monitor with both sources, using the configured endpoints.
    pub fn new(api: &'a A, config: &SheetlinkConfig, job_id: &str) -> Self {
        Self {
            api,
            socket_url: Some(config.job_socket_url(job_id)),
            poll_interval: config.poll_interval(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Monitor that only polls.
    pub fn polling_only(api: &'a A, poll_interval: Duration) -> Self {
        Self {
            api,
            socket_url: None,
            poll_interval,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_socket_url(mut self, url: impl Into<String>) -> Self {
        self.socket_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn open_socket(&self) -> Option<JobSocket> {
        let url = self.socket_url.as_deref()?;
        match tokio::time::timeout(self.connect_timeout, JobSocket::connect(url)).await {
            Ok(Ok(socket)) => Some(socket),
            Ok(Err(e)) => {
                warn!(error = %e, "Live updates unavailable, polling instead");
                None
            }
            Err(_) => {
                warn!("Live update connect timed out, polling instead");
                None
            }
        }
    }

    /// Run until the job in `store` reaches a terminal status.
    ///
    /// Never fails: socket problems switch to polling and poll failures are
    /// logged and retried on the next tick. Dropping the future closes the
    /// socket.
    #[instrument(skip(self, store, reporter))]
    pub async fn run(
        &self,
        job_id: &str,
        store: &mut JobStore,
        reporter: &dyn ProgressReporter,
    ) -> MonitorStats {
        let mut stats = MonitorStats::default();
        if store.is_terminal() {
            return stats;
        }

        reporter.start("Analyzing", Some(100));
        if let Some(job) = store.current() {
            report(reporter, job);
        }

        let mut socket = self.open_socket().await;
        let mut socket_connected = false;
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !store.is_terminal() {
            tokio::select! {
                event = next_event(&mut socket), if socket.is_some() => {
                    match event {
                        Some(Ok(event)) => {
                            stats.socket_events += 1;
                            debug!(kind = event.kind(), "Socket event");
                            if matches!(event, JobEvent::Connected(_)) {
                                socket_connected = true;
                                info!("Live updates connected");
                            }
                            if let Some(patch) = event.into_patch() {
                                store.update_progress(patch);
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Live updates lost, polling instead");
                            socket = None;
                            socket_connected = false;
                            stats.socket_lost = true;
                        }
                        None => {
                            warn!("Live update stream ended, polling instead");
                            socket = None;
                            socket_connected = false;
                            stats.socket_lost = true;
                        }
                    }
                }
                _ = interval.tick(), if !socket_connected => {
                    stats.polls += 1;
                    match self.api.job_status(job_id).await {
                        Ok(patch) => store.update_progress(patch),
                        Err(e) => {
                            stats.poll_failures += 1;
                            warn!(error = %e, "Status poll failed");
                        }
                    }
                }
            }

            if let Some(job) = store.current() {
                report(reporter, job);
            }
        }

        if let Some(mut socket) = socket {
            socket.close().await;
        }
        reporter.finish();
        info!(
            status = %store.status().map(ToString::to_string).unwrap_or_default(),
            polls = stats.polls,
            socket_events = stats.socket_events,
            "Job finished"
        );
        stats
    }
}

async fn next_event(
    socket: &mut Option<JobSocket>,
) -> Option<Result<JobEvent, crate::error::SocketError>> {
    match socket {
        Some(socket) => socket.next().await,
        None => std::future::pending().await,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn report(reporter: &dyn ProgressReporter, job: &JobState) {
    reporter.set_position(job.progress_percent.clamp(0.0, 100.0).round() as u64);
    let status = match (&job.current_stage, &job.message) {
        (Some(stage), _) => stage.message().to_string(),
        (None, Some(message)) => message.clone(),
        (None, None) => job.status.to_string(),
    };
    reporter.set_status(&status);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use serde_json::Value;

    use super::*;
    use crate::error::{ApiError, Result};
    use crate::progress::IndicatifReporter;
    use crate::types::{
        ConfirmPreviewRequest, ConfirmPreviewResponse, CreateJobResponse, JobProgress, JobStatus,
        PreviewResponse,
    };
    use crate::validate::FileCandidate;

    /// Serves queued poll responses; repeats the last one when drained.
    struct ScriptedApi {
        polls: Mutex<Vec<Result<JobProgress>>>,
    }

    impl ScriptedApi {
        fn new(mut polls: Vec<Result<JobProgress>>) -> Self {
            polls.reverse();
            Self {
                polls: Mutex::new(polls),
            }
        }
    }

    fn running(pct: f64) -> Result<JobProgress> {
        Ok(JobProgress {
            progress_percent: Some(pct),
            ..JobProgress::with_status(JobStatus::Running)
        })
    }

    fn completed() -> Result<JobProgress> {
        Ok(JobProgress {
            progress_percent: Some(100.0),
            ..JobProgress::with_status(JobStatus::Completed)
        })
    }

    #[async_trait::async_trait]
    impl JobsApi for ScriptedApi {
        async fn create_job(
            &self,
            _files: &[FileCandidate],
            _progress: Arc<dyn ProgressReporter>,
        ) -> Result<CreateJobResponse> {
            unimplemented!()
        }

        async fn job_status(&self, _job_id: &str) -> Result<JobProgress> {
            let mut polls = self.polls.lock().unwrap();
            if polls.len() > 1 {
                polls.pop().unwrap()
            } else {
                match polls.last().unwrap() {
                    Ok(p) => Ok(p.clone()),
                    Err(_) => Err(ApiError::Network("down".into()).into()),
                }
            }
        }

        async fn job_result(&self, _job_id: &str) -> Result<Value> {
            unimplemented!()
        }

        async fn delete_job(&self, _job_id: &str) -> Result<Value> {
            unimplemented!()
        }

        async fn create_preview(
            &self,
            _files: &[FileCandidate],
            _progress: Arc<dyn ProgressReporter>,
        ) -> Result<PreviewResponse> {
            unimplemented!()
        }

        async fn confirm_preview(
            &self,
            _preview_id: &str,
            _request: &ConfirmPreviewRequest,
        ) -> Result<ConfirmPreviewResponse> {
            unimplemented!()
        }

        async fn cancel_preview(&self, _preview_id: &str) -> Result<()> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_terminal() {
        let api = ScriptedApi::new(vec![running(10.0), running(60.0), completed()]);
        let monitor = JobMonitor::polling_only(&api, Duration::from_secs(3));
        let mut store = JobStore::new();
        store.set_current_job(JobProgress {
            job_id: Some("j1".into()),
            ..JobProgress::default()
        });
        let reporter = IndicatifReporter::hidden();

        let stats = monitor.run("j1", &mut store, &reporter).await;

        assert_eq!(stats.polls, 3);
        assert_eq!(store.status(), Some(&JobStatus::Completed));
        assert!(!stats.socket_lost);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failures_do_not_stop_monitoring() {
        let api = ScriptedApi::new(vec![
            Err(ApiError::Network("refused".into()).into()),
            running(50.0),
            Err(ApiError::Timeout("slow".into()).into()),
            completed(),
        ]);
        let monitor = JobMonitor::polling_only(&api, Duration::from_secs(3));
        let mut store = JobStore::new();
        let reporter = IndicatifReporter::hidden();

        let stats = monitor.run("j1", &mut store, &reporter).await;

        assert_eq!(stats.polls, 4);
        assert_eq!(stats.poll_failures, 2);
        assert!(store.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_socket_falls_back_to_polling() {
        let api = ScriptedApi::new(vec![running(20.0), completed()]);
        let monitor = JobMonitor::polling_only(&api, Duration::from_secs(3))
            .with_socket_url("ws://127.0.0.1:1/api/v1/jobs/j1/ws")
            .with_connect_timeout(Duration::from_millis(200));
        let mut store = JobStore::new();
        let reporter = IndicatifReporter::hidden();

        let stats = monitor.run("j1", &mut store, &reporter).await;

        assert_eq!(stats.socket_events, 0);
        assert_eq!(store.status(), Some(&JobStatus::Completed));
    }

    #[tokio::test]
    async fn terminal_job_returns_immediately() {
        let api = ScriptedApi::new(vec![running(1.0)]);
        let monitor = JobMonitor::polling_only(&api, Duration::from_secs(3));
        let mut store = JobStore::new();
        store.set_current_job(JobProgress::with_status(JobStatus::Failed));
        let stats = monitor.run("j1", &mut store, &crate::progress::NoopReporter).await;
        assert_eq!(stats, MonitorStats::default());
    }

    #[test]
    fn report_prefers_stage_message() {
        let reporter = IndicatifReporter::hidden();
        let mut job = JobState::from_patch(JobProgress {
            progress_percent: Some(42.6),
            message: Some("working".into()),
            ..JobProgress::with_status(JobStatus::Running)
        });
        report(&reporter, &job);
        assert_eq!(reporter.position(), 43);

        job.progress_percent = 250.0;
        report(&reporter, &job);
        assert_eq!(reporter.position(), 100);
    }
}
