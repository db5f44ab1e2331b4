use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::ServiceApi,
    client_config::ClientConfig,
    errors::{ClientError, Result},
    types::{JobState, ProgressReport},
};

/// Poll delay that grows while nothing changes and snaps back on progress.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(config: &ClientConfig) -> Self {
        let max = config.max_poll_interval.max(config.poll_interval);
        Self {
            base: config.poll_interval,
            max,
            multiplier: config.backoff_multiplier.max(1.0),
            current: config.poll_interval,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Returns the delay to wait now and grows the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        // saturate at the ceiling instead of overflowing Duration
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .map_or(self.max, |d| d.min(self.max));
        delay
    }
}

/// Follows one job on the service until it finishes or fails.
#[derive(Clone)]
pub struct ProgressPoller {
    api: Arc<dyn ServiceApi>,
    config: ClientConfig,
}

impl ProgressPoller {
    pub fn new(api: Arc<dyn ServiceApi>, config: ClientConfig) -> Self {
        Self { api, config }
    }

    /// Polls `GET /progress/{download_id}` and hands every running or finished
    /// report to `on_report`.
    ///
    /// Returns the `finished` report. `not_found` and `error` end the loop with
    /// [`ClientError::JobNotFound`] and [`ClientError::JobFailed`]; a job whose
    /// reports stop changing for `stall_timeout` ends with [`ClientError::Stalled`].
    /// Transport failures are retried `retry_count` times in a row.
    pub async fn run<F>(
        &self,
        download_id: &str,
        cancel: &CancellationToken,
        mut on_report: F,
    ) -> Result<ProgressReport>
    where
        F: FnMut(&ProgressReport) + Send,
    {
        let mut backoff = Backoff::new(&self.config);
        let mut last: Option<ProgressReport> = None;
        let mut last_change = Instant::now();
        let mut failures = 0;

        loop {
            let fetched = tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                fetched = self.api.progress(download_id) => fetched,
            };

            match fetched {
                // a report racing a cancel belongs to a superseded job
                Ok(_) if cancel.is_cancelled() => return Err(ClientError::Cancelled),
                Ok(report) => {
                    failures = 0;
                    debug!("{} -> {:?} {:?}%", download_id, report.status, report.percent);
                    match report.status {
                        JobState::NotFound => return Err(ClientError::JobNotFound),
                        JobState::Error => return Err(ClientError::job_failed(report.error)),
                        _ => {}
                    }

                    on_report(&report);

                    if report.status == JobState::Finished {
                        info!("download {} finished on the service", download_id);
                        return Ok(report);
                    }

                    if last.as_ref() != Some(&report) {
                        backoff.reset();
                        last_change = Instant::now();
                        last = Some(report);
                    } else if let Some(limit) = self.config.stall_timeout {
                        if last_change.elapsed() >= limit {
                            warn!("download {} made no progress for {:?}", download_id, limit);
                            return Err(ClientError::Stalled(limit));
                        }
                    }
                }
                Err(e) if e.is_transient() && failures < self.config.retry_count => {
                    failures += 1;
                    warn!(
                        "progress check {}/{} for {} failed: {}",
                        failures, self.config.retry_count, download_id, e
                    );
                }
                Err(e) => return Err(e),
            }

            let delay = backoff.next_delay();
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
    }
}
