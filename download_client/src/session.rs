use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, Utc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    api::{RetrievedFile, ServiceApi, local_file_name},
    client_config::ClientConfig,
    errors::{ClientError, Result},
    file_info::{FileInfoFetcher, LookupOutcome},
    poller::ProgressPoller,
    types::{DownloadRequest, MediaFormat, ProgressReport},
    view::ViewModel,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedDownload {
    pub download_id: String,
    pub file: RetrievedFile,
    pub submitted_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// One front-end session against the download service.
///
/// Owns the view, the file-info fetcher and at most one active job. A new
/// submission cancels whatever job the session was still following.
pub struct DownloadSession {
    api: Arc<dyn ServiceApi>,
    config: ClientConfig,
    view: ViewModel,
    file_info: FileInfoFetcher,
    output_dir: PathBuf,
    active: Mutex<Option<CancellationToken>>,
}

impl DownloadSession {
    pub fn new(api: Arc<dyn ServiceApi>, config: ClientConfig, output_dir: impl Into<PathBuf>) -> Self {
        let view = ViewModel::new();
        Self {
            file_info: FileInfoFetcher::new(api.clone(), view.clone()),
            api,
            config,
            view,
            output_dir: output_dir.into(),
            active: Mutex::new(None),
        }
    }

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Refreshes the file-info panel for the current inputs.
    pub async fn preview(&self, url: &str, format: MediaFormat) -> LookupOutcome {
        self.file_info.lookup(url, format).await
    }

    /// Stops the job this session is following, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.lock_active().take() {
            token.cancel();
        }
    }

    /// Submits `url`, follows the job and retrieves the finished file.
    ///
    /// Failures are shown in the error panel before being returned; a
    /// cancelled submission leaves the view as it was.
    pub async fn submit(&self, url: &str, format: MediaFormat) -> Result<CompletedDownload> {
        let cancel = self.begin();
        let submitted_at = Utc::now();
        let url = url.trim().to_string();

        // a preview still in flight must not reopen the panel
        self.file_info.supersede();
        self.view.update(|v| {
            v.url_input = url.clone();
            v.format = format;
            v.reset_for_submit();
        });

        info!("submitting {} as {}", url, format);
        let request = DownloadRequest { url, format };
        let created = tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            created = self.api.create_download(&request) => created,
        };
        let ticket = created.map_err(|e| self.fail(e))?;
        info!(
            "service accepted job {} ({})",
            ticket.download_id, ticket.filename
        );

        self.follow(&ticket.download_id, Some(ticket.filename), &cancel, submitted_at)
            .await
    }

    /// Follows a job submitted elsewhere.
    ///
    /// With `fetch` the file is retrieved once the job finishes, using the
    /// file name from the final report; otherwise `None` is returned.
    pub async fn attach(&self, download_id: &str, fetch: bool) -> Result<Option<CompletedDownload>> {
        let cancel = self.begin();
        let started = Utc::now();
        self.view.update(|v| {
            v.status_visible = true;
            v.error_visible = false;
        });

        if !fetch {
            self.poll(download_id, &cancel).await?;
            self.view.update(|v| v.status_visible = false);
            return Ok(None);
        }
        self.follow(download_id, None, &cancel, started).await.map(Some)
    }

    async fn follow(
        &self,
        download_id: &str,
        filename: Option<String>,
        cancel: &CancellationToken,
        submitted_at: DateTime<Utc>,
    ) -> Result<CompletedDownload> {
        let report = self.poll(download_id, cancel).await?;

        let filename = filename
            .or(report.filename)
            .ok_or_else(|| self.fail(ClientError::job_failed(Some("Service did not name the finished file".into()))))?;
        let name = local_file_name(&filename).map_err(|e| self.fail(e))?.to_string();

        // let the full bar show before the file is pulled
        tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = sleep(self.config.completion_delay) => {}
        }

        let file = self
            .api
            .retrieve_file(&name, &self.output_dir, cancel)
            .await
            .map_err(|e| self.fail(e))?;
        info!("saved {} ({} bytes)", file.path.display(), file.bytes);

        self.view.update(|v| v.complete(&file));
        Ok(CompletedDownload {
            download_id: download_id.to_string(),
            file,
            submitted_at,
            elapsed: Utc::now() - submitted_at,
        })
    }

    async fn poll(
        &self,
        download_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ProgressReport> {
        let view = self.view.clone();
        ProgressPoller::new(self.api.clone(), self.config.clone())
            .run(download_id, cancel, move |report| {
                view.update(|v| v.apply_progress(report))
            })
            .await
            .map_err(|e| self.fail(e))
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.lock_active().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail(&self, err: ClientError) -> ClientError {
        if !matches!(err, ClientError::Cancelled) {
            error!("download failed: {}", err);
            let message = err.to_string();
            self.view.update(|v| v.show_error(message));
        }
        err
    }
}
