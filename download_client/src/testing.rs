//! Scripted [`ServiceApi`] for unit tests.

use std::{
    collections::{HashMap, VecDeque},
    path::Path,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::{
    api::{RetrievedFile, ServiceApi},
    errors::{ClientError, Result},
    types::{DownloadRequest, DownloadTicket, FileInfo, JobState, ProgressReport},
    view::ViewModel,
};

/// What the fake answers for one call.
#[derive(Clone, Debug)]
pub enum Reply<T> {
    Ok(T),
    /// Non-success status with an optional `detail`.
    Status(u16, Option<String>),
    /// Connection level failure.
    Transport,
}

impl<T> Reply<T> {
    async fn into_result(self) -> Result<T> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Status(code, detail) => Err(ClientError::BadStatus {
                status: StatusCode::from_u16(code).unwrap(),
                detail,
            }),
            Reply::Transport => Err(transport_error().await),
        }
    }
}

/// A real `reqwest::Error`, produced without touching the network.
pub async fn transport_error() -> ClientError {
    let err = reqwest::Client::new()
        .get("http://")
        .send()
        .await
        .unwrap_err();
    ClientError::HttpRequestError(err)
}

#[derive(Default)]
pub struct FakeApi {
    file_info: Mutex<HashMap<String, (Duration, Reply<FileInfo>)>>,
    create: Mutex<Option<Reply<DownloadTicket>>>,
    progress: Mutex<VecDeque<Reply<ProgressReport>>>,
    last_progress: Mutex<Option<ProgressReport>>,
    file_body: Vec<u8>,
    calls: Mutex<Vec<String>>,
    observed: Mutex<Option<ViewModel>>,
    bars: Mutex<Vec<f64>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            file_body: b"media bytes".to_vec(),
            ..Default::default()
        }
    }

    pub fn with_file_info(self, url: &str, delay: Duration, reply: Reply<FileInfo>) -> Self {
        self.file_info
            .lock()
            .unwrap()
            .insert(url.to_string(), (delay, reply));
        self
    }

    pub fn with_ticket(self, reply: Reply<DownloadTicket>) -> Self {
        *self.create.lock().unwrap() = Some(reply);
        self
    }

    /// Queues progress replies. Once drained the last report repeats.
    pub fn with_progress(self, replies: Vec<Reply<ProgressReport>>) -> Self {
        self.progress.lock().unwrap().extend(replies);
        self
    }

    pub fn status(status: JobState) -> Reply<ProgressReport> {
        Reply::Ok(ProgressReport::with_status(status))
    }

    pub fn downloading(percent: f64) -> Reply<ProgressReport> {
        Reply::Ok(ProgressReport {
            status: JobState::Downloading,
            percent: Some(percent),
            ..Default::default()
        })
    }

    /// Records the progress bar of `view` every time progress or a file is requested.
    pub fn observe(&self, view: &ViewModel) {
        *self.observed.lock().unwrap() = Some(view.clone());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn observed_bars(&self) -> Vec<f64> {
        self.bars.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
        if let Some(view) = self.observed.lock().unwrap().as_ref() {
            self.bars
                .lock()
                .unwrap()
                .push(view.snapshot().progress.bar_percent);
        }
    }
}

#[async_trait]
impl ServiceApi for FakeApi {
    async fn file_info(&self, request: &DownloadRequest) -> Result<FileInfo> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("file-info {} {}", request.url, request.format));
        let scripted = self.file_info.lock().unwrap().get(&request.url).cloned();
        let (delay, reply) = scripted.unwrap_or((Duration::ZERO, Reply::Status(400, None)));
        tokio::time::sleep(delay).await;
        reply.into_result().await
    }

    async fn create_download(&self, request: &DownloadRequest) -> Result<DownloadTicket> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("download {} {}", request.url, request.format));
        let reply = self
            .create
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Reply::Status(500, None));
        reply.into_result().await
    }

    async fn progress(&self, download_id: &str) -> Result<ProgressReport> {
        self.record(format!("progress/{}", download_id));
        let next = self.progress.lock().unwrap().pop_front();
        let reply = match next {
            Some(reply) => reply,
            None => match self.last_progress.lock().unwrap().clone() {
                Some(report) => Reply::Ok(report),
                None => Reply::Ok(ProgressReport::with_status(JobState::NotFound)),
            },
        };
        if let Reply::Ok(report) = &reply {
            *self.last_progress.lock().unwrap() = Some(report.clone());
        }
        reply.into_result().await
    }

    async fn retrieve_file(
        &self,
        filename: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<RetrievedFile> {
        self.record(format!("download/{}", filename));
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        std::fs::create_dir_all(dir)?;
        let path = dir.join(filename);
        std::fs::write(&path, &self.file_body)?;
        Ok(RetrievedFile {
            path,
            bytes: self.file_body.len() as u64,
        })
    }
}
