//! HTTP seam to the download service.
//!
//! [`ServiceApi`] covers the four endpoints the client talks to. The session,
//! poller and file-info fetcher only see the trait, so tests swap in a
//! scripted implementation.

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    client_config::ClientConfig,
    errors::{ClientError, Result},
    open_file_writer::open_file_writer,
    types::{DownloadRequest, DownloadTicket, ErrorBody, FileInfo, ProgressReport},
};

/// A file pulled from `GET /download/{filename}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

#[async_trait]
pub trait ServiceApi: Send + Sync {
    /// `POST /file-info`
    async fn file_info(&self, request: &DownloadRequest) -> Result<FileInfo>;

    /// `POST /download`
    async fn create_download(&self, request: &DownloadRequest) -> Result<DownloadTicket>;

    /// `GET /progress/{download_id}`
    async fn progress(&self, download_id: &str) -> Result<ProgressReport>;

    /// `GET /download/{filename}`, written into `dir`.
    async fn retrieve_file(
        &self,
        filename: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<RetrievedFile>;
}

pub struct ReqwestApi {
    client: Client,
    config: ClientConfig,
}

impl ReqwestApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("media-grab/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// `{base}/{prefix}/{segment}` with `segment` percent-encoded.
    pub fn endpoint(&self, prefix: &str, segment: Option<&str>) -> Result<Url> {
        let mut url = self.config.base_url.join(prefix)?;
        if let Some(segment) = segment {
            url.path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
                .pop_if_empty()
                .push(segment);
        }
        Ok(url)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        prefix: &str,
        request: &DownloadRequest,
    ) -> Result<T> {
        let url = self.endpoint(prefix, None)?;
        debug!("POST {} ({})", url, request.url);
        let response = self
            .client
            .post(url)
            .timeout(self.config.request_timeout)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ServiceApi for ReqwestApi {
    async fn file_info(&self, request: &DownloadRequest) -> Result<FileInfo> {
        self.post_json("file-info", request).await
    }

    async fn create_download(&self, request: &DownloadRequest) -> Result<DownloadTicket> {
        self.post_json("download", request).await
    }

    async fn progress(&self, download_id: &str) -> Result<ProgressReport> {
        let url = self.endpoint("progress/", Some(download_id))?;
        let response = self
            .client
            .get(url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn retrieve_file(
        &self,
        filename: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<RetrievedFile> {
        let name = local_file_name(filename)?;
        let url = self.endpoint("download/", Some(filename))?;
        debug!("GET {}", url);

        let response = check_status(self.client.get(url).send().await?).await?;

        fs::create_dir_all(dir).await?;
        let part = dir.join(format!(".{}.part", Uuid::new_v4()));
        let target = free_target(dir, name).await?;

        let retrieved = match stream_to_file(response, &part, self.config.buffer_size, cancel).await {
            Ok(bytes) => move_into_place(&part, dir, name, target)
                .await
                .map(|path| RetrievedFile { path, bytes }),
            Err(e) => Err(e),
        };

        if retrieved.is_err() {
            match fs::remove_file(&part).await {
                Err(rm) if rm.kind() != io::ErrorKind::NotFound => {
                    warn!("could not remove partial file {}: {}", part.display(), rm);
                }
                _ => {}
            }
        }
        retrieved
    }
}

const MAX_NAME_ATTEMPTS: usize = 1000;

/// `Clip.mp4`, then `Clip (1).mp4`, `Clip (2).mp4`...
fn numbered_name(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    let path = Path::new(name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

/// First name in `dir` that does not exist yet. Existing files are never replaced.
async fn free_target(dir: &Path, name: &str) -> Result<PathBuf> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let candidate = dir.join(numbered_name(name, n));
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(ClientError::FileSystemError(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for {} in {}", name, dir.display()),
    )))
}

/// Links the finished part file to `target` without clobbering, picking the
/// next free name if `target` appeared while streaming.
async fn move_into_place(part: &Path, dir: &Path, name: &str, mut target: PathBuf) -> Result<PathBuf> {
    loop {
        match fs::hard_link(part, &target).await {
            Ok(()) => {
                fs::remove_file(part).await?;
                return Ok(target);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} appeared during retrieval", target.display());
                target = free_target(dir, name).await?;
            }
            Err(e) => {
                // no hard links on this filesystem
                debug!("hard link failed ({}), renaming {}", e, part.display());
                target = free_target(dir, name).await?;
                fs::rename(part, &target).await?;
                return Ok(target);
            }
        }
    }
}

async fn stream_to_file(
    response: Response,
    path: &Path,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut writer = open_file_writer(path, buffer_size).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            chunk = stream.next() => match chunk {
                Some(chunk) => {
                    let chunk = chunk?;
                    writer.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
                None => break,
            }
        }
    }

    writer.flush().await?;
    Ok(written)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = match response.json::<ErrorBody>().await {
        Ok(body) => body.message(),
        Err(_) => None,
    };
    debug!("service answered {}: {:?}", status, detail);
    Err(ClientError::BadStatus { status, detail })
}

/// The service names files after video titles; keep only the last path component.
pub fn local_file_name(filename: &str) -> Result<&str> {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.starts_with('.'))
        .ok_or_else(|| ClientError::JobFailed(format!("Invalid file name from service: {filename}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> ReqwestApi {
        ReqwestApi::new(&ClientConfig::with_base_url(base).unwrap()).unwrap()
    }

    #[test]
    fn endpoints_encode_path_segments() {
        let api = api("http://localhost:8000");
        assert_eq!(
            api.endpoint("file-info", None).unwrap().as_str(),
            "http://localhost:8000/file-info"
        );
        assert_eq!(
            api.endpoint("progress/", Some("1f2e")).unwrap().as_str(),
            "http://localhost:8000/progress/1f2e"
        );
        assert_eq!(
            api.endpoint("download/", Some("My Song #1.mp3")).unwrap().as_str(),
            "http://localhost:8000/download/My%20Song%20%231.mp3"
        );
    }

    #[test]
    fn endpoints_respect_base_path() {
        let api = api("http://host/media/");
        assert_eq!(
            api.endpoint("download/", Some("a.mp4")).unwrap().as_str(),
            "http://host/media/download/a.mp4"
        );
    }

    #[test]
    fn numbered_names_keep_the_extension() {
        assert_eq!(numbered_name("Clip.mp4", 0), "Clip.mp4");
        assert_eq!(numbered_name("Clip.mp4", 1), "Clip (1).mp4");
        assert_eq!(numbered_name("My.Song.mp3", 2), "My.Song (2).mp3");
        assert_eq!(numbered_name("README", 3), "README (3)");
    }

    #[tokio::test]
    async fn free_target_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(free_target(dir.path(), "a.mp4").await.unwrap(), dir.path().join("a.mp4"));

        std::fs::write(dir.path().join("a.mp4"), b"mine").unwrap();
        std::fs::write(dir.path().join("a (1).mp4"), b"mine too").unwrap();
        assert_eq!(
            free_target(dir.path(), "a.mp4").await.unwrap(),
            dir.path().join("a (2).mp4")
        );
    }

    #[test]
    fn local_file_name_strips_directories() {
        assert_eq!(local_file_name("clip.mp4").unwrap(), "clip.mp4");
        assert_eq!(local_file_name("../../etc/clip.mp4").unwrap(), "clip.mp4");
        assert!(local_file_name("..").is_err());
        assert!(local_file_name("").is_err());
        assert!(local_file_name(".hidden").is_err());
    }
}
