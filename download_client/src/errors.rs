use reqwest::StatusCode;
use std::{io, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// An error occurred while making an HTTP request.
    #[error("HTTP request failed: {0}")]
    HttpRequestError(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{}", .detail.as_deref().unwrap_or("Download failed"))]
    BadStatus {
        status: StatusCode,
        detail: Option<String>,
    },

    /// The service reported the job as failed.
    #[error("{0}")]
    JobFailed(String),

    /// The service has no record of the job.
    #[error("Download not found")]
    JobNotFound,

    /// The job stopped reporting progress.
    #[error("Download stalled: no progress for {}s", .0.as_secs())]
    Stalled(Duration),

    /// The operation was cancelled locally.
    #[error("Cancelled")]
    Cancelled,

    /// Failed to create or write the output file.
    #[error("File system error: {0}")]
    FileSystemError(#[from] io::Error),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Malformed response: {0}")]
    DecodeError(#[from] serde_json::Error),
}

impl ClientError {
    /// Creates a `ClientError::JobFailed`, falling back to a generic message.
    pub fn job_failed(msg: Option<String>) -> Self {
        ClientError::JobFailed(msg.unwrap_or_else(|| "Download failed".into()))
    }

    /// Transport errors are the only ones worth retrying. A body that fails
    /// to decode will fail the same way next time.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::HttpRequestError(e) if !e.is_decode())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_status_prefers_server_detail() {
        let err = ClientError::BadStatus {
            status: StatusCode::BAD_REQUEST,
            detail: Some("bad url".into()),
        };
        assert_eq!(err.to_string(), "bad url");

        let err = ClientError::BadStatus {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: None,
        };
        assert_eq!(err.to_string(), "Download failed");
    }

    #[test]
    fn job_errors_render_user_messages() {
        assert_eq!(ClientError::JobNotFound.to_string(), "Download not found");
        assert_eq!(ClientError::job_failed(None).to_string(), "Download failed");
        assert_eq!(
            ClientError::job_failed(Some("Video unavailable".into())).to_string(),
            "Video unavailable"
        );
        assert_eq!(
            ClientError::Stalled(Duration::from_secs(600)).to_string(),
            "Download stalled: no progress for 600s"
        );
    }
}
