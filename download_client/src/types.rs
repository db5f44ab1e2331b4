use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Job state as reported by `GET /progress/{id}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Starting,
    Downloading,
    Finished,
    Error,
    NotFound,
    /// Any other hook state the service forwards; treated as still running.
    #[serde(other)]
    Other,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Error | JobState::NotFound)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_bytes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ProgressReport {
    pub fn with_status(status: JobState) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

/// Metadata returned by `POST /file-info`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub estimated_time: Option<f64>,
    #[serde(default)]
    pub avg_speed: Option<f64>,
}

/// Returned by `POST /download` once the service accepted a job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTicket {
    pub download_id: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Body of both `POST /file-info` and `POST /download`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub format: MediaFormat,
}

/// Error body the service sends with non-success statuses.
///
/// `detail` is usually a string but validation failures carry a list.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn message(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::String(_) | serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp3,
    Wav,
    Flac,
    #[default]
    Mp4,
    Webm,
    Mov,
    Avi,
    Mkv,
    Mpeg,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 9] = [
        MediaFormat::Mp3,
        MediaFormat::Wav,
        MediaFormat::Flac,
        MediaFormat::Mp4,
        MediaFormat::Webm,
        MediaFormat::Mov,
        MediaFormat::Avi,
        MediaFormat::Mkv,
        MediaFormat::Mpeg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Wav => "wav",
            MediaFormat::Flac => "flac",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Webm => "webm",
            MediaFormat::Mov => "mov",
            MediaFormat::Avi => "avi",
            MediaFormat::Mkv => "mkv",
            MediaFormat::Mpeg => "mpeg",
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaFormat::Mp3 | MediaFormat::Wav | MediaFormat::Flac => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        MediaFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unsupported format '{}', use one of: {}",
                    s,
                    MediaFormat::ALL.map(|f| f.as_str()).join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn progress_report_accepts_partial_payloads() {
        let report: ProgressReport = serde_json::from_value(json!({
            "status": "downloading",
            "percent": 42.5,
            "downloaded_bytes": 1024,
            "total_bytes": null,
            "speed": 2048.0,
        }))
        .unwrap();

        assert_eq!(report.status, JobState::Downloading);
        assert_eq!(report.percent, Some(42.5));
        assert_eq!(report.downloaded_bytes, Some(1024.0));
        assert_eq!(report.total_bytes, None);
        assert_eq!(report.eta, None);
    }

    #[test]
    fn unknown_hook_states_are_not_terminal() {
        let report: ProgressReport = serde_json::from_value(json!({"status": "processing"})).unwrap();
        assert_eq!(report.status, JobState::Other);
        assert!(!report.status.is_terminal());

        let report: ProgressReport = serde_json::from_value(json!({"status": "not_found"})).unwrap();
        assert!(report.status.is_terminal());
    }

    #[test]
    fn error_body_handles_string_and_list_details() {
        let body: ErrorBody = serde_json::from_value(json!({"detail": "bad url"})).unwrap();
        assert_eq!(body.message().as_deref(), Some("bad url"));

        let body: ErrorBody =
            serde_json::from_value(json!({"detail": [{"msg": "field required"}]})).unwrap();
        assert!(body.message().unwrap().contains("field required"));

        let body: ErrorBody = serde_json::from_value(json!({})).unwrap();
        assert_eq!(body.message(), None);
    }

    #[test]
    fn media_format_parsing() {
        assert_eq!("MP3".parse::<MediaFormat>(), Ok(MediaFormat::Mp3));
        assert_eq!("mkv".parse::<MediaFormat>().unwrap().kind(), MediaKind::Video);
        assert!("gif".parse::<MediaFormat>().is_err());
        assert_eq!(
            serde_json::to_value(DownloadRequest {
                url: "https://youtu.be/x".into(),
                format: MediaFormat::Flac,
            })
            .unwrap(),
            json!({"url": "https://youtu.be/x", "format": "flac"})
        );
    }
}
