use std::time::Duration;

use url::Url;

use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of the download service, e.g. `http://localhost:8000/`.
    pub base_url: Url,
    pub request_timeout: Duration,
    /// First delay between progress polls, and the delay used after any change.
    pub poll_interval: Duration,
    /// Ceiling for the backed-off poll delay.
    pub max_poll_interval: Duration,
    pub backoff_multiplier: f64,
    /// Fail a job whose reports stop changing for this long. `None` waits forever.
    pub stall_timeout: Option<Duration>,
    /// Consecutive transport failures tolerated while polling.
    pub retry_count: usize,
    /// Pause after `finished` so the full bar is visible before retrieval.
    pub completion_delay: Duration,
    pub buffer_size: usize,
}

impl ClientConfig {
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base(Url::parse(base_url)?),
            ..Default::default()
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://127.0.0.1:8000/").expect("static url"),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            max_poll_interval: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            stall_timeout: Some(Duration::from_secs(10 * 60)),
            retry_count: 3,
            completion_delay: Duration::from_millis(1000),
            buffer_size: 1024 * 50,
        }
    }
}

// Url::join drops the last segment unless the base ends with '/'
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
