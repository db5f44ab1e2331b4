use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tracing::{debug, warn};

use crate::{
    api::ServiceApi,
    types::{DownloadRequest, FileInfo, MediaFormat},
    view::ViewModel,
};

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Empty URL: panel hidden, nothing requested.
    Hidden,
    Shown(FileInfo),
    /// Request failed; the panel is hidden and the error only logged.
    Failed,
    /// A newer lookup started while this one was in flight.
    Superseded,
}

/// Keeps the file-info panel in step with the URL and format inputs.
///
/// Each lookup takes a generation number. Only the newest generation may
/// touch the view, so an older response arriving late is dropped.
#[derive(Clone)]
pub struct FileInfoFetcher {
    api: Arc<dyn ServiceApi>,
    view: ViewModel,
    generation: Arc<AtomicU64>,
}

impl FileInfoFetcher {
    pub fn new(api: Arc<dyn ServiceApi>, view: ViewModel) -> Self {
        Self {
            api,
            view,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Invalidates any lookup still in flight.
    pub fn supersede(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Runs for every URL edit and format change.
    pub async fn lookup(&self, url: &str, format: MediaFormat) -> LookupOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let url = url.trim().to_string();

        if url.is_empty() {
            self.view.update(|v| {
                v.url_input.clear();
                v.format = format;
                v.hide_file_info();
            });
            return LookupOutcome::Hidden;
        }

        self.view.update(|v| {
            v.url_input = url.clone();
            v.format = format;
        });

        let result = self
            .api
            .file_info(&DownloadRequest {
                url: url.clone(),
                format,
            })
            .await;

        let mut outcome = LookupOutcome::Superseded;
        self.view.update(|v| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            outcome = match result {
                Ok(info) => {
                    v.show_file_info(&info);
                    LookupOutcome::Shown(info)
                }
                Err(e) => {
                    warn!("Error getting file info for {}: {}", url, e);
                    v.hide_file_info();
                    LookupOutcome::Failed
                }
            };
        });

        if outcome == LookupOutcome::Superseded {
            debug!("dropped file info for {} (generation {})", url, generation);
        }
        outcome
    }
}
