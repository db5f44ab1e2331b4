//! Explicit UI state.
//!
//! Every user-visible effect of the client is a transition on [`ViewState`].
//! Front-ends subscribe to a [`ViewModel`] and redraw the latest snapshot,
//! so rendering stays a pure function of the state.

use std::{path::PathBuf, sync::Arc};

use tokio::sync::watch;

use crate::{
    api::RetrievedFile,
    types::{FileInfo, JobState, MediaFormat, ProgressReport},
    utils::{format_file_size, format_percent, format_speed, format_time},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressPanel {
    /// Width of the progress bar, 0 to 100.
    pub bar_percent: f64,
    pub text: String,
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileInfoPanel {
    pub title: String,
    pub size: String,
    pub estimated_time: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub url_input: String,
    pub format: MediaFormat,
    pub status_visible: bool,
    pub error_visible: bool,
    pub file_info_visible: bool,
    pub progress: ProgressPanel,
    pub error_text: String,
    pub file_info: FileInfoPanel,
    /// Where the last finished download was written.
    pub saved_to: Option<PathBuf>,
}

impl ViewState {
    /// Submission starts: status shown, error and file info hidden.
    pub fn reset_for_submit(&mut self) {
        self.status_visible = true;
        self.error_visible = false;
        self.file_info_visible = false;
        self.saved_to = None;
        self.apply_progress(&ProgressReport::with_status(JobState::Starting));
    }

    pub fn apply_progress(&mut self, report: &ProgressReport) {
        let panel = &mut self.progress;
        match report.status {
            JobState::Starting => {
                panel.bar_percent = 0.0;
                panel.text = "Starting download...".into();
                panel.details = "Initializing...".into();
            }
            JobState::Downloading => {
                let percent = report.percent.unwrap_or(0.0);
                panel.bar_percent = percent.clamp(0.0, 100.0);
                panel.text = format!("Downloading: {}", format_percent(percent));
                panel.details = format!(
                    "{} of {} ({}) - ETA: {}",
                    format_file_size(report.downloaded_bytes),
                    format_file_size(report.total_bytes),
                    format_speed(report.speed),
                    format_time(report.eta),
                );
            }
            JobState::Finished => {
                panel.bar_percent = 100.0;
                panel.text = "Processing...".into();
                panel.details = "Converting to selected format...".into();
            }
            JobState::Error | JobState::NotFound | JobState::Other => {}
        }
    }

    /// Shows `message` in the error panel. The status panel is hidden with it.
    pub fn show_error(&mut self, message: impl Into<String>) {
        self.error_text = message.into();
        self.error_visible = true;
        self.status_visible = false;
    }

    pub fn show_file_info(&mut self, info: &FileInfo) {
        self.file_info = FileInfoPanel {
            title: format!("Title: {}", info.title.as_deref().unwrap_or("unknown")),
            size: format!("Size: {}", format_file_size(info.filesize)),
            estimated_time: format!(
                "Estimated download time: {} (at {})",
                format_time(info.estimated_time),
                format_speed(info.avg_speed)
            ),
        };
        self.file_info_visible = true;
    }

    pub fn hide_file_info(&mut self) {
        self.file_info_visible = false;
    }

    /// The finished file is on disk: clear the form.
    pub fn complete(&mut self, file: &RetrievedFile) {
        self.url_input.clear();
        self.status_visible = false;
        self.file_info_visible = false;
        self.saved_to = Some(file.path.clone());
    }
}

/// Shared, observable [`ViewState`].
#[derive(Clone, Debug)]
pub struct ViewModel {
    state: Arc<watch::Sender<ViewState>>,
}

impl ViewModel {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// Applies one transition and wakes every subscriber.
    pub fn update(&self, transition: impl FnOnce(&mut ViewState)) {
        self.state.send_modify(transition);
    }
}

impl Default for ViewModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_reset_shows_starting_state() {
        let mut view = ViewState {
            error_visible: true,
            file_info_visible: true,
            ..Default::default()
        };
        view.progress.bar_percent = 80.0;

        view.reset_for_submit();

        assert!(view.status_visible);
        assert!(!view.error_visible);
        assert!(!view.file_info_visible);
        assert_eq!(view.progress.bar_percent, 0.0);
        assert_eq!(view.progress.text, "Starting download...");
        assert_eq!(view.progress.details, "Initializing...");
    }

    #[test]
    fn downloading_report_renders_details() {
        let mut view = ViewState::default();
        view.apply_progress(&ProgressReport {
            status: JobState::Downloading,
            percent: Some(50.0),
            downloaded_bytes: Some(1536.0),
            total_bytes: Some(3072.0),
            speed: Some(1048576.0),
            eta: Some(125.0),
            ..Default::default()
        });

        assert_eq!(view.progress.bar_percent, 50.0);
        assert_eq!(view.progress.text, "Downloading: 50.0%");
        assert_eq!(view.progress.details, "1.5 KB of 3 KB (1.00 MB/s) - ETA: 2m 5s");
    }

    #[test]
    fn downloading_without_numbers_falls_back() {
        let mut view = ViewState::default();
        view.apply_progress(&ProgressReport::with_status(JobState::Downloading));

        assert_eq!(view.progress.bar_percent, 0.0);
        assert_eq!(view.progress.text, "Downloading: 0.0%");
        assert_eq!(
            view.progress.details,
            "0 Bytes of 0 Bytes (0 MB/s) - ETA: calculating..."
        );
    }

    #[test]
    fn finished_fills_bar_and_unknown_states_leave_panel() {
        let mut view = ViewState::default();
        view.apply_progress(&ProgressReport::with_status(JobState::Finished));
        assert_eq!(view.progress.bar_percent, 100.0);
        assert_eq!(view.progress.text, "Processing...");

        let before = view.progress.clone();
        view.apply_progress(&ProgressReport::with_status(JobState::Other));
        assert_eq!(view.progress, before);
    }

    #[test]
    fn error_hides_status() {
        let mut view = ViewState::default();
        view.reset_for_submit();
        view.show_error("Download not found");

        assert!(view.error_visible);
        assert!(!view.status_visible);
        assert_eq!(view.error_text, "Download not found");
    }

    #[test]
    fn file_info_panel_text() {
        let mut view = ViewState::default();
        view.show_file_info(&FileInfo {
            title: Some("Never Gonna Give You Up".into()),
            filesize: Some(5.0 * 1024.0 * 1024.0),
            estimated_time: Some(1.0),
            avg_speed: Some(5.0 * 1024.0 * 1024.0),
            ..Default::default()
        });

        assert!(view.file_info_visible);
        assert_eq!(view.file_info.title, "Title: Never Gonna Give You Up");
        assert_eq!(view.file_info.size, "Size: 5 MB");
        assert_eq!(
            view.file_info.estimated_time,
            "Estimated download time: 1s (at 5.00 MB/s)"
        );
    }

    #[test]
    fn complete_clears_form() {
        let mut view = ViewState {
            url_input: "https://youtu.be/abc".into(),
            status_visible: true,
            file_info_visible: true,
            ..Default::default()
        };
        view.complete(&RetrievedFile {
            path: PathBuf::from("/tmp/clip.mp4"),
            bytes: 10,
        });

        assert!(view.url_input.is_empty());
        assert!(!view.status_visible);
        assert!(!view.file_info_visible);
        assert_eq!(view.saved_to, Some(PathBuf::from("/tmp/clip.mp4")));
    }

    #[tokio::test]
    async fn view_model_notifies_subscribers() {
        let model = ViewModel::new();
        let mut rx = model.subscribe();

        model.update(|v| v.show_error("boom"));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().error_text, "boom");
        assert!(model.snapshot().error_visible);
    }
}
