use std::path::Path;

use colored::{Color, ColoredString, Colorize};
use download_client::view::{ViewModel, ViewState};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use utils::preferences::Theme;

const TAB_SPACE: &str = "  ";
const CLEAR_LINE: &str = "\x1B[K";
const PROGRESS_BAR_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: Color,
    pub accent: Color,
    pub ok: Color,
    pub muted: Color,
    pub error: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Palette {
                text: Color::White,
                accent: Color::BrightCyan,
                ok: Color::Green,
                muted: Color::BrightBlack,
                error: Color::BrightRed,
            },
            Theme::Light => Palette {
                text: Color::Black,
                accent: Color::Blue,
                ok: Color::Green,
                muted: Color::BrightBlack,
                error: Color::Red,
            },
        }
    }
}

/// The panel for `state`, one entry per terminal row.
pub fn render_lines(state: &ViewState, palette: &Palette) -> Vec<String> {
    let mut lines = Vec::new();

    if state.file_info_visible {
        let info = &state.file_info;
        lines.push(format!("{TAB_SPACE}{}", info.title.color(palette.text).bold()));
        lines.push(format!("{TAB_SPACE}{}", info.size.color(palette.muted)));
        lines.push(format!("{TAB_SPACE}{}", info.estimated_time.color(palette.muted)));
    }

    if state.status_visible {
        let progress = &state.progress;
        lines.push(format!("{TAB_SPACE}{}", progress.text.color(palette.accent)));
        lines.push(format!("{TAB_SPACE}{}", progress.details.color(palette.muted)));
        let (done, rest) = progress_bar(progress.bar_percent, PROGRESS_BAR_WIDTH, palette);
        lines.push(format!("{TAB_SPACE}{}{}", done, rest));
    }

    if state.error_visible {
        lines.push(format!("{TAB_SPACE}{}", state.error_text.color(palette.error).bold()));
    } else if !state.status_visible {
        if let Some(path) = &state.saved_to {
            lines.push(format!("{TAB_SPACE}{}", saved_line(path).color(palette.ok)));
        }
    }

    lines
}

fn saved_line(path: &Path) -> String {
    format!("Saved to {}", path.display())
}

fn progress_bar(percent: f64, width: usize, palette: &Palette) -> (ColoredString, ColoredString) {
    let filled = filled_cells(percent, width);
    (
        "━".repeat(filled).color(palette.ok),
        "━".repeat(width - filled).color(palette.muted),
    )
}

fn filled_cells(percent: f64, width: usize) -> usize {
    let percent = percent.clamp(0.0, 100.0);
    ((width as f64) * (percent / 100.0)).round() as usize
}

/// Redraws the panel in place as the view changes.
pub struct PanelPrinter {
    palette: Palette,
    last_height: usize,
}

impl PanelPrinter {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            last_height: 0,
        }
    }

    /// Prints `state`. With `rewind` the cursor is sent back to the top of
    /// the panel so the next draw overwrites it; the final draw should not
    /// rewind so the shell prompt lands below the panel.
    pub fn draw(&mut self, state: &ViewState, rewind: bool) {
        let mut lines = render_lines(state, &self.palette);
        let height = lines.len();
        // blank the rows a taller previous panel left behind
        while lines.len() < self.last_height {
            lines.push(String::new());
        }

        let mut out = String::new();
        for line in &lines {
            out.push_str(CLEAR_LINE);
            out.push_str(line);
            out.push('\n');
        }

        // the cursor-up stays in stdout's line buffer until the next newline,
        // so an interrupt leaves the panel on screen
        if rewind && !lines.is_empty() {
            out.push_str(&format!("\x1B[{}A", lines.len()));
            self.last_height = height;
        } else {
            self.last_height = 0;
        }
        print!("{out}");
    }
}

/// Redraws on every view change until `stop`, then leaves the last frame.
pub fn spawn_renderer(
    view: &ViewModel,
    mut printer: PanelPrinter,
    stop: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = view.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = rx.borrow_and_update().clone();
                    printer.draw(&state, true);
                }
            }
        }
        let state = rx.borrow().clone();
        printer.draw(&state, false);
    })
}
