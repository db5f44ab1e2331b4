use std::sync::Arc;

use anyhow::Result;
use download_client::{DownloadSession, types::MediaFormat};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::pretty_print::{Palette, PanelPrinter, spawn_renderer};

const HELP: &str = "\
Paste a URL to look it up, then type :get to download it.
  :format <name>  choose the output format
  :get            download the current URL
  :cancel         stop the running download (Ctrl-C works too)
  :help           show this text
  :quit           leave (Ctrl-D works too)
An empty line clears the URL.";

#[derive(Debug, PartialEq)]
enum Input {
    Url(String),
    Format(String),
    Get,
    Cancel,
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix(':') else {
            return Input::Url(line.to_string());
        };
        let mut words = command.split_whitespace();
        match (words.next(), words.next()) {
            (Some("format" | "f"), Some(name)) => Input::Format(name.to_string()),
            (Some("get" | "g"), None) => Input::Get,
            (Some("cancel" | "c"), None) => Input::Cancel,
            (Some("help" | "h"), None) => Input::Help,
            (Some("quit" | "q"), None) => Input::Quit,
            _ => Input::Unknown(line.to_string()),
        }
    }
}

/// Line-driven front end: each typed URL refreshes the file-info panel, and
/// `:get` submits it while the prompt stays usable.
pub async fn run(session: Arc<DownloadSession>, format: MediaFormat, palette: Palette) -> Result<()> {
    println!("{HELP}");
    session.view().update(|v| v.format = format);

    let stop = CancellationToken::new();
    let renderer = spawn_renderer(session.view(), PanelPrinter::new(palette), stop.clone());
    let mut jobs = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        // reap finished lookups and downloads
        while jobs.try_join_next().is_some() {}

        match Input::parse(&line) {
            Input::Url(url) => {
                session.view().update(|v| v.url_input = url.clone());
                let format = session.view().snapshot().format;
                spawn_preview(&mut jobs, &session, url, format);
            }
            Input::Format(name) => match name.parse::<MediaFormat>() {
                Ok(format) => {
                    session.view().update(|v| v.format = format);
                    let url = session.view().snapshot().url_input;
                    spawn_preview(&mut jobs, &session, url, format);
                }
                Err(e) => eprintln!("{e}"),
            },
            Input::Get => {
                let state = session.view().snapshot();
                if state.url_input.trim().is_empty() {
                    eprintln!("type a URL first");
                    continue;
                }
                let session = session.clone();
                jobs.spawn(async move {
                    match session.submit(&state.url_input, state.format).await {
                        Ok(done) => info!("{} finished in {}s", done.download_id, done.elapsed.num_seconds()),
                        Err(e) => debug!("submission ended: {}", e),
                    }
                });
            }
            Input::Cancel => session.cancel(),
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Unknown(text) => eprintln!("unknown command '{text}', try :help"),
        }
    }

    session.cancel();
    jobs.shutdown().await;
    stop.cancel();
    renderer.await?;
    Ok(())
}

fn spawn_preview(
    jobs: &mut JoinSet<()>,
    session: &Arc<DownloadSession>,
    url: String,
    format: MediaFormat,
) {
    let session = session.clone();
    jobs.spawn(async move {
        let outcome = session.preview(&url, format).await;
        debug!("lookup for '{}' ended as {:?}", url, outcome);
    });
}
