mod interactive;
mod media_grab_config;
mod pretty_print;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use download_client::{
    DownloadSession, ReqwestApi,
    errors::ClientError,
    file_info::LookupOutcome,
    types::MediaFormat,
    utils::{format_file_size, format_time},
};
use media_grab_config::{MediaGrabConfig, Overrides};
use pretty_print::{Palette, PanelPrinter, spawn_renderer};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, warn};
use utils::{
    logging::{self, LogConfig},
    preferences::{PreferenceStore, Theme},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the download service
    #[arg(long = "server", value_name = "URL", global = true)]
    server: Option<String>,

    /// Set download directory
    #[arg(short = 'd', long = "dir", value_name = "DIR", global = true)]
    dir: Option<PathBuf>,

    /// Output format (mp3, wav, flac, mp4, webm, mov, avi, mkv, mpeg)
    #[arg(short = 'f', long = "format", value_name = "FORMAT", global = true)]
    format: Option<MediaFormat>,

    /// Config file, defaults to .dev/media-grab.toml
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log directory
    #[arg(short = 'l', long = "log", value_name = "DIR", global = true)]
    log: Option<PathBuf>,

    /// Set console log level
    #[arg(long = "console-log-level", value_name = "LEVEL",
          value_parser = ["trace", "debug", "info", "warn", "error"],
          default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show title, size and estimated download time for a URL
    Info { url: String },
    /// Download a URL in the chosen format
    Get { url: String },
    /// Follow a job that was submitted earlier
    Status {
        download_id: String,
        /// Save the file once the job finishes
        #[arg(long)]
        fetch: bool,
    },
    /// Show or change the colour theme
    Theme {
        #[arg(value_parser = ["dark", "light", "toggle"])]
        choice: Option<String>,
    },
    /// Prompt for URLs until :quit
    Interactive,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ClientError>() {
                Some(ClientError::Cancelled) => eprintln!("{}", "Download cancelled".yellow()),
                // already on screen in the error panel
                Some(_) => {}
                None => eprintln!("{} {:#}", "error:".red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(MediaGrabConfig::default_path);
    let config = MediaGrabConfig::load(&config_path, cli.config.is_some())?.apply(Overrides {
        server: cli.server,
        download_dir: cli.dir,
        format: cli.format,
        log_dir: cli.log,
    });

    match logging::init_logging(LogConfig {
        log_dir: Some(config.log_dir.clone()),
        console_level: logging::parse_level(&cli.log_level).unwrap_or(Level::WARN),
        ..Default::default()
    }) {
        Ok(_) => debug!("Logger initialized, config from {}", config_path.display()),
        Err(e) => eprintln!("Failed to initialize logger: {}", e),
    }

    let prefs = PreferenceStore::new(
        config_path
            .parent()
            .map(|dir| dir.join("preferences.toml"))
            .unwrap_or_else(|| PathBuf::from("preferences.toml")),
    );

    match cli.command {
        Command::Theme { choice } => theme(&prefs, choice.as_deref()),
        Command::Info { url } => {
            let session = open_session(&config)?;
            info(&session, &url, config.format, palette(&prefs)).await
        }
        Command::Get { url } => {
            let session = open_session(&config)?;
            std::fs::create_dir_all(&config.download_dir)?;
            get(session, &url, config.format, palette(&prefs)).await
        }
        Command::Status { download_id, fetch } => {
            let session = open_session(&config)?;
            if fetch {
                std::fs::create_dir_all(&config.download_dir)?;
            }
            status(session, &download_id, fetch, palette(&prefs)).await
        }
        Command::Interactive => {
            let session = open_session(&config)?;
            std::fs::create_dir_all(&config.download_dir)?;
            cancel_on_ctrl_c(&session);
            interactive::run(session, config.format, palette(&prefs)).await
        }
    }
}

fn open_session(config: &MediaGrabConfig) -> Result<Arc<DownloadSession>> {
    let client_config = config.client_config()?;
    let api = ReqwestApi::new(&client_config)
        .map_err(|e| anyhow!("failed to build HTTP client: {}", e))?;
    Ok(Arc::new(DownloadSession::new(
        Arc::new(api),
        client_config,
        &config.download_dir,
    )))
}

fn palette(prefs: &PreferenceStore) -> Palette {
    let theme = prefs.theme().unwrap_or_else(|e| {
        warn!("ignoring unreadable preferences: {:#}", e);
        Theme::default()
    });
    Palette::for_theme(theme)
}

fn cancel_on_ctrl_c(session: &Arc<DownloadSession>) {
    let session = session.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling the active download");
            session.cancel();
        }
    });
}

fn theme(prefs: &PreferenceStore, choice: Option<&str>) -> Result<()> {
    let theme = match choice {
        None => prefs.theme()?,
        Some("toggle") => prefs.toggle_theme()?,
        Some(name) => {
            let theme: Theme = name.parse()?;
            prefs.save_theme(theme)?;
            theme
        }
    };
    println!("{}", theme);
    Ok(())
}

async fn info(session: &DownloadSession, url: &str, format: MediaFormat, palette: Palette) -> Result<()> {
    let outcome = session.preview(url, format).await;
    PanelPrinter::new(palette).draw(&session.view().snapshot(), false);
    match outcome {
        LookupOutcome::Shown(_) | LookupOutcome::Superseded => Ok(()),
        LookupOutcome::Hidden => bail!("no URL given"),
        LookupOutcome::Failed => bail!("could not look up {} (see the log for details)", url),
    }
}

async fn get(session: Arc<DownloadSession>, url: &str, format: MediaFormat, palette: Palette) -> Result<()> {
    let stop = CancellationToken::new();
    let renderer = spawn_renderer(session.view(), PanelPrinter::new(palette), stop.clone());
    cancel_on_ctrl_c(&session);

    let result = session.submit(url, format).await;
    stop.cancel();
    renderer.await?;

    let done = result?;
    println!(
        "{} {} in {}",
        "Downloaded".color(palette.ok).bold(),
        format_file_size(Some(done.file.bytes as f64)),
        format_time(Some(done.elapsed.num_milliseconds() as f64 / 1000.0)),
    );
    Ok(())
}

async fn status(
    session: Arc<DownloadSession>,
    download_id: &str,
    fetch: bool,
    palette: Palette,
) -> Result<()> {
    let stop = CancellationToken::new();
    let renderer = spawn_renderer(session.view(), PanelPrinter::new(palette), stop.clone());
    cancel_on_ctrl_c(&session);

    let result = session.attach(download_id, fetch).await;
    stop.cancel();
    renderer.await?;

    if result?.is_none() {
        println!("{} {}", "Finished".color(palette.ok).bold(), download_id);
    }
    Ok(())
}
