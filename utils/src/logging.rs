use std::path::PathBuf;
use std::sync::Once;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// Global initialization guard
static INIT: Once = Once::new();

/// Configuration for logging initialization
pub struct LogConfig {
    /// Name used for the log file and the crate directive
    pub app_name: String,
    /// Directory where log files will be stored, `None` disables file logging
    pub log_dir: Option<PathBuf>,
    /// Level written to the log file
    pub file_level: Level,
    /// Level written to stderr
    pub console_level: Level,
    /// Whether to also log to stderr
    pub log_to_console: bool,
    /// Optional custom env filter string, overrides both levels
    pub env_filter: Option<String>,
    /// List of dependency crates to silence
    pub silent_deps: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "media-grab".into(),
            log_dir: Some(PathBuf::from("logs")),
            file_level: Level::DEBUG,
            console_level: Level::WARN,
            log_to_console: true,
            env_filter: None,
            silent_deps: vec!["hyper_util".into(), "reqwest".into(), "mio".into()],
        }
    }
}

/// Initialize logging for the application
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = initialize_logging_internal(config);
    });

    result
}

fn initialize_logging_internal(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut layers = Vec::new();

    // Console goes to stderr so it never tears the progress panel on stdout
    if config.log_to_console {
        let stderr_layer = fmt::Layer::new()
            .with_ansi(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact();

        layers.push(
            stderr_layer
                .with_filter(build_filter(&config, config.console_level)?)
                .boxed(),
        );
    }

    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, log_dir, format!("{}.log", config.app_name));

        let file_layer = fmt::Layer::new()
            .with_ansi(false)
            .with_writer(file_appender)
            .with_target(true);

        layers.push(
            file_layer
                .with_filter(build_filter(&config, config.file_level)?)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    Ok(())
}

fn build_filter(config: &LogConfig, level: Level) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    let mut filter = if let Some(filter_str) = &config.env_filter {
        EnvFilter::try_new(filter_str)?
    } else {
        EnvFilter::try_new(format!("{}", level))?
            .add_directive(format!("{}={}", crate_target(&config.app_name), level).parse()?)
    };

    // Apply silencing for noisy dependencies
    for dep in &config.silent_deps {
        filter = filter.add_directive(format!("{}=error", dep).parse()?);
    }

    Ok(filter)
}

// tracing targets use the crate name, where '-' becomes '_'
fn crate_target(app_name: &str) -> String {
    app_name.replace('-', "_")
}

/// Parses the `--console-log-level` style names.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}
