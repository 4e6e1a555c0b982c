// Logging goes to stderr; stdout carries the IPC responses.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    /// JSON lines
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

fn build_env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let directives = [level.trim().to_string(), "rusqlite=warn".to_string()];
    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{}': {}", filter_str, e))
}

pub fn init_logging(level: &str, format: &str) -> anyhow::Result<()> {
    let filter = build_env_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    let installed = match LogFormat::parse(format) {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("unable to install logger: {}", e))?;

    tracing::trace!(level, format, "logging initialized");
    Ok(())
}
