use std::env;
use std::path::PathBuf;

fn default_log_level() -> String {
    env::var("LESSOND_LOG").unwrap_or_else(|_| "info".to_string())
}

fn default_log_format() -> String {
    env::var("LESSOND_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string())
}

fn default_workspace() -> Option<PathBuf> {
    env::var("LESSOND_WORKSPACE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Process settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_format: String,
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            log_level: default_log_level(),
            log_format: default_log_format(),
            workspace: default_workspace(),
        }
    }
}
