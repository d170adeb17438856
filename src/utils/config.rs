use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::shell::DEFAULT_HISTORY_LIMIT;

pub struct Config {
    /// Root module name, used as the log filter target.
    pub name: String,
    pub config_dir: PathBuf,
    pub theme: String,
    pub editor_mode: String,
    pub history_file: PathBuf,
    pub history_limit: usize,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub log_to_stderr: bool,
    pub color: bool,
    /// Problems found while loading. The logger is not installed yet at
    /// that point, so `main` logs these once it is.
    pub warnings: Vec<String>,
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}

impl Config {
    pub fn new() -> Self {
        // .env values fill in whatever the environment leaves unset
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config_dir = match lookup("HOME") {
            Some(home) if !home.is_empty() => PathBuf::from(home).join(".config/conduit"),
            _ => env::temp_dir().join("conduit"),
        };

        let mut warnings = Vec::new();
        let history_limit = match lookup("CONDUIT_HISTORY_LIMIT") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    warnings.push(format!(
                        "CONDUIT_HISTORY_LIMIT={} is not a positive number, using {}",
                        raw, DEFAULT_HISTORY_LIMIT
                    ));
                    DEFAULT_HISTORY_LIMIT
                }
            },
            None => DEFAULT_HISTORY_LIMIT,
        };

        Config {
            name: String::from("conduit"),
            theme: lookup("CONDUIT_THEME").unwrap_or_else(|| String::from("default")),
            editor_mode: lookup("CONDUIT_EDITOR").unwrap_or_else(|| String::from("emacs")),
            history_file: lookup("CONDUIT_HISTORY")
                .map(PathBuf::from)
                .unwrap_or_else(|| config_dir.join(".conduit_history")),
            history_limit,
            logger_level: lookup("CONDUIT_LOG_LEVEL").unwrap_or_else(|| String::from("info")),
            logger_dir: lookup("CONDUIT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| config_dir.join("logs")),
            log_to_stderr: lookup("CONDUIT_LOG_STDERR").is_some_and(|v| is_truthy(&v)),
            color: lookup("CONDUIT_COLOR").map_or(true, |v| is_truthy(&v)),
            config_dir,
            warnings,
        }
    }

    /// Creates the directory that holds the history file.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        if let Some(parent) = self.history_file.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}
