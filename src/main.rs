use log::{debug, warn};
use std::process;

use crate::shell::Shell;
use crate::utils::config::Config;
use crate::utils::log::init_logger;

mod shell;
mod utils;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new();
    init_logger(&config);
    debug!("configuration loaded from {}", config.config_dir.display());
    for warning in &config.warnings {
        warn!("{}", warning);
    }

    if let Err(e) = config.ensure_dirs() {
        warn!("could not create {}: {}", config.history_file.display(), e);
    }
    if !config.color {
        colored::control::set_override(false);
    }

    let code = Shell::new(&config)?.run()?;
    process::exit(code);
}
