use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::{error, trace};

pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

pub fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                error!("conduit: metadata error: {}: {}", path.display(), e);
            }
            false
        }
    }
}

/// Resolves a command name to an executable file.
///
/// Names containing `/` are taken as paths (relative ones against `cwd`).
/// Anything else is looked up in each directory of `search_path`, falling
/// back to [`DEFAULT_PATH`] when it is unset or empty; the first regular
/// executable file wins.
pub fn find_executable(name: &str, search_path: Option<&str>, cwd: &Path) -> Option<PathBuf> {
    if name.contains('/') {
        let candidate = cwd.join(name);
        return is_executable(&candidate).then_some(candidate);
    }

    let search_path = match search_path {
        Some(p) if !p.is_empty() => p,
        _ => DEFAULT_PATH,
    };

    for dir in search_path.split(':').filter(|d| !d.is_empty()) {
        let candidate = Path::new(dir).join(name);
        trace!("probing {}", candidate.display());
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Renders a path with the home directory collapsed to `~`.
pub fn tilde_path(path: &Path, home: Option<&str>) -> String {
    let display = path.to_string_lossy().to_string();
    match home {
        Some(home) if !home.is_empty() => match path.strip_prefix(home) {
            Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
            Ok(rest) => format!("~/{}", rest.display()),
            Err(_) => display,
        },
        _ => display,
    }
}
