use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

#[derive(Debug)]
struct State {
    working_dir: PathBuf,
    previous_dir: Option<PathBuf>,
    aliases: HashMap<String, String>,
    history: VecDeque<String>,
    history_limit: usize,
    env: HashMap<String, String>,
}

/// Per-shell mutable state: directories, aliases, history and the
/// environment overlay handed to child processes.
///
/// Shared as `Arc<Session>`; built-ins running as pipeline stages read it
/// from other threads, so every access goes through one reader/writer lock.
#[derive(Debug)]
pub struct Session {
    state: RwLock<State>,
}

impl Session {
    pub fn new(working_dir: impl Into<PathBuf>, history_limit: usize) -> Self {
        Self {
            state: RwLock::new(State {
                working_dir: working_dir.into(),
                previous_dir: None,
                aliases: HashMap::new(),
                history: VecDeque::new(),
                history_limit: history_limit.max(1),
                env: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn working_dir(&self) -> PathBuf {
        self.read().working_dir.clone()
    }

    pub fn set_working_dir(&self, dir: impl Into<PathBuf>) {
        self.write().working_dir = dir.into();
    }

    pub fn previous_dir(&self) -> Option<PathBuf> {
        self.read().previous_dir.clone()
    }

    pub fn set_previous_dir(&self, dir: impl Into<PathBuf>) {
        self.write().previous_dir = Some(dir.into());
    }

    /// Resolves `path` against the working directory unless it is absolute.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.read().working_dir.join(path)
        }
    }

    pub fn alias(&self, name: &str) -> Option<String> {
        self.read().aliases.get(name).cloned()
    }

    pub fn aliases(&self) -> BTreeMap<String, String> {
        self.read()
            .aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn set_alias(&self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        debug!("alias {}='{}'", name, value);
        self.write().aliases.insert(name, value);
    }

    pub fn remove_alias(&self, name: &str) -> bool {
        self.write().aliases.remove(name).is_some()
    }

    /// Appends a line to history. Empty lines and repeats of the most recent
    /// entry are skipped; the oldest entries are evicted past the limit.
    pub fn add_history(&self, line: impl Into<String>) {
        let line = line.into();
        let mut state = self.write();
        if line.is_empty() || state.history.back() == Some(&line) {
            return;
        }
        state.history.push_back(line);
        while state.history.len() > state.history_limit {
            state.history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.read().history.iter().cloned().collect()
    }

    /// Looks a variable up in the overlay first, then the process environment.
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.read()
            .env
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    }

    pub fn set_env(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        debug!("env {}={}", key, value);
        self.write().env.insert(key, value);
    }

    pub fn env_overlay(&self) -> HashMap<String, String> {
        self.read().env.clone()
    }

    /// The process environment with the overlay applied, sorted by key.
    pub fn merged_env(&self) -> BTreeMap<String, String> {
        let mut vars: BTreeMap<String, String> = std::env::vars().collect();
        vars.extend(self.env_overlay());
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directories() {
        let session = Session::new("/tmp", 10);
        assert_eq!(session.working_dir(), PathBuf::from("/tmp"));
        assert_eq!(session.previous_dir(), None);

        session.set_previous_dir("/tmp");
        session.set_working_dir("/var");
        assert_eq!(session.working_dir(), PathBuf::from("/var"));
        assert_eq!(session.previous_dir(), Some(PathBuf::from("/tmp")));

        assert_eq!(session.resolve_path("log"), PathBuf::from("/var/log"));
        assert_eq!(session.resolve_path("/etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn test_aliases() {
        let session = Session::new("/", 10);
        session.set_alias("ll", "ls -l");
        session.set_alias("g", "grep");
        assert_eq!(session.alias("ll").as_deref(), Some("ls -l"));
        assert_eq!(
            session.aliases().keys().collect::<Vec<_>>(),
            vec!["g", "ll"]
        );
        assert!(session.remove_alias("ll"));
        assert!(!session.remove_alias("ll"));
        assert_eq!(session.alias("ll"), None);
    }

    #[test]
    fn test_history_skips_empty_and_repeats() {
        let session = Session::new("/", 10);
        session.add_history("ls");
        session.add_history("ls");
        session.add_history("");
        session.add_history("pwd");
        session.add_history("ls");
        assert_eq!(session.history(), vec!["ls", "pwd", "ls"]);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let session = Session::new("/", 3);
        for line in ["a", "b", "c", "d", "e"] {
            session.add_history(line);
        }
        assert_eq!(session.history(), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_env_overlay_shadows_process_env() {
        let session = Session::new("/", 10);
        assert_eq!(session.env_var("CONDUIT_SESSION_TEST_UNSET"), None);
        session.set_env("CONDUIT_SESSION_TEST_UNSET", "1");
        assert_eq!(
            session.env_var("CONDUIT_SESSION_TEST_UNSET").as_deref(),
            Some("1")
        );
        assert!(session.env_var("PATH").is_some());
        assert_eq!(
            session.merged_env().get("CONDUIT_SESSION_TEST_UNSET").map(String::as_str),
            Some("1")
        );
    }
}
