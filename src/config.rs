//! Per-invocation configuration.
//!
//! Every setting is resolved flag first, then environment, then default. The
//! binary does the flag and environment part through clap; [`Config::resolve`]
//! supplies the defaults.
use std::path::{Path, PathBuf};

use crate::launcher::Flavor;

/// Environment variable naming the state directory.
pub const HOME_ENV: &str = "MB_HOME";
/// Environment variable selecting the debugger flavour.
pub const DEBUGGER_ENV: &str = "MB_DEBUGGER";
/// Environment variable overriding the debugger binary.
pub const DEBUGGER_PATH_ENV: &str = "MB_DEBUGGER_PATH";

const STATE_DIR: &str = ".makebreak";
const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = "state.lock";
const SCRIPT_DIR: &str = "scripts";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    state_dir: PathBuf,
    flavor: Flavor,
    debugger_path: Option<PathBuf>,
}

impl Config {
    pub fn new(state_dir: impl Into<PathBuf>, flavor: Flavor) -> Self {
        Self {
            state_dir: state_dir.into(),
            flavor,
            debugger_path: None,
        }
    }

    /// Fill in defaults for anything the caller left unset.
    ///
    /// Without an explicit state directory we use `~/.makebreak`. If there is
    /// no home directory we fall back to `./.makebreak`.
    pub fn resolve(
        state_dir: Option<PathBuf>,
        flavor: Option<Flavor>,
        debugger_path: Option<PathBuf>,
    ) -> Self {
        let state_dir = state_dir.unwrap_or_else(default_state_dir);
        Self {
            state_dir,
            flavor: flavor.unwrap_or_default(),
            debugger_path,
        }
    }

    pub fn with_debugger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.debugger_path = Some(path.into());
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE)
    }

    pub fn script_dir(&self) -> PathBuf {
        self.state_dir.join(SCRIPT_DIR)
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// The debugger binary to run: the override if one was given, otherwise
    /// the flavour's name, looked up on `PATH` at spawn time.
    pub fn debugger(&self) -> PathBuf {
        self.debugger_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.flavor.program()))
    }
}

fn default_state_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(STATE_DIR),
        None => PathBuf::from(STATE_DIR),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn explicit_state_dir_wins() {
        let config = Config::resolve(Some("/tmp/mb".into()), None, None);
        assert_eq!(config.state_dir(), Path::new("/tmp/mb"));
        assert_eq!(config.state_file(), Path::new("/tmp/mb/state.json"));
        assert_eq!(config.lock_file(), Path::new("/tmp/mb/state.lock"));
        assert_eq!(config.script_dir(), Path::new("/tmp/mb/scripts"));
    }

    #[test]
    fn default_state_dir_is_dot_makebreak() {
        let config = Config::resolve(None, None, None);
        assert!(config.state_dir().ends_with(".makebreak"));
    }

    #[test]
    fn debugger_defaults_to_flavor_program() {
        let config = Config::resolve(Some("/tmp/mb".into()), Some(Flavor::Gdb), None);
        assert_eq!(config.debugger(), PathBuf::from("gdb"));

        let config = config.with_debugger_path("/opt/llvm/bin/lldb");
        assert_eq!(config.debugger(), PathBuf::from("/opt/llvm/bin/lldb"));
        assert_eq!(config.flavor(), Flavor::Gdb);
    }

    #[test]
    fn lldb_is_the_default_flavor() {
        let config = Config::resolve(Some("/tmp/mb".into()), None, None);
        assert_eq!(config.flavor(), Flavor::Lldb);
        assert_eq!(config.debugger(), PathBuf::from("lldb"));
    }
}
