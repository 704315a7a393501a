//! Debugger sessions.
//!
//! Stored breakpoints become a list of [`Directive`]s, which a [`Script`]
//! renders in the dialect of one debugger [`Flavor`]. A [`Launcher`] starts
//! the debugger with that script and hands the terminal over to it.
//!
//! [`DebuggerLauncher`] runs the real thing. [`mock::RecordingLauncher`]
//! just remembers what it was asked to run.
use std::{
    ffi::OsString,
    fmt,
    io::Write,
    path::{Path, PathBuf},
    process::{Child, Command},
};

use snafu::prelude::*;
use tempfile::NamedTempFile;

use crate::{
    debug,
    error::{LaunchFailedSnafu, Result},
    store::Breakpoint,
};

/// Which debugger we are talking to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Flavor {
    #[default]
    Lldb,
    Gdb,
}

impl Flavor {
    /// The debugger's usual executable name.
    pub fn program(&self) -> &'static str {
        match self {
            Flavor::Lldb => "lldb",
            Flavor::Gdb => "gdb",
        }
    }

    /// Extension for exported scripts.
    pub fn extension(&self) -> &'static str {
        self.program()
    }

    /// Command line that loads `executable` and sources `script` once the
    /// target is loaded.
    pub fn args(&self, script: &Path, executable: &str) -> Vec<OsString> {
        match self {
            Flavor::Lldb => vec![
                "--source".into(),
                script.into(),
                "--".into(),
                executable.into(),
            ],
            Flavor::Gdb => vec!["-x".into(), script.into(), executable.into()],
        }
    }

    /// Lines every script of this flavour starts with.
    fn preamble(&self) -> &'static [&'static str] {
        match self {
            Flavor::Lldb => &[],
            // Otherwise gdb stops to ask about breakpoints in code that isn't
            // loaded yet.
            Flavor::Gdb => &["set breakpoint pending on"],
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program())
    }
}

/// One scripted instruction for the debugger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Load an executable. Only exported scripts carry this; at launch the
    /// executable is on the debugger's command line.
    File(String),
    SetBreakpoint(Breakpoint),
    Run,
}

impl Directive {
    pub fn render(&self, flavor: Flavor) -> String {
        match (self, flavor) {
            (Directive::File(executable), _) => format!("file {}", quote(executable)),
            (Directive::SetBreakpoint(b), Flavor::Lldb) => format!(
                "breakpoint set --file {} --line {}",
                quote(b.file()),
                b.line()
            ),
            (Directive::SetBreakpoint(b), Flavor::Gdb) => {
                format!("break {}:{}", quote(b.file()), b.line())
            }
            (Directive::Run, _) => "run".to_owned(),
        }
    }
}

/// Double quote `s` if the debugger would otherwise split it.
fn quote(s: &str) -> String {
    if s.is_empty()
        || s.chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\')
    {
        let mut quoted = String::with_capacity(s.len() + 2);
        quoted.push('"');
        for c in s.chars() {
            if c == '"' || c == '\\' {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    } else {
        s.to_owned()
    }
}

/// One breakpoint directive per breakpoint, in order, then `run`.
pub fn build_script(breakpoints: &[Breakpoint]) -> Vec<Directive> {
    breakpoints
        .iter()
        .cloned()
        .map(Directive::SetBreakpoint)
        .chain(std::iter::once(Directive::Run))
        .collect()
}

/// Directives bound to a dialect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    flavor: Flavor,
    directives: Vec<Directive>,
}

impl Script {
    pub fn new(flavor: Flavor, directives: Vec<Directive>) -> Self {
        Self { flavor, directives }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// The script text, one command per line.
    pub fn render(&self) -> String {
        let mut text = String::new();
        for line in self.flavor.preamble() {
            text.push_str(line);
            text.push('\n');
        }
        for directive in &self.directives {
            text.push_str(&directive.render(self.flavor));
            text.push('\n');
        }
        text
    }
}

/// Starts debugger sessions.
pub trait Launcher {
    type Session: Session;

    /// Start a debugger on `executable` running `script`.
    fn launch(&self, executable: &str, script: &Script) -> Result<Self::Session>;
}

/// A running debugger.
pub trait Session {
    /// Block until the debugger exits and return its exit status.
    fn wait(self) -> Result<i32>;
}

/// Runs lldb or gdb in the foreground.
#[derive(Clone, Debug)]
pub struct DebuggerLauncher {
    debugger: PathBuf,
}

impl DebuggerLauncher {
    pub fn new(debugger: impl Into<PathBuf>) -> Self {
        Self {
            debugger: debugger.into(),
        }
    }

    fn write_script(&self, script: &Script) -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("mb-")
            .suffix(&format!(".{}", script.flavor().extension()))
            .tempfile()?;
        file.write_all(script.render().as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

impl Launcher for DebuggerLauncher {
    type Session = DebuggerSession;

    fn launch(&self, executable: &str, script: &Script) -> Result<Self::Session> {
        let script_file = self.write_script(script).context(LaunchFailedSnafu {
            debugger: &self.debugger,
        })?;

        let args = script.flavor().args(script_file.path(), executable);
        debug!("launcher", "{} {:?}", self.debugger.display(), args);

        let child = Command::new(&self.debugger)
            .args(&args)
            .spawn()
            .context(LaunchFailedSnafu {
                debugger: &self.debugger,
            })?;
        log::info!(
            "started {} (pid {}) on {executable}",
            self.debugger.display(),
            child.id()
        );

        Ok(DebuggerSession {
            debugger: self.debugger.clone(),
            child,
            _interrupts: signals::IgnoreInterrupts::install(),
            _script: script_file,
        })
    }
}

/// A debugger we spawned. The script file lives as long as this does.
#[derive(Debug)]
pub struct DebuggerSession {
    debugger: PathBuf,
    child: Child,
    _interrupts: signals::IgnoreInterrupts,
    _script: NamedTempFile,
}

impl Session for DebuggerSession {
    fn wait(mut self) -> Result<i32> {
        let status = self.child.wait().context(LaunchFailedSnafu {
            debugger: &self.debugger,
        })?;
        debug!("launcher", "{} exited: {status}", self.debugger.display());

        Ok(signals::exit_code(status))
    }
}

#[cfg(unix)]
mod signals {
    use std::os::unix::process::ExitStatusExt;

    use nix::sys::signal::{self, SigHandler, Signal};

    use crate::warning;

    const FORWARDED: [Signal; 2] = [Signal::SIGINT, Signal::SIGQUIT];

    /// While alive, terminal interrupts are ignored by this process so they
    /// only reach the debugger, which shares our process group.
    #[derive(Debug)]
    pub(super) struct IgnoreInterrupts {
        previous: Vec<(Signal, SigHandler)>,
    }

    impl IgnoreInterrupts {
        pub(super) fn install() -> Self {
            let mut previous = Vec::with_capacity(FORWARDED.len());
            for sig in FORWARDED {
                // SAFETY: SIG_IGN runs no code in signal context.
                match unsafe { signal::signal(sig, SigHandler::SigIgn) } {
                    Ok(handler) => previous.push((sig, handler)),
                    Err(e) => warning!("launcher", "unable to ignore {}: {e}", sig.as_str()),
                }
            }
            Self { previous }
        }
    }

    impl Drop for IgnoreInterrupts {
        fn drop(&mut self) {
            for (sig, handler) in self.previous.drain(..) {
                // SAFETY: restores the handler that was installed before us.
                let _ = unsafe { signal::signal(sig, handler) };
            }
        }
    }

    /// Shell convention: a signal death is 128 + the signal number.
    pub(super) fn exit_code(status: std::process::ExitStatus) -> i32 {
        match (status.code(), status.signal()) {
            (Some(code), _) => code,
            (None, Some(sig)) => 128 + sig,
            (None, None) => 1,
        }
    }
}

#[cfg(not(unix))]
mod signals {
    #[derive(Debug)]
    pub(super) struct IgnoreInterrupts;

    impl IgnoreInterrupts {
        pub(super) fn install() -> Self {
            Self
        }
    }

    pub(super) fn exit_code(status: std::process::ExitStatus) -> i32 {
        status.code().unwrap_or(1)
    }
}

pub mod mock {
    //! A launcher that records instead of running anything.
    use std::{cell::RefCell, io};

    use snafu::prelude::*;

    use super::*;

    /// One recorded launch.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Launch {
        pub executable: String,
        pub script: Script,
    }

    #[derive(Debug, Default)]
    pub struct RecordingLauncher {
        launches: RefCell<Vec<Launch>>,
        exit_code: i32,
        fail: bool,
    }

    impl RecordingLauncher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sessions report `code` when they finish.
        pub fn exiting_with(code: i32) -> Self {
            Self {
                exit_code: code,
                ..Self::default()
            }
        }

        /// Every launch fails as if the debugger weren't installed.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn launches(&self) -> Vec<Launch> {
            self.launches.borrow().clone()
        }
    }

    impl Launcher for RecordingLauncher {
        type Session = RecordedSession;

        fn launch(&self, executable: &str, script: &Script) -> Result<Self::Session> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such debugger"))
                    .context(LaunchFailedSnafu {
                        debugger: script.flavor().program(),
                    });
            }

            self.launches.borrow_mut().push(Launch {
                executable: executable.to_owned(),
                script: script.clone(),
            });

            Ok(RecordedSession(self.exit_code))
        }
    }

    #[derive(Debug)]
    pub struct RecordedSession(i32);

    impl Session for RecordedSession {
        fn wait(self) -> Result<i32> {
            Ok(self.0)
        }
    }
}
