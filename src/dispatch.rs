//! The verbs `mb` understands.
//!
//! Each [`Command`] resolves its target through the [`Store`], does its one
//! thing, and saves if it changed anything. Output goes to the writer the
//! caller hands in; diagnostics go to the log.
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use snafu::prelude::*;

use crate::{
    debug,
    error::{OutputSnafu, Result, StateIoSnafu},
    launcher::{build_script, Directive, Launcher, Script, Session},
    store::{Breakpoint, StateFile, Store},
    toggle::{clear, toggle},
    warning, Config,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Toggle a breakpoint.
    Break {
        executable: Option<String>,
        breakpoint: Breakpoint,
    },
    /// List a target's breakpoints.
    Print { executable: Option<String> },
    /// Make `executable` the current target.
    Touch { executable: String },
    /// Forget a target's breakpoints, or with `all`, everything.
    Clean {
        executable: Option<String>,
        all: bool,
    },
    /// Export a debugger script per target.
    Build,
    /// Start the debugger.
    Launch { executable: Option<String> },
}

/// Run `command` and return the process exit code.
///
/// Everything but [`Command::Launch`] returns 0 on success; a launch returns
/// whatever the debugger exited with.
pub fn run<L, W>(command: Command, config: &Config, launcher: &L, out: &mut W) -> Result<i32>
where
    L: Launcher,
    W: Write,
{
    let state = StateFile::new(config);
    debug!("dispatch", "{command:?} with state at {}", state.path().display());

    match command {
        Command::Break {
            executable,
            breakpoint,
        } => {
            let result = state.update(|store| {
                let target = store.resolve_target(executable.as_deref())?;
                Ok(toggle(store, &target, breakpoint))
            })?;
            writeln!(out, "{result}").context(OutputSnafu)?;
        }
        Command::Print { executable } => {
            let mut store = state.read()?;
            let target = store.resolve_target(executable.as_deref())?;
            for breakpoint in store.breakpoints(&target) {
                writeln!(out, "{breakpoint}").context(OutputSnafu)?;
            }
        }
        Command::Touch { executable } => {
            state.update(|store| {
                store.touch(executable.as_str());
                Ok(())
            })?;
            log::info!("current executable is now {executable}");
        }
        Command::Clean { all: true, .. } => {
            state.destroy()?;
            writeln!(out, "removed all breakpoints").context(OutputSnafu)?;
        }
        Command::Clean {
            executable,
            all: false,
        } => {
            let count = state.update(|store| {
                let target = store.resolve_target(executable.as_deref())?;
                Ok(clear(store, &target))
            })?;
            writeln!(out, "{count} breakpoint(s) cleared").context(OutputSnafu)?;
        }
        Command::Build => {
            let store = state.read()?;
            for path in export_scripts(&store, config)? {
                writeln!(out, "{}", path.display()).context(OutputSnafu)?;
            }
        }
        Command::Launch { executable } => {
            // The lock is released once `read` returns; the debugger may run
            // for hours and other invocations must not wait on it.
            let mut store = state.read()?;
            let target = store.resolve_target(executable.as_deref())?;
            let script = Script::new(config.flavor(), build_script(store.breakpoints(&target)));

            let session = launcher.launch(&target, &script)?;
            return session.wait();
        }
    }

    Ok(0)
}

/// Write `<stem>.<ext>` for every target whose executable exists, and return
/// the paths written.
///
/// The scripts are self-contained: load the executable, set the breakpoints,
/// run. Executables that share a file stem overwrite each other's script.
fn export_scripts(store: &Store, config: &Config) -> Result<Vec<PathBuf>> {
    let dir = config.script_dir();
    let flavor = config.flavor();
    let mut written = Vec::new();

    for (executable, target) in store.targets() {
        let path = Path::new(executable);
        let Some(stem) = path.file_stem() else {
            warning!("dispatch", "skipping `{executable}`: no file name");
            continue;
        };
        if !path.is_file() {
            warning!("dispatch", "skipping `{executable}`: not found");
            continue;
        }

        let mut directives = vec![Directive::File(executable.to_owned())];
        directives.extend(build_script(target.breakpoints()));
        let script = Script::new(flavor, directives);

        fs::create_dir_all(&dir).context(StateIoSnafu {
            description: "failed to create script directory",
            path: &dir,
        })?;
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(flavor.extension());
        let out = dir.join(name);
        fs::write(&out, script.render()).context(StateIoSnafu {
            description: "failed to write script",
            path: &out,
        })?;

        debug!("dispatch", "wrote {}", out.display());
        written.push(out);
    }

    Ok(written)
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{launcher::mock::RecordingLauncher, launcher::Flavor, store::test::bp};

    fn setup() -> (tempfile::TempDir, Config) {
        let _ = env_logger::builder().is_test(true).try_init();
        color_backtrace::install();

        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("state"), Flavor::Lldb);
        (dir, config)
    }

    fn exec(config: &Config, command: Command) -> Result<(i32, String)> {
        let launcher = RecordingLauncher::new();
        let mut out = Vec::new();
        let code = run(command, config, &launcher, &mut out)?;
        Ok((code, String::from_utf8(out).unwrap()))
    }

    #[test]
    fn touch_does_not_create_targets() {
        let (_dir, config) = setup();
        exec(
            &config,
            Command::Touch {
                executable: "a.out".to_owned(),
            },
        )
        .unwrap();

        let store = StateFile::new(&config).load().unwrap();
        assert_eq!(store.last_touched(), Some("a.out"));
        assert_eq!(store.targets().count(), 0);
    }

    #[test]
    fn print_does_not_save() {
        let (_dir, config) = setup();
        let (_, out) = exec(
            &config,
            Command::Print {
                executable: Some("a.out".to_owned()),
            },
        )
        .unwrap();

        assert_eq!(out, "");
        assert!(!config.state_file().exists());
    }

    #[test]
    fn clean_reports_count() {
        let (_dir, config) = setup();
        for line in [1, 2] {
            exec(
                &config,
                Command::Break {
                    executable: Some("a.out".to_owned()),
                    breakpoint: bp("main.c", line),
                },
            )
            .unwrap();
        }

        let (_, out) = exec(
            &config,
            Command::Clean {
                executable: None,
                all: false,
            },
        )
        .unwrap();
        assert_eq!(out, "2 breakpoint(s) cleared\n");

        let store = StateFile::new(&config).load().unwrap();
        assert!(store.breakpoints("a.out").is_empty());
        assert_eq!(store.last_touched(), Some("a.out"));
    }

    #[test]
    fn build_skips_missing_executables() {
        let (dir, config) = setup();
        let exe = dir.path().join("app");
        fs::write(&exe, b"").unwrap();
        let exe = exe.to_str().unwrap().to_owned();

        for executable in [exe.clone(), "/no/such/binary".to_owned()] {
            exec(
                &config,
                Command::Break {
                    executable: Some(executable),
                    breakpoint: bp("main.c", 3),
                },
            )
            .unwrap();
        }

        let (_, out) = exec(&config, Command::Build).unwrap();
        let script = config.script_dir().join("app.lldb");
        assert_eq!(out, format!("{}\n", script.display()));
        assert_eq!(
            fs::read_to_string(script).unwrap(),
            format!("file {exe}\nbreakpoint set --file main.c --line 3\nrun\n")
        );
    }
}
