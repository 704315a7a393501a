use std::{io, num::NonZeroU32, path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

use makebreak::{
    config::{DEBUGGER_ENV, DEBUGGER_PATH_ENV, HOME_ENV},
    launcher::DebuggerLauncher,
    run, Breakpoint, Command, Config, Flavor,
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Executable
    ///
    /// The executable to debug. If omitted, the executable used last.
    #[arg(long, short = 'x', value_name = "EXECUTABLE", global = true)]
    executable: Option<String>,
    /// State Directory
    ///
    /// Where breakpoints are kept. Defaults to `~/.makebreak`.
    #[arg(long, value_name = "DIR", env = HOME_ENV, global = true)]
    state_dir: Option<PathBuf>,
    /// Debugger
    ///
    /// Which debugger to drive.
    #[arg(long, value_enum, env = DEBUGGER_ENV, global = true)]
    debugger: Option<Flavor>,
    /// Debugger Path
    ///
    /// The debugger binary to run, if it isn't the usual name on `PATH`.
    #[arg(long, value_name = "PATH", env = DEBUGGER_PATH_ENV, global = true)]
    debugger_path: Option<PathBuf>,
    /// Verbose Output
    ///
    /// Log what `mb` is doing to stderr. `RUST_LOG` works too.
    #[arg(long, short, action = ArgAction::SetTrue, global = true)]
    verbose: bool,
    #[command(subcommand)]
    verb: Option<Verb>,
}

#[derive(Debug, Subcommand)]
enum Verb {
    /// Toggle a breakpoint
    #[command(visible_alias = "b")]
    Break {
        /// Source file, as the debugger should see it
        file: String,
        /// Line number, starting at 1
        line: NonZeroU32,
    },
    /// Print breakpoints, one `file:line` per line
    #[command(visible_alias = "p")]
    Print,
    /// Set the executable to use when `-x` is omitted
    #[command(visible_alias = "t")]
    Touch {
        #[arg(value_name = "EXECUTABLE")]
        target: String,
    },
    /// Remove the breakpoints of the current executable
    Clean {
        /// Delete all saved state, for every executable
        #[arg(long, short, action = ArgAction::SetTrue)]
        all: bool,
    },
    /// Write a debugger script per executable into the state directory
    Build,
}

impl Args {
    fn into_command(self) -> Command {
        let executable = self.executable;
        match self.verb {
            None => Command::Launch { executable },
            Some(Verb::Break { file, line }) => Command::Break {
                executable,
                breakpoint: Breakpoint::new(file, line),
            },
            Some(Verb::Print) => Command::Print { executable },
            Some(Verb::Touch { target }) => Command::Touch { executable: target },
            Some(Verb::Clean { all }) => Command::Clean { executable, all },
            Some(Verb::Build) => Command::Build,
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::resolve(
        args.state_dir.clone(),
        args.debugger,
        args.debugger_path.clone(),
    );
    let launcher = DebuggerLauncher::new(config.debugger());
    let command = args.into_command();
    log::debug!("{command:?}");

    let mut out = io::stdout().lock();
    match run(command, &config, &launcher, &mut out) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
