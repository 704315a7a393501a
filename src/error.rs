use std::{io, path::PathBuf};

use snafu::prelude::*;

use crate::{ERR_CLR, OTH_CLR, POP_CLR};

pub type Result<T, E = MakeBreakError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MakeBreakError {
    /// No Target
    ///
    /// No executable was named on the command line and none has been touched
    /// before.
    #[snafu(display("{}: no executable specified; pass `{}` or run `{}` first", ERR_CLR.bold().paint("error"), OTH_CLR.paint("-x <executable>"), OTH_CLR.paint("mb touch <executable>")))]
    NoTargetSpecified,

    /// Corrupt State
    ///
    /// The state file exists but could not be parsed. We never touch it on
    /// this path.
    #[snafu(display("{}: state file `{}` is corrupt ({source}); inspect it, or remove it to start over", ERR_CLR.bold().paint("error"), POP_CLR.paint(path.display().to_string())))]
    CorruptState {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Launch Failure
    ///
    /// The debugger process could not be started.
    #[snafu(display("{}: failed to launch `{}`: {source}", ERR_CLR.bold().paint("error"), OTH_CLR.paint(debugger.display().to_string())))]
    LaunchFailed { debugger: PathBuf, source: io::Error },

    /// Persist Failure
    ///
    /// Writing the updated state failed. The previous state file is intact.
    #[snafu(display("{}: failed to save state to `{}`: {source}", ERR_CLR.bold().paint("error"), POP_CLR.paint(path.display().to_string())))]
    PersistFailed { path: PathBuf, source: io::Error },

    /// State I/O
    ///
    /// Reading, locking, or preparing the state directory failed.
    #[snafu(display("{}: {description} `{}`: {source}", ERR_CLR.bold().paint("error"), POP_CLR.paint(path.display().to_string())))]
    StateIo {
        description: String,
        path: PathBuf,
        source: io::Error,
    },

    /// Clean Failure
    ///
    /// `clean --all` could not remove something it was asked to remove.
    #[snafu(display("{}: failed to remove `{}`: {source}", ERR_CLR.bold().paint("error"), POP_CLR.paint(path.display().to_string())))]
    Clean { path: PathBuf, source: io::Error },

    /// Output Failure
    ///
    /// Writing results to the terminal failed, typically a closed pipe.
    #[snafu(display("{}: failed to write output: {source}", ERR_CLR.bold().paint("error")))]
    Output { source: io::Error },

    /// Serialization
    ///
    /// The in-memory store could not be encoded. Should not happen.
    #[snafu(display("{}: failed to encode state: {source}", ERR_CLR.bold().paint("error")))]
    Encode { source: serde_json::Error },
}

impl MakeBreakError {
    /// Process exit code for this error.
    ///
    /// Launch failures use 127, matching what a shell reports for a command
    /// it could not run.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoTargetSpecified => 2,
            Self::CorruptState { .. } => 3,
            Self::LaunchFailed { .. } => 127,
            Self::PersistFailed { .. } | Self::StateIo { .. } | Self::Clean { .. } => 4,
            Self::Output { .. } | Self::Encode { .. } => 1,
        }
    }
}
