//! Persistent breakpoints for command line debuggers.
//!
//! `makebreak` remembers `file:line` breakpoints per executable between
//! invocations, along with the executable you touched last, and starts an
//! lldb or gdb session with those breakpoints already set.
//!
//! The pieces, leaf to root:
//!
//! * [`store`] -- the durable [`Store`] aggregate and the [`StateFile`] that
//!   loads, locks, and atomically saves it.
//! * [`toggle`] -- adds or removes a single breakpoint.
//! * [`launcher`] -- turns stored breakpoints into debugger [`Directive`]s and
//!   runs the debugger.
//! * [`dispatch`] -- the `break`/`print`/`touch`/`clean`/`build`/launch verbs.
use ansi_term::Colour;

pub mod config;
pub mod dispatch;
pub mod error;
pub mod launcher;
pub mod store;
pub mod toggle;

pub use config::Config;
pub use dispatch::{run, Command};
pub use error::{MakeBreakError, Result};
pub use launcher::{build_script, Directive, Flavor, Launcher, Script};
pub use store::{Breakpoint, StateFile, Store, Target};
pub use toggle::{toggle, Toggle};

pub(crate) const ERR_CLR: Colour = Colour::Red;
pub(crate) const POP_CLR: Colour = Colour::Yellow;
pub(crate) const OTH_CLR: Colour = Colour::Cyan;

macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f").unwrap_or(name)
    }};
}
pub(crate) use function;

macro_rules! debug {
    ($target:literal, $($arg:tt)*) => {
        log::debug!(
            target: $target,
            "{}: {}",
            ansi_term::Colour::Cyan.dimmed().italic().paint($crate::function!()),
            format_args!($($arg)*),
        )
    };
}
pub(crate) use debug;

macro_rules! warning {
    ($target:literal, $($arg:tt)*) => {
        log::warn!(
            target: $target,
            "{}: {}",
            ansi_term::Colour::Yellow.dimmed().italic().paint($crate::function!()),
            format_args!($($arg)*),
        )
    };
}
pub(crate) use warning;

#[cfg(test)]
mod test {
    #[test]
    fn log_macros_work_as_expressions() {
        let _ = env_logger::builder().is_test(true).try_init();

        for value in [Some(1), None] {
            match value {
                Some(n) => debug!("test", "got {n}"),
                None => warning!("test", "got nothing"),
            }
        }
        assert!(super::function!().ends_with("log_macros_work_as_expressions"));
    }
}
