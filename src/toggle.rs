//! Breakpoint toggling.
//!
//! A toggle adds a breakpoint the target doesn't have and removes one it
//! does. Setting a breakpoint and clearing it again leaves the store exactly
//! as it was, provided the target was already the current one. Clearing and
//! setting it again keeps everything else in place and moves it to the end.
use std::fmt;

use crate::{
    debug,
    store::{Breakpoint, Store},
};

/// What a toggle did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Set,
    Cleared,
}

impl Toggle {
    /// `true` if the breakpoint is now set.
    pub fn applied(&self) -> bool {
        matches!(self, Toggle::Set)
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Toggle::Set => write!(f, "breakpoint set"),
            Toggle::Cleared => write!(f, "breakpoint cleared"),
        }
    }
}

/// Flip `breakpoint` for `target`.
///
/// New breakpoints go to the end of the set; removing one leaves the rest in
/// order. Either way `target` becomes the last touched executable. A target
/// whose last breakpoint was just cleared is dropped from the store.
pub fn toggle(store: &mut Store, target: &str, breakpoint: Breakpoint) -> Toggle {
    store.touch(target);

    let entry = store.target_entry(target);
    let result = if entry.remove(&breakpoint) {
        Toggle::Cleared
    } else {
        entry.insert(breakpoint.clone());
        Toggle::Set
    };
    store.prune(target);

    debug!("toggle", "{target}: {breakpoint} -> {result}");

    result
}

/// Remove every breakpoint `target` has, returning how many there were.
/// `target` becomes the last touched executable.
pub fn clear(store: &mut Store, target: &str) -> usize {
    store.touch(target);

    let count = store.target_entry(target).clear();
    store.prune(target);

    debug!("toggle", "{target}: cleared {count} breakpoint(s)");

    count
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::store::test::bp;

    fn store_with(target: &str, breakpoints: &[Breakpoint]) -> Store {
        let mut store = Store::new();
        for b in breakpoints {
            toggle(&mut store, target, b.clone());
        }
        store
    }

    #[test]
    fn set_then_clear() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut store = Store::new();
        assert_eq!(toggle(&mut store, "a.out", bp("main.c", 5)), Toggle::Set);
        assert_eq!(store.breakpoints("a.out"), &[bp("main.c", 5)]);

        assert_eq!(
            toggle(&mut store, "a.out", bp("main.c", 5)),
            Toggle::Cleared
        );
        assert!(store.breakpoints("a.out").is_empty());
    }

    #[test]
    fn applied_flag() {
        assert!(Toggle::Set.applied());
        assert!(!Toggle::Cleared.applied());
        assert_eq!(Toggle::Set.to_string(), "breakpoint set");
        assert_eq!(Toggle::Cleared.to_string(), "breakpoint cleared");
    }

    #[test]
    fn double_toggle_restores_store() {
        let before = store_with("a.out", &[bp("a.c", 1), bp("b.c", 2), bp("c.c", 3)]);

        let mut store = before.clone();
        assert_eq!(toggle(&mut store, "a.out", bp("d.c", 4)), Toggle::Set);
        assert_eq!(toggle(&mut store, "a.out", bp("d.c", 4)), Toggle::Cleared);
        assert_eq!(store, before);

        // The last breakpoint clears and comes back in the same place.
        let mut store = before.clone();
        toggle(&mut store, "a.out", bp("c.c", 3));
        toggle(&mut store, "a.out", bp("c.c", 3));
        assert_eq!(store, before);
    }

    #[test]
    fn double_toggle_on_fresh_target_leaves_no_entry() {
        let mut store = store_with("a.out", &[bp("a.c", 1)]);
        store.touch("b.out");
        let before = store.clone();

        toggle(&mut store, "b.out", bp("main.c", 9));
        toggle(&mut store, "b.out", bp("main.c", 9));

        assert_eq!(store, before);
        assert!(store.target("b.out").is_none());
    }

    #[test]
    fn readded_breakpoint_moves_to_end() {
        let mut store = store_with("a.out", &[bp("a.c", 1), bp("b.c", 2), bp("c.c", 3)]);

        toggle(&mut store, "a.out", bp("a.c", 1));
        toggle(&mut store, "a.out", bp("a.c", 1));

        assert_eq!(
            store.breakpoints("a.out"),
            &[bp("b.c", 2), bp("c.c", 3), bp("a.c", 1)]
        );
    }

    #[test]
    fn toggle_touches_target() {
        let mut store = Store::new();
        store.touch("a.out");

        toggle(&mut store, "b.out", bp("main.c", 1));
        assert_eq!(store.last_touched(), Some("b.out"));

        toggle(&mut store, "b.out", bp("main.c", 1));
        assert_eq!(store.last_touched(), Some("b.out"));
    }

    #[test]
    fn targets_are_independent() {
        let mut store = Store::new();
        toggle(&mut store, "a.out", bp("main.c", 1));
        toggle(&mut store, "b.out", bp("main.c", 1));
        toggle(&mut store, "a.out", bp("main.c", 1));

        assert!(store.breakpoints("a.out").is_empty());
        assert_eq!(store.breakpoints("b.out"), &[bp("main.c", 1)]);
    }

    #[test]
    fn clear_removes_everything_for_one_target() {
        let mut store = store_with("a.out", &[bp("a.c", 1), bp("b.c", 2)]);
        toggle(&mut store, "b.out", bp("x.c", 3));

        assert_eq!(clear(&mut store, "a.out"), 2);
        assert!(store.target("a.out").is_none());
        assert_eq!(store.breakpoints("b.out"), &[bp("x.c", 3)]);
        assert_eq!(store.last_touched(), Some("a.out"));

        assert_eq!(clear(&mut store, "nothing"), 0);
    }
}
