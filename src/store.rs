//! Durable breakpoint state.
//!
//! The [`Store`] is the whole of what `mb` remembers: an ordered breakpoint
//! set for every executable it has seen, and the executable touched last.
//! [`StateFile`] owns the on-disk copy. It loads and saves the store as JSON,
//! holds an advisory lock across a load-modify-save cycle, and replaces the
//! file atomically so an interrupted write never loses data.
use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, File, OpenOptions},
    hash::{Hash, Hasher},
    io::{self, Write},
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use fs4::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::prelude::*;
use tempfile::NamedTempFile;

use crate::{
    debug,
    error::{
        CleanSnafu, CorruptStateSnafu, EncodeSnafu, NoTargetSpecifiedSnafu, PersistFailedSnafu,
        Result, StateIoSnafu,
    },
    Config,
};

/// A source location to stop at.
///
/// Equality is on the file exactly as the user typed it, and the line. No
/// path normalization happens anywhere: `main.c` and `./main.c` are two
/// different breakpoints. Fields we don't recognize ride along but take no
/// part in equality.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Breakpoint {
    file: String,
    line: NonZeroU32,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Breakpoint {
    pub fn new(file: impl Into<String>, line: NonZeroU32) -> Self {
        Self {
            file: file.into(),
            line,
            extra: Map::new(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> NonZeroU32 {
        self.line
    }
}

impl PartialEq for Breakpoint {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file && self.line == other.line
    }
}

impl Eq for Breakpoint {}

impl Hash for Breakpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file.hash(state);
        self.line.hash(state);
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// An executable and its breakpoints.
///
/// Breakpoints are a set kept in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Target {
    #[serde(default)]
    breakpoints: Vec<Breakpoint>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Target {
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn contains(&self, breakpoint: &Breakpoint) -> bool {
        self.breakpoints.contains(breakpoint)
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// Append `breakpoint` unless it's already present. Returns `true` if it
    /// was added.
    pub(crate) fn insert(&mut self, breakpoint: Breakpoint) -> bool {
        if self.contains(&breakpoint) {
            false
        } else {
            self.breakpoints.push(breakpoint);
            true
        }
    }

    /// Remove `breakpoint`, keeping the others in order. Returns `true` if it
    /// was there.
    pub(crate) fn remove(&mut self, breakpoint: &Breakpoint) -> bool {
        match self.breakpoints.iter().position(|b| b == breakpoint) {
            Some(index) => {
                self.breakpoints.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) -> usize {
        let count = self.breakpoints.len();
        self.breakpoints.clear();
        count
    }

    /// Hand edited files may repeat a breakpoint; keep the first.
    fn dedup(&mut self) {
        let mut seen = Vec::with_capacity(self.breakpoints.len());
        self.breakpoints.retain(|b| {
            if seen.contains(b) {
                false
            } else {
                seen.push(b.clone());
                true
            }
        });
    }
}

/// Everything `mb` knows.
///
/// Targets are keyed by the executable path as given, without
/// canonicalization. Fields we don't recognize are carried through a
/// load/save cycle untouched.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Store {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_touched: Option<String>,
    #[serde(default)]
    targets: BTreeMap<String, Target>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_touched(&self) -> Option<&str> {
        self.last_touched.as_deref()
    }

    /// Make `executable` the current target. Breakpoint sets are untouched.
    pub fn touch(&mut self, executable: impl Into<String>) {
        self.last_touched = Some(executable.into());
    }

    /// Pick the executable an operation applies to.
    ///
    /// An explicit executable wins and becomes the last touched target, which
    /// sticks if the store is saved afterwards. Otherwise we fall back to the
    /// last touched target, and fail if there has never been one.
    pub fn resolve_target(&mut self, explicit: Option<&str>) -> Result<String> {
        match explicit {
            Some(executable) => {
                self.touch(executable);
                Ok(executable.to_owned())
            }
            None => self
                .last_touched
                .clone()
                .context(NoTargetSpecifiedSnafu),
        }
    }

    pub fn target(&self, executable: &str) -> Option<&Target> {
        self.targets.get(executable)
    }

    /// The breakpoints for `executable`, in the order they were set. Unknown
    /// executables have none.
    pub fn breakpoints(&self, executable: &str) -> &[Breakpoint] {
        self.targets
            .get(executable)
            .map(Target::breakpoints)
            .unwrap_or_default()
    }

    pub fn targets(&self) -> impl Iterator<Item = (&str, &Target)> {
        self.targets.iter().map(|(name, target)| (name.as_str(), target))
    }

    pub(crate) fn target_entry(&mut self, executable: &str) -> &mut Target {
        self.targets.entry(executable.to_owned()).or_default()
    }

    /// Drop the entry for `executable` if it no longer holds anything.
    pub(crate) fn prune(&mut self, executable: &str) {
        if let Some(target) = self.targets.get(executable) {
            if target.is_empty() && target.extra.is_empty() {
                self.targets.remove(executable);
            }
        }
    }

    fn normalize(&mut self) {
        for target in self.targets.values_mut() {
            target.dedup();
        }
    }

    /// Decode a store. Blank input is an empty store.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut store: Self = serde_json::from_str(json)?;
        store.normalize();
        Ok(store)
    }

    /// Encode a store. The output is stable: the same store always produces
    /// the same bytes.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// The on-disk home of the [`Store`].
#[derive(Clone, Debug)]
pub struct StateFile {
    dir: PathBuf,
    path: PathBuf,
    lock_path: PathBuf,
    script_dir: PathBuf,
}

impl StateFile {
    pub fn new(config: &Config) -> Self {
        Self {
            dir: config.state_dir().to_path_buf(),
            path: config.state_file(),
            lock_path: config.lock_file(),
            script_dir: config.script_dir(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store without modifying it, under a shared lock.
    ///
    /// A missing state directory reads as an empty store and is not created.
    pub fn read(&self) -> Result<Store> {
        if !self.dir.exists() {
            debug!("store", "no state directory at {}", self.dir.display());
            return Ok(Store::default());
        }

        let _lock = self.lock(LockMode::Shared)?;
        self.load()
    }

    /// Load, modify, and save the store while holding the exclusive lock.
    ///
    /// If `f` fails nothing is written.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Store) -> Result<T>,
    {
        let _lock = self.lock(LockMode::Exclusive)?;
        let mut store = self.load()?;
        let result = f(&mut store)?;
        self.save(&store)?;

        Ok(result)
    }

    /// Load the store. A missing or empty file is an empty store; anything
    /// we can't parse is an error, and the file is left alone.
    pub fn load(&self) -> Result<Store> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("store", "no state at {}, starting empty", self.path.display());
                return Ok(Store::default());
            }
            Err(e) => {
                return Err(e).context(StateIoSnafu {
                    description: "failed to read state file",
                    path: &self.path,
                })
            }
        };

        let store = Store::from_json(&json).context(CorruptStateSnafu { path: &self.path })?;
        debug!(
            "store",
            "loaded {} target(s) from {}",
            store.targets.len(),
            self.path.display()
        );

        Ok(store)
    }

    /// Replace the state file with `store`.
    ///
    /// The new contents go to a temporary file in the same directory, are
    /// synced, and then renamed over the old file.
    pub fn save(&self, store: &Store) -> Result<()> {
        let json = store.to_json().context(EncodeSnafu)?;
        self.ensure_dir()?;

        let mut tmp = NamedTempFile::new_in(&self.dir).context(PersistFailedSnafu {
            path: &self.path,
        })?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .context(PersistFailedSnafu { path: &self.path })?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .context(PersistFailedSnafu { path: &self.path })?;

        debug!("store", "saved state to {}", self.path.display());

        Ok(())
    }

    /// Delete the state file and every exported script, under the exclusive
    /// lock. Missing files are fine.
    pub fn destroy(&self) -> Result<()> {
        let _lock = self.lock(LockMode::Exclusive)?;

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).context(CleanSnafu { path: &self.path }),
        }
        match fs::remove_dir_all(&self.script_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).context(CleanSnafu {
                    path: &self.script_dir,
                })
            }
        }

        log::info!("removed all state under {}", self.dir.display());

        Ok(())
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).context(StateIoSnafu {
            description: "failed to create state directory",
            path: &self.dir,
        })
    }

    fn lock(&self, mode: LockMode) -> Result<StateLock> {
        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .context(StateIoSnafu {
                description: "failed to open lock file",
                path: &self.lock_path,
            })?;

        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.context(StateIoSnafu {
            description: "failed to lock",
            path: &self.lock_path,
        })?;
        debug!("store", "holding {mode:?} lock on {}", self.lock_path.display());

        Ok(StateLock { file })
    }
}

#[derive(Clone, Copy, Debug)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Held for as long as the lock should be.
struct StateLock {
    file: File,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
