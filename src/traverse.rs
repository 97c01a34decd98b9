//! Batch conversion over a file tree.
//!
//! [`Walker`] visits a file or a directory tree depth-first and applies the
//! container codec to every eligible file:
//!
//! | mode         | eligible                                     | output             |
//! |--------------|----------------------------------------------|--------------------|
//! | `Compress`   | name without `.dvpl`, extension not ignored  | `<name>.dvpl`      |
//! | `Decompress` | name ending in `.dvpl`, extension not ignored | name minus `.dvpl` |
//! | `Verify`     | name ending in `.dvpl`                       | nothing written    |
//!
//! Codec failures are soft: they bump [`Tally::failure`] and the walk goes
//! on. I/O failures are hard: they end the current subtree with a
//! [`TraversalError`]. A directory absorbs its children's hard errors, logs
//! them and keeps visiting the remaining siblings; only an error on the root
//! itself (or on listing a directory) reaches the caller.
//!
//! Children are visited in the order the OS lists them.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::CodecError;
use crate::container;

/// Suffix appended to a file name when it is packed.
pub const CONTAINER_EXTENSION: &str = ".dvpl";

// ── Mode ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Compress,
    Decompress,
    Verify,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Compress   => "compress",
            Mode::Decompress => "decompress",
            Mode::Verify     => "verify",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Mode::Compress   => "compressed",
            Mode::Decompress => "decompressed",
            Mode::Verify     => "verified",
        }
    }
}

// ── Tally ────────────────────────────────────────────────────────────────────

/// Per-file outcome counts for a subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub success: usize,
    pub failure: usize,
    pub ignored: usize,
}

impl Tally {
    pub const SUCCESS: Tally = Tally { success: 1, failure: 0, ignored: 0 };
    pub const FAILURE: Tally = Tally { success: 0, failure: 1, ignored: 0 };
    pub const IGNORED: Tally = Tally { success: 0, failure: 0, ignored: 1 };

    pub fn total(&self) -> usize {
        self.success + self.failure + self.ignored
    }
}

impl Add for Tally {
    type Output = Tally;
    fn add(self, rhs: Tally) -> Tally {
        Tally {
            success: self.success + rhs.success,
            failure: self.failure + rhs.failure,
            ignored: self.ignored + rhs.ignored,
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Tally) {
        *self = *self + rhs;
    }
}

impl Sum for Tally {
    fn sum<I: Iterator<Item = Tally>>(iter: I) -> Tally {
        iter.fold(Tally::default(), Add::add)
    }
}

// ── TraversalOptions ─────────────────────────────────────────────────────────

/// Configuration shared by every file of one walk.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub mode:              Mode,
    /// Leave the source file in place after a successful conversion.
    pub keep_originals:    bool,
    /// Extensions with their leading dot, e.g. `".exe"`. Not consulted in
    /// verify mode.
    pub ignore_extensions: HashSet<String>,
    /// Paths that are always counted as ignored and never opened, such as
    /// the running executable.
    pub excluded_paths:    Vec<PathBuf>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            mode:              Mode::Compress,
            keep_originals:    false,
            ignore_extensions: HashSet::new(),
            excluded_paths:    Vec::new(),
        }
    }
}

impl TraversalOptions {
    pub fn new(mode: Mode) -> Self {
        Self { mode, ..Self::default() }
    }

    /// Add extensions to the ignore set. Entries may be written with or
    /// without the leading dot; empty entries are dropped.
    pub fn ignore<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            let ext = ext.as_ref().trim();
            if ext.is_empty() {
                continue;
            }
            let ext = if ext.starts_with('.') { ext.to_owned() } else { format!(".{ext}") };
            self.ignore_extensions.insert(ext);
        }
        self
    }

    pub fn exclude<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.excluded_paths.push(path.into());
        self
    }

    pub fn keep_originals(mut self, keep: bool) -> Self {
        self.keep_originals = keep;
        self
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum TraversalError {
    #[error("cannot stat {}: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },
    #[error("cannot list directory {}: {source}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl TraversalError {
    pub fn path(&self) -> &Path {
        match self {
            TraversalError::Stat { path, .. }
            | TraversalError::ReadDir { path, .. }
            | TraversalError::Read { path, .. }
            | TraversalError::Write { path, .. } => path,
        }
    }
}

// ── Events ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The file name does not match the mode (e.g. a `.dvpl` file under compress).
    NotEligible,
    /// The extension is in the ignore set.
    IgnoredExtension,
    /// The path is in the exclusion list.
    Excluded,
}

/// One per-file outcome, delivered to the callback set with
/// [`Walker::on_event`].
#[derive(Debug)]
pub enum FileEvent<'a> {
    Converted    { source: &'a Path, output: &'a Path },
    Verified     { path: &'a Path },
    Failed       { path: &'a Path, error: &'a CodecError },
    Ignored      { path: &'a Path, reason: IgnoreReason },
    /// A hard error inside a directory; the parent kept going.
    Skipped      { path: &'a Path, error: &'a TraversalError },
    /// The conversion succeeded but the source could not be deleted.
    RemoveFailed { path: &'a Path, error: &'a io::Error },
}

pub type EventFn<'a> = dyn FnMut(&FileEvent<'_>) + 'a;

// ── Walker ───────────────────────────────────────────────────────────────────

pub struct Walker<'a> {
    options:  &'a TraversalOptions,
    excluded: Vec<PathBuf>,
    on_event: Option<Box<EventFn<'a>>>,
}

impl<'a> Walker<'a> {
    pub fn new(options: &'a TraversalOptions) -> Self {
        let excluded = options
            .excluded_paths
            .iter()
            .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
            .collect();
        Self { options, excluded, on_event: None }
    }

    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&FileEvent<'_>) + 'a,
    {
        self.on_event = Some(Box::new(callback));
        self
    }

    /// Walk `root` and return the summed tally.
    pub fn run<P: AsRef<Path>>(&mut self, root: P) -> Result<Tally, TraversalError> {
        let root = root.as_ref();
        debug!(root = %root.display(), mode = self.options.mode.name(), "starting walk");
        self.visit(root)
    }

    fn visit(&mut self, path: &Path) -> Result<Tally, TraversalError> {
        let meta = fs::metadata(path).map_err(|source| TraversalError::Stat {
            path: path.to_owned(),
            source,
        })?;
        if meta.is_dir() {
            self.visit_dir(path)
        } else {
            self.visit_file(path)
        }
    }

    fn visit_dir(&mut self, dir: &Path) -> Result<Tally, TraversalError> {
        // Collect the listing up front: outputs written into `dir` during the
        // loop must not be picked up as new children.
        let children = fs::read_dir(dir)
            .and_then(|entries| entries.map(|e| e.map(|e| e.path())).collect::<io::Result<Vec<_>>>())
            .map_err(|source| TraversalError::ReadDir { path: dir.to_owned(), source })?;

        let mut tally = Tally::default();
        for child in children {
            match self.visit(&child) {
                Ok(t) => tally += t,
                Err(err) => {
                    warn!("skipping {}: {}", child.display(), err);
                    self.emit(&FileEvent::Skipped { path: &child, error: &err });
                }
            }
        }
        Ok(tally)
    }

    fn visit_file(&mut self, path: &Path) -> Result<Tally, TraversalError> {
        if self.is_excluded(path) {
            return Ok(self.ignore(path, IgnoreReason::Excluded));
        }
        match self.options.mode {
            Mode::Compress => {
                if has_container_extension(path) {
                    Ok(self.ignore(path, IgnoreReason::NotEligible))
                } else if self.has_ignored_extension(path) {
                    Ok(self.ignore(path, IgnoreReason::IgnoredExtension))
                } else {
                    self.convert(path, &container_path(path), container::compress)
                }
            }
            Mode::Decompress => match original_path(path) {
                None => Ok(self.ignore(path, IgnoreReason::NotEligible)),
                Some(_) if self.has_ignored_extension(path) => {
                    Ok(self.ignore(path, IgnoreReason::IgnoredExtension))
                }
                Some(output) => self.convert(path, &output, container::decompress),
            },
            Mode::Verify => {
                if has_container_extension(path) {
                    self.check(path)
                } else {
                    Ok(self.ignore(path, IgnoreReason::NotEligible))
                }
            }
        }
    }

    fn convert(
        &mut self,
        input:     &Path,
        output:    &Path,
        transform: fn(&[u8]) -> Result<Vec<u8>, CodecError>,
    ) -> Result<Tally, TraversalError> {
        let data = read(input)?;
        let converted = match transform(&data) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(self.fail(input, &err)),
        };
        fs::write(output, &converted).map_err(|source| TraversalError::Write {
            path: output.to_owned(),
            source,
        })?;
        info!(
            "{} {} -> {}",
            self.options.mode.past_tense(),
            input.display(),
            output.display()
        );
        self.emit(&FileEvent::Converted { source: input, output });

        if !self.options.keep_originals {
            if let Err(err) = fs::remove_file(input) {
                warn!("cannot delete {}: {}", input.display(), err);
                self.emit(&FileEvent::RemoveFailed { path: input, error: &err });
            }
        }
        Ok(Tally::SUCCESS)
    }

    fn check(&mut self, path: &Path) -> Result<Tally, TraversalError> {
        let data = read(path)?;
        match container::verify(&data) {
            Ok(()) => {
                debug!("verified {}", path.display());
                self.emit(&FileEvent::Verified { path });
                Ok(Tally::SUCCESS)
            }
            Err(err) => Ok(self.fail(path, &err)),
        }
    }

    fn fail(&mut self, path: &Path, error: &CodecError) -> Tally {
        debug!("failed to {} {}: {}", self.options.mode.name(), path.display(), error);
        self.emit(&FileEvent::Failed { path, error });
        Tally::FAILURE
    }

    fn ignore(&mut self, path: &Path, reason: IgnoreReason) -> Tally {
        debug!(?reason, "ignoring {}", path.display());
        self.emit(&FileEvent::Ignored { path, reason });
        Tally::IGNORED
    }

    fn emit(&mut self, event: &FileEvent<'_>) {
        if let Some(callback) = self.on_event.as_mut() {
            callback(event);
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_owned());
        self.excluded.iter().any(|p| *p == path)
    }

    fn has_ignored_extension(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => {
                let dotted = format!(".{}", ext.to_string_lossy());
                self.options.ignore_extensions.contains(&dotted)
            }
            None => false,
        }
    }
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Walk `root` with `options` and return the summed tally.
pub fn process<P: AsRef<Path>>(root: P, options: &TraversalOptions) -> Result<Tally, TraversalError> {
    Walker::new(options).run(root)
}

/// Verify every `.dvpl` file under `root` without writing anything.
pub fn verify_tree<P: AsRef<Path>>(root: P) -> Result<Tally, TraversalError> {
    process(root, &TraversalOptions::new(Mode::Verify))
}

// ── Naming ───────────────────────────────────────────────────────────────────

/// True when the file name ends in `.dvpl`. Works on the raw `OsStr`, so
/// names that are not valid UTF-8 are still recognized.
pub fn has_container_extension(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(&CONTAINER_EXTENSION[1..]))
}

/// `name.yaml` → `name.yaml.dvpl`
pub fn container_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(CONTAINER_EXTENSION);
    PathBuf::from(name)
}

/// `name.yaml.dvpl` → `name.yaml`. Returns `None` when the suffix is absent.
pub fn original_path(path: &Path) -> Option<PathBuf> {
    if !has_container_extension(path) {
        return None;
    }
    Some(path.with_extension(""))
}

fn read(path: &Path) -> Result<Vec<u8>, TraversalError> {
    fs::read(path).map_err(|source| TraversalError::Read { path: path.to_owned(), source })
}
