//! Disk-resident counter store: a map from fingerprint to occurrence count
//! built entirely out of filesystem metadata.
//!
//! Each distinct fingerprint owns one leaf directory (its hex form split
//! into shard groups, see `Fingerprint::shard_path`). The leaf holds exactly
//! one file whose name is the decimal occurrence count and whose content is
//! the first-seen phrase bytes. Incrementing a counter is a stat plus a
//! rename, never a content rewrite, so the store scales with disk rather
//! than memory.
//!
//! Two distinct fingerprints never share a leaf, so disjoint shards could be
//! fed by independent workers; only increments to the same fingerprint need
//! serializing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use log::{debug, warn};

use crate::error::SearchError;
use crate::fingerprint::Fingerprint;

/// Occurrence count parsed from a leaf file name.
pub type Count = u64;

static AREA_SEQ: AtomicU64 = AtomicU64::new(0);

/// Phrase content handed to `create_or_increment`: either still in memory,
/// or already spilled to a file on the same filesystem as the store (so the
/// store can adopt it with a rename).
pub enum PhraseData<'a> {
    Buffered(&'a [u8]),
    Spilled { path: &'a Path, len: u64 },
}

impl PhraseData<'_> {
    pub fn len(&self) -> u64 {
        match self {
            PhraseData::Buffered(bytes) => bytes.len() as u64,
            PhraseData::Spilled { len, .. } => *len,
        }
    }
}

/// Outcome of a `create_or_increment` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Created,
    Incremented,
}

/// One persisted counter record, emitted by `CounterStore::entries`.
#[derive(Debug)]
pub struct CounterEntry {
    pub fingerprint: Fingerprint,
    pub count: Count,
    path: PathBuf,
}

impl CounterEntry {
    /// Path of the file holding the first-occurrence phrase bytes.
    pub fn content_path(&self) -> &Path {
        &self.path
    }
}

pub struct CounterStore {
    root: PathBuf,
}

impl CounterStore {
    pub fn new(root: &Path) -> CounterStore {
        CounterStore {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers one phrase occurrence under its fingerprint.
    ///
    /// First sight deposits the phrase bytes as file `"1"` in a fresh leaf
    /// directory. Every further occurrence checks the stored length against
    /// the incoming one (a mismatch means the digest collided, which is
    /// fatal) and renames the file to `count + 1`.
    pub fn create_or_increment(
        &self,
        fingerprint: &Fingerprint,
        data: PhraseData,
    ) -> Result<Tally, SearchError> {
        let leaf = self.root.join(fingerprint.shard_path());

        if let Some((file, count)) = single_leaf_file(&leaf)? {
            let stored_len = fs::metadata(&file)
                .map_err(|err| storage_err("can't stat counter file", &file, err))?
                .len();
            if stored_len != data.len() {
                return Err(SearchError::DigestCollision {
                    path: leaf,
                    stored_len,
                    new_len: data.len(),
                });
            }
            let renamed = leaf.join((count + 1).to_string());
            fs::rename(&file, &renamed)
                .map_err(|err| storage_err("can't advance counter", &file, err))?;
            return Ok(Tally::Incremented);
        }

        fs::create_dir_all(&leaf)
            .map_err(|err| storage_err("can't create counter directory", &leaf, err))?;
        let first = leaf.join("1");
        match data {
            PhraseData::Buffered(bytes) => fs::write(&first, bytes)
                .map_err(|err| storage_err("can't write phrase content", &first, err))?,
            PhraseData::Spilled { path, .. } => fs::rename(path, &first)
                .map_err(|err| storage_err("can't adopt spilled phrase", &first, err))?,
        }
        Ok(Tally::Created)
    }

    /// Lazily walks the store depth-first, one `CounterEntry` per leaf file.
    /// Traversal order is filesystem order; callers must not rely on it.
    pub fn entries(&self) -> Result<Entries, SearchError> {
        let top = fs::read_dir(&self.root)
            .map_err(|err| storage_err("can't open storage root", &self.root, err))?;
        Ok(Entries {
            root: self.root.clone(),
            stack: vec![top],
        })
    }

    /// Reads back the first-occurrence bytes stored for a fingerprint.
    pub fn phrase_bytes(
        &self,
        fingerprint: &Fingerprint,
        count: Count,
    ) -> Result<Bytes, SearchError> {
        let path = self
            .root
            .join(fingerprint.shard_path())
            .join(count.to_string());
        let content =
            fs::read(&path).map_err(|err| storage_err("can't read phrase content", &path, err))?;
        Ok(Bytes::from(content))
    }
}

/// Locates the single counter file of a leaf directory.
///
/// A missing leaf (or one with no file yet) means the fingerprint is unseen.
fn single_leaf_file(leaf: &Path) -> Result<Option<(PathBuf, Count)>, SearchError> {
    let mut dir = match fs::read_dir(leaf) {
        Ok(dir) => dir,
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(storage_err("can't open counter directory", leaf, err)),
    };

    let entry = match dir.next() {
        Some(entry) => {
            entry.map_err(|err| storage_err("can't list counter directory", leaf, err))?
        }
        None => return Ok(None),
    };

    let path = entry.path();
    let count = entry
        .file_name()
        .to_str()
        .and_then(|name| name.parse::<Count>().ok())
        .ok_or_else(|| corrupt("counter file name is not a number", &path))?;
    Ok(Some((path, count)))
}

/// Depth-first iterator over every counter entry in the store.
pub struct Entries {
    root: PathBuf,
    stack: Vec<fs::ReadDir>,
}

impl Entries {
    fn leaf_entry(&self, path: PathBuf) -> Result<CounterEntry, SearchError> {
        let count = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<Count>().ok())
            .ok_or_else(|| corrupt("counter file name is not a number", &path))?;

        let shard_dir = path
            .parent()
            .ok_or_else(|| corrupt("counter file without shard directory", &path))?;
        let rel = shard_dir
            .strip_prefix(&self.root)
            .map_err(|_| corrupt("counter file outside storage root", &path))?;

        let mut hex = String::new();
        for level in rel.iter() {
            let level = level
                .to_str()
                .ok_or_else(|| corrupt("non UTF-8 shard directory name", &path))?;
            hex.push_str(level);
        }
        let fingerprint = Fingerprint::from_hex(&hex)
            .ok_or_else(|| corrupt("shard path is not a digest", &path))?;

        Ok(CounterEntry {
            fingerprint,
            count,
            path,
        })
    }
}

impl Iterator for Entries {
    type Item = Result<CounterEntry, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dir = self.stack.last_mut()?;
            let entry = match dir.next() {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    return Some(Err(storage_err("can't walk storage", &self.root, err)));
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    return Some(Err(storage_err("can't stat storage entry", &path, err)));
                }
            };

            if file_type.is_dir() {
                match fs::read_dir(&path) {
                    Ok(next_dir) => self.stack.push(next_dir),
                    Err(err) => {
                        return Some(Err(storage_err("can't descend into shard", &path, err)));
                    }
                }
                continue;
            }

            return Some(self.leaf_entry(path));
        }
    }
}

/// One run's isolated on-disk working area: the storage root plus a sibling
/// spill file for in-flight oversized phrases. Released on drop unless
/// `keep_on_drop` was requested.
pub struct WorkArea {
    root: PathBuf,
    spill: PathBuf,
    keep: bool,
}

impl WorkArea {
    /// Creates a run-scoped working area under `base`.
    ///
    /// The area name is derived from the process id and a per-process
    /// sequence number, so concurrent runs never share a root. A leftover
    /// area under the same name (an earlier process died without cleanup and
    /// the pid got recycled) is removed first with a warning.
    pub fn acquire(base: &Path) -> Result<WorkArea, SearchError> {
        let seq = AREA_SEQ.fetch_add(1, Ordering::Relaxed);
        let name = format!("storage_{}_{}", process::id(), seq);
        let root = base.join(&name);
        let spill = base.join(format!("{}.tmp", name));

        if root.exists() {
            warn!(
                "unclean storage found at \"{}\", removing it before this run",
                root.display()
            );
            drop_storage(&root)?;
        }
        if spill.exists() {
            fs::remove_file(&spill)
                .map_err(|err| storage_err("can't remove stale spill file", &spill, err))?;
        }

        fs::create_dir_all(&root)
            .map_err(|err| storage_err("can't create working area", &root, err))?;
        debug!("working area at \"{}\"", root.display());
        Ok(WorkArea {
            root,
            spill,
            keep: false,
        })
    }

    pub fn store_root(&self) -> &Path {
        &self.root
    }

    pub fn spill_path(&self) -> &Path {
        &self.spill
    }

    /// Retains the area past the end of the run, for postmortem inspection.
    pub fn keep_on_drop(&mut self) {
        self.keep = true;
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        if self.keep {
            warn!(
                "working area kept for inspection at \"{}\"",
                self.root.display()
            );
            return;
        }
        // Best effort only: a cleanup failure here must not mask whatever
        // error is currently unwinding the run.
        if self.spill.exists() {
            if let Err(err) = fs::remove_file(&self.spill) {
                warn!("can't remove spill file \"{}\": {}", self.spill.display(), err);
            }
        }
        if let Err(err) = remove_tree(&self.root) {
            warn!(
                "can't remove working area \"{}\": {}",
                self.root.display(),
                err
            );
        }
    }
}

/// Recursively removes a storage tree. Idempotent: an already absent root is
/// not an error. Failures here are fatal; best-effort cleanup goes through
/// `WorkArea::drop` instead.
pub fn drop_storage(path: &Path) -> Result<(), SearchError> {
    remove_tree(path).map_err(|err| storage_err("can't remove storage", path, err))
}

fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn storage_err(context: &str, path: &Path, err: io::Error) -> SearchError {
    SearchError::storage_context(context, path, err)
}

fn corrupt(what: &str, path: &Path) -> SearchError {
    SearchError::Storage(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("{} at \"{}\"", what, path.display()),
    ))
}
