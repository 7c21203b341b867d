//! The two-phase top-phrases search: map the source into the counter store,
//! reduce the store to the K best, and recover the winning phrase bytes.

use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use log::info;

use crate::error::SearchError;
use crate::extract::{map_phrases, CHUNK_SIZE};
use crate::reduce::reduce;
use crate::storage::{CounterStore, WorkArea};

pub const DEFAULT_SEPARATOR: u8 = b'|';

pub struct SearchConfig {
    /// Phrase separator byte; line terminators are always boundaries too.
    pub separator: u8,
    /// Base directory for the run's working area; system temp by default.
    pub work_dir: Option<PathBuf>,
    /// Retain the working area when the run fails, for postmortem digging.
    pub keep_on_failure: bool,
}

impl Default for SearchConfig {
    fn default() -> SearchConfig {
        SearchConfig {
            separator: DEFAULT_SEPARATOR,
            work_dir: None,
            keep_on_failure: false,
        }
    }
}

/// One winning phrase: its occurrence count and its exact first-seen bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopPhrase {
    pub count: u64,
    pub text: Bytes,
}

/// Finds the `limit` most frequent phrases in `source` with the default
/// configuration. See `find_top_phrases_with`.
pub fn find_top_phrases(source: &Path, limit: usize) -> Result<Vec<TopPhrase>, SearchError> {
    find_top_phrases_with(source, limit, &SearchConfig::default())
}

/// Finds the `limit` most frequent phrases in `source`.
///
/// Result order: count descending, fingerprint ascending within equal
/// counts. A `limit` of zero yields an empty result without scanning.
/// Memory use is bounded by the read chunk, the phrase scratch buffer and
/// the K-entry selection set; everything else lives in the run's on-disk
/// working area, which is released before returning.
pub fn find_top_phrases_with(
    source: &Path,
    limit: usize,
    conf: &SearchConfig,
) -> Result<Vec<TopPhrase>, SearchError> {
    let file = File::open(source).map_err(|err| {
        SearchError::InvalidArgument(format!("can't open source \"{}\": {}", source.display(), err))
    })?;
    if limit == 0 {
        return Ok(Vec::new());
    }

    let base = conf
        .work_dir
        .clone()
        .unwrap_or_else(|| env::temp_dir().join("phrase-count"));
    let mut area = WorkArea::acquire(&base)?;

    let result = run_phases(file, limit, conf, &area);
    if result.is_err() && conf.keep_on_failure {
        area.keep_on_drop();
    }
    result
}

fn run_phases(
    source: File,
    limit: usize,
    conf: &SearchConfig,
    area: &WorkArea,
) -> Result<Vec<TopPhrase>, SearchError> {
    let store = CounterStore::new(area.store_root());

    let mut reader = BufReader::with_capacity(CHUNK_SIZE, source);
    let stats = map_phrases(&mut reader, &store, area.spill_path(), conf.separator)?;
    info!(
        "mapped {} phrases ({} distinct)",
        stats.phrases, stats.distinct
    );

    let top = reduce(&store, limit)?;
    info!("selected top {} of {} distinct", top.len(), stats.distinct);

    let mut phrases = Vec::with_capacity(top.len());
    for entry in top {
        let text = store.phrase_bytes(&entry.fingerprint, entry.count)?;
        phrases.push(TopPhrase {
            count: entry.count,
            text,
        });
    }
    Ok(phrases)
}
