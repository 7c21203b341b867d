//! Map phase: stream the source once, split it into phrases and drive the
//! counter store.
//!
//! The source is consumed through a fixed-size chunk buffer. The current
//! phrase accumulates in a scratch buffer; once the scratch holds a full
//! chunk's worth, it is appended to the run's spill file instead, so memory
//! stays at one chunk plus one chunk-sized scratch no matter how long a
//! phrase gets. The digest is fed per segment and never re-reads bytes.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use log::debug;

use crate::error::SearchError;
use crate::fingerprint::FingerprintBuilder;
use crate::storage::{CounterStore, PhraseData, Tally};

/// Read chunk size; also the scratch-buffer bound before a phrase spills.
pub const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct MapStats {
    /// Phrase instances seen, empty phrases included.
    pub phrases: u64,
    /// Distinct fingerprints created in the store.
    pub distinct: u64,
}

/// Splits `input` on `separator`, `\n` and `\r` and registers every phrase
/// in the store. Two adjacent boundaries yield an empty phrase, which counts
/// like any other; a pending phrase at end of stream is emitted as well.
pub fn map_phrases<R: BufRead>(
    input: &mut R,
    store: &CounterStore,
    spill_path: &Path,
    separator: u8,
) -> Result<MapStats, SearchError> {
    let mut phrase = PhraseBuf::new(spill_path);
    let mut stats = MapStats {
        phrases: 0,
        distinct: 0,
    };

    loop {
        let consumed = {
            let buf = input.fill_buf()?;
            if buf.is_empty() {
                break;
            }

            let mut start = 0;
            for i in 0..buf.len() {
                let byte = buf[i];
                if byte == separator || byte == b'\n' || byte == b'\r' {
                    phrase.push(&buf[start..i]);
                    record(&mut phrase, store, &mut stats)?;
                    start = i + 1;
                }
            }
            phrase.push(&buf[start..]);
            buf.len()
        };
        input.consume(consumed);

        if phrase.scratch_len() >= CHUNK_SIZE {
            phrase.spill_over()?;
        }
    }

    if !phrase.is_empty() {
        record(&mut phrase, store, &mut stats)?;
    }

    debug!(
        "map phase done: {} phrases, {} distinct",
        stats.phrases, stats.distinct
    );
    Ok(stats)
}

fn record(
    phrase: &mut PhraseBuf,
    store: &CounterStore,
    stats: &mut MapStats,
) -> Result<(), SearchError> {
    let tally = phrase.finish(store)?;
    stats.phrases += 1;
    if tally == Tally::Created {
        stats.distinct += 1;
    }
    Ok(())
}

/// Accumulator for the phrase currently being scanned.
///
/// Invariant: the digest builder has been fed exactly the bytes of the
/// current phrase, whether they sit in the scratch or in the spill file.
struct PhraseBuf {
    scratch: BytesMut,
    digest: FingerprintBuilder,
    spill_path: PathBuf,
    spill: Option<File>,
    spilled_len: u64,
}

impl PhraseBuf {
    fn new(spill_path: &Path) -> PhraseBuf {
        PhraseBuf {
            scratch: BytesMut::with_capacity(CHUNK_SIZE),
            digest: FingerprintBuilder::new(),
            spill_path: spill_path.to_path_buf(),
            spill: None,
            spilled_len: 0,
        }
    }

    fn push(&mut self, segment: &[u8]) {
        self.digest.update(segment);
        self.scratch.extend_from_slice(segment);
    }

    fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    fn is_empty(&self) -> bool {
        self.scratch.is_empty() && self.spill.is_none()
    }

    /// Moves the scratch content to the spill file, keeping memory bounded.
    fn spill_over(&mut self) -> Result<(), SearchError> {
        if self.spill.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.spill_path)
                .map_err(|err| {
                    SearchError::storage_context("can't open spill file", &self.spill_path, err)
                })?;
            self.spill = Some(file);
            self.spilled_len = 0;
        }
        if let Some(file) = self.spill.as_mut() {
            file.write_all(&self.scratch).map_err(|err| {
                SearchError::storage_context("can't append to spill file", &self.spill_path, err)
            })?;
            self.spilled_len += self.scratch.len() as u64;
        }
        self.scratch.clear();
        Ok(())
    }

    /// Closes out the current phrase: fingerprint it, hand its content to
    /// the store, and reset for the next phrase.
    fn finish(&mut self, store: &CounterStore) -> Result<Tally, SearchError> {
        let fingerprint = self.digest.finish();

        let tally = if self.spill.is_some() {
            self.spill_over()?;
            // Close the handle before the store may rename the file away.
            self.spill = None;
            store.create_or_increment(
                &fingerprint,
                PhraseData::Spilled {
                    path: &self.spill_path,
                    len: self.spilled_len,
                },
            )?
        } else {
            store.create_or_increment(&fingerprint, PhraseData::Buffered(&self.scratch))?
        };

        self.scratch.clear();
        self.spilled_len = 0;
        Ok(tally)
    }
}
