use std::fmt::{self, Display};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::range_set::{Interval, RangeSet};

/// Which byte stream of a cache entry an observation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Read,
    #[serde(rename = "write")]
    Written,
    Available,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntryError {
    /// `offset + len` does not fit in a byte offset.
    Overflow { offset: u64, len: u64 },
    /// Tried to merge observations of two different cache keys.
    KeyMismatch { ours: String, theirs: String },
}

impl Display for CacheEntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheEntryError::Overflow { offset, len } => {
                write!(f, "byte range at offset {offset} with length {len} overflows")
            }
            CacheEntryError::KeyMismatch { ours, theirs } => {
                write!(f, "cannot merge cache entry {theirs:?} into {ours:?}")
            }
        }
    }
}

impl std::error::Error for CacheEntryError {}

/// Byte ranges observed for a single cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub read: RangeSet<u64>,
    pub written: RangeSet<u64>,
    pub available: RangeSet<u64>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            read: RangeSet::new(),
            written: RangeSet::new(),
            available: RangeSet::new(),
        }
    }

    pub fn stream(&self, kind: StreamKind) -> &RangeSet<u64> {
        match kind {
            StreamKind::Read => &self.read,
            StreamKind::Written => &self.written,
            StreamKind::Available => &self.available,
        }
    }

    /// Records `len` bytes starting at `offset` on the given stream.
    ///
    /// Written bytes become available as well. Zero-length observations
    /// carry no bytes and are skipped.
    pub fn record(
        &mut self,
        kind: StreamKind,
        offset: u64,
        len: u64,
    ) -> Result<(), CacheEntryError> {
        if len == 0 {
            log::debug!("{}: ignoring empty {kind:?} at offset {offset}", self.key);
            return Ok(());
        }
        let interval = offset
            .checked_add(len)
            .and_then(|end| Interval::new(offset, end).ok())
            .ok_or(CacheEntryError::Overflow { offset, len })?;

        match kind {
            StreamKind::Read => self.read.add_interval(interval),
            StreamKind::Written => {
                self.written.add_interval(interval);
                self.available.add_interval(interval);
            }
            StreamKind::Available => self.available.add_interval(interval),
        }
        Ok(())
    }

    /// Folds the observations of `other` into this entry.
    pub fn merge(&mut self, other: &CacheEntry) -> Result<(), CacheEntryError> {
        if self.key != other.key {
            return Err(CacheEntryError::KeyMismatch {
                ours: self.key.clone(),
                theirs: other.key.clone(),
            });
        }
        self.read.merge(&other.read);
        self.written.merge(&other.written);
        self.available.merge(&other.available);
        Ok(())
    }

    /// Renders the stream as inclusive byte spans, e.g. `0-99, 150-199`.
    pub fn summary(&self, kind: StreamKind) -> String {
        let set = self.stream(kind);
        if set.is_empty() {
            return "none".to_string();
        }
        set.map(|start, end| format!("{start}-{}", end - 1))
            .into_iter()
            .join(", ")
    }
}

impl Display for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: read [{}]; written [{}]; available [{}]",
            self.key,
            self.summary(StreamKind::Read),
            self.summary(StreamKind::Written),
            self.summary(StreamKind::Available)
        )
    }
}
