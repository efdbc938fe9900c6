//! In-memory representation of a single checksum manifest.

use crate::digest::Digest;
use crate::error::{Error, Result};

/// Size value meaning "the entire file".
pub const WHOLE_FILE: i64 = -1;

/// Location of the bytes covered by an entry's digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPortion {
    /// Path of the file holding the data, relative to the manifest.
    pub path: String,
    /// Byte offset where the covered range starts.
    pub offset: u64,
    /// Length of the covered range; [`WHOLE_FILE`] covers everything.
    pub size: i64,
}

/// One manifest row. Each entry appears as its own line in the list of
/// checked files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Display path of the entity to be checked.
    pub display: String,
    /// Checksum digest for the entity to be checked.
    pub digest: Digest,
    /// Where the digested bytes live; `data[0]` locates the bytes for the
    /// stored digest. Never empty.
    pub data: Vec<DataPortion>,
}

/// Ordered list of manifest entries, e.g. the contents of an `.sfv` or
/// `.md5` file. Append-only while an operation fills it, read-only after.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumFile {
    entries: Vec<Entry>,
}

impl ChecksumFile {
    pub fn new() -> ChecksumFile {
        ChecksumFile::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append an entry covering the whole file at `path`.
    ///
    /// At most `u32::MAX` entries are permitted; appending beyond that is
    /// [`Error::Failed`].
    pub fn add_entry(&mut self, path: &str, digest: Digest) -> Result<()> {
        if self.entries.len() >= u32::MAX as usize {
            return Err(Error::Failed);
        }
        self.entries.push(Entry {
            display: path.to_owned(),
            digest,
            data: vec![DataPortion {
                path: path.to_owned(),
                offset: 0,
                size: WHOLE_FILE,
            }],
        });
        Ok(())
    }

    /// Sort all entries lexicographically by their display paths.
    /// Parse order is otherwise preserved and is the "original" order.
    pub fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| a.display.cmp(&b.display));
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
