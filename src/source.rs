//! Archive file sources
//!
//! A task pulls `(name, bytes)` pairs from a [`FileSource`] until it is
//! exhausted. `.gz` members are decompressed here; the name keeps its
//! `.gz` so the parser can tell copies apart.
//!
//! Member sizes in a tar header are untrusted. Reads never pre-allocate
//! from them and stop one byte past the member limit, so an oversized or
//! inflating member reaches the parser as `limit + 1` bytes and is
//! rejected there by its size check.

use flate2::read::GzDecoder;
use std::collections::VecDeque;
use std::io::Read;
use thiserror::Error;

use crate::parsers::ndt::DEFAULT_MAX_PAYLOAD_BYTES;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        source: std::io::Error,
    },
}

/// One regular file from an archive, already decompressed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Sequence of files making up one task
pub trait FileSource {
    /// Next file, `Ok(None)` at end of archive
    fn next_file(&mut self) -> Result<Option<SourceFile>, SourceError>;
}

/// Walks the regular files of a tar archive
pub struct TarSource<'a, R: 'a + Read> {
    entries: tar::Entries<'a, R>,
    max_member_bytes: u64,
}

impl<'a, R: Read> TarSource<'a, R> {
    pub fn new(archive: &'a mut tar::Archive<R>) -> Result<Self, SourceError> {
        Self::with_limit(archive, DEFAULT_MAX_PAYLOAD_BYTES as u64)
    }

    /// Source whose members are cut at `max_member_bytes + 1` bytes
    pub fn with_limit(archive: &'a mut tar::Archive<R>, max_member_bytes: u64) -> Result<Self, SourceError> {
        Ok(Self {
            entries: archive.entries()?,
            max_member_bytes,
        })
    }

    pub fn max_member_bytes(&self) -> u64 {
        self.max_member_bytes
    }
}

impl<'a, R: Read> FileSource for TarSource<'a, R> {
    fn next_file(&mut self) -> Result<Option<SourceFile>, SourceError> {
        for entry in self.entries.by_ref() {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let name = entry.path()?.to_string_lossy().into_owned();
            let cap = self.max_member_bytes.saturating_add(1);
            let mut data = Vec::new();
            let read = if name.to_lowercase().ends_with(".gz") {
                GzDecoder::new(&mut entry).take(cap).read_to_end(&mut data)
            } else {
                (&mut entry).take(cap).read_to_end(&mut data)
            };
            read.map_err(|source| SourceError::Read {
                name: name.clone(),
                source,
            })?;

            return Ok(Some(SourceFile { name, data }));
        }
        Ok(None)
    }
}

/// Replays a prepared list of files (and failures)
#[derive(Debug, Default)]
pub struct MemorySource {
    items: VecDeque<Result<SourceFile, SourceError>>,
}

impl MemorySource {
    pub fn new(files: impl IntoIterator<Item = SourceFile>) -> Self {
        Self {
            items: files.into_iter().map(Ok).collect(),
        }
    }

    pub fn push_file(&mut self, file: SourceFile) {
        self.items.push_back(Ok(file));
    }

    /// Queue a read failure
    pub fn push_error(&mut self, error: SourceError) {
        self.items.push_back(Err(error));
    }

}

impl FileSource for MemorySource {
    fn next_file(&mut self) -> Result<Option<SourceFile>, SourceError> {
        self.items.pop_front().transpose()
    }
}
