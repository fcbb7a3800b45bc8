use std::io::{self, Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use crate::error::ImfError;

/// A fetched bundle of named files.
pub trait Archive {
    fn entry_names(&self) -> Vec<String>;
    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, ImfError>;

    /// Names of the entries ending with `extension` (e.g. `".xml"`), in
    /// archive order.
    fn entries_with_extension(&self, extension: &str) -> Vec<String> {
        self.entry_names()
            .into_iter()
            .filter(|name| name.ends_with(extension))
            .collect()
    }

    fn read_entry_to_string(&mut self, name: &str) -> Result<String, ImfError> {
        let bytes = self.read_entry(name)?;
        String::from_utf8(bytes)
            .map_err(|err| ImfError::MalformedArchive(format!("{name} is not UTF-8: {err}")))
    }
}

/// A zip file held in memory.
#[derive(Debug)]
pub struct ZipBundle {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ZipBundle {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImfError> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|err| ImfError::MalformedArchive(format!("unreadable zip: {err}")))?;
        Ok(Self { archive })
    }

    /// Reads every entry through to the end so that corrupt members are
    /// reported before any parsing starts.
    pub fn validate(&mut self) -> Result<(), ImfError> {
        for i in 0..self.archive.len() {
            let mut entry = self
                .archive
                .by_index(i)
                .map_err(|err| ImfError::MalformedArchive(err.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            io::copy(&mut entry, &mut io::sink()).map_err(|err| {
                ImfError::MalformedArchive(format!("corrupt zip entry {}: {err}", entry.name()))
            })?;
        }
        debug!("Zip folder downloaded successfully");
        Ok(())
    }
}

impl Archive for ZipBundle {
    fn entry_names(&self) -> Vec<String> {
        self.archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect()
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, ImfError> {
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|err| ImfError::MalformedArchive(format!("{name}: {err}")))?;
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|err| ImfError::MalformedArchive(format!("{name}: {err}")))?;
        Ok(bytes)
    }
}

/// An archive assembled from in-memory entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: Vec<(String, Vec<u8>)>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.entries.push((name.into(), content.into()));
        self
    }
}

impl Archive for MemoryArchive {
    fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, ImfError> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| ImfError::MalformedArchive(format!("no entry named {name}")))
    }
}
