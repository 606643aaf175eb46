//! Memory-mapped input files.
//!
//! Binaries are mapped read-only rather than read into memory: the scan
//! only ever touches the slices that the format parsers ask for, and the
//! file can be much larger than the parts we look at.

use std::fs;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::domain::errors::ScanError;

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    Bytes(Vec<u8>),
}

/// One input file: its name as given on the command line, and its bytes.
#[derive(Debug)]
pub struct InputFile {
    filename: PathBuf,
    backing: Backing,
}

impl InputFile {
    /// Map the file at `path` read-only.
    ///
    /// # Errors
    /// `ScanError::Open` when the file cannot be opened or mapped.
    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let file = fs::File::open(path).map_err(|source| ScanError::Open {
            file: path.to_path_buf(),
            source,
        })?;
        // SAFETY: the mapping is read-only and lives as long as this
        // InputFile; mutating the underlying file during a scan is outside
        // our contract, as it is for every memory-mapping reader.
        let mapped = unsafe { Mmap::map(&file) }.map_err(|source| ScanError::Open {
            file: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            filename: path.to_path_buf(),
            backing: Backing::Mapped(mapped),
        })
    }

    /// Build an input from in-memory bytes. Used by tests and by callers
    /// that already hold the file contents.
    #[must_use]
    pub fn from_bytes(filename: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            backing: Backing::Bytes(bytes),
        }
    }

    #[must_use]
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// The filename as it should appear in report labels.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.filename.display().to_string()
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(map) => map,
            Backing::Bytes(bytes) => bytes,
        }
    }
}
