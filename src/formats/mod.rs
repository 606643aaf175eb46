//! File-format parsers
//!
//! A format parser receives a `RangeSink` and attributes the file's bytes
//! by calling the sink's adders. Every format is invoked twice per input:
//! once to build the base map (segments, or sections for object files)
//! and once with one sink per selected data source.

pub mod archive;
pub mod dwarf;
pub mod elf;

use object::FileKind;

use crate::domain::errors::ScanError;
use crate::input::InputFile;
use crate::ranges::RangeSink;

/// The interface a file format implements.
pub trait FileHandler: std::fmt::Debug {
    /// Populate the base map: the segment/section skeleton that later
    /// sources translate through. Must be called before
    /// [`process_file`](Self::process_file).
    fn process_base_map(&mut self, sink: &mut RangeSink) -> Result<(), ScanError>;

    /// Populate one sink per selected data source.
    fn process_file(&mut self, sinks: &mut [RangeSink]) -> Result<(), ScanError>;
}

/// Detect the file type and return its handler.
///
/// # Errors
/// `ScanError::UnknownFileType` for anything that is not an ELF binary,
/// ELF object or `!<arch>` archive.
pub fn try_open_file<'a>(file: &'a InputFile) -> Result<Box<dyn FileHandler + 'a>, ScanError> {
    match FileKind::parse(file.data()) {
        Ok(FileKind::Elf32 | FileKind::Elf64 | FileKind::Archive) => {
            Ok(Box::new(elf::ElfFileHandler::new(file)))
        }
        _ => Err(ScanError::UnknownFileType(file.filename().to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_signature_is_rejected() {
        let file = InputFile::from_bytes("not-a-binary", b"hello world".to_vec());
        let err = try_open_file(&file).unwrap_err();
        assert!(matches!(err, ScanError::UnknownFileType(_)));
    }

    #[test]
    fn test_archive_magic_is_accepted() {
        let file = InputFile::from_bytes("empty.a", b"!<arch>\n".to_vec());
        assert!(try_open_file(&file).is_ok());
    }
}
