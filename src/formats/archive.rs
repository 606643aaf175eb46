//! Unix `ar` archive container walking.
//!
//! Static libraries are a flat container: an 8-byte magic, then members,
//! each a 60-byte ASCII header followed by the member bytes, padded to an
//! even offset. GNU archives add two special members: `/` (the symbol
//! table) and `//` (the long-filename table, holding names that do not
//! fit the header's 16-byte field). BSD archives store the symbol table
//! under `__.SYMDEF`.
//!
//! This module only walks the container; member contents are handed back
//! as whole-file offsets for the ELF reader to slice.

use std::path::Path;

use crate::domain::errors::ScanError;

pub const MAGIC: &[u8; 8] = b"!<arch>\n";

/// Size of the fixed per-member header.
pub const HEADER_LEN: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// An ordinary member file, usually a `.o`.
    Normal,
    /// The archive symbol table (`/` or `__.SYMDEF`).
    SymbolTable,
    /// The GNU long-filename table (`//`).
    LongNameTable,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    /// Whole-file offset of this member's 60-byte header.
    pub header_offset: u64,
    /// Whole-file offset of the member contents.
    pub data_offset: u64,
    pub size: u64,
}

#[must_use]
pub fn is_archive(data: &[u8]) -> bool {
    data.len() >= MAGIC.len() && &data[..MAGIC.len()] == MAGIC
}

/// Walk the archive and return all members in file order.
///
/// # Errors
/// `ScanError::Malformed` on truncated headers, bad terminators, or size
/// fields pointing past the end of the file.
pub fn members(data: &[u8], filename: &Path) -> Result<Vec<Member>, ScanError> {
    let malformed = |what: &'static str, value: u64| ScanError::Malformed {
        file: filename.to_path_buf(),
        what,
        value,
    };

    if !is_archive(data) {
        return Err(malformed("missing !<arch> magic", 0));
    }

    let mut members = Vec::new();
    let mut long_names: Option<&[u8]> = None;
    let mut offset = MAGIC.len() as u64;

    while (offset as usize) < data.len() {
        let header_offset = offset;
        let header_end = offset + HEADER_LEN;
        if header_end as usize > data.len() {
            return Err(malformed("truncated archive member header", offset));
        }
        let header = &data[offset as usize..header_end as usize];

        if &header[58..60] != b"`\n" {
            return Err(malformed("bad archive member terminator", offset));
        }

        let raw_name = std::str::from_utf8(&header[0..16])
            .map_err(|_| malformed("non-ASCII archive member name", offset))?
            .trim_end();
        let size_field = std::str::from_utf8(&header[48..58])
            .map_err(|_| malformed("non-ASCII archive size field", offset))?
            .trim_end();
        let size: u64 = size_field
            .parse()
            .map_err(|_| malformed("unparsable archive member size", offset))?;

        let data_offset = header_end;
        let data_end = data_offset
            .checked_add(size)
            .ok_or_else(|| malformed("archive member size overflow", size))?;
        if data_end as usize > data.len() {
            return Err(malformed("archive member extends past end of file", size));
        }

        let (name, kind) = classify_member(raw_name, long_names, data, filename, header_offset)?;
        if kind == MemberKind::LongNameTable {
            long_names = Some(&data[data_offset as usize..data_end as usize]);
        }

        members.push(Member {
            name,
            kind,
            header_offset,
            data_offset,
            size,
        });

        // Members start on even offsets; a single '\n' pads odd sizes.
        offset = data_end + (data_end & 1);
    }

    Ok(members)
}

fn classify_member(
    raw_name: &str,
    long_names: Option<&[u8]>,
    data: &[u8],
    filename: &Path,
    header_offset: u64,
) -> Result<(String, MemberKind), ScanError> {
    match raw_name {
        "/" => return Ok(("/".to_string(), MemberKind::SymbolTable)),
        "//" => return Ok(("//".to_string(), MemberKind::LongNameTable)),
        "__.SYMDEF" | "__.SYMDEF SORTED" => {
            return Ok((raw_name.to_string(), MemberKind::SymbolTable))
        }
        _ => {}
    }

    // "/123": index into the long-filename table.
    if let Some(index_text) = raw_name.strip_prefix('/') {
        let index: usize = index_text.parse().map_err(|_| ScanError::Malformed {
            file: filename.to_path_buf(),
            what: "bad long-filename reference",
            value: header_offset,
        })?;
        let table = long_names.unwrap_or(&data[0..0]);
        if index >= table.len() {
            return Err(ScanError::Malformed {
                file: filename.to_path_buf(),
                what: "long-filename reference past table end",
                value: index as u64,
            });
        }
        let rest = &table[index..];
        let end = rest
            .iter()
            .position(|&byte| byte == b'\n')
            .unwrap_or(rest.len());
        let name = String::from_utf8_lossy(&rest[..end])
            .trim_end_matches('/')
            .to_string();
        return Ok((name, MemberKind::Normal));
    }

    // GNU short names carry a trailing '/'.
    Ok((
        raw_name.trim_end_matches('/').to_string(),
        MemberKind::Normal,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, size: usize) -> Vec<u8> {
        let mut h = format!(
            "{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}",
            name, "0", "0", "0", "644", size
        )
        .into_bytes();
        h.extend_from_slice(b"`\n");
        assert_eq!(h.len(), 60);
        h
    }

    fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        for (name, contents) in entries {
            out.extend_from_slice(&header(name, contents.len()));
            out.extend_from_slice(contents);
            if contents.len() % 2 == 1 {
                out.push(b'\n');
            }
        }
        out
    }

    #[test]
    fn test_walks_plain_members() {
        let data = build_archive(&[("foo.o/", b"aaaa"), ("bar.o/", b"bbb")]);
        let members = members(&data, Path::new("lib.a")).unwrap();

        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "foo.o");
        assert_eq!(members[0].kind, MemberKind::Normal);
        assert_eq!(members[0].header_offset, 8);
        assert_eq!(members[0].data_offset, 68);
        assert_eq!(members[0].size, 4);
        // Odd-sized member is padded, so the next header starts even.
        assert_eq!(members[1].name, "bar.o");
        assert_eq!(members[1].data_offset % 2, 0);
    }

    #[test]
    fn test_symbol_table_and_long_names() {
        let long_table = b"very_long_member_name.o/\n";
        let data = build_archive(&[
            ("/", b"symtabdata"),
            ("//", long_table),
            ("/0", b"elf-bytes-here"),
        ]);
        let members = members(&data, Path::new("lib.a")).unwrap();

        assert_eq!(members[0].kind, MemberKind::SymbolTable);
        assert_eq!(members[1].kind, MemberKind::LongNameTable);
        assert_eq!(members[2].kind, MemberKind::Normal);
        assert_eq!(members[2].name, "very_long_member_name.o");
    }

    #[test]
    fn test_truncated_header_is_malformed() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(b"foo.o");
        let err = members(&data, Path::new("lib.a")).unwrap_err();
        assert!(matches!(err, ScanError::Malformed { .. }));
    }

    #[test]
    fn test_member_past_end_is_malformed() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&header("foo.o/", 100));
        data.extend_from_slice(b"short");
        let err = members(&data, Path::new("lib.a")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("past end"), "{message}");
    }

    #[test]
    fn test_bad_size_field_is_malformed() {
        let mut data = MAGIC.to_vec();
        let mut bad = header("foo.o/", 0);
        bad[48..58].copy_from_slice(b"notanumber");
        data.extend_from_slice(&bad);
        let err = members(&data, Path::new("lib.a")).unwrap_err();
        assert!(err.to_string().contains("unparsable"));
    }
}
