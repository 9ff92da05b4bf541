// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! USTAR (`tar`) archive writing.

Entries are encoded as a 512-byte header followed by content zero-padded to
the next 512-byte boundary. The archive ends with two all-zero 512-byte
blocks and the whole stream is zero-padded to the blocking factor
(20 × 512 = 10240 bytes), matching what GNU tar and `dpkg-deb` emit.

Only regular files and directories are encoded. Names are truncated at 100
bytes; GNU long-name extensions, PAX headers, and sparse files are not
supported.
*/

use {
    crate::{error::Result, properties::UnixEntryProperties, source::ByteSource},
    std::{collections::BTreeSet, io::Write},
};

/// Size of a header and of a content block, in bytes.
pub const BLOCK_SIZE: u64 = 512;

/// Archives are zero-padded to a multiple of this many bytes.
pub const BLOCKING_FACTOR: u64 = 20 * BLOCK_SIZE;

/// Round a byte count up to the next block boundary.
fn block_padded(len: u64) -> u64 {
    (len + BLOCK_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE
}

/// Number of `/`-separated components in an entry name.
fn component_count(name: &str) -> usize {
    name.split('/').filter(|s| !s.is_empty()).count()
}

/// All strict ancestor directories of a path, shallowest first.
///
/// The leading `.` component, if present, maps to the root entry `./`.
fn ancestor_paths(path: &str) -> Vec<String> {
    let segments = path.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>();

    (1..segments.len())
        .map(|i| {
            let prefix = segments[..i].join("/");

            if prefix == "." {
                "./".to_string()
            } else {
                prefix
            }
        })
        .collect()
}

/// Write a zero-padded octal value with a trailing NUL into a header field.
///
/// Values too wide for the field keep their low-order digits; header fields
/// truncate silently rather than fail.
fn put_octal(field: &mut [u8], value: u64) {
    let digits = field.len() - 1;
    let formatted = format!("{:0width$o}", value, width = digits);
    let bytes = formatted.as_bytes();
    field[..digits].copy_from_slice(&bytes[bytes.len() - digits..]);
}

/// Write an ASCII value into a NUL-filled field, truncating on overflow.
fn put_string(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let count = bytes.len().min(field.len());
    field[..count].copy_from_slice(&bytes[..count]);
}

/// The kind of filesystem object an entry represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TarEntryType {
    RegularFile,
    Directory,
}

impl TarEntryType {
    fn type_flag(&self) -> u8 {
        match self {
            Self::RegularFile => b'0',
            Self::Directory => b'5',
        }
    }
}

/// A single entry in a tar archive.
#[derive(Clone, Debug)]
pub struct TarEntry {
    name: String,
    entry_type: TarEntryType,
    properties: UnixEntryProperties,
    content: ByteSource,
}

impl TarEntry {
    /// Construct a regular file entry.
    pub fn file(name: impl ToString, properties: UnixEntryProperties, content: ByteSource) -> Self {
        Self {
            name: name.to_string(),
            entry_type: TarEntryType::RegularFile,
            properties,
            content,
        }
    }

    /// Construct a directory entry. Directories carry no content.
    pub fn directory(name: impl ToString, properties: UnixEntryProperties) -> Self {
        Self {
            name: name.to_string(),
            entry_type: TarEntryType::Directory,
            properties,
            content: ByteSource::Memory(vec![]),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_type(&self) -> TarEntryType {
        self.entry_type
    }

    pub fn properties(&self) -> &UnixEntryProperties {
        &self.properties
    }

    pub fn content(&self) -> &ByteSource {
        &self.content
    }

    /// Total encoded size of this entry: header plus padded content.
    pub fn encoded_len(&self) -> u64 {
        BLOCK_SIZE + block_padded(self.content.len())
    }

    /// Encode the 512-byte USTAR header.
    ///
    /// The checksum is computed in two passes: the checksum field is filled
    /// with ASCII spaces, all 512 bytes are summed as unsigned values, and
    /// the sum is then stored as a 6-digit zero-padded octal string followed
    /// by a NUL and a space.
    fn encode_header(&self) -> [u8; BLOCK_SIZE as usize] {
        let mut header = [0u8; BLOCK_SIZE as usize];

        put_string(&mut header[0..100], &self.name);
        put_octal(&mut header[100..108], (self.properties.mode & 0o7777) as u64);
        put_octal(&mut header[108..116], self.properties.uid as u64);
        put_octal(&mut header[116..124], self.properties.gid as u64);
        put_octal(&mut header[124..136], self.content.len());
        put_octal(&mut header[136..148], self.properties.mtime);
        header[148..156].fill(b' ');
        header[156] = self.entry_type.type_flag();
        // Link name (157..257) is unused and stays zero-filled.
        header[257..263].copy_from_slice(b"ustar\0");
        header[263] = 0x20;
        header[264] = 0x00;

        if let Some(owner) = &self.properties.owner_name {
            put_string(&mut header[265..297], owner);
        }

        if let Some(group) = &self.properties.group_name {
            put_string(&mut header[297..329], group);
        }

        let sum = header.iter().map(|b| *b as u32).sum::<u32>();
        put_string(&mut header[148..155], &format!("{:06o}\0", sum));
        header[155] = b' ';

        header
    }
}

/// An ordered sequence of tar entries.
#[derive(Clone, Debug, Default)]
pub struct TarArchive {
    entries: Vec<TarEntry>,
}

impl TarArchive {
    /// Construct an archive from an explicit, already-ordered entry list.
    pub fn new(entries: Vec<TarEntry>) -> Self {
        Self { entries }
    }

    /// Construct an archive from a flat list of file entries.
    ///
    /// A directory entry is synthesized for every distinct ancestor of every
    /// file path (the leading `.` component maps to the root entry `./`).
    /// The combined entry set is ordered with all directories first, then
    /// ascending by path component count, so every directory precedes
    /// anything nested beneath it.
    pub fn from_files(
        files: Vec<(String, ByteSource, UnixEntryProperties)>,
        directory_properties: UnixEntryProperties,
    ) -> Self {
        let mut directories = BTreeSet::new();

        for (path, _, _) in &files {
            for ancestor in ancestor_paths(path) {
                directories.insert(ancestor);
            }
        }

        let mut entries = directories
            .into_iter()
            .map(|path| TarEntry::directory(path, directory_properties.clone()))
            .collect::<Vec<_>>();

        entries.extend(
            files
                .into_iter()
                .map(|(path, content, properties)| TarEntry::file(path, properties, content)),
        );

        entries.sort_by_key(|entry| {
            (
                entry.entry_type == TarEntryType::RegularFile,
                component_count(&entry.name),
            )
        });

        Self { entries }
    }

    pub fn entries(&self) -> impl Iterator<Item = &TarEntry> {
        self.entries.iter()
    }

    /// Total encoded size of the archive in bytes.
    ///
    /// This is the sum of entry encodings plus the two end-of-archive blocks,
    /// rounded up to the blocking factor.
    pub fn len(&self) -> u64 {
        let raw = self.entries.iter().map(|e| e.encoded_len()).sum::<u64>() + 2 * BLOCK_SIZE;

        (raw + BLOCKING_FACTOR - 1) / BLOCKING_FACTOR * BLOCKING_FACTOR
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Obtain the archive encoding as a single composite [ByteSource].
    ///
    /// Headers and padding are small memory chunks; entry content is
    /// referenced as-is, so file-backed entries stream on production.
    pub fn to_byte_source(&self) -> ByteSource {
        let mut parts = vec![];
        let mut raw = 0;

        for entry in &self.entries {
            parts.push(ByteSource::from(entry.encode_header().to_vec()));

            let content_len = entry.content.len();
            if content_len > 0 {
                parts.push(entry.content.clone());

                let pad = block_padded(content_len) - content_len;
                if pad > 0 {
                    parts.push(ByteSource::Memory(vec![0; pad as usize]));
                }
            }

            raw += entry.encoded_len();
        }

        // End-of-archive blocks and blocking-factor padding, as one zero run.
        parts.push(ByteSource::Memory(vec![0; (self.len() - raw) as usize]));

        ByteSource::Concat(parts)
    }

    /// Stream the archive encoding to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.to_byte_source().copy_to(writer)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> UnixEntryProperties {
        UnixEntryProperties::root_owned(1500000000, 0o644)
    }

    fn dir_props() -> UnixEntryProperties {
        UnixEntryProperties::root_owned(1500000000, 0o755)
    }

    #[test]
    fn header_checksum_is_reproducible() {
        let entry = TarEntry::file("./some/file.txt", props(), ByteSource::from("payload"));
        let header = entry.encode_header();

        let stored = std::str::from_utf8(&header[148..154]).unwrap();
        let stored = u32::from_str_radix(stored, 8).unwrap();
        assert_eq!(header[154], 0);
        assert_eq!(header[155], b' ');

        // Re-summing with the checksum field blanked reproduces the value.
        let mut blanked = header;
        blanked[148..156].fill(b' ');
        let sum = blanked.iter().map(|b| *b as u32).sum::<u32>();

        assert_eq!(sum, stored);
    }

    #[test]
    fn header_fields() {
        let entry = TarEntry::file(
            "./control",
            UnixEntryProperties::root_owned(0o4652, 0o644),
            ByteSource::from(vec![0u8; 0o1750]),
        );
        let header = entry.encode_header();

        assert_eq!(&header[0..10], b"./control\0");
        assert_eq!(&header[100..108], b"0000644\0");
        assert_eq!(&header[108..116], b"0000000\0");
        assert_eq!(&header[124..136], b"00000001750\0");
        assert_eq!(&header[136..148], b"00000004652\0");
        assert_eq!(header[156], b'0');
        assert_eq!(&header[257..263], b"ustar\0");
        assert_eq!(&header[263..265], &[0x20, 0x00]);
        assert_eq!(&header[265..269], b"root");
        assert_eq!(&header[297..301], b"root");
    }

    #[test]
    fn oversized_octal_values_truncate_to_field_width() -> Result<()> {
        let mut properties = props();
        properties.uid = 3_000_000_000;
        let entry = TarEntry::file("./id", properties, ByteSource::from(""));

        // 3_000_000_000 is 0o26264057000; the 7-digit field keeps the low
        // digits instead of failing.
        let header = entry.encode_header();
        assert_eq!(&header[108..116], b"4057000\0");

        let mut buffer = vec![];
        TarArchive::new(vec![entry]).write_to(&mut buffer)?;

        Ok(())
    }

    #[test]
    fn absent_names_serialize_as_nul_fields() {
        let entry = TarEntry::directory("./", UnixEntryProperties::new(0, 0o755));
        let header = entry.encode_header();

        assert!(header[265..297].iter().all(|b| *b == 0));
        assert!(header[297..329].iter().all(|b| *b == 0));
        assert_eq!(header[156], b'5');
    }

    #[test]
    fn long_name_truncated_at_one_hundred_bytes() {
        let name = "n".repeat(120);
        let entry = TarEntry::file(&name, props(), ByteSource::from(""));
        let header = entry.encode_header();

        assert_eq!(&header[0..100], "n".repeat(100).as_bytes());
    }

    #[test]
    fn ancestor_directories_synthesized_and_ordered() {
        let archive = TarArchive::from_files(
            vec![
                ("./a/b/deep.txt".to_string(), ByteSource::from("x"), props()),
                ("./a/shallow.txt".to_string(), ByteSource::from("y"), props()),
                ("./top.txt".to_string(), ByteSource::from("z"), props()),
            ],
            dir_props(),
        );

        let names = archive.entries().map(|e| e.name()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "./",
                "./a",
                "./a/b",
                "./top.txt",
                "./a/shallow.txt",
                "./a/b/deep.txt",
            ]
        );

        // Shared ancestors are deduplicated.
        assert_eq!(
            archive
                .entries()
                .filter(|e| e.entry_type() == TarEntryType::Directory)
                .count(),
            3
        );
    }

    #[test]
    fn archive_length_is_a_blocking_factor_multiple() -> Result<()> {
        let archive = TarArchive::from_files(
            vec![(
                "./data.bin".to_string(),
                ByteSource::from(vec![7u8; 600]),
                props(),
            )],
            dir_props(),
        );

        let mut buffer = vec![];
        archive.write_to(&mut buffer)?;

        assert_eq!(buffer.len() as u64, archive.len());
        assert_eq!(buffer.len() as u64 % BLOCKING_FACTOR, 0);

        // Entry content is padded to a block boundary and the stream ends in
        // at least two all-zero blocks.
        let entries_end = (2 * BLOCK_SIZE + block_padded(600)) as usize;
        assert!(buffer[entries_end..].iter().all(|b| *b == 0));
        assert!(buffer.len() - entries_end >= 2 * BLOCK_SIZE as usize);

        Ok(())
    }

    #[test]
    fn decodes_with_reference_reader() -> Result<()> {
        let archive = TarArchive::from_files(
            vec![
                (
                    "./usr/bin/app".to_string(),
                    ByteSource::from("binary content"),
                    UnixEntryProperties::root_owned(1500000000, 0o755),
                ),
                (
                    "./usr/share/doc.txt".to_string(),
                    ByteSource::from("docs"),
                    props(),
                ),
            ],
            dir_props(),
        );

        let mut buffer = vec![];
        archive.write_to(&mut buffer)?;

        let mut reader = ::tar::Archive::new(std::io::Cursor::new(buffer));
        let mut seen = vec![];

        for entry in reader.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.display().to_string();
            let entry_type = entry.header().entry_type();
            let mode = entry.header().mode()?;

            if path == "./usr/bin/app" {
                assert_eq!(entry_type, ::tar::EntryType::Regular);
                assert_eq!(mode, 0o755);

                let mut content = String::new();
                std::io::Read::read_to_string(&mut entry, &mut content)?;
                assert_eq!(content, "binary content");
            }

            if path == "./usr" {
                assert_eq!(entry_type, ::tar::EntryType::Directory);
                assert_eq!(mode, 0o755);
                assert_eq!(entry.header().size()?, 0);
            }

            seen.push(path);
        }

        assert_eq!(
            seen,
            vec![
                "./",
                "./usr",
                "./usr/bin",
                "./usr/share",
                "./usr/bin/app",
                "./usr/share/doc.txt",
            ]
        );

        Ok(())
    }

    #[test]
    fn encoding_is_idempotent() -> Result<()> {
        let archive = TarArchive::from_files(
            vec![("./a/file".to_string(), ByteSource::from("abc"), props())],
            dir_props(),
        );

        let mut first = vec![];
        archive.write_to(&mut first)?;
        let mut second = vec![];
        archive.write_to(&mut second)?;

        assert_eq!(first, second);

        Ok(())
    }
}
