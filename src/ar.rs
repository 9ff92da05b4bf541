// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Classic `ar` archive writing.

The *common* `ar` variant is the envelope format for `.deb` packages. An
archive is the global signature `!<arch>\n` followed by members, each framed
by a fixed 60-byte ASCII header. Members start on even byte offsets: content
with an odd length is followed by a single `\n` pad byte.

Extended name tables and *thin* archives are not supported. Member names
longer than 16 bytes are truncated, matching the historical tool behavior.
*/

use {
    crate::{error::Result, properties::UnixEntryProperties, source::ByteSource},
    std::io::Write,
};

/// Global archive signature.
pub const MAGIC: &[u8] = b"!<arch>\n";

/// Size of a member header in bytes.
pub const HEADER_LEN: u64 = 60;

/// Write an ASCII value into a space-filled field, truncating on overflow.
fn put_field(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let count = bytes.len().min(field.len());
    field[..count].copy_from_slice(&bytes[..count]);
}

/// A single member of an `ar` archive.
#[derive(Clone, Debug)]
pub struct ArEntry {
    name: String,
    properties: UnixEntryProperties,
    content: ByteSource,
}

impl ArEntry {
    pub fn new(
        name: impl ToString,
        properties: UnixEntryProperties,
        content: ByteSource,
    ) -> Self {
        Self {
            name: name.to_string(),
            properties,
            content,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &ByteSource {
        &self.content
    }

    /// Total encoded size of this member, including the pad byte if any.
    pub fn encoded_len(&self) -> u64 {
        HEADER_LEN + self.content.len() + self.content.len() % 2
    }

    /// Encode the 60-byte member header.
    ///
    /// Fields are ASCII, left-justified, and space-padded. The size field is
    /// taken from the content's declared length without reading any bytes.
    fn encode_header(&self) -> [u8; HEADER_LEN as usize] {
        let mut header = [b' '; HEADER_LEN as usize];

        put_field(&mut header[0..16], &self.name);
        put_field(&mut header[16..28], &self.properties.mtime.to_string());
        put_field(&mut header[28..34], &self.properties.uid.to_string());
        put_field(&mut header[34..40], &self.properties.gid.to_string());
        put_field(
            &mut header[40..48],
            &format!("100{:o}", self.properties.mode & 0o777),
        );
        put_field(&mut header[48..58], &self.content.len().to_string());
        header[58] = 0x60;
        header[59] = 0x0a;

        header
    }
}

/// An ordered sequence of `ar` members.
///
/// Archives are stateless descriptions: building one has no side effects and
/// the only operation that touches the outside world is [Self::write_to].
#[derive(Clone, Debug, Default)]
pub struct ArArchive {
    entries: Vec<ArEntry>,
}

impl ArArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member to the archive.
    pub fn push(&mut self, entry: ArEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &ArEntry> {
        self.entries.iter()
    }

    /// Total encoded size of the archive in bytes.
    pub fn len(&self) -> u64 {
        MAGIC.len() as u64 + self.entries.iter().map(|e| e.encoded_len()).sum::<u64>()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Obtain the archive encoding as a single composite [ByteSource].
    ///
    /// Headers and pad bytes are small memory chunks; member content is
    /// referenced as-is, so file-backed members stream on production.
    pub fn to_byte_source(&self) -> ByteSource {
        let mut parts = vec![ByteSource::from(MAGIC)];

        for entry in &self.entries {
            parts.push(ByteSource::from(entry.encode_header().to_vec()));
            parts.push(entry.content.clone());

            if entry.content.len() % 2 == 1 {
                parts.push(ByteSource::from(&b"\n"[..]));
            }
        }

        ByteSource::Concat(parts)
    }

    /// Stream the archive encoding to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.to_byte_source().copy_to(writer)?;

        Ok(())
    }
}
