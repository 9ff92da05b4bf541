// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Content sources with up-front known lengths.

Archive headers encode the byte count of the content that follows them, so
every piece of content fed to an encoder must be able to report its exact
length *before* any byte is produced. [ByteSource] models this: a finite
sequence of bytes whose length is known at declaration time and which can be
materialized any number of times (an archive needs the size for the header and
the bytes for the body, in separate passes for some compositions).

Declaring a source never fails. A source backed by a missing or unreadable
file fails when its bytes are produced, not before.
*/

use {
    crate::error::{DebArchiveError, Result},
    std::{
        io::{Read, Write},
        path::{Path, PathBuf},
    },
};

/// A finite byte sequence with a known length.
///
/// Data can live in memory, on the filesystem, or be the concatenation of
/// other sources.
#[derive(Clone, Debug)]
pub enum ByteSource {
    /// Bytes held in memory.
    Memory(Vec<u8>),

    /// Bytes backed by a file on the filesystem.
    ///
    /// `length` is the declared byte count. The file is opened lazily on
    /// production and must yield exactly `length` bytes.
    File { path: PathBuf, length: u64 },

    /// The in-order concatenation of other sources.
    Concat(Vec<ByteSource>),
}

impl ByteSource {
    /// Declare a file-backed source with an explicit length.
    ///
    /// This never touches the filesystem. If the file cannot be opened or is
    /// shorter than `length` when the bytes are produced, production fails.
    pub fn file(path: impl AsRef<Path>, length: u64) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            length,
        }
    }

    /// Declare a file-backed source, resolving the length from file metadata.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| DebArchiveError::ContentUnavailable {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(Self::file(path, metadata.len()))
    }

    /// Concatenate sources into a composite source.
    ///
    /// The composite's length is the sum of the children's lengths and its
    /// bytes are the children's bytes in order, each child drained fully
    /// before the next starts.
    pub fn concat(sources: impl IntoIterator<Item = ByteSource>) -> Self {
        Self::Concat(sources.into_iter().collect())
    }

    /// The exact number of bytes this source produces.
    pub fn len(&self) -> u64 {
        match self {
            Self::Memory(data) => data.len() as u64,
            Self::File { length, .. } => *length,
            Self::Concat(sources) => sources.iter().map(|s| s.len()).sum(),
        }
    }

    /// Whether this source produces no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce the bytes of this source into a writer.
    ///
    /// Exactly [Self::len()] bytes are written on success. File-backed
    /// sources stream in chunks; the whole source is never buffered.
    pub fn copy_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        match self {
            Self::Memory(data) => {
                writer.write_all(data)?;
                Ok(data.len() as u64)
            }
            Self::File { path, length } => {
                let file =
                    std::fs::File::open(path).map_err(|e| DebArchiveError::ContentUnavailable {
                        path: path.display().to_string(),
                        source: e,
                    })?;

                let mut taken = file.take(*length);
                let written = std::io::copy(&mut taken, writer)?;

                if written != *length {
                    return Err(DebArchiveError::SourceLengthMismatch {
                        path: path.display().to_string(),
                        expected: *length,
                        actual: written,
                    });
                }

                Ok(written)
            }
            Self::Concat(sources) => {
                let mut written = 0;

                for source in sources {
                    written += source.copy_to(writer)?;
                }

                Ok(written)
            }
        }
    }

    /// Materialize the full content in memory.
    pub fn materialize(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.len() as usize);
        self.copy_to(&mut buffer)?;

        Ok(buffer)
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(data: Vec<u8>) -> Self {
        Self::Memory(data)
    }
}

impl From<&[u8]> for ByteSource {
    fn from(data: &[u8]) -> Self {
        Self::Memory(data.to_vec())
    }
}

impl From<String> for ByteSource {
    fn from(data: String) -> Self {
        Self::Memory(data.into_bytes())
    }
}

impl From<&str> for ByteSource {
    fn from(data: &str) -> Self {
        Self::Memory(data.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Write};

    #[test]
    fn memory_length_and_content() -> Result<()> {
        let source = ByteSource::from("hello");

        assert_eq!(source.len(), 5);
        assert_eq!(source.materialize()?, b"hello");

        Ok(())
    }

    #[test]
    fn concat_drains_children_in_order() -> Result<()> {
        let source = ByteSource::concat([
            ByteSource::from("abc"),
            ByteSource::from(""),
            ByteSource::from("def"),
        ]);

        assert_eq!(source.len(), 6);
        assert_eq!(source.materialize()?, b"abcdef");

        Ok(())
    }

    #[test]
    fn file_backed_source() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"file content")?;
        file.flush()?;

        let source = ByteSource::from_path(file.path())?;
        assert_eq!(source.len(), 12);
        assert_eq!(source.materialize()?, b"file content");

        // Re-materialization yields the same bytes.
        assert_eq!(source.materialize()?, b"file content");

        Ok(())
    }

    #[test]
    fn missing_file_fails_at_produce_time() {
        let source = ByteSource::file("/nonexistent/path/to/content", 42);
        assert_eq!(source.len(), 42);

        match source.materialize() {
            Err(DebArchiveError::ContentUnavailable { path, .. }) => {
                assert_eq!(path, "/nonexistent/path/to/content");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn short_file_fails_with_length_mismatch() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"short")?;
        file.flush()?;

        let source = ByteSource::file(file.path(), 100);

        match source.materialize() {
            Err(DebArchiveError::SourceLengthMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 100);
                assert_eq!(actual, 5);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        Ok(())
    }
}
