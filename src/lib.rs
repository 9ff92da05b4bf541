// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Streaming construction of `ar`, `ustar`, and `.deb` archives.

This crate builds software distribution packages by assembling classic binary
container formats from logical content entries, without materializing whole
archives in memory.

# Goals

## Byte fidelity

Headers are hand-encoded to the classic formats: the 60-byte ASCII `ar`
member header and the 512-byte USTAR header with its two-pass checksum.
Output is decodable by the reference toolchains (`ar`, `tar`, `dpkg -i`).

## Determinism and reproducibility

Archives are pure descriptions of their entry lists. Encoding the same
entry list twice yields byte-identical output; nothing injects hidden
timestamps beyond the supplied entry properties.

## Streaming

Content is modeled as [source::ByteSource]: a byte sequence whose exact
length is known before any byte is produced. Encoders write headers from
declared lengths and then drain content to the sink in entry order, so peak
memory is bounded by one in-flight chunk, not archive size.

# A Tour of Functionality

[tar::TarArchive] encodes USTAR streams, synthesizing and ordering ancestor
directory entries from a flat file list. [ar::ArArchive] encodes classic `ar`
streams. [deb::DebBuilder] composes both into a `.deb` package: a generated
`control.tar` (control file, md5sums, maintainer scripts) and a `data.tar`
laying payload files out under FHS paths, framed behind a `debian-binary`
member. [control] generates Debian control file text and [properties] defines
the Unix metadata attached to archive entries.
*/

pub mod ar;
pub mod control;
pub mod deb;
pub mod error;
pub mod properties;
pub mod source;
pub mod tar;

pub use crate::{
    error::{DebArchiveError, Result},
    properties::UnixEntryProperties,
    source::ByteSource,
};
