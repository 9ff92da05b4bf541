// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Unix metadata attached to archive entries. */

/// Unix filesystem metadata for an archive entry.
///
/// Instances are immutable value types. One instance is commonly shared by
/// many entries in an archive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnixEntryProperties {
    /// Modification time in seconds since the UNIX epoch.
    pub mtime: u64,

    /// Permission bits (owner/group/other read/write/execute).
    pub mode: u32,

    /// Numeric owner id.
    pub uid: u32,

    /// Numeric group id.
    pub gid: u32,

    /// Owner name. Serialized as a NUL-filled field when absent (tar only).
    pub owner_name: Option<String>,

    /// Group name. Serialized as a NUL-filled field when absent (tar only).
    pub group_name: Option<String>,
}

impl Default for UnixEntryProperties {
    fn default() -> Self {
        Self {
            mtime: 0,
            mode: 0o644,
            uid: 0,
            gid: 0,
            owner_name: None,
            group_name: None,
        }
    }
}

impl UnixEntryProperties {
    /// Construct an instance with the given mtime and mode, owned by id 0.
    pub fn new(mtime: u64, mode: u32) -> Self {
        Self {
            mtime,
            mode,
            ..Self::default()
        }
    }

    /// Construct an instance owned by `root:root`, as Debian archives use.
    pub fn root_owned(mtime: u64, mode: u32) -> Self {
        Self {
            mtime,
            mode,
            owner_name: Some("root".to_string()),
            group_name: Some("root".to_string()),
            ..Self::default()
        }
    }
}
