// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Create .deb package files and their components. */

use {
    crate::{
        ar::{ArArchive, ArEntry},
        control::{ControlField, ControlParagraph},
        deb::{DebCompression, DEBIAN_BINARY_CONTENT},
        error::{DebArchiveError, Result},
        properties::UnixEntryProperties,
        source::ByteSource,
        tar::{TarArchive, TarEntryType},
    },
    log::debug,
    md5::{Digest, Md5},
    std::{collections::BTreeMap, io::Write, time::SystemTime},
};

/// Package metadata serialized into the `control` file.
#[derive(Clone, Debug, Default)]
pub struct PackageMetadata {
    /// Package name. Required.
    pub package: String,
    /// Package version. Required.
    pub version: String,
    /// Target architecture, e.g. `amd64`. Required.
    pub architecture: String,
    /// Maintainer name and email. Required.
    pub maintainer: String,
    /// Package description. The first line is the synopsis; subsequent lines
    /// become indented continuation lines.
    pub description: Option<String>,
    pub homepage: Option<String>,
    /// License text, installed as `usr/share/doc/<package>/copyright`.
    pub license: Option<String>,
    pub section: Option<String>,
    pub priority: Option<String>,
    /// Package dependencies, joined into a `Depends` field.
    pub depends: Vec<String>,
}

/// Freedesktop metadata for an executable payload entry.
///
/// Produces a `.desktop` file under `usr/share/applications` and hicolor
/// icons under `usr/share/icons`, keyed by pixel size.
#[derive(Clone, Debug, Default)]
pub struct DesktopEntry {
    /// Application display name.
    pub name: String,
    pub comment: Option<String>,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub startup_wm_class: Option<String>,
    /// Square PNG icons keyed by pixel size.
    pub icons: BTreeMap<u32, ByteSource>,
}

/// How a payload entry is installed.
#[derive(Clone, Debug)]
pub enum PayloadKind {
    /// An ordinary file, installed mode 644.
    Regular,
    /// An executable, installed mode 755 with a generated launcher script
    /// and, optionally, a desktop entry with icons.
    Executable { desktop: Option<DesktopEntry> },
}

/// A file to install, addressed relative to the package's install root.
#[derive(Clone, Debug)]
pub struct PayloadEntry {
    pub path: String,
    pub content: ByteSource,
    pub kind: PayloadKind,
}

/// Adapter feeding [ByteSource] production into an MD5 hasher.
struct DigestWriter(Md5);

impl Write for DigestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn content_md5_hex(source: &ByteSource) -> Result<String> {
    let mut writer = DigestWriter(Md5::new());
    source.copy_to(&mut writer)?;

    Ok(hex::encode(writer.0.finalize()))
}

fn desktop_entry_text(app: &str, exec: &str, desktop: &DesktopEntry) -> String {
    let mut text = String::from("[Desktop Entry]\nType=Application\n");
    text.push_str(&format!("Name={}\n", desktop.name));

    if let Some(comment) = &desktop.comment {
        text.push_str(&format!("Comment={}\n", comment));
    }

    text.push_str(&format!("Exec={}\n", exec));

    if !desktop.icons.is_empty() {
        text.push_str(&format!("Icon={}\n", app));
    }

    text.push_str("Terminal=false\n");

    if !desktop.categories.is_empty() {
        text.push_str(&format!("Categories={};\n", desktop.categories.join(";")));
    }

    if !desktop.keywords.is_empty() {
        text.push_str(&format!("Keywords={};\n", desktop.keywords.join(";")));
    }

    if let Some(wm_class) = &desktop.startup_wm_class {
        text.push_str(&format!("StartupWMClass={}\n", wm_class));
    }

    text
}

/// A builder for a `.deb` package file.
///
/// Payload files are relocated under `usr/local/bin/<package>/`; executables
/// additionally get a launcher script directly in `usr/local/bin` so they
/// land on `PATH`. The builder derives `control.tar` (control file, md5sums,
/// maintainer scripts) and `data.tar` entry lists and composes the final
/// three-member `ar` archive.
pub struct DebBuilder {
    metadata: PackageMetadata,
    compression: DebCompression,
    payload: Vec<PayloadEntry>,
    maintainer_scripts: Vec<(String, ByteSource)>,
    mtime: Option<SystemTime>,
}

impl DebBuilder {
    /// Construct a new instance from package metadata.
    pub fn new(metadata: PackageMetadata) -> Self {
        Self {
            metadata,
            compression: DebCompression::Uncompressed,
            payload: vec![],
            maintainer_scripts: vec![],
            mtime: None,
        }
    }

    /// Set the compression format to use for the tar members.
    ///
    /// Not all compression formats are supported by all Linux distributions.
    pub fn set_compression(mut self, compression: DebCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the modified time to use on archive members.
    ///
    /// If this is called, all archive members will use the specified time,
    /// helping to make archive content deterministic.
    ///
    /// If not called, the current time will be used. Times before the UNIX
    /// epoch are treated as the epoch.
    pub fn set_mtime(mut self, time: Option<SystemTime>) -> Self {
        self.mtime = time;
        self
    }

    /// Register a payload entry to be installed by this package.
    pub fn install(mut self, entry: PayloadEntry) -> Self {
        self.payload.push(entry);
        self
    }

    /// Register an ordinary file, addressed relative to the install root.
    pub fn install_file(self, path: impl ToString, content: ByteSource) -> Self {
        self.install(PayloadEntry {
            path: path.to_string(),
            content,
            kind: PayloadKind::Regular,
        })
    }

    /// Register an executable, with an optional desktop entry.
    pub fn install_executable(
        self,
        path: impl ToString,
        content: ByteSource,
        desktop: Option<DesktopEntry>,
    ) -> Self {
        self.install(PayloadEntry {
            path: path.to_string(),
            content,
            kind: PayloadKind::Executable { desktop },
        })
    }

    /// Add a maintainer script to the `control.tar` archive.
    ///
    /// `name` must be one of `preinst`, `postinst`, `prerm`, `postrm`.
    pub fn maintainer_script(mut self, name: impl ToString, content: ByteSource) -> Self {
        self.maintainer_scripts.push((name.to_string(), content));
        self
    }

    fn mtime(&self) -> u64 {
        self.mtime
            .unwrap_or_else(SystemTime::now)
            .duration_since(std::time::UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or(0)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("Package", &self.metadata.package),
            ("Version", &self.metadata.version),
            ("Architecture", &self.metadata.architecture),
            ("Maintainer", &self.metadata.maintainer),
        ] {
            if value.trim().is_empty() {
                return Err(DebArchiveError::MetadataInvalid(format!(
                    "required field {} is empty",
                    name
                )));
            }
        }

        for entry in &self.payload {
            if entry.path.starts_with('/') || entry.path.split('/').any(|c| c == "..") {
                return Err(DebArchiveError::MetadataInvalid(format!(
                    "illegal payload path: {}",
                    entry.path
                )));
            }
        }

        for (name, _) in &self.maintainer_scripts {
            if !matches!(name.as_str(), "preinst" | "postinst" | "prerm" | "postrm") {
                return Err(DebArchiveError::MetadataInvalid(format!(
                    "unknown maintainer script: {}",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Derive the `data.tar` entry list.
    fn data_archive(&self, mtime: u64) -> TarArchive {
        let prefix = format!("usr/local/bin/{}", self.metadata.package);
        let mut files = vec![];

        for entry in &self.payload {
            let mode = match &entry.kind {
                PayloadKind::Regular => 0o644,
                PayloadKind::Executable { .. } => 0o755,
            };

            files.push((
                format!("./{}/{}", prefix, entry.path),
                entry.content.clone(),
                UnixEntryProperties::root_owned(mtime, mode),
            ));

            if let PayloadKind::Executable { desktop } = &entry.kind {
                let app = entry.path.rsplit('/').next().unwrap_or(&entry.path);

                let launcher = format!(
                    "#!/usr/bin/env sh\nexec \"/{}/{}\" \"$@\"\n",
                    prefix, entry.path
                );
                files.push((
                    format!("./usr/local/bin/{}", app),
                    ByteSource::from(launcher),
                    UnixEntryProperties::root_owned(mtime, 0o751),
                ));

                if let Some(desktop) = desktop {
                    let text =
                        desktop_entry_text(app, &format!("/usr/local/bin/{}", app), desktop);
                    files.push((
                        format!("./usr/share/applications/{}.desktop", app),
                        ByteSource::from(text),
                        UnixEntryProperties::root_owned(mtime, 0o644),
                    ));

                    for (size, icon) in &desktop.icons {
                        files.push((
                            format!(
                                "./usr/share/icons/hicolor/{}x{}/apps/{}.png",
                                size, size, app
                            ),
                            icon.clone(),
                            UnixEntryProperties::root_owned(mtime, 0o644),
                        ));
                    }
                }
            }
        }

        if let Some(license) = &self.metadata.license {
            let copyright = format!(
                "Upstream-Name: {}\nLicense: {}\n",
                self.metadata.package, license
            );
            files.push((
                format!("./usr/share/doc/{}/copyright", self.metadata.package),
                ByteSource::from(copyright),
                UnixEntryProperties::root_owned(mtime, 0o644),
            ));
        }

        TarArchive::from_files(files, UnixEntryProperties::root_owned(mtime, 0o755))
    }

    /// Generate the `control` file text for this package.
    fn control_file_text(&self, data: &TarArchive) -> Result<Vec<u8>> {
        let metadata = &self.metadata;
        let mut paragraph = ControlParagraph::default();

        paragraph.set_field_from_string("Package", &metadata.package);
        paragraph.set_field_from_string("Version", &metadata.version);
        paragraph.set_field_from_string("Architecture", &metadata.architecture);

        if let Some(section) = &metadata.section {
            paragraph.set_field_from_string("Section", section);
        }

        if let Some(priority) = &metadata.priority {
            paragraph.set_field_from_string("Priority", priority);
        }

        paragraph.set_field_from_string("Maintainer", &metadata.maintainer);

        let installed_size = data
            .entries()
            .filter(|e| e.entry_type() == TarEntryType::RegularFile)
            .map(|e| e.content().len())
            .sum::<u64>()
            / 1024;
        paragraph.set_field_from_string("Installed-Size", installed_size);

        if let Some(homepage) = &metadata.homepage {
            paragraph.set_field_from_string("Homepage", homepage);
        }

        if !metadata.depends.is_empty() {
            paragraph.set_field_from_string("Depends", metadata.depends.join(", "));
        }

        if let Some(description) = &metadata.description {
            paragraph.set_field(ControlField::from_lines(
                "Description",
                description.lines().map(|line| {
                    // Blank continuation lines are spelled as a lone dot.
                    if line.trim().is_empty() {
                        ".".to_string()
                    } else {
                        line.to_string()
                    }
                }),
            ));
        }

        let mut buffer = vec![];
        paragraph.write(&mut buffer)?;
        buffer.push(b'\n');

        Ok(buffer)
    }

    /// Derive the `control.tar` entry list.
    ///
    /// This reads every regular file in the `data.tar` entry list once to
    /// compute its checksum for the `md5sums` member.
    fn control_archive(&self, data: &TarArchive, mtime: u64) -> Result<TarArchive> {
        let control_text = self.control_file_text(data)?;

        let mut md5sums = vec![];
        for entry in data
            .entries()
            .filter(|e| e.entry_type() == TarEntryType::RegularFile)
        {
            md5sums.extend_from_slice(content_md5_hex(entry.content())?.as_bytes());
            md5sums.extend_from_slice(b"  ");
            md5sums.extend_from_slice(entry.name().trim_start_matches("./").as_bytes());
            md5sums.push(b'\n');
        }

        let mut files = vec![
            (
                "./control".to_string(),
                ByteSource::from(control_text),
                UnixEntryProperties::root_owned(mtime, 0o644),
            ),
            (
                "./md5sums".to_string(),
                ByteSource::from(md5sums),
                UnixEntryProperties::root_owned(mtime, 0o644),
            ),
        ];

        for (name, content) in &self.maintainer_scripts {
            files.push((
                format!("./{}", name),
                content.clone(),
                UnixEntryProperties::root_owned(mtime, 0o755),
            ));
        }

        Ok(TarArchive::from_files(
            files,
            UnixEntryProperties::root_owned(mtime, 0o755),
        ))
    }

    /// Frame a tar archive as an `ar` member content source.
    fn member_source(&self, archive: &TarArchive) -> Result<ByteSource> {
        match self.compression {
            DebCompression::Uncompressed => Ok(archive.to_byte_source()),
            _ => {
                let raw = archive.to_byte_source().materialize()?;
                let compressed = self.compression.compress(&mut std::io::Cursor::new(raw))?;

                Ok(ByteSource::Memory(compressed))
            }
        }
    }

    /// Write `.deb` file content to a writer.
    ///
    /// Metadata is validated before any byte is written. A content or sink
    /// failure aborts mid-stream and leaves the destination unfinished;
    /// callers wanting atomicity should write to a temporary path and rename
    /// on success.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.validate()?;

        let mtime = self.mtime();
        let data = self.data_archive(mtime);
        let control = self.control_archive(&data, mtime)?;

        debug!(
            "composing {} {}: data.tar {} bytes, control.tar {} bytes",
            self.metadata.package,
            self.metadata.version,
            data.len(),
            control.len()
        );

        let properties = UnixEntryProperties::new(mtime, 0o644);

        let mut archive = ArArchive::new();
        archive.push(ArEntry::new(
            "debian-binary",
            properties.clone(),
            ByteSource::from(DEBIAN_BINARY_CONTENT),
        ));
        archive.push(ArEntry::new(
            format!("control.tar{}", self.compression.extension()),
            properties.clone(),
            self.member_source(&control)?,
        ));
        archive.push(ArEntry::new(
            format!("data.tar{}", self.compression.extension()),
            properties,
            self.member_source(&data)?,
        ));

        archive.write_to(writer)
    }
}
