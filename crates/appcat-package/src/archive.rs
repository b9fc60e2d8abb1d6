//! Package archives (zip files with a manifest.yaml at the root)

use crate::http::Fetch;
use crate::manifest::{PackageManifest, YamlLoader};
use crate::{PackageError, Result};
use serde_yaml::Value;
use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Manifest entry at the archive root
pub const MANIFEST_ENTRY: &str = "manifest.yaml";

const ENTRY_SIZE_HINT_CAP: u64 = 1 << 20;

/// Where the archive bytes live
enum Payload {
    /// Local file opened in place
    File(PathBuf),
    /// Download backed by a temp file, removed when dropped
    Temp(NamedTempFile),
    Memory(Vec<u8>),
    Closed,
}

/// One opened package.
///
/// The manifest is parsed on first access and cached. Archives fetched from
/// a URL are backed by a temporary file owned by the archive; it is removed
/// by [`PackageArchive::close`] or when the archive is dropped.
pub struct PackageArchive {
    origin: String,
    payload: Payload,
    manifest: OnceCell<PackageManifest>,
}

impl std::fmt::Debug for PackageArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageArchive")
            .field("origin", &self.origin)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl PackageArchive {
    fn with_payload(origin: String, payload: Payload) -> Self {
        Self {
            origin,
            payload,
            manifest: OnceCell::new(),
        }
    }

    /// Open a local zip file, or pack a local package directory
    pub fn open_path(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Self::open_dir(path);
        }
        if !path.is_file() {
            return Err(PackageError::Open {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            });
        }
        // Fail early on unreadable files rather than at manifest access
        File::open(path).map_err(|source| PackageError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "opened package file");
        Ok(Self::with_payload(
            path.display().to_string(),
            Payload::File(path.to_path_buf()),
        ))
    }

    /// Pack a package directory into an in-memory zip
    pub fn open_dir(dir: &Path) -> Result<Self> {
        if !dir.join(MANIFEST_ENTRY).is_file() {
            return Err(PackageError::InvalidPackage(format!(
                "directory {} does not contain {}",
                dir.display(),
                MANIFEST_ENTRY
            )));
        }

        let bytes = pack_dir(dir).map_err(|source| PackageError::Open {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!(dir = %dir.display(), size = bytes.len(), "packed package directory");
        Ok(Self::with_payload(
            dir.display().to_string(),
            Payload::Memory(bytes),
        ))
    }

    /// Download an archive; the body is streamed into a temp file
    pub fn fetch(url: &str, fetcher: &dyn Fetch) -> Result<Self> {
        let file = fetcher
            .fetch_to_file(url)
            .map_err(|source| PackageError::Fetch {
                url: url.to_string(),
                source,
            })?;
        debug!(url = %url, path = %file.path().display(), "fetched package");
        Ok(Self::with_payload(url.to_string(), Payload::Temp(file)))
    }

    /// Read an archive from any byte stream
    pub fn from_reader(origin: &str, mut reader: impl Read) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::from_bytes(origin, bytes))
    }

    pub fn from_bytes(origin: &str, bytes: Vec<u8>) -> Self {
        Self::with_payload(origin.to_string(), Payload::Memory(bytes))
    }

    /// Path, URL or label this archive was opened from
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Parsed manifest, read from the archive on first access
    pub fn manifest(&self) -> Result<&PackageManifest> {
        if let Some(manifest) = self.manifest.get() {
            return Ok(manifest);
        }

        let raw = self.read_entry(MANIFEST_ENTRY)?.ok_or_else(|| {
            PackageError::InvalidPackage(format!(
                "{} does not contain {}",
                self.origin, MANIFEST_ENTRY
            ))
        })?;
        let text = String::from_utf8(raw).map_err(|_| {
            PackageError::InvalidPackage(format!(
                "{} in {} is not valid UTF-8",
                MANIFEST_ENTRY, self.origin
            ))
        })?;
        let parsed = PackageManifest::from_str(&text).map_err(|e| {
            PackageError::InvalidPackage(format!(
                "malformed {} in {}: {}",
                MANIFEST_ENTRY, self.origin, e
            ))
        })?;

        Ok(self.manifest.get_or_init(|| parsed))
    }

    pub fn full_name(&self) -> Result<&str> {
        Ok(&self.manifest()?.full_name)
    }

    /// Class identifiers declared in `Classes`
    pub fn classes(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .manifest()?
            .class_definitions()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Logo bytes, if the archive has one
    pub fn logo(&self) -> Result<Option<Vec<u8>>> {
        let entry = self.manifest()?.logo_entry().to_string();
        self.read_entry(&entry)
    }

    /// Raw UI definition, if the archive has one
    pub fn ui_definition(&self) -> Result<Option<Vec<u8>>> {
        let entry = self.manifest()?.ui_entry();
        self.read_entry(&entry)
    }

    /// UI definition parsed with the given loader
    pub fn ui_document(&self, loader: &YamlLoader) -> Result<Option<Value>> {
        let entry = self.manifest()?.ui_entry();
        self.yaml_entry(&entry, loader)
    }

    /// Class document for a class declared in the manifest
    pub fn class_document(&self, class: &str, loader: &YamlLoader) -> Result<Option<Value>> {
        let file = match self.manifest()?.classes.get(class) {
            Some(file) => format!("Classes/{}", file),
            None => return Ok(None),
        };
        self.yaml_entry(&file, loader)
    }

    /// Upload filename
    pub fn file_name(&self) -> Result<String> {
        Ok(format!("{}.zip", self.full_name()?))
    }

    /// The complete archive payload
    pub fn bytes(&self) -> Result<Vec<u8>> {
        match &self.payload {
            Payload::File(path) => fs::read(path).map_err(|source| PackageError::Open {
                path: path.clone(),
                source,
            }),
            Payload::Temp(file) => {
                let mut bytes = Vec::new();
                file.reopen()?.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            Payload::Memory(bytes) => Ok(bytes.clone()),
            Payload::Closed => Err(self.closed_error()),
        }
    }

    /// Write the archive as `<FullName>.zip` into `dir`
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let target = dir.join(self.file_name()?);
        fs::write(&target, self.bytes()?)?;
        debug!(package = %self.origin, path = %target.display(), "saved package");
        Ok(target)
    }

    /// Backing temp file of a downloaded archive
    pub fn temp_path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::Temp(file) => Some(file.path()),
            _ => None,
        }
    }

    /// Release the payload. Idempotent; removes the temp file of a download.
    pub fn close(&mut self) {
        if !self.is_closed() {
            debug!(package = %self.origin, "closing package archive");
        }
        self.payload = Payload::Closed;
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.payload, Payload::Closed)
    }

    fn closed_error(&self) -> PackageError {
        PackageError::InvalidPackage(format!("archive {} is closed", self.origin))
    }

    fn yaml_entry(&self, entry: &str, loader: &YamlLoader) -> Result<Option<Value>> {
        let Some(raw) = self.read_entry(entry)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&raw);
        loader.load(entry, &text).map(Some)
    }

    fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let found = match &self.payload {
            Payload::File(path) => {
                let file = File::open(path).map_err(|source| PackageError::Open {
                    path: path.clone(),
                    source,
                })?;
                read_zip_entry(file, name)
            }
            Payload::Temp(file) => read_zip_entry(file.reopen()?, name),
            Payload::Memory(bytes) => read_zip_entry(Cursor::new(bytes.as_slice()), name),
            Payload::Closed => return Err(self.closed_error()),
        };
        found.map_err(|e| match e {
            PackageError::InvalidPackage(msg) => {
                PackageError::InvalidPackage(format!("{}: {}", self.origin, msg))
            }
            other => other,
        })
    }
}

fn read_zip_entry<R: Read + Seek>(reader: R, name: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| PackageError::InvalidPackage(format!("not a zip archive ({})", e)))?;

    // Materialise the result so the ZipFile borrow ends before `archive` drops
    let found = match archive.by_name(name) {
        Ok(mut entry) => {
            // The header size is untrusted; only use it as a bounded hint
            let mut buf = Vec::with_capacity(entry.size().min(ENTRY_SIZE_HINT_CAP) as usize);
            entry.read_to_end(&mut buf)?;
            Some(buf)
        }
        Err(ZipError::FileNotFound) => None,
        Err(e) => {
            return Err(PackageError::InvalidPackage(format!(
                "can't read {} ({})",
                name, e
            )))
        }
    };
    Ok(found)
}

/// Zip a directory tree; entry names are relative to `dir` with `/` separators
fn pack_dir(dir: &Path) -> io::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry.path().strip_prefix(dir).map_err(io::Error::other)?;
        let name = rel.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options).map_err(io::Error::other)?;
        } else {
            zip.start_file(name, options).map_err(io::Error::other)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut zip)?;
        }
    }

    let cursor = zip.finish().map_err(io::Error::other)?;
    Ok(cursor.into_inner())
}
