use crate::error::{Result, SaveError};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name and kind of one archive entry, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_dir: bool,
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Packs `source_dir` into a new archive at `archive_path` and syncs it to disk.
pub fn pack(source_dir: &Path, archive_path: &Path) -> Result<()> {
    let file = File::create(archive_path)
        .map_err(|e| SaveError::io(format!("create {}", archive_path.display()), e))?;
    pack_into(source_dir, file, archive_path)
}

/// Same as [`pack`] for a file the caller already opened. `archive_path` is
/// only used in error messages.
pub fn pack_into(source_dir: &Path, file: File, archive_path: &Path) -> Result<()> {
    let mut zip = ZipWriter::new(file);
    pack_with_prefix(source_dir, "", &mut zip)?;
    let file = zip.finish()?;
    file.sync_all()
        .map_err(|e| SaveError::io(format!("sync {}", archive_path.display()), e))?;
    Ok(())
}

/// Writes every entry below `source_dir` into `zip`, each name prefixed with
/// `prefix/` unless the prefix is empty.
pub fn pack_with_prefix<W: Write + Seek>(
    source_dir: &Path,
    prefix: &str,
    zip: &mut ZipWriter<W>,
) -> Result<()> {
    if !source_dir.is_dir() {
        return Err(SaveError::Archive(format!(
            "{} is not a directory",
            source_dir.display()
        )));
    }

    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel_path = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| SaveError::Archive(e.to_string()))?;
        let name = archive_name(prefix, rel_path);

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options())?;
            continue;
        }

        zip.start_file(name, options())?;
        let mut file = File::open(entry.path())
            .map_err(|e| SaveError::io(format!("open {}", entry.path().display()), e))?;
        std::io::copy(&mut file, &mut *zip)
            .map_err(|e| SaveError::Archive(format!("copy {}: {e}", entry.path().display())))?;
    }
    Ok(())
}

/// Archive names always use `/`, whatever the host separator is.
fn archive_name(prefix: &str, rel_path: &Path) -> String {
    let rel = rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
        .replace('\\', "/");
    if prefix.is_empty() {
        rel
    } else {
        format!("{}/{rel}", prefix.trim_end_matches('/'))
    }
}

pub fn entries(archive_path: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut archive = open(archive_path)?;
    let mut out = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        out.push(ArchiveEntry {
            name: file.name().to_string(),
            is_dir: file.is_dir(),
        });
    }
    Ok(out)
}

/// Extracts every entry under `target_dir`, dropping a leading
/// `strip_prefix/` from entry names. Stops at the first failure; whatever
/// was already written stays on disk.
pub fn unpack(archive_path: &Path, target_dir: &Path, strip_prefix: &str) -> Result<()> {
    let mut archive = open(archive_path)?;
    let stripped = format!("{strip_prefix}/");

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let raw_name = file.name().to_string();
        let name = if !strip_prefix.is_empty() && raw_name.starts_with(&stripped) {
            &raw_name[stripped.len()..]
        } else {
            raw_name.as_str()
        };

        let Some(rel_path) = enclosed_path(name)? else {
            // The stripped prefix directory itself
            continue;
        };
        let out_path = target_dir.join(rel_path);

        if file.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| SaveError::Archive(format!("create {}: {e}", out_path.display())))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SaveError::Archive(format!("create {}: {e}", parent.display())))?;
        }
        let mut out_file = File::create(&out_path)
            .map_err(|e| SaveError::Archive(format!("create {}: {e}", out_path.display())))?;
        std::io::copy(&mut file, &mut out_file)
            .map_err(|e| SaveError::Archive(format!("extract {raw_name}: {e}")))?;
    }
    Ok(())
}

/// Relative path for an entry name, or `None` when nothing is left of it.
/// Names that would land outside the target directory are refused.
fn enclosed_path(name: &str) -> Result<Option<PathBuf>> {
    let mut out = PathBuf::new();
    for component in Path::new(&name.replace('\\', "/")).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SaveError::Archive(format!(
                    "entry {name} escapes the extraction directory"
                )));
            }
        }
    }
    Ok((!out.as_os_str().is_empty()).then_some(out))
}

fn open(archive_path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(archive_path)
        .map_err(|e| SaveError::Archive(format!("open {}: {e}", archive_path.display())))?;
    Ok(ZipArchive::new(file)?)
}

const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
const EOCD_MIN_LEN: u64 = 22;
const EOCD_MAX_COMMENT: u64 = 0xFFFF;

/// Upload pre-check: does the file end with a zip end-of-central-directory
/// record? The reason string is meant for the uploader.
#[must_use]
pub fn verify_signature(path: &Path) -> (bool, Option<String>) {
    match find_eocd(path) {
        Ok(true) => (true, None),
        Ok(false) => (
            false,
            Some("upload does not end with a zip directory record".to_string()),
        ),
        Err(reason) => (false, Some(reason)),
    }
}

fn find_eocd(path: &Path) -> std::result::Result<bool, String> {
    let mut file = File::open(path).map_err(|e| format!("upload unreadable: {e}"))?;
    let len = file
        .metadata()
        .map_err(|e| format!("upload unreadable: {e}"))?
        .len();
    if len < EOCD_MIN_LEN {
        return Err(format!("upload is too small to be a zip archive ({len} bytes)"));
    }

    // The record may be followed by an archive comment of up to 64 KiB.
    let tail = len.min(EOCD_MIN_LEN + EOCD_MAX_COMMENT);
    file.seek(SeekFrom::Start(len - tail))
        .map_err(|e| format!("upload unreadable: {e}"))?;
    let mut buffer = Vec::with_capacity(usize::try_from(tail).unwrap_or_default());
    file.read_to_end(&mut buffer)
        .map_err(|e| format!("upload unreadable: {e}"))?;

    Ok(buffer.windows(4).rev().any(|w| w == EOCD_SIGNATURE))
}
