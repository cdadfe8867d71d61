//! Import of an uploaded archive into the active root.
//!
//! Order is fixed: infer the layout, check for a conflict, back up the
//! existing save (if asked), remove it, then extract. A failed backup leaves
//! the existing save untouched.

use crate::archive::{self, ArchiveEntry};
use crate::error::{Result, SaveError};
use crate::types::ImportOutcome;
use chrono::Local;
use log::{info, warn};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Where an archive's save lives once extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub save_name: String,
    /// Top-level directory inside the archive, stripped on extraction.
    pub nested_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    pub archive_path: &'a Path,
    pub active_root: &'a Path,
    pub backups_dir: &'a Path,
    pub overwrite: bool,
    pub take_backup: bool,
}

pub fn infer_layout(entries: &[ArchiveEntry], archive_path: &Path) -> Result<ArchiveLayout> {
    let mut nested_dir: Option<String> = None;
    let mut has_root_files = false;

    for entry in entries.iter().filter(|e| !e.is_dir) {
        match entry.name.split_once('/') {
            Some((top, _)) => {
                if nested_dir.is_none() {
                    nested_dir = Some(top.to_string());
                }
            }
            None => has_root_files = true,
        }
    }

    let save_name = match (&nested_dir, has_root_files) {
        (Some(dir), _) => dir.clone(),
        (None, true) => archive_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        (None, false) => {
            return Err(SaveError::Structure(
                "archive contains no save files".to_string(),
            ));
        }
    };

    if !is_safe_save_name(&save_name) {
        return Err(SaveError::Structure(format!(
            "unusable save folder name {save_name:?}"
        )));
    }

    Ok(ArchiveLayout {
        save_name,
        nested_dir,
    })
}

fn is_safe_save_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains(std::path::MAIN_SEPARATOR)
}

/// Packs `source` into a new backup archive named `<save>_<unix>.zip`.
/// An existing backup is never overwritten: when the name is taken, a
/// counter is appended (`<save>_<unix>_1.zip`, ...). A failed pack removes
/// the partial file.
pub fn write_backup(backups_dir: &Path, save_name: &str, source: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(backups_dir)
        .map_err(|e| SaveError::io(format!("create {}", backups_dir.display()), e))?;

    let (path, file) = create_backup_file(backups_dir, save_name)?;
    if let Err(e) = archive::pack_into(source, file, &path) {
        std::fs::remove_file(&path).ok();
        return Err(e);
    }
    Ok(path)
}

fn create_backup_file(backups_dir: &Path, save_name: &str) -> Result<(PathBuf, File)> {
    let stamp = Local::now().timestamp();
    let mut attempt: u32 = 0;
    loop {
        let file_name = if attempt == 0 {
            format!("{save_name}_{stamp}.zip")
        } else {
            format!("{save_name}_{stamp}_{attempt}.zip")
        };
        let path = backups_dir.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(SaveError::io(format!("create {}", path.display()), e)),
        }
    }
}

pub fn resolve(req: &ImportRequest<'_>) -> Result<ImportOutcome> {
    let entries = archive::entries(req.archive_path)?;
    let layout = infer_layout(&entries, req.archive_path)?;
    let target = req.active_root.join(&layout.save_name);

    let mut backed_up = false;
    let mut replaced = false;
    if target.exists() {
        if !req.overwrite {
            return Err(SaveError::Conflict(layout.save_name));
        }

        if req.take_backup {
            let backup = write_backup(req.backups_dir, &layout.save_name, &target)
                .map_err(|e| SaveError::Backup(e.to_string()))?;
            info!("Backed up {} to {}", target.display(), backup.display());
            backed_up = true;
        }

        std::fs::remove_dir_all(&target)
            .map_err(|e| SaveError::io(format!("remove {}", target.display()), e))?;
        replaced = true;
    }

    std::fs::create_dir_all(&target)
        .map_err(|e| SaveError::io(format!("create {}", target.display()), e))?;

    let strip = layout.nested_dir.as_deref().unwrap_or("");
    if let Err(e) = archive::unpack(req.archive_path, &target, strip) {
        warn!("Extraction into {} failed part way: {e}", target.display());
        return Err(e);
    }

    Ok(ImportOutcome {
        name: layout.save_name,
        path: target,
        overwrite: replaced,
        backup: backed_up,
    })
}
