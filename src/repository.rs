//! The save repository: every operation the front end can ask for.
//!
//! Mutable state (active root, recent roots, operation log) sits behind one
//! mutex. Filesystem work happens outside the lock against a copy of the
//! active root, so a scan racing a root change may see either root.

use crate::archive;
use crate::cleanup;
use crate::error::{Result, SaveError};
use crate::import::{self, ImportRequest};
use crate::oplog::OperationLog;
use crate::path_guard;
use crate::scanner;
use crate::settings::{
    self, MAX_UPLOAD_BYTES, RECENT_PATHS_LIMIT, Settings, StateSnapshot, StorageLayout,
};
use crate::types::{
    BatchDeleteSummary, CandidateStatus, ExportedArchive, ImportOutcome, LogPage, OperationKind,
    PathCheck, PathConfig, SaveRecord,
};
use chrono::Local;
use log::{info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;
use zip::ZipWriter;

#[derive(Debug)]
struct RepoState {
    active_root: String,
    recent_paths: Vec<String>,
    logs: OperationLog,
}

impl RepoState {
    fn remember_root(&mut self, path: &str) {
        if let Some(pos) = self.recent_paths.iter().position(|p| p == path) {
            self.recent_paths.remove(pos);
        }
        self.recent_paths.insert(0, path.to_string());
        self.recent_paths.truncate(RECENT_PATHS_LIMIT);
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            active_root: self.active_root.clone(),
            recent_paths: self.recent_paths.clone(),
            logs: self.logs.clone(),
        }
    }
}

#[derive(Debug)]
pub struct SaveRepository {
    settings: Settings,
    layout: StorageLayout,
    state: Mutex<RepoState>,
}

impl SaveRepository {
    /// Opens the repository under `settings.data_dir`, restoring the last
    /// snapshot or discovering a default root on first use.
    pub fn open(settings: Settings) -> Result<Self> {
        let layout = settings.layout();
        layout.ensure()?;

        let swept = cleanup::sweep_expired(&layout.downloads_dir, settings.cleanup_grace);
        if swept > 0 {
            info!("Removed {swept} expired download(s)");
        }

        let state = match StateSnapshot::load(&layout.state_file)? {
            Some(snapshot) => RepoState {
                active_root: snapshot.active_root,
                recent_paths: snapshot.recent_paths,
                logs: snapshot.logs,
            },
            None => {
                let root = settings::discover_default_root(&settings.data_dir)
                    .to_string_lossy()
                    .to_string();
                RepoState {
                    recent_paths: vec![root.clone()],
                    active_root: root,
                    logs: OperationLog::new(),
                }
            }
        };

        if !path_guard::validate(&state.active_root) {
            warn!("Active save root {} is not usable", state.active_root);
        }

        Ok(SaveRepository {
            settings,
            layout,
            state: Mutex::new(state),
        })
    }

    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    fn lock(&self) -> MutexGuard<'_, RepoState> {
        // Nothing in RepoState can be left half-updated by a panic
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &RepoState) {
        if let Err(e) = state.snapshot().store(&self.layout.state_file) {
            warn!("Could not save repository state: {e}");
        }
    }

    fn record(&self, operation: OperationKind, details: String, error: Option<String>) {
        let mut state = self.lock();
        state.logs.append(operation, details, error.is_none(), error);
        self.persist(&state);
    }

    fn active_root(&self) -> String {
        self.lock().active_root.clone()
    }

    pub fn active_path(&self) -> PathConfig {
        let state = self.lock();
        let error = path_guard::check(&state.active_root).err();
        PathConfig {
            current_path: state.active_root.clone(),
            recent_paths: state.recent_paths.clone(),
            is_valid: error.is_none(),
            error: error.map(|e| e.to_string()),
        }
    }

    pub fn set_active_path(&self, path: &str) -> Result<PathConfig> {
        let canonical = path_guard::check(path)?.to_string_lossy().to_string();

        let mut state = self.lock();
        state.active_root = canonical.clone();
        state.remember_root(&canonical);
        state.logs.append(
            OperationKind::PathChange,
            format!("Switched save root to {canonical}"),
            true,
            None,
        );
        self.persist(&state);
        info!("Active save root is now {canonical}");

        Ok(PathConfig {
            current_path: canonical,
            recent_paths: state.recent_paths.clone(),
            is_valid: true,
            error: None,
        })
    }

    #[must_use]
    pub fn validate_path(&self, path: &str) -> PathCheck {
        let error = path_guard::check(path).err();
        PathCheck {
            valid: error.is_none(),
            path: path.to_string(),
            error: error.map(|e| e.to_string()),
        }
    }

    pub fn probe_default_roots(&self) -> Vec<CandidateStatus> {
        settings::probe_candidates(&self.settings.data_dir, &self.active_root())
    }

    /// All saves under the active root, most recently played first.
    pub fn list_saves(&self) -> Result<Vec<SaveRecord>> {
        let mut saves = scanner::scan(&self.active_root())?;
        saves.sort_by(|a, b| b.last_played.cmp(&a.last_played));
        Ok(saves)
    }

    pub fn get_save(&self, id: &str) -> Result<SaveRecord> {
        scanner::scan(&self.active_root())?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SaveError::NotFound(id.to_string()))
    }

    fn backup(&self, save: &SaveRecord) -> Result<PathBuf> {
        import::write_backup(&self.layout.backups_dir, &save.name, &save.path)
    }

    /// Backs the save up, then removes it. A failed backup is logged but does
    /// not stop the deletion.
    pub fn delete_save(&self, id: &str) -> Result<()> {
        let save = self.get_save(id)?;

        if let Err(e) = self.backup(&save) {
            warn!("Backup before deleting {} failed: {e}", save.name);
            self.record(
                OperationKind::Delete,
                format!("Backup before deleting {} failed", save.name),
                Some(e.to_string()),
            );
        }

        if let Err(e) = std::fs::remove_dir_all(&save.path) {
            let err = SaveError::io(format!("remove {}", save.path.display()), e);
            self.record(
                OperationKind::Delete,
                format!("Failed to delete save {}", save.name),
                Some(err.to_string()),
            );
            return Err(err);
        }

        self.record(OperationKind::Delete, format!("Deleted save {}", save.name), None);
        Ok(())
    }

    /// Reads an archive from disk and imports it. The size limit is checked
    /// before the file is read.
    pub fn import_file(
        &self,
        archive_path: &Path,
        overwrite: bool,
        take_backup: bool,
    ) -> Result<ImportOutcome> {
        let metadata = std::fs::metadata(archive_path)
            .map_err(|e| SaveError::io(format!("stat {}", archive_path.display()), e))?;
        check_upload_size(metadata.len())?;

        let bytes = std::fs::read(archive_path)
            .map_err(|e| SaveError::io(format!("read {}", archive_path.display()), e))?;
        let file_name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.import_save(&file_name, &bytes, overwrite, take_backup)
    }

    pub fn import_save(
        &self,
        file_name: &str,
        bytes: &[u8],
        overwrite: bool,
        take_backup: bool,
    ) -> Result<ImportOutcome> {
        let file_name = upload_file_name(file_name)?;
        check_upload_size(bytes.len() as u64)?;

        // Each upload gets its own staging directory but keeps its file
        // name, which the layout inference may fall back on.
        let staging = self.layout.temp_dir.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&staging)
            .map_err(|e| SaveError::io(format!("create {}", staging.display()), e))?;
        let staged = staging.join(&file_name);

        let result = std::fs::write(&staged, bytes)
            .map_err(|e| SaveError::io(format!("write {}", staged.display()), e))
            .and_then(|()| match archive::verify_signature(&staged) {
                (true, _) => Ok(()),
                (false, reason) => Err(SaveError::InvalidRequest(
                    reason.unwrap_or_else(|| "not a zip archive".to_string()),
                )),
            })
            .and_then(|()| {
                let root = path_guard::check(&self.active_root())?;
                import::resolve(&ImportRequest {
                    archive_path: &staged,
                    active_root: &root,
                    backups_dir: &self.layout.backups_dir,
                    overwrite,
                    take_backup,
                })
            });

        if let Err(e) = std::fs::remove_dir_all(&staging) {
            warn!("Could not remove staging directory {}: {e}", staging.display());
        }

        match &result {
            Ok(outcome) => {
                info!("Imported {} into {}", file_name, outcome.path.display());
                self.record(OperationKind::Import, format!("Imported {file_name}"), None);
            }
            Err(e) => self.record(
                OperationKind::Import,
                format!("Failed to import {file_name}"),
                Some(e.to_string()),
            ),
        }
        result
    }

    fn download_path(&self, stem: &str) -> (String, PathBuf) {
        let file_name = format!("{stem}_{}.zip", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.layout.downloads_dir.join(&file_name);
        (file_name, path)
    }

    fn schedule_cleanup(&self, path: &Path) {
        // Detached: the handle is dropped on purpose
        let _ = cleanup::schedule_removal(path.to_path_buf(), self.settings.cleanup_grace);
    }

    /// Packs one save into the downloads directory. The archive is removed
    /// again after the cleanup grace period.
    pub fn export_save(&self, id: &str) -> Result<ExportedArchive> {
        let save = self.get_save(id)?;
        let (file_name, path) = self.download_path(&save.name);

        if let Err(e) = archive::pack(&save.path, &path) {
            std::fs::remove_file(&path).ok();
            self.record(
                OperationKind::Export,
                format!("Failed to export save {}", save.name),
                Some(e.to_string()),
            );
            return Err(e);
        }

        self.record(OperationKind::Export, format!("Exported save {}", save.name), None);
        self.schedule_cleanup(&path);
        Ok(ExportedArchive {
            file_name,
            path,
            included: 1,
        })
    }

    /// Packs several saves into one archive, each under its own folder name.
    /// Saves that cannot be found or packed are skipped.
    pub fn batch_export(&self, ids: &[String]) -> Result<ExportedArchive> {
        let ids = dedup_ids(ids)?;
        let saves = scanner::scan(&self.active_root())?;
        let (file_name, path) = self.download_path("saves_batch");

        let file = File::create(&path)
            .map_err(|e| SaveError::io(format!("create {}", path.display()), e))?;
        let mut zip = ZipWriter::new(file);

        let mut included = 0;
        for id in ids {
            let Some(save) = saves.iter().find(|s| s.id == id) else {
                warn!("Batch export: no save with id {id}");
                continue;
            };
            match archive::pack_with_prefix(&save.path, &save.name, &mut zip) {
                Ok(()) => included += 1,
                Err(e) => warn!("Batch export: skipping {}: {e}", save.name),
            }
        }

        let finished = zip
            .finish()
            .map_err(SaveError::from)
            .and_then(|f| f.sync_all().map_err(SaveError::from));

        if included == 0 || finished.is_err() {
            std::fs::remove_file(&path).ok();
            let err = finished.err().unwrap_or(SaveError::NoSuccess);
            self.record(
                OperationKind::BatchExport,
                "Batch export produced no archive".to_string(),
                Some(err.to_string()),
            );
            return Err(err);
        }

        self.record(
            OperationKind::BatchExport,
            format!("Batch exported {included} save(s)"),
            None,
        );
        self.schedule_cleanup(&path);
        Ok(ExportedArchive {
            file_name,
            path,
            included,
        })
    }

    /// Best-effort backup and delete of each id. Unknown ids and failed
    /// deletions are skipped.
    pub fn batch_delete(&self, ids: &[String]) -> Result<BatchDeleteSummary> {
        let ids = dedup_ids(ids)?;
        let saves = scanner::scan(&self.active_root())?;

        let mut success_count = 0;
        for id in &ids {
            let Some(save) = saves.iter().find(|s| &s.id == id) else {
                warn!("Batch delete: no save with id {id}");
                continue;
            };
            if let Err(e) = self.backup(save) {
                warn!("Batch delete: backup of {} failed: {e}", save.name);
            }
            match std::fs::remove_dir_all(&save.path) {
                Ok(()) => success_count += 1,
                Err(e) => warn!("Batch delete: could not remove {}: {e}", save.path.display()),
            }
        }

        self.record(
            OperationKind::BatchDelete,
            format!("Batch deleted {success_count} save(s)"),
            None,
        );
        Ok(BatchDeleteSummary {
            requested: ids.len(),
            success_count,
        })
    }

    pub fn list_logs(&self, page: usize, page_size: usize) -> LogPage {
        self.lock().logs.page(page, page_size)
    }
}

fn upload_file_name(file_name: &str) -> Result<String> {
    let name = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| SaveError::InvalidRequest("upload has no file name".to_string()))?;
    if !name.to_lowercase().ends_with(".zip") {
        return Err(SaveError::InvalidRequest(
            "only .zip archives can be imported".to_string(),
        ));
    }
    Ok(name)
}

fn check_upload_size(len: u64) -> Result<()> {
    if len > MAX_UPLOAD_BYTES {
        return Err(SaveError::InvalidRequest(format!(
            "archive is {len} bytes, limit is {MAX_UPLOAD_BYTES}"
        )));
    }
    Ok(())
}

/// Drops repeated ids, keeping first-seen order. An empty list is an error.
fn dedup_ids(ids: &[String]) -> Result<Vec<String>> {
    if ids.is_empty() {
        return Err(SaveError::InvalidRequest("no save ids given".to_string()));
    }
    let mut seen = HashSet::new();
    Ok(ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect())
}
