use crate::error::{Result, SaveError};
use crate::oplog::OperationLog;
use crate::path_guard;
use crate::types::CandidateStatus;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ROOT_CANDIDATES: &[&str] = &[
    "../stardew-multiplayer-docker/valley_saves",
    "../valley_saves",
    "./valley_saves",
];
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
pub const RECENT_PATHS_LIMIT: usize = 10;
pub const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_secs(5 * 60);

/// Runtime configuration of a repository.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub cleanup_grace: Duration,
}

impl Settings {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Settings {
            data_dir: data_dir.into(),
            cleanup_grace: DEFAULT_CLEANUP_GRACE,
        }
    }

    #[must_use]
    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(&self.data_dir)
    }
}

/// Directories and files kept under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub backups_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub state_file: PathBuf,
}

impl StorageLayout {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        StorageLayout {
            backups_dir: data_dir.join("backups"),
            downloads_dir: data_dir.join("downloads"),
            temp_dir: data_dir.join("temp"),
            state_file: data_dir.join("state.json"),
        }
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.backups_dir, &self.downloads_dir, &self.temp_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| SaveError::io(format!("create {}", dir.display()), e))?;
        }
        Ok(())
    }
}

/// What survives between runs: the active root, recent roots and the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub active_root: String,
    pub recent_paths: Vec<String>,
    #[serde(default)]
    pub logs: OperationLog,
}

impl StateSnapshot {
    /// `None` when no snapshot has been written yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SaveError::State(format!("read {}: {e}", path.display()))),
        };
        let snapshot = serde_json::from_str(&content)?;
        debug!("Loaded repository state from {}", path.display());
        Ok(Some(snapshot))
    }

    /// Writes through a sibling temp file so a crash never leaves half a
    /// snapshot behind.
    pub fn store(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| SaveError::State(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, path)
            .map_err(|e| SaveError::State(format!("replace {}: {e}", path.display())))?;
        Ok(())
    }
}

/// First existing candidate directory, or the first candidate created on the
/// spot when none exists yet.
#[must_use]
pub fn discover_default_root(base: &Path) -> PathBuf {
    let candidates: Vec<PathBuf> = DEFAULT_ROOT_CANDIDATES
        .iter()
        .map(|c| resolve_candidate(base, c))
        .collect();

    if let Some(found) = candidates.iter().find(|c| c.is_dir()) {
        return found.clone();
    }

    let fallback = candidates[0].clone();
    match fs::create_dir_all(&fallback) {
        Ok(()) => info!("Created default save root {}", fallback.display()),
        Err(e) => warn!("Could not create default save root {}: {e}", fallback.display()),
    }
    fallback
}

fn resolve_candidate(base: &Path, candidate: &str) -> PathBuf {
    let joined = base.join(candidate);
    path_guard::absolutize(&joined).unwrap_or(joined)
}

#[must_use]
pub fn probe_candidates(base: &Path, current: &str) -> Vec<CandidateStatus> {
    DEFAULT_ROOT_CANDIDATES
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let resolved = resolve_candidate(base, candidate);
            let (exists, is_dir, error) = match fs::metadata(&resolved) {
                Ok(m) => (true, m.is_dir(), None),
                Err(e) => (false, false, Some(e.to_string())),
            };
            CandidateStatus {
                path: (*candidate).to_string(),
                priority: i + 1,
                exists,
                is_dir,
                current: resolved.to_string_lossy() == current,
                error,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperationKind;

    #[test]
    fn test_layout_and_ensure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Settings::new(dir.path()).layout();
        layout.ensure().unwrap();
        assert!(layout.backups_dir.is_dir());
        assert!(layout.downloads_dir.is_dir());
        assert!(layout.temp_dir.is_dir());
        assert_eq!(layout.state_file, dir.path().join("state.json"));
    }

    #[test]
    fn test_snapshot_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert_eq!(StateSnapshot::load(&path).unwrap(), None);

        let mut snapshot = StateSnapshot {
            active_root: "/srv/saves".into(),
            recent_paths: vec!["/srv/saves".into(), "/srv/old".into()],
            logs: OperationLog::new(),
        };
        snapshot.logs.append(OperationKind::PathChange, "switch", true, None);
        snapshot.store(&path).unwrap();

        assert_eq!(StateSnapshot::load(&path).unwrap(), Some(snapshot));
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_snapshot_is_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(StateSnapshot::load(&path), Err(SaveError::State(_))));
    }

    #[test]
    fn test_discover_prefers_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("app");
        fs::create_dir_all(base.join("valley_saves")).unwrap();

        let root = discover_default_root(&base);
        assert_eq!(root, base.join("valley_saves"));
    }

    #[test]
    fn test_discover_creates_first_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("app");
        fs::create_dir_all(&base).unwrap();

        let root = discover_default_root(&base);
        assert_eq!(root, dir.path().join("stardew-multiplayer-docker/valley_saves"));
        assert!(root.is_dir());
    }

    #[test]
    fn test_probe_reports_each_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("app");
        fs::create_dir_all(base.join("valley_saves")).unwrap();
        let current = base.join("valley_saves").to_string_lossy().to_string();

        let statuses = probe_candidates(&base, &current);
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[0].priority, 1);
        assert!(!statuses[0].exists);
        assert!(statuses[0].error.is_some());
        assert!(statuses[2].exists && statuses[2].is_dir && statuses[2].current);
    }
}
