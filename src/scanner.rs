use crate::error::{Result, SaveError};
use crate::identity::assign_id;
use crate::path_guard;
use crate::save_format::{self, SaveMetadata};
use crate::types::SaveRecord;
use chrono::{DateTime, Local};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

const METADATA_EXTENSION: &str = ".xml";
const SIDECAR_PREFIX: &str = "SaveGameInfo";
const BACKUP_SUFFIX: &str = "_old";

/// Sum of file lengths below `path`. Entries that cannot be read are skipped.
#[must_use]
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry while sizing {}: {e}", path.display());
                None
            }
        })
        .filter_map(|entry| entry.metadata().ok())
        .filter(std::fs::Metadata::is_file)
        .map(|m| m.len())
        .sum()
}

pub fn scan(root: &str) -> Result<Vec<SaveRecord>> {
    let root = path_guard::check(root)?;

    let entries = std::fs::read_dir(&root)
        .map_err(|e| SaveError::io(format!("list {}", root.display()), e))?;

    let mut folders: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {e}", root.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .map(|entry| entry.path())
        .collect();
    folders.sort();

    Ok(folders
        .iter()
        .map(|folder| inspect_save_dir(&root, folder))
        .collect())
}

/// Builds the record for one save folder. Never fails: problems end up in
/// the record's `error`.
#[must_use]
pub fn inspect_save_dir(root: &Path, save_path: &Path) -> SaveRecord {
    let name = save_path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().to_string());

    // Use UNIX_EPOCH as fallback so unreadable folders sort last
    let last_played: DateTime<Local> = std::fs::metadata(save_path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .into();

    let mut record = SaveRecord {
        id: assign_id(root, save_path),
        name,
        player_name: String::new(),
        farm_name: String::new(),
        money: 0,
        level: 0,
        day: 0,
        season: String::new(),
        year: 0,
        play_time: String::new(),
        last_played,
        size: directory_size(save_path),
        path: save_path.to_path_buf(),
        is_valid: false,
        error: None,
    };

    let Some(save_file) = find_main_save_file(save_path) else {
        record.error = Some("no save file found".to_string());
        return record;
    };

    match save_format::parse(&save_file) {
        Ok(meta) => fill_gameplay(&mut record, meta),
        Err(e) => {
            debug!("Failed to parse {}: {e}", save_file.display());
            record.error = Some(e.to_string());
        }
    }
    record
}

fn fill_gameplay(record: &mut SaveRecord, meta: SaveMetadata) {
    record.player_name = meta.player_name;
    record.farm_name = meta.farm_name;
    record.money = meta.money;
    record.level = meta.level;
    record.day = meta.day_of_month;
    record.season = meta.season;
    record.year = meta.year;
    record.play_time = save_format::format_play_duration(meta.milliseconds_played);
    record.is_valid = true;
}

/// The file named after its folder wins; otherwise the first extension-less
/// or `.xml` file that is neither a sidecar nor a backup copy.
#[must_use]
pub fn find_main_save_file(save_path: &Path) -> Option<PathBuf> {
    let named = save_path.join(save_path.file_name()?);
    if named.is_file() {
        return Some(named);
    }

    let mut names: Vec<String> = std::fs::read_dir(save_path)
        .ok()?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| !t.is_dir()))
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();

    names
        .into_iter()
        .find(|name| is_main_save_candidate(name))
        .map(|name| save_path.join(name))
}

fn is_main_save_candidate(name: &str) -> bool {
    (!name.contains('.') || name.ends_with(METADATA_EXTENSION))
        && !name.starts_with(SIDECAR_PREFIX)
        && !name.ends_with(BACKUP_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save_format::tests::save_xml;
    use std::fs;

    #[test]
    fn test_scan_valid_and_missing_save() {
        let dir = tempfile::tempdir().unwrap();
        let farm1 = dir.path().join("Farm1");
        let farm2 = dir.path().join("Farm2");
        fs::create_dir(&farm1).unwrap();
        fs::create_dir(&farm2).unwrap();
        fs::write(farm1.join("Farm1"), save_xml("Abigail", "Sunny", 5000, 12, "spring")).unwrap();
        fs::write(farm2.join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("stray_file"), "ignored").unwrap();

        let records = scan(&dir.path().to_string_lossy()).unwrap();
        assert_eq!(records.len(), 2);

        let f1 = records.iter().find(|r| r.name == "Farm1").unwrap();
        assert!(f1.is_valid);
        assert_eq!(f1.money, 5000);
        assert_eq!(f1.day, 12);
        assert_eq!(f1.season, "spring");
        assert_eq!(f1.player_name, "Abigail");
        assert_eq!(f1.play_time, "1 hour 1 minute");
        assert!(f1.error.is_none());

        let f2 = records.iter().find(|r| r.name == "Farm2").unwrap();
        assert!(!f2.is_valid);
        assert_eq!(f2.money, 0);
        assert!(f2.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert_eq!(f2.size, 5);
    }

    #[test]
    fn test_scan_records_parse_failure_on_record() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("Broken");
        fs::create_dir(&broken).unwrap();
        fs::write(
            broken.join("Broken"),
            "<SaveGame><player><money>lots</money></player></SaveGame>",
        )
        .unwrap();

        let records = scan(&dir.path().to_string_lossy()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_valid);
        assert!(records[0].error.as_deref().unwrap().contains("decode"));
    }

    #[test]
    fn test_scan_ids_stable_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["A_1", "B_2", "C_3"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let root = dir.path().to_string_lossy().to_string();
        let first: Vec<String> = scan(&root).unwrap().into_iter().map(|r| r.id).collect();
        let second: Vec<String> = scan(&root).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(first, vec!["A_1", "B_2", "C_3"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_scan_rejects_invalid_root() {
        assert!(matches!(scan("/etc"), Err(SaveError::InvalidPath(_))));
        assert!(matches!(scan(""), Err(SaveError::InvalidPath(_))));
    }

    #[test]
    fn test_find_main_save_file_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let save = dir.path().join("Sunny_1");
        fs::create_dir(&save).unwrap();
        fs::write(save.join("SaveGameInfo"), "info").unwrap();
        fs::write(save.join("Sunny_1_old"), "old").unwrap();
        fs::write(save.join("readme.txt"), "txt").unwrap();
        assert_eq!(find_main_save_file(&save), None);

        fs::write(save.join("game.xml"), "xml").unwrap();
        assert_eq!(find_main_save_file(&save), Some(save.join("game.xml")));

        fs::write(save.join("Sunny_1"), "main").unwrap();
        assert_eq!(find_main_save_file(&save), Some(save.join("Sunny_1")));
    }

    #[test]
    fn test_directory_size_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("one"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("a/b/two"), vec![0u8; 32]).unwrap();
        assert_eq!(directory_size(dir.path()), 42);
    }
}
