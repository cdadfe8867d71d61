use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

/// Deletes `path` once `grace` has elapsed, on a detached thread. There is
/// no cancellation; a file that is already gone counts as cleaned up.
pub fn schedule_removal(path: PathBuf, grace: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        thread::sleep(grace);
        remove_quietly(&path);
    })
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed expired download {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {e}", path.display()),
    }
}

/// Removes files in `dir` older than `grace`. Picks up downloads whose timer
/// died with a previous process. Returns how many files were removed.
pub fn sweep_expired(dir: &Path, grace: Duration) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let now = SystemTime::now();

    entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age >= grace)
        })
        .filter(|entry| std::fs::remove_file(entry.path()).is_ok())
        .count()
}
