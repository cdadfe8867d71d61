mod archive;
mod cleanup;
mod error;
mod identity;
mod import;
mod oplog;
mod path_guard;
mod report;
mod repository;
mod save_format;
mod scanner;
mod settings;
mod types;

use clap::{Parser, Subcommand};
use colored::Colorize;
use error::{Result, SaveError};
use repository::SaveRepository;
use serde::Serialize;
use settings::Settings;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "Manage a directory of game save folders", long_about = None)]
struct Args {
    /// Directory holding backups, downloads and repository state
    #[arg(long, short = 'd', default_value = ".", global = true)]
    data_dir: PathBuf,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Seconds an exported archive is kept before it is removed
    #[arg(long, default_value_t = 300, global = true)]
    grace_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or change the active save root
    Path {
        #[command(subcommand)]
        action: PathAction,
    },
    /// List every save under the active root
    List,
    /// Show one save
    Show { id: String },
    /// Back up and delete one save
    Delete { id: String },
    /// Import a zip archive into the active root
    Import {
        archive: PathBuf,
        /// Replace a save with the same name
        #[arg(long)]
        overwrite: bool,
        /// Skip the backup of a replaced save
        #[arg(long)]
        no_backup: bool,
    },
    /// Export one save as a zip archive
    Export {
        id: String,
        /// Copy the archive here as well
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
    /// Export several saves into one zip archive
    BatchExport {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
    /// Back up and delete several saves
    BatchDelete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show the operation log, newest first
    Logs {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = oplog::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
}

#[derive(Subcommand, Debug)]
enum PathAction {
    /// Show the active root and recently used roots
    Show,
    /// Switch the active root
    Set { path: String },
    /// Check whether a directory would be accepted as a root
    Validate { path: String },
    /// Report on the default root locations
    Probe,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let json = args.json;

    if let Err(e) = run(args) {
        if json {
            let body = serde_json::json!({
                "success": false,
                "kind": e.kind(),
                "error": e.to_string(),
            });
            println!("{body}");
        } else {
            eprintln!("{} {e}", "Error:".red());
        }
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut settings = Settings::new(&args.data_dir);
    settings.cleanup_grace = Duration::from_secs(args.grace_secs);
    let repo = SaveRepository::open(settings)?;
    let json = args.json;

    match args.command {
        Command::Path { action } => match action {
            PathAction::Show => emit(json, &repo.active_path(), report::print_path_config),
            PathAction::Set { path } => {
                emit(json, &repo.set_active_path(&path)?, report::print_path_config);
            }
            PathAction::Validate { path } => {
                emit(json, &repo.validate_path(&path), report::print_path_check);
            }
            PathAction::Probe => {
                let candidates = repo.probe_default_roots();
                emit(json, &candidates, |c| report::print_candidates(c));
            }
        },
        Command::List => {
            let saves = repo.list_saves()?;
            emit(json, &saves, |s| report::print_saves(s));
        }
        Command::Show { id } => emit(json, &repo.get_save(&id)?, report::print_save_details),
        Command::Delete { id } => {
            repo.delete_save(&id)?;
            let backups = repo.layout().backups_dir.display().to_string();
            emit(json, &serde_json::json!({ "deleted": id }), |_| {
                println!("{} {id} (backups kept in {backups})", "Deleted".green());
            });
        }
        Command::Import {
            archive,
            overwrite,
            no_backup,
        } => {
            let outcome = repo.import_file(&archive, overwrite, !no_backup)?;
            emit(json, &outcome, report::print_import);
        }
        Command::Export { id, out } => {
            let exported = repo.export_save(&id)?;
            deliver(&exported, out.as_deref(), json)?;
            emit(json, &exported, report::print_export);
        }
        Command::BatchExport { ids, out } => {
            let exported = repo.batch_export(&ids)?;
            deliver(&exported, out.as_deref(), json)?;
            emit(json, &exported, report::print_export);
        }
        Command::BatchDelete { ids } => {
            emit(json, &repo.batch_delete(&ids)?, report::print_batch_delete);
        }
        Command::Logs { page, page_size } => {
            emit(json, &repo.list_logs(page, page_size), report::print_logs);
        }
    }
    Ok(())
}

/// Copies the produced archive to where the user asked for it. The copy in
/// the downloads directory is still cleaned up on schedule.
fn deliver(
    exported: &types::ExportedArchive,
    out: Option<&std::path::Path>,
    json: bool,
) -> Result<()> {
    if let Some(out) = out {
        std::fs::copy(&exported.path, out)
            .map_err(|e| SaveError::io(format!("copy to {}", out.display()), e))?;
        if !json {
            println!("Saved copy to {}", out.display());
        }
    }
    Ok(())
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, render: impl FnOnce(&T)) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to encode output: {e}"),
        }
    } else {
        render(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_accepted_after_subcommand() {
        let args = Args::try_parse_from([
            "save_keeper",
            "list",
            "--data-dir",
            "/srv/keeper",
            "--grace-secs",
            "60",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.data_dir, PathBuf::from("/srv/keeper"));
        assert_eq!(args.grace_secs, 60);
        assert!(args.json);
        assert!(matches!(args.command, Command::List));
    }

    #[test]
    fn test_defaults_without_flags() {
        let args = Args::try_parse_from(["save_keeper", "logs"]).unwrap();
        assert_eq!(args.data_dir, PathBuf::from("."));
        assert_eq!(args.grace_secs, 300);
        assert!(matches!(
            args.command,
            Command::Logs {
                page: 1,
                page_size: oplog::DEFAULT_PAGE_SIZE
            }
        ));
    }
}
