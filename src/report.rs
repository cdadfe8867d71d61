use crate::types::{
    BatchDeleteSummary, CandidateStatus, ExportedArchive, ImportOutcome, LogPage, PathCheck,
    PathConfig, SaveRecord,
};
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color, Table};

fn table() -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_HORIZONTAL_ONLY);
    table
}

pub fn print_path_config(config: &PathConfig) {
    let status = if config.is_valid {
        "VALID".green()
    } else {
        "INVALID".red()
    };
    println!("Active root: {} ({status})", config.current_path.cyan());
    if let Some(err) = &config.error {
        println!("  {}", err.yellow());
    }
    if !config.recent_paths.is_empty() {
        println!("{}", "Recent roots:".green());
        for (i, path) in config.recent_paths.iter().enumerate() {
            println!("  {}. {path}", i + 1);
        }
    }
}

pub fn print_path_check(check: &PathCheck) {
    if check.valid {
        println!("{} {}", "OK:".green(), check.path);
    } else {
        println!(
            "{} {} ({})",
            "REJECTED:".red(),
            check.path,
            check.error.as_deref().unwrap_or("invalid path")
        );
    }
}

pub fn print_candidates(candidates: &[CandidateStatus]) {
    let mut table = table();
    table.set_header(vec!["#", "Candidate", "Exists", "Dir", "Current", "Error"]);
    for c in candidates {
        table.add_row(vec![
            Cell::new(c.priority),
            Cell::new(&c.path),
            Cell::new(if c.exists { "yes" } else { "no" }),
            Cell::new(if c.is_dir { "yes" } else { "no" }),
            Cell::new(if c.current { "*" } else { "" }).fg(Color::Green),
            Cell::new(c.error.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

pub fn print_saves(saves: &[SaveRecord]) {
    if saves.is_empty() {
        println!("No saves found.");
        return;
    }

    let mut table = table();
    table.set_header(vec![
        "ID", "Farmer", "Farm", "Money", "Date", "Play Time", "Size", "Last Played",
    ]);

    for save in saves {
        if save.is_valid {
            table.add_row(vec![
                Cell::new(&save.id),
                Cell::new(&save.player_name),
                Cell::new(&save.farm_name),
                Cell::new(save.money),
                Cell::new(format!("Y{} {} {}", save.year, save.season, save.day)),
                Cell::new(&save.play_time),
                Cell::new(human_bytes::human_bytes(save.size as f64)),
                Cell::new(save.last_played.format("%Y-%m-%d %H:%M")),
            ]);
        } else {
            table.add_row(vec![
                Cell::new(&save.id).fg(Color::Red),
                Cell::new(save.error.as_deref().unwrap_or("invalid save")).fg(Color::Red),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(human_bytes::human_bytes(save.size as f64)),
                Cell::new(save.last_played.format("%Y-%m-%d %H:%M")),
            ]);
        }
    }

    let valid = saves.iter().filter(|s| s.is_valid).count();
    let total_size: u64 = saves.iter().map(|s| s.size).sum();
    table.add_row(vec![
        Cell::new(format!("{} saves", saves.len())).add_attribute(Attribute::Bold),
        Cell::new(format!("{} invalid", saves.len() - valid)).fg(if valid == saves.len() {
            Color::White
        } else {
            Color::Yellow
        }),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(human_bytes::human_bytes(total_size as f64)).add_attribute(Attribute::Bold),
        Cell::new(""),
    ]);

    println!("{table}");
}

pub fn print_save_details(save: &SaveRecord) {
    println!("{}", format!("=== {} ===", save.name).cyan());
    println!("ID:          {}", save.id);
    println!("Path:        {}", save.path.display());
    println!("Size:        {}", human_bytes::human_bytes(save.size as f64));
    println!("Last played: {}", save.last_played.format("%Y-%m-%d %H:%M:%S"));
    if save.is_valid {
        println!("Farmer:      {}", save.player_name.green());
        println!("Farm:        {}", save.farm_name);
        println!("Money:       {}g", save.money);
        println!("Level:       {}", save.level);
        println!("Date:        Year {}, {} {}", save.year, save.season, save.day);
        println!("Play time:   {}", save.play_time);
    } else {
        println!(
            "Status:      {} ({})",
            "INVALID".red(),
            save.error.as_deref().unwrap_or("unknown error")
        );
    }
}

pub fn print_import(outcome: &ImportOutcome) {
    println!(
        "{} {} -> {}",
        "Imported".green(),
        outcome.name,
        outcome.path.display()
    );
    if outcome.overwrite {
        let backup = if outcome.backup {
            "backup taken".green()
        } else {
            "no backup".yellow()
        };
        println!("  Replaced existing save ({backup})");
    }
}

pub fn print_export(exported: &ExportedArchive) {
    println!(
        "{} {} save(s) to {}",
        "Exported".green(),
        exported.included,
        exported.path.display()
    );
}

pub fn print_batch_delete(summary: &BatchDeleteSummary) {
    let count = if summary.success_count == summary.requested {
        summary.success_count.to_string().green()
    } else {
        summary.success_count.to_string().yellow()
    };
    println!("Deleted {count} of {} save(s)", summary.requested);
}

pub fn print_logs(page: &LogPage) {
    if page.entries.is_empty() {
        println!("No log entries on page {} ({} total).", page.page, page.total);
        return;
    }

    let mut table = table();
    table.set_header(vec!["Time", "Operation", "Details", "Result"]);
    for entry in &page.entries {
        let result = if entry.success {
            Cell::new("ok").fg(Color::Green)
        } else {
            Cell::new(entry.error.as_deref().unwrap_or("failed")).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(entry.operation.as_str()),
            Cell::new(&entry.details),
            result,
        ]);
    }
    println!("{table}");
    println!(
        "Page {} ({} per page), {} entries total",
        page.page, page.page_size, page.total
    );
}
