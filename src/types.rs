use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One save folder as seen by the latest scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub id: String,
    pub name: String,
    pub player_name: String,
    pub farm_name: String,
    pub money: i64,
    pub level: i32,
    pub day: i32,
    pub season: String,
    pub year: i32,
    pub play_time: String,
    pub last_played: DateTime<Local>,
    pub size: u64,
    pub path: PathBuf,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConfig {
    pub current_path: String,
    pub recent_paths: Vec<String>,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCheck {
    pub valid: bool,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status of one default root candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateStatus {
    pub path: String,
    pub priority: usize,
    pub exists: bool,
    pub is_dir: bool,
    pub current: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    PathChange,
    Import,
    Export,
    Delete,
    BatchExport,
    BatchDelete,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PathChange => "path_change",
            Self::Import => "import",
            Self::Export => "export",
            Self::Delete => "delete",
            Self::BatchExport => "batch_export",
            Self::BatchDelete => "batch_delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Local>,
    pub operation: OperationKind,
    pub details: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub entries: Vec<OperationLogEntry>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub name: String,
    pub path: PathBuf,
    pub overwrite: bool,
    pub backup: bool,
}

/// An archive written to the downloads directory for the caller to pick up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedArchive {
    pub file_name: String,
    pub path: PathBuf,
    pub included: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteSummary {
    pub requested: usize,
    pub success_count: usize,
}
