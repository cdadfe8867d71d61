use crate::types::{LogPage, OperationKind, OperationLogEntry};
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LOG_CAPACITY: usize = 1000;
pub const LOG_TRIM_BLOCK: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;

/// Append-only audit trail of repository operations. Once it grows past
/// `LOG_CAPACITY` the oldest `LOG_TRIM_BLOCK` entries go in one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationLog {
    entries: Vec<OperationLogEntry>,
}

impl OperationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        operation: OperationKind,
        details: impl Into<String>,
        success: bool,
        error: Option<String>,
    ) -> &OperationLogEntry {
        self.entries.push(OperationLogEntry {
            id: Uuid::new_v4(),
            timestamp: Local::now(),
            operation,
            details: details.into(),
            success,
            error,
        });

        if self.entries.len() > LOG_CAPACITY {
            self.entries.drain(..LOG_TRIM_BLOCK);
        }
        &self.entries[self.entries.len() - 1]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Newest-first page. `page` below 1 reads as 1; a `page_size` outside
    /// `1..=MAX_PAGE_SIZE` falls back to `DEFAULT_PAGE_SIZE`.
    #[must_use]
    pub fn page(&self, page: usize, page_size: usize) -> LogPage {
        let page = page.max(1);
        let page_size = if (1..=MAX_PAGE_SIZE).contains(&page_size) {
            page_size
        } else {
            DEFAULT_PAGE_SIZE
        };

        let entries = self
            .entries
            .iter()
            .rev()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect();

        LogPage {
            entries,
            total: self.len(),
            page,
            page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> OperationLog {
        let mut log = OperationLog::new();
        for i in 0..n {
            log.append(OperationKind::Export, format!("entry {i}"), true, None);
        }
        log
    }

    #[test]
    fn test_trim_drops_block_of_hundred() {
        assert_eq!(filled(1000).len(), 1000);
        assert_eq!(filled(1001).len(), 901);

        let log = filled(1005);
        assert_eq!(log.len(), 905);
        // Oldest survivor is entry 100
        let last_page = log.page(10, 100);
        assert_eq!(last_page.entries.last().unwrap().details, "entry 100");
    }

    #[test]
    fn test_page_is_newest_first() {
        let log = filled(5);
        let page = log.page(1, 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.page_size, 2);
        let details: Vec<_> = page.entries.iter().map(|e| e.details.as_str()).collect();
        assert_eq!(details, vec!["entry 4", "entry 3"]);

        let tail = log.page(3, 2);
        assert_eq!(tail.entries.len(), 1);
        assert_eq!(tail.entries[0].details, "entry 0");
    }

    #[test]
    fn test_page_bounds() {
        let log = filled(3);
        assert!(log.page(5, 10).entries.is_empty());

        let clamped = log.page(0, 0);
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(log.page(1, 500).page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(log.page(1, 100).page_size, 100);
    }

    #[test]
    fn test_append_records_failure() {
        let mut log = OperationLog::new();
        let entry = log.append(OperationKind::Delete, "delete Farm", false, Some("denied".into()));
        assert!(!entry.success);
        assert_eq!(entry.error.as_deref(), Some("denied"));
        assert_eq!(entry.operation.as_str(), "delete");
    }
}
