//! Warning system for the translate command.
//!
//! Tracks statements that were carried over but may still be rejected by
//! PostgreSQL, so they can be reviewed before the script is replayed.

use serde::Serialize;

/// Warnings that can occur during translation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranslateWarning {
    /// A zero date was kept because an earlier rewrite already matched
    ZeroDateKept { table: Option<String>, line: u64 },
    /// Backslashes were kept because an earlier rewrite already matched
    EscapesKept { table: Option<String>, line: u64 },
    /// INSERT statement whose target table could not be determined
    UnknownTarget { line: u64, statement_preview: String },
}

fn table_label(table: &Option<String>) -> String {
    table
        .as_ref()
        .map(|t| format!("table {}", t))
        .unwrap_or_else(|| "unknown table".to_string())
}

impl std::fmt::Display for TranslateWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateWarning::ZeroDateKept { table, line } => write!(
                f,
                "Zero date kept in {} (line {}); use --rewrite-mode cumulative to normalize it",
                table_label(table),
                line
            ),
            TranslateWarning::EscapesKept { table, line } => write!(
                f,
                "Backslash escapes kept in {} (line {}); use --rewrite-mode cumulative to strip them",
                table_label(table),
                line
            ),
            TranslateWarning::UnknownTarget {
                line,
                statement_preview,
            } => write!(
                f,
                "Could not determine target table on line {} ({})",
                line, statement_preview
            ),
        }
    }
}

/// Collects warnings during translation
#[derive(Debug, Default)]
pub struct WarningCollector {
    warnings: Vec<TranslateWarning>,
    max_warnings: usize,
    dropped: usize,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::with_limit(100)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            warnings: Vec::new(),
            max_warnings: limit,
            dropped: 0,
        }
    }

    /// Add a warning, keeping only the first occurrence per table and kind.
    pub fn add(&mut self, warning: TranslateWarning) {
        if self.warnings.iter().any(|w| Self::is_similar(w, &warning)) {
            return;
        }
        if self.warnings.len() < self.max_warnings {
            self.warnings.push(warning);
        } else {
            self.dropped += 1;
        }
    }

    fn is_similar(a: &TranslateWarning, b: &TranslateWarning) -> bool {
        match (a, b) {
            (
                TranslateWarning::ZeroDateKept { table: t1, .. },
                TranslateWarning::ZeroDateKept { table: t2, .. },
            ) => t1 == t2,
            (
                TranslateWarning::EscapesKept { table: t1, .. },
                TranslateWarning::EscapesKept { table: t2, .. },
            ) => t1 == t2,
            _ => false,
        }
    }

    pub fn warnings(&self) -> &[TranslateWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<TranslateWarning> {
        self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Warnings discarded after the limit was reached
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Shorten a statement for display in warnings.
pub fn preview(stmt: &str) -> String {
    const MAX: usize = 60;
    if stmt.chars().count() <= MAX {
        stmt.to_string()
    } else {
        let head: String = stmt.chars().take(MAX).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduplicates_per_table() {
        let mut collector = WarningCollector::new();
        collector.add(TranslateWarning::ZeroDateKept {
            table: Some("access_log".to_string()),
            line: 10,
        });
        collector.add(TranslateWarning::ZeroDateKept {
            table: Some("access_log".to_string()),
            line: 11,
        });
        collector.add(TranslateWarning::ZeroDateKept {
            table: Some("repository".to_string()),
            line: 12,
        });
        collector.add(TranslateWarning::EscapesKept {
            table: Some("access_log".to_string()),
            line: 13,
        });

        assert_eq!(collector.warnings().len(), 3);
    }

    #[test]
    fn test_limit() {
        let mut collector = WarningCollector::with_limit(2);
        for line in 0..5 {
            collector.add(TranslateWarning::UnknownTarget {
                line,
                statement_preview: "INSERT INTO".to_string(),
            });
        }
        assert_eq!(collector.warnings().len(), 2);
        assert_eq!(collector.dropped(), 3);
    }

    #[test]
    fn test_display() {
        let warning = TranslateWarning::ZeroDateKept {
            table: Some("access_log".to_string()),
            line: 42,
        };
        assert_eq!(
            warning.to_string(),
            "Zero date kept in table access_log (line 42); use --rewrite-mode cumulative to normalize it"
        );
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(100);
        assert_eq!(preview(&long).len(), 63);
        assert_eq!(preview("short"), "short");
    }
}
