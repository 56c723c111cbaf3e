//! Per-table rewriting of `INSERT` statements.

use crate::profile::{Profile, RuleIndex, TableRule};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Zero date accepted by MySQL but rejected by PostgreSQL
pub const ZERO_DATE: &str = "0000-00-00 00:00:00";
/// Smallest date PostgreSQL accepts in its place
pub const MIN_DATE: &str = "0001-01-01 00:00:00";

/// How the generic rewrites combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RewriteMode {
    /// The first matching rewrite wins: a renamed statement is not
    /// escape-stripped, and an escape-stripped one keeps its zero dates
    #[default]
    FirstMatch,
    /// Every applicable rewrite is applied to each statement
    Cumulative,
}

impl std::fmt::Display for RewriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewriteMode::FirstMatch => write!(f, "first-match"),
            RewriteMode::Cumulative => write!(f, "cumulative"),
        }
    }
}

/// Rewrites applied to a kept statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub renamed: bool,
    pub escapes_stripped: bool,
    pub date_normalized: bool,
}

/// An `INSERT` statement retained for the translated script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    /// Target table after renaming, if it could be determined
    pub table: Option<String>,
    pub text: String,
    pub applied: Applied,
}

impl InsertStatement {
    /// Whether a zero date survived the rewrite.
    pub fn has_zero_date(&self) -> bool {
        self.text.contains(ZERO_DATE)
    }

    /// Whether backslashes survived the rewrite.
    pub fn has_escapes(&self) -> bool {
        self.text.contains('\\')
    }
}

/// Result of rewriting one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    Suppressed { table: String },
    Kept(InsertStatement),
}

static RE_INSERT_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^INSERT\s+INTO\s+(?:"([^"]+)"|`([^`]+)`|([A-Za-z_][A-Za-z0-9_$]*))"#).unwrap()
});

/// Target table of an `INSERT INTO` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertTarget<'s> {
    pub name: &'s str,
    /// Byte range of the bare name, inside any quotes
    pub span: Range<usize>,
    /// Written as a `"quoted"` or `` `quoted` `` identifier
    pub quoted: bool,
}

pub fn insert_target(stmt: &str) -> Option<InsertTarget<'_>> {
    let caps = RE_INSERT_TARGET.captures(stmt)?;
    let (m, quoted) = match caps.get(1).or_else(|| caps.get(2)) {
        Some(m) => (m, true),
        None => (caps.get(3)?, false),
    };
    Some(InsertTarget {
        name: m.as_str(),
        span: m.range(),
        quoted,
    })
}

/// Applies a profile's table rules and the generic data fixes to `INSERT`
/// statements.
///
/// Precedence: suppress, rename, strip backslashes, normalize zero dates,
/// pass through. Quoted table names must match a rule exactly; bare names
/// match case-insensitively.
pub struct StatementRewriter<'a> {
    rules: RuleIndex<'a>,
    mode: RewriteMode,
}

impl<'a> StatementRewriter<'a> {
    pub fn new(profile: &'a Profile) -> Self {
        Self {
            rules: profile.rule_index(),
            mode: RewriteMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: RewriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> RewriteMode {
        self.mode
    }

    /// Rewrite one trimmed `INSERT` statement.
    pub fn rewrite(&self, stmt: &str) -> Rewrite {
        let target = insert_target(stmt);
        let mut table = target.as_ref().map(|t| t.name.to_string());
        let mut text = stmt.to_string();
        let mut applied = Applied::default();

        if let Some(target) = &target {
            let rule = if target.quoted {
                self.rules.get_exact(target.name)
            } else {
                self.rules.get(target.name)
            };
            match rule {
                Some(TableRule::Suppress) => {
                    return Rewrite::Suppressed {
                        table: target.name.to_string(),
                    };
                }
                Some(TableRule::Rename(to)) => {
                    let span = &target.span;
                    text = format!("{}{}{}", &stmt[..span.start], to, &stmt[span.end..]);
                    table = Some(to.clone());
                    applied.renamed = true;
                    if self.mode == RewriteMode::FirstMatch {
                        return Rewrite::Kept(InsertStatement {
                            table,
                            text,
                            applied,
                        });
                    }
                }
                Some(TableRule::Passthrough) | None => {}
            }
        }

        if text.contains('\\') {
            text = text.replace('\\', "");
            applied.escapes_stripped = true;
            if self.mode == RewriteMode::FirstMatch {
                return Rewrite::Kept(InsertStatement {
                    table,
                    text,
                    applied,
                });
            }
        }

        if text.contains(ZERO_DATE) {
            text = text.replace(ZERO_DATE, MIN_DATE);
            applied.date_normalized = true;
        }

        Rewrite::Kept(InsertStatement {
            table,
            text,
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Database;

    fn kept(rewrite: Rewrite) -> InsertStatement {
        match rewrite {
            Rewrite::Kept(stmt) => stmt,
            Rewrite::Suppressed { table } => panic!("unexpectedly suppressed {}", table),
        }
    }

    #[test]
    fn test_insert_target() {
        let target = insert_target("INSERT INTO \"user\" VALUES (1);").unwrap();
        assert_eq!(target.name, "user");
        assert_eq!(target.span, 13..17);
        assert!(target.quoted);

        let target = insert_target("INSERT INTO `project` VALUES (1,0);").unwrap();
        assert_eq!(target.name, "project");
        assert!(target.quoted);

        let target = insert_target("INSERT INTO access_log VALUES (1);").unwrap();
        assert_eq!(target.name, "access_log");
        assert!(!target.quoted);

        assert!(insert_target("INSERT INTO (1);").is_none());
    }

    #[test]
    fn test_quoted_names_match_rules_exactly() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile);

        let stmt = kept(rewriter.rewrite("INSERT INTO \"USER\" VALUES (1,'a');"));
        assert_eq!(stmt.text, "INSERT INTO \"USER\" VALUES (1,'a');");
        assert!(!stmt.applied.renamed);

        let stmt = kept(rewriter.rewrite("INSERT INTO `Properties` VALUES (1,'x');"));
        assert_eq!(stmt.table.as_deref(), Some("Properties"));

        let stmt = kept(rewriter.rewrite("INSERT INTO USER VALUES (1,'a');"));
        assert_eq!(stmt.text, "INSERT INTO harbor_user VALUES (1,'a');");
        assert_eq!(
            rewriter.rewrite("INSERT INTO Properties VALUES (1,'x');"),
            Rewrite::Suppressed {
                table: "Properties".to_string()
            }
        );
    }

    #[test]
    fn test_rename_keeps_payload() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile);

        let stmt = kept(rewriter.rewrite(
            "INSERT INTO \"user\" VALUES (1,'admin','admin@example.com');",
        ));
        assert_eq!(
            stmt.text,
            "INSERT INTO \"harbor_user\" VALUES (1,'admin','admin@example.com');"
        );
        assert_eq!(stmt.table.as_deref(), Some("harbor_user"));
        assert!(stmt.applied.renamed);
    }

    #[test]
    fn test_rename_does_not_touch_similar_names() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile);

        let stmt = kept(rewriter.rewrite("INSERT INTO \"user_group\" VALUES (1,'devs');"));
        assert_eq!(stmt.text, "INSERT INTO \"user_group\" VALUES (1,'devs');");
        assert!(!stmt.applied.renamed);
    }

    #[test]
    fn test_suppress() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile);

        assert_eq!(
            rewriter.rewrite("INSERT INTO \"properties\" VALUES (1,'auth_mode','db_auth');"),
            Rewrite::Suppressed {
                table: "properties".to_string()
            }
        );
    }

    #[test]
    fn test_suppress_wins_over_escapes() {
        let profile = Database::NotarySigner.profile();
        let rewriter = StatementRewriter::new(&profile);

        assert!(matches!(
            rewriter.rewrite("INSERT INTO \"schema_migrations\" VALUES ('a\\'b');"),
            Rewrite::Suppressed { .. }
        ));
    }

    #[test]
    fn test_strip_escapes() {
        let profile = Database::NotaryServer.profile();
        let rewriter = StatementRewriter::new(&profile);

        let stmt = kept(rewriter.rewrite("INSERT INTO \"tuf_files\" VALUES (1,'{\\\"a\\\":1}');"));
        assert_eq!(stmt.text, "INSERT INTO \"tuf_files\" VALUES (1,'{\"a\":1}');");
        assert!(stmt.applied.escapes_stripped);
    }

    #[test]
    fn test_normalize_zero_date() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile);

        let stmt = kept(rewriter.rewrite(
            "INSERT INTO \"repository\" VALUES (1,'library/nginx','0000-00-00 00:00:00','0000-00-00 00:00:00');",
        ));
        assert_eq!(
            stmt.text,
            "INSERT INTO \"repository\" VALUES (1,'library/nginx','0001-01-01 00:00:00','0001-01-01 00:00:00');"
        );
        assert!(stmt.applied.date_normalized);
    }

    #[test]
    fn test_first_match_keeps_zero_date_after_escape_strip() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile);

        let stmt = kept(rewriter.rewrite(
            "INSERT INTO \"access_log\" VALUES (1,'it\\'s','0000-00-00 00:00:00');",
        ));
        assert_eq!(
            stmt.text,
            "INSERT INTO \"access_log\" VALUES (1,'it's','0000-00-00 00:00:00');"
        );
        assert!(stmt.has_zero_date());
        assert!(!stmt.applied.date_normalized);
    }

    #[test]
    fn test_cumulative_applies_every_rewrite() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile).with_mode(RewriteMode::Cumulative);

        let stmt = kept(rewriter.rewrite(
            "INSERT INTO \"user\" VALUES (1,'a\\\\b','0000-00-00 00:00:00');",
        ));
        assert_eq!(
            stmt.text,
            "INSERT INTO \"harbor_user\" VALUES (1,'ab','0001-01-01 00:00:00');"
        );
        assert!(stmt.applied.renamed);
        assert!(stmt.applied.escapes_stripped);
        assert!(stmt.applied.date_normalized);
    }

    #[test]
    fn test_first_match_rename_skips_escape_strip() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile);

        let stmt = kept(rewriter.rewrite("INSERT INTO \"user\" VALUES (1,'a\\'b');"));
        assert_eq!(stmt.text, "INSERT INTO \"harbor_user\" VALUES (1,'a\\'b');");
        assert!(stmt.has_escapes());
    }

    #[test]
    fn test_passthrough() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile);

        let stmt = kept(rewriter.rewrite("INSERT INTO \"project\" VALUES (1,1,'library',0);"));
        assert_eq!(stmt.text, "INSERT INTO \"project\" VALUES (1,1,'library',0);");
        assert_eq!(stmt.applied, Applied::default());
    }

    #[test]
    fn test_unknown_target_still_gets_generic_fixes() {
        let profile = Database::Registry.profile();
        let rewriter = StatementRewriter::new(&profile);

        let stmt = kept(rewriter.rewrite("INSERT INTO (1,'0000-00-00 00:00:00');"));
        assert_eq!(stmt.table, None);
        assert_eq!(stmt.text, "INSERT INTO (1,'0001-01-01 00:00:00');");
    }
}
