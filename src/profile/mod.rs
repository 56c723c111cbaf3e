//! Per-database translation profiles.
//!
//! A [`Profile`] is the declarative description of how one MySQL database is
//! carried over to PostgreSQL: which tables are renamed or dropped, which
//! integer flag columns become booleans, which foreign keys are restored and
//! which primary keys get a sequence. Built-in profiles exist for each
//! [`Database`]; custom ones can be loaded from YAML.

mod builtin;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The databases a registry deployment keeps in MySQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Database {
    /// Core registry database
    Registry,
    /// Notary server (TUF metadata) database
    NotaryServer,
    /// Notary signer (private keys) database
    NotarySigner,
}

impl Database {
    pub const ALL: [Database; 3] = [
        Database::Registry,
        Database::NotaryServer,
        Database::NotarySigner,
    ];

    /// Name of the PostgreSQL database the translated script connects to.
    pub fn target_name(&self) -> &'static str {
        match self {
            Database::Registry => "registry",
            Database::NotaryServer => "notaryserver",
            Database::NotarySigner => "notarysigner",
        }
    }

    /// Infer the database from a dump file name.
    ///
    /// Matches the target name as a substring of the file name, so
    /// `registry.sql` and `backup-notaryserver-2018.sql.gz` are both recognized.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|db| name.contains(db.target_name()))
    }

    /// The built-in profile for this database.
    pub fn profile(&self) -> Profile {
        match self {
            Database::Registry => builtin::registry(),
            Database::NotaryServer => builtin::notary_server(),
            Database::NotarySigner => builtin::notary_signer(),
        }
    }
}

impl std::fmt::Display for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Database::Registry => write!(f, "registry"),
            Database::NotaryServer => write!(f, "notary-server"),
            Database::NotarySigner => write!(f, "notary-signer"),
        }
    }
}

impl std::str::FromStr for Database {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "registry" => Ok(Database::Registry),
            "notary-server" | "notaryserver" => Ok(Database::NotaryServer),
            "notary-signer" | "notarysigner" => Ok(Database::NotarySigner),
            _ => Err(format!(
                "Unknown database: {}. Valid options: registry, notary-server, notary-signer",
                s
            )),
        }
    }
}

/// What happens to `INSERT` statements targeting a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRule {
    /// Rewrite the table identifier to the given name
    Rename(String),
    /// Drop every row of the table
    Suppress,
    /// Keep rows as they are
    Passthrough,
}

/// An integer flag column converted to `bool` after the data is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanColumnSpec {
    pub table: String,
    pub column: String,
    /// Default literal set after the conversion
    #[serde(default = "default_false")]
    pub default: String,
}

fn default_false() -> String {
    "FALSE".to_string()
}

impl BooleanColumnSpec {
    pub fn new(table: &str, column: &str) -> Self {
        Self::with_default(table, column, "FALSE")
    }

    pub fn with_default(table: &str, column: &str, default: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            default: default.to_string(),
        }
    }
}

/// A foreign key restored after the data is loaded, checked at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    pub table: String,
    pub name: String,
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// An integer primary key that gets a sequence synchronized to its maximum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSpec {
    pub table: String,
    pub column: String,
}

impl SequenceSpec {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Name of the sequence object, `<table>_<column>_seq`.
    pub fn sequence_name(&self) -> String {
        format!("{}_{}_seq", self.table, self.column)
    }
}

/// Complete translation profile for one database.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Target PostgreSQL database name
    pub database: String,
    /// Per-table rules, keyed by source table name
    #[serde(with = "serde_yaml_ng::with::singleton_map_recursive")]
    pub tables: BTreeMap<String, TableRule>,
    pub boolean_columns: Vec<BooleanColumnSpec>,
    pub foreign_keys: Vec<ForeignKeySpec>,
    pub sequences: Vec<SequenceSpec>,
}

static RE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").unwrap());

fn check_identifier(kind: &str, value: &str) -> anyhow::Result<()> {
    if !RE_IDENTIFIER.is_match(value) {
        anyhow::bail!("Invalid {} identifier: {:?}", kind, value);
    }
    Ok(())
}

impl Profile {
    /// Load a profile from a YAML file and validate it.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read rules file {}: {}", path.display(), e))?;
        let profile = Self::from_yaml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid rules file {}: {}", path.display(), e))?;
        Ok(profile)
    }

    /// Parse and validate a profile from YAML text.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let profile: Profile = serde_yaml_ng::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check that every name is a plain identifier and that the table rules
    /// do not contradict each other.
    ///
    /// Names end up interpolated into DDL, so anything that is not a bare
    /// identifier is rejected.
    pub fn validate(&self) -> anyhow::Result<()> {
        check_identifier("database", &self.database)?;

        let mut seen: AHashMap<String, &str> = AHashMap::new();
        for (table, rule) in &self.tables {
            check_identifier("table", table)?;
            if let Some(previous) = seen.insert(table.to_lowercase(), table) {
                anyhow::bail!(
                    "Table {} has more than one rule (also declared as {})",
                    table,
                    previous
                );
            }
            if let TableRule::Rename(to) = rule {
                check_identifier("rename target", to)?;
            }
        }

        for (table, rule) in &self.tables {
            if let TableRule::Rename(to) = rule {
                let target = self.rule_for(to);
                if target == Some(&TableRule::Suppress) {
                    anyhow::bail!(
                        "Table {} is renamed to {}, which is suppressed",
                        table,
                        to
                    );
                }
            }
        }

        for spec in &self.boolean_columns {
            check_identifier("table", &spec.table)?;
            check_identifier("column", &spec.column)?;
            if !matches!(
                spec.default.to_uppercase().as_str(),
                "TRUE" | "FALSE" | "NULL"
            ) {
                anyhow::bail!(
                    "Invalid default {:?} for boolean column {}.{} (expected TRUE, FALSE or NULL)",
                    spec.default,
                    spec.table,
                    spec.column
                );
            }
        }
        for (i, spec) in self.boolean_columns.iter().enumerate() {
            if self.boolean_columns[..i]
                .iter()
                .any(|s| s.table == spec.table && s.column == spec.column)
            {
                anyhow::bail!(
                    "Boolean column {}.{} is declared twice",
                    spec.table,
                    spec.column
                );
            }
        }

        for fk in &self.foreign_keys {
            check_identifier("table", &fk.table)?;
            check_identifier("constraint", &fk.name)?;
            check_identifier("column", &fk.column)?;
            check_identifier("table", &fk.references_table)?;
            check_identifier("column", &fk.references_column)?;
        }

        for (i, seq) in self.sequences.iter().enumerate() {
            check_identifier("table", &seq.table)?;
            check_identifier("column", &seq.column)?;
            if self.sequences[..i]
                .iter()
                .any(|s| s.sequence_name() == seq.sequence_name())
            {
                anyhow::bail!("Sequence {} is declared twice", seq.sequence_name());
            }
        }

        Ok(())
    }

    /// Rule for a source table, matched case-insensitively.
    pub fn rule_for(&self, table: &str) -> Option<&TableRule> {
        self.tables.get(table).or_else(|| {
            let lower = table.to_lowercase();
            self.tables
                .iter()
                .find(|(k, _)| k.to_lowercase() == lower)
                .map(|(_, v)| v)
        })
    }

    /// Build a lookup index for per-statement rule resolution.
    pub fn rule_index(&self) -> RuleIndex<'_> {
        RuleIndex {
            exact: self.tables.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            folded: self
                .tables
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        }
    }
}

/// Table rule lookup used on the hot path.
pub struct RuleIndex<'a> {
    exact: AHashMap<&'a str, &'a TableRule>,
    folded: AHashMap<String, &'a TableRule>,
}

impl<'a> RuleIndex<'a> {
    /// Rule for a table name, matched case-insensitively.
    pub fn get(&self, table: &str) -> Option<&'a TableRule> {
        self.get_exact(table)
            .or_else(|| self.folded.get(&table.to_lowercase()).copied())
    }

    /// Rule for a table name spelled exactly as in the profile.
    pub fn get_exact(&self, table: &str) -> Option<&'a TableRule> {
        self.exact.get(table).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_from_path() {
        assert_eq!(
            Database::from_path(Path::new("/backup/registry.sql")),
            Some(Database::Registry)
        );
        assert_eq!(
            Database::from_path(Path::new("notaryserver.sql.gz")),
            Some(Database::NotaryServer)
        );
        assert_eq!(
            Database::from_path(Path::new("dump-NotarySigner.sql")),
            Some(Database::NotarySigner)
        );
        assert_eq!(Database::from_path(Path::new("clair.sql")), None);
        // Only the file name is considered, not parent directories
        assert_eq!(Database::from_path(Path::new("/registry/clair.sql")), None);
    }

    #[test]
    fn test_database_from_str() {
        assert_eq!("registry".parse::<Database>().unwrap(), Database::Registry);
        assert_eq!(
            "notary-server".parse::<Database>().unwrap(),
            Database::NotaryServer
        );
        assert_eq!(
            "NOTARYSIGNER".parse::<Database>().unwrap(),
            Database::NotarySigner
        );
        assert!("clair".parse::<Database>().is_err());
    }

    #[test]
    fn test_builtin_profiles_are_valid() {
        for db in Database::ALL {
            let profile = db.profile();
            profile.validate().unwrap();
            assert_eq!(profile.database, db.target_name());
        }
    }

    #[test]
    fn test_rule_for_is_case_insensitive() {
        let profile = Database::Registry.profile();
        assert_eq!(
            profile.rule_for("USER"),
            Some(&TableRule::Rename("harbor_user".to_string()))
        );
        assert_eq!(profile.rule_for("Properties"), Some(&TableRule::Suppress));
        assert_eq!(profile.rule_for("project"), None);

        let index = profile.rule_index();
        assert_eq!(index.get("Properties"), Some(&TableRule::Suppress));
        assert_eq!(index.get("project"), None);
        assert_eq!(index.get_exact("properties"), Some(&TableRule::Suppress));
        assert_eq!(index.get_exact("Properties"), None);
    }

    #[test]
    fn test_parse_yaml_profile() {
        let yaml = r#"
database: registry
tables:
  user:
    rename: harbor_user
  properties: suppress
  project: passthrough
boolean_columns:
  - table: project
    column: deleted
  - table: replication_policy
    column: enabled
    default: "TRUE"
foreign_keys:
  - table: project
    name: project_ibfk_1
    column: owner_id
    references_table: harbor_user
    references_column: user_id
sequences:
  - table: project
    column: project_id
"#;
        let profile = Profile::from_yaml(yaml).unwrap();
        assert_eq!(profile.tables.len(), 3);
        assert_eq!(profile.boolean_columns[0].default, "FALSE");
        assert_eq!(profile.boolean_columns[1].default, "TRUE");
        assert_eq!(profile.foreign_keys.len(), 1);
        assert_eq!(profile.sequences[0].sequence_name(), "project_project_id_seq");
    }

    #[test]
    fn test_yaml_roundtrip_of_builtin() {
        let profile = Database::NotaryServer.profile();
        let yaml = profile.to_yaml().unwrap();
        assert_eq!(Profile::from_yaml(&yaml).unwrap(), profile);
    }

    #[test]
    fn test_validate_rejects_bad_identifier() {
        let yaml = "database: \"registry; DROP TABLE x\"\n";
        let err = Profile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Invalid database identifier"));
    }

    #[test]
    fn test_validate_rejects_conflicting_case() {
        let yaml = "database: registry\ntables:\n  user: suppress\n  User: passthrough\n";
        let err = Profile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("more than one rule"));
    }

    #[test]
    fn test_validate_rejects_rename_onto_suppressed() {
        let yaml = "database: registry\ntables:\n  user:\n    rename: properties\n  properties: suppress\n";
        let err = Profile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("which is suppressed"));
    }

    #[test]
    fn test_validate_rejects_bad_boolean_default() {
        let yaml = "database: registry\nboolean_columns:\n  - table: project\n    column: deleted\n    default: \"1\"\n";
        let err = Profile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Invalid default"));
    }

    #[test]
    fn test_validate_rejects_duplicate_sequence() {
        let yaml = "database: registry\nsequences:\n  - table: project\n    column: project_id\n  - table: project\n    column: project_id\n";
        let err = Profile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }
}
