//! Built-in profiles for the registry, notary-server and notary-signer
//! databases.

use super::{BooleanColumnSpec, ForeignKeySpec, Profile, SequenceSpec, TableRule};
use std::collections::BTreeMap;

pub(super) fn registry() -> Profile {
    let mut tables = BTreeMap::new();
    // "user" is a reserved word in PostgreSQL
    tables.insert(
        "user".to_string(),
        TableRule::Rename("harbor_user".to_string()),
    );
    // Environment-specific configuration, never migrated
    tables.insert("properties".to_string(), TableRule::Suppress);

    Profile {
        database: "registry".to_string(),
        tables,
        boolean_columns: vec![
            BooleanColumnSpec::new("harbor_user", "deleted"),
            BooleanColumnSpec::new("harbor_user", "sysadmin_flag"),
            BooleanColumnSpec::new("project", "deleted"),
            BooleanColumnSpec::new("project_metadata", "deleted"),
            BooleanColumnSpec::with_default("replication_policy", "enabled", "TRUE"),
            BooleanColumnSpec::new("replication_policy", "replicate_deletion"),
            BooleanColumnSpec::new("replication_policy", "deleted"),
            BooleanColumnSpec::new("replication_target", "insecure"),
            BooleanColumnSpec::new("replication_immediate_trigger", "on_push"),
            BooleanColumnSpec::new("replication_immediate_trigger", "on_deletion"),
        ],
        foreign_keys: vec![
            ForeignKeySpec {
                table: "project".to_string(),
                name: "project_ibfk_1".to_string(),
                column: "owner_id".to_string(),
                references_table: "harbor_user".to_string(),
                references_column: "user_id".to_string(),
            },
            ForeignKeySpec {
                table: "project_metadata".to_string(),
                name: "project_metadata_ibfk_1".to_string(),
                column: "project_id".to_string(),
                references_table: "project".to_string(),
                references_column: "project_id".to_string(),
            },
        ],
        sequences: vec![
            SequenceSpec::new("harbor_user", "user_id"),
            SequenceSpec::new("project", "project_id"),
            SequenceSpec::new("project_member", "id"),
            SequenceSpec::new("project_metadata", "id"),
            SequenceSpec::new("user_group", "id"),
            SequenceSpec::new("access_log", "log_id"),
            SequenceSpec::new("repository", "repository_id"),
            SequenceSpec::new("replication_policy", "id"),
            SequenceSpec::new("replication_target", "id"),
            SequenceSpec::new("replication_immediate_trigger", "id"),
            SequenceSpec::new("img_scan_job", "id"),
            SequenceSpec::new("img_scan_overview", "id"),
            SequenceSpec::new("clair_vuln_timestamp", "id"),
            SequenceSpec::new("properties", "id"),
            SequenceSpec::new("harbor_label", "id"),
            SequenceSpec::new("harbor_resource_label", "id"),
        ],
    }
}

pub(super) fn notary_server() -> Profile {
    let mut tables = BTreeMap::new();
    for table in ["change_category", "changefeed", "schema_migrations"] {
        tables.insert(table.to_string(), TableRule::Suppress);
    }

    Profile {
        database: "notaryserver".to_string(),
        tables,
        boolean_columns: Vec::new(),
        foreign_keys: Vec::new(),
        sequences: vec![SequenceSpec::new("tuf_files", "id")],
    }
}

pub(super) fn notary_signer() -> Profile {
    let mut tables = BTreeMap::new();
    tables.insert("schema_migrations".to_string(), TableRule::Suppress);

    Profile {
        database: "notarysigner".to_string(),
        tables,
        boolean_columns: Vec::new(),
        foreign_keys: Vec::new(),
        sequences: vec![SequenceSpec::new("private_keys", "id")],
    }
}
