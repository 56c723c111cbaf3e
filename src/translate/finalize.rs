//! Writes the translated PostgreSQL script.
//!
//! Layout: database directive, retained inserts in their original order,
//! boolean column conversions, deferred foreign keys, then sequences. The
//! DDL comes after the data because boolean conversion and `setval` read the
//! loaded rows, and deferred foreign keys are only checked at commit.

use super::rewrite::InsertStatement;
use crate::profile::{BooleanColumnSpec, ForeignKeySpec, Profile, SequenceSpec};
use std::io::{self, Write};

/// What a finished script contains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeSummary {
    pub inserts: usize,
    pub boolean_columns: usize,
    pub foreign_keys: usize,
    pub sequences: usize,
}

/// Emits the complete script for one profile.
pub struct SchemaFinalizer<'a> {
    profile: &'a Profile,
}

impl<'a> SchemaFinalizer<'a> {
    pub fn new(profile: &'a Profile) -> Self {
        Self { profile }
    }

    pub fn write<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        inserts: &[InsertStatement],
    ) -> io::Result<FinalizeSummary> {
        write_database(writer, &self.profile.database)?;
        write_inserts(writer, inserts)?;

        for spec in &self.profile.boolean_columns {
            write_boolean_column(writer, spec)?;
        }

        if !self.profile.foreign_keys.is_empty() {
            write_foreign_keys(writer, &self.profile.foreign_keys)?;
        }

        for spec in &self.profile.sequences {
            write_sequence(writer, spec)?;
        }

        writer.flush()?;

        Ok(FinalizeSummary {
            inserts: inserts.len(),
            boolean_columns: self.profile.boolean_columns.len(),
            foreign_keys: self.profile.foreign_keys.len(),
            sequences: self.profile.sequences.len(),
        })
    }
}

/// `psql` meta-command selecting the target database
pub fn write_database<W: Write + ?Sized>(writer: &mut W, database: &str) -> io::Result<()> {
    writeln!(writer, "\\c {};", database)
}

pub fn write_inserts<W: Write + ?Sized>(
    writer: &mut W,
    inserts: &[InsertStatement],
) -> io::Result<()> {
    for stmt in inserts {
        writer.write_all(stmt.text.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Convert a 0/1 integer column to `bool` and reset its default.
pub fn write_boolean_column<W: Write + ?Sized>(
    writer: &mut W,
    spec: &BooleanColumnSpec,
) -> io::Result<()> {
    let BooleanColumnSpec {
        table,
        column,
        default,
    } = spec;
    writeln!(writer)?;
    writeln!(writer, "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;", table, column)?;
    writeln!(
        writer,
        "ALTER TABLE {} ALTER {} TYPE bool USING CASE WHEN {}=0 THEN FALSE ELSE TRUE END;",
        table, column, column
    )?;
    writeln!(
        writer,
        "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
        table, column, default
    )
}

pub fn write_foreign_keys<W: Write + ?Sized>(
    writer: &mut W,
    foreign_keys: &[ForeignKeySpec],
) -> io::Result<()> {
    writeln!(writer)?;
    for fk in foreign_keys {
        writeln!(
            writer,
            "ALTER TABLE \"{}\" ADD CONSTRAINT \"{}\" FOREIGN KEY (\"{}\") REFERENCES \"{}\" (\"{}\") DEFERRABLE INITIALLY DEFERRED;",
            fk.table, fk.name, fk.column, fk.references_table, fk.references_column
        )?;
    }
    Ok(())
}

/// Create a sequence, move it to the current maximum and make it the
/// column default.
pub fn write_sequence<W: Write + ?Sized>(writer: &mut W, spec: &SequenceSpec) -> io::Result<()> {
    let seq = spec.sequence_name();
    writeln!(writer)?;
    writeln!(writer, "CREATE SEQUENCE {};", seq)?;
    writeln!(
        writer,
        "SELECT setval('{}', max({})) FROM {};",
        seq, spec.column, spec.table
    )?;
    writeln!(
        writer,
        "ALTER TABLE \"{}\" ALTER COLUMN \"{}\" SET DEFAULT nextval('{}');",
        spec.table, spec.column, seq
    )
}
