//! MySQL dump to PostgreSQL script translation.
//!
//! A run streams the dump once, line by line:
//! - noise (comments, `LOCK`/`UNLOCK TABLES`, `DROP TABLE`) and schema lines
//!   are dropped,
//! - `INSERT` statements go through the profile's table rules and the generic
//!   data fixes (backslash stripping, zero-date normalization) and are
//!   buffered in order,
//! - at the end the script is written: database directive, inserts, boolean
//!   conversions, deferred foreign keys, sequences.

mod classify;
mod finalize;
mod rewrite;
mod warnings;

pub use classify::{classify, DumpLine, LineKind};
pub use finalize::{
    write_boolean_column, write_database, write_foreign_keys, write_inserts, write_sequence,
    FinalizeSummary, SchemaFinalizer,
};
pub use rewrite::{
    insert_target, Applied, InsertStatement, InsertTarget, Rewrite, RewriteMode,
    StatementRewriter, MIN_DATE, ZERO_DATE,
};
pub use warnings::{TranslateWarning, WarningCollector};

use crate::compression::Compression;
use crate::profile::Profile;
use crate::progress::{byte_progress_bar, ProgressReader};
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const READ_BUFFER_SIZE: usize = 64 * 1024;
const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Configuration for one translation run
#[derive(Debug)]
pub struct TranslateConfig {
    /// MySQL dump to read
    pub input: PathBuf,
    /// Destination script (None for stdout)
    pub output: Option<PathBuf>,
    /// Rules for the database being translated
    pub profile: Profile,
    /// How the generic rewrites combine
    pub mode: RewriteMode,
    /// Dry run mode
    pub dry_run: bool,
    /// Show progress
    pub progress: bool,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: None,
            profile: Profile::default(),
            mode: RewriteMode::default(),
            dry_run: false,
            progress: false,
        }
    }
}

/// Statistics from a translation run
#[derive(Debug, Default, Clone, Serialize)]
pub struct TranslateStats {
    /// Lines read from the dump
    pub lines_read: u64,
    /// Comments, blank lines, table locks and drops
    pub noise_dropped: u64,
    /// Schema and other non-data lines
    pub other_dropped: u64,
    /// INSERT statements seen
    pub inserts_seen: u64,
    /// INSERT statements written to the script
    pub inserts_written: u64,
    /// INSERT statements dropped by a suppress rule
    pub inserts_suppressed: u64,
    pub inserts_renamed: u64,
    pub escapes_stripped: u64,
    pub dates_normalized: u64,
    pub boolean_columns: usize,
    pub foreign_keys: usize,
    pub sequences: usize,
    /// Warnings generated
    pub warnings: Vec<TranslateWarning>,
    /// Warnings past the collector limit, counted but not listed
    pub warnings_dropped: usize,
}

/// Stateful translator for one dump.
///
/// Owns the ordered insert buffer for the run; feed it lines with
/// [`Translator::process_line`] and write the script with
/// [`Translator::finish`].
pub struct Translator<'a> {
    profile: &'a Profile,
    rewriter: StatementRewriter<'a>,
    inserts: Vec<InsertStatement>,
    stats: TranslateStats,
    warnings: WarningCollector,
}

impl<'a> Translator<'a> {
    pub fn new(profile: &'a Profile) -> Self {
        Self {
            profile,
            rewriter: StatementRewriter::new(profile),
            inserts: Vec::new(),
            stats: TranslateStats::default(),
            warnings: WarningCollector::new(),
        }
    }

    pub fn with_mode(mut self, mode: RewriteMode) -> Self {
        self.rewriter = self.rewriter.with_mode(mode);
        self
    }

    /// Classify and, for inserts, rewrite one dump line.
    pub fn process_line(&mut self, line: &str) {
        self.stats.lines_read += 1;
        let line_no = self.stats.lines_read;
        let line = DumpLine::new(line);

        match line.kind() {
            LineKind::Noise => self.stats.noise_dropped += 1,
            LineKind::Other => self.stats.other_dropped += 1,
            LineKind::Insert => {
                self.stats.inserts_seen += 1;
                self.process_insert(line_no, line.trimmed());
            }
        }
    }

    fn process_insert(&mut self, line_no: u64, stmt: &str) {
        match self.rewriter.rewrite(stmt) {
            Rewrite::Suppressed { .. } => self.stats.inserts_suppressed += 1,
            Rewrite::Kept(insert) => {
                if insert.table.is_none() {
                    self.warnings.add(TranslateWarning::UnknownTarget {
                        line: line_no,
                        statement_preview: warnings::preview(stmt),
                    });
                }
                if insert.applied.renamed {
                    self.stats.inserts_renamed += 1;
                }
                if insert.applied.escapes_stripped {
                    self.stats.escapes_stripped += 1;
                }
                if insert.applied.date_normalized {
                    self.stats.dates_normalized += 1;
                }
                if insert.has_zero_date() {
                    self.warnings.add(TranslateWarning::ZeroDateKept {
                        table: insert.table.clone(),
                        line: line_no,
                    });
                }
                if insert.has_escapes() {
                    self.warnings.add(TranslateWarning::EscapesKept {
                        table: insert.table.clone(),
                        line: line_no,
                    });
                }
                self.inserts.push(insert);
            }
        }
    }

    /// Retained inserts so far, in input order.
    pub fn inserts(&self) -> &[InsertStatement] {
        &self.inserts
    }

    pub fn stats(&self) -> &TranslateStats {
        &self.stats
    }

    /// Write the complete script and return the run statistics.
    pub fn finish<W: Write + ?Sized>(self, writer: &mut W) -> std::io::Result<TranslateStats> {
        let summary = SchemaFinalizer::new(self.profile).write(writer, &self.inserts)?;

        let mut stats = self.stats;
        stats.inserts_written = summary.inserts as u64;
        stats.boolean_columns = summary.boolean_columns;
        stats.foreign_keys = summary.foreign_keys;
        stats.sequences = summary.sequences;
        stats.warnings_dropped = self.warnings.dropped();
        stats.warnings = self.warnings.into_warnings();
        Ok(stats)
    }
}

/// Translate a dump held in memory.
pub fn translate_str(
    input: &str,
    profile: &Profile,
    mode: RewriteMode,
) -> std::io::Result<(String, TranslateStats)> {
    let mut translator = Translator::new(profile).with_mode(mode);
    for line in input.lines() {
        translator.process_line(line);
    }
    let mut out = Vec::new();
    let stats = translator.finish(&mut out)?;
    Ok((String::from_utf8_lossy(&out).into_owned(), stats))
}

/// Run the translate command
pub fn run(config: TranslateConfig) -> anyhow::Result<TranslateStats> {
    config.profile.validate()?;

    if let Some(output) = &config.output {
        if is_same_file(&config.input, output) {
            anyhow::bail!(
                "Refusing to overwrite input file {} with its translation",
                config.input.display()
            );
        }
    }

    let file = File::open(&config.input)
        .with_context(|| format!("Failed to open input file {}", config.input.display()))?;
    let file_size = file.metadata()?.len();
    let compression = Compression::from_path(&config.input);

    let progress_bar = if config.progress {
        Some(byte_progress_bar(file_size)?)
    } else {
        None
    };

    let raw: Box<dyn Read> = match &progress_bar {
        Some(pb) => {
            let pb = pb.clone();
            Box::new(ProgressReader::new(file, move |bytes| pb.set_position(bytes)))
        }
        None => Box::new(file),
    };
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, compression.wrap_reader(raw)?);

    let mut translator = Translator::new(&config.profile).with_mode(config.mode);

    let mut buf = Vec::new();
    let mut line_no: u64 = 0;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("Failed to read {}", config.input.display()))?;
        if n == 0 {
            break;
        }
        line_no += 1;
        let line = std::str::from_utf8(&buf).with_context(|| {
            format!(
                "Line {} of {} is not valid UTF-8",
                line_no,
                config.input.display()
            )
        })?;
        translator.process_line(line);
    }

    if let Some(pb) = &progress_bar {
        pb.set_message("writing script...");
    }

    let stats = if config.dry_run {
        translator.finish(&mut std::io::sink())?
    } else {
        match &config.output {
            Some(path) => write_atomically(path, |w| Ok(translator.finish(w)?))?,
            None => {
                let stdout = std::io::stdout();
                let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, stdout.lock());
                translator.finish(&mut writer)?
            }
        }
    };

    if let Some(pb) = progress_bar {
        pb.finish_with_message(format!("{} inserts written", stats.inserts_written));
    }

    Ok(stats)
}

/// True when `output` names the same file as `input` (through links or
/// relative paths). A destination that does not exist yet never matches.
fn is_same_file(input: &Path, output: &Path) -> bool {
    match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Mode requested for a newly created script, filtered by the process umask
/// like any other created file.
#[cfg(unix)]
fn new_script_permissions() -> Option<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(std::fs::Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn new_script_permissions() -> Option<std::fs::Permissions> {
    None
}

/// Write through a temporary file next to `path` and move it into place only
/// if `f` succeeds.
fn write_atomically<T, F>(path: &Path, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&mut dyn Write) -> anyhow::Result<T>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let existing = std::fs::metadata(path).ok().map(|m| m.permissions());
    let mut builder = tempfile::Builder::new();
    builder.prefix(".pgsql-migrator");
    if existing.is_none() {
        if let Some(permissions) = new_script_permissions() {
            builder.permissions(permissions);
        }
    }
    let tmp = builder
        .tempfile_in(&parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, tmp);
    let value = f(&mut writer)?;
    let tmp = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush {}: {}", path.display(), e.error()))?;
    // An overwritten script keeps its mode
    if let Some(permissions) = existing {
        tmp.as_file()
            .set_permissions(permissions)
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(value)
}
