//! Translate command CLI handler.

use ahash::AHashMap;
use pgsql_migrator::compression::Compression;
use pgsql_migrator::profile::{Database, Profile};
use pgsql_migrator::translate::{self, RewriteMode, TranslateConfig, TranslateStats};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::glob_util::{expand_file_pattern, MultiFileResult};

pub struct TranslateArgs {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub database: Option<Database>,
    pub rules: Option<PathBuf>,
    pub rewrite_mode: RewriteMode,
    pub strict: bool,
    pub progress: bool,
    pub dry_run: bool,
    pub json: bool,
    pub fail_fast: bool,
}

/// One translated file, as printed with `--json`.
#[derive(Serialize)]
struct Report {
    source: PathBuf,
    destination: Option<PathBuf>,
    database: String,
    rewrite_mode: RewriteMode,
    #[serde(flatten)]
    stats: TranslateStats,
}

pub fn run(args: TranslateArgs) -> anyhow::Result<()> {
    let expanded = expand_file_pattern(&args.source)?;

    if expanded.pattern_was_glob {
        run_multi(expanded.files, &args)
    } else {
        let file = expanded.files.into_iter().next().unwrap_or_default();
        run_single(file, &args)
    }
}

/// Pick the profile for a dump: explicit rules file, explicit database, or
/// the database named in the file name.
fn resolve_profile(
    file: &Path,
    database: Option<Database>,
    rules: Option<&Path>,
) -> anyhow::Result<Profile> {
    if let Some(path) = rules {
        let profile = Profile::load(path)?;
        if let Some(db) = database {
            if profile.database != db.target_name() {
                anyhow::bail!(
                    "Rules file {} targets database {}, but --database is {}",
                    path.display(),
                    profile.database,
                    db
                );
            }
        }
        return Ok(profile);
    }

    let db = database.or_else(|| Database::from_path(file)).ok_or_else(|| {
        anyhow::anyhow!(
            "Unsupported MySQL dump file: {}. The file name must contain registry, notaryserver or notarysigner, or pass --database",
            file.display()
        )
    })?;
    Ok(db.profile())
}

/// Script name for a dump in a multi-file run: the compression suffix goes
/// and `.sql` becomes `.pgsql` (`registry.sql.gz` -> `registry.pgsql`).
fn script_name(file: &Path) -> Option<PathBuf> {
    let name = Compression::output_name(file)?;
    let is_sql = name
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sql"));
    if is_sql {
        Some(name.with_extension("pgsql"))
    } else {
        let mut name = name.into_os_string();
        name.push(".pgsql");
        Some(PathBuf::from(name))
    }
}

fn run_single(file: PathBuf, args: &TranslateArgs) -> anyhow::Result<()> {
    let profile = resolve_profile(&file, args.database, args.rules.as_deref())?;
    let database = profile.database.clone();

    let output = if args.destination.as_os_str() == "-" {
        None
    } else {
        Some(args.destination.clone())
    };

    if args.json && output.is_none() && !args.dry_run {
        anyhow::bail!(
            "--json cannot be used with \"-\" as destination: the script is written to stdout"
        );
    }

    if args.progress && !args.json {
        eprintln!(
            "Translating {} [database: {}, mode: {}]",
            file.display(),
            database,
            args.rewrite_mode
        );
    }

    let config = TranslateConfig {
        input: file.clone(),
        output: output.clone(),
        profile,
        mode: args.rewrite_mode,
        dry_run: args.dry_run,
        progress: args.progress && !args.json,
    };

    let stats = translate::run(config)?;

    if args.json {
        let report = Report {
            source: file,
            destination: output,
            database,
            rewrite_mode: args.rewrite_mode,
            stats: stats.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_stats(&stats, args.dry_run, args.progress);
    }

    let warnings = stats.warnings.len() + stats.warnings_dropped;
    if args.strict && warnings > 0 {
        anyhow::bail!("Strict mode: {} warnings generated", warnings);
    }

    Ok(())
}

fn run_multi(files: Vec<PathBuf>, args: &TranslateArgs) -> anyhow::Result<()> {
    let total = files.len();
    let mut result = MultiFileResult::new();
    result.total_files = total;
    let mut reports = Vec::new();
    let mut claimed: AHashMap<PathBuf, PathBuf> = AHashMap::new();

    let output_dir = &args.destination;
    if output_dir.as_os_str() == "-" {
        anyhow::bail!("Output directory required when using glob patterns");
    }
    if !args.dry_run {
        std::fs::create_dir_all(output_dir)?;
    }

    if !args.json {
        eprintln!("Translating {} files...\n", total);
    }

    for (idx, file) in files.iter().enumerate() {
        if !args.json {
            eprintln!("[{}/{}] Translating: {}", idx + 1, total, file.display());
        }

        let outcome = resolve_profile(file, args.database, args.rules.as_deref()).and_then(|profile| {
            let database = profile.database.clone();
            let output_file = if args.dry_run {
                None
            } else {
                let name = script_name(file)
                    .unwrap_or_else(|| PathBuf::from(format!("output_{}.pgsql", idx)));
                let path = output_dir.join(name);
                if let Some(previous) = claimed.get(&path) {
                    anyhow::bail!(
                        "{} would overwrite the script translated from {}",
                        path.display(),
                        previous.display()
                    );
                }
                claimed.insert(path.clone(), file.clone());
                Some(path)
            };
            let config = TranslateConfig {
                input: file.clone(),
                output: output_file.clone(),
                profile,
                mode: args.rewrite_mode,
                dry_run: args.dry_run,
                progress: false,
            };
            let stats = translate::run(config)?;
            Ok(Report {
                source: file.clone(),
                destination: output_file,
                database,
                rewrite_mode: args.rewrite_mode,
                stats,
            })
        });

        match outcome {
            Ok(report) => {
                let warnings = report.stats.warnings.len() + report.stats.warnings_dropped;
                if !args.json {
                    eprintln!(
                        "  [{}] {} inserts written, {} suppressed{}",
                        report.database,
                        report.stats.inserts_written,
                        report.stats.inserts_suppressed,
                        if warnings == 0 {
                            String::new()
                        } else {
                            format!(" ({} warnings)", warnings)
                        }
                    );
                    for warning in &report.stats.warnings {
                        eprintln!("  ⚠ {}", warning);
                    }
                    if report.stats.warnings_dropped > 0 {
                        eprintln!("  ... and {} more", report.stats.warnings_dropped);
                    }
                    if let Some(out) = &report.destination {
                        eprintln!("  → {}", out.display());
                    }
                    eprintln!();
                }

                reports.push(report);

                if args.strict && warnings > 0 {
                    result.record_failure(
                        file.clone(),
                        format!("{} warnings in strict mode", warnings),
                    );
                    if args.fail_fast {
                        break;
                    }
                } else {
                    result.record_success();
                }
            }
            Err(e) => {
                if !args.json {
                    eprintln!("  Error: {}\n", e);
                }
                result.record_failure(file.clone(), e.to_string());
                if args.fail_fast {
                    break;
                }
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Translation Summary:");
        eprintln!("  Total files: {}", result.total_files);
        eprintln!("  Succeeded: {}", result.succeeded);
        eprintln!("  Failed: {}", result.failed);
    }

    if result.has_failures() {
        if !args.json {
            eprintln!();
            eprintln!("Failed files:");
            for (path, error) in &result.errors {
                eprintln!("  - {}: {}", path.display(), error);
            }
        }
        anyhow::bail!("{} of {} files failed", result.failed, total);
    }

    Ok(())
}

fn print_stats(stats: &TranslateStats, dry_run: bool, progress: bool) {
    if progress || dry_run {
        eprintln!();
        eprintln!("Translation Statistics:");
        eprintln!("  Lines read: {}", stats.lines_read);
        eprintln!("  Noise lines dropped: {}", stats.noise_dropped);
        eprintln!("  Other lines dropped: {}", stats.other_dropped);
        eprintln!("  Inserts written: {}", stats.inserts_written);
        eprintln!("  Inserts suppressed: {}", stats.inserts_suppressed);
        eprintln!("  Inserts renamed: {}", stats.inserts_renamed);
        eprintln!("  Escapes stripped: {}", stats.escapes_stripped);
        eprintln!("  Zero dates normalized: {}", stats.dates_normalized);
        eprintln!(
            "  Boolean columns: {}, foreign keys: {}, sequences: {}",
            stats.boolean_columns, stats.foreign_keys, stats.sequences
        );
    }

    if !stats.warnings.is_empty() {
        eprintln!();
        eprintln!(
            "Warnings ({}):",
            stats.warnings.len() + stats.warnings_dropped
        );
        for warning in &stats.warnings {
            eprintln!("  ⚠ {}", warning);
        }
        if stats.warnings_dropped > 0 {
            eprintln!("  ... and {} more", stats.warnings_dropped);
        }
    }

    if dry_run {
        eprintln!();
        eprintln!("(Dry run - no output written)");
    }
}
