mod glob_util;
mod rules;
mod translate;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use pgsql_migrator::profile::Database;
use pgsql_migrator::translate::RewriteMode;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pgsql-migrator")]
#[command(version)]
#[command(
    about = "Rewrite MySQL dumps of registry and notary databases into PostgreSQL scripts",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a MySQL dump into a PostgreSQL script
    Translate {
        /// MySQL dump file or glob pattern (e.g., dumps/*.sql)
        /// Supports .gz, .bz2, .xz, .zst compression
        source: PathBuf,

        /// Destination script, "-" for stdout, or a directory for glob patterns
        destination: PathBuf,

        /// Database the dump belongs to (inferred from the file name if not specified)
        #[arg(short, long, value_enum)]
        database: Option<Database>,

        /// YAML rules file replacing the built-in profile
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// How escape stripping and zero-date normalization combine
        #[arg(long, value_enum, default_value_t = RewriteMode::FirstMatch)]
        rewrite_mode: RewriteMode,

        /// Fail if any warning is generated
        #[arg(long)]
        strict: bool,

        /// Show progress during translation
        #[arg(short, long)]
        progress: bool,

        /// Preview without writing files (dry run)
        #[arg(long)]
        dry_run: bool,

        /// Print statistics as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Stop on first file that fails (for glob patterns)
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print the built-in rules for a database as YAML
    Rules {
        /// Database to print rules for
        #[arg(value_enum)]
        database: Database,

        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Translate {
            source,
            destination,
            database,
            rules,
            rewrite_mode,
            strict,
            progress,
            dry_run,
            json,
            fail_fast,
        } => translate::run(translate::TranslateArgs {
            source,
            destination,
            database,
            rules,
            rewrite_mode,
            strict,
            progress,
            dry_run,
            json,
            fail_fast,
        }),
        Commands::Rules { database, json } => rules::run(database, json),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "pgsql-migrator",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}
