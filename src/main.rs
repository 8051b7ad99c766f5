//! formten CLI - extract financial statement facts from SEC XBRL filings

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use formten::schema::FinancialRow;
use formten::{FilingExtractor, FilingParser};

/// Extract current-period financial statement facts from XBRL filings
#[derive(ClapParser)]
#[command(name = "formten")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the current-period statement fact sets from a filing
    Extract {
        /// Input file
        input: PathBuf,

        /// Output the full extraction as JSON
        #[arg(short, long)]
        json: bool,

        /// Output the flat per-CIK row (recognized concepts only) as JSON
        #[arg(short, long)]
        row: bool,

        /// Show statistics
        #[arg(short, long)]
        stats: bool,
    },

    /// List the reporting contexts found in a filing
    Contexts {
        /// Input file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            input,
            json,
            row,
            stats,
        } => {
            let start = Instant::now();
            let extractor = FilingExtractor::new();
            let extraction = extractor
                .extract_file(&input)
                .with_context(|| format!("Failed to extract {}", input.display()))?;
            let elapsed = start.elapsed();

            if json {
                println!("{}", serde_json::to_string_pretty(&extraction)?);
                return Ok(());
            }

            if row {
                let row = FinancialRow::from_selection(extraction.profile.cik, &extraction.selection);
                println!("{}", serde_json::to_string_pretty(&row)?);
                return Ok(());
            }

            println!("{} {}", "✓".green().bold(), input.display());
            println!(
                "  Filer: CIK {} ({} ending {})",
                extraction.profile.cik,
                extraction.profile.kind.code(),
                extraction.profile.period_end
            );

            match &extraction.selection.date_range {
                Some(statement) => println!(
                    "  Statement of operations: context {} ({} facts)",
                    statement.context_id,
                    statement.facts.len()
                ),
                None => println!("  Statement of operations: {}", "not found".yellow()),
            }
            match &extraction.selection.instant {
                Some(statement) => println!(
                    "  Balance sheet: context {} ({} facts)",
                    statement.context_id,
                    statement.facts.len()
                ),
                None => println!("  Balance sheet: {}", "not found".yellow()),
            }

            for conflict in &extraction.selection.conflicts {
                println!(
                    "  {} {:?} context {} also qualified; kept {}",
                    "CONFLICT:".yellow().bold(),
                    conflict.kind,
                    conflict.ignored,
                    conflict.kept
                );
            }

            if stats {
                println!("  Time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
            }

            if extraction.selection.is_empty() {
                println!(
                    "{} {} - no qualifying statement contexts",
                    "✗".red().bold(),
                    input.display()
                );
                std::process::exit(1);
            }
        }

        Commands::Contexts { input } => {
            let parser = FilingParser::new();
            let filing = parser
                .parse_file(&input)
                .with_context(|| format!("Failed to parse {}", input.display()))?;

            println!("{} contexts in {}", filing.contexts.len(), input.display());
            for context in &filing.contexts {
                let facts = filing
                    .facts_by_context
                    .get(&context.id)
                    .map(|f| f.len())
                    .unwrap_or(0);
                println!(
                    "  {} entity {} {} ({} facts)",
                    context.id, context.entity, context.period, facts
                );
            }
        }
    }

    Ok(())
}
