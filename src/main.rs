//! Dungeon DSL checker
//!
//! Runs name binding and semantic analysis over a serialized AST.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dungeon_dsl::feedback::AnalysisFeedback;
use dungeon_dsl::frontend::ast::Program;
use dungeon_dsl::{analyze, Environment};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// Dungeon DSL checker
#[derive(Parser, Debug)]
#[command(name = "dslc")]
#[command(version)]
#[command(about = "Semantic checker for the dungeon DSL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a serialized AST for errors
    Check {
        /// AST file (.json)
        input: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Check { input, json } => match check_file(input, *json) {
            Ok(true) => {}
            Ok(false) => process::exit(1),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                process::exit(1);
            }
        },
        Commands::Version => {
            println!("dslc {}", env!("CARGO_PKG_VERSION"));
            println!("Dungeon DSL checker");
        }
    }
}

fn load_program(input: &Path) -> Result<Program> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("failed to parse AST in {}", input.display()))
}

/// Returns whether the program is free of diagnostics
fn check_file(input: &Path, json: bool) -> Result<bool> {
    let program = load_program(input)?;
    let file_name = input.display().to_string();
    info!("checking {} ({} items)", file_name, program.items.len());

    let feedback = match analyze(&program, Environment::game()) {
        Ok(analysis) => AnalysisFeedback::from_analysis(&file_name, &analysis),
        Err(fatal) => AnalysisFeedback::aborted(&file_name, &fatal),
    };

    if json {
        println!("{}", feedback.to_json());
        return Ok(feedback.success);
    }

    for report in &feedback.diagnostics {
        match &report.location {
            Some(loc) => eprintln!("{}:{}:{}: {} [{}]", loc.file, loc.line, loc.column, report.message, report.code),
            None => eprintln!("{}: {} [{}]", file_name, report.message, report.code),
        }
        for related in &report.related {
            if let Some(loc) = &related.location {
                eprintln!("  note: {} at {}:{}", related.message, loc.line, loc.column);
            }
        }
    }

    if feedback.success {
        println!("No errors found");
    } else {
        eprintln!("{} error(s) found", feedback.diagnostics.len());
    }
    Ok(feedback.success)
}
