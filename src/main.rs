// SPDX-License-Identifier: MIT OR Apache-2.0

//! codefind - Local codebase retrieval
//!
//! Thin command-line front end over the codefind library: indexing, hybrid
//! search, per-file context and collection maintenance.

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // CODEFIND_LOG=debug codefind search "query"
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("CODEFIND_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            path,
            clear,
            force,
            quiet,
        } => {
            commands::index(path.as_deref(), clear, force, quiet)?;
        }
        Commands::Search {
            query,
            path,
            top_k,
            file,
            language,
            semantic,
            alpha,
            rerank,
            min_score,
            format,
        } => {
            commands::search(
                &query,
                path.as_deref(),
                top_k,
                file.as_deref(),
                language.as_deref(),
                semantic,
                alpha,
                rerank,
                min_score,
                format,
            )?;
        }
        Commands::Context { file, path } => {
            commands::context(&file, path.as_deref())?;
        }
        Commands::Stats { path } => {
            commands::stats(path.as_deref())?;
        }
        Commands::Clear { path } => {
            commands::clear(path.as_deref())?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "codefind", &mut std::io::stdout());
        }
    }

    Ok(())
}
