// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations for the codefind binary

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use codefind::config::Config;
use codefind::errors::IndexNotFoundError;
use codefind::indexer::{IndexOptions, Indexer};
use codefind::output::{numbered_code, result_header, use_colors};
use codefind::query::{SearchEngine, SearchOptions};
use codefind::utils::find_index_root;

use crate::cli::OutputFormat;

/// Resolve the starting directory, defaulting to the current one.
fn start_dir(path: Option<&str>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(PathBuf::from(p)),
        None => std::env::current_dir().context("Failed to read current directory"),
    }
}

/// Nearest directory at or above `start` holding an index, plus its config.
fn locate_root(start: &Path) -> (PathBuf, Config) {
    let persist_dir = Config::load_for_dir(start).index_config().persist_directory;
    match find_index_root(start, &persist_dir) {
        Some(found) => {
            if found.is_parent {
                tracing::debug!("using index at {}", found.index_path.display());
            }
            let config = Config::load_for_dir(&found.root);
            (found.root, config)
        }
        None => (start.to_path_buf(), Config::load_for_dir(start)),
    }
}

pub fn index(path: Option<&str>, clear: bool, force: bool, quiet: bool) -> Result<()> {
    let root = start_dir(path)?;
    let config = Config::load_for_dir(&root);
    let mut indexer = Indexer::new(&root, config)?;

    if clear {
        indexer.clear_index()?;
    }

    let stats = indexer.index_directory(IndexOptions {
        force,
        verbose: !quiet,
    })?;

    if !quiet {
        let use_color = use_colors();
        let headline = format!(
            "Indexed {} files ({} chunks) in {}",
            stats.indexed_files,
            stats.total_chunks,
            root.display()
        );
        if use_color {
            println!("{}", headline.green());
        } else {
            println!("{}", headline);
        }
        println!(
            "  unchanged: {}, skipped: {}, removed: {}",
            stats.unchanged_files,
            stats.skipped_files,
            stats.removed_files.len()
        );
        if !stats.errors.is_empty() {
            eprintln!("  {} files failed:", stats.errors.len());
            for err in &stats.errors {
                eprintln!("    {}", err);
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn search(
    query: &str,
    path: Option<&str>,
    top_k: Option<usize>,
    file: Option<&str>,
    language: Option<&str>,
    semantic: bool,
    alpha: Option<f32>,
    rerank: bool,
    min_score: Option<f32>,
    format: OutputFormat,
) -> Result<()> {
    let (root, config) = locate_root(&start_dir(path)?);

    let mut options = SearchOptions::from_config(&config);
    if let Some(k) = top_k {
        options.top_k = k;
    }
    if let Some(a) = alpha {
        options.alpha = a;
    }
    if let Some(s) = min_score {
        options.min_score = s;
    }
    options.file_filter = file.map(str::to_string);
    options.language_filter = language.map(str::to_string);
    options.rerank = rerank;

    let mut engine = SearchEngine::with_config(&root, config)?;
    let response = if semantic {
        engine.search(
            query,
            options.top_k,
            options.min_score,
            options.file_filter.as_deref(),
            options.language_filter.as_deref(),
        )?
    } else {
        engine.hybrid_search(query, &options)?
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Context => {
            println!("{}", response.format_for_llm(options.top_k));
        }
        OutputFormat::Text => {
            if !response.has_results() {
                println!("No results for '{}'", query);
                return Ok(());
            }
            let use_color = use_colors();
            for (i, result) in response.results.iter().enumerate() {
                println!("{}. {}", i + 1, result_header(result, use_color));
                println!("{}\n", numbered_code(result, use_color));
            }
        }
    }

    Ok(())
}

pub fn context(file: &str, path: Option<&str>) -> Result<()> {
    let (root, config) = locate_root(&start_dir(path)?);
    let engine = SearchEngine::with_config(&root, config)?;
    let chunks = engine.get_file_context(file)?;

    if chunks.is_empty() {
        println!("No indexed chunks for '{}'", file);
        return Ok(());
    }

    let use_color = use_colors();
    for chunk in &chunks {
        println!("{}", result_header(chunk, use_color));
        println!("{}\n", numbered_code(chunk, use_color));
    }
    Ok(())
}

pub fn stats(path: Option<&str>) -> Result<()> {
    let (root, config) = locate_root(&start_dir(path)?);
    let indexer = Indexer::new(&root, config)?;

    let stats = match indexer.get_stats() {
        Ok(stats) => stats,
        Err(err) if err.downcast_ref::<IndexNotFoundError>().is_some() => {
            println!("No index found under {}", root.display());
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    let dimension = stats
        .dimension
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("Collection:   {}", stats.collection_name);
    println!("Location:     {}", root.join(&stats.persist_directory).display());
    println!("Model:        {} (dimension {})", stats.embedding_model, dimension);
    println!("Chunking:     {} lines, {} overlap", stats.chunk_size, stats.chunk_overlap);
    println!("Files:        {}", stats.total_files);
    println!("Chunks:       {}", stats.total_chunks);
    Ok(())
}

pub fn clear(path: Option<&str>) -> Result<()> {
    let (root, config) = locate_root(&start_dir(path)?);
    let collection = config.index_config().collection_name;
    Indexer::new(&root, config)?.clear_index()?;
    println!("Cleared collection '{}' in {}", collection, root.display());
    Ok(())
}
