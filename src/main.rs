//! `forklift` command-line interface.
//!
//! ```bash
//! forklift index ./checkout --repo acme/api --branch dev
//! forklift search "parse config file" --repo acme/api -k 5
//! forklift stats
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use forklift_core::bootstrap::{AppServices, local_source, open_index};
use forklift_core::config::{Config, resolve_config_path};
use forklift_index::repository_tag;
use forklift_store::{SearchResults, VectorIndex};

/// Index source repositories into a vector index of code chunks and query it.
#[derive(Parser)]
#[command(name = "forklift", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Falls back to `FORKLIFT_CONFIG`, then `./forklift.toml`. A missing file
    /// means built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed, and store every recognized file of a local checkout.
    ///
    /// Re-indexing the same checkout replaces entries in place.
    Index {
        /// Root directory of the checkout.
        path: PathBuf,

        /// Repository name. Defaults to the directory name.
        #[arg(long)]
        repo: Option<String>,

        /// Branch the checkout is on. Non-default branches get their own tag.
        #[arg(long)]
        branch: Option<String>,
    },

    /// Search indexed chunks by natural-language or code query.
    Search {
        query: String,

        /// Only return chunks of this repository.
        #[arg(long)]
        repo: Option<String>,

        #[arg(long, requires = "repo")]
        branch: Option<String>,

        /// Number of results.
        #[arg(short, long, default_value_t = 5)]
        k: usize,

        /// Print the stored code of each hit.
        #[arg(long)]
        show_code: bool,
    },

    /// Remove every entry of one repository.
    Delete {
        #[arg(long)]
        repo: String,

        #[arg(long)]
        branch: Option<String>,
    },

    /// Print entry count, dimension, and indexed repositories.
    Stats,

    /// Remove all entries from the index.
    Clear {
        /// Confirm the wipe.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.validate()?;
    tracing::debug!(path = %config_path.display(), "config loaded");

    match cli.command {
        Commands::Index { path, repo, branch } => {
            run_index(&config, &path, repo, branch.as_deref()).await
        }
        Commands::Search {
            query,
            repo,
            branch,
            k,
            show_code,
        } => {
            let tag = repo
                .map(|r| repository_tag(&r, branch.as_deref(), &config.ingest.default_branch));
            run_search(&config, &query, tag.as_deref(), k, show_code).await
        }
        Commands::Delete { repo, branch } => {
            let tag = repository_tag(&repo, branch.as_deref(), &config.ingest.default_branch);
            with_index(&config, |index| async move {
                let removed = index.delete_by_repository(tag.clone()).await?;
                println!("removed {removed} entries for {tag}");
                Ok(())
            })
            .await
        }
        Commands::Stats => {
            let backend = config.store.backend;
            with_index(&config, |index| async move {
                let stats = index.stats().await?;
                println!("backend:      {backend}");
                println!("entries:      {}", stats.total_entries);
                println!("dimension:    {}", stats.dimension);
                println!("repositories: {}", stats.repositories.len());
                for repo in &stats.repositories {
                    println!("  {repo}");
                }
                Ok(())
            })
            .await
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to clear the index without --yes");
            }
            with_index(&config, |index| async move {
                index.clear().await?;
                println!("index cleared");
                Ok(())
            })
            .await
        }
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_index(
    config: &Config,
    path: &Path,
    repo: Option<String>,
    branch: Option<&str>,
) -> anyhow::Result<()> {
    let root = std::fs::canonicalize(path)
        .with_context(|| format!("cannot resolve checkout path {}", path.display()))?;
    let repo = match repo {
        Some(r) => r,
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("cannot derive a repository name from the path; pass --repo")?,
    };
    let tag = repository_tag(&repo, branch, &config.ingest.default_branch);

    let indexer = AppServices::from_config(config).await?.indexer();
    let result = indexer
        .index_repository(&tag, &local_source(config, &root))
        .await;
    indexer.index().close().await?;
    let report = result.with_context(|| format!("indexing {tag} failed"))?;

    for skipped in &report.skipped {
        tracing::warn!(file = %skipped.path, reason = %skipped.reason, "skipped");
    }
    println!(
        "{}: {} files, {} chunks, {} entries stored, {} skipped ({} ms)",
        report.repository,
        report.files_fetched,
        report.chunks_created,
        report.entries_stored,
        report.skipped.len(),
        report.duration_ms
    );
    Ok(())
}

async fn run_search(
    config: &Config,
    query: &str,
    repository: Option<&str>,
    k: usize,
    show_code: bool,
) -> anyhow::Result<()> {
    let indexer = AppServices::from_config(config).await?.indexer();
    let result = indexer.search(query, k, repository).await;
    indexer.index().close().await?;
    print_results(&result?, show_code);
    Ok(())
}

fn print_results(results: &SearchResults, show_code: bool) {
    if results.is_empty() {
        println!("no results");
        return;
    }
    for (rank, (_, score, document, payload)) in results.hits().enumerate() {
        println!(
            "{:>2}. {score:.3}  {}:{}:{}-{}  {} {}",
            rank + 1,
            payload.repository,
            payload.file_path,
            payload.line_start,
            payload.line_end,
            payload.kind,
            payload.name
        );
        if show_code {
            let code = document.split_once("\nCode:\n").map_or(document, |(_, c)| c);
            for line in code.lines() {
                println!("      {line}");
            }
        }
    }
}

async fn with_index<F, Fut>(config: &Config, f: F) -> anyhow::Result<()>
where
    F: FnOnce(Arc<dyn VectorIndex>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let index = open_index(config).await?;
    let result = f(Arc::clone(&index)).await;
    index.close().await?;
    result
}
