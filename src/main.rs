//! codesearch: regex search over a trigram-indexed source corpus.
//!
//! Usage:
//!   codesearch index <root> --index <db>                          # Build or refresh the index
//!   codesearch serve --index <db> --content-root <root>           # Serve POST /codesearch
//!   codesearch serve --index <db> --content-url <url>             # Fetch content remotely
//!   codesearch search <expr> --index <db> --content-root <root>   # One-off CLI search

use clap::{Args, Parser, Subcommand};
use codesearch::fmt;
use codesearch::services::{
    CodeSearchService, ContentService, CorpusIndex, DecorationsClient, FsContentService,
    IndexConfig, IndexStats, Indexer, LocalSearchService, SearchConfig, MAX_SNIPPETS_PER_FILE,
};
use codesearch::types::CodeSearchRequest;
use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codesearch")]
#[command(about = "Regex code search over a trigram-indexed corpus")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP search endpoint
    Serve {
        /// Index database built by `codesearch index`
        #[arg(long)]
        index: PathBuf,

        /// Address to listen on
        #[arg(long, env = "CODESEARCH_LISTEN", default_value = "127.0.0.1:8080")]
        listen: SocketAddr,

        #[command(flatten)]
        content: ContentArgs,

        /// Snippets kept per file
        #[arg(long, default_value_t = MAX_SNIPPETS_PER_FILE)]
        snippets: usize,

        /// Per-request deadline in seconds (0 = none)
        #[arg(long, default_value = "0")]
        timeout_secs: u64,
    },

    /// Run one search and print the matches
    Search {
        /// Regular expression
        expr: String,

        /// Index database built by `codesearch index`
        #[arg(long)]
        index: PathBuf,

        #[command(flatten)]
        content: ContentArgs,

        /// Match case-insensitively
        #[arg(short = 'i', long)]
        ignore_case: bool,

        /// Print the JSON reply instead of formatted lines
        #[arg(long)]
        json: bool,
    },

    /// Index a corpus directory
    Index {
        /// Corpus root
        root: PathBuf,

        /// Index database to create or update
        #[arg(long)]
        index: PathBuf,

        /// Force full re-index
        #[arg(short, long)]
        force: bool,

        /// Maximum file size to index (bytes)
        #[arg(long)]
        max_file_size: Option<u64>,
    },

    /// Show index statistics
    Stats {
        /// Index database
        #[arg(long)]
        index: PathBuf,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ContentArgs {
    /// Read file content from this corpus directory
    #[arg(long)]
    content_root: Option<PathBuf>,

    /// Fetch file content from a decorations service at this base URL
    #[arg(long)]
    content_url: Option<String>,
}

impl ContentArgs {
    fn build(&self, timeout: Option<Duration>) -> anyhow::Result<Arc<dyn ContentService>> {
        match (&self.content_root, &self.content_url) {
            (Some(root), _) => Ok(Arc::new(FsContentService::new(canonical(root)))),
            (None, Some(url)) => Ok(Arc::new(DecorationsClient::new(url, timeout)?)),
            (None, None) => anyhow::bail!("one of --content-root or --content-url is required"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries results; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("codesearch=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            index,
            listen,
            content,
            snippets,
            timeout_secs,
        } => {
            let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
            let service = LocalSearchService::with_config(
                Arc::new(open_index(index).await?),
                content.build(timeout)?,
                SearchConfig {
                    max_snippets_per_file: snippets,
                    request_timeout: timeout,
                },
            );
            codesearch::server::serve(listen, Arc::new(service)).await?;
        }

        Commands::Search {
            expr,
            index,
            content,
            ignore_case,
            json,
        } => {
            let service =
                LocalSearchService::new(Arc::new(open_index(index).await?), content.build(None)?);
            let reply = service
                .search(CodeSearchRequest::new(expr, !ignore_case))
                .await?;

            let mut out = std::io::stdout().lock();
            if json {
                serde_json::to_writer_pretty(&mut out, &reply)?;
                writeln!(out)?;
            } else {
                let color = std::io::stdout().is_terminal();
                fmt::fmt_search(&mut out, &reply, color)?;
            }
        }

        Commands::Index {
            root,
            index,
            force,
            max_file_size,
        } => {
            let root = canonical(&root);
            let mut config = IndexConfig::default();
            if let Some(max) = max_file_size {
                config.max_file_size = max;
            }

            let progress = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let db = Arc::new(codesearch::db::Database::open(&index)?);
                let indexer = Indexer::with_config(db, root, config);
                Ok(indexer.index(force)?)
            })
            .await??;
            fmt::fmt_index(&mut std::io::stdout().lock(), &progress)?;
        }

        Commands::Stats { index } => {
            let stats = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let db = codesearch::db::Database::open_read_only(&index)?;
                Ok(IndexStats::load(&db)?)
            })
            .await??;
            let color = std::io::stdout().is_terminal();
            fmt::fmt_stats(&mut std::io::stdout().lock(), &stats, color)?;
        }
    }

    Ok(())
}

/// Loads the index on the blocking pool; a failure here is fatal at startup.
async fn open_index(path: PathBuf) -> anyhow::Result<CorpusIndex> {
    if !path.exists() {
        anyhow::bail!("index database not found: {}", path.display());
    }
    Ok(tokio::task::spawn_blocking(move || CorpusIndex::open(&path)).await??)
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
