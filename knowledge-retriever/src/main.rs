use clap::{Parser, Subcommand};
use knowledge_retriever::{
    config::RetrieverConfig,
    retrieval::keyword_index::{RetrievalIndex, ScoredEntry},
    status::StatusApi,
    storage::KnowledgeEntry,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;

/// A CLI tool to manage and query a keyword-gated knowledge base.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base directory containing the .knowledge.db database file
    #[arg(short, long)]
    base_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log cache refreshes and search summaries to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize the knowledge database
    Init,
    /// Add a knowledge entry
    Add {
        /// Keyword or short phrase the entry is found by
        key: String,
        /// Knowledge body
        content: String,
    },
    /// Search the knowledge base
    Search {
        /// Free-text query
        query: String,
        /// Maximum number of results (defaults to the configured top-N)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show the keyword cache used to gate searches
    Keywords {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List entries in the database
    List {
        /// Limit number of results
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Get a specific entry by ID
    Get {
        /// Entry ID
        id: i64,
        /// Output format
        #[arg(short, long, default_value = "full")]
        format: OutputFormat,
    },
    /// Show database statistics
    Stats,
    /// Show comprehensive status information
    Status {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct DatabaseStats {
    total_entries: usize,
    keyword_count: usize,
    total_accesses: i64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        })
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> anyhow::Result<RetrieverConfig> {
    let mut config = match &args.config {
        Some(path) => RetrieverConfig::from_toml_file(path)?,
        None => RetrieverConfig::default(),
    };
    if let Some(base_dir) = &args.base_dir {
        config = config.with_base_dir(base_dir.clone());
    }
    Ok(config)
}

fn print_entry(entry: &KnowledgeEntry) {
    println!("Entry ID: {}", entry.id);
    println!("Key: {}", entry.key_text);
    println!("Created: {}", entry.created_at.to_rfc3339());
    match entry.last_accessed {
        Some(at) => println!("Last accessed: {}", at.to_rfc3339()),
        None => println!("Last accessed: never"),
    }
    println!("Access count: {}", entry.access_count);
    println!("Content:\n{}", entry.content);
}

fn print_hits(results: &[ScoredEntry], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results)?);
        }
        OutputFormat::Summary => {
            println!("Found {} matching entries:", results.len());
            for hit in results {
                println!(
                    "  Score: {:.1} | ID: {} | Key: {} | {}",
                    hit.score,
                    hit.id,
                    hit.key_text,
                    hit.content.chars().take(60).collect::<String>()
                );
            }
        }
        OutputFormat::Full => {
            for hit in results {
                println!("Score: {:.1}", hit.score);
                println!("Entry ID: {}", hit.id);
                println!("Key: {}", hit.key_text);
                println!("Content:\n{}", hit.content);
                println!("---");
            }
        }
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    match args.command {
        Commands::Init => {
            let _index = RetrievalIndex::open(&config).await?;
            println!(
                "Initialized knowledge database at {}",
                config.database_path().display()
            );
            Ok(())
        }
        Commands::Add { key, content } => {
            let index = RetrievalIndex::open(&config).await?;
            let id = index.add_entry(&key, &content).await?;
            println!("Added entry {id}");
            Ok(())
        }
        Commands::Search {
            query,
            limit,
            format,
        } => {
            let index = RetrievalIndex::open(&config).await?;
            let top_n = limit.unwrap_or(config.default_top_n);
            let results = index.search_top(&query, top_n).await?;
            print_hits(&results, &format)
        }
        Commands::Keywords { format } => {
            let index = RetrievalIndex::open(&config).await?;
            let snapshot = index.keyword_snapshot().await;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("{} keywords:", snapshot.count);
                    for keyword in &snapshot.keywords {
                        println!("  {keyword}");
                    }
                }
            }
            Ok(())
        }
        Commands::List { limit, format } => {
            let index = RetrievalIndex::open(&config).await?;
            let mut entries = index.store().all_entries().await?;
            entries.truncate(limit);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} entries:", entries.len());
                    for entry in &entries {
                        println!(
                            "  ID: {} | Key: {} | Accesses: {}",
                            entry.id, entry.key_text, entry.access_count
                        );
                    }
                }
                OutputFormat::Full => {
                    for entry in &entries {
                        print_entry(entry);
                        println!("---");
                    }
                }
            }
            Ok(())
        }
        Commands::Get { id, format } => {
            let index = RetrievalIndex::open(&config).await?;

            if let Some(entry) = index.store().get_entry(id).await? {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&entry)?);
                    }
                    OutputFormat::Summary => {
                        println!("Entry ID: {}", entry.id);
                        println!("Key: {}", entry.key_text);
                        println!(
                            "Content preview: {}",
                            entry.content.chars().take(100).collect::<String>()
                        );
                    }
                    OutputFormat::Full => print_entry(&entry),
                }
            } else {
                println!("Entry with ID {id} not found");
            }
            Ok(())
        }
        Commands::Stats => {
            let index = RetrievalIndex::open(&config).await?;
            let entries = index.store().all_entries().await?;

            let stats = DatabaseStats {
                total_entries: entries.len(),
                keyword_count: index.keyword_snapshot().await.count,
                total_accesses: entries.iter().map(|e| e.access_count).sum(),
            };

            println!("Database Statistics:");
            println!("  Total entries: {}", stats.total_entries);
            println!("  Distinct keywords: {}", stats.keyword_count);
            println!("  Total accesses: {}", stats.total_accesses);

            Ok(())
        }
        Commands::Status { format } => {
            let index = RetrievalIndex::open(&config).await?;
            let status = StatusApi::collect(&index).await?;
            let health = StatusApi::health(&status);

            match format {
                OutputFormat::Json => {
                    #[derive(Serialize)]
                    struct StatusOutput {
                        status: knowledge_retriever::status::IndexStatus,
                        health: knowledge_retriever::status::HealthStatus,
                        database_path: String,
                    }

                    let output = StatusOutput {
                        status,
                        health,
                        database_path: config.database_path().display().to_string(),
                    };

                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Knowledge Retriever Status");
                    println!("==========================");

                    println!("\nIndex:");
                    println!("  Database: {}", config.database_path().display());
                    println!("  Total entries: {}", status.total_entries);
                    println!("  Keywords: {}", status.keyword_count);
                    println!(
                        "  Cache refreshed: {} (every {}s{})",
                        status.last_refreshed.to_rfc3339(),
                        status.refresh_interval_seconds,
                        if status.cache_stale { ", stale" } else { "" }
                    );
                    println!("  Health: {health:?}");

                    println!("\nAccess:");
                    println!("  Total accesses: {}", status.total_accesses);
                    println!("  Never accessed: {}", status.never_accessed);
                    if !status.most_accessed.is_empty() {
                        println!("  Most accessed:");
                        for summary in &status.most_accessed {
                            println!(
                                "    {} ({}) x{}",
                                summary.key, summary.id, summary.access_count
                            );
                        }
                    }
                }
            }

            Ok(())
        }
    }
}
