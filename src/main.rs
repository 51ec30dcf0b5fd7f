use clap::{Parser, Subcommand, ValueEnum};
use dishx::{
    AppState, Config, EmbeddingProvider, EntityStore, HashEmbedder, JsonFileSource, OpenAiEmbedder, Pipeline, RestApi,
    RunContext, SourceCollector,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Restaurant entity resolution and semantic search
#[derive(Parser, Debug)]
#[command(name = "dishx")]
#[command(about = "Cross-source restaurant entity resolution", long_about = None)]
struct Args {
    /// Path to the data directory
    #[arg(short, long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Embedding provider
    #[arg(long, global = true, value_enum, default_value_t = Embedder::Hash)]
    embedder: Embedder,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve scraped source files into the entity store
    Ingest {
        /// Directory holding `<source>.json` / `<source>.jsonl` files
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Query the stored entities
    Search {
        query: String,

        /// Number of results
        #[arg(short)]
        k: Option<usize>,

        /// Treat a neighborhood in the query as a filter
        #[arg(long)]
        location_aware: bool,
    },
    /// Manage point-in-time copies of the entity store
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Start the HTTP API
    Serve {
        #[arg(long, default_value_t = 6333)]
        http_port: u16,
    },
}

#[derive(Subcommand, Debug)]
enum SnapshotAction {
    /// Snapshot the current entity set
    Create,
    /// List snapshots, newest first
    List,
    /// Replace the entity store with a snapshot
    Restore { name: String },
    /// Delete a snapshot
    Delete { name: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Embedder {
    Hash,
    Openai,
}

fn provider(kind: Embedder) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match kind {
        Embedder::Hash => Arc::new(HashEmbedder::default()),
        Embedder::Openai => Arc::new(OpenAiEmbedder::from_env()?),
    };
    info!(provider = provider.name(), dimensions = provider.dimensions(), "embedding provider ready");
    Ok(provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting DishX v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);

    let config = Config::load(args.config.as_deref())?;
    let store = Arc::new(EntityStore::open(&args.data_dir)?);
    let pipeline = Pipeline::new(config, store.clone(), provider(args.embedder)?);

    match args.command {
        Command::Ingest { input } => {
            let collectors: Vec<Box<dyn SourceCollector>> = JsonFileSource::discover(&input)
                .into_iter()
                .map(|source| Box::new(source) as Box<dyn SourceCollector>)
                .collect();
            if collectors.is_empty() {
                warn!("no source files found in {:?}", input);
            }

            let report = pipeline.run(&RunContext::new(), &collectors).await?;
            println!("{}", serde_json::to_string_pretty(&report.counts)?);
            for kind in [
                "parse_failure",
                "match_ambiguity",
                "field_conflict",
                "invariant_violation",
                "external_service_failure",
            ] {
                let count = report.count_of(kind);
                if count > 0 {
                    println!("{kind}: {count}");
                }
            }
        }
        Command::Search {
            query,
            k,
            location_aware,
        } => {
            pipeline.load_index();
            let engine = pipeline.search_engine()?;
            let hits = if location_aware {
                let located = engine.search_with_location(&query, k).await?;
                if let Some(location) = &located.location {
                    info!(location = %location, query = %located.query, "location filter applied");
                }
                if !located.widened_to.is_empty() {
                    info!(adjacent = ?located.widened_to, "location filter widened");
                }
                located.hits
            } else {
                engine.search(&query, k).await?
            };

            if hits.is_empty() {
                println!("no results");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "{:>2}. {:.4}  {}  [{}]  {}",
                    rank + 1,
                    hit.score,
                    hit.entity.name,
                    hit.entity.neighborhood.as_deref().unwrap_or("-"),
                    hit.entity.id
                );
            }
        }
        Command::Snapshot { action } => match action {
            SnapshotAction::Create => {
                let snapshot = store.create_snapshot()?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            SnapshotAction::List => {
                let snapshots = store.list_snapshots()?;
                if snapshots.is_empty() {
                    println!("no snapshots");
                }
                for snapshot in snapshots {
                    println!(
                        "{}  {}  {} bytes",
                        snapshot.name,
                        snapshot.creation_time.as_deref().unwrap_or("-"),
                        snapshot.size
                    );
                }
            }
            SnapshotAction::Restore { name } => {
                let count = store.restore_snapshot(&name)?;
                store.save()?;
                println!("restored {count} entities from {name}");
            }
            SnapshotAction::Delete { name } => {
                if store.delete_snapshot(&name)? {
                    println!("deleted {name}");
                } else {
                    warn!("snapshot {} not found", name);
                }
            }
        },
        Command::Serve { http_port } => {
            let indexed = pipeline.load_index();
            info!("Loaded {} entities ({} indexed)", store.len(), indexed);
            let state = AppState {
                store: store.clone(),
                engine: Arc::new(pipeline.search_engine()?),
            };

            info!("HTTP API: http://localhost:{}/", http_port);
            let http_handle = std::thread::spawn(move || {
                let sys = actix_web::rt::System::new();
                sys.block_on(async {
                    if let Err(e) = RestApi::start(state, http_port).await {
                        error!("HTTP server error: {}", e);
                    }
                })
            });

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                }
                _ = tokio::task::spawn_blocking(move || {
                    http_handle.join().ok();
                }) => {
                    info!("HTTP server stopped");
                }
            }
        }
    }

    info!("Shutting down...");
    Ok(())
}
