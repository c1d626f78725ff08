use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use staking_indexer::{
    protocol_view, user_view, Config, Indexer, JsonLinesSource, StakingProjector,
};
use staking_store::{EntityStore, MemoryEntityStore, PgEntityStore};

#[derive(Parser)]
#[command(
    name = "staking-indexer",
    about = "Index staking contract events into queryable aggregates"
)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a JSON-lines event export up to its end and print a summary.
    Run {
        #[arg(long, env = "EVENTS_PATH")]
        events: PathBuf,
    },
    /// Print one participant's position.
    User { address: String },
    /// Print the protocol totals.
    Protocol,
}

async fn open_store(config: &Config) -> Result<Arc<dyn EntityStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PgEntityStore::connect(url).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryEntityStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("staking=info".parse()?))
        .init();

    let cli = Cli::parse();
    cli.config.validate()?;
    cli.config.log_redacted();

    match cli.command {
        Command::Run { events } => {
            let store = open_store(&cli.config).await?;
            let source = JsonLinesSource::open(&events).await?;
            info!(events = %events.display(), logs = source.len(), "Loaded event export");

            let mut indexer = Indexer::resume(
                store.clone(),
                source,
                StakingProjector::new(cli.config.min_lock_duration),
                &cli.config.checkpoint_name,
                cli.config.batch_size,
            )
            .await?;
            let stats = indexer.run_to_end().await?;
            let protocol = protocol_view(store.as_ref()).await?;

            let summary = json!({
                "run_id": indexer.run_id(),
                "stats": stats,
                "checkpoint": indexer.checkpoint(),
                "protocol": protocol,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::User { address } => {
            cli.config.require_database()?;
            let store = open_store(&cli.config).await?;
            let view = user_view(store.as_ref(), &address).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Protocol => {
            cli.config.require_database()?;
            let store = open_store(&cli.config).await?;
            let view = protocol_view(store.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }

    Ok(())
}
