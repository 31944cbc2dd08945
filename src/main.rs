mod cli;

use std::process;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use swr_cache::http::HttpClient;
use swr_cache::{
    CacheConfig, CacheStore, Result, SubscriptionConfig, SubscriptionController, SwrError,
    hash_record,
};

use crate::cli::{Args, Commands};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = CacheConfig::load(args.dir)?;
    let store = CacheStore::from_config(&config);

    match args.command {
        Commands::Clear => {
            store.clear().await?;
            println!("✓ Cleared {}", store.dir().display());
        }

        Commands::Path { key } => match key {
            Some(key) => println!("{}", store.entry_path(&key).display()),
            None => println!("{}", store.dir().display()),
        },

        Commands::Show { key } => match store.get::<Value>(&key).await {
            Some(cached) => {
                println!("age: {}s", cached.age.as_secs());
                println!("{}", serde_json::to_string_pretty(&cached.payload)?);
            }
            None => {
                return Err(SwrError::NotFound(format!("no cache entry for {key:?}")));
            }
        },

        Commands::Key { namespace, params } => {
            let params: Value = serde_json::from_str(&params)?;
            println!("{}", hash_record(&namespace, &params)?);
        }

        Commands::Fetch {
            url,
            key,
            token,
            force,
        } => {
            let key = match key {
                Some(key) => key,
                None => hash_record("url", &url)?,
            };
            let client = Arc::new(HttpClient::new("", token.as_deref())?);
            let subscription = SubscriptionConfig::<Value>::new(key, client.fetcher(url))
                .with_thresholds(config.thresholds);
            let controller = SubscriptionController::new(store, subscription);

            let freshness = if force {
                controller.force_refetch().await
            } else {
                controller.activate().await
            };
            controller.settled().await;

            let state = controller.state();
            eprintln!("cache: {:?}, state: {}", freshness, state.phase.display());
            if let Some(data) = state.data() {
                println!("{}", serde_json::to_string_pretty(data)?);
            }
            if let Some(message) = state.error {
                return Err(SwrError::Other(message));
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
