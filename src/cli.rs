// Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "swr-cache",
    about = "Inspect and manage the stale-while-revalidate disk cache",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Cache directory (defaults to the platform data directory)
    #[arg(long, global = true, env = "SWR_CACHE_DIR")]
    pub dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Delete every cached entry
    Clear,

    /// Print the cache directory, or the entry file for a key
    Path {
        key: Option<String>,
    },

    /// Print a cached entry and its age
    Show {
        key: String,
    },

    /// Derive a cache key from a namespace and a JSON parameter object
    Key {
        namespace: String,

        /// Parameters as JSON, e.g. '{"starred":true}'
        #[arg(default_value = "{}")]
        params: String,
    },

    /// Fetch a JSON URL through the cache
    Fetch {
        url: String,

        /// Cache key (defaults to a hash of the URL)
        #[arg(long)]
        key: Option<String>,

        /// Bearer token for the request
        #[arg(long, env = "SWR_HTTP_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Refresh even if the cached entry is fresh
        #[arg(long)]
        force: bool,
    },
}
