//! docsync CLI
//!
//! Command-line demo for docsync: a small blog of users and posts kept in
//! a local store snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use docsync_core::{Config, MemoryStore, SyncContext};

mod commands;
mod models;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "docsync")]
#[command(about = "docsync - typed documents over a document store")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage posts
    Post {
        #[command(subcommand)]
        command: PostCommands,
    },
    /// Show store status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    #[command(alias = "add")]
    Create {
        /// Display name
        name: String,
    },
    /// Show a user and their posts
    Show {
        /// User ID (full or prefix)
        id: String,
    },
    /// List all users
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
enum PostCommands {
    /// Create a post for a user
    #[command(alias = "add")]
    Create {
        /// Author's user ID (full or prefix)
        #[arg(short, long)]
        author: String,
        /// Post title
        #[arg(short = 'T', long)]
        title: String,
        /// Post body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// List posts
    #[command(alias = "ls")]
    List {
        /// Only posts by this user (full ID or prefix)
        #[arg(short, long)]
        author: Option<String>,
    },
    /// Show a post
    Show {
        /// Post ID (full or prefix)
        id: String,
    },
    /// Like a post
    Like {
        /// Post ID (full or prefix)
        id: String,
    },
    /// Find posts by exact title
    Search {
        /// Title to match
        title: String,
    },
    /// Delete a post
    #[command(alias = "rm")]
    Delete {
        /// Post ID (full or prefix)
        id: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, use_cache, batch_size, relate_mode, max_relate_attempts)
        key: String,
        /// Configuration value
        value: String,
    },
}

impl Commands {
    /// Whether the command may change the store
    fn is_write(&self) -> bool {
        matches!(
            self,
            Commands::User {
                command: UserCommands::Create { .. }
            } | Commands::Post {
                command: PostCommands::Create { .. }
                    | PostCommands::Like { .. }
                    | PostCommands::Delete { .. }
            }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(&config, cli.config.as_ref(), &output)
            }
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(config, key, value, cli.config.as_ref(), &output)
            }
        };
    }

    let store_path = config.store_path();
    let store = Arc::new(
        MemoryStore::open(&store_path)
            .with_context(|| format!("Failed to open store at {:?}", store_path))?,
    );
    let ctx = SyncContext::new(store.clone(), config);
    let is_write = cli.command.is_write();

    let result = match cli.command {
        Commands::User { command } => handle_user_command(command, &ctx, &output).await,
        Commands::Post { command } => handle_post_command(command, &ctx, &output).await,
        Commands::Status => commands::status::show(&ctx, &store, &store_path, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    // Persist after write commands, even a partially applied one
    if is_write {
        store
            .save(&store_path)
            .with_context(|| format!("Failed to save store to {:?}", store_path))?;
        debug!("Store saved to {:?}", store_path);
    }

    result
}

async fn handle_user_command(command: UserCommands, ctx: &SyncContext, output: &Output) -> Result<()> {
    match command {
        UserCommands::Create { name } => commands::user::create(ctx, name, output).await.map(|_| ()),
        UserCommands::Show { id } => commands::user::show(ctx, id, output).await,
        UserCommands::List => commands::user::list(ctx, output).await,
    }
}

async fn handle_post_command(command: PostCommands, ctx: &SyncContext, output: &Output) -> Result<()> {
    match command {
        PostCommands::Create {
            author,
            title,
            body,
        } => commands::post::create(ctx, author, title, body, output)
            .await
            .map(|_| ()),
        PostCommands::List { author } => commands::post::list(ctx, author, output).await,
        PostCommands::Show { id } => commands::post::show(ctx, id, output).await,
        PostCommands::Like { id } => commands::post::like(ctx, id, output).await,
        PostCommands::Search { title } => commands::post::search(ctx, title, output).await,
        PostCommands::Delete { id } => commands::post::delete(ctx, id, output).await,
    }
}

/// Initialize stderr logging
///
/// RUST_LOG takes precedence; otherwise warnings only, or debug output for
/// docsync crates with --verbose.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "docsync_core=debug,docsync_cli=debug"
    } else {
        "warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
