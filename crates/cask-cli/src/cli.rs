use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cask",
    about = "Cask -- content and object management across storage backends",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Service configuration file (TOML). Defaults to a single memory backend.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the object key a strategy generates
    Key(KeyArgs),
    /// List configured storage backends
    Backends,
    /// Store a local file as a new root content
    Put(PutArgs),
    /// Build a derivation chain in memory and print its tree
    Tree(TreeArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyName {
    Legacy,
    GitLike,
    Hashed,
}

#[derive(Args)]
pub struct KeyArgs {
    #[arg(short, long, default_value = "git-like")]
    pub strategy: StrategyName,
    #[arg(long, default_value_t = cask_keys::DEFAULT_SHARD_LENGTH)]
    pub shard_length: usize,
    /// Prefix keys with a tenant namespace
    #[arg(long)]
    pub tenant: Option<String>,
    #[arg(long)]
    pub file_name: Option<String>,
    /// Place the key under a derived layout of this type
    #[arg(long)]
    pub derived: Option<String>,
    #[arg(long, requires = "derived")]
    pub variant: Option<String>,
    /// Content id (random when omitted)
    #[arg(long)]
    pub content_id: Option<String>,
    /// Object id (random when omitted)
    #[arg(long)]
    pub object_id: Option<String>,
}

#[derive(Args)]
pub struct PutArgs {
    /// Local file to store
    pub path: PathBuf,
    /// Target backend (defaults to the configured default backend)
    #[arg(short, long)]
    pub backend: Option<String>,
    #[arg(long)]
    pub mime_type: Option<String>,
    /// Content name (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Number of derived levels below the root
    #[arg(short, long, default_value_t = 3)]
    pub levels: u32,
    /// Derived contents created per node
    #[arg(short, long, default_value_t = 1)]
    pub fan_out: u32,
    /// Traversal depth for the printed tree
    #[arg(long, default_value_t = cask_types::MAX_DERIVATION_DEPTH)]
    pub max_depth: u32,
}
