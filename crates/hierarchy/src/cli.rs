use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Browse hierarchical resources served by providers, and serve them.
#[derive(Debug, Parser)]
#[command(name = "hierarchy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a provider on a TCP port
    Serve(ServeArgs),

    /// Connect to a provider and browse it
    Browse(BrowseArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Objects authored as JSON files
    Static,
    /// A local directory tree
    Fs,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, value_enum, default_value_t = BackendKind::Static)]
    pub backend: BackendKind,

    /// Objects directory (static) or browsed directory (fs)
    #[arg(long)]
    pub root: PathBuf,

    /// Name reported to browsers
    #[arg(long)]
    pub name: Option<String>,

    /// Directory of part descriptors
    #[arg(long)]
    pub parts: Option<PathBuf>,

    /// Directory of PNG icons
    #[arg(long)]
    pub resources: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct BrowseArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: BrowseCommand,
}

#[derive(Debug, Subcommand)]
pub enum BrowseCommand {
    /// Print the hierarchy below an object
    Tree {
        #[arg(default_value = "/")]
        id: String,

        #[arg(long, default_value_t = 2)]
        depth: usize,
    },

    /// List the children of an object
    Ls {
        #[arg(default_value = "/")]
        id: String,
    },

    /// Search below an object
    Search {
        id: String,
        term: String,

        /// Only match direct children
        #[arg(long)]
        no_recursive: bool,
    },

    /// Show the context menu of an object
    Menu { id: String },

    /// Run a part against an object
    Run { id: String, unique_id: String },

    /// List the parts downloaded from the provider
    Parts,
}
