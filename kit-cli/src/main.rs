//! Kit command line

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::Context;

#[derive(Parser, Debug)]
#[command(name = "kit")]
#[command(author = "Kit Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Minimal content-addressable version control", long_about = None)]
struct Cli {
    /// Run as if kit was started in this directory
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    dir: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Identity recorded on new commits
#[derive(Args, Debug, Default)]
pub struct IdentityArgs {
    #[arg(long, env = "KIT_AUTHOR_NAME")]
    pub author_name: Option<String>,

    #[arg(long, env = "KIT_AUTHOR_EMAIL")]
    pub author_email: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty repository (or refresh an existing one)
    Init,

    /// Stage files or directories
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Remove paths from the index, keeping the files
    Unstage {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Record the staged snapshot as a new commit
    Commit {
        #[arg(short, long)]
        message: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Show commit history starting at HEAD
    Log {
        #[arg(short = 'n', long)]
        max_count: Option<usize>,

        #[arg(long)]
        oneline: bool,
    },

    /// Compute an object id, optionally storing the object
    HashObject {
        #[arg(short, long)]
        write: bool,

        #[arg(short = 't', long = "type", default_value = "blob")]
        kind: String,

        file: PathBuf,
    },

    /// Show an object's content, type or size
    CatFile {
        #[command(flatten)]
        mode: CatMode,

        object: String,
    },

    /// Write the index as a tree and print its id
    WriteTree,

    /// List staged paths
    LsFiles {
        /// Show mode and object id as well
        #[arg(short, long)]
        stage: bool,
    },

    /// List branches, or create one at HEAD
    Branch { name: Option<String> },

    /// Print the object id a name resolves to
    RevParse { name: String },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct CatMode {
    /// Pretty-print the content
    #[arg(short = 'p')]
    pub pretty: bool,

    /// Print the object type
    #[arg(short = 't')]
    pub kind: bool,

    /// Print the payload size
    #[arg(short = 's')]
    pub size: bool,
}

fn init_tracing(debug: bool) {
    let env_filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context::new(cli.dir);
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Init => commands::init(&ctx, &mut out),
        Commands::Add { paths } => commands::add(&ctx, &paths, &mut out),
        Commands::Unstage { paths } => commands::unstage(&ctx, &paths, &mut out),
        Commands::Commit { message, identity } => {
            commands::commit(&ctx, &message, &identity, &mut out)
        }
        Commands::Log { max_count, oneline } => commands::log(&ctx, max_count, oneline, &mut out),
        Commands::HashObject { write, kind, file } => {
            commands::hash_object(&ctx, &file, &kind, write, &mut out)
        }
        Commands::CatFile { mode, object } => commands::cat_file(&ctx, &mode, &object, &mut out),
        Commands::WriteTree => commands::write_tree(&ctx, &mut out),
        Commands::LsFiles { stage } => commands::ls_files(&ctx, stage, &mut out),
        Commands::Branch { name } => commands::branch(&ctx, name.as_deref(), &mut out),
        Commands::RevParse { name } => commands::rev_parse(&ctx, &name, &mut out),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    run(cli)
}
