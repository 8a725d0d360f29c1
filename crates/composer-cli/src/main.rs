mod build;
mod consts;
mod export;
mod serve;
mod server_utils;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use composer::errors::error_chain;
use composer::logging::init_logging;
use composer::{ComposerError, FilterCatalog, Index, IndexDocument, IndexOptions};
use log::error;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Silence all output
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the site, rendering every request from the sources
    Serve {
        #[command(flatten)]
        index: IndexArgs,

        /// Expose the server to your network
        #[arg(long)]
        host: bool,

        /// Port to listen on. Defaults to the first open port starting at 8080
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build the site into a static file tree
    Build {
        #[command(flatten)]
        index: IndexArgs,

        #[arg(long, default_value = "build")]
        build_path: PathBuf,

        /// Remove the build directory first
        #[arg(long)]
        clean: bool,

        /// Skip routes that fail to build instead of failing the build
        #[arg(long)]
        keep_going: bool,

        /// Render routes one at a time
        #[arg(long)]
        sequential: bool,
    },
    /// Print the resolved index as JSON
    Export {
        #[command(flatten)]
        index: IndexArgs,
    },
}

#[derive(Args)]
struct IndexArgs {
    /// Index document (.json, .yaml or .yml)
    index: PathBuf,

    /// Directory relative source paths resolve against. Defaults to the directory of the index document
    #[arg(long)]
    base_path: Option<PathBuf>,
}

impl IndexArgs {
    fn load(&self, options: IndexOptions) -> Result<Index, ComposerError> {
        load_index(&self.index, self.base_path.as_deref(), options)
    }
}

fn load_index(
    path: &Path,
    base_path: Option<&Path>,
    options: IndexOptions,
) -> Result<Index, ComposerError> {
    let document = IndexDocument::load(path)?;

    let base_path = match base_path {
        Some(base_path) => base_path.to_path_buf(),
        None => match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };

    Ok(Index::from_document(
        document,
        base_path,
        &FilterCatalog::builtin(),
        options,
    )?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging();
    if cli.quiet {
        log::set_max_level(log::LevelFilter::Off);
    }

    let result = match cli.command {
        Commands::Serve { index, host, port } => match index.load(IndexOptions::default()) {
            Ok(index) => serve::start_server(index, host, port)
                .await
                .map_err(ComposerError::from),
            Err(err) => Err(err),
        },
        Commands::Build {
            index,
            build_path,
            clean,
            keep_going,
            sequential,
        } => build::build_site(
            &index,
            build::BuildArgs {
                build_path,
                clean,
                keep_going,
                sequential,
            },
        ),
        Commands::Export { index } => export::export_index(&index),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target: "composer", "{}", error_chain(&err));
            ExitCode::FAILURE
        }
    }
}
