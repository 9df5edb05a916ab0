//! CLI layer: argument parsing, logging setup and command dispatch.

pub mod args;
mod serve;

pub use args::*;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docsearch::everything::EverythingClient;
use docsearch::{
    ContentIndexer, ExtractorRegistry, FolderRegistry, ResponseEnvelope, SearchEngine, SearchError, Settings,
};

use crate::mcp::handlers::{self, HandlerContext};

// ─── CLI ─────────────────────────────────────────────────────────────

/// Local document search: filename lookup through Everything and full-text
/// content search over registered folders
#[derive(Parser, Debug)]
#[command(name = "docsearch", version, about, after_help = "\
Run 'docsearch <COMMAND> --help' for detailed options and examples.\n\
Every command prints a JSON envelope {status, code, message, results} to stdout.")]
pub(crate) struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Register folders and index their documents
    AddFolder(AddFolderArgs),

    /// List registered folders
    ListFolders,

    /// Search by file name or document content
    Search(SearchArgs),

    /// Print the extracted text of one document
    ShowContent(ShowContentArgs),

    /// Start the MCP (JSON-RPC 2.0) server over stdio
    Serve(ServeArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let mut settings = cli.global.settings();
    let code = match cli.command {
        Commands::Serve(args) => {
            args.apply(&mut settings);
            match serve::cmd_serve(settings) {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
        command => {
            // A watcher would die with this short-lived process.
            settings.enable_watcher = false;
            let envelope = match open_context(settings) {
                Ok(ctx) => execute(&ctx, command),
                Err(e) => ResponseEnvelope::from_error(&e),
            };
            print_envelope(&envelope);
            if envelope.is_success() { 0 } else { 1 }
        }
    };
    std::process::exit(code);
}

/// Install the stderr tracing subscriber. `RUST_LOG` overrides `--log-level`.
fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&global.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if global.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Open storage and the filename-service client for `settings`.
pub(crate) fn open_context(settings: Settings) -> Result<HandlerContext, SearchError> {
    let service = EverythingClient::new(&settings)?;
    let registry = Arc::new(FolderRegistry::open(settings.registry_path()));
    let indexer = Arc::new(ContentIndexer::open(settings, ExtractorRegistry::with_defaults()));
    Ok(HandlerContext::new(SearchEngine::new(indexer, registry, service)))
}

fn execute(ctx: &HandlerContext, command: Commands) -> ResponseEnvelope {
    match command {
        Commands::AddFolder(args) => handlers::add_folder(ctx, &args.folders),
        Commands::ListFolders => handlers::list_folders(ctx),
        Commands::Search(args) => match args.to_query() {
            Ok(query) => handlers::search(ctx, &query),
            Err(e) => ResponseEnvelope::from_error(&e),
        },
        Commands::ShowContent(args) => handlers::show_content(ctx, &args.path),
        Commands::Serve(_) => ResponseEnvelope::from_error(&SearchError::validation("serve is not a one-shot command")),
    }
}

fn print_envelope(envelope: &ResponseEnvelope) {
    match serde_json::to_string_pretty(envelope) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: failed to serialize response: {}", e),
    }
}
