//! CLI argument structs for all subcommands.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser};

use docsearch::config::DEFAULT_EVERYTHING_URL;
use docsearch::{QueryDescriptor, SearchError, SearchMode, Settings};

/// Options shared by every subcommand. Each can also come from the
/// environment.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding the folder registry, metadata cache and index
    /// (default: the platform's local data dir + /docsearch)
    #[arg(long, global = true, env = "DOCSEARCH_STORAGE")]
    pub storage: Option<PathBuf>,

    /// Extensions eligible for content indexing, comma-separated
    /// (default: pdf,docx,txt,csv,xlsx,xls,pptx,ppt)
    #[arg(long, global = true, env = "DOCSEARCH_EXTS")]
    pub exts: Option<String>,

    /// Base URL of the Everything HTTP server used for filename search
    #[arg(long, global = true, env = "EVERYTHING_URL", default_value = DEFAULT_EVERYTHING_URL)]
    pub everything_url: String,

    /// Keep the index live with a filesystem watcher (serve only)
    #[arg(
        long,
        global = true,
        env = "ENABLE_WATCHER",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub enable_watcher: bool,

    /// Log level for stderr output (error, warn, info, debug, trace).
    /// RUST_LOG takes precedence when set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl GlobalArgs {
    pub fn settings(&self) -> Settings {
        let mut settings = match &self.storage {
            Some(dir) => Settings::with_storage(dir),
            None => Settings::default(),
        };
        if let Some(exts) = &self.exts {
            settings.set_allowed_exts(exts);
        }
        settings.everything_url = self.everything_url.clone();
        settings.enable_watcher = self.enable_watcher;
        settings
    }
}

#[derive(Parser, Debug)]
pub struct AddFolderArgs {
    /// Folders to register and index
    #[arg(required = true)]
    pub folders: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"EXAMPLES:
  Filename lookup:   docsearch search "invoice,receipt"
  Content search:    docsearch search "quarterly report" --mode content
  Restrict types:    docsearch search budget --mode content --ext pdf,docx
  Date window:       docsearch search minutes --date-from 2024-01-01 --date-to 2024-01-31
  Size window (KB):  docsearch search scan --size-from 100 --size-to 2048

NOTES:
  - Comma-separated keywords are OR-combined
  - Dates are inclusive local days (YYYY-MM-DD); date-to today means "until now"
  - Content mode falls back to the closest spelling when nothing matches
"#)]
pub struct SearchArgs {
    /// Keyword(s), comma-separated for OR
    pub keyword: String,

    /// filename (Everything lookup) or content (full-text index)
    #[arg(short, long, default_value = "filename")]
    pub mode: String,

    /// Restrict to these extensions, comma-separated (default: all)
    #[arg(short, long)]
    pub ext: Option<String>,

    /// Earliest modification day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub date_from: Option<String>,

    /// Latest modification day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub date_to: Option<String>,

    /// Minimum size in KB, inclusive
    #[arg(long)]
    pub size_from: Option<f64>,

    /// Maximum size in KB, inclusive
    #[arg(long)]
    pub size_to: Option<f64>,

    #[arg(long)]
    pub case_sensitive: bool,

    /// Match whole words only (no prefix expansion)
    #[arg(long)]
    pub whole_word: bool,

    #[arg(long, default_value = "100")]
    pub max_results: usize,
}

impl SearchArgs {
    pub fn to_query(&self) -> Result<QueryDescriptor, SearchError> {
        let mode: SearchMode = self.mode.parse()?;
        let mut query = QueryDescriptor::new(self.keyword.clone(), mode);
        if let Some(ext) = &self.ext {
            query.file_types = ext.split(',').map(|e| e.trim().to_string()).collect();
        }
        query.date_from = self.date_from.clone();
        query.date_to = self.date_to.clone();
        query.size_from = self.size_from;
        query.size_to = self.size_to;
        query.case_sensitive = self.case_sensitive;
        query.whole_word = self.whole_word;
        query.max_results = self.max_results;
        Ok(query)
    }
}

#[derive(Parser, Debug)]
pub struct ShowContentArgs {
    /// File whose extracted text to print
    pub path: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Watch the first registered folder and update the index incrementally
    #[arg(long)]
    pub watch: bool,

    /// Debounce delay in ms for file watcher.
    #[arg(long, default_value = "500")]
    pub debounce_ms: u64,

    /// If more than N files change in one debounce window, do a full rescan.
    #[arg(long, default_value = "100")]
    pub bulk_threshold: usize,
}

impl ServeArgs {
    pub fn apply(&self, settings: &mut Settings) {
        settings.enable_watcher |= self.watch;
        settings.debounce = Duration::from_millis(self.debounce_ms);
        settings.bulk_threshold = self.bulk_threshold;
    }
}
