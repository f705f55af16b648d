//! CLI parse: clap types for YumeChain. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// YumeChain CLI - LLM novel generation
#[derive(Parser)]
#[command(name = "yumechain")]
#[command(about = "Generate Japanese novels (plots and episodes) with LLM providers")]
#[command(version)]
pub struct Cli {
    /// Command to run; the interactive menu opens when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a novel project with a setting template
    Init {
        /// Novel title (directory name)
        #[arg(long)]
        title: String,
    },
    /// List novel projects
    List,
    /// Show the state of a novel project
    Status {
        /// Novel title (directory name)
        #[arg(long)]
        title: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Generate the plot from the setting files
    GeneratePlot {
        /// Novel title (directory name)
        #[arg(long)]
        title: String,
        /// Generate only this arc and merge it into the existing plot
        #[arg(long)]
        arc: Option<String>,
        /// Show what would be sent without calling the provider
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate episode bodies from the plot
    GenerateEpisode {
        /// Novel title (directory name)
        #[arg(long)]
        title: String,
        /// Arc name as written in plot.json
        #[arg(long)]
        arc: String,
        /// Episode numbers (e.g. 1, 1-3, 1,3,5)
        #[arg(long)]
        episodes: String,
        /// Show what would be generated without calling the provider
        #[arg(long)]
        dry_run: bool,
        /// Overwrite episodes that already exist
        #[arg(long)]
        force: bool,
    },
    /// Read novels in the browser
    Read {
        /// Novel to open (the novel list when omitted)
        #[arg(long)]
        title: Option<String>,
        /// Server port (defaults to [reader].port)
        #[arg(long)]
        port: Option<u16>,
        /// Search for a free port when the port is taken
        #[arg(long)]
        auto_port: bool,
        /// Do not open a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Publish an episode to Hatena Blog
    Publish {
        /// Novel title (directory name)
        #[arg(long)]
        title: String,
        /// Episode file stem (e.g. 序章_01); lists episodes when omitted
        #[arg(long)]
        episode: Option<String>,
        /// Blog entry title (defaults to "<title> - <episode>")
        #[arg(long)]
        blog_title: Option<String>,
        /// Comma-separated categories
        #[arg(long)]
        categories: Option<String>,
        /// Post as a draft
        #[arg(long)]
        draft: bool,
        /// Show the entry without posting
        #[arg(long)]
        preview: bool,
        /// Show the HTML rendering without posting
        #[arg(long)]
        preview_html: bool,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Inspect the resolved LLM provider settings
    Provider {
        #[command(subcommand)]
        command: ProviderCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProviderCommands {
    /// Show the effective provider, model and options with their sources
    Show {
        /// Task (plot or episode); both when omitted
        #[arg(long)]
        task: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List models available from the resolved provider
    Models {
        /// Task whose provider is queried (plot or episode)
        #[arg(long, default_value = "episode")]
        task: String,
    },
}
