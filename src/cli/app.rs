use crate::catalog::TemplateKind;
use crate::config::Settings;
use crate::rewrite::StrategyChoice;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// tuneconf: instantiate training configuration folders
#[derive(Parser)]
#[command(name = "tuneconf")]
#[command(version = "0.1.0")]
#[command(about = "Instantiate training configuration folders from existing configs or templates")]
#[command(
    long_about = "tuneconf copies an existing configuration folder or a lora/lokr template into a new <token>-<version> folder and rewrites its config, dataset backend and prompt library files to match."
)]
pub struct Cli {
    /// Settings file (defaults to ./tuneconf.yaml, then the user config dir)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Directory holding the configuration folders
    #[arg(long, global = true)]
    pub config_root: Option<PathBuf>,

    /// Directory holding the datasets
    #[arg(long, global = true)]
    pub datasets_root: Option<PathBuf>,

    /// Directory holding the lora/lokr templates
    #[arg(long, global = true)]
    pub templates_root: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply root overrides given on the command line
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(config_root) = &self.config_root {
            settings.config_root = config_root.clone();
        }
        if let Some(datasets_root) = &self.datasets_root {
            settings.datasets_root = Some(datasets_root.clone());
        }
        if let Some(templates_root) = &self.templates_root {
            settings.templates_root = Some(templates_root.clone());
        }
    }
}

/// Which catalog to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CatalogKind {
    Folders,
    Datasets,
    Templates,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configuration folders, datasets or templates
    List {
        #[arg(value_enum)]
        catalog: CatalogKind,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new configuration folder
    New {
        /// Existing folder to copy, by 1-based index or name
        #[arg(long, conflicts_with = "template", required_unless_present = "template")]
        from: Option<String>,

        /// Template to copy instead of an existing folder
        #[arg(long, value_enum, requires = "token")]
        template: Option<TemplateKind>,

        /// Token for the new folder (required with --template, renames with --from)
        #[arg(long)]
        token: Option<String>,

        /// Version for the new folder
        #[arg(long = "version")]
        new_version: String,

        /// Dataset to train on, by 1-based index or name
        #[arg(long, conflicts_with = "reuse_dataset", required_unless_present = "reuse_dataset")]
        dataset: Option<String>,

        /// Keep the dataset the source folder already points at
        #[arg(long, conflicts_with = "template")]
        reuse_dataset: bool,

        /// Rewrite strategy (overrides settings)
        #[arg(long, value_enum)]
        strategy: Option<StrategyChoice>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the identifier and derived cache paths of a folder
    Inspect {
        /// Folder name under the config root
        folder: String,

        /// Dataset to derive cache paths for (defaults to the folder's own)
        #[arg(long)]
        dataset: Option<String>,
    },

    /// Check that the configured roots exist
    Doctor,
}

impl Commands {
    /// Get the command name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Commands::List { .. } => "list",
            Commands::New { .. } => "new",
            Commands::Inspect { .. } => "inspect",
            Commands::Doctor => "doctor",
        }
    }

    /// Check if this command modifies files
    pub fn modifies_files(&self) -> bool {
        matches!(self, Commands::New { .. })
    }
}
