//! Tool settings
//!
//! Resolution order:
//! 1. `--settings <file>` (must exist)
//! 2. `./tuneconf.yaml`
//! 3. the platform config directory (`settings.yaml`)
//! 4. built-in defaults
//!
//! CLI flags are applied on top of whichever source won.

use crate::instantiate::copy::CopyFilter;
use crate::io::paths::{user_settings_file, Roots, LOCAL_SETTINGS_FILE};
use crate::rewrite::{StrategyChoice, DEFAULT_RESOLUTION_IDS};
use crate::{Result, TuneconfError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Transient editor and notebook artifacts left out of copies
pub const DEFAULT_COPY_EXCLUDE: &[&str] = &[
    ".ipynb_checkpoints",
    "__pycache__",
    ".DS_Store",
    "*~",
    "*.swp",
    "*.tmp",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Existing configurations and destination of new ones
    pub config_root: PathBuf,

    /// Dataset catalog; defaults to a `datasets` sibling of `config_root`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasets_root: Option<PathBuf>,

    /// Template directory; defaults to `<config_root>/templates`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates_root: Option<PathBuf>,

    /// Backend ids treated as image resolutions
    pub resolution_ids: Vec<String>,

    pub strategy: StrategyChoice,

    /// File name globs skipped while copying a source tree
    pub copy_exclude: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_root: PathBuf::from("config"),
            datasets_root: None,
            templates_root: None,
            resolution_ids: DEFAULT_RESOLUTION_IDS.iter().map(|s| s.to_string()).collect(),
            strategy: StrategyChoice::Auto,
            copy_exclude: DEFAULT_COPY_EXCLUDE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Settings {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let settings: Settings = serde_yaml_ng::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TuneconfError::Config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&contents).map_err(|e| {
            TuneconfError::Config(format!(
                "Failed to parse settings file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load settings following the resolution order. Returns the file that was
    /// used, if any.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(TuneconfError::Config(format!(
                    "Settings file does not exist: {}",
                    path.display()
                )));
            }
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        let candidates = [Some(PathBuf::from(LOCAL_SETTINGS_FILE)), user_settings_file()];
        for candidate in candidates.into_iter().flatten() {
            if candidate.is_file() {
                debug!("Loading settings from {}", candidate.display());
                return Ok((Self::from_file(&candidate)?, Some(candidate)));
            }
        }

        debug!("No settings file found, using defaults");
        Ok((Self::default(), None))
    }

    /// Reject values that would only fail later, mid-run
    pub fn validate(&self) -> Result<()> {
        if self.config_root.as_os_str().is_empty() {
            return Err(TuneconfError::Config("config_root must not be empty".into()));
        }
        if let Some(id) = self.resolution_ids.iter().find(|id| id.trim().is_empty()) {
            return Err(TuneconfError::Config(format!(
                "resolution_ids contains an empty id: {:?}",
                id
            )));
        }
        CopyFilter::new(&self.copy_exclude)?;
        Ok(())
    }

    /// Resolved filesystem roots
    pub fn roots(&self) -> Roots {
        let mut roots = Roots::new(&self.config_root);
        if let Some(datasets_root) = &self.datasets_root {
            roots = roots.with_datasets_root(datasets_root);
        }
        if let Some(templates_root) = &self.templates_root {
            roots = roots.with_templates_root(templates_root);
        }
        roots
    }

    pub fn copy_filter(&self) -> Result<CopyFilter> {
        CopyFilter::new(&self.copy_exclude)
    }
}
