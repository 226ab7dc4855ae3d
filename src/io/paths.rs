use crate::naming::Identifier;
use crate::{Result, TuneconfError};
use directories::ProjectDirs;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Settings file looked up in the working directory
pub const LOCAL_SETTINGS_FILE: &str = "tuneconf.yaml";

/// Filesystem roots the tool reads from and writes into
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Roots {
    /// Existing configurations; new configurations are created here too
    pub config_root: PathBuf,
    /// Dataset catalog
    pub datasets_root: PathBuf,
    /// Fixed templates (`lora`, `lokr`)
    pub templates_root: PathBuf,
}

impl Roots {
    /// Roots laid out the conventional way around `config_root`:
    /// `<config_root>/templates` and a sibling `datasets` directory
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        let config_root = config_root.into();
        let datasets_root = match config_root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join("datasets"),
            _ => config_root.join("..").join("datasets"),
        };
        let templates_root = config_root.join("templates");
        Self {
            config_root,
            datasets_root,
            templates_root,
        }
    }

    pub fn with_datasets_root(mut self, datasets_root: impl Into<PathBuf>) -> Self {
        self.datasets_root = datasets_root.into();
        self
    }

    pub fn with_templates_root(mut self, templates_root: impl Into<PathBuf>) -> Self {
        self.templates_root = templates_root.into();
        self
    }

    /// Where a configuration named `identifier` lives
    pub fn destination_for(&self, identifier: &Identifier) -> PathBuf {
        self.config_root.join(identifier.dir_name())
    }

    /// Every root that is missing or not a directory
    pub fn missing(&self) -> Vec<(&'static str, &Path)> {
        [
            ("config", self.config_root.as_path()),
            ("datasets", self.datasets_root.as_path()),
            ("templates", self.templates_root.as_path()),
        ]
        .into_iter()
        .filter(|(_, path)| !path.is_dir())
        .collect()
    }

    /// Fail on the first missing root
    pub fn verify(&self) -> Result<()> {
        match self.missing().first() {
            Some((name, path)) => Err(TuneconfError::catalog_unavailable(
                *path,
                format!("{} root does not exist", name),
            )),
            None => Ok(()),
        }
    }
}

/// Platform settings file (`~/.config/tuneconf/settings.yaml` on Linux)
pub fn user_settings_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "tuneconf").map(|dirs| dirs.config_dir().join("settings.yaml"))
}
