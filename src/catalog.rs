//! Catalog listings for source folders, datasets and templates
//!
//! Listings are the immediate subdirectories of a root, minus reserved and
//! hidden entries, in plain lexical order of the raw name. No numeric-aware
//! ordering is applied: `tok-10` sorts before `tok-2`.

use crate::io::paths::Roots;
use crate::{Result, TuneconfError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Template directory names. They never appear in folder or dataset listings.
pub const RESERVED_TEMPLATES: [&str; 2] = ["lora", "lokr"];

/// Tool-owned directories that are not configurations
const SYSTEM_DIRS: &[&str] = &["templates", "__pycache__", "lost+found"];

/// The two fixed configuration templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Lora,
    Lokr,
}

impl TemplateKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            TemplateKind::Lora => RESERVED_TEMPLATES[0],
            TemplateKind::Lokr => RESERVED_TEMPLATES[1],
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for TemplateKind {
    type Err = TuneconfError;

    // Case-sensitive on purpose: `Lora` is an ordinary folder name.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lora" => Ok(TemplateKind::Lora),
            "lokr" => Ok(TemplateKind::Lokr),
            other => Err(TuneconfError::UnrecognizedSelection {
                selection: other.to_string(),
                available: RESERVED_TEMPLATES.len(),
            }),
        }
    }
}

/// A pick from a listing: a 1-based index or an entry name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Index(usize),
    Name(String),
}

impl Selection {
    /// All-digit input is an index, anything else a name
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = trimmed.parse() {
                return Selection::Index(index);
            }
        }
        Selection::Name(trimmed.to_string())
    }

    /// Look the selection up in `listing`. Index 0 and indices past the end are
    /// rejected, as are names not present in the listing.
    pub fn resolve<'a>(&self, listing: &'a [String]) -> Result<&'a str> {
        let found = match self {
            Selection::Index(index) => index
                .checked_sub(1)
                .and_then(|i| listing.get(i))
                .map(String::as_str),
            Selection::Name(name) => listing
                .iter()
                .find(|entry| *entry == name)
                .map(String::as_str),
        };

        found.ok_or_else(|| TuneconfError::UnrecognizedSelection {
            selection: self.to_string(),
            available: listing.len(),
        })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Index(index) => write!(f, "#{}", index),
            Selection::Name(name) => f.write_str(name),
        }
    }
}

/// List configuration folders under `root`
pub fn list_source_folders(root: &Path) -> Result<Vec<String>> {
    list_dirs(root, true)
}

/// List datasets under `dataset_root`
pub fn list_datasets(dataset_root: &Path) -> Result<Vec<String>> {
    list_dirs(dataset_root, true)
}

/// List template directories under `templates_root`
pub fn list_templates(templates_root: &Path) -> Result<Vec<String>> {
    list_dirs(templates_root, false)
}

fn list_dirs(root: &Path, skip_reserved: bool) -> Result<Vec<String>> {
    let entries =
        fs::read_dir(root).map_err(|e| TuneconfError::catalog_unavailable(root, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TuneconfError::catalog_unavailable(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            debug!("Skipping non UTF-8 directory name: {:?}", path);
            continue;
        };

        if is_excluded(&name, skip_reserved) {
            debug!("Excluding {} from listing of {:?}", name, root);
            continue;
        }
        names.push(name);
    }

    names.sort();
    Ok(names)
}

fn is_excluded(name: &str, skip_reserved: bool) -> bool {
    name.starts_with('.')
        || SYSTEM_DIRS.contains(&name)
        || (skip_reserved && RESERVED_TEMPLATES.contains(&name))
}

/// Catalog reads bound to a set of configured roots
#[derive(Debug, Clone)]
pub struct CatalogReader {
    roots: Roots,
}

impl CatalogReader {
    pub fn new(roots: Roots) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    pub fn source_folders(&self) -> Result<Vec<String>> {
        list_source_folders(&self.roots.config_root)
    }

    pub fn datasets(&self) -> Result<Vec<String>> {
        list_datasets(&self.roots.datasets_root)
    }

    pub fn templates(&self) -> Result<Vec<String>> {
        list_templates(&self.roots.templates_root)
    }

    /// Resolve a selection against the current folder listing and return its path
    pub fn select_source_folder(&self, selection: &Selection) -> Result<(String, PathBuf)> {
        let folders = self.source_folders()?;
        let name = selection.resolve(&folders)?.to_string();
        let path = self.roots.config_root.join(&name);
        Ok((name, path))
    }

    pub fn select_dataset(&self, selection: &Selection) -> Result<String> {
        let datasets = self.datasets()?;
        Ok(selection.resolve(&datasets)?.to_string())
    }

    /// Directory of a fixed template; it must exist
    pub fn template_dir(&self, kind: TemplateKind) -> Result<PathBuf> {
        let dir = self.roots.templates_root.join(kind.dir_name());
        if !dir.is_dir() {
            return Err(TuneconfError::catalog_unavailable(
                &dir,
                format!("template '{}' not found", kind),
            ));
        }
        Ok(dir)
    }
}
