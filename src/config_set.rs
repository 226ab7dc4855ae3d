//! The three documents that make up a training configuration
//!
//! Each document is optional. A document is read once, rewritten in memory and
//! written back once; a document that is never modified is never written.

use crate::naming::DatasetRef;
use crate::{Result, TuneconfError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// `config.json`
    Config,
    /// `multidatabackend.json`
    MultiDataBackend,
    /// `user_prompt_library.json`
    PromptLibrary,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::Config,
        DocumentKind::MultiDataBackend,
        DocumentKind::PromptLibrary,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            DocumentKind::Config => "config.json",
            DocumentKind::MultiDataBackend => "multidatabackend.json",
            DocumentKind::PromptLibrary => "user_prompt_library.json",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// One configuration document held as text
#[derive(Debug, Clone)]
pub struct Document {
    kind: DocumentKind,
    path: PathBuf,
    text: String,
    modified: bool,
}

impl Document {
    pub fn from_text(kind: DocumentKind, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            text: text.into(),
            modified: false,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Parse the current text as JSON
    pub fn parse(&self) -> Result<Value> {
        serde_json::from_str(&self.text).map_err(|e| TuneconfError::Parse {
            document: self.kind.file_name().to_string(),
            reason: e.to_string(),
        })
    }

    /// Replace the document text. Identical text does not mark it modified.
    pub fn replace_text(&mut self, text: String) {
        if text != self.text {
            self.text = text;
            self.modified = true;
        }
    }

    /// Replace the document with a pretty-printed JSON value
    pub fn replace_json(&mut self, value: &Value) -> Result<()> {
        let text = to_pretty_json(value)?;
        self.replace_text(text);
        Ok(())
    }

    /// Write the document back if it changed. Returns whether a write happened.
    pub fn persist(&mut self) -> Result<bool> {
        if !self.modified {
            return Ok(false);
        }
        fs::write(&self.path, &self.text)?;
        self.modified = false;
        debug!("Wrote {}", self.path.display());
        Ok(true)
    }
}

/// Two-space indented JSON with a trailing newline
pub fn to_pretty_json(value: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

/// The configuration documents found in one directory
#[derive(Debug, Clone, Default)]
pub struct ConfigSet {
    documents: BTreeMap<DocumentKind, Document>,
    load_failures: BTreeMap<DocumentKind, String>,
}

impl ConfigSet {
    /// Read whichever of the three documents exist in `dir`.
    ///
    /// A document that exists but cannot be read as UTF-8 text is recorded in
    /// [`ConfigSet::load_failures`] instead of failing the load.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(TuneconfError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("configuration directory not found: {}", dir.display()),
            )));
        }

        let mut set = ConfigSet::default();
        for kind in DocumentKind::ALL {
            let path = dir.join(kind.file_name());
            match fs::read_to_string(&path) {
                Ok(text) => {
                    debug!("Loaded {}", path.display());
                    set.documents
                        .insert(kind, Document::from_text(kind, path, text));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("{} not present in {}", kind, dir.display());
                }
                Err(e) => {
                    warn!("Could not read {}: {}", path.display(), e);
                    set.load_failures.insert(kind, e.to_string());
                }
            }
        }
        Ok(set)
    }

    pub fn insert(&mut self, document: Document) {
        self.documents.insert(document.kind(), document);
    }

    pub fn get(&self, kind: DocumentKind) -> Option<&Document> {
        self.documents.get(&kind)
    }

    pub fn get_mut(&mut self, kind: DocumentKind) -> Option<&mut Document> {
        self.documents.get_mut(&kind)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn documents_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.values_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn load_failures(&self) -> &BTreeMap<DocumentKind, String> {
        &self.load_failures
    }

    /// The dataset the backend file trains on: last segment of the first
    /// `instance_data_dir` found in the backend list
    pub fn dataset_reference(&self) -> Result<Option<DatasetRef>> {
        let Some(document) = self.get(DocumentKind::MultiDataBackend) else {
            return Ok(None);
        };
        let value = document.parse()?;

        let dataset = value
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|backend| backend.get("instance_data_dir"))
            .filter_map(Value::as_str)
            .find_map(DatasetRef::from_instance_data_dir);
        Ok(dataset)
    }
}
