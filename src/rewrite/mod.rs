//! Token, version and dataset rewriting for configuration documents
//!
//! Two strategies implement [`RewriteStrategy`]:
//! - [`StructuredStrategy`] parses each document and edits the JSON tree
//! - [`TextualStrategy`] applies ordered pattern substitutions to the raw text
//!
//! The textual strategy gives the same result on conventionally formatted
//! files but is only best effort: multi-line strings or unusual nesting can
//! defeat it. [`RewriteEngine`] uses the structured strategy whenever it is
//! available and records which one ran.

pub mod structured;
pub mod textual;

pub use structured::StructuredStrategy;
pub use textual::TextualStrategy;

use crate::config_set::{ConfigSet, Document, DocumentKind};
use crate::naming::{self, CachePaths, DatasetRef, Identifier};
use crate::{Result, TuneconfError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Backend ids that receive image-resolution treatment by default
pub const DEFAULT_RESOLUTION_IDS: &[&str] = &["1024", "768", "512"];

/// Backend id of the text-embedding cache
pub const TEXT_EMBEDS_ID: &str = "text_embeds";

pub const TOKEN_NAME_PLACEHOLDER: &str = "__TOKEN_NAME__";
pub const TOKEN_NAME_VERSION_PLACEHOLDER: &str = "__TOKEN_NAME_VERSION__";
pub const VERSION_NUMBER_PLACEHOLDER: &str = "__VERSION_NUMBER__";
/// Short placeholder form found in prompt library templates
pub const PROMPT_TOKEN_PLACEHOLDER: &str = "_TOKEN_NAME_";

/// Which strategy the caller asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    /// Structured when available, textual otherwise
    #[default]
    Auto,
    Structured,
    Textual,
}

/// Which strategy actually ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Structured,
    Fallback,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Structured => f.write_str("structured"),
            StrategyKind::Fallback => f.write_str("fallback"),
        }
    }
}

/// Everything a strategy needs to rewrite a document
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteParams {
    /// Identifier of the configuration being copied; `None` for templates
    pub old_identifier: Option<Identifier>,
    pub new_identifier: Identifier,
    pub dataset: DatasetRef,
    pub cache_paths: CachePaths,
    pub resolution_ids: Vec<String>,
}

impl RewriteParams {
    pub fn new(new_identifier: Identifier, dataset: DatasetRef) -> Self {
        let cache_paths = naming::derive(&new_identifier, &dataset.name);
        Self {
            old_identifier: None,
            new_identifier,
            dataset,
            cache_paths,
            resolution_ids: DEFAULT_RESOLUTION_IDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_old_identifier(mut self, old_identifier: Option<Identifier>) -> Self {
        self.old_identifier = old_identifier;
        self
    }

    pub fn with_resolution_ids(mut self, resolution_ids: Vec<String>) -> Self {
        self.resolution_ids = resolution_ids;
        self
    }

    pub fn old_token(&self) -> Option<&str> {
        self.old_identifier.as_ref().map(Identifier::token)
    }

    pub fn new_token(&self) -> &str {
        self.new_identifier.token()
    }

    pub fn new_version(&self) -> &str {
        self.new_identifier.version()
    }

    pub fn is_resolution_id(&self, id: &str) -> bool {
        self.resolution_ids.iter().any(|known| known == id)
    }

    /// Literal substring replacements applied to `config.json` string values,
    /// longest placeholder first
    pub fn config_replacements(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (
                TOKEN_NAME_VERSION_PLACEHOLDER.to_string(),
                self.new_identifier.to_string(),
            ),
            (VERSION_NUMBER_PLACEHOLDER.to_string(), self.new_version().to_string()),
            (TOKEN_NAME_PLACEHOLDER.to_string(), self.new_token().to_string()),
        ];

        if let Some(old) = &self.old_identifier {
            if old != &self.new_identifier {
                pairs.push((old.to_string(), self.new_identifier.to_string()));
                pairs.push((
                    format!("{}/{}", old.token(), old.version()),
                    format!("{}/{}", self.new_token(), self.new_version()),
                ));
            }
        }
        pairs
    }

    /// Placeholder replacements for prompt library keys and values
    pub fn prompt_placeholders(&self) -> Vec<(String, String)> {
        vec![
            (TOKEN_NAME_PLACEHOLDER.to_string(), self.new_token().to_string()),
            (PROMPT_TOKEN_PLACEHOLDER.to_string(), self.new_token().to_string()),
        ]
    }

    /// New name for a prompt library key
    pub fn rewrite_prompt_key(&self, key: &str) -> String {
        let key = replace_literals(key, &self.prompt_placeholders());
        match self.old_token() {
            Some(old) if old != self.new_token() => {
                replace_delimited_segment(&key, old, self.new_token())
            }
            _ => key,
        }
    }
}

/// Result of rewriting one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub document: DocumentKind,
    pub strategy: StrategyKind,
    /// Number of edits made; zero leaves the document byte-for-byte intact
    pub changes: usize,
}

/// A document rewrite strategy
pub trait RewriteStrategy: fmt::Debug {
    fn kind(&self) -> StrategyKind;

    /// Whether this strategy can run in the current build
    fn is_available(&self) -> bool {
        true
    }

    /// Rewrite `document` in memory. Nothing is written to disk.
    fn rewrite(&self, document: &mut Document, params: &RewriteParams) -> Result<RewriteOutcome>;
}

/// Per-document results of rewriting a whole [`ConfigSet`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub rewritten: BTreeMap<DocumentKind, usize>,
    pub skipped: BTreeMap<DocumentKind, String>,
}

/// Runs one strategy over configuration documents
#[derive(Debug)]
pub struct RewriteEngine {
    strategy: Box<dyn RewriteStrategy>,
}

impl RewriteEngine {
    /// Pick a strategy by probing what the build supports
    pub fn select(choice: StrategyChoice) -> Result<Self> {
        let structured = StructuredStrategy;
        let strategy: Box<dyn RewriteStrategy> = match choice {
            StrategyChoice::Auto if structured.is_available() => Box::new(structured),
            StrategyChoice::Auto => {
                warn!("Structured JSON rewriting unavailable, using textual fallback");
                Box::new(TextualStrategy)
            }
            StrategyChoice::Structured if structured.is_available() => Box::new(structured),
            StrategyChoice::Structured => {
                return Err(TuneconfError::Config(
                    "structured strategy requested but not available in this build".into(),
                ))
            }
            StrategyChoice::Textual => Box::new(TextualStrategy),
        };
        debug!(strategy = %strategy.kind(), "Selected rewrite strategy");
        Ok(Self { strategy })
    }

    pub fn with_strategy(strategy: Box<dyn RewriteStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn rewrite_document(
        &self,
        document: &mut Document,
        params: &RewriteParams,
    ) -> Result<RewriteOutcome> {
        self.strategy.rewrite(document, params)
    }

    /// Rewrite every document in `set`. A document that fails is left exactly
    /// as loaded and listed in [`RewriteSummary::skipped`].
    pub fn rewrite_set(&self, set: &mut ConfigSet, params: &RewriteParams) -> RewriteSummary {
        let mut summary = RewriteSummary::default();
        for (kind, reason) in set.load_failures() {
            summary.skipped.insert(*kind, reason.clone());
        }

        for document in set.documents_mut() {
            let kind = document.kind();
            let snapshot = document.clone();
            match self.rewrite_document(document, params) {
                Ok(outcome) => {
                    info!(
                        document = %kind,
                        strategy = %outcome.strategy,
                        changes = outcome.changes,
                        "Rewrote document"
                    );
                    summary.rewritten.insert(kind, outcome.changes);
                }
                Err(e) => {
                    warn!(document = %kind, "Skipping document: {}", e);
                    *document = snapshot;
                    summary.skipped.insert(kind, e.to_string());
                }
            }
        }
        summary
    }
}

/// Apply literal replacements in order
pub(crate) fn replace_literals(input: &str, pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .fold(input.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}

/// Replace `needle` where it forms a whole `_`-delimited segment of `input`
pub(crate) fn replace_delimited_segment(input: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for (start, _) in input.match_indices(needle) {
        let end = start + needle.len();
        let left_ok = start == 0 || input[..start].ends_with('_');
        let right_ok = end == input.len() || input[end..].starts_with('_');
        if left_ok && right_ok {
            out.push_str(&input[last..start]);
            out.push_str(replacement);
            last = end;
        }
    }
    out.push_str(&input[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(old: Option<&str>, new: &str) -> RewriteParams {
        RewriteParams::new(Identifier::parse(new).unwrap(), DatasetRef::new("lulu-15"))
            .with_old_identifier(old.map(|o| Identifier::parse(o).unwrap()))
    }

    #[test]
    fn test_delimited_segment_replacement() {
        assert_eq!(replace_delimited_segment("greeting_oldtok", "oldtok", "newtok"), "greeting_newtok");
        assert_eq!(replace_delimited_segment("oldtok", "oldtok", "newtok"), "newtok");
        assert_eq!(replace_delimited_segment("oldtok_a_oldtok", "oldtok", "n"), "n_a_n");
        assert_eq!(replace_delimited_segment("myoldtok_x", "oldtok", "n"), "myoldtok_x");
        assert_eq!(replace_delimited_segment("oldtoken", "oldtok", "n"), "oldtoken");
        assert_eq!(replace_delimited_segment("a-oldtok", "oldtok", "n"), "a-oldtok");
    }

    #[test]
    fn test_prompt_key_rewrite() {
        let p = params(Some("oldtok-01"), "newtok-02");
        assert_eq!(p.rewrite_prompt_key("greeting_oldtok"), "greeting_newtok");
        assert_eq!(p.rewrite_prompt_key("unrelated"), "unrelated");

        let template = params(None, "lulu-01");
        assert_eq!(template.rewrite_prompt_key("portrait__TOKEN_NAME__"), "portraitlulu");
        assert_eq!(template.rewrite_prompt_key("portrait_TOKEN_NAME_x"), "portraitlulux");
    }

    #[test]
    fn test_config_replacements_template() {
        let p = params(None, "lulu-04");
        let out = replace_literals(
            "output/__TOKEN_NAME__/__VERSION_NUMBER__/__TOKEN_NAME_VERSION__",
            &p.config_replacements(),
        );
        assert_eq!(out, "output/lulu/04/lulu-04");
    }

    #[test]
    fn test_config_replacements_existing_folder() {
        let p = params(Some("lora-03"), "lora-04");
        let out = replace_literals(
            "output/lora/03/models/lora-03.safetensors",
            &p.config_replacements(),
        );
        assert_eq!(out, "output/lora/04/models/lora-04.safetensors");
    }

    #[test]
    fn test_resolution_ids() {
        let p = params(None, "lulu-01");
        assert!(p.is_resolution_id("1024"));
        assert!(p.is_resolution_id("512"));
        assert!(!p.is_resolution_id("2048"));
        assert!(!p.is_resolution_id("text_embeds"));
    }

    #[test]
    fn test_select_textual() {
        let engine = RewriteEngine::select(StrategyChoice::Textual).unwrap();
        assert_eq!(engine.strategy_kind(), StrategyKind::Fallback);
    }

    #[cfg(feature = "structured")]
    #[test]
    fn test_select_auto_prefers_structured() {
        let engine = RewriteEngine::select(StrategyChoice::Auto).unwrap();
        assert_eq!(engine.strategy_kind(), StrategyKind::Structured);
    }

    #[cfg(feature = "structured")]
    #[test]
    fn test_rewrite_set_skips_unparseable_document() {
        let mut set = ConfigSet::default();
        set.insert(Document::from_text(DocumentKind::Config, "config.json", "{ not json"));
        set.insert(Document::from_text(
            DocumentKind::PromptLibrary,
            "user_prompt_library.json",
            r#"{"a_oldtok": "hi"}"#,
        ));

        let engine = RewriteEngine::select(StrategyChoice::Structured).unwrap();
        let summary = engine.rewrite_set(&mut set, &params(Some("oldtok-1"), "newtok-2"));

        assert!(summary.skipped.contains_key(&DocumentKind::Config));
        assert_eq!(summary.rewritten.get(&DocumentKind::PromptLibrary), Some(&1));

        let config = set.get(DocumentKind::Config).unwrap();
        assert_eq!(config.text(), "{ not json");
        assert!(!config.is_modified());
    }
}
