//! JSON-tree rewriting

use super::{
    replace_literals, RewriteOutcome, RewriteParams, RewriteStrategy, StrategyKind,
    TEXT_EMBEDS_ID,
};
use crate::config_set::{Document, DocumentKind};
use crate::{Result, TuneconfError};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

const INSTANCE_DATA_DIR: &str = "instance_data_dir";
const CACHE_DIR_VAE: &str = "cache_dir_vae";
const CACHE_DIR: &str = "cache_dir";

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredStrategy;

impl RewriteStrategy for StructuredStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structured
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "structured")
    }

    fn rewrite(&self, document: &mut Document, params: &RewriteParams) -> Result<RewriteOutcome> {
        let mut value = document.parse()?;

        let changes = match document.kind() {
            DocumentKind::Config => rewrite_config(&mut value, params),
            DocumentKind::MultiDataBackend => rewrite_backends(&mut value, params),
            DocumentKind::PromptLibrary => rewrite_prompt_library(&mut value, params)?,
        };

        if changes > 0 {
            document.replace_json(&value)?;
        }

        Ok(RewriteOutcome {
            document: document.kind(),
            strategy: StrategyKind::Structured,
            changes,
        })
    }
}

/// Substitute placeholders and old identifiers inside every string value
pub fn rewrite_config(value: &mut Value, params: &RewriteParams) -> usize {
    let replacements = params.config_replacements();
    replace_in_strings(value, &replacements)
}

fn replace_in_strings(value: &mut Value, replacements: &[(String, String)]) -> usize {
    match value {
        Value::String(s) => {
            let replaced = replace_literals(s, replacements);
            if replaced != *s {
                trace!("{:?} -> {:?}", s, replaced);
                *s = replaced;
                1
            } else {
                0
            }
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|item| replace_in_strings(item, replacements))
            .sum(),
        Value::Object(map) => map
            .values_mut()
            .map(|item| replace_in_strings(item, replacements))
            .sum(),
        _ => 0,
    }
}

/// Point every backend object at the new dataset and cache directories.
///
/// Objects are classified by `id`; unknown ids are left alone.
pub fn rewrite_backends(value: &mut Value, params: &RewriteParams) -> usize {
    match value {
        Value::Object(map) => {
            let mut changes = match backend_id(map) {
                Some(id) if id == TEXT_EMBEDS_ID => rewrite_text_embeds(map, params),
                Some(id) if params.is_resolution_id(&id) => {
                    rewrite_resolution_backend(map, &id, params)
                }
                Some(id) => {
                    debug!("Leaving backend '{}' untouched", id);
                    0
                }
                None => 0,
            };
            for child in map.values_mut() {
                changes += rewrite_backends(child, params);
            }
            changes
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|item| rewrite_backends(item, params))
            .sum(),
        _ => 0,
    }
}

/// Backend `id` as a string; numeric ids use their decimal form
fn backend_id(map: &Map<String, Value>) -> Option<String> {
    match map.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn rewrite_text_embeds(map: &mut Map<String, Value>, params: &RewriteParams) -> usize {
    let mut changes = set_string(map, CACHE_DIR, &params.cache_paths.text_path);
    for field in [INSTANCE_DATA_DIR, CACHE_DIR_VAE] {
        if map.shift_remove(field).is_some() {
            changes += 1;
        }
    }
    changes
}

fn rewrite_resolution_backend(
    map: &mut Map<String, Value>,
    id: &str,
    params: &RewriteParams,
) -> usize {
    set_string(map, INSTANCE_DATA_DIR, &params.dataset.instance_data_dir())
        + set_string(map, CACHE_DIR_VAE, &params.cache_paths.vae_dir_for(id))
}

fn set_string(map: &mut Map<String, Value>, field: &str, new_value: &str) -> usize {
    match map.get(field) {
        Some(Value::String(current)) if current == new_value => 0,
        _ => {
            map.insert(field.to_string(), Value::String(new_value.to_string()));
            1
        }
    }
}

/// Rename token-bearing prompt keys; values only get placeholder substitution
pub fn rewrite_prompt_library(value: &mut Value, params: &RewriteParams) -> Result<usize> {
    let Value::Object(map) = value else {
        return Err(TuneconfError::Parse {
            document: DocumentKind::PromptLibrary.file_name().to_string(),
            reason: "expected an object mapping prompt names to prompts".to_string(),
        });
    };

    let placeholders = params.prompt_placeholders();
    let existing_keys: HashSet<String> = map.keys().cloned().collect();
    let mut changes = 0;
    let mut renamed = Map::with_capacity(map.len());

    for (key, mut prompt) in std::mem::take(map) {
        let mut new_key = params.rewrite_prompt_key(&key);
        if new_key != key && (existing_keys.contains(&new_key) || renamed.contains_key(&new_key)) {
            warn!("Keeping prompt '{}': '{}' already exists", key, new_key);
            new_key = key.clone();
        }
        if new_key != key {
            changes += 1;
        }
        if let Value::String(text) = &mut prompt {
            let replaced = replace_literals(text, &placeholders);
            if replaced != *text {
                *text = replaced;
                changes += 1;
            }
        }
        renamed.insert(new_key, prompt);
    }

    *map = renamed;
    Ok(changes)
}
