//! Pattern-substitution rewriting over raw document text
//!
//! Assumes the conventional layout of these files: one backend object per
//! `{ ... }` without nested objects, and single-line string values. Inputs
//! outside that shape may come out wrong.
//!
//! Dataset paths are replaced wherever they occur. Cache paths are only
//! rewritten inside the backend object they belong to, and only fields that
//! already exist are rewritten, except `cache_dir` on the text-embeds backend.

use super::{
    replace_literals, RewriteOutcome, RewriteParams, RewriteStrategy, StrategyKind,
    TEXT_EMBEDS_ID,
};
use crate::config_set::{Document, DocumentKind};
use crate::Result;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::ops::Range;
use tracing::warn;

/// Body of a JSON string literal, escapes included
const STR_BODY: &str = r#"(?:[^"\\]|\\.)*"#;

static DATASET_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r#""datasets/{}""#, STR_BODY)).unwrap());
static ID_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#""id"\s*:\s*(?:"({})"|(-?[0-9]+(?:\.[0-9]+)?))"#, STR_BODY)).unwrap()
});
static VAE_CACHE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r#"("cache_dir_vae"\s*:\s*)"{}""#, STR_BODY)).unwrap());
static TEXT_EMBEDS_ID_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#""id"\s*:\s*"{}""#, regex::escape(TEXT_EMBEDS_ID))).unwrap()
});
static CACHE_DIR_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r#"("cache_dir"\s*:\s*)"{}""#, STR_BODY)).unwrap());
static STALE_FIELDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"\s*"(?:instance_data_dir|cache_dir_vae)"\s*:\s*"{}"[ \t]*,?"#,
        STR_BODY
    ))
    .unwrap()
});
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*)\}").unwrap());
static STRING_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r#""({})"(\s*:)?"#, STR_BODY)).unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct TextualStrategy;

impl RewriteStrategy for TextualStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fallback
    }

    fn rewrite(&self, document: &mut Document, params: &RewriteParams) -> Result<RewriteOutcome> {
        let (text, changes) = match document.kind() {
            DocumentKind::Config => rewrite_config_text(document.text(), params),
            DocumentKind::MultiDataBackend => rewrite_backend_text(document.text(), params),
            DocumentKind::PromptLibrary => rewrite_prompt_text(document.text(), params),
        };

        if changes > 0 {
            document.replace_text(text);
        }

        Ok(RewriteOutcome {
            document: document.kind(),
            strategy: StrategyKind::Fallback,
            changes,
        })
    }
}

/// Escape `s` for use inside a JSON string literal
fn escape_json(s: &str) -> String {
    let quoted = serde_json::Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

pub fn rewrite_config_text(text: &str, params: &RewriteParams) -> (String, usize) {
    let mut out = text.to_string();
    let mut changes = 0;
    for (from, to) in params.config_replacements() {
        let (from, to) = (escape_json(&from), escape_json(&to));
        let hits = out.matches(from.as_str()).count();
        if hits > 0 {
            out = out.replace(from.as_str(), &to);
            changes += hits;
        }
    }
    (out, changes)
}

pub fn rewrite_backend_text(text: &str, params: &RewriteParams) -> (String, usize) {
    let dataset_value = format!("\"{}\"", escape_json(&params.dataset.instance_data_dir()));
    let text_value = format!("\"{}\"", escape_json(&params.cache_paths.text_path));
    let mut changes = 0;

    let mut out = replace_counting(&DATASET_VALUE, text, &mut changes, |_| dataset_value.clone());

    // Resolution backends: the VAE cache ends in the backend's own id
    let resolution_spans: Vec<(Range<usize>, String)> = ID_FIELD
        .captures_iter(&out)
        .filter_map(|caps| {
            let id = caps.get(1).or_else(|| caps.get(2))?.as_str();
            if !params.is_resolution_id(id) {
                return None;
            }
            let span = enclosing_object(&out, caps.get(0)?.range())?;
            Some((span, id.to_string()))
        })
        .collect();
    for (span, id) in resolution_spans.into_iter().rev() {
        let vae_value = format!("\"{}\"", escape_json(&params.cache_paths.vae_dir_for(&id)));
        let original = &out[span.clone()];
        let rewritten = VAE_CACHE_FIELD
            .replace_all(original, |caps: &Captures| format!("{}{}", &caps[1], vae_value))
            .into_owned();
        if rewritten != original {
            changes += 1;
            out.replace_range(span, &rewritten);
        }
    }

    // Work back to front so earlier spans stay valid
    let spans: Vec<Range<usize>> = TEXT_EMBEDS_ID_FIELD
        .find_iter(&out)
        .filter_map(|m| enclosing_object(&out, m.range()))
        .collect();
    for span in spans.into_iter().rev() {
        let original = &out[span.clone()];
        let rewritten = rewrite_text_embeds_span(original, &text_value);
        if rewritten != original {
            changes += 1;
            out.replace_range(span, &rewritten);
        }
    }

    (out, changes)
}

/// Byte range of the `{ ... }` around `inner`, assuming no nested objects
fn enclosing_object(text: &str, inner: Range<usize>) -> Option<Range<usize>> {
    let start = text[..inner.start].rfind('{')?;
    let end = inner.end + text[inner.end..].find('}')? + 1;
    Some(start..end)
}

fn rewrite_text_embeds_span(span: &str, text_value: &str) -> String {
    let without_stale = STALE_FIELDS.replace_all(span, "");
    let tidy = TRAILING_COMMA.replace_all(&without_stale, "$1}");

    if CACHE_DIR_FIELD.is_match(&tidy) {
        return CACHE_DIR_FIELD
            .replace_all(&tidy, |caps: &Captures| format!("{}{}", &caps[1], text_value))
            .into_owned();
    }

    // No cache_dir yet: add it right after the id field
    let indent = field_indent(&tidy);
    TEXT_EMBEDS_ID_FIELD
        .replace(&tidy, |caps: &Captures| {
            format!("{},\n{}\"cache_dir\": {}", &caps[0], indent, text_value)
        })
        .into_owned()
}

/// Leading whitespace of the line holding the id field
fn field_indent(span: &str) -> String {
    TEXT_EMBEDS_ID_FIELD
        .find(span)
        .map(|m| {
            let line_start = span[..m.start()].rfind('\n').map_or(0, |i| i + 1);
            span[line_start..m.start()]
                .chars()
                .take_while(|c| c.is_whitespace())
                .collect()
        })
        .unwrap_or_default()
}

pub fn rewrite_prompt_text(text: &str, params: &RewriteParams) -> (String, usize) {
    let placeholders: Vec<(String, String)> = params
        .prompt_placeholders()
        .into_iter()
        .map(|(from, to)| (escape_json(&from), escape_json(&to)))
        .collect();
    let existing_keys: HashSet<String> = STRING_TOKEN
        .captures_iter(text)
        .filter(|caps| caps.get(2).is_some())
        .map(|caps| caps[1].to_string())
        .collect();
    let mut renamed_keys = HashSet::new();
    let mut changes = 0;

    let out = STRING_TOKEN.replace_all(text, |caps: &Captures| {
        let body = &caps[1];
        let rewritten = match caps.get(2) {
            Some(_) => {
                let key = escape_rewritten_key(body, params);
                if key != body
                    && (existing_keys.contains(&key) || !renamed_keys.insert(key.clone()))
                {
                    warn!("Keeping prompt '{}': '{}' already exists", body, key);
                    body.to_string()
                } else {
                    key
                }
            }
            None => replace_literals(body, &placeholders),
        };
        if rewritten != body {
            changes += 1;
        }
        let colon = caps.get(2).map_or("", |m| m.as_str());
        format!("\"{}\"{}", rewritten, colon)
    });

    (out.into_owned(), changes)
}

fn escape_rewritten_key(raw_key: &str, params: &RewriteParams) -> String {
    let rewritten = params.rewrite_prompt_key(raw_key);
    if rewritten == raw_key {
        return rewritten;
    }
    // Keys are edited in their escaped form; only the substituted token needs escaping
    match serde_json::from_str::<String>(&format!("\"{}\"", rewritten)) {
        Ok(_) => rewritten,
        Err(_) => escape_json(&rewritten),
    }
}

fn replace_counting<F>(re: &Regex, text: &str, changes: &mut usize, mut rep: F) -> String
where
    F: FnMut(&Captures) -> String,
{
    re.replace_all(text, |caps: &Captures| {
        let replacement = rep(caps);
        if replacement != caps[0] {
            *changes += 1;
        }
        replacement
    })
    .into_owned()
}
