//! Naming grammar for configuration directories
//!
//! A configuration directory is named `<token>-<version>`. The token is the
//! subject being trained, the version distinguishes iterations of it. Cache
//! directories are derived from the token and the dataset name, both passed
//! through [`sanitize`] so every file that mentions a cache path agrees on it.

use crate::{Result, TuneconfError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static NON_PATH_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").unwrap());
static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Normalize a name for use as a cache path segment.
///
/// Lowercases, maps every character outside `[a-z0-9-]` to `-`, then collapses
/// runs of `-`. Applying it twice yields the same string.
pub fn sanitize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let replaced = NON_PATH_CHARS.replace_all(&lowered, "-");
    DASH_RUNS.replace_all(&replaced, "-").into_owned()
}

/// A `<token>-<version>` configuration identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    token: String,
    version: String,
}

impl Identifier {
    /// Build an identifier from caller-supplied parts.
    ///
    /// The token may not contain `-` (it would not survive [`Identifier::parse`]);
    /// neither part may be empty or contain path separators.
    pub fn new(token: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let version = version.into();
        let joined = format!("{}-{}", token, version);

        if token.is_empty() || token.contains('-') || !is_dir_safe(&token) {
            return Err(TuneconfError::MalformedName(joined));
        }
        if version.is_empty() || !is_dir_safe(&version) {
            return Err(TuneconfError::MalformedName(joined));
        }

        Ok(Self { token, version })
    }

    /// Split a folder name on its first `-`. The remainder is kept verbatim as
    /// the version, including any further dashes.
    pub fn parse(folder_name: &str) -> Result<Self> {
        let (token, version) = folder_name
            .split_once('-')
            .ok_or_else(|| TuneconfError::MalformedName(folder_name.to_string()))?;
        Self::new(token, version)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Same token, different version
    pub fn with_version(&self, version: impl Into<String>) -> Result<Self> {
        Self::new(self.token.clone(), version)
    }

    /// Directory name for this identifier
    pub fn dir_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.token, self.version)
    }
}

impl FromStr for Identifier {
    type Err = TuneconfError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_dir_safe(part: &str) -> bool {
    part != "."
        && part != ".."
        && !part
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
}

/// A dataset directory under the dataset catalog root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub name: String,
}

impl DatasetRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Value written to `instance_data_dir` of image backends
    pub fn instance_data_dir(&self) -> String {
        format!("datasets/{}", self.name)
    }

    /// Recover a dataset from an `instance_data_dir` value by taking its last
    /// path segment
    pub fn from_instance_data_dir(value: &str) -> Option<Self> {
        value
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .map(Self::new)
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Cache directories derived from a token and a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePaths {
    pub vae_path: String,
    pub text_path: String,
}

impl CachePaths {
    /// VAE cache directory for one resolution backend
    pub fn vae_dir_for(&self, backend_id: &str) -> String {
        format!("{}/{}", self.vae_path, backend_id)
    }
}

/// Derive the cache paths for `identifier` trained on `dataset_name`. Pure.
pub fn derive(identifier: &Identifier, dataset_name: &str) -> CachePaths {
    derive_for_token(identifier.token(), dataset_name)
}

pub(crate) fn derive_for_token(token: &str, dataset_name: &str) -> CachePaths {
    let stem = format!("{}-{}", sanitize(token), sanitize(dataset_name));
    CachePaths {
        vae_path: format!("cache/vae/{}", stem),
        text_path: format!("cache/text/{}", stem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sanitize_rules() {
        assert_eq!(sanitize("Lulu-15"), "lulu-15");
        assert_eq!(sanitize("my_token"), "my-token");
        assert_eq!(sanitize("a  b__c"), "a-b-c");
        assert_eq!(sanitize("x--y"), "x-y");
        assert_eq!(sanitize("Photo Set (v2)"), "photo-set-v2-");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_sanitize_idempotent() {
        for input in [
            "Lulu-15",
            "my_token",
            "--weird__NAME--",
            "ümlaut ß",
            "İstanbul",
            "a.b.c",
            "",
            "---",
        ] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_parse_splits_on_first_dash() {
        let id = Identifier::parse("lora-03").unwrap();
        assert_eq!(id.token(), "lora");
        assert_eq!(id.version(), "03");

        let id = Identifier::parse("subject-v2-final").unwrap();
        assert_eq!(id.token(), "subject");
        assert_eq!(id.version(), "v2-final");
    }

    #[test]
    fn test_parse_round_trip() {
        for name in ["lora-03", "sdxl_face-10", "tok-v1-rc-2", "a-b", "x-0001"] {
            let id = Identifier::parse(name).unwrap();
            assert_eq!(format!("{}-{}", id.token(), id.version()), name);
            assert_eq!(id.dir_name(), name);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for name in ["lora", "", "-03", "lora-", "../x-1", "tok-a/b"] {
            assert!(
                matches!(Identifier::parse(name), Err(TuneconfError::MalformedName(_))),
                "expected MalformedName for {:?}",
                name
            );
        }
    }

    #[test]
    fn test_new_rejects_dashed_token() {
        assert!(Identifier::new("my-tok", "01").is_err());
        assert!(Identifier::new("my_tok", "01").is_ok());
    }

    #[test]
    fn test_derive_cache_paths() {
        let id = Identifier::new("lora", "04").unwrap();
        let paths = derive(&id, "lulu-15");
        assert_eq!(paths.vae_path, "cache/vae/lora-lulu-15");
        assert_eq!(paths.text_path, "cache/text/lora-lulu-15");
        assert_eq!(paths.vae_dir_for("1024"), "cache/vae/lora-lulu-15/1024");
    }

    #[test]
    fn test_derive_sanitizes_both_segments() {
        let id = Identifier::new("My_Token", "1").unwrap();
        let paths = derive(&id, "Beach Photos");
        assert_eq!(paths.text_path, "cache/text/my-token-beach-photos");
    }

    #[test]
    fn test_dataset_from_instance_data_dir() {
        assert_eq!(
            DatasetRef::from_instance_data_dir("datasets/lulu-15"),
            Some(DatasetRef::new("lulu-15"))
        );
        assert_eq!(
            DatasetRef::from_instance_data_dir("/abs/datasets/lulu-15/"),
            Some(DatasetRef::new("lulu-15"))
        );
        assert_eq!(DatasetRef::from_instance_data_dir(""), None);
    }
}
