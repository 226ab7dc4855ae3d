//! Recursive copy of a configuration tree

use crate::config::settings::DEFAULT_COPY_EXCLUDE;
use crate::{Result, TuneconfError};
use glob::Pattern;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File name globs excluded from a copy
#[derive(Debug, Clone)]
pub struct CopyFilter {
    patterns: Vec<Pattern>,
}

impl CopyFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| {
                    TuneconfError::Config(format!("Invalid copy_exclude pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Filter that copies everything
    pub fn none() -> Self {
        Self { patterns: Vec::new() }
    }

    pub fn is_excluded(&self, file_name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(file_name))
    }
}

/// Excludes editor, notebook and OS droppings
impl Default for CopyFilter {
    fn default() -> Self {
        let patterns = DEFAULT_COPY_EXCLUDE
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        Self { patterns }
    }
}

/// What a copy did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub dirs: usize,
    pub excluded: usize,
}

/// Copy `source` into a new directory `destination`.
///
/// The destination is created here and must not exist. Any failure after it
/// has been created is reported as `CopyIncomplete` and the partial tree is
/// left in place.
pub fn copy_tree(source: &Path, destination: &Path, filter: &CopyFilter) -> Result<CopyStats> {
    fs::create_dir(destination).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => TuneconfError::DestinationExists(destination.to_path_buf()),
        _ => incomplete(destination, format!("cannot create destination: {}", e)),
    })?;

    let mut stats = CopyStats::default();
    let mut walker = WalkDir::new(source).min_depth(1).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| incomplete(destination, e))?;
        let name = entry.file_name().to_string_lossy();

        if filter.is_excluded(&name) {
            debug!("Excluding {}", entry.path().display());
            stats.excluded += 1;
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| incomplete(destination, e))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| incomplete(destination, e))?;
            stats.dirs += 1;
        } else if entry.file_type().is_file() || entry.path().is_file() {
            // Symlinked files are copied as regular files
            fs::copy(entry.path(), &target).map_err(|e| {
                incomplete(destination, format!("{}: {}", entry.path().display(), e))
            })?;
            stats.files += 1;
        } else {
            warn!("Skipping {} (not a regular file)", entry.path().display());
            stats.excluded += 1;
        }
    }

    debug!(
        files = stats.files,
        dirs = stats.dirs,
        excluded = stats.excluded,
        "Copied {} to {}",
        source.display(),
        destination.display()
    );
    Ok(stats)
}

fn incomplete(destination: &Path, reason: impl ToString) -> TuneconfError {
    TuneconfError::CopyIncomplete {
        destination: destination.to_path_buf(),
        reason: reason.to_string(),
    }
}
