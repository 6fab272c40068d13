//! Directory traversal producing file candidates

use chrono::{DateTime, Utc};
use ignore::gitignore::Gitignore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::binary;
use crate::error::{ContextError, Result};
use crate::gitignore;
use crate::pattern::PatternFilter;

/// A file that survived directory, name, extension, size and binary filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCandidate {
    pub absolute_path: PathBuf,
    /// Path relative to the walk root, always `/`-separated
    pub relative_path: String,
    pub size_bytes: u64,
    pub modified_time: DateTime<Utc>,
}

/// Per-call filtering options
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub excluded_directory_names: HashSet<String>,
    /// Lowercase, with a leading dot
    pub excluded_extensions: HashSet<String>,
    /// Bypass both the extension exclusion and binary detection
    pub force_text_extensions: HashSet<String>,
    pub excluded_file_names: HashSet<String>,
    pub max_files: usize,
    pub max_depth: usize,
    pub max_file_bytes: u64,
    pub binary_sample_bytes: usize,
    /// Skip paths matched by the root `.gitignore`
    pub respect_gitignore: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        crate::config::Config::default().filter_options()
    }
}

impl FilterOptions {
    pub fn with_includes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excluded_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn is_excluded_extension(&self, extension: &str) -> bool {
        self.excluded_extensions.contains(extension)
    }

    fn is_forced_text(&self, extension: &str) -> bool {
        self.force_text_extensions.contains(extension)
    }
}

/// Normalize an extension to lowercase with a leading dot
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().trim_start_matches('.');
    format!(".{}", trimmed.to_lowercase())
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
}

/// Candidates from one walk, plus whether `max_files` cut it short
#[derive(Debug, Clone)]
pub struct Discovery {
    pub candidates: Vec<FileCandidate>,
    /// True only when the walk stopped with entries still unvisited
    pub truncated: bool,
}

/// Walk `root` and return the surviving files, newest first.
///
/// Patterns are compiled and the root is checked before any traversal.
/// Unreadable directories and files are logged and skipped.
pub async fn discover(root: &Path, options: &FilterOptions) -> Result<Vec<FileCandidate>> {
    Ok(walk(root, options).await?.candidates)
}

/// Like [`discover`], also reporting whether the file cap was hit.
pub async fn walk(root: &Path, options: &FilterOptions) -> Result<Discovery> {
    let filter = PatternFilter::new(&options.include_patterns, &options.exclude_patterns)?;
    let root = resolve_root(root).await?;

    let gitignore = if options.respect_gitignore {
        gitignore::load(&root).await
    } else {
        None
    };

    let mut walker = Walker {
        root: &root,
        options,
        filter: &filter,
        gitignore: gitignore.as_ref(),
        visited: HashSet::new(),
        candidates: Vec::new(),
        truncated: false,
    };
    walker.run().await;

    let truncated = walker.truncated;
    let mut candidates = walker.candidates;
    sort_candidates(&mut candidates);

    info!(
        "Discovered {} files under {}{}",
        candidates.len(),
        root.display(),
        if truncated { " (truncated at max_files)" } else { "" }
    );
    Ok(Discovery {
        candidates,
        truncated,
    })
}

/// Order by modification time (newest first), then relative path
pub fn sort_candidates(candidates: &mut [FileCandidate]) {
    candidates.sort_by(|a, b| {
        b.modified_time
            .cmp(&a.modified_time)
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });
}

async fn resolve_root(root: &Path) -> Result<PathBuf> {
    let invalid = |reason: String| ContextError::InvalidRoot {
        path: root.display().to_string(),
        reason,
    };

    let canonical = fs::canonicalize(root)
        .await
        .map_err(|e| invalid(e.to_string()))?;
    let metadata = fs::metadata(&canonical)
        .await
        .map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    Ok(canonical)
}

struct Walker<'a> {
    root: &'a Path,
    options: &'a FilterOptions,
    filter: &'a PatternFilter,
    gitignore: Option<&'a Gitignore>,
    visited: HashSet<PathBuf>,
    candidates: Vec<FileCandidate>,
    truncated: bool,
}

impl Walker<'_> {
    fn is_full(&self) -> bool {
        self.candidates.len() >= self.options.max_files
    }

    async fn run(&mut self) {
        let mut stack: Vec<(PathBuf, usize)> = vec![(self.root.to_path_buf(), 0)];

        while let Some((dir, depth)) = stack.pop() {
            if self.is_full() {
                debug!("Reached max_files ({}), stopping walk", self.options.max_files);
                self.truncated = true;
                break;
            }

            let canonical = match fs::canonicalize(&dir).await {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping directory {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !self.visited.insert(canonical) {
                debug!("Already visited {}, skipping", dir.display());
                continue;
            }

            let subdirs = self.scan_directory(&dir, depth).await;

            // Reverse so the first subdirectory by name is walked first
            for subdir in subdirs.into_iter().rev() {
                stack.push((subdir, depth + 1));
            }
        }
    }

    /// Process the files of one directory and return its subdirectories
    /// that should still be walked, in name order.
    async fn scan_directory(&mut self, dir: &Path, depth: usize) -> Vec<PathBuf> {
        let mut read_dir = match fs::read_dir(dir).await {
            Ok(rd) => rd,
            Err(e) => {
                warn!("Cannot read directory {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => entries.push(entry.path()),
                Ok(None) => break,
                Err(e) => {
                    warn!("Error listing {}: {}", dir.display(), e);
                    break;
                }
            }
        }
        entries.sort();

        let mut subdirs = Vec::new();
        for path in entries {
            if self.is_full() {
                self.truncated = true;
                break;
            }

            // Follows symlinks; cycles are caught by the visited set
            let metadata = match fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if metadata.is_dir() {
                if self.options.excluded_directory_names.contains(&name) {
                    debug!("Pruning excluded directory {}", path.display());
                } else if self.is_gitignored(&path, true) {
                    debug!("Pruning gitignored directory {}", path.display());
                } else if depth + 1 > self.options.max_depth {
                    debug!("Not descending into {} (max depth {})", path.display(), self.options.max_depth);
                } else {
                    subdirs.push(path);
                }
            } else if metadata.is_file() {
                if let Some(candidate) = self.consider_file(&path, &name, &metadata).await {
                    self.candidates.push(candidate);
                }
            }
        }
        subdirs
    }

    fn is_gitignored(&self, path: &Path, is_dir: bool) -> bool {
        self.gitignore
            .is_some_and(|g| gitignore::is_ignored(g, path, is_dir))
    }

    async fn consider_file(
        &self,
        path: &Path,
        name: &str,
        metadata: &std::fs::Metadata,
    ) -> Option<FileCandidate> {
        if self.options.excluded_file_names.contains(name) {
            debug!("Skipping excluded file name {}", path.display());
            return None;
        }

        if self.is_gitignored(path, false) {
            debug!("Skipping gitignored file {}", path.display());
            return None;
        }

        let relative_path = relative_path(self.root, path);
        if !self.filter.matches(&relative_path) {
            debug!("Pattern filter rejected {}", relative_path);
            return None;
        }

        let extension = extension_of(name);
        let forced_text = extension
            .as_deref()
            .is_some_and(|ext| self.options.is_forced_text(ext));

        if !forced_text
            && extension
                .as_deref()
                .is_some_and(|ext| self.options.is_excluded_extension(ext))
        {
            debug!("Skipping excluded extension {}", relative_path);
            return None;
        }

        let size_bytes = metadata.len();
        if size_bytes > self.options.max_file_bytes {
            warn!(
                "Skipping large file {} ({} bytes, limit {})",
                relative_path, size_bytes, self.options.max_file_bytes
            );
            return None;
        }

        if !forced_text && binary::is_binary(path, self.options.binary_sample_bytes).await {
            debug!("Skipping binary file {}", relative_path);
            return None;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Some(FileCandidate {
            absolute_path: path.to_path_buf(),
            relative_path,
            size_bytes,
            modified_time: to_utc(modified),
        })
    }
}

/// Convert without panicking; times chrono cannot represent become the epoch.
fn to_utc(time: SystemTime) -> DateTime<Utc> {
    let converted = match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs())
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, after.subsec_nanos())),
        Err(e) => {
            let before = e.duration();
            i64::try_from(before.as_secs()).ok().and_then(|secs| {
                if before.subsec_nanos() == 0 {
                    DateTime::from_timestamp(-secs, 0)
                } else {
                    DateTime::from_timestamp(-secs - 1, 1_000_000_000 - before.subsec_nanos())
                }
            })
        }
    };
    converted.unwrap_or_default()
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
