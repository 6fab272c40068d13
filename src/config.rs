//! Process-wide defaults with environment overrides

use std::collections::HashSet;
use std::str::FromStr;

use crate::binary::DEFAULT_SAMPLE_BYTES;
use crate::error::{ContextError, Result};
use crate::tokens::HeuristicEstimator;
use crate::walker::{FilterOptions, normalize_extension};

const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    ".idea",
    ".vscode",
    ".next",
    "coverage",
];

const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".webp", ".pdf", ".zip", ".tar", ".gz",
    ".tgz", ".7z", ".rar", ".exe", ".dll", ".so", ".dylib", ".o", ".a", ".class", ".jar",
    ".pyc", ".wasm", ".mp3", ".mp4", ".mov", ".woff", ".woff2", ".ttf", ".otf",
];

const DEFAULT_FORCE_TEXT_EXTENSIONS: &[&str] = &[".svg", ".ipynb"];

const DEFAULT_EXCLUDED_FILE_NAMES: &[&str] = &[
    ".DS_Store",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
];

/// Configuration injected into [`crate::ContextAssembler`]
#[derive(Debug, Clone)]
pub struct Config {
    /// Token ceiling for one assembled context
    pub token_ceiling: usize,
    pub max_files: usize,
    pub max_depth: usize,
    /// Files larger than this are skipped with a warning
    pub max_file_bytes: u64,
    pub binary_sample_bytes: usize,
    pub excluded_directory_names: HashSet<String>,
    pub excluded_extensions: HashSet<String>,
    pub force_text_extensions: HashSet<String>,
    pub excluded_file_names: HashSet<String>,
    pub chars_per_token: f64,
    pub safety_buffer: f64,
    /// Prefix file bodies with 1-based line numbers
    pub line_numbers: bool,
    pub respect_gitignore: bool,
}

impl Default for Config {
    fn default() -> Self {
        let estimator = HeuristicEstimator::default();
        Self {
            token_ceiling: 100_000,
            max_files: 500,
            max_depth: 10,
            max_file_bytes: 128 * 1024,
            binary_sample_bytes: DEFAULT_SAMPLE_BYTES,
            excluded_directory_names: to_set(DEFAULT_EXCLUDED_DIRS, str::to_string),
            excluded_extensions: to_set(DEFAULT_EXCLUDED_EXTENSIONS, normalize_extension),
            force_text_extensions: to_set(DEFAULT_FORCE_TEXT_EXTENSIONS, normalize_extension),
            excluded_file_names: to_set(DEFAULT_EXCLUDED_FILE_NAMES, str::to_string),
            chars_per_token: estimator.chars_per_token,
            safety_buffer: estimator.safety_buffer,
            line_numbers: false,
            respect_gitignore: false,
        }
    }
}

fn to_set(items: &[&str], f: impl Fn(&str) -> String) -> HashSet<String> {
    items.iter().map(|s| f(*s)).collect()
}

impl Config {
    /// Defaults overlaid with `CONTEXT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// Unset or blank variables keep their defaults. Comma lists replace the
    /// default set rather than extending it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CONTEXT_TOKEN_CEILING") {
            config.token_ceiling = parse_var("CONTEXT_TOKEN_CEILING", &v)?;
        }
        if let Some(v) = get("CONTEXT_MAX_FILES") {
            config.max_files = parse_var("CONTEXT_MAX_FILES", &v)?;
        }
        if let Some(v) = get("CONTEXT_MAX_DEPTH") {
            config.max_depth = parse_var("CONTEXT_MAX_DEPTH", &v)?;
        }
        if let Some(v) = get("CONTEXT_MAX_FILE_BYTES") {
            config.max_file_bytes = parse_var("CONTEXT_MAX_FILE_BYTES", &v)?;
        }
        if let Some(v) = get("CONTEXT_CHARS_PER_TOKEN") {
            config.chars_per_token = parse_var("CONTEXT_CHARS_PER_TOKEN", &v)?;
        }
        if let Some(v) = get("CONTEXT_SAFETY_BUFFER") {
            config.safety_buffer = parse_var("CONTEXT_SAFETY_BUFFER", &v)?;
        }
        if let Some(v) = get("CONTEXT_LINE_NUMBERS") {
            config.line_numbers = parse_bool("CONTEXT_LINE_NUMBERS", &v)?;
        }
        if let Some(v) = get("CONTEXT_RESPECT_GITIGNORE") {
            config.respect_gitignore = parse_bool("CONTEXT_RESPECT_GITIGNORE", &v)?;
        }
        if let Some(v) = get("CONTEXT_EXCLUDE_DIRS") {
            config.excluded_directory_names = split_list(&v).map(str::to_string).collect();
        }
        if let Some(v) = get("CONTEXT_EXCLUDE_EXTENSIONS") {
            config.excluded_extensions = split_list(&v).map(normalize_extension).collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every assembly empty or meaningless
    pub fn validate(&self) -> Result<()> {
        if self.token_ceiling == 0 {
            return Err(ContextError::Config("token_ceiling must be greater than 0".into()));
        }
        if self.max_files == 0 {
            return Err(ContextError::Config("max_files must be greater than 0".into()));
        }
        if !(self.chars_per_token.is_finite() && self.chars_per_token > 0.0) {
            return Err(ContextError::Config(
                "chars_per_token must be a finite positive number".into(),
            ));
        }
        if !(self.safety_buffer.is_finite() && self.safety_buffer >= 1.0) {
            return Err(ContextError::Config(
                "safety_buffer must be at least 1.0 so estimates never undercount".into(),
            ));
        }
        Ok(())
    }

    /// Filter options seeded from this configuration
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            excluded_directory_names: self.excluded_directory_names.clone(),
            excluded_extensions: self.excluded_extensions.clone(),
            force_text_extensions: self.force_text_extensions.clone(),
            excluded_file_names: self.excluded_file_names.clone(),
            max_files: self.max_files,
            max_depth: self.max_depth,
            max_file_bytes: self.max_file_bytes,
            binary_sample_bytes: self.binary_sample_bytes,
            respect_gitignore: self.respect_gitignore,
        }
    }

    pub fn estimator(&self) -> HeuristicEstimator {
        HeuristicEstimator::new(self.chars_per_token, self.safety_buffer)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ContextError::Config(format!("{} has invalid value '{}': {}", key, value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ContextError::Config(format!(
            "{} has invalid value '{}': expected true or false",
            key, value
        ))),
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
