//! Context assembly facade used by the bridge tool handlers

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::budget::ContextBudgeter;
use crate::config::Config;
use crate::error::Result;
use crate::format::{AssembledContext, ContextFormatter};
use crate::tokens::TokenEstimator;
use crate::walker::{self, FileCandidate, FilterOptions};

/// JSON summary of a discovery run for a "list files" tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateListing {
    pub root: String,
    pub count: usize,
    /// True when discovery stopped at `max_files`
    pub truncated: bool,
    pub files: Vec<FileCandidate>,
}

impl CandidateListing {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTokenEstimate {
    pub path: String,
    pub tokens: usize,
}

/// Per-file and total cost preview, computed before any LLM call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReport {
    pub files: Vec<FileTokenEstimate>,
    pub total_tokens: usize,
    pub ceiling_tokens: usize,
    pub within_limit: bool,
    pub recommendation: String,
}

impl TokenReport {
    fn new(files: Vec<FileTokenEstimate>, ceiling_tokens: usize) -> Self {
        let total_tokens = files
            .iter()
            .fold(0usize, |total, f| total.saturating_add(f.tokens));
        let within_limit = total_tokens <= ceiling_tokens;
        let recommendation = recommend(total_tokens, ceiling_tokens, files.len());
        Self {
            files,
            total_tokens,
            ceiling_tokens,
            within_limit,
            recommendation,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn recommend(total: usize, ceiling: usize, file_count: usize) -> String {
    if total <= ceiling {
        let percent = if ceiling == 0 {
            0.0
        } else {
            total as f64 * 100.0 / ceiling as f64
        };
        format!(
            "Within limit: {} files use {} of {} tokens ({:.1}%).",
            file_count, total, ceiling, percent
        )
    } else {
        let batches = total.div_ceil(ceiling.max(1));
        format!(
            "Exceeds limit by {} tokens. Split the work into at least {} batches or narrow the include patterns.",
            total - ceiling,
            batches
        )
    }
}

/// Entry point for discovery, cost preview and assembly.
///
/// Built once from an injected [`Config`]; holds no per-call state.
pub struct ContextAssembler {
    config: Config,
    estimator: Arc<dyn TokenEstimator>,
}

impl ContextAssembler {
    /// Validates `config` before accepting it
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let estimator: Arc<dyn TokenEstimator> = Arc::new(config.estimator());
        Ok(Self { config, estimator })
    }

    /// Replace the heuristic with another estimator
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Filter options seeded from the configuration
    pub fn filter_options(&self) -> FilterOptions {
        self.config.filter_options()
    }

    fn budgeter(&self) -> ContextBudgeter {
        ContextBudgeter::new(Arc::clone(&self.estimator)).with_line_numbers(self.config.line_numbers)
    }

    /// Discover files and summarize them
    pub async fn list_files(&self, root: &Path, options: &FilterOptions) -> Result<CandidateListing> {
        let root = expand_home(root);
        let discovery = walker::walk(&root, options).await?;
        Ok(CandidateListing {
            root: root.display().to_string(),
            count: discovery.candidates.len(),
            truncated: discovery.truncated,
            files: discovery.candidates,
        })
    }

    /// Estimate every discovered file without enforcing the ceiling
    pub async fn preview_cost(&self, root: &Path, options: &FilterOptions) -> Result<TokenReport> {
        let root = expand_home(root);
        let candidates = walker::discover(&root, options).await?;
        let budgeter = self.budgeter();

        let mut files = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            match fs::read(&candidate.absolute_path).await {
                Ok(bytes) => files.push(FileTokenEstimate {
                    path: candidate.relative_path.clone(),
                    tokens: budgeter.estimate_body(&String::from_utf8_lossy(&bytes)),
                }),
                Err(e) => warn!("Cannot estimate {}: {}", candidate.relative_path, e),
            }
        }

        let report = TokenReport::new(files, self.config.token_ceiling);
        info!(
            "Preview for {}: {} tokens across {} files (limit {})",
            root.display(),
            report.total_tokens,
            report.files.len(),
            report.ceiling_tokens
        );
        Ok(report)
    }

    /// Discover, budget and collect files into an [`AssembledContext`]
    pub async fn assemble(
        &self,
        root: &Path,
        options: &FilterOptions,
        project_context: Option<&str>,
        task_prompt: &str,
    ) -> Result<AssembledContext> {
        let root = expand_home(root);
        let candidates = walker::discover(&root, options).await?;
        let outcome = self
            .budgeter()
            .assemble(&candidates, self.config.token_ceiling)
            .await;

        Ok(AssembledContext {
            project_context: project_context.map(str::to_string),
            file_sections: outcome.sections,
            task_prompt: task_prompt.to_string(),
            budget: outcome.budget,
            skipped: outcome.skipped,
        })
    }

    /// Produce the final prompt string
    pub fn render(&self, context: &AssembledContext) -> String {
        ContextFormatter.format(
            context.project_context.as_deref(),
            &context.file_sections,
            &context.task_prompt,
        )
    }
}

/// Expand a leading `~` to the user's home directory
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;
    use tempfile::TempDir;

    struct FixedEstimator(usize);

    impl TokenEstimator for FixedEstimator {
        fn estimate_tokens(&self, _text: &str) -> usize {
            self.0
        }
    }

    fn config_with_ceiling(ceiling: usize) -> Config {
        Config {
            token_ceiling: ceiling,
            ..Config::default()
        }
    }

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        std::fs::write(temp_dir.path().join("b.rs"), "fn b() {}\n").unwrap();
        temp_dir
    }

    #[test]
    fn test_assemble_respects_ceiling() {
        let temp_dir = project();
        let assembler = ContextAssembler::new(config_with_ceiling(1000))
            .unwrap()
            .with_estimator(Arc::new(FixedEstimator(600)));
        let options = assembler.filter_options();

        let context = tokio_test::block_on(assembler.assemble(
            temp_dir.path(),
            &options,
            None,
            "Summarize",
        ))
        .unwrap();

        assert_eq!(context.file_sections.len(), 1);
        assert_eq!(context.budget.consumed_tokens, 600);
        assert_eq!(context.skipped.len(), 1);
        assert_ne!(context.skipped[0].path, context.file_sections[0].path);
    }

    #[test]
    fn test_render_assembled_context() {
        let temp_dir = project();
        let assembler = ContextAssembler::new(Config::default()).unwrap();
        let options = assembler.filter_options().with_includes(["a.rs"]);

        let context = tokio_test::block_on(assembler.assemble(
            temp_dir.path(),
            &options,
            Some("Toy crate"),
            "Find bugs",
        ))
        .unwrap();
        let prompt = assembler.render(&context);

        assert!(prompt.starts_with("## Project Context\n\nToy crate"));
        assert!(prompt.contains("### File: a.rs\n```\nfn a() {}\n```"));
        assert!(!prompt.contains("b.rs"));
        assert!(prompt.ends_with("## Task\n\nFind bugs"));
    }

    #[test]
    fn test_preview_cost_reports_overflow() {
        let temp_dir = project();
        let assembler = ContextAssembler::new(config_with_ceiling(1000))
            .unwrap()
            .with_estimator(Arc::new(FixedEstimator(600)));
        let options = assembler.filter_options();

        let report = tokio_test::block_on(assembler.preview_cost(temp_dir.path(), &options)).unwrap();
        assert_eq!(report.total_tokens, 1200);
        assert!(!report.within_limit);
        assert!(report.recommendation.contains("at least 2 batches"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["withinLimit"], serde_json::json!(false));
        assert_eq!(json["files"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_preview_cost_within_limit() {
        let temp_dir = project();
        let assembler = ContextAssembler::new(Config::default()).unwrap();
        let options = assembler.filter_options();

        let report = tokio_test::block_on(assembler.preview_cost(temp_dir.path(), &options)).unwrap();
        // "fn a() {}\n" is 10 chars -> 3 tokens with the default heuristic
        assert_eq!(report.total_tokens, 6);
        assert!(report.within_limit);
        assert!(report.recommendation.starts_with("Within limit"));
    }

    #[test]
    fn test_list_files_summary() {
        let temp_dir = project();
        let assembler = ContextAssembler::new(Config::default()).unwrap();
        let options = assembler.filter_options().with_max_files(1);

        let listing = tokio_test::block_on(assembler.list_files(temp_dir.path(), &options)).unwrap();
        assert_eq!(listing.count, 1);
        assert!(listing.truncated);

        let json = serde_json::to_value(&listing).unwrap();
        let file = &json["files"][0];
        assert!(file["relativePath"].is_string());
        assert_eq!(file["sizeBytes"], serde_json::json!(10));
        assert!(file["modifiedTime"].is_string());
        assert!(listing.to_json().unwrap().contains("\"truncated\": true"));
    }

    #[test]
    fn test_configuration_errors_surface() {
        let temp_dir = project();
        let assembler = ContextAssembler::new(Config::default()).unwrap();
        let options = assembler.filter_options().with_excludes(["*a*b*c*d*e*f*g*h*i*j*k"]);

        let err = tokio_test::block_on(assembler.list_files(temp_dir.path(), &options)).unwrap_err();
        assert!(matches!(err, ContextError::InvalidPattern { .. }));
    }

    #[test]
    fn test_exact_fit_is_not_truncated() {
        let temp_dir = project();
        let assembler = ContextAssembler::new(Config::default()).unwrap();
        let options = assembler.filter_options().with_max_files(2);

        let listing = tokio_test::block_on(assembler.list_files(temp_dir.path(), &options)).unwrap();
        assert_eq!(listing.count, 2);
        assert!(!listing.truncated);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        for chars_per_token in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = Config {
                chars_per_token,
                ..Config::default()
            };
            let err = ContextAssembler::new(config).err().unwrap();
            assert!(matches!(err, ContextError::Config(_)));
        }

        let config = Config {
            safety_buffer: f64::NAN,
            ..Config::default()
        };
        assert!(ContextAssembler::new(config).is_err());
    }

    #[test]
    fn test_report_total_saturates() {
        let files = vec![
            FileTokenEstimate {
                path: "a".to_string(),
                tokens: usize::MAX,
            },
            FileTokenEstimate {
                path: "b".to_string(),
                tokens: usize::MAX,
            },
        ];
        let report = TokenReport::new(files, 1000);
        assert_eq!(report.total_tokens, usize::MAX);
        assert!(!report.within_limit);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
        if let Some(home) = home::home_dir() {
            assert_eq!(expand_home(Path::new("~/src")), home.join("src"));
        }
    }
}
