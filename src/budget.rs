//! Greedy token-budgeted selection of files

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::format::{FileSection, number_lines};
use crate::tokens::TokenEstimator;
use crate::walker::FileCandidate;

/// Token ceiling and running consumption for one assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBudget {
    pub ceiling_tokens: usize,
    pub consumed_tokens: usize,
}

impl TokenBudget {
    pub fn new(ceiling_tokens: usize) -> Self {
        Self {
            ceiling_tokens,
            consumed_tokens: 0,
        }
    }

    /// Consume `tokens` if they fit. Consumption never decreases.
    pub fn try_consume(&mut self, tokens: usize) -> bool {
        match self.consumed_tokens.checked_add(tokens) {
            Some(total) if total <= self.ceiling_tokens => {
                self.consumed_tokens = total;
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.ceiling_tokens.saturating_sub(self.consumed_tokens)
    }
}

/// Why a candidate did not make it into the context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SkipReason {
    OverBudget { tokens: usize },
    Unreadable { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// Result of packing candidates into a budget
#[derive(Debug, Clone)]
pub struct BudgetOutcome {
    pub sections: Vec<FileSection>,
    pub skipped: Vec<SkippedFile>,
    pub budget: TokenBudget,
}

/// Greedy, order-preserving packer.
///
/// Candidates are taken in the order given. Each one is accepted whole if it
/// fits in what is left of the budget, otherwise it is skipped and the next
/// one is tried. This is best-effort, not globally optimal, but it is
/// deterministic for a given candidate order.
pub struct ContextBudgeter {
    estimator: Arc<dyn TokenEstimator>,
    line_numbers: bool,
}

impl ContextBudgeter {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            estimator,
            line_numbers: false,
        }
    }

    /// Prefix bodies with 1-based line numbers before estimating
    pub fn with_line_numbers(mut self, enabled: bool) -> Self {
        self.line_numbers = enabled;
        self
    }

    /// Format a file body the way it will be sent
    pub fn format_body(&self, content: &str) -> String {
        if self.line_numbers {
            number_lines(content)
        } else {
            content.to_string()
        }
    }

    /// Cost of a file body once formatted
    pub fn estimate_body(&self, content: &str) -> usize {
        self.estimator.estimate_tokens(&self.format_body(content))
    }

    /// Read candidates from disk and pack them under `ceiling_tokens`.
    ///
    /// Unreadable files are logged and skipped.
    pub async fn assemble(&self, candidates: &[FileCandidate], ceiling_tokens: usize) -> BudgetOutcome {
        let mut budget = TokenBudget::new(ceiling_tokens);
        let mut sections = Vec::new();
        let mut skipped = Vec::new();

        for candidate in candidates {
            let content = match fs::read(&candidate.absolute_path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", candidate.relative_path, e);
                    skipped.push(SkippedFile {
                        path: candidate.relative_path.clone(),
                        reason: SkipReason::Unreadable { error: e.to_string() },
                    });
                    continue;
                }
            };

            self.admit(&mut budget, &candidate.relative_path, &content, &mut sections, &mut skipped);
        }

        info!(
            "Packed {} files ({} skipped) using {}/{} tokens",
            sections.len(),
            skipped.len(),
            budget.consumed_tokens,
            budget.ceiling_tokens
        );
        BudgetOutcome {
            sections,
            skipped,
            budget,
        }
    }

    /// Pack in-memory `(path, content)` pairs under `ceiling_tokens`
    pub fn pack<I, P, C>(&self, files: I, ceiling_tokens: usize) -> BudgetOutcome
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<str>,
    {
        let mut budget = TokenBudget::new(ceiling_tokens);
        let mut sections = Vec::new();
        let mut skipped = Vec::new();

        for (path, content) in files {
            self.admit(&mut budget, path.as_ref(), content.as_ref(), &mut sections, &mut skipped);
        }

        BudgetOutcome {
            sections,
            skipped,
            budget,
        }
    }

    fn admit(
        &self,
        budget: &mut TokenBudget,
        path: &str,
        content: &str,
        sections: &mut Vec<FileSection>,
        skipped: &mut Vec<SkippedFile>,
    ) {
        let body = self.format_body(content);
        let tokens = self.estimator.estimate_tokens(&body);

        if budget.try_consume(tokens) {
            sections.push(FileSection {
                path: path.to_string(),
                content: body,
                tokens,
            });
        } else {
            debug!(
                "Skipping {} ({} tokens, {} remaining)",
                path,
                tokens,
                budget.remaining()
            );
            skipped.push(SkippedFile {
                path: path.to_string(),
                reason: SkipReason::OverBudget { tokens },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::HeuristicEstimator;
    use tempfile::TempDir;

    /// Charges one token per byte
    struct ByteEstimator;

    impl TokenEstimator for ByteEstimator {
        fn estimate_tokens(&self, text: &str) -> usize {
            text.len()
        }
    }

    fn budgeter() -> ContextBudgeter {
        ContextBudgeter::new(Arc::new(ByteEstimator))
    }

    #[test]
    fn test_token_budget_is_monotonic() {
        let mut budget = TokenBudget::new(10);
        assert!(budget.try_consume(6));
        assert!(!budget.try_consume(5));
        assert_eq!(budget.consumed_tokens, 6);
        assert!(budget.try_consume(4));
        assert_eq!(budget.remaining(), 0);
        assert!(budget.try_consume(0));
        assert!(!budget.try_consume(usize::MAX));
    }

    #[test]
    fn test_second_file_skipped_when_ceiling_reached() {
        let a = "a".repeat(600);
        let b = "b".repeat(600);
        let outcome = budgeter().pack([("first.rs", a.as_str()), ("second.rs", b.as_str())], 1000);

        assert_eq!(outcome.sections.len(), 1);
        assert_eq!(outcome.sections[0].path, "first.rs");
        assert_eq!(outcome.budget.consumed_tokens, 600);
        assert_eq!(
            outcome.skipped,
            vec![SkippedFile {
                path: "second.rs".to_string(),
                reason: SkipReason::OverBudget { tokens: 600 },
            }]
        );
    }

    #[test]
    fn test_smaller_file_fits_after_skip() {
        let outcome = budgeter().pack(
            [
                ("big.rs", "x".repeat(80)),
                ("huge.rs", "y".repeat(500)),
                ("small.rs", "z".repeat(20)),
            ],
            100,
        );

        let accepted: Vec<&str> = outcome.sections.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(accepted, vec!["big.rs", "small.rs"]);
        assert_eq!(outcome.budget.consumed_tokens, 100);
    }

    #[test]
    fn test_sum_never_exceeds_ceiling() {
        let estimator = Arc::new(HeuristicEstimator::default());
        let budgeter = ContextBudgeter::new(estimator);
        let files: Vec<(String, String)> = (1..40)
            .map(|i| (format!("f{}.txt", i), "w".repeat(i * 37)))
            .collect();

        for ceiling in [0, 1, 50, 333, 1000, 5000] {
            let outcome = budgeter.pack(files.clone(), ceiling);
            let sum: usize = outcome.sections.iter().map(|s| s.tokens).sum();
            assert!(sum <= ceiling);
            assert_eq!(sum, outcome.budget.consumed_tokens);
            assert_eq!(outcome.sections.len() + outcome.skipped.len(), files.len());
            for section in &outcome.sections {
                let original = files.iter().find(|(p, _)| *p == section.path).unwrap();
                assert_eq!(section.content, original.1);
            }
        }
    }

    #[test]
    fn test_line_numbers_count_toward_budget() {
        let budgeter = budgeter().with_line_numbers(true);
        let outcome = budgeter.pack([("a.txt", "one\ntwo")], 1000);

        assert_eq!(outcome.sections[0].content, "1 | one\n2 | two");
        assert_eq!(outcome.sections[0].tokens, outcome.sections[0].content.len());
    }

    #[test]
    fn test_assemble_reads_files_and_skips_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("present.txt");
        std::fs::write(&present, "hello").unwrap();

        let candidate = |name: &str| FileCandidate {
            absolute_path: temp_dir.path().join(name),
            relative_path: name.to_string(),
            size_bytes: 5,
            modified_time: chrono::Utc::now(),
        };
        let candidates = vec![candidate("missing.txt"), candidate("present.txt")];

        let outcome = tokio_test::block_on(budgeter().assemble(&candidates, 100));
        assert_eq!(outcome.sections.len(), 1);
        assert_eq!(outcome.sections[0].content, "hello");
        assert_eq!(outcome.budget.consumed_tokens, 5);
        assert!(matches!(
            outcome.skipped[0].reason,
            SkipReason::Unreadable { .. }
        ));
    }
}
