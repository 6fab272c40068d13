//! # context-assembler
//!
//! File discovery and token-budgeted context assembly for LLM bridge servers.
//!
//! This crate provides:
//! - Directory walking with depth, size, extension and binary filtering
//! - Glob include/exclude filtering with guards against unsafe patterns
//! - Heuristic token estimation behind a pluggable trait
//! - Greedy packing of whole files under a token ceiling
//! - Prompt formatting with an optional project context and a trailing task
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use context_assembler::{Config, ContextAssembler};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let assembler = ContextAssembler::new(Config::from_env()?)?;
//! let options = assembler
//!     .filter_options()
//!     .with_includes(["src/**/*.rs"])
//!     .with_excludes(["**/tests/**"]);
//!
//! let context = tokio_test::block_on(assembler.assemble(
//!     Path::new("."),
//!     &options,
//!     Some("A Rust workspace"),
//!     "Review the error handling",
//! ))?;
//!
//! let prompt = assembler.render(&context);
//! # let _ = prompt;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod binary;
pub mod budget;
pub mod config;
pub mod error;
pub mod format;
pub mod gitignore;
pub mod pattern;
pub mod tokens;
pub mod walker;

pub use assembler::{CandidateListing, ContextAssembler, FileTokenEstimate, TokenReport};
pub use binary::{classify_sample, is_binary};
pub use budget::{BudgetOutcome, ContextBudgeter, SkipReason, SkippedFile, TokenBudget};
pub use config::Config;
pub use error::{ContextError, Result};
pub use format::{AssembledContext, ContextFormatter, FileSection};
pub use pattern::PatternFilter;
pub use tokens::{HeuristicEstimator, TokenEstimator};
pub use walker::{Discovery, FileCandidate, FilterOptions, discover, walk};
