//! Token estimation strategies

/// Estimate the token cost of a piece of text.
///
/// Implementations must be cheap: the budgeter calls this once per file.
pub trait TokenEstimator: Send + Sync {
    fn estimate_tokens(&self, text: &str) -> usize;
}

/// Character-ratio heuristic with a safety margin.
///
/// Computes `ceil(chars / chars_per_token * safety_buffer)`. This is not a
/// real tokenizer; vendor counts can differ by double-digit percentages, so
/// the buffer biases the estimate upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicEstimator {
    pub chars_per_token: f64,
    pub safety_buffer: f64,
}

impl Default for HeuristicEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: 4.0,
            safety_buffer: 1.2,
        }
    }
}

impl HeuristicEstimator {
    pub fn new(chars_per_token: f64, safety_buffer: f64) -> Self {
        Self {
            chars_per_token,
            safety_buffer,
        }
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f64;
        ((chars / self.chars_per_token) * self.safety_buffer).ceil() as usize
    }
}
