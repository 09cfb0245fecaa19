pub mod batch;
pub mod chain;
pub mod error;
pub mod selectors;
pub mod transforms;

pub use batch::BatchSampler;
pub use chain::SamplerChain;
pub use error::{Result, SamplingError};
pub use selectors::{Greedy, Select, Selector, Weighted};
pub use transforms::{MinP, ScoreTransform, Temperature, TopK, TopP, Transform};

/// Numerically stable softmax over f64 logits.
///
/// Excluded (negative infinity) entries get probability zero. If every entry is
/// excluded the result is all zeros rather than NaN.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max_logit = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max_logit == f64::NEG_INFINITY {
        return vec![0.0; logits.len()];
    }

    let mut probs: Vec<f64> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum: f64 = probs.iter().sum();
    for p in probs.iter_mut() {
        *p /= sum;
    }
    probs
}
