use super::error::{Result, SamplingError};
use super::softmax;
use std::fmt;

/// Smallest divisor used by [`Temperature`], keeps tiny nonzero temperatures finite
pub const TEMPERATURE_EPS: f64 = 1e-7;

/// A score-shaping step. Implementations only ever rescale values or push them
/// to negative infinity; they never change the length of the vector.
pub trait Transform {
    fn apply(&self, logits: &mut [f64]) -> Result<()>;
}

/// Scale logits by `1 / t` after shifting them so the max is zero.
///
/// Valid range is `[0, 2]`. Zero is accepted here but has no rescaling of its own:
/// inside a [`SamplerChain`](super::SamplerChain) it switches selection to greedy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Temperature(pub f64);

impl Transform for Temperature {
    fn apply(&self, logits: &mut [f64]) -> Result<()> {
        let t = self.0;
        if !(0.0..=2.0).contains(&t) {
            return Err(SamplingError::InvalidParameter(format!(
                "temperature must be between 0 and 2, got {t}"
            )));
        }

        let max_logit = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max_logit == f64::NEG_INFINITY {
            // Nothing left to rescale, and -inf - -inf would turn exclusions into NaN
            return Ok(());
        }

        let temp = t.max(TEMPERATURE_EPS);
        for logit in logits.iter_mut() {
            *logit = (*logit - max_logit) / temp;
        }
        Ok(())
    }
}

/// Keep the `k` highest logits.
///
/// Ties at the cutoff go to the lower index (stable sort); callers should not
/// rely on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopK(pub usize);

impl Transform for TopK {
    fn apply(&self, logits: &mut [f64]) -> Result<()> {
        let k = self.0;
        if k == 0 {
            return Err(SamplingError::InvalidParameter("k must be positive".to_string()));
        }
        if k >= logits.len() {
            return Ok(());
        }

        let mut indices: Vec<usize> = (0..logits.len()).collect();
        indices.sort_by(|&i, &j| logits[j].total_cmp(&logits[i]));

        for &idx in &indices[k..] {
            logits[idx] = f64::NEG_INFINITY;
        }
        Ok(())
    }
}

/// Nucleus filtering: keep the smallest probability-sorted prefix whose mass exceeds `p`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TopP(pub f64);

impl Transform for TopP {
    fn apply(&self, logits: &mut [f64]) -> Result<()> {
        let p = check_probability(self.0)?;
        let probs = softmax(logits);

        let mut indices: Vec<usize> = (0..probs.len()).collect();
        indices.sort_by(|&i, &j| probs[j].total_cmp(&probs[i]));

        let mut cumsum = 0.0;
        for (rank, &idx) in indices.iter().enumerate() {
            cumsum += probs[idx];
            if cumsum > p {
                // The token that crossed the threshold stays in
                for &dropped in &indices[rank + 1..] {
                    logits[dropped] = f64::NEG_INFINITY;
                }
                break;
            }
        }
        Ok(())
    }
}

/// Drop every token whose probability is below `p` times the most likely one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinP(pub f64);

impl Transform for MinP {
    fn apply(&self, logits: &mut [f64]) -> Result<()> {
        let p = check_probability(self.0)?;
        let probs = softmax(logits);

        let max_prob = probs.iter().copied().fold(0.0, f64::max);
        let threshold = p * max_prob;

        for (logit, prob) in logits.iter_mut().zip(probs) {
            if prob < threshold {
                *logit = f64::NEG_INFINITY;
            }
        }
        Ok(())
    }
}

fn check_probability(p: f64) -> Result<f64> {
    if p > 0.0 && p < 1.0 {
        Ok(p)
    } else {
        Err(SamplingError::InvalidParameter(format!(
            "p must be between 0 and 1 (exclusive), got {p}"
        )))
    }
}

/// The closed set of transforms a chain can hold
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScoreTransform {
    Temperature(Temperature),
    TopK(TopK),
    TopP(TopP),
    MinP(MinP),
}

impl Transform for ScoreTransform {
    fn apply(&self, logits: &mut [f64]) -> Result<()> {
        match self {
            Self::Temperature(t) => t.apply(logits),
            Self::TopK(k) => k.apply(logits),
            Self::TopP(p) => p.apply(logits),
            Self::MinP(p) => p.apply(logits),
        }
    }
}

impl fmt::Display for ScoreTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temperature(Temperature(t)) => write!(f, "temperature({t})"),
            Self::TopK(TopK(k)) => write!(f, "top_k({k})"),
            Self::TopP(TopP(p)) => write!(f, "top_p({p})"),
            Self::MinP(MinP(p)) => write!(f, "min_p({p})"),
        }
    }
}

impl From<Temperature> for ScoreTransform {
    fn from(t: Temperature) -> Self {
        Self::Temperature(t)
    }
}

impl From<TopK> for ScoreTransform {
    fn from(k: TopK) -> Self {
        Self::TopK(k)
    }
}

impl From<TopP> for ScoreTransform {
    fn from(p: TopP) -> Self {
        Self::TopP(p)
    }
}

impl From<MinP> for ScoreTransform {
    fn from(p: MinP) -> Self {
        Self::MinP(p)
    }
}
