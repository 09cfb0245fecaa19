use super::error::{Result, SamplingError};
use super::softmax;
use rand::{distributions::Distribution, rngs::StdRng, SeedableRng};

/// Picks exactly one index out of a (possibly narrowed) score vector.
pub trait Select {
    fn select(&mut self, logits: &[f64]) -> Result<usize>;
}

/// Arg-max selection. Ties go to the first occurrence.
///
/// Greedy never shapes logits itself, it only looks at what it is handed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Greedy;

impl Greedy {
    pub fn argmax(logits: &[f64]) -> Result<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &logit) in logits.iter().enumerate() {
            if logit == f64::NEG_INFINITY || logit.is_nan() {
                continue;
            }
            match best {
                Some((_, best_logit)) if logit <= best_logit => {}
                _ => best = Some((idx, logit)),
            }
        }
        best.map(|(idx, _)| idx).ok_or(SamplingError::NoValidCandidate)
    }
}

impl Select for Greedy {
    fn select(&mut self, logits: &[f64]) -> Result<usize> {
        Greedy::argmax(logits)
    }
}

/// Random draw proportional to softmax probability over the non-excluded logits.
#[derive(Clone, Debug)]
pub struct Weighted {
    rng: StdRng,
}

impl Weighted {
    /// Seeded sources are reproducible; `None` pulls a seed from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn from_rng(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl Select for Weighted {
    fn select(&mut self, logits: &[f64]) -> Result<usize> {
        let (indices, kept): (Vec<usize>, Vec<f64>) = logits
            .iter()
            .enumerate()
            .filter(|(_, &logit)| logit != f64::NEG_INFINITY)
            .map(|(idx, &logit)| (idx, logit))
            .unzip();

        if kept.is_empty() {
            return Err(SamplingError::NoValidCandidate);
        }

        let probs = softmax(&kept);
        let dist = rand::distributions::WeightedIndex::new(&probs)
            .map_err(|e| SamplingError::SamplingFailure(e.to_string()))?;
        Ok(indices[dist.sample(&mut self.rng)])
    }
}

#[derive(Clone, Debug)]
pub enum Selector {
    Greedy(Greedy),
    Weighted(Weighted),
}

impl Selector {
    pub fn greedy() -> Self {
        Self::Greedy(Greedy)
    }

    pub fn weighted(seed: Option<u64>) -> Self {
        Self::Weighted(Weighted::new(seed))
    }
}

impl Select for Selector {
    fn select(&mut self, logits: &[f64]) -> Result<usize> {
        match self {
            Self::Greedy(greedy) => greedy.select(logits),
            Self::Weighted(weighted) => weighted.select(logits),
        }
    }
}
