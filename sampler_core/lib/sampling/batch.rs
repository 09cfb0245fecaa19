use super::chain::run_chain;
use super::error::{Result, SamplingError};
use super::selectors::{Selector, Weighted};
use super::transforms::ScoreTransform;
use crate::config::SelectorChoice;
use candle_core::{DType, Tensor};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

/// Runs the same chain over every row of a batch in parallel.
///
/// Each row gets its own RNG split off the parent, so results for a given seed
/// don't depend on how rayon schedules the rows.
pub struct BatchSampler {
    transforms: Vec<ScoreTransform>,
    choice: SelectorChoice,
    rng: StdRng,
}

impl BatchSampler {
    pub fn new(
        transforms: Vec<ScoreTransform>,
        choice: SelectorChoice,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            transforms,
            choice,
            rng,
        }
    }

    pub fn sample<T, R>(&mut self, rows: &[R]) -> Result<Vec<usize>>
    where
        T: Copy + Into<f64>,
        R: AsRef<[T]> + Sync,
    {
        // Split RNG into independent streams
        let rngs = (0..rows.len())
            .map(|_| StdRng::seed_from_u64(self.rng.gen()))
            .collect::<Vec<_>>();

        let transforms = &self.transforms;
        let choice = self.choice;
        rows.par_iter()
            .zip(rngs)
            .map(|(row, rng)| {
                let logits = row.as_ref().iter().map(|&x| Into::<f64>::into(x)).collect();
                let mut selector = match choice {
                    SelectorChoice::Greedy => Selector::greedy(),
                    SelectorChoice::Weighted => Selector::Weighted(Weighted::from_rng(rng)),
                };
                run_chain(transforms, &mut selector, logits)
            })
            .collect()
    }

    /// Takes `(batch, vocab)` or `(batch, 1, vocab)` logits
    pub fn sample_tensor(&mut self, logits: &Tensor) -> Result<Vec<usize>> {
        let logits = match logits.rank() {
            2 => logits.clone(),
            3 => logits.squeeze(1)?,
            rank => {
                return Err(SamplingError::InvalidParameter(format!(
                    "batched logits must be rank 2 or 3, got rank {rank}"
                )))
            }
        };
        let rows = logits.to_dtype(DType::F64)?.to_vec2::<f64>()?;
        self.sample(&rows)
    }
}
