use crate::sampling::{
    BatchSampler, MinP, Result, SamplerChain, SamplingError, ScoreTransform, Selector,
    Temperature, TopK, TopP, Transform,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(clap::ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelectorChoice {
    #[value(name = "greedy")]
    Greedy,

    #[default]
    #[value(name = "weighted")]
    Weighted,
}

/// Sampling settings as they come from a config file or the command line.
///
/// Unset filters are left out of the chain entirely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingArgs {
    pub temp: f64,
    pub top_k: Option<usize>,
    pub top_p: Option<f64>,
    pub min_p: Option<f64>,
    pub seed: Option<u64>,
    pub selector: SelectorChoice,
}

impl Default for SamplingArgs {
    fn default() -> Self {
        Self {
            temp: 0.7,
            top_k: None,
            top_p: None,
            min_p: None,
            seed: None,
            selector: SelectorChoice::Weighted,
        }
    }
}

impl SamplingArgs {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SamplingError::Config(format!("could not open {path:?}: {e}")))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| SamplingError::Config(format!("could not parse {path:?}: {e}")))
    }

    /// Transforms in chain order: temperature, top-k, top-p, min-p
    pub fn transforms(&self) -> Vec<ScoreTransform> {
        let mut transforms = vec![ScoreTransform::from(Temperature(self.temp))];
        if let Some(k) = self.top_k {
            transforms.push(TopK(k).into());
        }
        if let Some(p) = self.top_p {
            transforms.push(TopP(p).into());
        }
        if let Some(p) = self.min_p {
            transforms.push(MinP(p).into());
        }
        transforms
    }

    /// Checks every parameter up front instead of on the first sampled token
    pub fn validate(&self) -> Result<()> {
        for transform in self.transforms() {
            // A single logit is enough to trip the range checks
            transform.apply(&mut [0.0])?;
        }
        Ok(())
    }

    pub fn selector(&self) -> Selector {
        match self.selector {
            SelectorChoice::Greedy => Selector::greedy(),
            SelectorChoice::Weighted => Selector::weighted(self.seed),
        }
    }

    pub fn build_chain(&self) -> SamplerChain {
        SamplerChain::new(self.transforms(), self.selector())
    }

    pub fn build_batch_sampler(&self) -> BatchSampler {
        BatchSampler::new(self.transforms(), self.selector, self.seed)
    }
}
