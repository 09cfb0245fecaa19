use super::error::Result;
use super::selectors::{Greedy, Select, Selector};
use super::transforms::{ScoreTransform, Temperature, Transform};
use candle_core::{DType, Tensor};
use tracing::{debug, trace};

/// Ordered transforms followed by one selector.
///
/// Every call works on its own copy of the logits. The only state carried
/// between calls is the selector's RNG.
#[derive(Clone, Debug)]
pub struct SamplerChain {
    transforms: Vec<ScoreTransform>,
    selector: Selector,
}

impl SamplerChain {
    pub fn new(transforms: Vec<ScoreTransform>, selector: Selector) -> Self {
        Self {
            transforms,
            selector,
        }
    }

    pub fn transforms(&self) -> &[ScoreTransform] {
        &self.transforms
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Sample one index from raw `f32` or `f64` logits
    pub fn sample<T: Copy + Into<f64>>(&mut self, logits: &[T]) -> Result<usize> {
        let logits = logits.iter().map(|&x| Into::<f64>::into(x)).collect();
        run_chain(&self.transforms, &mut self.selector, logits)
    }

    /// Sample from a logits tensor of any float dtype; leading dims are flattened away
    pub fn sample_tensor(&mut self, logits: &Tensor) -> Result<usize> {
        let logits = logits
            .flatten_all()?
            .to_dtype(DType::F64)?
            .to_vec1::<f64>()?;
        run_chain(&self.transforms, &mut self.selector, logits)
    }
}

/// Applies `transforms` in order. Returns `true` when a zero temperature was
/// seen, meaning the caller must pick greedily.
pub(crate) fn shape_logits(transforms: &[ScoreTransform], logits: &mut [f64]) -> Result<bool> {
    let mut force_greedy = false;
    for transform in transforms {
        match transform {
            // Zero temperature has no rescaling, it only means "take the best token"
            ScoreTransform::Temperature(Temperature(t)) if *t == 0.0 => {
                debug!("temperature 0 in chain, selecting greedily");
                force_greedy = true;
            }
            _ => {
                if let Err(e) = transform.apply(logits) {
                    debug!("{transform} failed, aborting chain: {e}");
                    return Err(e);
                }
                trace!(
                    excluded = logits.iter().filter(|&&x| x == f64::NEG_INFINITY).count(),
                    "applied {transform}"
                );
            }
        }
    }
    Ok(force_greedy)
}

pub(crate) fn run_chain(
    transforms: &[ScoreTransform],
    selector: &mut Selector,
    mut logits: Vec<f64>,
) -> Result<usize> {
    let idx = if shape_logits(transforms, &mut logits)? {
        Greedy.select(&logits)?
    } else {
        selector.select(&logits)?
    };
    trace!(idx, vocab_size = logits.len(), "selected token");
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{MinP, SamplingError, TopK, TopP};
    use candle_core::Device;

    const NEG_INF: f64 = f64::NEG_INFINITY;

    #[test]
    fn test_sample_greedy() {
        let mut chain = SamplerChain::new(
            vec![TopK(3).into(), Temperature(0.9).into(), TopP(0.95).into()],
            Selector::greedy(),
        );
        assert_eq!(chain.sample(&[1f32, 2.0, 3.0, 4.0]).unwrap(), 3);
        assert_eq!(chain.sample(&[9f64, 2.0, 3.0, 4.0]).unwrap(), 0);
    }

    #[test]
    fn test_transform_order_matters() {
        let input = [2.0, 1.5, 0.0];

        // TopP first sees the sharp distribution and keeps only the top token
        let mut logits = input.to_vec();
        shape_logits(
            &[TopP(0.5).into(), Temperature(2.0).into()],
            &mut logits,
        )
        .unwrap();
        assert_eq!(logits, vec![0.0, NEG_INF, NEG_INF]);

        // Flattened by temperature first, the nucleus needs two tokens
        let mut logits = input.to_vec();
        shape_logits(
            &[Temperature(2.0).into(), TopP(0.5).into()],
            &mut logits,
        )
        .unwrap();
        assert_eq!(logits, vec![0.0, -0.25, NEG_INF]);
    }

    #[test]
    fn test_first_error_aborts() {
        let mut chain = SamplerChain::new(
            vec![Temperature(1.0).into(), TopK(0).into(), TopP(1.5).into()],
            Selector::greedy(),
        );
        match chain.sample(&[1f32, 2.0]) {
            Err(SamplingError::InvalidParameter(msg)) => assert!(msg.contains("k must be")),
            other => panic!("expected top-k error, got {other:?}"),
        }

        let mut chain = SamplerChain::new(
            vec![TopP(1.5).into(), TopK(0).into()],
            Selector::greedy(),
        );
        match chain.sample(&[1f32, 2.0]) {
            Err(SamplingError::InvalidParameter(msg)) => assert!(msg.contains("p must be")),
            other => panic!("expected top-p error, got {other:?}"),
        }
    }

    #[test]
    fn test_temperature_zero_forces_greedy() {
        let mut chain = SamplerChain::new(vec![Temperature(0.0).into()], Selector::weighted(None));
        for _ in 0..20 {
            assert_eq!(chain.sample(&[1f32, 2.0, 3.0, 4.0]).unwrap(), 3);
        }

        // Anywhere in the list, and later transforms still run
        let mut chain = SamplerChain::new(
            vec![MinP(0.5).into(), Temperature(0.0).into(), TopK(2).into()],
            Selector::weighted(Some(11)),
        );
        assert_eq!(chain.sample(&[0.5f32, 3.0, 2.9, -1.0]).unwrap(), 1);

        let mut logits = vec![0.5, 3.0, 2.9, -1.0];
        let forced = shape_logits(chain.transforms(), &mut logits).unwrap();
        assert!(forced);
        assert_eq!(logits, vec![NEG_INF, 3.0, 2.9, NEG_INF]);
    }

    #[test]
    fn test_temperature_zero_override_is_per_call() {
        let mut chain =
            SamplerChain::new(vec![Temperature(0.0).into()], Selector::weighted(Some(5)));
        chain.sample(&[1f32, 2.0]).unwrap();
        assert!(matches!(chain.selector(), Selector::Weighted(_)));

        // Invalid transforms after the zero temperature still abort
        let mut chain = SamplerChain::new(
            vec![Temperature(0.0).into(), TopK(0).into()],
            Selector::weighted(None),
        );
        assert!(matches!(
            chain.sample(&[1f32, 2.0]),
            Err(SamplingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_weighted_never_picks_excluded() {
        let mut chain = SamplerChain::new(
            vec![Temperature(1.5).into(), TopK(2).into()],
            Selector::weighted(Some(99)),
        );
        let logits = [0.3f32, 2.0, -4.0, 1.9, 0.0];
        for _ in 0..200 {
            let idx = chain.sample(&logits).unwrap();
            assert!(idx == 1 || idx == 3, "picked {idx}");
        }
    }

    #[test]
    fn test_seeded_chains_agree() {
        let logits: Vec<f32> = (0..32).map(|i| (i as f32 * 0.37).sin() * 3.0).collect();
        let transforms: Vec<ScoreTransform> =
            vec![Temperature(0.8).into(), TopK(20).into(), TopP(0.9).into()];
        let mut a = SamplerChain::new(transforms.clone(), Selector::weighted(Some(2024)));
        let mut b = SamplerChain::new(transforms, Selector::weighted(Some(2024)));
        for _ in 0..32 {
            assert_eq!(a.sample(&logits).unwrap(), b.sample(&logits).unwrap());
        }
    }

    #[test]
    fn test_all_excluded() {
        let mut chain = SamplerChain::new(vec![TopP(0.9).into()], Selector::weighted(None));
        assert!(matches!(
            chain.sample(&[f64::NEG_INFINITY; 3]),
            Err(SamplingError::NoValidCandidate)
        ));
    }

    #[test]
    fn test_sample_tensor() -> Result<()> {
        let logits = Tensor::new(&[[1f32, 2.0, 7.0, 4.0]], &Device::Cpu)?;
        let mut chain = SamplerChain::new(vec![TopK(1).into()], Selector::weighted(Some(0)));
        assert_eq!(chain.sample_tensor(&logits)?, 2);
        Ok(())
    }
}
