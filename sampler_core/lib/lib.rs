pub mod config;
pub mod sampling;

pub use config::{SamplingArgs, SelectorChoice};
pub use sampling::{SamplerChain, SamplingError};
