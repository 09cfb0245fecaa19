use candle_core::{DType, Tensor};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sampler_core::config::{SamplingArgs, SelectorChoice};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    version = "0.1",
    about = "Draws token indices from a saved logits vector"
)]
struct Args {
    /// Logits file: .npy of any float dtype, or a JSON array of numbers
    logits: PathBuf,

    /// Optional JSON sampling config. Flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Temperature for sampling, 0 means greedy
    #[arg(long)]
    temp: Option<f64>,

    /// Top-k sampling parameter
    #[arg(long)]
    top_k: Option<usize>,

    /// Top-p sampling parameter
    #[arg(long)]
    top_p: Option<f64>,

    /// Min-p sampling parameter
    #[arg(long)]
    min_p: Option<f64>,

    /// Seed for weighted sampling. Unset draws from OS entropy
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    selector: Option<SelectorChoice>,

    /// Number of tokens to draw
    #[arg(short, long, default_value_t = 1)]
    num_samples: usize,

    /// How many of the most frequent indices to print
    #[arg(long, default_value_t = 10)]
    show: usize,
}

impl Args {
    fn sampling_args(&self) -> anyhow::Result<SamplingArgs> {
        let mut sampling_args = match &self.config {
            Some(path) => SamplingArgs::from_file(path)?,
            None => SamplingArgs::default(),
        };
        if let Some(temp) = self.temp {
            sampling_args.temp = temp;
        }
        if self.top_k.is_some() {
            sampling_args.top_k = self.top_k;
        }
        if self.top_p.is_some() {
            sampling_args.top_p = self.top_p;
        }
        if self.min_p.is_some() {
            sampling_args.min_p = self.min_p;
        }
        if self.seed.is_some() {
            sampling_args.seed = self.seed;
        }
        if let Some(selector) = self.selector {
            sampling_args.selector = selector;
        }
        sampling_args.validate()?;
        Ok(sampling_args)
    }
}

fn load_logits(path: &Path) -> anyhow::Result<Vec<f64>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("npy") => Ok(Tensor::read_npy(path)?
            .flatten_all()?
            .to_dtype(DType::F64)?
            .to_vec1::<f64>()?),
        Some("json") => {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        }
        _ => Err(anyhow::anyhow!(
            "Unsupported logits file {:?}, expected .npy or .json",
            path
        )),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let sampling_args = args.sampling_args()?;
    let logits = load_logits(&args.logits)?;
    if logits.is_empty() {
        return Err(anyhow::anyhow!("No logits found in {:?}", args.logits));
    }
    info!(
        vocab_size = logits.len(),
        "Loaded logits from {:?}, sampling with {:?}",
        args.logits,
        sampling_args
    );

    let mut chain = sampling_args.build_chain();
    let progress = ProgressBar::new(args.num_samples as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.green} {pos}/{len} [{elapsed_precise}] {per_sec}")?,
    );

    let mut counts: HashMap<usize, usize> = HashMap::new();
    let start = Instant::now();
    for _ in 0..args.num_samples {
        let idx = chain.sample(&logits)?;
        *counts.entry(idx).or_default() += 1;
        progress.inc(1);
    }
    progress.finish_and_clear();
    let dt = start.elapsed();

    println!(
        "{} draws in {:.3}s ({:.2} draws/s)",
        args.num_samples,
        dt.as_secs_f64(),
        args.num_samples as f64 / dt.as_secs_f64()
    );

    let mut ranked: Vec<(usize, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    println!("{:>8}  {:>8}  {:>8}", "index", "count", "share");
    for (idx, count) in ranked.into_iter().take(args.show) {
        println!(
            "{:>8}  {:>8}  {:>8.4}",
            idx,
            count,
            count as f64 / args.num_samples as f64
        );
    }

    Ok(())
}
