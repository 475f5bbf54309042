//! `ff` - run a saved multilayer perceptron over `.npy` inputs.
//!
//! # Commands
//! - `ff predict` - build Flatten -> (Dense -> hidden)* -> Dense -> Softmax from
//!   an `.npz` of kernel/bias pairs and classify a batch
//! - `ff inspect` - print the kind and shape of every array in a `.npy`/`.npz`
//!
//! Set `RUST_LOG` (e.g. `RUST_LOG=ff_nn=trace`) to follow model execution.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ff_io::npy;
use ff_nn::{Activation, Dense, DenseKernel, Flatten, Layer, Model};
use ff_tensor::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI definition
// =============================================================================

/// Forward inference for dense networks stored as NumPy arrays
#[derive(Parser, Debug)]
#[command(name = "ff", version, about)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a batch with a dense network
    Predict(PredictArgs),

    /// Show the arrays stored in a .npy or .npz file
    Inspect {
        /// File to inspect
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct PredictArgs {
    /// .npz archive of f32 arrays: kernel_0, bias_0, kernel_1, bias_1, ...
    #[arg(short, long)]
    weights: PathBuf,

    /// .npy batch; the first axis indexes samples. Any numeric kind, cast to f32
    #[arg(short, long)]
    input: PathBuf,

    /// Write the class probabilities here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Labels to score against: class indices [batch] or one-hot [batch, classes]
    #[arg(short, long)]
    expected: Option<PathBuf>,

    /// Activation after every hidden dense layer
    #[arg(long, value_enum, default_value_t = Hidden::Relu)]
    hidden: Hidden,

    /// Dense kernel selection
    #[arg(long, value_enum, default_value_t = KernelChoice::Auto)]
    kernel: KernelChoice,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Hidden {
    Relu,
    Tanh,
    Sigmoid,
    Selu,
    Elu,
    Softplus,
    Softsign,
}

impl Hidden {
    fn activation(self) -> Activation<f32> {
        match self {
            Hidden::Relu => Activation::relu(),
            Hidden::Tanh => Activation::Tanh,
            Hidden::Sigmoid => Activation::Sigmoid,
            Hidden::Selu => Activation::Selu,
            Hidden::Elu => Activation::elu(1.0),
            Hidden::Softplus => Activation::Softplus,
            Hidden::Softsign => Activation::Softsign,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KernelChoice {
    /// Fastest kernel the CPU supports
    Auto,
    /// Generic scalar loop
    Portable,
}

impl KernelChoice {
    fn resolve(self) -> DenseKernel {
        match self {
            KernelChoice::Auto => DenseKernel::detect(),
            KernelChoice::Portable => DenseKernel::Portable,
        }
    }
}

// =============================================================================
// Entry point
// =============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Predict(args) => predict(&args),
        Command::Inspect { file } => inspect(&file),
    }
}

// =============================================================================
// predict
// =============================================================================

fn predict(args: &PredictArgs) -> Result<()> {
    let weights: Vec<Tensor<f32>> = ff_io::load_npz(&args.weights)
        .with_context(|| format!("loading weights from {}", args.weights.display()))?;
    let model = build_mlp(&weights, args.hidden.activation(), args.kernel.resolve())?;
    tracing::info!(
        layers = weights.len() / 2,
        kernel = %args.kernel.resolve(),
        "built model"
    );
    tracing::debug!("\n{model}");

    let input = load_as_f32(&args.input)
        .with_context(|| format!("loading input from {}", args.input.display()))?;
    let outputs = model.predict(&input).context("running model")?;
    let probs = &outputs[0];

    for row in 0..probs.dim(0) {
        let scores = probs.sub(row)?;
        let (class, p) = argmax(scores.as_slice());
        println!("{row}\t{class}\t{p:.4}");
    }

    if let Some(path) = &args.expected {
        let expected = load_as_f32(path)
            .with_context(|| format!("loading labels from {}", path.display()))?;
        let targets = one_hot(&expected, probs.dim(0), probs.dim(1))?;
        let loss = cross_entropy(probs, &targets);
        let accuracy = accuracy(probs, &targets);
        println!("loss {loss:.6}\taccuracy {:.2}%", accuracy * 100.0);
    }

    if let Some(path) = &args.output {
        ff_io::save_npy(probs, path)
            .with_context(|| format!("writing probabilities to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote probabilities");
    }
    Ok(())
}

/// Flatten -> (Dense -> hidden)* -> Dense -> Softmax(-1) over consecutive
/// kernel/bias pairs.
fn build_mlp(
    weights: &[Tensor<f32>],
    hidden: Activation<f32>,
    kernel: DenseKernel,
) -> Result<Model<f32>> {
    ensure!(
        !weights.is_empty() && weights.len() % 2 == 0,
        "expected kernel/bias pairs, found {} arrays",
        weights.len()
    );

    let pairs = weights.len() / 2;
    let mut layers: Vec<Layer<f32>> = vec![Flatten.into()];
    for (i, pair) in weights.chunks(2).enumerate() {
        let dense = Dense::new(&pair[0], &pair[1])
            .with_context(|| format!("dense layer {i}"))?
            .with_kernel(kernel);
        layers.push(dense.into());
        if i + 1 < pairs {
            layers.push(hidden.clone().into());
        } else {
            layers.push(Activation::softmax(-1).into());
        }
    }

    let mut model = Model::new(1);
    let last = model.add_layers(layers, None)?;
    model.set_output(last, 0)?;
    Ok(model)
}

fn load_as_f32(path: &Path) -> Result<Tensor<f32>> {
    let header = npy::read_header(&mut BufReader::new(File::open(path)?))?;
    macro_rules! load_cast {
        ($($kind:ident => $t:ty),*) => {
            match header.dtype {
                $(DType::$kind => ff_io::load_npy::<$t>(path)?.cast::<f32>(),)*
            }
        };
    }
    Ok(load_cast!(
        I8 => i8, I16 => i16, I32 => i32, I64 => i64,
        U8 => u8, U16 => u16, U32 => u32, U64 => u64,
        F32 => f32, F64 => f64
    ))
}

/// Labels as a `[rows, classes]` distribution: one-hot rows pass through,
/// a vector of class indices is expanded.
fn one_hot(expected: &Tensor<f32>, rows: usize, classes: usize) -> Result<Tensor<f32>> {
    if expected.dims() == [rows, classes] {
        return Ok(expected.clone());
    }
    if expected.dims() != [rows] {
        bail!(
            "labels of shape {} match neither [{rows}] nor [{rows}, {classes}]",
            expected.shape()
        );
    }
    let mut targets = Tensor::zeros([rows, classes]);
    for (row, &label) in expected.as_slice().iter().enumerate() {
        ensure!(
            label >= 0.0 && label.fract() == 0.0 && (label as usize) < classes,
            "label {label} of sample {row} is not a class index"
        );
        targets.set(&[row, label as usize], 1.0)?;
    }
    Ok(targets)
}

/// Mean categorical cross-entropy over the batch.
fn cross_entropy(probs: &Tensor<f32>, targets: &Tensor<f32>) -> f64 {
    let classes = probs.dim(1).max(1);
    let rows = probs.dim(0).max(1);
    let total: f64 = probs
        .as_slice()
        .chunks(classes)
        .zip(targets.as_slice().chunks(classes))
        .map(|(p, t)| {
            p.iter()
                .zip(t)
                .map(|(&p, &t)| -(t as f64) * (p as f64).max(1e-12).ln())
                .sum::<f64>()
        })
        .sum();
    total / rows as f64
}

fn accuracy(probs: &Tensor<f32>, targets: &Tensor<f32>) -> f64 {
    let classes = probs.dim(1).max(1);
    let rows = probs.dim(0);
    if rows == 0 {
        return 0.0;
    }
    let hits = probs
        .as_slice()
        .chunks(classes)
        .zip(targets.as_slice().chunks(classes))
        .filter(|(p, t)| argmax(p).0 == argmax(t).0)
        .count();
    hits as f64 / rows as f64
}

fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}

// =============================================================================
// inspect
// =============================================================================

fn inspect(path: &Path) -> Result<()> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("opening {}", path.display()))?,
    );
    let is_npz = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("npz"));

    let headers = if is_npz {
        ff_io::npz::read_npz_headers(reader)?
    } else {
        let mut reader = reader;
        vec![(path.display().to_string(), npy::read_header(&mut reader)?)]
    };

    for (name, header) in headers {
        let order = if header.big_endian { "big-endian" } else { "little-endian" };
        let layout = if header.fortran_order { ", fortran order" } else { "" };
        println!(
            "{name}\t{}\t{}\t{order}{layout}",
            header.dtype,
            Shape::from(header.shape)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(data: Vec<f32>, shape: &[usize]) -> Tensor<f32> {
        Tensor::from_vec(data, shape).unwrap()
    }

    #[test]
    fn test_build_mlp_shapes() {
        let weights = vec![
            Tensor::full([4, 3], 0.1),
            Tensor::zeros([3]),
            Tensor::full([3, 2], 0.2),
            Tensor::zeros([2]),
        ];
        let model = build_mlp(&weights, Activation::relu(), DenseKernel::Portable).unwrap();
        // input, flatten, dense, relu, dense, softmax, output
        assert_eq!(model.node_count(), 7);

        let out = model.predict(&Tensor::full([5, 2, 2], 1.0)).unwrap();
        assert_eq!(out[0].dims(), &[5, 2]);
        assert!((out[0].at(&[0, 0]).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_build_mlp_rejects_odd_arrays() {
        let weights = vec![Tensor::<f32>::zeros([2, 2])];
        assert!(build_mlp(&weights, Activation::relu(), DenseKernel::Portable).is_err());
    }

    #[test]
    fn test_one_hot_from_indices() {
        let targets = one_hot(&tensor(vec![2.0, 0.0], &[2]), 2, 3).unwrap();
        assert_eq!(targets.as_slice(), &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert!(one_hot(&tensor(vec![3.0], &[1]), 1, 3).is_err());
        assert!(one_hot(&tensor(vec![2.7], &[1]), 1, 3).is_err());
        assert!(one_hot(&tensor(vec![-1.0], &[1]), 1, 3).is_err());
        assert!(one_hot(&tensor(vec![0.0; 4], &[2, 2]), 2, 3).is_err());
    }

    #[test]
    fn test_cross_entropy_and_accuracy() {
        let probs = tensor(vec![0.5, 0.5, 0.9, 0.1], &[2, 2]);
        let targets = tensor(vec![1.0, 0.0, 0.0, 1.0], &[2, 2]);
        let expected = -(0.5f64.ln() + (0.1f32 as f64).ln()) / 2.0;
        assert!((cross_entropy(&probs, &targets) - expected).abs() < 1e-6);
        assert_eq!(accuracy(&probs, &targets), 0.5);
    }

    #[test]
    fn test_argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.7, 0.7]), (1, 0.7));
    }
}
