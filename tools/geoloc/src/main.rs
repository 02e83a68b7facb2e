//! Command-line front end: train a geolocator, classify documents onto the
//! grid, evaluate accuracy on a labeled set, or run the experimental
//! weight-tuning pass.
//!
//! Results go to stdout; progress and diagnostics go to stderr.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use geoloc_core::classify::{classify_cell, estimate_coords};
use geoloc_core::corpus;
use geoloc_core::evaluate::evaluate;
use geoloc_core::model::read_model;
use geoloc_core::tune::tune;
use geoloc_core::{Config, DenseMatrix, Model};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "geoloc",
    about = "Train a geolocator and classify text documents on a geodesic grid"
)]
struct Args {
    /// Train a geolocator.
    #[arg(short = 'r', long)]
    train: bool,

    /// Classify documents into cells on the earth (the default mode).
    #[arg(short = 'C', long)]
    classify: bool,

    /// Evaluate performance on a labeled dev/test set, with accuracy report.
    #[arg(short = 'e', long)]
    eval: bool,

    /// Perturb feature weights against a labeled dev set (experimental).
    #[arg(short = 'T', long)]
    tune: bool,

    /// Grid size: 360 degrees of longitude divided into this many ticks.
    #[arg(short = 'l', long, value_name = "LON", default_value_t = 360)]
    longranularity: usize,

    /// Train a vanilla grid classifier without kernel density estimation.
    #[arg(short = 'n', long)]
    nokde: bool,

    /// Read stopwords from FILE (one word per line).
    #[arg(short = 's', long, value_name = "FILE")]
    stopwords: Option<PathBuf>,

    /// Standard deviation of the KDE Gaussians, in degrees.
    #[arg(short = 'S', long, value_name = "SIGMA", default_value_t = 3.0)]
    sigma: f64,

    /// Must see a word/feature THR times to include it in the model.
    #[arg(short = 'x', long, value_name = "THR", default_value_t = 1)]
    threshold: usize,

    /// Don't store word matrices: smaller model, slower classification.
    #[arg(short = 'N', long)]
    nomatrix: bool,

    /// Use KL divergence as the classification method instead of Naive Bayes.
    #[arg(short = 'k', long)]
    kullback_leibler: bool,

    /// Print the whole distribution (the grid) at classification time.
    #[arg(short = 'M', long)]
    print_matrix: bool,

    /// Use the centroid of the most likely cell instead of its center.
    #[arg(short = 'c', long)]
    centroid: bool,

    /// Word/feature prior for a cell.
    #[arg(short = 'p', long, value_name = "X", default_value_t = 0.01)]
    prior: f64,

    /// Model unseen words/features instead of just skipping them.
    #[arg(short = 'u', long)]
    unk: bool,

    /// Output model or read model from FILE (default: model<LON>.gz).
    #[arg(short = 'm', long, value_name = "FILE")]
    modelfile: Option<PathBuf>,

    /// Where --tune writes the reweighted model.
    #[arg(long, value_name = "FILE", default_value = "tuned-model.gz")]
    tune_output: PathBuf,

    /// Input document file.
    #[arg(value_name = "DOCUMENTFILE")]
    documents: PathBuf,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            longranularity: self.longranularity,
            kde: !self.nokde,
            store_matrices: !self.nomatrix,
            sigma: self.sigma,
            threshold: self.threshold,
            word_prior: self.prior,
            tweet_prior: 1.0,
            unk: self.unk,
            complement_nb: false,
            kullback_leibler: self.kullback_leibler,
            use_centroid: self.centroid,
        }
    }

    fn model_path(&self) -> PathBuf {
        self.modelfile
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("model{}.gz", self.longranularity)))
    }
}

// ── Modes ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let modes = [args.train, args.classify, args.eval, args.tune];
    if modes.iter().filter(|&&m| m).count() > 1 {
        bail!("pick one of --train, --classify, --eval, --tune");
    }

    let config = args.config();
    let model_path = args.model_path();

    if args.train {
        let grid = config.grid()?;
        eprintln!(
            "Using {}/{} granularity; grid size = {}° x {}°",
            grid.lon_ticks(),
            grid.lat_ticks(),
            grid.delta(),
            grid.delta()
        );
        let stopwords = args
            .stopwords
            .as_deref()
            .map(corpus::read_stopwords)
            .transpose()
            .context("reading stopwords")?;
        geoloc_core::train::train(&args.documents, &model_path, stopwords.as_ref(), &config)
            .context("training model")?;
    } else if args.eval {
        let model = load_filtered(&args, &config, &model_path)?;
        let records = corpus::read_records(&args.documents)
            .with_context(|| format!("reading {}", args.documents.display()))?;
        evaluate(&model, &records);
    } else if args.tune {
        let mut model =
            read_model(&model_path, None, &config).context("reading model")?;
        let records = corpus::read_records(&args.documents)
            .with_context(|| format!("reading {}", args.documents.display()))?;
        tune(&mut model, &records, &args.tune_output).context("writing tuned model")?;
    } else {
        let model = load_filtered(&args, &config, &model_path)?;
        classify_documents(&args, &model)?;
    }
    Ok(())
}

/// Load the model, materializing only the features the input file can use.
fn load_filtered(args: &Args, config: &Config, model_path: &PathBuf) -> Result<Model> {
    let vocabulary = corpus::index_vocabulary(&args.documents)
        .with_context(|| format!("indexing {}", args.documents.display()))?;
    read_model(model_path, Some(&vocabulary), config).context("reading model")
}

/// Classify each input line and print either the estimated coordinate or
/// the full normalized posterior grid.
fn classify_documents(args: &Args, model: &Model) -> Result<()> {
    let file = File::open(&args.documents)
        .with_context(|| format!("opening {}", args.documents.display()))?;
    let mut posterior = args.print_matrix.then(|| DenseMatrix::zeros(&model.grid));
    for line in BufReader::new(file).lines() {
        let line = line.context("reading input")?;
        // Every field is a feature here; stray truth coordinates are simply
        // tokens the model has never seen.
        let tokens: Vec<String> = corpus::tokenize(&line).map(str::to_owned).collect();
        let cell = classify_cell(model, &tokens, posterior.as_mut());
        if let Some(posterior) = posterior.as_mut() {
            posterior.normalize_from_log();
            print_grid(posterior);
        } else {
            let (lat, lon) = estimate_coords(model, cell);
            println!("{lat},{lon}");
        }
    }
    Ok(())
}

/// Tab-separated grid, one row of cells per line, south first.
fn print_grid(posterior: &DenseMatrix) {
    for y in 0..posterior.height {
        let row: Vec<String> =
            (0..posterior.width).map(|x| posterior.get(x, y).to_string()).collect();
        println!("{}", row.join("\t"));
    }
}
