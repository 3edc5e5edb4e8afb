//! Fit a tagger on an annotated corpus and save the best checkpoint.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use seqtag_core::OutputHeadKind;
use seqtag_trainer::{Dataset, TrainConfig, Trainer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Head {
    Softmax,
    Crf,
}

impl From<Head> for OutputHeadKind {
    fn from(head: Head) -> Self {
        match head {
            Head::Softmax => OutputHeadKind::Softmax,
            Head::Crf => OutputHeadKind::Crf,
        }
    }
}

/// CLI arguments
#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train a bidirectional sequence tagger")]
#[command(version)]
struct Cli {
    /// Annotated training corpus (tab-separated word_TAG pairs)
    #[arg(short, long)]
    train: PathBuf,

    /// Annotated held-out corpus for checkpoint selection
    #[arg(short, long)]
    devel: Option<PathBuf>,

    /// Output model file
    #[arg(short, long, default_value = "model.safetensors")]
    output: PathBuf,

    /// JSON training configuration; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretrained word vectors (`word v1 ... vN` per line)
    #[arg(long)]
    pretrained: Option<PathBuf>,

    #[arg(long)]
    max_epoch: Option<u32>,
    #[arg(long)]
    report_freq: Option<usize>,
    #[arg(long)]
    devel_freq: Option<usize>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long)]
    eta_decay: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,

    /// Words seen at most this often may be replaced by UNK
    #[arg(long)]
    unk_threshold: Option<u32>,
    /// Replacement probability for rare words
    #[arg(long)]
    unk_prob: Option<f64>,

    #[arg(long)]
    word_dim: Option<usize>,
    #[arg(long)]
    tag_dim: Option<usize>,
    #[arg(long)]
    rnn_layers: Option<usize>,
    #[arg(long)]
    rnn_hidden: Option<usize>,
    #[arg(long)]
    tag_hidden: Option<usize>,
    #[arg(long)]
    embedding_noise: Option<f32>,
    #[arg(long, value_enum)]
    head: Option<Head>,
}

impl Cli {
    fn resolve_config(&self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)?,
            None => TrainConfig::default(),
        };

        if let Some(v) = self.max_epoch {
            config.max_epoch = v;
        }
        if let Some(v) = self.report_freq {
            config.report_freq = v;
        }
        if let Some(v) = self.devel_freq {
            config.devel_freq = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if let Some(v) = self.eta_decay {
            config.eta_decay = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.unk_threshold {
            config.unk.frequency_threshold = v;
        }
        if let Some(v) = self.unk_prob {
            config.unk.probability = v;
        }

        let model = &mut config.model;
        if let Some(v) = self.word_dim {
            model.word_dim = v;
        }
        if let Some(v) = self.tag_dim {
            model.tag_dim = v;
        }
        if let Some(v) = self.rnn_layers {
            model.rnn_layers = v.max(1);
        }
        if let Some(v) = self.rnn_hidden {
            model.rnn_hidden = v;
        }
        if let Some(v) = self.tag_hidden {
            model.tag_hidden = v;
        }
        if let Some(v) = self.embedding_noise {
            model.embedding_noise = v.max(0.0);
        }
        if let Some(v) = self.head {
            model.head = v.into();
        }

        Ok(config)
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    info!(config = %serde_json::to_string(&config)?, "configuration");

    let data = Dataset::load(&cli.train, cli.devel.as_deref())?;
    let mut trainer = Trainer::new(config, data.words, data.tags)?;

    if let Some(path) = &cli.pretrained {
        trainer
            .tagger()
            .load_pretrained(path)
            .with_context(|| format!("loading pretrained vectors {}", path.display()))?;
    }

    trainer.train(&data.train, &data.devel)?;
    trainer.save(&cli.output)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Training failed: {e:#}");
        std::process::exit(1);
    }
}
