//! Training hyperparameters.

use std::path::Path;

use anyhow::Context as _;
use seqtag_core::{ModelConfig, UnkPolicy};
use serde::{Deserialize, Serialize};

/// Everything a training run needs besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of passes over the training set.
    pub max_epoch: u32,
    /// Log running statistics every this many samples. Zero disables.
    pub report_freq: usize,
    /// Evaluate on the held-out set every this many samples. Zero disables.
    pub devel_freq: usize,
    /// Initial SGD learning rate.
    pub learning_rate: f64,
    /// Epoch-level decay: `lr = lr0 / (1 + epoch * eta_decay)`.
    pub eta_decay: f64,
    /// Seed of the single random context.
    pub seed: u64,
    pub unk: UnkPolicy,
    pub model: ModelConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_epoch: 10,
            report_freq: 10_000,
            devel_freq: 50_000,
            learning_rate: 0.1,
            eta_decay: 0.08,
            seed: 1,
            unk: UnkPolicy::default(),
            model: ModelConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON file. Missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn with_max_epoch(mut self, epochs: u32) -> Self {
        self.max_epoch = epochs;
        self
    }

    pub fn with_report_freq(mut self, freq: usize) -> Self {
        self.report_freq = freq;
        self
    }

    pub fn with_devel_freq(mut self, freq: usize) -> Self {
        self.devel_freq = freq;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_eta_decay(mut self, decay: f64) -> Self {
        self.eta_decay = decay;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_unk(mut self, policy: UnkPolicy) -> Self {
        self.unk = policy;
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// Learning rate after `epoch` completed epochs.
    pub fn learning_rate_at(&self, epoch: u32) -> f64 {
        self.learning_rate / (1.0 + epoch as f64 * self.eta_decay)
    }
}
