//! # Bidirectional Tagger
//!
//! Wires the word embedding table, the [`SentenceEncoder`] and the
//! [`TagScorer`] into one model whose structure is fixed by two frozen
//! vocabularies. Every call builds its own tensors and drops them on return,
//! so exactly one sentence graph is alive at a time.

pub mod decoder;
pub mod encoder;
pub mod params;
pub mod scorer;
pub mod viterbi;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{Embedding, Module, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::corpus::CorpusReader;
use crate::error::{Result, TaggerError};
use crate::stats::Stats;
use crate::vocab::{EOS, SOS, SOS_TAG, Vocab};

pub use decoder::{GoldTags, GreedyFeedback, TagSource, argmax};
pub use encoder::{Encoded, SentenceEncoder};
pub use params::ParamSnapshot;
pub use scorer::{OutputHeadKind, ScorerDims, TagScorer};
pub use viterbi::ViterbiDecoder;

/// Name of the word embedding parameter in the variable map.
pub(crate) const WORD_EMBEDDING: &str = "word_embedding.weight";

/// Model hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Word embedding width.
    pub word_dim: usize,
    /// Previous-tag embedding width.
    pub tag_dim: usize,
    /// Stacked LSTM layers per direction.
    pub rnn_layers: usize,
    /// LSTM hidden width per direction.
    pub rnn_hidden: usize,
    /// Width of the tag hidden layer.
    pub tag_hidden: usize,
    /// Standard deviation of the Gaussian noise added to input embeddings
    /// during training. Zero disables it.
    pub embedding_noise: f32,
    /// Output head strategy.
    pub head: OutputHeadKind,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            word_dim: 64,
            tag_dim: 32,
            rnn_layers: 1,
            rnn_hidden: 100,
            tag_hidden: 32,
            embedding_noise: 0.1,
            head: OutputHeadKind::Softmax,
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_word_dim(mut self, dim: usize) -> Self {
        self.word_dim = dim;
        self
    }

    pub fn with_tag_dim(mut self, dim: usize) -> Self {
        self.tag_dim = dim;
        self
    }

    pub fn with_rnn(mut self, layers: usize, hidden: usize) -> Self {
        self.rnn_layers = layers.max(1);
        self.rnn_hidden = hidden;
        self
    }

    pub fn with_tag_hidden(mut self, dim: usize) -> Self {
        self.tag_hidden = dim;
        self
    }

    pub fn with_embedding_noise(mut self, std: f32) -> Self {
        self.embedding_noise = std.max(0.0);
        self
    }

    pub fn with_head(mut self, head: OutputHeadKind) -> Self {
        self.head = head;
        self
    }
}

/// Sentence tagger: vocabularies plus network parameters.
pub struct Tagger {
    config: ModelConfig,
    words: Vocab,
    tags: Vocab,
    reader: CorpusReader,
    varmap: VarMap,
    word_embedding: Embedding,
    encoder: SentenceEncoder,
    scorer: TagScorer,
    sos: u32,
    eos: u32,
    device: Device,
}

impl Tagger {
    /// Allocate a model sized by the frozen vocabularies and draw its
    /// initial parameters from `ctx`.
    ///
    /// # Errors
    ///
    /// `VocabularyNotFrozen` if either table is still open, `MissingSentinel`
    /// if SOS/EOS/UNK or the trailing SOS-tag entry is absent.
    pub fn new(config: ModelConfig, words: Vocab, tags: Vocab, ctx: &mut Context) -> Result<Self> {
        let tagger = Self::build(config, words, tags)?;
        params::initialize(&tagger.varmap, ctx)?;
        Ok(tagger)
    }

    /// Allocate the structure without touching parameter values.
    pub(crate) fn build(config: ModelConfig, words: Vocab, tags: Vocab) -> Result<Self> {
        if !words.is_frozen() {
            return Err(TaggerError::VocabularyNotFrozen("word"));
        }
        if !tags.is_frozen() {
            return Err(TaggerError::VocabularyNotFrozen("tag"));
        }
        let sos = words.index_of(SOS).ok_or(TaggerError::MissingSentinel(SOS))?;
        let eos = words.index_of(EOS).ok_or(TaggerError::MissingSentinel(EOS))?;
        if words.unk().is_none() {
            return Err(TaggerError::MissingSentinel(crate::vocab::UNK));
        }
        if tags.len() < 2 || tags.index_of(SOS_TAG) != Some(tags.len() as u32 - 1) {
            return Err(TaggerError::MissingSentinel(SOS_TAG));
        }

        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let word_embedding =
            candle_nn::embedding(words.len(), config.word_dim, vb.pp("word_embedding"))?;
        let encoder = SentenceEncoder::new(
            config.word_dim,
            config.rnn_hidden,
            config.rnn_layers.max(1),
            vb.pp("encoder"),
        )?;
        let dims = ScorerDims {
            rnn_hidden: config.rnn_hidden,
            tag_hidden: config.tag_hidden,
            tag_dim: config.tag_dim,
            num_tags: tags.len() - 1,
        };
        let scorer = TagScorer::new(config.head, dims, vb.pp("scorer"))?;

        debug!(
            words = words.len(),
            tags = dims.num_tags,
            head = ?config.head,
            "model structure built"
        );

        Ok(Self {
            config,
            words,
            tags,
            reader: CorpusReader::new()?,
            varmap,
            word_embedding,
            encoder,
            scorer,
            sos,
            eos,
            device,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn words(&self) -> &Vocab {
        &self.words
    }

    pub fn tags(&self) -> &Vocab {
        &self.tags
    }

    /// Number of legal output tags (the SOS-tag sentinel excluded).
    pub fn num_tags(&self) -> usize {
        self.scorer.num_tags()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn reader(&self) -> &CorpusReader {
        &self.reader
    }

    pub(crate) fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Every trainable variable, for handing to an optimizer.
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    /// Deep copy of the current parameters.
    pub fn snapshot(&self) -> Result<ParamSnapshot> {
        params::snapshot(&self.varmap)
    }

    /// Overwrite the live parameters with `snapshot`.
    pub fn restore(&self, snapshot: &ParamSnapshot) -> Result<()> {
        params::restore(&self.varmap, snapshot)
    }

    /// Embed `[SOS, w_1…w_n]` and `[EOS, w_n…w_1]`, optionally jittered, and
    /// run both encoder directions.
    fn encode(&self, words: &[u32], noise: Option<&mut Context>) -> Result<Encoded> {
        let n = words.len();
        let mut ids = Vec::with_capacity(n + 2);
        ids.push(self.sos);
        ids.extend_from_slice(words);
        ids.push(self.eos);

        let ids = Tensor::new(ids.as_slice(), &self.device)?;
        let mut embedded = self.word_embedding.forward(&ids)?;

        if let Some(ctx) = noise {
            if self.config.embedding_noise > 0.0 {
                let jitter = ctx.noise((n + 2) * self.config.word_dim, self.config.embedding_noise);
                let jitter = Tensor::from_vec(jitter, (n + 2, self.config.word_dim), &self.device)?;
                embedded = embedded.add(&jitter)?;
            }
        }

        let l2r_rows: Vec<u32> = (0..=n as u32).collect();
        let r2l_rows: Vec<u32> = (1..=n as u32 + 1).rev().collect();
        let l2r = embedded.index_select(&Tensor::new(l2r_rows.as_slice(), &self.device)?, 0)?;
        let r2l = embedded.index_select(&Tensor::new(r2l_rows.as_slice(), &self.device)?, 0)?;

        Ok(self.encoder.encode(&l2r, &r2l)?)
    }

    /// Training loss of one sentence under teacher forcing.
    ///
    /// `words` should already have gone through UNK substitution. Input
    /// embeddings are jittered from `ctx`. When `stats` is given, each
    /// position's argmax is compared with gold before the loss is formed.
    /// An empty sentence yields a constant zero.
    pub fn loss(
        &self,
        words: &[u32],
        gold: &[u32],
        ctx: &mut Context,
        stats: Option<&mut Stats>,
    ) -> Result<Tensor> {
        if words.len() != gold.len() {
            return Err(TaggerError::LengthMismatch {
                words: words.len(),
                tags: gold.len(),
            });
        }
        if words.is_empty() {
            return Ok(Tensor::zeros((), DType::F32, &self.device)?);
        }

        let encoded = self.encode(words, Some(ctx))?;
        let scored = self.scorer.score(&encoded, &mut GoldTags::new(gold))?;

        if let Some(stats) = stats {
            for (&predicted, &tag) in scored.argmax.iter().zip(gold) {
                stats.observe(predicted, tag);
            }
        }

        Ok(self.scorer.loss(&scored, gold)?)
    }

    /// Decode a sentence of word indices. Deterministic for fixed
    /// parameters; an empty sentence gives an empty result without running
    /// the encoder.
    pub fn predict(&self, words: &[u32]) -> Result<Vec<u32>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }
        let encoded = self.encode(words, None)?;
        let mut feedback = GreedyFeedback::with_capacity(words.len());
        self.scorer.score(&encoded, &mut feedback)?;
        Ok(feedback.into_path())
    }

    /// Normalize and look up raw tokens; unseen ones become UNK.
    pub fn index_words<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<u32>> {
        tokens
            .iter()
            .map(|t| self.words.lookup(&self.reader.normalize(t.as_ref())))
            .collect()
    }

    /// Tag raw tokens, returning tag strings.
    pub fn tag<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<String>> {
        let ids = self.index_words(tokens)?;
        self.predict(&ids)?
            .into_iter()
            .map(|tag| {
                self.tags
                    .token(tag)
                    .map(str::to_string)
                    .ok_or_else(|| TaggerError::InvalidModel(format!("tag index {tag} out of range")))
            })
            .collect()
    }

    /// Tag `words` and count agreement with `gold`.
    pub fn evaluate(&self, words: &[u32], gold: &[u32], stats: &mut Stats) -> Result<Vec<u32>> {
        let predicted = self.predict(words)?;
        for (&p, &g) in predicted.iter().zip(gold) {
            stats.observe(p, g);
        }
        Ok(predicted)
    }
}
