//! # Model Persistence
//!
//! A model is one safetensors file. Its metadata holds a JSON header written
//! in a fixed order: format version, vocabulary sizes, hyperparameters, word
//! vocabulary, tag vocabulary. The tensors that follow are the parameters,
//! keyed by name. Loading rebuilds the structure from the header before any
//! tensor is copied in.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use candle_core::Tensor;
use safetensors::SafeTensors;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TaggerError};
use crate::model::params::{self, ParamSnapshot};
use crate::model::{ModelConfig, Tagger, WORD_EMBEDDING};
use crate::vocab::{Vocab, VocabRecord};

/// Metadata key carrying the JSON header.
const HEADER_KEY: &str = "seqtag.header";

/// Bumped whenever the header layout changes.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ModelHeader {
    format_version: u32,
    word_vocab_size: usize,
    tag_vocab_size: usize,
    config: ModelConfig,
    words: VocabRecord,
    tags: VocabRecord,
}

impl Tagger {
    /// Write vocabularies, hyperparameters and the current parameters.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save_params(path, &self.snapshot()?)
    }

    /// Write vocabularies and hyperparameters together with `params`, which
    /// must match this model's structure. The live parameters are untouched.
    pub fn save_params<P: AsRef<Path>>(&self, path: P, params: &ParamSnapshot) -> Result<()> {
        let path = path.as_ref();
        let header = ModelHeader {
            format_version: FORMAT_VERSION,
            word_vocab_size: self.words().len(),
            tag_vocab_size: self.tags().len(),
            config: self.config().clone(),
            words: self.words().to_record(),
            tags: self.tags().to_record(),
        };

        let live = params::sorted_vars(self.varmap())?;
        if live.len() != params.len() {
            return Err(TaggerError::DimensionMismatch {
                what: "parameter count".into(),
                expected: live.len(),
                found: params.len(),
            });
        }

        let metadata = HashMap::from([(HEADER_KEY.to_string(), serde_json::to_string(&header)?)]);
        safetensors::serialize_to_file(params.iter(), &Some(metadata), path)?;

        debug!(path = %path.display(), tensors = params.len(), "model saved");
        Ok(())
    }

    /// Rebuild a tagger from a file written by [`Tagger::save`].
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if a stored vocabulary size disagrees with the
    /// stored vocabulary, `InvalidModel` if the header or any tensor is
    /// missing or misshapen.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buffer = std::fs::read(path)?;

        let (_, metadata) = SafeTensors::read_metadata(&buffer)?;
        let raw_header = metadata
            .metadata()
            .as_ref()
            .and_then(|m| m.get(HEADER_KEY))
            .ok_or_else(|| TaggerError::InvalidModel("missing model header".into()))?;
        let header: ModelHeader = serde_json::from_str(raw_header)?;

        if header.format_version != FORMAT_VERSION {
            return Err(TaggerError::InvalidModel(format!(
                "unsupported format version {}",
                header.format_version
            )));
        }

        let words = Vocab::from_record(header.words)?;
        let tags = Vocab::from_record(header.tags)?;
        check_size("word vocabulary", header.word_vocab_size, words.len())?;
        check_size("tag vocabulary", header.tag_vocab_size, tags.len())?;

        let tagger = Tagger::build(header.config, words, tags)?;

        let tensors = candle_core::safetensors::load_buffer(&buffer, tagger.device())?;
        let vars = params::sorted_vars(tagger.varmap())?;
        check_size("parameter count", vars.len(), tensors.len())?;
        for (name, var) in &vars {
            let tensor = tensors
                .get(name)
                .ok_or_else(|| TaggerError::InvalidModel(format!("missing parameter {name}")))?;
            params::assign(name, var, tensor)?;
        }

        debug!(path = %path.display(), tensors = vars.len(), "model loaded");
        Ok(tagger)
    }

    /// Initialize word embeddings from a `word v1 … vN` text table. Words are
    /// normalized like corpus words before lookup, and when several rows
    /// collapse onto one entry (e.g. `1999` and `2024` onto `<NUM>`) the first
    /// wins. Rows for words absent from the vocabulary are ignored and UNK is
    /// never overwritten. A leading `count dim` line is skipped. Returns the
    /// number of rows imported.
    pub fn load_pretrained<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let dim = self.config().word_dim;
        let unk = self.words().unk();

        let vars = params::sorted_vars(self.varmap())?;
        let (_, embedding) = vars
            .iter()
            .find(|(name, _)| name == WORD_EMBEDDING)
            .ok_or_else(|| TaggerError::InvalidModel(format!("missing parameter {WORD_EMBEDDING}")))?;
        let mut table = embedding.as_tensor().to_vec2::<f32>()?;
        let mut filled = vec![false; table.len()];

        let reader = BufReader::new(File::open(path)?);
        let mut imported = 0usize;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let values: Vec<&str> = fields.collect();

            if index == 0 && values.len() == 1 && word.parse::<usize>().is_ok() {
                continue;
            }
            if values.len() != dim {
                return Err(TaggerError::InvalidEmbedding {
                    line: index + 1,
                    reason: format!("expected {dim} values, found {}", values.len()),
                });
            }

            let Some(row) = self.words().index_of(&self.reader().normalize(word)) else {
                continue;
            };
            if Some(row) == unk || filled[row as usize] {
                continue;
            }

            let parsed = values
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| TaggerError::InvalidEmbedding {
                    line: index + 1,
                    reason: e.to_string(),
                })?;
            table[row as usize] = parsed;
            filled[row as usize] = true;
            imported += 1;
        }

        let rows = table.len();
        let flat: Vec<f32> = table.into_iter().flatten().collect();
        params::assign(
            WORD_EMBEDDING,
            embedding,
            &Tensor::from_vec(flat, (rows, dim), self.device())?,
        )?;

        info!(path = %path.display(), imported, "pretrained embeddings loaded");
        Ok(imported)
    }
}

fn check_size(what: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(TaggerError::DimensionMismatch {
            what: what.into(),
            expected,
            found,
        });
    }
    Ok(())
}
