//! Corpus ingestion into vocabularies and instances.
//!
//! The training corpus is admitted first while both tables are open, so its
//! counts drive UNK substitution. The tables are then sealed and the
//! held-out corpus is mapped through them read-only.

use std::path::Path;

use anyhow::{Context as _, bail};
use seqtag_core::{CorpusReader, Instance, TaggedSentence, Vocab};
use tracing::info;

/// Sealed vocabularies plus training and held-out instances.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub words: Vocab,
    pub tags: Vocab,
    pub train: Vec<Instance>,
    pub devel: Vec<Instance>,
}

impl Dataset {
    /// Build from already parsed sentences.
    ///
    /// Unseen held-out words become UNK. A held-out tag never seen in
    /// training is an error: the tag table has no UNK to fall back on.
    pub fn from_sentences(train: &[TaggedSentence], devel: &[TaggedSentence]) -> anyhow::Result<Self> {
        if train.is_empty() {
            bail!("training corpus is empty");
        }

        let mut words = Vocab::new();
        let mut tags = Vocab::new();
        let train = train
            .iter()
            .map(|sentence| Instance::admit(sentence, &mut words, &mut tags))
            .collect::<Result<Vec<_>, _>>()?;

        words.seal_words()?;
        tags.seal_tags()?;

        let mut held_out = Vec::with_capacity(devel.len());
        for (index, sentence) in devel.iter().enumerate() {
            let instance = Instance::admit(sentence, &mut words, &mut tags).with_context(|| {
                format!("held-out sentence {} does not fit the training vocabularies", index + 1)
            })?;
            held_out.push(instance);
        }

        info!(
            train = train.len(),
            devel = held_out.len(),
            words = words.len(),
            tags = tags.len() - 1,
            "dataset prepared"
        );

        Ok(Self {
            words,
            tags,
            train,
            devel: held_out,
        })
    }

    /// Read annotated files and build the dataset.
    pub fn load(train_path: &Path, devel_path: Option<&Path>) -> anyhow::Result<Self> {
        let reader = CorpusReader::new()?;
        let train = reader
            .read_annotated(train_path)
            .with_context(|| format!("reading training corpus {}", train_path.display()))?;
        let devel = match devel_path {
            Some(path) => reader
                .read_annotated(path)
                .with_context(|| format!("reading held-out corpus {}", path.display()))?,
            None => Vec::new(),
        };
        Self::from_sentences(&train, &devel)
    }
}
