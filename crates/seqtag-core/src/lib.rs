//! # seqtag core
//!
//! Bidirectional-context sequence tagger. Each word is read by a left-to-right
//! and a right-to-left LSTM; an output head combines both states with the
//! previously chosen tag and picks the next tag greedily, or decodes the whole
//! sentence with a CRF when configured that way.
//!
//! ## Quick Start
//!
//! ```rust
//! use seqtag_core::{Context, CorpusReader, Instance, ModelConfig, Tagger, Vocab};
//!
//! let reader = CorpusReader::new().unwrap();
//! let sentence = reader.parse_annotated("I_PRP\tsaw_VBD\tit_PRP", 1).unwrap().unwrap();
//!
//! let mut words = Vocab::new();
//! let mut tags = Vocab::new();
//! Instance::admit(&sentence, &mut words, &mut tags).unwrap();
//! words.seal_words().unwrap();
//! tags.seal_tags().unwrap();
//!
//! let config = ModelConfig::new().with_word_dim(8).with_rnn(1, 8);
//! let tagger = Tagger::new(config, words, tags, &mut Context::new(1)).unwrap();
//! assert_eq!(tagger.tag(&["I", "saw", "them"]).unwrap().len(), 3);
//! ```
pub mod context;
pub mod corpus;
pub mod error;
pub mod model;
pub mod persist;
pub mod stats;
pub mod vocab;

// Re-export primary API
pub use context::Context;
pub use corpus::{CorpusReader, Instance, NUM_PLACEHOLDER, TaggedSentence};
pub use error::{Result, TaggerError};
pub use model::{
    GoldTags, GreedyFeedback, ModelConfig, OutputHeadKind, ParamSnapshot, TagSource, Tagger,
    ViterbiDecoder,
};
pub use stats::Stats;
pub use vocab::{EOS, SOS, SOS_TAG, UNK, UnkPolicy, Vocab, VocabRecord};
