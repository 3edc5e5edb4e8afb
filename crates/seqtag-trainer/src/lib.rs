//! # seqtag trainer
//!
//! Turns annotated corpora into a trained [`seqtag_core::Tagger`]: corpus
//! ingestion, the SGD training loop, held-out evaluation and the best-so-far
//! checkpoint that is persisted at the end of a run.

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod trainer;

pub use checkpoint::Checkpoint;
pub use config::TrainConfig;
pub use data::Dataset;
pub use trainer::Trainer;
