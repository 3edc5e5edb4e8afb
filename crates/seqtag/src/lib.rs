//! # seqtag
//!
//! Bidirectional-context sequence tagging for part-of-speech tagging, word
//! segmentation and named-entity recognition. This crate re-exports the
//! model from `seqtag-core` and the training loop from `seqtag-trainer`.

pub use seqtag_core::*;
pub use seqtag_trainer::{Checkpoint, Dataset, TrainConfig, Trainer};

/// Training-side modules.
pub mod trainer {
    pub use seqtag_trainer::*;
}
