//! # Frequency-Adaptive Vocabulary
//!
//! Bidirectional token/index mapping with a freeze lifecycle. While open, new
//! tokens are admitted and every occurrence is counted; once frozen, unseen
//! tokens map to the registered UNK index or fail. During training the
//! frequency table drives stochastic UNK substitution of rare words.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::error::{Result, TaggerError};

/// Start-of-sequence word sentinel, fed before the first token.
pub const SOS: &str = "<s>";
/// End-of-sequence word sentinel, fed before the last token in the reverse pass.
pub const EOS: &str = "</s>";
/// Out-of-vocabulary word.
pub const UNK: &str = "<unk>";
/// Previous-tag condition for the first position. Never a legal output.
pub const SOS_TAG: &str = "<s>";

/// When a rare training word is replaced by UNK.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnkPolicy {
    /// Words seen at most this many times are eligible for substitution.
    pub frequency_threshold: u32,
    /// Chance that an eligible occurrence is replaced.
    pub probability: f64,
}

impl Default for UnkPolicy {
    fn default() -> Self {
        Self {
            frequency_threshold: 1,
            probability: 0.2,
        }
    }
}

/// String/index table with occurrence counts.
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    token_to_index: HashMap<String, u32>,
    index_to_token: Vec<String>,
    counts: Vec<u32>,
    frozen: bool,
    unk: Option<u32>,
}

/// Serializable form of a [`Vocab`], tokens listed in index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabRecord {
    pub tokens: Vec<String>,
    pub counts: Vec<u32>,
    pub unk: Option<u32>,
}

impl Vocab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `token` to its index.
    ///
    /// Open tables admit unseen tokens and count every occurrence. Frozen
    /// tables behave like [`Vocab::lookup`] and leave counts untouched.
    pub fn convert(&mut self, token: &str) -> Result<u32> {
        if self.frozen {
            return self.lookup(token);
        }

        if let Some(&index) = self.token_to_index.get(token) {
            self.counts[index as usize] += 1;
            return Ok(index);
        }

        let index = self.index_to_token.len() as u32;
        self.token_to_index.insert(token.to_string(), index);
        self.index_to_token.push(token.to_string());
        self.counts.push(1);
        Ok(index)
    }

    /// Read-only mapping: the existing index, else UNK, else an error.
    pub fn lookup(&self, token: &str) -> Result<u32> {
        match (self.token_to_index.get(token), self.unk) {
            (Some(&index), _) => Ok(index),
            (None, Some(unk)) if self.frozen => Ok(unk),
            _ => Err(TaggerError::UnknownToken {
                token: token.to_string(),
            }),
        }
    }

    /// Index of `token` without UNK fallback.
    pub fn index_of(&self, token: &str) -> Option<u32> {
        self.token_to_index.get(token).copied()
    }

    /// Token stored at `index`.
    pub fn token(&self, index: u32) -> Option<&str> {
        self.index_to_token.get(index as usize).map(String::as_str)
    }

    /// Number of occurrences counted while the table was open.
    pub fn frequency(&self, index: u32) -> u32 {
        self.counts.get(index as usize).copied().unwrap_or(0)
    }

    /// Stop admitting tokens. Idempotent.
    pub fn freeze(&mut self) {
        if !self.frozen {
            debug!(size = self.len(), "vocabulary frozen");
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Mark `token` as the UNK entry. It is inserted first if the table is
    /// still open; a frozen table must already contain it.
    pub fn register_unk(&mut self, token: &str) -> Result<u32> {
        let index = match self.index_of(token) {
            Some(index) => index,
            None if !self.frozen => self.convert(token)?,
            None => return Err(TaggerError::MissingSentinel(UNK)),
        };
        self.unk = Some(index);
        Ok(index)
    }

    pub fn unk(&self) -> Option<u32> {
        self.unk
    }

    pub fn len(&self) -> usize {
        self.index_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_token.is_empty()
    }

    /// Tokens in index order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.index_to_token.iter().map(String::as_str)
    }

    /// Training-time only: replace a rare word by UNK with the policy's
    /// probability. Frequent words and UNK itself pass through unchanged.
    /// Drawn afresh on every call.
    pub fn substitute_unk(&self, index: u32, policy: &UnkPolicy, ctx: &mut Context) -> u32 {
        let Some(unk) = self.unk else {
            return index;
        };
        if index == unk || self.frequency(index) > policy.frequency_threshold {
            return index;
        }
        if ctx.uniform() < policy.probability {
            unk
        } else {
            index
        }
    }

    /// Finish a word table: insert SOS/EOS/UNK, freeze, then mark UNK. A
    /// corpus word spelled like a sentinel is rejected rather than merged.
    pub fn seal_words(&mut self) -> Result<()> {
        for sentinel in [SOS, EOS, UNK] {
            if self.index_of(sentinel).is_some() {
                return Err(TaggerError::MissingSentinel(sentinel));
            }
        }
        self.convert(SOS)?;
        self.convert(EOS)?;
        self.convert(UNK)?;
        self.freeze();
        self.register_unk(UNK)?;
        Ok(())
    }

    /// Finish a tag table: append the SOS-tag sentinel last and freeze, so
    /// real tags occupy `0..len() - 1`.
    pub fn seal_tags(&mut self) -> Result<()> {
        if self.index_of(SOS_TAG).is_some() {
            return Err(TaggerError::MissingSentinel(SOS_TAG));
        }
        self.convert(SOS_TAG)?;
        self.freeze();
        Ok(())
    }

    pub fn to_record(&self) -> VocabRecord {
        VocabRecord {
            tokens: self.index_to_token.clone(),
            counts: self.counts.clone(),
            unk: self.unk,
        }
    }

    /// Rebuild a frozen table from its record.
    pub fn from_record(record: VocabRecord) -> Result<Self> {
        if record.tokens.len() != record.counts.len() {
            return Err(TaggerError::DimensionMismatch {
                what: "vocabulary counts".into(),
                expected: record.tokens.len(),
                found: record.counts.len(),
            });
        }

        let mut token_to_index = HashMap::with_capacity(record.tokens.len());
        for (index, token) in record.tokens.iter().enumerate() {
            if token_to_index.insert(token.clone(), index as u32).is_some() {
                return Err(TaggerError::InvalidModel(format!(
                    "duplicate vocabulary entry {token:?}"
                )));
            }
        }
        if let Some(unk) = record.unk {
            if unk as usize >= record.tokens.len() {
                return Err(TaggerError::InvalidModel(format!(
                    "UNK index {unk} out of range"
                )));
            }
        }

        Ok(Self {
            token_to_index,
            index_to_token: record.tokens,
            counts: record.counts,
            frozen: true,
            unk: record.unk,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed(words: &[&str]) -> Vocab {
        let mut vocab = Vocab::new();
        for word in words {
            vocab.convert(word).unwrap();
        }
        vocab.seal_words().unwrap();
        vocab
    }

    #[test]
    fn test_indices_in_first_seen_order() {
        let mut vocab = Vocab::new();
        assert_eq!(vocab.convert("the").unwrap(), 0);
        assert_eq!(vocab.convert("cat").unwrap(), 1);
        assert_eq!(vocab.convert("the").unwrap(), 0);
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.frequency(0), 2);
        assert_eq!(vocab.frequency(1), 1);
    }

    #[test]
    fn test_round_trip() {
        let mut vocab = Vocab::new();
        for token in ["I", "saw", "it", "saw"] {
            let index = vocab.convert(token).unwrap();
            let back = vocab.token(index).unwrap();
            assert_eq!(vocab.index_of(back), Some(index));
        }
    }

    #[test]
    fn test_open_table_never_returns_unk_for_new_token() {
        let mut vocab = Vocab::new();
        let unk = vocab.register_unk(UNK).unwrap();
        for token in ["a", "b", "c"] {
            assert_ne!(vocab.convert(token).unwrap(), unk);
        }
    }

    #[test]
    fn test_frozen_maps_unseen_to_unk() {
        let mut vocab = sealed(&["dog"]);
        let unk = vocab.unk().unwrap();
        let size = vocab.len();

        assert_eq!(vocab.convert("zebra").unwrap(), unk);
        assert_eq!(vocab.lookup("zebra").unwrap(), unk);
        assert_eq!(vocab.len(), size);
    }

    #[test]
    fn test_frozen_without_unk_fails() {
        let mut vocab = Vocab::new();
        vocab.convert("NN").unwrap();
        vocab.freeze();

        let err = vocab.convert("VB").unwrap_err();
        assert!(matches!(err, TaggerError::UnknownToken { .. }));
    }

    #[test]
    fn test_counts_not_updated_after_freeze() {
        let mut vocab = sealed(&["dog"]);
        let dog = vocab.index_of("dog").unwrap();
        assert_eq!(vocab.frequency(dog), 1);

        vocab.convert("dog").unwrap();
        vocab.convert("dog").unwrap();
        assert_eq!(vocab.frequency(dog), 1);
    }

    #[test]
    fn test_substitution_never_touches_frequent_words() {
        let vocab = sealed(&["dog", "dog", "cat"]);
        let dog = vocab.index_of("dog").unwrap();
        let policy = UnkPolicy {
            frequency_threshold: 1,
            probability: 1.0,
        };
        let mut ctx = Context::new(9);

        for _ in 0..1000 {
            assert_eq!(vocab.substitute_unk(dog, &policy, &mut ctx), dog);
        }
    }

    #[test]
    fn test_substitution_of_rare_words() {
        let vocab = sealed(&["dog", "dog", "cat"]);
        let cat = vocab.index_of("cat").unwrap();
        let unk = vocab.unk().unwrap();
        let mut ctx = Context::new(9);

        let always = UnkPolicy {
            frequency_threshold: 1,
            probability: 1.0,
        };
        assert_eq!(vocab.substitute_unk(cat, &always, &mut ctx), unk);
        assert_eq!(vocab.substitute_unk(unk, &always, &mut ctx), unk);

        let never = UnkPolicy {
            frequency_threshold: 1,
            probability: 0.0,
        };
        assert_eq!(vocab.substitute_unk(cat, &never, &mut ctx), cat);

        let sometimes = UnkPolicy::default();
        let replaced = (0..2000)
            .filter(|_| vocab.substitute_unk(cat, &sometimes, &mut ctx) == unk)
            .count();
        assert!(replaced > 250 && replaced < 550, "replaced {replaced}");
    }

    #[test]
    fn test_seal_words_rejects_sentinel_spelled_word() {
        for sentinel in [SOS, EOS, UNK] {
            let mut words = Vocab::new();
            words.convert("a").unwrap();
            words.convert(sentinel).unwrap();
            let err = words.seal_words().unwrap_err();
            assert!(matches!(err, TaggerError::MissingSentinel(s) if s == sentinel));
            assert!(!words.is_frozen());
        }
    }

    #[test]
    fn test_seal_tags_places_sentinel_last() {
        let mut tags = Vocab::new();
        tags.convert("PRP").unwrap();
        tags.convert("VBD").unwrap();
        tags.seal_tags().unwrap();

        assert!(tags.is_frozen());
        assert_eq!(tags.index_of(SOS_TAG), Some(2));
        assert!(tags.unk().is_none());
    }

    #[test]
    fn test_record_round_trip() {
        let vocab = sealed(&["a", "b", "a"]);
        let restored = Vocab::from_record(vocab.to_record()).unwrap();

        assert!(restored.is_frozen());
        assert_eq!(restored.unk(), vocab.unk());
        assert_eq!(
            restored.tokens().collect::<Vec<_>>(),
            vocab.tokens().collect::<Vec<_>>()
        );
        assert_eq!(restored.frequency(0), 2);
    }

    #[test]
    fn test_record_rejects_duplicates() {
        let record = VocabRecord {
            tokens: vec!["a".into(), "a".into()],
            counts: vec![1, 1],
            unk: None,
        };
        assert!(Vocab::from_record(record).is_err());
    }
}
