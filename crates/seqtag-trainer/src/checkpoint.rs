//! Best-so-far parameter buffer.

use seqtag_core::ParamSnapshot;

/// Parameters from the best held-out evaluation seen so far. The stored
/// accuracy never decreases: a new snapshot is only taken on strict
/// improvement.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    best: Option<(f64, ParamSnapshot)>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `accuracy` would replace the stored snapshot.
    pub fn improves(&self, accuracy: f64) -> bool {
        if accuracy.is_nan() {
            return false;
        }
        match &self.best {
            Some((best, _)) => accuracy > *best,
            None => true,
        }
    }

    /// Store `snapshot` if `accuracy` strictly improves. Returns whether it
    /// was stored.
    pub fn offer(&mut self, accuracy: f64, snapshot: ParamSnapshot) -> bool {
        if !self.improves(accuracy) {
            return false;
        }
        self.best = Some((accuracy, snapshot));
        true
    }

    pub fn best_accuracy(&self) -> Option<f64> {
        self.best.as_ref().map(|(accuracy, _)| *accuracy)
    }

    pub fn snapshot(&self) -> Option<&ParamSnapshot> {
        self.best.as_ref().map(|(_, snapshot)| snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::data::tests::{TRAIN, parse};
    use seqtag_core::{Context, ModelConfig, Tagger};

    fn snapshot() -> ParamSnapshot {
        let data = Dataset::from_sentences(&parse(TRAIN), &[]).unwrap();
        let config = ModelConfig::new().with_word_dim(4).with_rnn(1, 4);
        let tagger = Tagger::new(config, data.words, data.tags, &mut Context::new(1)).unwrap();
        tagger.snapshot().unwrap()
    }

    #[test]
    fn test_first_offer_is_stored() {
        let mut checkpoint = Checkpoint::new();
        assert!(checkpoint.snapshot().is_none());
        assert!(checkpoint.offer(0.0, snapshot()));
        assert_eq!(checkpoint.best_accuracy(), Some(0.0));
        assert!(checkpoint.snapshot().is_some());
    }

    #[test]
    fn test_only_strict_improvement_replaces() {
        let mut checkpoint = Checkpoint::new();
        let params = snapshot();
        let mut history = Vec::new();
        for accuracy in [0.5, 0.4, 0.5, 0.7, 0.6, 0.7, 0.9] {
            checkpoint.offer(accuracy, params.clone());
            history.push(checkpoint.best_accuracy().unwrap());
        }
        assert_eq!(history, vec![0.5, 0.5, 0.5, 0.7, 0.7, 0.7, 0.9]);
        assert!(!checkpoint.improves(0.9));
    }

    #[test]
    fn test_nan_never_stored() {
        let mut checkpoint = Checkpoint::new();
        assert!(!checkpoint.offer(f64::NAN, snapshot()));
        assert!(checkpoint.best_accuracy().is_none());
    }
}
