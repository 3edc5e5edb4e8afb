//! # Tag Sources
//!
//! The scorer conditions position `i` on the tag at `i - 1`. Where that tag
//! comes from is the only difference between training and inference:
//! [`GoldTags`] replays the annotation (teacher forcing), [`GreedyFeedback`]
//! feeds back each position's own argmax and keeps it as the prediction.

/// Supplies the previous-tag condition for the next position.
pub trait TagSource {
    /// Called once position `position` has been scored with `predicted` as
    /// its argmax; returns the tag that conditions `position + 1`.
    fn advance(&mut self, position: usize, predicted: u32) -> u32;
}

/// Teacher forcing: always condition on the gold tag.
#[derive(Debug, Clone, Copy)]
pub struct GoldTags<'a> {
    gold: &'a [u32],
}

impl<'a> GoldTags<'a> {
    pub fn new(gold: &'a [u32]) -> Self {
        Self { gold }
    }
}

impl TagSource for GoldTags<'_> {
    fn advance(&mut self, position: usize, _predicted: u32) -> u32 {
        self.gold[position]
    }
}

/// Greedy decoding: each argmax is final and becomes the next condition.
#[derive(Debug, Clone, Default)]
pub struct GreedyFeedback {
    path: Vec<u32>,
}

impl GreedyFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(len: usize) -> Self {
        Self {
            path: Vec::with_capacity(len),
        }
    }

    /// The decoded tag sequence.
    pub fn into_path(self) -> Vec<u32> {
        self.path
    }
}

impl TagSource for GreedyFeedback {
    fn advance(&mut self, _position: usize, predicted: u32) -> u32 {
        self.path.push(predicted);
        predicted
    }
}

/// Index of the highest score. Comparisons are strict, so the lowest index
/// wins ties. Empty input yields 0.
pub fn argmax(scores: &[f32]) -> u32 {
    let mut best = 0usize;
    let mut best_score = f32::NEG_INFINITY;
    for (index, &score) in scores.iter().enumerate() {
        if score > best_score {
            best_score = score;
            best = index;
        }
    }
    best as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_first_maximum_wins() {
        assert_eq!(argmax(&[0.1, 0.9, 0.9, 0.2]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_gold_source_ignores_prediction() {
        let gold = [2, 0, 1];
        let mut source = GoldTags::new(&gold);
        assert_eq!(source.advance(0, 1), 2);
        assert_eq!(source.advance(1, 1), 0);
        assert_eq!(source.advance(2, 0), 1);
    }

    #[test]
    fn test_greedy_feeds_back_prediction() {
        let mut source = GreedyFeedback::with_capacity(3);
        assert_eq!(source.advance(0, 4), 4);
        assert_eq!(source.advance(1, 2), 2);
        assert_eq!(source.into_path(), vec![4, 2]);
    }
}
