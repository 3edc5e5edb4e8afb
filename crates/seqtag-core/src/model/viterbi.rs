//! # Viterbi Decoding for the CRF Head
//!
//! Finds the highest-scoring tag sequence given per-position emission scores,
//! a tag-to-tag transition matrix and start scores for the first position.

use crate::error::{Result, TaggerError};

/// Viterbi decoder for CRF tag sequences.
#[derive(Debug, Clone)]
pub struct ViterbiDecoder {
    num_tags: usize,
}

impl ViterbiDecoder {
    /// Create a new Viterbi decoder.
    ///
    /// # Arguments
    /// * `num_tags` - Number of output tags
    pub fn new(num_tags: usize) -> Self {
        Self { num_tags }
    }

    /// Decode the optimal tag sequence.
    ///
    /// # Arguments
    /// * `emission_scores` - Matrix of shape [seq_len, num_tags]
    /// * `transition_matrix` - Matrix of shape [num_tags, num_tags], indexed `[from][to]`
    /// * `start_scores` - Scores of shape [num_tags] for the first position
    ///
    /// # Returns
    /// The optimal tag sequence as indices. Ties go to the lowest index.
    pub fn decode(
        &self,
        emission_scores: &[Vec<f32>],
        transition_matrix: &[Vec<f32>],
        start_scores: &[f32],
    ) -> Result<Vec<u32>> {
        let seq_len = emission_scores.len();
        if seq_len == 0 {
            return Ok(Vec::new());
        }

        self.check("emission", emission_scores[0].len())?;
        self.check("transition rows", transition_matrix.len())?;
        self.check("start scores", start_scores.len())?;

        let mut dp: Vec<Vec<f32>> = vec![vec![f32::NEG_INFINITY; self.num_tags]; seq_len];
        let mut backptr: Vec<Vec<usize>> = vec![vec![0; self.num_tags]; seq_len];

        for tag in 0..self.num_tags {
            dp[0][tag] = start_scores[tag] + emission_scores[0][tag];
        }

        for pos in 1..seq_len {
            self.check("emission", emission_scores[pos].len())?;
            for curr_tag in 0..self.num_tags {
                let mut best_score = f32::NEG_INFINITY;
                let mut best_prev = 0;

                for prev_tag in 0..self.num_tags {
                    let score = dp[pos - 1][prev_tag] + transition_matrix[prev_tag][curr_tag];
                    if score > best_score {
                        best_score = score;
                        best_prev = prev_tag;
                    }
                }

                dp[pos][curr_tag] = best_score + emission_scores[pos][curr_tag];
                backptr[pos][curr_tag] = best_prev;
            }
        }

        let mut best_final_tag = 0;
        let mut best_final_score = f32::NEG_INFINITY;
        for tag in 0..self.num_tags {
            if dp[seq_len - 1][tag] > best_final_score {
                best_final_score = dp[seq_len - 1][tag];
                best_final_tag = tag;
            }
        }

        let mut path = vec![best_final_tag as u32];
        let mut curr_tag = best_final_tag;
        for pos in (1..seq_len).rev() {
            curr_tag = backptr[pos][curr_tag];
            path.push(curr_tag as u32);
        }

        path.reverse();
        Ok(path)
    }

    fn check(&self, what: &str, found: usize) -> Result<()> {
        if found != self.num_tags {
            return Err(TaggerError::DimensionMismatch {
                what: format!("viterbi {what}"),
                expected: self.num_tags,
                found,
            });
        }
        Ok(())
    }
}
