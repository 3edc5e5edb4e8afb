use thiserror::Error;

/// Errors that can occur during seqtag core operations.
#[derive(Debug, Error)]
pub enum TaggerError {
    /// A frozen vocabulary without an UNK entry was asked for an unseen token.
    #[error("token {token:?} is not in the frozen vocabulary and no UNK entry is registered")]
    UnknownToken {
        /// The token that could not be mapped.
        token: String,
    },

    /// Model structure was requested before the vocabularies were frozen.
    #[error("{0} vocabulary must be frozen before the model structure is built")]
    VocabularyNotFrozen(&'static str),

    /// A required sentinel token is absent or sits at the wrong index.
    #[error("sentinel {0:?} is missing or misplaced in the vocabulary")]
    MissingSentinel(&'static str),

    /// An annotated corpus line could not be split into word/tag pairs.
    #[error("malformed annotated line {line}: {reason}")]
    MalformedLine {
        /// 1-based line number in the source file.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// A pretrained embedding line is unusable.
    #[error("invalid pretrained embedding at line {line}: {reason}")]
    InvalidEmbedding {
        /// 1-based line number in the embedding file.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// A stored structural size disagrees with what was rebuilt.
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Which quantity disagreed.
        what: String,
        /// Size recorded in the model header or the live structure.
        expected: usize,
        /// Size actually observed.
        found: usize,
    },

    /// Word and tag sequences of one sentence differ in length.
    #[error("sentence has {words} words but {tags} tags")]
    LengthMismatch {
        /// Number of words.
        words: usize,
        /// Number of tags.
        tags: usize,
    },

    /// A model file is structurally invalid.
    #[error("invalid model file: {0}")]
    InvalidModel(String),

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle tensor engine error.
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Model header (de)serialization error.
    #[error("model header error: {0}")]
    Json(#[from] serde_json::Error),

    /// Safetensors container error.
    #[error("safetensors error: {0}")]
    SafeTensors(#[from] safetensors::SafeTensorError),
}

/// Result type alias for seqtag operations.
pub type Result<T> = std::result::Result<T, TaggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = TaggerError::UnknownToken {
            token: "zyzzyva".into(),
        };
        assert!(err.to_string().contains("zyzzyva"));

        let err = TaggerError::VocabularyNotFrozen("word");
        assert_eq!(
            err.to_string(),
            "word vocabulary must be frozen before the model structure is built"
        );

        let err = TaggerError::MalformedLine {
            line: 3,
            reason: "missing tag delimiter".into(),
        };
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TaggerError>();
    }
}
