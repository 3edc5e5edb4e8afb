//! # Corpus Reading
//!
//! Line formats consumed by the tagger:
//!
//! - annotated: tab-separated `WORD_TAG` pairs, split on the last underscore;
//! - raw: tab-separated words.
//!
//! Runs of ASCII or fullwidth digits are collapsed into a placeholder token
//! before vocabulary lookup, for training and test text alike.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;

use crate::error::{Result, TaggerError};
use crate::vocab::Vocab;

/// Replacement for every run of digits.
pub const NUM_PLACEHOLDER: &str = "<NUM>";

/// Word/tag separator inside an annotated pair.
const TAG_DELIMITER: char = '_';

/// Token separator on a line.
const FIELD_DELIMITER: char = '\t';

/// One annotated sentence as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSentence {
    pub words: Vec<String>,
    pub tags: Vec<String>,
}

impl TaggedSentence {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Parses corpus lines and normalizes numeric literals.
#[derive(Debug, Clone)]
pub struct CorpusReader {
    number: Regex,
}

impl CorpusReader {
    /// Constructs a reader with its pre-compiled normalization pattern.
    pub fn new() -> Result<Self> {
        Ok(Self {
            number: Regex::new(r"[0-9０-９]+")?,
        })
    }

    /// Collapse digit runs into [`NUM_PLACEHOLDER`].
    pub fn normalize<'a>(&self, token: &'a str) -> Cow<'a, str> {
        self.number.replace_all(token, NUM_PLACEHOLDER)
    }

    /// Parse one annotated line. Blank lines yield `None`.
    ///
    /// # Errors
    ///
    /// `MalformedLine` if a pair has no `_` or an empty word or tag.
    pub fn parse_annotated(&self, line: &str, line_no: usize) -> Result<Option<TaggedSentence>> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(None);
        }

        let mut words = Vec::new();
        let mut tags = Vec::new();

        for pair in line.split(FIELD_DELIMITER).filter(|p| !p.is_empty()) {
            let (word, tag) =
                pair.rsplit_once(TAG_DELIMITER)
                    .ok_or_else(|| TaggerError::MalformedLine {
                        line: line_no,
                        reason: format!("missing tag delimiter in {pair:?}"),
                    })?;
            if word.is_empty() || tag.is_empty() {
                return Err(TaggerError::MalformedLine {
                    line: line_no,
                    reason: format!("empty word or tag in {pair:?}"),
                });
            }
            words.push(self.normalize(word).into_owned());
            tags.push(tag.to_string());
        }

        if words.is_empty() {
            return Ok(None);
        }
        Ok(Some(TaggedSentence { words, tags }))
    }

    /// Split a raw line into its words, unnormalized. Blank lines give an
    /// empty sentence.
    pub fn parse_raw<'a>(&self, line: &'a str) -> Vec<&'a str> {
        line.trim_end_matches(['\r', '\n'])
            .split(FIELD_DELIMITER)
            .filter(|w| !w.is_empty())
            .collect()
    }

    /// Load an annotated file. Any malformed line aborts the whole file.
    pub fn read_annotated<P: AsRef<Path>>(&self, path: P) -> Result<Vec<TaggedSentence>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut sentences = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if let Some(sentence) = self.parse_annotated(&line, index + 1)? {
                sentences.push(sentence);
            }
        }
        Ok(sentences)
    }
}

/// A sentence as word and tag indices of equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub words: Vec<u32>,
    pub tags: Vec<u32>,
}

impl Instance {
    pub fn new(words: Vec<u32>, tags: Vec<u32>) -> Result<Self> {
        if words.len() != tags.len() {
            return Err(TaggerError::LengthMismatch {
                words: words.len(),
                tags: tags.len(),
            });
        }
        Ok(Self { words, tags })
    }

    /// Convert a sentence through both vocabularies. Open tables grow and
    /// count; frozen ones fall back to UNK or fail.
    pub fn admit(sentence: &TaggedSentence, words: &mut Vocab, tags: &mut Vocab) -> Result<Self> {
        let word_ids = sentence
            .words
            .iter()
            .map(|w| words.convert(w))
            .collect::<Result<Vec<_>>>()?;
        let tag_ids = sentence
            .tags
            .iter()
            .map(|t| tags.convert(t))
            .collect::<Result<Vec<_>>>()?;
        Self::new(word_ids, tag_ids)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
