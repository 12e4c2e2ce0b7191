//! Score vector to class label decoding

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::InferenceError;
use crate::adapter::ScoreVector;

/// Glyphs of the reference Devanagari classifier, in class-index order:
/// 36 consonants and conjuncts followed by the digits zero to nine.
const DEVANAGARI_LABELS: [&str; 46] = [
    "क", "ख", "ग", "घ", "ङ", "च", "छ", "ज", "झ", "ञ", "ट", "ठ", "ड", "ढ", "ण", "त", "थ", "द",
    "ध", "न", "प", "फ", "ब", "भ", "म", "य", "र", "ल", "व", "श", "ष", "स", "ह", "क्ष", "त्र", "ज्ञ",
    "०", "१", "२", "३", "४", "५", "६", "७", "८", "९",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Score vector has no comparable scores")]
    Empty,
    /// The model produced more classes than the label table holds
    #[error("Class index {index} is outside the label table (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Immutable mapping from class index to display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// The 46-class Devanagari character table
    pub fn devanagari() -> Self {
        Self::new(DEVANAGARI_LABELS.iter().map(|s| s.to_string()).collect())
    }

    /// Load a table from a JSON array of labels
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| InferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::devanagari()
    }
}

/// A decoded prediction
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLabel {
    pub index: usize,
    pub label: String,
    pub score: f32,
}

/// Maps score vectors to labels by arg-max
#[derive(Debug, Clone, Default)]
pub struct LabelDecoder {
    table: LabelTable,
}

impl LabelDecoder {
    pub fn new(table: LabelTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &LabelTable {
        &self.table
    }

    /// Pick the highest-scoring class and look up its label
    ///
    /// Ties resolve to the lowest index. An index without a table entry means
    /// the model and table disagree; that is reported, never clamped.
    pub fn decode(&self, scores: &ScoreVector) -> Result<DecodedLabel, DecodeError> {
        let index = scores.argmax().ok_or(DecodeError::Empty)?;
        let label = self.table.get(index).ok_or(DecodeError::IndexOutOfRange {
            index,
            len: self.table.len(),
        })?;

        // The model and table disagree even though this index resolved
        if scores.len() != self.table.len() {
            warn!(
                "LabelDecoder: {} scores against a {}-entry table",
                scores.len(),
                self.table.len()
            );
        }

        Ok(DecodedLabel {
            index,
            label: label.to_string(),
            score: scores.as_slice()[index],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table(labels: &[&str]) -> LabelTable {
        LabelTable::new(labels.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_devanagari_table() {
        let table = LabelTable::devanagari();
        assert_eq!(table.len(), 46);
        assert_eq!(table.get(0), Some("क"));
        assert_eq!(table.get(33), Some("क्ष"));
        assert_eq!(table.get(35), Some("ज्ञ"));
        assert_eq!(table.get(36), Some("०"));
        assert_eq!(table.get(45), Some("९"));
        assert_eq!(table.get(46), None);
    }

    #[test]
    fn test_decode_picks_max() {
        let decoder = LabelDecoder::new(table(&["a", "b", "c"]));
        let decoded = decoder.decode(&ScoreVector::new(vec![0.1, 0.2, 0.7])).unwrap();
        assert_eq!(decoded.index, 2);
        assert_eq!(decoded.label, "c");
        assert_eq!(decoded.score, 0.7);
    }

    #[test]
    fn test_decode_tie_takes_lowest_index() {
        let decoder = LabelDecoder::new(table(&["a", "b", "c", "d"]));
        let decoded = decoder
            .decode(&ScoreVector::new(vec![0.1, 0.4, 0.1, 0.4]))
            .unwrap();
        assert_eq!(decoded.index, 1);
        assert_eq!(decoded.label, "b");
    }

    #[test]
    fn test_decode_out_of_range() {
        let decoder = LabelDecoder::new(table(&["a", "b"]));
        assert_eq!(
            decoder.decode(&ScoreVector::new(vec![0.0, 0.1, 0.9])),
            Err(DecodeError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_decode_size_mismatch_within_range() {
        // Extra trailing classes are reported but do not block an in-range winner
        let decoder = LabelDecoder::new(table(&["a", "b"]));
        let decoded = decoder
            .decode(&ScoreVector::new(vec![0.1, 0.8, 0.05, 0.05]))
            .unwrap();
        assert_eq!((decoded.index, decoded.label.as_str()), (1, "b"));
    }

    #[test]
    fn test_decode_empty() {
        let decoder = LabelDecoder::default();
        assert_eq!(
            decoder.decode(&ScoreVector::new(Vec::new())),
            Err(DecodeError::Empty)
        );
    }

    #[test]
    fn test_alternate_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["zero", "one"]"#).unwrap();

        let decoder = LabelDecoder::new(LabelTable::from_path(file.path()).unwrap());
        let decoded = decoder.decode(&ScoreVector::new(vec![0.3, 0.6])).unwrap();
        assert_eq!(decoded.label, "one");
    }
}
