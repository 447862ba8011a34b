// ============================================================
// Layer 3 — Character Vocabulary (Tokenizer)
// ============================================================
// A closed, sorted set of single Unicode code points.
//
//   build("hello")  → [e, h, l, o]  → ids 0..4
//   encode("hole")  → [1, 3, 2, 0]
//   decode(3)       → 'o'
//
// Both directions are total: unknown characters encode to id 0
// and unknown ids decode to a space.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Returned by `decode` for ids outside the vocabulary.
pub const UNKNOWN_CHAR: char = ' ';

/// Returned by `encode` for characters outside the vocabulary.
pub const UNKNOWN_ID: u32 = 0;

/// Bidirectional char ↔ id mapping for one trained model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "VocabularyRecord", try_from = "VocabularyRecord")]
pub struct Vocabulary {
    chars:    Vec<char>,
    char_ids: BTreeMap<char, u32>,
}

impl Vocabulary {
    /// Collect the distinct characters of `text`, sort them by code point
    /// and number them from zero.
    pub fn build(text: &str) -> Self {
        let mut chars: Vec<char> = text.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        Self::from_sorted(chars)
    }

    fn from_sorted(chars: Vec<char>) -> Self {
        let char_ids = chars
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u32))
            .collect();
        Self { chars, char_ids }
    }

    /// Number of distinct characters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Id of `c`, if it is part of the vocabulary.
    pub fn id_of(&self, c: char) -> Option<u32> {
        self.char_ids.get(&c).copied()
    }

    /// Map every character to its id; unknown characters become `UNKNOWN_ID`.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        text.chars()
            .map(|c| self.id_of(c).unwrap_or(UNKNOWN_ID))
            .collect()
    }

    /// Inverse lookup; out-of-range ids become `UNKNOWN_CHAR`.
    pub fn decode(&self, id: u32) -> char {
        self.chars.get(id as usize).copied().unwrap_or(UNKNOWN_CHAR)
    }
}

// ─── Wire form ────────────────────────────────────────────────────────────────
// Stored next to the weights as an explicit mapping, so the embedding
// width can be checked against it on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VocabularyRecord {
    char_to_index: BTreeMap<String, u32>,
    index_to_char: BTreeMap<u32, String>,
    vocab_size:    usize,
}

impl From<Vocabulary> for VocabularyRecord {
    fn from(v: Vocabulary) -> Self {
        let char_to_index = v
            .char_ids
            .iter()
            .map(|(c, &i)| (c.to_string(), i))
            .collect();
        let index_to_char = v
            .chars
            .iter()
            .enumerate()
            .map(|(i, c)| (i as u32, c.to_string()))
            .collect();
        Self { char_to_index, index_to_char, vocab_size: v.chars.len() }
    }
}

impl TryFrom<VocabularyRecord> for Vocabulary {
    type Error = String;

    fn try_from(r: VocabularyRecord) -> Result<Self, Self::Error> {
        if r.index_to_char.len() != r.vocab_size || r.char_to_index.len() != r.vocab_size {
            return Err(format!(
                "vocabulary declares {} entries but maps {} / {}",
                r.vocab_size,
                r.char_to_index.len(),
                r.index_to_char.len()
            ));
        }

        let mut chars = Vec::with_capacity(r.vocab_size);
        for (expected, (id, s)) in r.index_to_char.iter().enumerate() {
            if *id as usize != expected {
                return Err(format!("vocabulary ids are not contiguous at {expected}"));
            }
            let mut it = s.chars();
            let c = match (it.next(), it.next()) {
                (Some(c), None) => c,
                _ => return Err(format!("vocabulary entry {id} is not a single character")),
            };
            if r.char_to_index.get(s.as_str()) != Some(id) {
                return Err(format!("vocabulary maps disagree for {s:?}"));
            }
            chars.push(c);
        }

        if chars.windows(2).any(|w| w[0] >= w[1]) {
            return Err("vocabulary characters are not in code-point order".into());
        }
        Ok(Self::from_sorted(chars))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sorted_and_contiguous() {
        let v = Vocabulary::build("hello world");
        let expected = [' ', 'd', 'e', 'h', 'l', 'o', 'r', 'w'];
        assert_eq!(v.len(), expected.len());
        for (i, &c) in expected.iter().enumerate() {
            assert_eq!(v.id_of(c), Some(i as u32));
            assert_eq!(v.decode(i as u32), c);
        }
    }

    #[test]
    fn test_round_trip_for_every_known_char() {
        let text = "Ünïcode — ok? 日本語\n\ttabs";
        let v = Vocabulary::build(text);
        for c in text.chars() {
            let ids = v.encode(&c.to_string());
            assert_eq!(v.decode(ids[0]), c);
        }
        let decoded: String = v.encode(text).into_iter().map(|id| v.decode(id)).collect();
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = Vocabulary::build("the quick brown fox");
        let b = Vocabulary::build("the quick brown fox");
        assert_eq!(a, b);
    }

    #[test]
    fn test_lenient_fallbacks() {
        let v = Vocabulary::build("abc");
        assert_eq!(v.encode("azc"), vec![0, 0, 2]);
        assert_eq!(v.decode(99), UNKNOWN_CHAR);
    }

    #[test]
    fn test_serde_round_trip() {
        let v = Vocabulary::build("Hello, World!\n");
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"vocabSize\":"));
        let back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_rejects_inconsistent_record() {
        let json = r#"{"charToIndex":{"a":0,"b":1},"indexToChar":{"0":"a","2":"b"},"vocabSize":2}"#;
        assert!(serde_json::from_str::<Vocabulary>(json).is_err());
    }
}
