//! Unigram tokenizer for the embedding model
//!
//! Parses the `tokenizer.json` shipped with the model (the `model.type`
//! must be `Unigram`) and segments words with a Viterbi pass that maximizes
//! the summed piece log-scores.

use super::ModelError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Score charged per character when no vocabulary piece covers a position
const UNKNOWN_PENALTY: f32 = -20.0;

/// Metaspace marker prefixed to every word (U+2581)
const METASPACE: char = '\u{2581}';

/// Fallback sequence length when truncation metadata is absent or bogus
const DEFAULT_MAX_LENGTH: usize = 128;

#[derive(Debug, Clone, Copy)]
struct VocabEntry {
    id: i64,
    score: f32,
}

/// Unigram tokenizer
pub struct UnigramTokenizer {
    vocab: HashMap<String, VocabEntry>,
    unk_id: i64,
    bos_id: i64,
    eos_id: i64,
    pad_id: i64,
    max_length: usize,
    max_piece_bytes: usize,
}

impl UnigramTokenizer {
    /// Parse a `tokenizer.json`. Fails when the file describes anything
    /// other than a Unigram model or carries an empty vocabulary.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Tokenizer(format!("{}: {}", path.display(), e)))?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ModelError::Tokenizer(format!("{}: {}", path.display(), e)))?;

        let model = &json["model"];
        if model["type"].as_str() != Some("Unigram") {
            return Err(ModelError::Tokenizer(
                "unsupported tokenizer type for embeddings (expected Unigram)".to_string(),
            ));
        }

        let unk_id = model["unk_id"].as_i64().unwrap_or(0);

        let mut max_length = json["truncation"]["max_length"]
            .as_u64()
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_LENGTH);
        if max_length < 8 {
            max_length = DEFAULT_MAX_LENGTH;
        }

        let pad_id = json["padding"]["pad_id"].as_i64().unwrap_or(1);

        let special = &json["post_processor"]["special_tokens"];
        let bos_id = special["<s>"]["ids"][0].as_i64().unwrap_or(0);
        let eos_id = special["</s>"]["ids"][0].as_i64().unwrap_or(2);

        let pieces = model["vocab"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| {
                        let piece = row.get(0)?.as_str()?.to_string();
                        let score = row.get(1)?.as_f64()? as f32;
                        Some((piece, score))
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if pieces.is_empty() {
            return Err(ModelError::Tokenizer("tokenizer vocab is empty".to_string()));
        }

        Ok(Self::from_parts(pieces, unk_id, bos_id, eos_id, pad_id, max_length))
    }

    /// Build from an ordered (piece, score) list; the id of a piece is its
    /// index in the list.
    pub fn from_parts(
        pieces: Vec<(String, f32)>,
        unk_id: i64,
        bos_id: i64,
        eos_id: i64,
        pad_id: i64,
        max_length: usize,
    ) -> Self {
        let mut vocab = HashMap::with_capacity(pieces.len());
        let mut max_piece_bytes = 0;

        for (index, (piece, score)) in pieces.into_iter().enumerate() {
            max_piece_bytes = max_piece_bytes.max(piece.len());
            vocab.insert(
                piece,
                VocabEntry {
                    id: index as i64,
                    score,
                },
            );
        }

        Self {
            vocab,
            unk_id,
            bos_id,
            eos_id,
            pad_id,
            max_length,
            max_piece_bytes,
        }
    }

    /// Padding id, also used to derive the attention mask
    pub fn pad_id(&self) -> i64 {
        self.pad_id
    }

    /// Fixed sequence length produced by [`encode`](Self::encode)
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Encode text into exactly `max_length` ids: BOS, word pieces, EOS,
    /// padding. When truncation applies, the last token is forced to EOS.
    pub fn encode(&self, text: &str) -> Vec<i64> {
        let mut tokens = Vec::with_capacity(self.max_length);
        tokens.push(self.bos_id);

        for word in whitespace_split(text) {
            if tokens.len() >= self.max_length - 1 {
                break;
            }

            let piece = format!("{}{}", METASPACE, word);
            for id in self.encode_piece(&piece) {
                if tokens.len() >= self.max_length - 1 {
                    break;
                }
                tokens.push(id);
            }
        }

        tokens.push(self.eos_id);

        if tokens.len() > self.max_length {
            tokens.truncate(self.max_length);
            *tokens.last_mut().unwrap() = self.eos_id;
        } else {
            tokens.resize(self.max_length, self.pad_id);
        }

        tokens
    }

    /// Viterbi segmentation of one metaspace piece.
    ///
    /// Positions no vocabulary piece covers advance by one UTF-8 character
    /// at the constant unknown penalty, emitting the UNK id.
    fn encode_piece(&self, piece: &str) -> Vec<i64> {
        if piece.is_empty() {
            return vec![self.unk_id];
        }

        let n = piece.len();
        let mut best = vec![f32::NEG_INFINITY; n + 1];
        let mut prev = vec![usize::MAX; n + 1];
        let mut prev_id = vec![self.unk_id; n + 1];
        best[0] = 0.0;

        for i in 0..n {
            if !best[i].is_finite() || !piece.is_char_boundary(i) {
                continue;
            }

            let max_len = self.max_piece_bytes.min(n - i);
            let mut found_piece = false;

            for len in 1..=max_len {
                let Some(candidate) = piece.get(i..i + len) else {
                    continue;
                };
                let Some(entry) = self.vocab.get(candidate) else {
                    continue;
                };

                found_piece = true;
                let j = i + len;
                let score = best[i] + entry.score;
                if score > best[j] {
                    best[j] = score;
                    prev[j] = i;
                    prev_id[j] = entry.id;
                }
            }

            if !found_piece {
                let len = piece[i..].chars().next().map_or(1, char::len_utf8);
                let j = (i + len).min(n);
                let score = best[i] + UNKNOWN_PENALTY;
                if score > best[j] {
                    best[j] = score;
                    prev[j] = i;
                    prev_id[j] = self.unk_id;
                }
            }
        }

        if !best[n].is_finite() {
            return vec![self.unk_id];
        }

        let mut ids = Vec::new();
        let mut pos = n;
        while pos > 0 {
            ids.push(prev_id[pos]);
            let parent = prev[pos];
            if parent >= pos {
                break;
            }
            pos = parent;
        }

        ids.reverse();
        if ids.is_empty() {
            ids.push(self.unk_id);
        }
        ids
    }

    #[cfg(test)]
    fn best_segmentation_score(&self, piece: &str) -> f32 {
        self.encode_piece(piece)
            .iter()
            .map(|id| {
                self.vocab
                    .values()
                    .find(|entry| entry.id == *id)
                    .map_or(UNKNOWN_PENALTY, |entry| entry.score)
            })
            .sum()
    }
}

/// Split on whitespace; an all-whitespace input yields one empty word so
/// the encoder still emits a metaspace piece.
fn whitespace_split(text: &str) -> Vec<String> {
    let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if words.is_empty() {
        vec![String::new()]
    } else {
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_tokenizer() -> UnigramTokenizer {
        // ids follow list order: ▁=0, ▁he=1, llo=2, ▁hello=3, l=4, o=5
        UnigramTokenizer::from_parts(
            vec![
                ("\u{2581}".to_string(), -2.0),
                ("\u{2581}he".to_string(), -1.0),
                ("llo".to_string(), -1.5),
                ("\u{2581}hello".to_string(), -1.8),
                ("l".to_string(), -3.0),
                ("o".to_string(), -3.0),
            ],
            100, // unk
            101, // bos
            102, // eos
            0,   // pad
            16,
        )
    }

    #[test]
    fn test_viterbi_picks_best_split() {
        let tok = tiny_tokenizer();
        // "▁hello" as one piece scores -1.8, beating ▁he+llo (-2.5)
        assert_eq!(tok.encode_piece("\u{2581}hello"), vec![3]);

        // The winning score is at least as good as hand-built alternatives
        let best = tok.best_segmentation_score("\u{2581}hello");
        let alternative = -1.0 + -1.5; // ▁he + llo
        assert!(best >= alternative);
    }

    #[test]
    fn test_viterbi_unknown_characters_cost_penalty() {
        let tok = tiny_tokenizer();
        // "▁hezllo": 'z' is uncovered; expect ▁he, UNK, llo
        assert_eq!(tok.encode_piece("\u{2581}hezllo"), vec![1, 100, 2]);
    }

    #[test]
    fn test_encode_pads_to_fixed_length() {
        let tok = tiny_tokenizer();
        let ids = tok.encode("hello");
        assert_eq!(ids.len(), 16);
        assert_eq!(ids[0], 101);
        assert_eq!(ids[1], 3);
        assert_eq!(ids[2], 102);
        assert!(ids[3..].iter().all(|&id| id == 0));
    }

    #[test]
    fn test_encode_truncation_keeps_eos_last() {
        let tok = tiny_tokenizer();
        let ids = tok.encode(&"hello ".repeat(40));
        assert_eq!(ids.len(), 16);
        assert_eq!(*ids.last().unwrap(), 102);
        assert!(!ids.contains(&0), "truncated sequence must not be padded");
    }

    #[test]
    fn test_encode_empty_input() {
        let tok = tiny_tokenizer();
        let ids = tok.encode("");
        assert_eq!(ids.len(), 16);
        assert_eq!(ids[0], 101);
        // The bare metaspace piece is in the vocabulary
        assert_eq!(ids[1], 0);
        assert_eq!(ids[2], 102);
    }
}
