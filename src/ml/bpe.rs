//! Byte-pair encoding tokenizer for the language detection model
//!
//! Loads a RoBERTa-style `vocab.json` / `merges.txt` pair. Words get the
//! visible-space marker `Ġ` on their first character; adjacent pieces are
//! merged lowest-rank-first until no listed pair remains.

use super::ModelError;
use std::collections::HashMap;
use std::path::Path;

/// Beginning-of-sequence token id
pub const BOS_TOKEN_ID: i64 = 0;
/// End-of-sequence token id
pub const EOS_TOKEN_ID: i64 = 2;
/// Unknown-piece token id
pub const UNK_TOKEN_ID: i64 = 3;

/// Word-initial marker used by the merge table (U+0120)
const WORD_MARKER: char = '\u{0120}';

/// BPE tokenizer
pub struct BpeTokenizer {
    vocab: HashMap<String, i64>,
    merge_ranks: HashMap<(String, String), usize>,
}

impl BpeTokenizer {
    /// Load vocabulary and merge table from their on-disk formats.
    /// `merges.txt` may start with a `#` header line.
    pub fn from_files(vocab_path: &Path, merges_path: &Path) -> Result<Self, ModelError> {
        let vocab_json = std::fs::read_to_string(vocab_path)
            .map_err(|e| ModelError::Tokenizer(format!("{}: {}", vocab_path.display(), e)))?;
        let vocab: HashMap<String, i64> = serde_json::from_str(&vocab_json)
            .map_err(|e| ModelError::Tokenizer(format!("{}: {}", vocab_path.display(), e)))?;

        let merges_text = std::fs::read_to_string(merges_path)
            .map_err(|e| ModelError::Tokenizer(format!("{}: {}", merges_path.display(), e)))?;

        let mut merges = Vec::new();
        for (index, line) in merges_text.lines().enumerate() {
            if index == 0 && line.starts_with('#') {
                continue;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split(' ');
            if let (Some(a), Some(b)) = (parts.next(), parts.next()) {
                merges.push((a.to_string(), b.to_string()));
            }
        }

        Ok(Self::from_parts(vocab, merges))
    }

    /// Build from in-memory tables
    pub fn from_parts(vocab: HashMap<String, i64>, merges: Vec<(String, String)>) -> Self {
        let merge_ranks = merges
            .into_iter()
            .enumerate()
            .map(|(rank, pair)| (pair, rank))
            .collect();

        Self { vocab, merge_ranks }
    }

    /// Encode text into at most `max_tokens` ids, BOS first and EOS last
    pub fn encode(&self, text: &str, max_tokens: usize) -> Vec<i64> {
        let mut tokens = vec![BOS_TOKEN_ID];

        for word in pretokenize(text) {
            if tokens.len() >= max_tokens - 1 {
                break;
            }

            for piece in self.bpe_encode(&word) {
                if tokens.len() >= max_tokens - 1 {
                    break;
                }
                tokens.push(self.vocab.get(&piece).copied().unwrap_or(UNK_TOKEN_ID));
            }
        }

        tokens.push(EOS_TOKEN_ID);
        tokens
    }

    /// Apply BPE merges to one pre-tokenized word, returning string pieces.
    /// The result is a pure function of the word and the loaded tables.
    pub fn bpe_encode(&self, word: &str) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }

        let mut pieces: Vec<String> = word
            .chars()
            .enumerate()
            .map(|(i, ch)| {
                if i == 0 {
                    format!("{}{}", WORD_MARKER, ch)
                } else {
                    ch.to_string()
                }
            })
            .collect();

        while pieces.len() > 1 {
            let Some(best) = self.lowest_ranked_pair(&pieces) else {
                break;
            };
            pieces = merge_pair(&pieces, &best);
        }

        pieces
    }

    /// The adjacent pair with the lowest merge rank, if any pair is listed
    fn lowest_ranked_pair(&self, pieces: &[String]) -> Option<(String, String)> {
        let mut best: Option<(&(String, String), usize)> = None;

        for window in pieces.windows(2) {
            let pair = (window[0].clone(), window[1].clone());
            if let Some((key, rank)) = self.merge_ranks.get_key_value(&pair) {
                match best {
                    Some((_, best_rank)) if *rank >= best_rank => {}
                    _ => best = Some((key, *rank)),
                }
            }
        }

        best.map(|(pair, _)| pair.clone())
    }
}

/// Split on whitespace, giving each punctuation character its own token
fn pretokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_ascii_punctuation() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            words.push(ch.to_string());
        } else {
            current.push(ch);
        }
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
}

/// Replace every adjacent occurrence of `pair` with its concatenation
fn merge_pair(pieces: &[String], pair: &(String, String)) -> Vec<String> {
    let mut result = Vec::with_capacity(pieces.len());
    let mut i = 0;

    while i < pieces.len() {
        if i + 1 < pieces.len() && pieces[i] == pair.0 && pieces[i + 1] == pair.1 {
            result.push(format!("{}{}", pair.0, pair.1));
            i += 2;
        } else {
            result.push(pieces[i].clone());
            i += 1;
        }
    }

    result
}
