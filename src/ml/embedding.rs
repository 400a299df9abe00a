//! Sentence embedding service
//!
//! Unigram tokenization followed by a transformer encoder; the
//! `[1, seq_len, hidden]` output is mean-pooled over every sequence
//! position into a single vector.

use super::unigram::UnigramTokenizer;
use super::{load_session, ModelError};
use ndarray::Array2;
use ort::{Session, SessionInputValue, Value};
use std::path::Path;
use tracing::warn;

/// Embedding service
pub struct EmbeddingService {
    session: Session,
    tokenizer: UnigramTokenizer,
}

impl EmbeddingService {
    /// Load the model; `tokenizer.json` must sit beside it and describe a
    /// Unigram tokenizer.
    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        let model_dir = model_path
            .parent()
            .ok_or_else(|| ModelError::Load(format!("bad model path: {}", model_path.display())))?;

        let session = load_session(model_path, 4)?;
        let tokenizer = UnigramTokenizer::from_file(&model_dir.join("tokenizer.json"))?;

        Ok(Self { session, tokenizer })
    }

    /// Embed `text`. Returns an empty vector on any inference failure so
    /// callers can treat the result as "no embedding".
    pub fn embed(&self, text: &str) -> Vec<f32> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        match self.infer(text) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("embedding generation failed: {}", e);
                Vec::new()
            }
        }
    }

    fn infer(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let tokens = self.tokenizer.encode(text);
        let seq_len = tokens.len();
        let pad_id = self.tokenizer.pad_id();

        let attention_mask: Vec<i64> = tokens
            .iter()
            .map(|&id| if id == pad_id { 0 } else { 1 })
            .collect();

        let ids = Array2::from_shape_vec((1, seq_len), tokens)
            .map_err(|e| ModelError::Inference(format!("input shape: {}", e)))?;
        let mask = Array2::from_shape_vec((1, seq_len), attention_mask)
            .map_err(|e| ModelError::Inference(format!("mask shape: {}", e)))?;

        // Feed exactly the inputs the model declares, in its order
        let mut feed: Vec<SessionInputValue> = Vec::with_capacity(self.session.inputs.len());
        for input in &self.session.inputs {
            let value = match input.name.as_str() {
                "input_ids" => Value::from_array(ids.clone()),
                "attention_mask" => Value::from_array(mask.clone()),
                "token_type_ids" => Value::from_array(Array2::<i64>::zeros((1, seq_len))),
                other => {
                    return Err(ModelError::Inference(format!(
                        "unknown model input: {}",
                        other
                    )))
                }
            }
            .map_err(|e| ModelError::Inference(format!("tensor creation: {}", e)))?;
            feed.push(value.into());
        }

        let output_name = self
            .session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| ModelError::Inference("model has no outputs".to_string()))?;

        let outputs = self
            .session
            .run(feed)
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        let hidden_states = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let shape = hidden_states.shape().to_vec();
        if shape.len() != 3 {
            return Err(ModelError::Inference(format!(
                "unexpected output rank {} (want [1, seq, hidden])",
                shape.len()
            )));
        }

        let data: Vec<f32> = hidden_states.iter().copied().collect();
        Ok(mean_pool(&data, shape[1], shape[2]))
    }
}

/// Collapse `[seq_len, hidden]` token states into one `hidden`-sized vector
/// by averaging over every position, padding included.
fn mean_pool(token_states: &[f32], seq_len: usize, hidden: usize) -> Vec<f32> {
    if seq_len == 0 || hidden == 0 {
        return Vec::new();
    }

    let mut pooled = vec![0.0f32; hidden];
    for position in 0..seq_len {
        let row = &token_states[position * hidden..(position + 1) * hidden];
        for (acc, value) in pooled.iter_mut().zip(row) {
            *acc += value;
        }
    }

    for value in &mut pooled {
        *value /= seq_len as f32;
    }

    pooled
}
