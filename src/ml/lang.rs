//! Programming-language detection
//!
//! A sequence classifier over BPE token ids. The winning logit must clear a
//! confidence threshold, otherwise the input is reported as "not code" via
//! an empty label.

use super::bpe::BpeTokenizer;
use super::{load_session, ModelError};
use ndarray::Array2;
use ort::{Session, SessionInputValue, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Token budget of the classifier
const MAX_TOKENS: usize = 512;

/// Inputs longer than this are truncated before tokenization
const MAX_INPUT_CHARS: usize = 2000;

/// ML language detector
pub struct LanguageDetector {
    session: Session,
    tokenizer: BpeTokenizer,
    labels: Vec<String>,
    threshold: f32,
}

impl LanguageDetector {
    /// Load the model and its sibling assets (`vocab.json`, `merges.txt`,
    /// `labels.txt`). `threshold` is the minimum winning logit; below it
    /// the detector reports unknown.
    pub fn load(model_path: &Path, threshold: f32) -> Result<Self, ModelError> {
        let model_dir = model_path
            .parent()
            .ok_or_else(|| ModelError::Load(format!("bad model path: {}", model_path.display())))?;

        let session = load_session(model_path, 2)?;
        let tokenizer = BpeTokenizer::from_files(
            &model_dir.join("vocab.json"),
            &model_dir.join("merges.txt"),
        )?;

        let labels_path = model_dir.join("labels.txt");
        let labels: Vec<String> = std::fs::read_to_string(&labels_path)
            .map_err(|e| ModelError::Tokenizer(format!("{}: {}", labels_path.display(), e)))?
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if labels.is_empty() {
            return Err(ModelError::Tokenizer(format!(
                "no labels in {}",
                labels_path.display()
            )));
        }

        Ok(Self {
            session,
            tokenizer,
            labels,
            threshold,
        })
    }

    /// Detect the language of `text`. Returns the empty string for inputs
    /// the model is not confident about and for any inference failure.
    pub fn detect(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        match self.infer(text) {
            Ok(label) => label,
            Err(e) => {
                warn!("language detection failed: {}", e);
                String::new()
            }
        }
    }

    fn infer(&self, text: &str) -> Result<String, ModelError> {
        let truncated: String = text.chars().take(MAX_INPUT_CHARS).collect();
        let tokens = self.tokenizer.encode(&truncated, MAX_TOKENS);

        let mut input_ids = vec![0i64; MAX_TOKENS];
        let mut attention_mask = vec![0i64; MAX_TOKENS];
        for (i, &token) in tokens.iter().take(MAX_TOKENS).enumerate() {
            input_ids[i] = token;
            attention_mask[i] = 1;
        }

        let ids = Array2::from_shape_vec((1, MAX_TOKENS), input_ids)
            .map_err(|e| ModelError::Inference(format!("input shape: {}", e)))?;
        let mask = Array2::from_shape_vec((1, MAX_TOKENS), attention_mask)
            .map_err(|e| ModelError::Inference(format!("mask shape: {}", e)))?;

        // Feed exactly the inputs the model declares, in its order
        let mut feed: Vec<SessionInputValue> = Vec::with_capacity(self.session.inputs.len());
        for input in &self.session.inputs {
            let value = match input.name.as_str() {
                "input_ids" => Value::from_array(ids.clone()),
                "attention_mask" => Value::from_array(mask.clone()),
                "token_type_ids" => {
                    Value::from_array(Array2::<i64>::zeros((1, MAX_TOKENS)))
                }
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
        let logits = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let scores: Vec<f32> = logits.iter().copied().collect();
        let limit = scores.len().min(self.labels.len());
        if limit == 0 {
            return Err(ModelError::Inference("empty logits".to_string()));
        }

        let (max_idx, max_val) = scores[..limit]
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
                if v > bv {
                    (i, v)
                } else {
                    (bi, bv)
                }
            });

        debug!(
            "language detector: best {}={:.2}, threshold {:.2}",
            self.labels[max_idx], max_val, self.threshold
        );

        if max_val < self.threshold {
            return Ok(String::new());
        }

        Ok(self.labels[max_idx].clone())
    }
}
