//! BPE tokenization for the CLIP text encoder.

use std::path::Path;
use tokenizers::{
    PaddingDirection, PaddingParams, PaddingStrategy, Tokenizer, TruncationDirection,
    TruncationParams, TruncationStrategy,
};

use crate::error::{EmbedError, Result};

const PAD_TOKEN: &str = "<|endoftext|>";

/// Token ids and attention mask for a batch, row-major `(batch, context_length)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub rows: usize,
    pub context_length: usize,
}

/// Tokenizer that pads and truncates every text to a fixed context length.
pub struct ClipTokenizer {
    inner: Tokenizer,
    context_length: usize,
}

impl ClipTokenizer {
    pub fn from_file(path: &Path, context_length: usize) -> Result<Self> {
        let inner = Tokenizer::from_file(path).map_err(|e| {
            EmbedError::ModelLoad(format!("Failed to load tokenizer {}: {}", path.display(), e))
        })?;
        Self::new(inner, context_length)
    }

    pub fn new(mut inner: Tokenizer, context_length: usize) -> Result<Self> {
        let pad_id = inner.token_to_id(PAD_TOKEN).unwrap_or(0);

        inner.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(context_length),
            direction: PaddingDirection::Right,
            pad_to_multiple_of: None,
            pad_id,
            pad_type_id: 0,
            pad_token: PAD_TOKEN.to_string(),
        }));

        inner
            .with_truncation(Some(TruncationParams {
                max_length: context_length,
                strategy: TruncationStrategy::LongestFirst,
                stride: 0,
                direction: TruncationDirection::Right,
            }))
            .map_err(|e| EmbedError::ModelLoad(format!("Invalid truncation settings: {}", e)))?;

        Ok(Self {
            inner,
            context_length,
        })
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<EncodedBatch> {
        let encodings = self
            .inner
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedError::Inference(format!("Text tokenization failed: {}", e)))?;

        let mut input_ids = Vec::with_capacity(texts.len() * self.context_length);
        let mut attention_mask = Vec::with_capacity(texts.len() * self.context_length);

        for encoding in &encodings {
            if encoding.get_ids().len() != self.context_length {
                return Err(EmbedError::Inference(format!(
                    "tokenizer produced {} tokens, expected {}",
                    encoding.get_ids().len(),
                    self.context_length
                )));
            }
            input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        Ok(EncodedBatch {
            input_ids,
            attention_mask,
            rows: encodings.len(),
            context_length: self.context_length,
        })
    }
}
