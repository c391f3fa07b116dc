//! Error type shared by the embedding service and the CLIP model.

use thiserror::Error;

/// Errors surfaced by preprocessing, model loading and inference.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Unsupported image input: {0}")]
    UnsupportedInput(String),

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, EmbedError>;

impl From<image::ImageError> for EmbedError {
    fn from(err: image::ImageError) -> Self {
        EmbedError::ImageDecode(err.to_string())
    }
}
