//! Embedding service: preprocessing, batching, normalization and ranking
//! on top of a pretrained image/text model.

pub mod input;
pub mod normalize;
pub mod service;
pub mod similarity;

#[cfg(test)]
pub(crate) mod testing;

use image::RgbImage;
use ndarray::{Array1, Array2};

use crate::error::Result;

pub use input::{preprocess, ImageInput};
pub use service::EmbeddingService;
pub use similarity::{SimilarityMetric, TopK};

/// A single embedding vector.
pub type Embedding = Array1<f32>;

/// Embeddings stacked row-wise, one row per input in input order.
pub type EmbeddingMatrix = Array2<f32>;

/// Pretrained model that turns images and texts into embeddings.
///
/// Implementations return one row per input, in input order, each
/// `dimension()` wide.
pub trait EmbeddingModel {
    /// Identifier of the loaded model.
    fn name(&self) -> &str;

    /// Width of every embedding the model produces.
    fn dimension(&self) -> usize;

    fn encode_images(&mut self, images: &[RgbImage], batch_size: usize) -> Result<EmbeddingMatrix>;

    fn encode_text(&mut self, texts: &[&str], batch_size: usize) -> Result<EmbeddingMatrix>;
}
