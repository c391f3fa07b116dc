//! The embedding service: owns a model and turns inputs into embeddings.

use image::RgbImage;
use ndarray::{concatenate, ArrayView1, ArrayView2, Axis};
use tracing::{debug, error, info};

use super::input::{self, ImageInput};
use super::normalize::{l2_normalize_in_place, normalize_rows};
use super::similarity::{self, SimilarityMetric, TopK};
use super::{Embedding, EmbeddingMatrix, EmbeddingModel};
use crate::clip::ClipModel;
use crate::config::Config;
use crate::error::{EmbedError, Result};

/// Embedding service around an exclusively owned model.
///
/// The model is loaded before the service exists and is never swapped.
/// `normalize` is fixed at construction: when set, every embedding the
/// service returns has unit length and similarities are plain dot products.
pub struct EmbeddingService<M> {
    model: M,
    normalize: bool,
}

impl EmbeddingService<ClipModel> {
    /// Load the CLIP model described by `config` and wrap it.
    pub fn from_config(config: &Config) -> Result<Self> {
        let model = ClipModel::load(&config.model)
            .inspect_err(|e| error!(error = %e, "Failed to load embedding model"))?;
        Ok(Self::new(model, config.service.normalize))
    }

    /// Service built from the user's configuration file (or defaults).
    pub fn load_default() -> anyhow::Result<Self> {
        let config = Config::load()?;
        Ok(Self::from_config(&config)?)
    }
}

impl<M: EmbeddingModel> EmbeddingService<M> {
    pub fn new(model: M, normalize: bool) -> Self {
        info!(model = model.name(), dimension = model.dimension(), normalize, "Embedding service ready");
        Self { model, normalize }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn metric(&self) -> SimilarityMetric {
        SimilarityMetric::for_normalized(self.normalize)
    }

    /// Width of the embeddings produced by the model.
    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    /// Decode an input into an RGB image ready for the model.
    pub fn preprocess(&self, input: &ImageInput) -> Result<RgbImage> {
        input::preprocess(input)
            .inspect_err(|e| error!(input = %input.describe(), error = %e, "Error preprocessing image"))
    }

    /// Embed a single image.
    pub fn embed_image(&mut self, input: &ImageInput) -> Result<Embedding> {
        let image = self.preprocess(input)?;

        let matrix = self
            .model
            .encode_images(std::slice::from_ref(&image), 1)
            .and_then(|m| self.check_shape(m, 1))
            .inspect_err(|e| error!(error = %e, "Error generating embedding"))?;

        let mut embedding = matrix.row(0).to_owned();
        if self.normalize {
            l2_normalize_in_place(embedding.view_mut());
        }

        info!(dimension = embedding.len(), "Generated embedding");
        Ok(embedding)
    }

    /// Embed many images, `batch_size` at a time, keeping input order.
    ///
    /// Every input is decoded before the first model call, so a bad input
    /// fails the whole request without spending any inference.
    pub fn embed_images_batched(
        &mut self,
        inputs: &[ImageInput],
        batch_size: usize,
    ) -> Result<EmbeddingMatrix> {
        check_batch_size(batch_size)?;

        let images = inputs
            .iter()
            .map(|input| self.preprocess(input))
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| error!(error = %e, "Error in batch processing"))?;

        let dimension = self.dimension();
        let normalize = self.normalize;
        let model = &mut self.model;

        let embeddings = run_batched(&images, batch_size, dimension, normalize, |chunk| {
            model.encode_images(chunk, chunk.len())
        })
        .inspect_err(|e| error!(error = %e, "Error in batch processing"))?;

        info!(
            count = embeddings.nrows(),
            dimension = embeddings.ncols(),
            "Generated image embeddings"
        );
        Ok(embeddings)
    }

    /// Embed texts with the model's text encoder, `batch_size` at a time.
    pub fn embed_text<S: AsRef<str>>(
        &mut self,
        texts: &[S],
        batch_size: usize,
    ) -> Result<EmbeddingMatrix> {
        check_batch_size(batch_size)?;

        let texts: Vec<&str> = texts.iter().map(AsRef::as_ref).collect();
        let dimension = self.dimension();
        let normalize = self.normalize;
        let model = &mut self.model;

        let embeddings = run_batched(&texts, batch_size, dimension, normalize, |chunk| {
            model.encode_text(chunk, chunk.len())
        })
        .inspect_err(|e| error!(error = %e, "Error encoding text"))?;

        info!(
            count = embeddings.nrows(),
            dimension = embeddings.ncols(),
            "Generated text embeddings"
        );
        Ok(embeddings)
    }

    /// Similarity of two embeddings under the service's metric.
    pub fn similarity(&self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> Result<f32> {
        similarity::similarity(self.metric(), a, b)
    }

    /// The `k` rows of `candidates` most similar to `query`, best first.
    ///
    /// Returns `min(k, candidates.nrows())` entries; ties keep row order.
    pub fn top_k(
        &self,
        query: ArrayView1<'_, f32>,
        candidates: ArrayView2<'_, f32>,
        k: usize,
    ) -> Result<TopK> {
        let result = similarity::top_k(self.metric(), query, candidates, k)?;
        debug!(requested = k, returned = result.len(), "Ranked candidates");
        Ok(result)
    }

    fn check_shape(&self, matrix: EmbeddingMatrix, rows: usize) -> Result<EmbeddingMatrix> {
        check_output(matrix, rows, self.dimension())
    }
}

fn check_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(EmbedError::InvalidArgument(
            "batch_size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn check_output(matrix: EmbeddingMatrix, rows: usize, dimension: usize) -> Result<EmbeddingMatrix> {
    if matrix.nrows() != rows || matrix.ncols() != dimension {
        return Err(EmbedError::Inference(format!(
            "model returned a {}x{} matrix, expected {}x{}",
            matrix.nrows(),
            matrix.ncols(),
            rows,
            dimension
        )));
    }
    Ok(matrix)
}

/// Encode `items` chunk by chunk and stack the results in input order.
fn run_batched<T, F>(
    items: &[T],
    batch_size: usize,
    dimension: usize,
    normalize: bool,
    mut encode: F,
) -> Result<EmbeddingMatrix>
where
    F: FnMut(&[T]) -> Result<EmbeddingMatrix>,
{
    if items.is_empty() {
        return Ok(EmbeddingMatrix::zeros((0, dimension)));
    }

    let total_batches = items.len().div_ceil(batch_size);
    let mut batches = Vec::with_capacity(total_batches);

    for (i, chunk) in items.chunks(batch_size).enumerate() {
        info!("Processing batch {}/{}", i + 1, total_batches);
        let matrix = encode(chunk)?;
        batches.push(check_output(matrix, chunk.len(), dimension)?);
    }

    let views: Vec<_> = batches.iter().map(|m| m.view()).collect();
    let mut embeddings = concatenate(Axis(0), &views)
        .map_err(|e| EmbedError::Inference(format!("failed to stack batches: {}", e)))?;

    if normalize {
        normalize_rows(&mut embeddings);
    }

    Ok(embeddings)
}
