//! CLIP model implementation using ONNX Runtime

use image::RgbImage;
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

use super::download;
use super::pixels::{pixel_values, PixelNorm};
use super::tokenizer::ClipTokenizer;
use crate::config::ModelConfig;
use crate::embedding::{EmbeddingMatrix, EmbeddingModel};
use crate::error::{EmbedError, Result};

/// CLIP vision and text encoders plus the matching tokenizer.
///
/// Both sessions are created in [`ClipModel::load`] and live as long as the model.
pub struct ClipModel {
    name: String,
    dimension: usize,
    input_size: u32,
    norm: PixelNorm,
    vision_output: String,
    text_output: String,
    vision: Session,
    text: Session,
    tokenizer: ClipTokenizer,
}

impl ClipModel {
    /// Download (if needed) and load every artifact named by `config`.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        tracing::info!(model = %config.name, "Loading CLIP model");

        download::ensure_all(config)?;

        let vision = open_session(&config.vision_path(), config.intra_threads)?;
        let text = open_session(&config.text_path(), config.intra_threads)?;
        let tokenizer = ClipTokenizer::from_file(&config.tokenizer_path(), config.context_length)?;

        tracing::info!(model = %config.name, dimension = config.dimension, "CLIP model loaded successfully");

        Ok(Self {
            name: config.name.clone(),
            dimension: config.dimension,
            input_size: config.input_size,
            norm: PixelNorm {
                mean: config.image_mean,
                std: config.image_std,
            },
            vision_output: config.vision_output.clone(),
            text_output: config.text_output.clone(),
            vision,
            text,
            tokenizer,
        })
    }

    fn run_vision(&mut self, images: &[RgbImage]) -> Result<Vec<f32>> {
        let size = self.input_size as usize;
        let data = pixel_values(images, self.input_size, &self.norm);

        let input_tensor = Tensor::from_array(([images.len(), 3, size, size], data.into_boxed_slice()))
            .map_err(|e| EmbedError::Inference(format!("Failed to create pixel tensor: {}", e)))?;

        let outputs = self
            .vision
            .run(ort::inputs!["pixel_values" => input_tensor])
            .map_err(|e| EmbedError::Inference(format!("Vision inference failed: {}", e)))?;

        let value = outputs
            .get(self.vision_output.as_str())
            .ok_or_else(|| missing_output(&self.vision_output))?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedError::Inference(format!("Failed to extract embeddings: {}", e)))?;

        checked_embeddings(data, images.len(), self.dimension)
    }

    fn run_text(&mut self, texts: &[&str]) -> Result<Vec<f32>> {
        let batch = self.tokenizer.encode_batch(texts)?;
        let shape = [batch.rows, batch.context_length];

        let input_ids = Tensor::from_array((shape, batch.input_ids.into_boxed_slice()))
            .map_err(|e| EmbedError::Inference(format!("Failed to create input_ids tensor: {}", e)))?;
        let attention_mask = Tensor::from_array((shape, batch.attention_mask.into_boxed_slice()))
            .map_err(|e| {
                EmbedError::Inference(format!("Failed to create attention_mask tensor: {}", e))
            })?;

        let outputs = self
            .text
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask
            ])
            .map_err(|e| EmbedError::Inference(format!("Text inference failed: {}", e)))?;

        let value = outputs
            .get(self.text_output.as_str())
            .ok_or_else(|| missing_output(&self.text_output))?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedError::Inference(format!("Failed to extract embeddings: {}", e)))?;

        checked_embeddings(data, texts.len(), self.dimension)
    }
}

impl EmbeddingModel for ClipModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_images(&mut self, images: &[RgbImage], batch_size: usize) -> Result<EmbeddingMatrix> {
        let mut data = Vec::with_capacity(images.len() * self.dimension);
        for chunk in images.chunks(batch_size.max(1)) {
            data.extend(self.run_vision(chunk)?);
        }
        into_matrix(data, images.len(), self.dimension)
    }

    fn encode_text(&mut self, texts: &[&str], batch_size: usize) -> Result<EmbeddingMatrix> {
        let mut data = Vec::with_capacity(texts.len() * self.dimension);
        for chunk in texts.chunks(batch_size.max(1)) {
            data.extend(self.run_text(chunk)?);
        }
        into_matrix(data, texts.len(), self.dimension)
    }
}

fn open_session(path: &Path, intra_threads: usize) -> Result<Session> {
    let load_error = |e: &dyn std::fmt::Display| {
        EmbedError::ModelLoad(format!("{}: {}", path.display(), e))
    };

    Session::builder()
        .map_err(|e| load_error(&e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_error(&e))?
        .with_intra_threads(intra_threads)
        .map_err(|e| load_error(&e))?
        .commit_from_file(path)
        .map_err(|e| load_error(&e))
}

fn missing_output(name: &str) -> EmbedError {
    EmbedError::Inference(format!("Model has no output named '{}'", name))
}

/// Validate a flat `(rows, dimension)` embedding output.
fn checked_embeddings(data: &[f32], rows: usize, dimension: usize) -> Result<Vec<f32>> {
    if data.len() != rows * dimension {
        return Err(EmbedError::Inference(format!(
            "embedding output has {} values, expected {}x{}",
            data.len(),
            rows,
            dimension
        )));
    }

    if data.iter().any(|v| !v.is_finite()) {
        return Err(EmbedError::Inference(
            "embedding output contains non-finite values".to_string(),
        ));
    }

    Ok(data.to_vec())
}

fn into_matrix(data: Vec<f32>, rows: usize, dimension: usize) -> Result<EmbeddingMatrix> {
    Array2::from_shape_vec((rows, dimension), data)
        .map_err(|e| EmbedError::Inference(format!("Unexpected embedding shape: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::normalize::l2_norm;
    use image::Rgb;

    #[test]
    fn test_checked_embeddings() {
        assert_eq!(checked_embeddings(&[1.0, 2.0], 1, 2).unwrap(), vec![1.0, 2.0]);
        assert!(matches!(
            checked_embeddings(&[1.0, 2.0, 3.0], 1, 2),
            Err(EmbedError::Inference(_))
        ));
        assert!(matches!(
            checked_embeddings(&[1.0, f32::NAN], 1, 2),
            Err(EmbedError::Inference(_))
        ));
    }

    #[test]
    fn test_into_matrix_shape_mismatch() {
        let result = into_matrix(vec![0.0; 10], 3, 4);
        assert!(matches!(result, Err(EmbedError::Inference(_))));
    }

    #[test]
    fn test_load_offline_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            models_dir: dir.path().to_path_buf(),
            offline: true,
            ..ModelConfig::default()
        };

        let result = ClipModel::load(&config);
        assert!(matches!(result, Err(EmbedError::ModelLoad(_))));
    }

    /// Needs network access (or a populated models directory) and ONNX Runtime.
    #[test]
    #[ignore]
    fn test_real_model_embeddings() {
        let mut model = ClipModel::load(&ModelConfig::default()).unwrap();

        let images = vec![
            RgbImage::from_pixel(224, 224, Rgb([255, 0, 0])),
            RgbImage::from_pixel(224, 224, Rgb([0, 0, 255])),
            RgbImage::from_pixel(224, 224, Rgb([0, 255, 0])),
        ];
        let image_embeddings = model.encode_images(&images, 2).unwrap();
        assert_eq!(image_embeddings.dim(), (3, 512));

        let text_embeddings = model
            .encode_text(&["red shirt", "blue dress", "green jacket"], 32)
            .unwrap();
        assert_eq!(text_embeddings.dim(), (3, 512));
        assert!(text_embeddings.rows().into_iter().all(|row| l2_norm(row) > 0.0));
    }
}
