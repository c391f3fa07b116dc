//! Deterministic stand-in for the CLIP model used by unit tests.

use image::RgbImage;
use ndarray::Array2;

use super::{EmbeddingMatrix, EmbeddingModel};
use crate::error::{EmbedError, Result};

/// Produces embeddings from an image's mean colour or a text's bytes.
///
/// Outputs are deliberately not unit length so normalization is observable.
pub(crate) struct FakeModel {
    dimension: usize,
    /// `(chunk length, batch_size argument)` of every encode call.
    pub calls: Vec<(usize, usize)>,
    /// Fail the call with this zero-based index.
    pub fail_on_call: Option<usize>,
    /// Return one row fewer than requested.
    pub drop_row: bool,
}

impl FakeModel {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: Vec::new(),
            fail_on_call: None,
            drop_row: false,
        }
    }

    fn record(&mut self, len: usize, batch_size: usize) -> Result<()> {
        let index = self.calls.len();
        self.calls.push((len, batch_size));
        if self.fail_on_call == Some(index) {
            return Err(EmbedError::Inference(format!("fake failure on call {}", index)));
        }
        Ok(())
    }

    fn rows(&self, n: usize) -> usize {
        if self.drop_row {
            n.saturating_sub(1)
        } else {
            n
        }
    }

    fn feature_row(&self, features: [f32; 3]) -> Vec<f32> {
        (0..self.dimension)
            .map(|i| {
                let i = i as f32 + 1.0;
                3.0 * (features[0] * (i * 0.37).sin()
                    + features[1] * (i * 1.13).cos()
                    + features[2] * (i * 2.71).sin()
                    + 0.05)
            })
            .collect()
    }
}

fn mean_colour(image: &RgbImage) -> [f32; 3] {
    let mut sums = [0f64; 3];
    for pixel in image.pixels() {
        for (c, sum) in sums.iter_mut().enumerate() {
            *sum += pixel[c] as f64 / 255.0;
        }
    }
    let n = (image.width() as f64 * image.height() as f64).max(1.0);
    [(sums[0] / n) as f32, (sums[1] / n) as f32, (sums[2] / n) as f32]
}

fn text_features(text: &str) -> [f32; 3] {
    let mut features = [0f32; 3];
    for (i, byte) in text.bytes().enumerate() {
        features[i % 3] += byte as f32 / 255.0;
    }
    features
}

impl EmbeddingModel for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_images(&mut self, images: &[RgbImage], batch_size: usize) -> Result<EmbeddingMatrix> {
        self.record(images.len(), batch_size)?;

        let rows = self.rows(images.len());
        let data: Vec<f32> = images[..rows]
            .iter()
            .flat_map(|img| self.feature_row(mean_colour(img)))
            .collect();

        Array2::from_shape_vec((rows, self.dimension), data)
            .map_err(|e| EmbedError::Inference(e.to_string()))
    }

    fn encode_text(&mut self, texts: &[&str], batch_size: usize) -> Result<EmbeddingMatrix> {
        self.record(texts.len(), batch_size)?;

        let rows = self.rows(texts.len());
        let data: Vec<f32> = texts[..rows]
            .iter()
            .flat_map(|text| self.feature_row(text_features(text)))
            .collect();

        Array2::from_shape_vec((rows, self.dimension), data)
            .map_err(|e| EmbedError::Inference(e.to_string()))
    }
}
