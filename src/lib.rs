//! Image and text embeddings from a pretrained CLIP model.
//!
//! [`EmbeddingService`] decodes image inputs, asks the model for embeddings
//! in batches, optionally scales them to unit length and ranks candidates by
//! similarity. [`ClipModel`] is the ONNX Runtime implementation of the model.
//!
//! ```no_run
//! use fashion_embed::{EmbeddingService, ImageInput};
//!
//! let mut service = EmbeddingService::load_default()?;
//! let images = service.embed_images_batched(
//!     &[ImageInput::from_path("red.jpg"), ImageInput::from_path("blue.jpg")],
//!     32,
//! )?;
//! let query = service.embed_text(&["red shirt"], 32)?;
//! let best = service.top_k(query.row(0), images.view(), 1)?;
//! println!("best match: {:?}", best.indices);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod clip;
pub mod config;
pub mod discovery;
pub mod embedding;
pub mod error;
pub mod export;
pub mod logging;

use std::path::Path;

pub use clip::ClipModel;
pub use config::Config;
pub use embedding::{
    preprocess, Embedding, EmbeddingMatrix, EmbeddingModel, EmbeddingService, ImageInput,
    SimilarityMetric, TopK,
};
pub use error::EmbedError;

/// Embed one image file with a service built from the default configuration.
///
/// Loads the model on every call; keep an [`EmbeddingService`] around for
/// anything more than a one-off.
pub fn embed_image_file(path: &Path) -> anyhow::Result<Embedding> {
    let mut service = EmbeddingService::load_default()?;
    Ok(service.embed_image(&ImageInput::from_path(path))?)
}
