//! CLIP (Contrastive Language-Image Pre-training) embeddings module
//!
//! Runs the ONNX exports of a CLIP model's vision and text encoders. The
//! model files and tokenizer are downloaded on first use.

pub mod download;
mod model;
pub mod pixels;
pub mod tokenizer;

pub use model::ClipModel;
