use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "FASHION_EMBED_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Scale every embedding to unit length (similarity becomes a dot product).
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Number of inputs sent to the model per call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_normalize() -> bool {
    true
}

fn default_batch_size() -> usize {
    32
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            normalize: default_normalize(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name, also used to name the downloaded files.
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    #[serde(default = "default_vision_url")]
    pub vision_url: String,

    #[serde(default = "default_text_url")]
    pub text_url: String,

    #[serde(default = "default_tokenizer_url")]
    pub tokenizer_url: String,

    /// Name of the vision encoder output holding the image embeddings.
    #[serde(default = "default_vision_output")]
    pub vision_output: String,

    /// Name of the text encoder output holding the text embeddings.
    #[serde(default = "default_text_output")]
    pub text_output: String,

    /// Never download; fail if model files are missing.
    #[serde(default)]
    pub offline: bool,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Side of the square image fed to the vision encoder.
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Token sequence length of the text encoder.
    #[serde(default = "default_context_length")]
    pub context_length: usize,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    #[serde(default = "default_image_mean")]
    pub image_mean: [f32; 3],

    #[serde(default = "default_image_std")]
    pub image_std: [f32; 3],
}

fn default_model_name() -> String {
    "clip-vit-b32".to_string()
}

fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("fashion-embed")
        .join("models")
}

// Qdrant's ONNX exports of CLIP ViT-B/32
fn default_vision_url() -> String {
    "https://huggingface.co/Qdrant/clip-ViT-B-32-vision/resolve/main/model.onnx".to_string()
}

fn default_text_url() -> String {
    "https://huggingface.co/Qdrant/clip-ViT-B-32-text/resolve/main/model.onnx".to_string()
}

fn default_tokenizer_url() -> String {
    "https://huggingface.co/Qdrant/clip-ViT-B-32-text/resolve/main/tokenizer.json".to_string()
}

fn default_vision_output() -> String {
    "image_embeds".to_string()
}

fn default_text_output() -> String {
    "text_embeds".to_string()
}

fn default_dimension() -> usize {
    512
}

fn default_input_size() -> u32 {
    224
}

fn default_context_length() -> usize {
    77
}

fn default_intra_threads() -> usize {
    4
}

fn default_image_mean() -> [f32; 3] {
    [0.48145466, 0.4578275, 0.40821073]
}

fn default_image_std() -> [f32; 3] {
    [0.26862954, 0.26130258, 0.27577711]
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            models_dir: default_models_dir(),
            vision_url: default_vision_url(),
            text_url: default_text_url(),
            tokenizer_url: default_tokenizer_url(),
            vision_output: default_vision_output(),
            text_output: default_text_output(),
            offline: false,
            dimension: default_dimension(),
            input_size: default_input_size(),
            context_length: default_context_length(),
            intra_threads: default_intra_threads(),
            image_mean: default_image_mean(),
            image_std: default_image_std(),
        }
    }
}

impl ModelConfig {
    pub fn vision_path(&self) -> PathBuf {
        self.models_dir.join(format!("{}-vision.onnx", self.name))
    }

    pub fn text_path(&self) -> PathBuf {
        self.models_dir.join(format!("{}-text.onnx", self.name))
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.models_dir.join(format!("{}-tokenizer.json", self.name))
    }
}

impl Config {
    /// Load from `$FASHION_EMBED_CONFIG` or the default location, writing
    /// a default file when none exists yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fashion-embed")
    }

    pub fn config_path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => Self::config_dir().join("config.toml"),
        }
    }
}
