//! Fetching model artifacts into the local models directory.

use std::fs::File;
use std::path::Path;

use crate::config::ModelConfig;
use crate::error::{EmbedError, Result};

/// Make sure the vision encoder, text encoder and tokenizer are on disk.
pub fn ensure_all(config: &ModelConfig) -> Result<()> {
    ensure_file(&config.vision_path(), &config.vision_url, config.offline)?;
    ensure_file(&config.text_path(), &config.text_url, config.offline)?;
    ensure_file(&config.tokenizer_path(), &config.tokenizer_url, config.offline)?;
    Ok(())
}

/// Download `url` to `path` unless the file already exists.
pub fn ensure_file(path: &Path, url: &str, offline: bool) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    if offline {
        return Err(EmbedError::ModelLoad(format!(
            "{} is missing and offline mode is enabled (download it from {})",
            path.display(),
            url
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            EmbedError::ModelLoad(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    tracing::info!(url = %url, "Downloading model file...");
    let response = ureq::get(url)
        .call()
        .map_err(|e| EmbedError::ModelLoad(format!("Failed to download {}: {}", url, e)))?;

    // Incomplete downloads stay under the .part name.
    let partial = path.with_extension("part");
    let written = File::create(&partial)
        .and_then(|mut file| std::io::copy(&mut response.into_reader(), &mut file))
        .and_then(|_| std::fs::rename(&partial, path));

    if let Err(e) = written {
        let _ = std::fs::remove_file(&partial);
        return Err(EmbedError::ModelLoad(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }

    tracing::info!(path = ?path, "Model file downloaded");
    Ok(())
}
