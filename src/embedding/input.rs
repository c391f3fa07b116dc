//! Image inputs accepted by the embedding service and their decoding.

use base64::Engine;
use image::{DynamicImage, RgbImage};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{EmbedError, Result};

/// An image to embed: a file on disk, encoded bytes, or an already decoded image.
#[derive(Clone)]
pub enum ImageInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Image(DynamicImage),
}

impl fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageInput::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ImageInput::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            ImageInput::Image(img) => write!(f, "Image({}x{})", img.width(), img.height()),
        }
    }
}

impl ImageInput {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        ImageInput::Path(path.into())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        ImageInput::Bytes(bytes.into())
    }

    /// Interpret a textual reference to an image.
    ///
    /// Accepts `data:image/...;base64,` URLs, `base64:` prefixed payloads and
    /// paths to existing files.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();

        if let Some(rest) = reference.strip_prefix("data:") {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                EmbedError::UnsupportedInput("data URL without payload".to_string())
            })?;
            if !header.starts_with("image/") || !header.ends_with(";base64") {
                return Err(EmbedError::UnsupportedInput(format!(
                    "data URL must be a base64 image, got '{}'",
                    header
                )));
            }
            return decode_base64(payload).map(ImageInput::from_bytes);
        }

        if let Some(payload) = reference.strip_prefix("base64:") {
            return decode_base64(payload).map(ImageInput::from_bytes);
        }

        let path = Path::new(reference);
        if path.is_file() {
            return Ok(ImageInput::Path(path.to_path_buf()));
        }

        Err(EmbedError::UnsupportedInput(format!(
            "'{}' is neither an image file nor a base64 image",
            reference
        )))
    }

    /// Short human-readable description, used in logs and exports.
    pub fn describe(&self) -> String {
        match self {
            ImageInput::Path(path) => path.display().to_string(),
            ImageInput::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            ImageInput::Image(img) => format!("<image {}x{}>", img.width(), img.height()),
        }
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        ImageInput::Path(path)
    }
}

impl From<&Path> for ImageInput {
    fn from(path: &Path) -> Self {
        ImageInput::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        ImageInput::Bytes(bytes)
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(img: DynamicImage) -> Self {
        ImageInput::Image(img)
    }
}

impl From<RgbImage> for ImageInput {
    fn from(img: RgbImage) -> Self {
        ImageInput::Image(DynamicImage::ImageRgb8(img))
    }
}

/// Decode an input and convert it to three-channel RGB.
///
/// Files and bytes are identified by their content. Anything that cannot be
/// read or decoded as an image is an [`EmbedError::ImageDecode`].
pub fn preprocess(input: &ImageInput) -> Result<RgbImage> {
    let image = match input {
        ImageInput::Path(path) => load_image_file(path)?,
        ImageInput::Bytes(bytes) => load_image_bytes(bytes)?,
        ImageInput::Image(img) => return Ok(to_rgb(img.clone())),
    };

    Ok(to_rgb(image))
}

fn to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

fn load_image_file(path: &Path) -> Result<DynamicImage> {
    let decode_error = |e: &dyn std::fmt::Display| {
        EmbedError::ImageDecode(format!("{}: {}", path.display(), e))
    };

    // Content decides the format; the extension is only a fallback.
    let reader = image::ImageReader::open(path)
        .map_err(|e| decode_error(&e))?
        .with_guessed_format()
        .map_err(|e| decode_error(&e))?;

    if reader.format().is_none() {
        return Err(decode_error(&"not a recognised image format"));
    }

    reader.decode().map_err(|e| decode_error(&e))
}

fn load_image_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(EmbedError::ImageDecode("image data is empty".to_string()));
    }

    if image::guess_format(bytes).is_err() {
        return Err(EmbedError::ImageDecode(
            "bytes are not in a recognised image format".to_string(),
        ));
    }

    Ok(image::load_from_memory(bytes)?)
}

fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(EmbedError::UnsupportedInput("empty base64 payload".to_string()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map_err(|e| EmbedError::ImageDecode(format!("invalid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbaImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_preprocess_in_memory_grayscale() {
        let gray = GrayImage::from_pixel(8, 6, Luma([200]));
        let rgb = preprocess(&ImageInput::Image(DynamicImage::ImageLuma8(gray))).unwrap();

        assert_eq!(rgb.dimensions(), (8, 6));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([200, 200, 200]));
    }

    #[test]
    fn test_preprocess_bytes_drops_alpha() {
        let rgba = RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 128]));
        let bytes = png_bytes(&DynamicImage::ImageRgba8(rgba));

        let rgb = preprocess(&ImageInput::Bytes(bytes)).unwrap();
        assert_eq!(rgb.get_pixel(3, 3), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_preprocess_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(16, 16, Rgb([255, 0, 0])).save(&path).unwrap();

        let rgb = preprocess(&ImageInput::from_path(&path)).unwrap();
        assert_eq!(rgb.dimensions(), (16, 16));
    }

    #[test]
    fn test_preprocess_unknown_bytes_is_decode_error() {
        let result = preprocess(&ImageInput::Bytes(b"definitely not an image".to_vec()));
        assert!(matches!(result, Err(EmbedError::ImageDecode(_))));
    }

    #[test]
    fn test_preprocess_empty_bytes_is_decode_error() {
        let result = preprocess(&ImageInput::from_bytes(Vec::new()));
        assert!(matches!(result, Err(EmbedError::ImageDecode(_))));
    }

    #[test]
    fn test_preprocess_corrupt_png_is_decode_error() {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);

        let result = preprocess(&ImageInput::Bytes(bytes));
        assert!(matches!(result, Err(EmbedError::ImageDecode(_))));
    }

    #[test]
    fn test_preprocess_missing_file_is_decode_error() {
        let dir = tempdir().unwrap();
        let result = preprocess(&ImageInput::from_path(dir.path().join("missing.jpg")));
        assert!(matches!(result, Err(EmbedError::ImageDecode(_))));
    }

    #[test]
    fn test_preprocess_text_file_is_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let result = preprocess(&ImageInput::from_path(&path));
        assert!(matches!(result, Err(EmbedError::ImageDecode(_))));
    }

    #[test]
    fn test_preprocess_path_without_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache_entry");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 0, 0])));
        std::fs::write(&path, png_bytes(&img)).unwrap();

        let rgb = preprocess(&ImageInput::from_path(&path)).unwrap();
        assert_eq!(rgb.dimensions(), (8, 8));
        assert_eq!(rgb.get_pixel(4, 4), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_preprocess_png_with_jpg_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("red.jpg");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 0, 0])));
        std::fs::write(&path, png_bytes(&img)).unwrap();

        let rgb = preprocess(&ImageInput::from_path(&path)).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_parse_data_url() {
        let bytes = png_bytes(&DynamicImage::ImageRgb8(RgbImage::new(2, 2)));
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let input = ImageInput::parse(&format!("data:image/png;base64,{}", encoded)).unwrap();
        match input {
            ImageInput::Bytes(decoded) => assert_eq!(decoded, bytes),
            other => panic!("expected bytes, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_existing_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbImage::new(2, 2).save(&path).unwrap();

        let input = ImageInput::parse(path.to_str().unwrap()).unwrap();
        assert!(matches!(input, ImageInput::Path(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_reference() {
        let result = ImageInput::parse("s3://bucket/key.png");
        assert!(matches!(result, Err(EmbedError::UnsupportedInput(_))));

        let result = ImageInput::parse("data:text/plain;base64,aGVsbG8=");
        assert!(matches!(result, Err(EmbedError::UnsupportedInput(_))));
    }
}
