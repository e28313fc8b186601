//! Photo sources: resolving an opaque reference to bytes and decoding them at a bounded size.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbaImage;
use thiserror::Error;

use crate::geometry::Size;

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("photo reference is empty")]
    EmptyReference,
    #[error("unsupported photo reference: {0}")]
    UnsupportedReference(String),
    #[error("photo not found: {0}")]
    NotFound(String),
    #[error("failed to read photo {reference}: {source}")]
    Read {
        reference: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode photo: {0}")]
    Decode(#[from] image::ImageError),
    #[error("decoded photo has no pixels")]
    EmptyImage,
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Opens the bytes behind a persisted photo reference.
pub trait ImageSource {
    fn open(&self, reference: &str) -> SourceResult<Vec<u8>>;
}

/// Reads `file://` URIs and plain filesystem paths.
#[derive(Debug, Clone, Default)]
pub struct FileImageSource {
    base_dir: Option<PathBuf>,
}

impl FileImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative references resolve against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, reference: &str) -> SourceResult<PathBuf> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(SourceError::EmptyReference);
        }
        let raw = match trimmed.strip_prefix(FILE_SCHEME) {
            Some(path) => path,
            None if trimmed.contains("://") => {
                return Err(SourceError::UnsupportedReference(trimmed.to_string()));
            }
            None => trimmed,
        };
        let path = Path::new(raw);
        Ok(match (&self.base_dir, path.is_relative()) {
            (Some(base), true) => base.join(path),
            _ => path.to_path_buf(),
        })
    }
}

impl ImageSource for FileImageSource {
    fn open(&self, reference: &str) -> SourceResult<Vec<u8>> {
        let path = self.resolve(reference)?;
        std::fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(reference.to_string()),
            _ => SourceError::Read {
                reference: reference.to_string(),
                source: err,
            },
        })
    }
}

/// In-memory source keyed by reference.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(reference.into(), bytes);
    }

    pub fn revoke(&mut self, reference: &str) {
        self.entries.remove(reference);
    }
}

impl ImageSource for MemoryImageSource {
    fn open(&self, reference: &str) -> SourceResult<Vec<u8>> {
        self.entries
            .get(reference)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(reference.to_string()))
    }
}

/// A decoded photo together with the reference it came from.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub reference: String,
    pub image: RgbaImage,
}

impl SourceImage {
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.image.width()), f64::from(self.image.height()))
    }
}

/// Power-of-two divisor that keeps the decode at most twice the target in each axis.
pub fn sample_factor(width: u32, height: u32, target_width: u32, target_height: u32) -> u32 {
    let target_width = target_width.max(1);
    let target_height = target_height.max(1);
    let mut sample = 1_u32;
    while width / sample > target_width.saturating_mul(2)
        || height / sample > target_height.saturating_mul(2)
    {
        match sample.checked_mul(2) {
            Some(next) => sample = next,
            None => break,
        }
    }
    sample
}

/// Decodes `bytes`, downsampling when the image is far larger than `target`.
pub fn decode_scaled(bytes: &[u8], target: Option<(u32, u32)>) -> SourceResult<RgbaImage> {
    let decoded = image::load_from_memory(bytes)?.to_rgba8();
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(SourceError::EmptyImage);
    }
    let Some((target_width, target_height)) = target else {
        return Ok(decoded);
    };
    let sample = sample_factor(
        decoded.width(),
        decoded.height(),
        target_width,
        target_height,
    );
    if sample == 1 {
        return Ok(decoded);
    }
    let width = (decoded.width() / sample).max(1);
    let height = (decoded.height() / sample).max(1);
    tracing::debug!(
        from_width = decoded.width(),
        from_height = decoded.height(),
        width,
        height,
        sample,
        "downsampling decoded photo"
    );
    Ok(image::imageops::resize(
        &decoded,
        width,
        height,
        FilterType::Triangle,
    ))
}

pub fn load_source_image(
    source: &dyn ImageSource,
    reference: &str,
    target: Option<(u32, u32)>,
) -> SourceResult<SourceImage> {
    let bytes = source.open(reference)?;
    let image = decode_scaled(&bytes, target)?;
    Ok(SourceImage {
        reference: reference.to_string(),
        image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn sample_factor_halves_until_within_twice_target() {
        assert_eq!(sample_factor(4000, 3000, 600, 750), 4);
        assert_eq!(sample_factor(4000, 3000, 100, 100), 32);
        assert_eq!(sample_factor(300, 300, 600, 750), 1);
    }

    #[test]
    fn decode_scaled_downsamples_large_photos() {
        let decoded = decode_scaled(&png_bytes(400, 200), Some((50, 50))).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        let err = decode_scaled(b"not an image", None).expect_err("corrupt");
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn file_source_resolves_file_uris_and_rejects_other_schemes() {
        let source = FileImageSource::with_base_dir("/photos");
        assert_eq!(
            source.resolve("file:///tmp/a.png").expect("file uri"),
            PathBuf::from("/tmp/a.png")
        );
        assert_eq!(
            source.resolve("cat.png").expect("relative"),
            PathBuf::from("/photos/cat.png")
        );
        assert!(matches!(
            source.resolve("content://media/1"),
            Err(SourceError::UnsupportedReference(_))
        ));
        assert!(matches!(source.resolve("  "), Err(SourceError::EmptyReference)));
    }

    #[test]
    fn revoked_memory_reference_is_not_found() {
        let mut source = MemoryImageSource::new();
        source.insert("mem://cat", png_bytes(4, 4));
        assert!(load_source_image(&source, "mem://cat", None).is_ok());
        source.revoke("mem://cat");
        assert!(matches!(
            load_source_image(&source, "mem://cat", None),
            Err(SourceError::NotFound(_))
        ));
    }
}
