//! Flash emulation backing the engine's sample data
//!
//! On hardware the engine reads its sample ROM from SPI flash. Inside a host
//! process that flash is emulated from an image file: one image per process,
//! initialized when the first module instance appears and released when the
//! last one goes away (see [`crate::arbiter`]).

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

/// Errors that can occur while emulating flash
#[derive(Debug, Error)]
pub enum FlashError {
    /// The image file does not exist
    #[error("Flash image not found: {0}")]
    ImageNotFound(PathBuf),

    /// The image file could not be read
    #[error("Failed to read flash image '{path}': {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A read was attempted while no image is loaded
    #[error("Flash emulation not initialized")]
    NotInitialized,

    /// A read reached past the end of the image
    #[error("Flash read of {len} bytes at {offset:#x} exceeds image size {size}")]
    OutOfBounds { offset: usize, len: usize, size: usize },
}

/// Result type for flash operations
pub type FlashResult<T> = Result<T, FlashError>;

/// Process-wide flash emulation lifecycle
pub trait FlashEmulation: Send {
    /// Load the image; replaces any previously loaded one
    fn init(&mut self, image: &Path) -> FlashResult<()>;

    /// Drop the loaded image
    fn release(&mut self);
}

#[derive(Default)]
struct Image {
    path: PathBuf,
    data: Vec<u8>,
}

/// File-backed flash image held in memory
///
/// Clones share the same image, so the engine side can keep a reader while
/// the arbiter owns the lifecycle.
#[derive(Clone, Default)]
pub struct FlashImage {
    image: Arc<RwLock<Option<Image>>>,
}

impl FlashImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.image.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Size of the loaded image in bytes (0 when not loaded)
    pub fn len(&self) -> usize {
        self.image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |image| image.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the loaded image
    pub fn path(&self) -> Option<PathBuf> {
        self.image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|image| image.path.clone())
    }

    /// Copy `buf.len()` bytes starting at `offset`
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> FlashResult<()> {
        let guard = self.image.read().unwrap_or_else(PoisonError::into_inner);
        let image = guard.as_ref().ok_or(FlashError::NotInitialized)?;

        let end = offset
            .checked_add(buf.len())
            .filter(|&end| end <= image.data.len())
            .ok_or(FlashError::OutOfBounds {
                offset,
                len: buf.len(),
                size: image.data.len(),
            })?;
        buf.copy_from_slice(&image.data[offset..end]);
        Ok(())
    }
}

impl FlashEmulation for FlashImage {
    fn init(&mut self, image: &Path) -> FlashResult<()> {
        if !image.exists() {
            return Err(FlashError::ImageNotFound(image.to_path_buf()));
        }

        let data = std::fs::read(image).map_err(|source| FlashError::ImageRead {
            path: image.to_path_buf(),
            source,
        })?;

        log::info!(
            "FlashImage: loaded {} ({} bytes)",
            image.display(),
            data.len()
        );

        *self.image.write().unwrap_or_else(PoisonError::into_inner) = Some(Image {
            path: image.to_path_buf(),
            data,
        });
        Ok(())
    }

    fn release(&mut self) {
        if let Some(image) = self.image.write().unwrap_or_else(PoisonError::into_inner).take() {
            log::info!("FlashImage: released {}", image.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_read_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample-rom.tbd");
        std::fs::write(&path, [0xde, 0xad, 0xbe, 0xef, 0x01]).unwrap();

        let mut flash = FlashImage::new();
        let reader = flash.clone();
        flash.init(&path).unwrap();
        assert!(reader.is_loaded());
        assert_eq!(reader.len(), 5);
        assert_eq!(reader.path(), Some(path.clone()));

        let mut buf = [0u8; 2];
        reader.read(2, &mut buf).unwrap();
        assert_eq!(buf, [0xbe, 0xef]);
        assert!(matches!(
            reader.read(4, &mut buf),
            Err(FlashError::OutOfBounds { .. })
        ));

        flash.release();
        assert!(!reader.is_loaded());
        assert!(matches!(reader.read(0, &mut buf), Err(FlashError::NotInitialized)));
    }

    #[test]
    fn test_missing_image() {
        let mut flash = FlashImage::new();
        let err = flash.init(Path::new("/nonexistent/sample-rom.tbd")).unwrap_err();
        assert!(matches!(err, FlashError::ImageNotFound(_)));
        assert!(!flash.is_loaded());
    }
}
