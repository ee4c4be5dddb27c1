//! Image acquisition collaborators.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use crate::raster::{RasterError, RasterImage};

/// Default file the camera writes to and the pipeline reads from.
pub const DEFAULT_IMAGE_PATH: &str = "captured_image.jpg";

/// Default still-capture program.
pub const DEFAULT_CAPTURE_COMMAND: &str = "libcamera-still";

/// Errors raised while acquiring an image.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The capture program could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The capture program exited unsuccessfully.
    #[error("`{command}` exited with {status}")]
    Capture {
        command: String,
        status: std::process::ExitStatus,
    },

    /// The image file could not be opened or decoded.
    #[error("failed to read image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The decoded image has no usable pixels.
    #[error("invalid image: {0}")]
    ImageInvalid(#[from] RasterError),
}

/// Producer of raster images.
pub trait ImageSource {
    /// Acquires one image.
    fn acquire(&mut self) -> Result<RasterImage, AcquisitionError>;
}

impl<S: ImageSource + ?Sized> ImageSource for Box<S> {
    fn acquire(&mut self) -> Result<RasterImage, AcquisitionError> {
        (**self).acquire()
    }
}

/// Decodes an image file from disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    max_dimension: Option<u32>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_dimension: None,
        }
    }

    /// Downsizes images whose larger side exceeds `max_dimension`, keeping the aspect ratio.
    pub fn with_max_dimension(mut self, max_dimension: Option<u32>) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSource for FileSource {
    fn acquire(&mut self) -> Result<RasterImage, AcquisitionError> {
        load(&self.path, self.max_dimension)
    }
}

/// Captures a still with an external camera program, then decodes it.
///
/// Runs `<command> -o <path>`.
#[derive(Debug, Clone)]
pub struct CameraSource {
    command: String,
    file: FileSource,
}

impl CameraSource {
    pub fn new(command: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            file: FileSource::new(path),
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: Option<u32>) -> Self {
        self.file = self.file.with_max_dimension(max_dimension);
        self
    }

    fn capture(&self) -> Result<(), AcquisitionError> {
        debug!(command = %self.command, path = %self.file.path().display(), "capturing still");
        let status = Command::new(&self.command)
            .arg("-o")
            .arg(self.file.path())
            .status()
            .map_err(|source| AcquisitionError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(AcquisitionError::Capture {
                command: self.command.clone(),
                status,
            });
        }

        info!("Image captured and saved to {}", self.file.path().display());
        Ok(())
    }
}

impl Default for CameraSource {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_COMMAND, DEFAULT_IMAGE_PATH)
    }
}

impl ImageSource for CameraSource {
    fn acquire(&mut self) -> Result<RasterImage, AcquisitionError> {
        self.capture()?;
        self.file.acquire()
    }
}

/// Hands out clones of an image already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    image: RasterImage,
}

impl MemorySource {
    pub fn new(image: RasterImage) -> Self {
        Self { image }
    }
}

impl ImageSource for MemorySource {
    fn acquire(&mut self) -> Result<RasterImage, AcquisitionError> {
        Ok(self.image.clone())
    }
}

fn load(path: &Path, max_dimension: Option<u32>) -> Result<RasterImage, AcquisitionError> {
    let decoded = image::open(path).map_err(|source| AcquisitionError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let decoded = match max_dimension {
        Some(limit) if limit > 0 && decoded.width().max(decoded.height()) > limit => {
            debug!(
                width = decoded.width(),
                height = decoded.height(),
                limit,
                "downsizing image"
            );
            decoded.thumbnail(limit, limit)
        }
        _ => decoded,
    };

    Ok(RasterImage::try_from(decoded.to_rgb8())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use palette::Srgb;
    use tempfile::tempdir;

    #[test]
    fn file_source_decodes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("decode.png");
        image::RgbImage::from_pixel(8, 6, image::Rgb([200, 100, 50]))
            .save(&path)
            .unwrap();

        let image = FileSource::new(&path).acquire().unwrap();

        assert_eq!((image.width(), image.height()), (8, 6));
        assert!(image.pixels().iter().all(|px| *px == Srgb::new(200, 100, 50)));
    }

    #[test]
    fn file_source_downsizes_large_images() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("downsize.png");
        image::RgbImage::from_pixel(64, 32, image::Rgb([0, 0, 255]))
            .save(&path)
            .unwrap();

        let image = FileSource::new(&path)
            .with_max_dimension(Some(16))
            .acquire()
            .unwrap();

        assert_eq!((image.width(), image.height()), (16, 8));
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let result = FileSource::new(dir.path().join("missing.png")).acquire();
        assert!(matches!(result, Err(AcquisitionError::Decode { .. })));
    }

    #[test]
    fn missing_capture_program_is_a_spawn_error() {
        let dir = tempdir().unwrap();
        let mut camera =
            CameraSource::new("rgb-dispenser-no-such-camera", dir.path().join("never.jpg"));
        assert!(matches!(
            camera.acquire(),
            Err(AcquisitionError::Spawn { .. })
        ));
    }
}
