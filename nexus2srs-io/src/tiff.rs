//! TIFF image sink for detector frames.

use log::debug;
use ndarray::ArrayView2;
use nexus2srs_core::{ImageSink, Persisted};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};

/// Writes one grayscale TIFF per frame.
///
/// Frames holding only non-negative integers are stored as 32-bit unsigned pixels, all
/// others as 32-bit floats.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffImageSink {
    overwrite: bool,
}

impl TiffImageSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace files that already exist instead of keeping them.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

impl ImageSink for TiffImageSink {
    fn write_image(
        &mut self,
        image: ArrayView2<'_, f64>,
        path: &Path,
    ) -> nexus2srs_core::Result<Persisted> {
        if path.exists() && !self.overwrite {
            debug!("{} exists, kept", path.display());
            return Ok(Persisted::Existing);
        }
        write_tiff(image, path).map_err(|e| nexus2srs_core::Error::ImageWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Persisted::Written)
    }
}

fn is_unsigned_integral(image: &ArrayView2<'_, f64>) -> bool {
    image
        .iter()
        .all(|&v| v.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&v))
}

/// Encode `image` as a single-page grayscale TIFF.
///
/// # Errors
/// Returns an error if the directory or file cannot be created or encoding fails.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn write_tiff(image: ArrayView2<'_, f64>, path: &Path) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let (rows, cols) = image.dim();
    let height = u32::try_from(rows)
        .map_err(|_| crate::Error::InvalidFormat(format!("{rows} rows exceed TIFF limits")))?;
    let width = u32::try_from(cols)
        .map_err(|_| crate::Error::InvalidFormat(format!("{cols} columns exceed TIFF limits")))?;

    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    if is_unsigned_integral(&image) {
        let pixels: Vec<u32> = image.iter().map(|&v| v as u32).collect();
        encoder.write_image::<colortype::Gray32>(width, height, &pixels)?;
    } else {
        let pixels: Vec<f32> = image.iter().map(|&v| v as f32).collect();
        encoder.write_image::<colortype::Gray32Float>(width, height, &pixels)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1-pil-files/00001.tif");
        let image = array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]];
        let mut sink = TiffImageSink::new();
        assert_eq!(sink.write_image(image.view(), &path).unwrap(), Persisted::Written);
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*"));
    }

    #[test]
    fn test_existing_file_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("00001.tif");
        fs::write(&path, b"old").unwrap();
        let image = array![[0.5, -1.0]];
        let mut sink = TiffImageSink::new();
        assert_eq!(sink.write_image(image.view(), &path).unwrap(), Persisted::Existing);
        assert_eq!(fs::read(&path).unwrap(), b"old");

        let mut sink = TiffImageSink::new().with_overwrite(true);
        assert_eq!(sink.write_image(image.view(), &path).unwrap(), Persisted::Written);
        assert_ne!(fs::read(&path).unwrap(), b"old");
    }

    #[test]
    fn test_pixel_type() {
        assert!(is_unsigned_integral(&array![[0.0, 7.0]].view()));
        assert!(!is_unsigned_integral(&array![[0.5, 7.0]].view()));
        assert!(!is_unsigned_integral(&array![[-1.0]].view()));
    }
}
