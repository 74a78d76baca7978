use std::path::Path;

use anyhow::Context as _;

use crate::error::{TuneError, TuneResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// An immutable 8-bit raster.
///
/// Every transform in this crate returns a new `Raster`; the pixel buffer is never mutated
/// after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> TuneResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(format.channels()))
            .ok_or_else(|| TuneError::invalid_input("raster buffer size overflow"))?;
        if data.len() != expected {
            return Err(TuneError::invalid_input(format!(
                "raster buffer length {} does not match {width}x{height} {format:?}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Solid-color RGBA raster.
    pub fn filled_rgba(width: u32, height: u32, rgba: [u8; 4]) -> TuneResult<Self> {
        let n = (width as usize) * (height as usize);
        Self::new(width, height, PixelFormat::Rgba8, rgba.repeat(n))
    }

    pub fn open(path: &Path) -> TuneResult<Self> {
        if !path.is_file() {
            return Err(TuneError::invalid_input(format!(
                "input file '{}' does not exist",
                path.display()
            )));
        }
        let bytes = std::fs::read(path).map_err(|e| TuneError::io_at("read", path, e))?;
        Self::decode(&bytes)
            .map_err(|e| TuneError::invalid_input(format!("'{}': {e}", path.display())))
    }

    pub fn decode(bytes: &[u8]) -> TuneResult<Self> {
        let img = image::load_from_memory(bytes).context("decode image from memory")?;
        Ok(Self::from_dynamic(img))
    }

    /// Converts to RGB8 or RGBA8 depending on whether the source carries an alpha channel.
    pub fn from_dynamic(img: image::DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        if img.color().has_alpha() {
            Self {
                width,
                height,
                format: PixelFormat::Rgba8,
                data: img.into_rgba8().into_raw(),
            }
        } else {
            Self {
                width,
                height,
                format: PixelFormat::Rgb8,
                data: img.into_rgb8().into_raw(),
            }
        }
    }

    pub fn to_dynamic(&self) -> TuneResult<image::DynamicImage> {
        let img = match self.format {
            PixelFormat::Rgb8 => image::RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(image::DynamicImage::ImageRgb8),
            PixelFormat::Rgba8 => {
                image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
                    .map(image::DynamicImage::ImageRgba8)
            }
        };
        img.ok_or_else(|| TuneError::invalid_input("raster buffer does not match its dimensions"))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Uncompressed buffer length in bytes.
    pub fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn ensure_non_empty(&self, what: &str) -> TuneResult<()> {
        if self.is_empty() {
            return Err(TuneError::invalid_input(format!(
                "{what} has zero dimension ({}x{})",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// True when the raster has an alpha channel and at least one pixel is not fully opaque.
    pub fn has_transparency(&self) -> bool {
        match self.format {
            PixelFormat::Rgb8 => false,
            PixelFormat::Rgba8 => self.data.chunks_exact(4).any(|px| px[3] < u8::MAX),
        }
    }

    /// RGBA rasters without any transparent pixel become RGB; everything else is returned as is.
    pub fn flatten_opaque(self) -> Self {
        if self.format != PixelFormat::Rgba8 || self.has_transparency() {
            return self;
        }
        let data = self
            .data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        Self {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb8,
            data,
        }
    }

    pub fn to_rgba8(&self) -> Self {
        match self.format {
            PixelFormat::Rgba8 => self.clone(),
            PixelFormat::Rgb8 => Self {
                width: self.width,
                height: self.height,
                format: PixelFormat::Rgba8,
                data: self
                    .data
                    .chunks_exact(3)
                    .flat_map(|px| [px[0], px[1], px[2], u8::MAX])
                    .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn new_rejects_mismatched_buffer() {
        assert!(Raster::new(2, 2, PixelFormat::Rgb8, vec![0; 11]).is_err());
        assert!(Raster::new(2, 2, PixelFormat::Rgb8, vec![0; 12]).is_ok());
    }

    #[test]
    fn transparency_probe_looks_at_min_alpha() {
        let opaque = Raster::filled_rgba(3, 2, [1, 2, 3, 255]).unwrap();
        assert!(!opaque.has_transparency());

        let mut data = opaque.data().to_vec();
        data[7] = 254;
        let partial = Raster::new(3, 2, PixelFormat::Rgba8, data).unwrap();
        assert!(partial.has_transparency());
    }

    #[test]
    fn flatten_opaque_drops_alpha_only_when_unused() {
        let opaque = Raster::filled_rgba(2, 1, [10, 20, 30, 255]).unwrap();
        let flat = opaque.flatten_opaque();
        assert_eq!(flat.format(), PixelFormat::Rgb8);
        assert_eq!(flat.data(), &[10, 20, 30, 10, 20, 30]);

        let clear = Raster::filled_rgba(2, 1, [10, 20, 30, 0]).unwrap();
        assert_eq!(clear.clone().flatten_opaque(), clear);
    }

    #[test]
    fn decode_png_keeps_alpha_format() {
        let img = image::RgbaImage::from_raw(1, 1, vec![100, 50, 200, 128]).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let raster = Raster::decode(&buf).unwrap();
        assert_eq!((raster.width(), raster.height()), (1, 1));
        assert_eq!(raster.format(), PixelFormat::Rgba8);
        assert_eq!(raster.data(), &[100, 50, 200, 128]);
    }

    #[test]
    fn open_missing_file_is_invalid_input() {
        let err = Raster::open(Path::new("target/does-not-exist.png")).unwrap_err();
        assert!(matches!(err, TuneError::InvalidInput(_)));
    }

    #[test]
    fn to_rgba8_adds_opaque_alpha() {
        let rgb = Raster::new(1, 1, PixelFormat::Rgb8, vec![7, 8, 9]).unwrap();
        assert_eq!(rgb.to_rgba8().data(), &[7, 8, 9, 255]);
    }
}
