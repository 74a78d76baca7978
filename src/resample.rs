use image::imageops::FilterType;

use crate::{
    error::{TuneError, TuneResult},
    raster::Raster,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResizeFilter {
    /// Bicubic stretch, used to normalize inputs before compositing.
    Bicubic,
    /// Lanczos3, used for every user-visible rescale.
    #[default]
    HighQuality,
}

impl ResizeFilter {
    fn to_image(self) -> FilterType {
        match self {
            ResizeFilter::Bicubic => FilterType::CatmullRom,
            ResizeFilter::HighQuality => FilterType::Lanczos3,
        }
    }
}

/// Resize to exactly `width x height`, ignoring the source aspect ratio.
pub fn resize(raster: &Raster, width: u32, height: u32, filter: ResizeFilter) -> TuneResult<Raster> {
    raster.ensure_non_empty("resize source")?;
    if width == 0 || height == 0 {
        return Err(TuneError::invalid_input(format!(
            "resize target must be non-zero, got {width}x{height}"
        )));
    }
    if raster.width() == width && raster.height() == height {
        return Ok(raster.clone());
    }
    let img = raster.to_dynamic()?;
    let out = img.resize_exact(width, height, filter.to_image());
    Ok(Raster::from_dynamic(out))
}

pub fn crop(raster: &Raster, x: u32, y: u32, width: u32, height: u32) -> TuneResult<Raster> {
    let fits_x = x.checked_add(width).is_some_and(|r| r <= raster.width());
    let fits_y = y.checked_add(height).is_some_and(|b| b <= raster.height());
    if width == 0 || height == 0 || !fits_x || !fits_y {
        return Err(TuneError::invalid_input(format!(
            "crop window {width}x{height}+{x}+{y} outside {}x{} raster",
            raster.width(),
            raster.height()
        )));
    }
    let img = raster.to_dynamic()?;
    Ok(Raster::from_dynamic(img.crop_imm(x, y, width, height)))
}
