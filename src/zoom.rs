use crate::{
    error::{TuneError, TuneResult},
    raster::Raster,
    resample::{ResizeFilter, crop, resize},
};

pub const DEFAULT_ZOOM_SCALE: f64 = 1.5;
pub const DEFAULT_ZOOM_WIDTH: u32 = 960;
pub const DEFAULT_ZOOM_HEIGHT: u32 = 540;

/// How the second, zoomed artifact is derived from a source image.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomSpec {
    /// Upscale by `scale`, then take a centered `width x height` window.
    Fixed { scale: f64, width: u32, height: u32 },
    /// Centered window covering `1/n` of the source area.
    CropRatio(u32),
}

impl Default for ZoomSpec {
    fn default() -> Self {
        ZoomSpec::Fixed {
            scale: DEFAULT_ZOOM_SCALE,
            width: DEFAULT_ZOOM_WIDTH,
            height: DEFAULT_ZOOM_HEIGHT,
        }
    }
}

impl ZoomSpec {
    /// Suffix appended to the output file stem.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ZoomSpec::Fixed { .. } => "_zoom",
            ZoomSpec::CropRatio(_) => "_crop",
        }
    }

    pub fn validate(&self) -> TuneResult<()> {
        match *self {
            ZoomSpec::Fixed {
                scale,
                width,
                height,
            } => {
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(TuneError::invalid_input(format!(
                        "zoom scale must be finite and > 0, got {scale}"
                    )));
                }
                if width == 0 || height == 0 {
                    return Err(TuneError::invalid_input(format!(
                        "zoom target must be non-zero, got {width}x{height}"
                    )));
                }
            }
            ZoomSpec::CropRatio(n) => {
                if n < 2 {
                    return Err(TuneError::invalid_input(format!(
                        "crop ratio must be >= 2, got {n}"
                    )));
                }
            }
        }
        Ok(())
    }
}

pub fn build_variant(raster: &Raster, spec: &ZoomSpec) -> TuneResult<Raster> {
    match *spec {
        ZoomSpec::Fixed {
            scale,
            width,
            height,
        } => build_zoomed(raster, scale, width, height),
        ZoomSpec::CropRatio(n) => build_cropped(raster, n),
    }
}

/// Uniform upscale by `scale` followed by a centered `target_w x target_h` crop.
pub fn build_zoomed(raster: &Raster, scale: f64, target_w: u32, target_h: u32) -> TuneResult<Raster> {
    ZoomSpec::Fixed {
        scale,
        width: target_w,
        height: target_h,
    }
    .validate()?;
    raster.ensure_non_empty("zoom source")?;

    let scaled_w = scaled_dim(raster.width(), scale)?;
    let scaled_h = scaled_dim(raster.height(), scale)?;
    if scaled_w < target_w || scaled_h < target_h {
        return Err(TuneError::invalid_input(format!(
            "{}x{} scaled by {scale} is {scaled_w}x{scaled_h}, smaller than the {target_w}x{target_h} crop",
            raster.width(),
            raster.height()
        )));
    }

    let scaled = resize(raster, scaled_w, scaled_h, ResizeFilter::HighQuality)?;
    center_crop(&scaled, target_w, target_h)
}

/// Centered crop whose area is `1/crop_ratio` of the source, without rescaling.
pub fn build_cropped(raster: &Raster, crop_ratio: u32) -> TuneResult<Raster> {
    ZoomSpec::CropRatio(crop_ratio).validate()?;
    raster.ensure_non_empty("crop source")?;

    let (target_w, target_h) = crop_ratio_dims(raster.width(), raster.height(), crop_ratio);
    center_crop(raster, target_w, target_h)
}

/// `round(w / sqrt(n)) x round(h / sqrt(n))`, never below 1x1.
pub fn crop_ratio_dims(width: u32, height: u32, crop_ratio: u32) -> (u32, u32) {
    let k = f64::from(crop_ratio).sqrt();
    let w = (f64::from(width) / k).round().max(1.0) as u32;
    let h = (f64::from(height) / k).round().max(1.0) as u32;
    (w.min(width), h.min(height))
}

fn scaled_dim(dim: u32, scale: f64) -> TuneResult<u32> {
    let v = (f64::from(dim) * scale).round();
    if v < 1.0 || v > f64::from(u32::MAX) {
        return Err(TuneError::invalid_input(format!(
            "scaling {dim} by {scale} leaves the u32 range"
        )));
    }
    Ok(v as u32)
}

fn center_crop(raster: &Raster, target_w: u32, target_h: u32) -> TuneResult<Raster> {
    let left = (raster.width() - target_w) / 2;
    let top = (raster.height() - target_h) / 2;
    crop(raster, left, top, target_w, target_h)
}
