use kurbo::{BezPath, Line, ParamCurve, ParamCurveNearest, Point, Shape};

use crate::{
    error::{TuneError, TuneResult},
    raster::{PixelFormat, Raster},
    resample::{ResizeFilter, resize},
};

pub type Rgba8 = [u8; 4];

/// Reference width the slant and seam proportions are expressed against.
const REFERENCE_WIDTH: f64 = 960.0;

/// Output height for a 16:9 canvas of the given width.
pub fn height_for_width(width: u32) -> u32 {
    (f64::from(width) * 9.0 / 16.0).round() as u32
}

/// Diagonal split layout. Every field is a pure function of `process_width`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitGeometry {
    pub process_width: u32,
    pub process_height: u32,
    /// Top end of the split line.
    pub split_x: u32,
    /// How far right of `split_x` the split line ends at the bottom edge.
    pub split_offset: u32,
    /// Horizontal shift applied to each source (left source moves left, right source moves right).
    pub content_offset: u32,
    pub seam_width: u32,
}

impl SplitGeometry {
    pub fn for_width(process_width: u32) -> TuneResult<Self> {
        if process_width == 0 {
            return Err(TuneError::invalid_input("process width must be non-zero"));
        }
        let w = f64::from(process_width);
        Ok(Self {
            process_width,
            process_height: height_for_width(process_width),
            split_x: process_width / 2,
            split_offset: (w * 50.0 / REFERENCE_WIDTH).round() as u32,
            content_offset: (w * 0.25).round() as u32,
            seam_width: ((w * 3.0 / REFERENCE_WIDTH).round() as u32).max(3),
        })
    }

    pub fn seam(&self) -> Line {
        Line::new(
            (f64::from(self.split_x), 0.0),
            (
                f64::from(self.split_x + self.split_offset),
                f64::from(self.process_height),
            ),
        )
    }

    /// Region where the right source wins: right of the seam, up to the canvas edge.
    pub fn right_region(&self) -> BezPath {
        let w = f64::from(self.process_width);
        let h = f64::from(self.process_height);
        let seam = self.seam();
        let mut path = BezPath::new();
        path.move_to(seam.p0);
        path.line_to((w, 0.0));
        path.line_to((w, h));
        path.line_to(seam.p1);
        path.close_path();
        path
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositeOptions {
    /// Rescale the finished canvas to this width (16:9 kept). `None` keeps the process width.
    pub final_width: Option<u32>,
    pub seam_rgba: Rgba8,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            final_width: None,
            seam_rgba: [255, 255, 255, 255],
        }
    }
}

/// Blends `left` and `right` along a slanted split into one 16:9 RGBA canvas.
///
/// Both sources are stretched (no letterboxing) to `left.width() x round(left.width() * 9/16)`.
/// The left source is shifted left and the right source shifted right by a quarter of the width,
/// the right one wins right of the seam, and a solid seam line is drawn on top.
#[tracing::instrument(
    level = "debug",
    skip(left, right),
    fields(left_w = left.width(), right_w = right.width())
)]
pub fn composite(left: &Raster, right: &Raster, opts: &CompositeOptions) -> TuneResult<Raster> {
    left.ensure_non_empty("left raster")?;
    right.ensure_non_empty("right raster")?;
    if opts.final_width == Some(0) {
        return Err(TuneError::invalid_input("final width must be non-zero"));
    }

    let geom = SplitGeometry::for_width(left.width())?;
    let (w, h) = (geom.process_width, geom.process_height);

    let left = resize(left, w, h, ResizeFilter::Bicubic)?.to_rgba8();
    let right = resize(right, w, h, ResizeFilter::Bicubic)?.to_rgba8();

    let offset = i64::from(geom.content_offset);
    let left_canvas = paste_shifted(&left, -offset);
    let right_canvas = paste_shifted(&right, offset);
    let mask = split_mask(&geom);

    let mut out = vec![0u8; left_canvas.len()];
    select_by_mask_in_place(&mut out, &left_canvas, &right_canvas, &mask)?;
    draw_seam_in_place(&mut out, &geom, opts.seam_rgba)?;

    let canvas = Raster::new(w, h, PixelFormat::Rgba8, out)?;
    match opts.final_width {
        Some(fw) if fw != w => resize(&canvas, fw, height_for_width(fw), ResizeFilter::HighQuality),
        _ => Ok(canvas),
    }
}

/// Single-channel mask, 255 inside [`SplitGeometry::right_region`], 0 elsewhere.
///
/// Coverage is sampled at pixel centers, so the edge is hard.
pub fn split_mask(geom: &SplitGeometry) -> Vec<u8> {
    let (w, h) = (geom.process_width as usize, geom.process_height as usize);
    let region = geom.right_region();
    let left_bound = region.bounding_box().x0;

    let mut mask = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            if p.x >= left_bound && region.contains(p) {
                mask[y * w + x] = u8::MAX;
            }
        }
    }
    mask
}

/// Copies `src` onto a transparent canvas of the same size, shifted horizontally by `dx`.
fn paste_shifted(src: &Raster, dx: i64) -> Vec<u8> {
    let w = src.width() as usize;
    let h = src.height() as usize;
    let mut out = vec![0u8; w * h * 4];
    let shift = dx.unsigned_abs() as usize;
    if shift >= w {
        return out;
    }
    let keep = (w - shift) * 4;
    let shift_bytes = shift * 4;

    for (dst_row, src_row) in out
        .chunks_exact_mut(w * 4)
        .zip(src.data().chunks_exact(w * 4))
    {
        if dx >= 0 {
            dst_row[shift_bytes..].copy_from_slice(&src_row[..keep]);
        } else {
            dst_row[..keep].copy_from_slice(&src_row[shift_bytes..]);
        }
    }
    out
}

pub fn select_by_mask_in_place(
    dst: &mut [u8],
    a: &[u8],
    b: &[u8],
    mask: &[u8],
) -> TuneResult<()> {
    if dst.len() != a.len()
        || dst.len() != b.len()
        || !dst.len().is_multiple_of(4)
        || mask.len() * 4 != dst.len()
    {
        return Err(TuneError::invalid_input(
            "select_by_mask_in_place expects equal-length rgba8 buffers and a matching mask",
        ));
    }
    for (((d, a), b), &m) in dst
        .chunks_exact_mut(4)
        .zip(a.chunks_exact(4))
        .zip(b.chunks_exact(4))
        .zip(mask)
    {
        let out = crossfade([a[0], a[1], a[2], a[3]], [b[0], b[1], b[2], b[3]], m);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// `weight` 0 gives `a`, 255 gives `b`.
pub fn crossfade(a: Rgba8, b: Rgba8, weight: u8) -> Rgba8 {
    let tt = u16::from(weight);
    let it = 255u16 - tt;

    let mut out = [0u8; 4];
    for i in 0..4 {
        let av = mul_div255(u16::from(a[i]), it);
        let bv = mul_div255(u16::from(b[i]), tt);
        out[i] = add_sat_u8(av, bv);
    }
    out
}

fn draw_seam_in_place(dst: &mut [u8], geom: &SplitGeometry, rgba: Rgba8) -> TuneResult<()> {
    let (w, h) = (geom.process_width, geom.process_height);
    if dst.len() != (w as usize) * (h as usize) * 4 {
        return Err(TuneError::invalid_input(
            "draw_seam_in_place expects a buffer matching width*height*4",
        ));
    }

    let seam = geom.seam();
    let half = f64::from(geom.seam_width) / 2.0;
    let half_sq = half * half;

    for y in 0..h {
        let cy = f64::from(y) + 0.5;
        let cx = seam.eval(cy / f64::from(h)).x;
        let x0 = (cx - half - 1.0).floor().max(0.0) as u32;
        let x1 = ((cx + half + 1.0).ceil() as u32).min(w);
        for x in x0..x1 {
            let p = Point::new(f64::from(x) + 0.5, cy);
            if seam.nearest(p, 1e-6).distance_sq <= half_sq {
                let idx = ((y as usize) * (w as usize) + (x as usize)) * 4;
                dst[idx..idx + 4].copy_from_slice(&rgba);
            }
        }
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}
