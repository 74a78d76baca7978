use crate::{
    error::{TuneError, TuneResult},
    raster::{PixelFormat, Raster},
};

/// Encode capability driven by the quality search.
///
/// Implementations must be deterministic: the same raster at the same quality always yields the
/// same bytes, otherwise the search can not reuse a probe's output as the final artifact.
pub trait Codec: Send + Sync {
    fn encode(&self, raster: &Raster, quality: u8) -> TuneResult<Vec<u8>>;

    /// File extension (without the dot) implied by the encoded format.
    fn extension(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Webp,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    pub kind: CodecKind,
    pub lossless: bool,
}

pub fn create_codec(settings: &CodecSettings) -> Box<dyn Codec> {
    match settings.kind {
        CodecKind::Webp => Box::new(WebpCodec {
            lossless: settings.lossless,
        }),
    }
}

/// libwebp effort level used for every encode (`0..=6`, 6 is slowest and smallest).
pub const WEBP_METHOD: i32 = 6;

/// libwebp through the `webp` crate, always at maximum effort.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebpCodec {
    pub lossless: bool,
}

impl WebpCodec {
    fn config(&self, quality: u8) -> TuneResult<webp::WebPConfig> {
        let mut config = webp::WebPConfig::new()
            .map_err(|()| TuneError::encode_failed(quality, "libwebp config init failed"))?;
        config.lossless = i32::from(self.lossless);
        config.alpha_compression = i32::from(!self.lossless);
        config.quality = f32::from(quality);
        config.method = WEBP_METHOD;
        Ok(config)
    }
}

impl Codec for WebpCodec {
    fn encode(&self, raster: &Raster, quality: u8) -> TuneResult<Vec<u8>> {
        if raster.is_empty() {
            return Err(TuneError::encode_failed(quality, "empty raster"));
        }
        if quality > 100 {
            return Err(TuneError::encode_failed(quality, "quality must be within 0..=100"));
        }

        let encoder = match raster.format() {
            PixelFormat::Rgb8 => {
                webp::Encoder::from_rgb(raster.data(), raster.width(), raster.height())
            }
            PixelFormat::Rgba8 => {
                webp::Encoder::from_rgba(raster.data(), raster.width(), raster.height())
            }
        };

        let config = self.config(quality)?;
        let mem = encoder
            .encode_advanced(&config)
            .map_err(|e| TuneError::encode_failed(quality, format!("libwebp: {e:?}")))?;
        Ok(mem.to_vec())
    }

    fn extension(&self) -> &'static str {
        "webp"
    }
}
