//! Size-budgeted image encoding.
//!
//! - [`find_best_quality`] runs a bounded binary search over the codec quality so that the
//!   encoded size meets an [`EncodingTarget`], under one of two [`SearchMode`]s.
//! - [`composite`] blends two images along a slanted seam into one 16:9 canvas.
//! - [`build_zoomed`] / [`build_cropped`] derive a centered zoom variant of an image.
//! - [`convert_file`], [`merge_files`], [`zoom_file`] and [`run_batch`] drive the above from files.
#![forbid(unsafe_code)]

pub mod batch;
pub mod codec;
pub mod composite;
pub mod error;
pub mod pipeline;
pub mod raster;
pub mod resample;
pub mod search;
pub mod settings;
pub mod zoom;

pub use batch::{BatchFailure, BatchReport, BatchThreading, Job, plan_batch, run_batch};
pub use codec::{Codec, CodecKind, CodecSettings, WebpCodec, create_codec};
pub use composite::{CompositeOptions, SplitGeometry, composite, height_for_width, split_mask};
pub use error::{TuneError, TuneResult};
pub use pipeline::{
    ArtifactReport, ConvertOptions, ConvertReport, MergeOptions, convert_file, merge_files,
    resolve_output, write_artifact, zoom_file,
};
pub use raster::{PixelFormat, Raster};
pub use resample::{ResizeFilter, crop, resize};
pub use search::{
    EncodingTarget, MAX_QUALITY, Probe, QualityRange, SearchBudget, SearchMode, SearchOutcome,
    find_best_quality,
};
pub use settings::Settings;
pub use zoom::{ZoomSpec, build_cropped, build_variant, build_zoomed};
