use std::path::{Path, PathBuf};

use crate::{
    codec::Codec,
    composite::{CompositeOptions, composite},
    error::{TuneError, TuneResult},
    raster::Raster,
    search::{
        EncodingTarget, QualityRange, SearchBudget, SearchMode, SearchOutcome, find_best_quality,
    },
    zoom::{ZoomSpec, build_variant},
};

/// Options for converting one image (and optionally its zoomed variant).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Lowest quality the search may pick, `1..=100`.
    pub min_quality: u8,
    /// Encodings above this fraction of the source file size steer the search lower.
    pub target_fraction: f64,
    /// Second artifact written next to the main one.
    pub variant: Option<ZoomSpec>,
    pub search: SearchBudget,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            min_quality: 80,
            target_fraction: 0.5,
            variant: Some(ZoomSpec::CropRatio(4)),
            search: SearchBudget::default(),
        }
    }
}

impl ConvertOptions {
    pub fn validate(&self) -> TuneResult<()> {
        if !(1..=100).contains(&self.min_quality) {
            return Err(TuneError::invalid_input(format!(
                "min quality must be within 1..=100, got {}",
                self.min_quality
            )));
        }
        if !self.target_fraction.is_finite() || self.target_fraction <= 0.0 {
            return Err(TuneError::invalid_input(format!(
                "target fraction must be finite and > 0, got {}",
                self.target_fraction
            )));
        }
        if let Some(variant) = &self.variant {
            variant.validate()?;
        }
        self.search.validate()
    }

    fn target(&self, original_bytes: u64) -> EncodingTarget {
        EncodingTarget::FractionOfOriginal {
            original_bytes,
            fraction: self.target_fraction,
        }
    }
}

/// Options for compositing two images into one size-capped artifact.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub final_width: u32,
    pub target_kb: u64,
    pub min_quality: u8,
    pub max_quality: u8,
    pub seam_rgba: [u8; 4],
    pub search: SearchBudget,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            final_width: 960,
            target_kb: 35,
            min_quality: 50,
            max_quality: 95,
            seam_rgba: [255, 255, 255, 255],
            search: SearchBudget::default(),
        }
    }
}

impl MergeOptions {
    pub fn validate(&self) -> TuneResult<()> {
        if self.final_width == 0 {
            return Err(TuneError::invalid_input("merge final width must be non-zero"));
        }
        if self.target_kb == 0 {
            return Err(TuneError::invalid_input("merge target size must be non-zero"));
        }
        QualityRange::new(self.min_quality, self.max_quality)?;
        self.search.validate()
    }

    pub fn target_bytes(&self) -> u64 {
        self.target_kb.saturating_mul(1024)
    }
}

/// One written artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactReport {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub size: u64,
    pub probes: usize,
    pub within_budget: bool,
}

impl ArtifactReport {
    fn new(output: &Path, raster: &Raster, outcome: &SearchOutcome) -> Self {
        Self {
            output: output.to_path_buf(),
            width: raster.width(),
            height: raster.height(),
            quality: outcome.quality,
            size: outcome.size,
            probes: outcome.probes.len(),
            within_budget: outcome.within_budget(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConvertReport {
    pub input: PathBuf,
    pub original_size: u64,
    pub main: ArtifactReport,
    pub variant: Option<ArtifactReport>,
}

impl ConvertReport {
    /// Encoded size as a percentage of the source file size.
    pub fn compression_ratio_pct(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.main.size as f64 / self.original_size as f64 * 100.0
    }
}

/// Output path for a single-file request: `<out_dir>/<stem>.<ext>`, or the input with its
/// extension swapped when no directory is given.
pub fn resolve_output(input: &Path, out_dir: Option<&Path>, ext: &str) -> TuneResult<PathBuf> {
    let stem = input.file_stem().ok_or_else(|| {
        TuneError::invalid_input(format!("input '{}' has no file name", input.display()))
    })?;
    Ok(match out_dir {
        Some(dir) => dir.join(format!("{}.{ext}", stem.to_string_lossy())),
        None => input.with_extension(ext),
    })
}

/// `<dir>/<stem><suffix>.<ext>` next to the main artifact.
pub fn variant_path(main_output: &Path, spec: &ZoomSpec) -> PathBuf {
    let stem = main_output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = main_output
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    main_output.with_file_name(format!("{stem}{}.{ext}", spec.file_suffix()))
}

pub fn ensure_parent_dir(path: &Path) -> TuneResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| TuneError::io_at("create output directory", parent, e))?;
    }
    Ok(())
}

/// Writes `bytes` to `path`, deleting any prior artifact there first.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> TuneResult<()> {
    ensure_parent_dir(path)?;
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| TuneError::io_at("remove prior artifact", path, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| TuneError::io_at("write", path, e))
}

fn file_size(path: &Path) -> TuneResult<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| TuneError::io_at("stat", path, e))
}

fn encode_and_write(
    raster: &Raster,
    output: &Path,
    target: EncodingTarget,
    range: QualityRange,
    mode: SearchMode,
    budget: SearchBudget,
    codec: &dyn Codec,
) -> TuneResult<ArtifactReport> {
    let outcome = find_best_quality(raster, codec, target, range, mode, budget)?;
    write_artifact(output, &outcome.bytes)?;
    Ok(ArtifactReport::new(output, raster, &outcome))
}

/// Converts one image to the codec's format with the smallest-valid search, optionally writing
/// the zoomed variant next to it.
#[tracing::instrument(level = "debug", skip(opts, codec))]
pub fn convert_file(
    input: &Path,
    output: &Path,
    opts: &ConvertOptions,
    codec: &dyn Codec,
) -> TuneResult<ConvertReport> {
    opts.validate()?;
    let raster = Raster::open(input)?.flatten_opaque();
    let original_size = file_size(input)?;
    let range = QualityRange::from_floor(opts.min_quality)?;

    // Both artifacts are encoded before either is written.
    let zoomed = opts
        .variant
        .as_ref()
        .map(|spec| build_variant(&raster, spec).map(|r| (variant_path(output, spec), r)))
        .transpose()?;

    let search = |r: &Raster| {
        find_best_quality(
            r,
            codec,
            opts.target(original_size),
            range,
            SearchMode::SmallestValid,
            opts.search,
        )
    };
    let main_outcome = search(&raster)?;
    let variant_outcome = match &zoomed {
        Some((path, zoomed)) => Some((path, zoomed, search(zoomed)?)),
        None => None,
    };

    write_artifact(output, &main_outcome.bytes)?;
    let main = ArtifactReport::new(output, &raster, &main_outcome);
    let variant = match variant_outcome {
        Some((path, zoomed, outcome)) => {
            write_artifact(path, &outcome.bytes)?;
            Some(ArtifactReport::new(path, zoomed, &outcome))
        }
        None => None,
    };

    let report = ConvertReport {
        input: input.to_path_buf(),
        original_size,
        main,
        variant,
    };
    tracing::info!(
        input = %input.display(),
        output = %report.main.output.display(),
        original_kb = %format!("{:.1}", original_size as f64 / 1024.0),
        encoded_kb = %format!("{:.1}", report.main.size as f64 / 1024.0),
        ratio_pct = %format!("{:.1}", report.compression_ratio_pct()),
        quality = report.main.quality,
        "converted"
    );
    if let Some(v) = &report.variant {
        tracing::info!(output = %v.output.display(), quality = v.quality, size = v.size, "wrote variant");
    }
    Ok(report)
}

/// Composites `left` and `right`, then writes the highest quality that fits the size budget.
#[tracing::instrument(level = "debug", skip(opts, codec))]
pub fn merge_files(
    left: &Path,
    right: &Path,
    output: &Path,
    opts: &MergeOptions,
    codec: &dyn Codec,
) -> TuneResult<ArtifactReport> {
    opts.validate()?;
    let left = Raster::open(left)?;
    let right = Raster::open(right)?;
    let merged = composite(
        &left,
        &right,
        &CompositeOptions {
            final_width: Some(opts.final_width),
            seam_rgba: opts.seam_rgba,
        },
    )?;

    let report = encode_and_write(
        &merged,
        output,
        EncodingTarget::AbsoluteBytes(opts.target_bytes()),
        QualityRange::new(opts.min_quality, opts.max_quality)?,
        SearchMode::BudgetCeiling,
        opts.search,
        codec,
    )?;
    if !report.within_budget {
        tracing::warn!(
            output = %output.display(),
            size = report.size,
            target = opts.target_bytes(),
            "no quality fits the target size, kept the quality floor"
        );
    }
    tracing::info!(
        output = %output.display(),
        width = report.width,
        height = report.height,
        quality = report.quality,
        size = report.size,
        "merged"
    );
    Ok(report)
}

/// Builds the zoomed variant of one image and writes it with the smallest-valid search.
#[tracing::instrument(level = "debug", skip(opts, codec))]
pub fn zoom_file(
    input: &Path,
    output: &Path,
    spec: &ZoomSpec,
    opts: &ConvertOptions,
    codec: &dyn Codec,
) -> TuneResult<ArtifactReport> {
    opts.validate()?;
    spec.validate()?;
    let raster = Raster::open(input)?.flatten_opaque();
    let original_size = file_size(input)?;
    let zoomed = build_variant(&raster, spec)?;

    let report = encode_and_write(
        &zoomed,
        output,
        opts.target(original_size),
        QualityRange::from_floor(opts.min_quality)?,
        SearchMode::SmallestValid,
        opts.search,
        codec,
    )?;
    tracing::info!(
        output = %output.display(),
        width = report.width,
        height = report.height,
        quality = report.quality,
        size = report.size,
        "zoomed"
    );
    Ok(report)
}
