use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;

use crate::{
    batch::BatchThreading,
    codec::CodecSettings,
    error::{TuneError, TuneResult},
    pipeline::{ConvertOptions, MergeOptions},
    zoom::ZoomSpec,
};

/// Defaults for every operation, optionally read from a JSON file.
///
/// Missing sections and fields keep their defaults, so `{}` is a valid settings file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub convert: ConvertOptions,
    pub merge: MergeOptions,
    /// Spec used by the standalone zoom operation.
    pub zoom: ZoomSpec,
    pub codec: CodecSettings,
    pub batch: BatchThreading,
}

impl Settings {
    pub fn from_path(path: &Path) -> TuneResult<Self> {
        let f = File::open(path).map_err(|e| TuneError::io_at("open settings", path, e))?;
        let settings: Settings = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse settings JSON '{}'", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_str(s: &str) -> TuneResult<Self> {
        let settings: Settings = serde_json::from_str(s).context("parse settings JSON")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> TuneResult<()> {
        self.convert.validate()?;
        self.merge.validate()?;
        self.zoom.validate()?;
        if self.batch.threads == Some(0) {
            return Err(TuneError::invalid_input(
                "batch threading 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}
