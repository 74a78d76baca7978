use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::{
    codec::Codec,
    error::{TuneError, TuneResult},
    pipeline::{ConvertOptions, ConvertReport, convert_file, resolve_output},
};

/// Input extension picked up when the batch input is a directory.
pub const INPUT_EXTENSION: &str = "png";

/// Subdirectory created inside an input directory when no output directory is given.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "webp";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchThreading {
    pub parallel: bool,
    pub threads: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchFailure {
    pub input: PathBuf,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub succeeded: Vec<ConvertReport>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Expands `input` into conversion jobs.
///
/// A directory yields one job per `*.png` directly inside it (no recursion), sorted by path, with
/// outputs in `out_dir` or `<input>/webp`. A file yields a single job.
pub fn plan_batch(input: &Path, out_dir: Option<&Path>, ext: &str) -> TuneResult<Vec<Job>> {
    if input.is_dir() {
        let out_dir = out_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| input.join(DEFAULT_OUTPUT_SUBDIR));
        std::fs::create_dir_all(&out_dir)
            .map_err(|e| TuneError::io_at("create output directory", &out_dir, e))?;

        let entries =
            std::fs::read_dir(input).map_err(|e| TuneError::io_at("read directory", input, e))?;
        let mut inputs = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| TuneError::io_at("read directory", input, e))?
                .path();
            if path.is_file() && has_input_extension(&path) {
                inputs.push(path);
            }
        }
        inputs.sort();

        return inputs
            .into_iter()
            .map(|input| {
                let output = resolve_output(&input, Some(&out_dir), ext)?;
                Ok(Job { input, output })
            })
            .collect();
    }

    if !input.exists() {
        return Err(TuneError::invalid_input(format!(
            "input path '{}' does not exist",
            input.display()
        )));
    }
    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| TuneError::io_at("create output directory", dir, e))?;
    }
    Ok(vec![Job {
        input: input.to_path_buf(),
        output: resolve_output(input, out_dir, ext)?,
    }])
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(INPUT_EXTENSION))
}

/// Runs every job; a failing job is logged and counted without stopping the others.
///
/// Invalid `opts` or `threading` fail the whole call before any job runs.
pub fn run_batch(
    jobs: &[Job],
    opts: &ConvertOptions,
    codec: &dyn Codec,
    threading: &BatchThreading,
) -> TuneResult<BatchReport> {
    opts.validate()?;

    let results: Vec<(&Job, TuneResult<ConvertReport>)> = if threading.parallel {
        let pool = build_thread_pool(threading.threads)?;
        pool.install(|| {
            jobs.par_iter()
                .map(|job| (job, convert_file(&job.input, &job.output, opts, codec)))
                .collect()
        })
    } else {
        jobs.iter()
            .map(|job| (job, convert_file(&job.input, &job.output, opts, codec)))
            .collect()
    };

    let mut report = BatchReport::default();
    for (job, result) in results {
        match result {
            Ok(r) => report.succeeded.push(r),
            Err(e) => {
                tracing::warn!(input = %job.input.display(), error = %e, "conversion failed");
                report.failed.push(BatchFailure {
                    input: job.input.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "batch finished"
    );
    Ok(report)
}

fn build_thread_pool(threads: Option<usize>) -> TuneResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(TuneError::invalid_input(
            "batch threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| TuneError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}
