//! Bounded binary search over the codec quality parameter.
//!
//! Two acceptance policies are supported, see [`SearchMode`]. Both assume that a higher quality
//! never produces a smaller encoding, and both probe at most
//! `ceil(log2(ceiling - floor + 1)) + 1` qualities. Every probe is a full in-memory encode; the
//! winning probe's bytes are returned as is, so no final re-encode happens.

use std::time::{Duration, Instant};

use crate::{
    codec::Codec,
    error::{TuneError, TuneResult},
    raster::Raster,
};

pub const MAX_QUALITY: u8 = 100;

/// Size objective of a search.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingTarget {
    AbsoluteBytes(u64),
    FractionOfOriginal { original_bytes: u64, fraction: f64 },
}

impl EncodingTarget {
    /// Byte budget the probes are compared against.
    ///
    /// For a fractional target this is `floor(original_bytes * fraction)`; for integer sizes
    /// `size > floor(x)` is the same test as `size > x`.
    pub fn budget_bytes(&self) -> TuneResult<u64> {
        match *self {
            EncodingTarget::AbsoluteBytes(n) => Ok(n),
            EncodingTarget::FractionOfOriginal {
                original_bytes,
                fraction,
            } => {
                if !fraction.is_finite() || fraction <= 0.0 {
                    return Err(TuneError::invalid_input(format!(
                        "target fraction must be finite and > 0, got {fraction}"
                    )));
                }
                Ok((original_bytes as f64 * fraction).floor() as u64)
            }
        }
    }
}

/// Closed quality interval `[floor, ceiling]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityRange {
    floor: u8,
    ceiling: u8,
}

impl QualityRange {
    pub fn new(floor: u8, ceiling: u8) -> TuneResult<Self> {
        if ceiling > MAX_QUALITY {
            return Err(TuneError::invalid_input(format!(
                "quality ceiling must be <= {MAX_QUALITY}, got {ceiling}"
            )));
        }
        if floor > ceiling {
            return Err(TuneError::invalid_input(format!(
                "quality floor {floor} is above ceiling {ceiling}"
            )));
        }
        Ok(Self { floor, ceiling })
    }

    /// `[floor, 100]`.
    pub fn from_floor(floor: u8) -> TuneResult<Self> {
        Self::new(floor, MAX_QUALITY)
    }

    pub fn floor(&self) -> u8 {
        self.floor
    }

    pub fn ceiling(&self) -> u8 {
        self.ceiling
    }

    /// Number of qualities in the interval.
    pub fn span(&self) -> u32 {
        u32::from(self.ceiling - self.floor) + 1
    }

    pub fn contains(&self, quality: u8) -> bool {
        (self.floor..=self.ceiling).contains(&quality)
    }

    /// Upper bound on the number of probes either mode performs over this range.
    pub fn max_probes(&self) -> u32 {
        ceil_log2(self.span()) + 1
    }
}

fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        u32::BITS - (n - 1).leading_zeros()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Largest quality whose encoding fits the budget. Falls back to the floor when nothing fits.
    #[default]
    BudgetCeiling,
    /// Smallest encoding among all probed qualities. The budget only steers the direction of the
    /// next probe (above budget: search lower, otherwise search higher); it never gates which
    /// probe is kept. Ties keep the earlier probe.
    SmallestValid,
}

/// Safety limits on top of the logarithmic probe bound.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SearchBudget {
    pub max_probes: Option<u32>,
    pub time_limit_ms: Option<u64>,
}

impl SearchBudget {
    pub fn validate(&self) -> TuneResult<()> {
        if self.max_probes == Some(0) {
            return Err(TuneError::invalid_input(
                "search budget 'max_probes' must be >= 1 when set",
            ));
        }
        Ok(())
    }

    fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Probe {
    pub quality: u8,
    pub size: u64,
}

#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub quality: u8,
    pub size: u64,
    pub bytes: Vec<u8>,
    pub budget_bytes: u64,
    /// Probes in the order they ran.
    pub probes: Vec<Probe>,
    /// Set when [`SearchBudget`] stopped the search before the interval closed.
    pub truncated: bool,
}

impl SearchOutcome {
    pub fn within_budget(&self) -> bool {
        self.size <= self.budget_bytes
    }
}

struct Prober<'a> {
    raster: &'a Raster,
    codec: &'a dyn Codec,
    budget: SearchBudget,
    started: Instant,
    probes: Vec<Probe>,
    truncated: bool,
}

impl<'a> Prober<'a> {
    fn new(raster: &'a Raster, codec: &'a dyn Codec, budget: SearchBudget) -> Self {
        Self {
            raster,
            codec,
            budget,
            started: Instant::now(),
            probes: Vec::new(),
            truncated: false,
        }
    }

    fn exhausted(&self) -> bool {
        let by_count = self
            .budget
            .max_probes
            .is_some_and(|n| self.probes.len() >= n as usize);
        let by_time = self
            .budget
            .time_limit()
            .is_some_and(|limit| self.started.elapsed() >= limit);
        by_count || by_time
    }

    /// `None` once the search budget is spent.
    fn probe(&mut self, quality: u8) -> TuneResult<Option<Vec<u8>>> {
        if self.exhausted() {
            self.truncated = true;
            return Ok(None);
        }
        self.encode(quality).map(Some)
    }

    fn encode(&mut self, quality: u8) -> TuneResult<Vec<u8>> {
        let bytes = self.codec.encode(self.raster, quality).map_err(|e| match e {
            e @ TuneError::EncodeFailed { .. } => e,
            other => TuneError::encode_failed(quality, other.to_string()),
        })?;
        let size = bytes.len() as u64;
        tracing::debug!(quality, size, probe = self.probes.len() + 1, "probe");
        self.probes.push(Probe { quality, size });
        Ok(bytes)
    }
}

/// Finds the encoding quality for `raster` under `target`, see [`SearchMode`] for the policies.
#[tracing::instrument(
    level = "debug",
    skip(raster, codec),
    fields(width = raster.width(), height = raster.height())
)]
pub fn find_best_quality(
    raster: &Raster,
    codec: &dyn Codec,
    target: EncodingTarget,
    range: QualityRange,
    mode: SearchMode,
    budget: SearchBudget,
) -> TuneResult<SearchOutcome> {
    raster.ensure_non_empty("search raster")?;
    budget.validate()?;
    let budget_bytes = target.budget_bytes()?;

    let mut prober = Prober::new(raster, codec, budget);
    let (quality, bytes) = match mode {
        SearchMode::BudgetCeiling => budget_ceiling(&mut prober, range, budget_bytes)?,
        SearchMode::SmallestValid => smallest_valid(&mut prober, range, budget_bytes)?,
    };

    if prober.truncated {
        tracing::warn!(
            probes = prober.probes.len(),
            "search budget exhausted before the quality interval closed"
        );
    }

    let size = bytes.len() as u64;
    tracing::debug!(quality, size, budget_bytes, probes = prober.probes.len(), "search done");
    Ok(SearchOutcome {
        quality,
        size,
        bytes,
        budget_bytes,
        probes: prober.probes,
        truncated: prober.truncated,
    })
}

fn budget_ceiling(
    prober: &mut Prober<'_>,
    range: QualityRange,
    budget_bytes: u64,
) -> TuneResult<(u8, Vec<u8>)> {
    let mut low = i32::from(range.floor());
    let mut high = i32::from(range.ceiling());
    let mut best: Option<(u8, Vec<u8>)> = None;
    let mut at_floor: Option<Vec<u8>> = None;

    while low <= high {
        // Both bounds are within 0..=100 inside the loop.
        let mid = ((low + high) / 2) as u8;
        let Some(bytes) = prober.probe(mid)? else {
            break;
        };

        if bytes.len() as u64 > budget_bytes {
            high = i32::from(mid) - 1;
            if mid == range.floor() {
                at_floor = Some(bytes);
            }
        } else {
            low = i32::from(mid) + 1;
            best = Some((mid, bytes));
        }
    }

    if let Some(found) = best {
        return Ok(found);
    }

    tracing::debug!(
        floor = range.floor(),
        budget_bytes,
        "no quality fits the budget, falling back to the floor"
    );
    let bytes = match at_floor {
        Some(bytes) => bytes,
        None => prober.encode(range.floor())?,
    };
    Ok((range.floor(), bytes))
}

fn smallest_valid(
    prober: &mut Prober<'_>,
    range: QualityRange,
    budget_bytes: u64,
) -> TuneResult<(u8, Vec<u8>)> {
    let mut low = i32::from(range.floor());
    let mut high = i32::from(range.ceiling());
    let mut best_quality = range.ceiling();
    let mut best: Option<Vec<u8>> = None;

    while low <= high {
        let mid = ((low + high) / 2) as u8;
        let Some(bytes) = prober.probe(mid)? else {
            break;
        };
        let size = bytes.len() as u64;

        if best.as_ref().is_none_or(|b| size < b.len() as u64) {
            best_quality = mid;
            best = Some(bytes);
        }

        if size > budget_bytes {
            high = i32::from(mid) - 1;
        } else {
            low = i32::from(mid) + 1;
        }
    }

    let bytes = match best {
        Some(bytes) => bytes,
        None => prober.encode(best_quality)?,
    };
    Ok((best_quality, bytes))
}
