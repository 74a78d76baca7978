use webptune::{
    Codec, EncodingTarget, MAX_QUALITY, PixelFormat, QualityRange, Raster, SearchBudget,
    SearchMode, TuneResult, WebpCodec, find_best_quality,
};

/// Sizes grow strictly with quality; content is irrelevant.
struct SizeCurve;

impl SizeCurve {
    fn size(quality: u8) -> usize {
        let q = usize::from(quality);
        1_000 + q * q * 10
    }
}

impl Codec for SizeCurve {
    fn encode(&self, _raster: &Raster, quality: u8) -> TuneResult<Vec<u8>> {
        Ok(vec![0u8; Self::size(quality)])
    }

    fn extension(&self) -> &'static str {
        "bin"
    }
}

fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Gradient with per-pixel grain, so higher qualities cost visibly more bytes.
fn grainy_rgb(width: u32, height: u32, seed: u64) -> Raster {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let grain = (mix64(seed ^ (u64::from(y) << 32 | u64::from(x))) & 0x3f) as u8;
            data.push(((x * 255) / width.max(1)) as u8);
            data.push(((y * 255) / height.max(1)) as u8);
            data.push(0x40 + grain);
        }
    }
    Raster::new(width, height, PixelFormat::Rgb8, data).unwrap()
}

fn tiny() -> Raster {
    Raster::filled_rgba(2, 2, [1, 2, 3, 255]).unwrap()
}

#[test]
fn budget_ceiling_picks_largest_fitting_quality_or_the_floor() {
    let raster = tiny();
    for floor in [1u8, 20, 50, 80, 99, 100] {
        for target in [0u64, 1_000, 5_000, 26_000, 50_000, 101_000, 200_000] {
            let range = QualityRange::from_floor(floor).unwrap();
            let out = find_best_quality(
                &raster,
                &SizeCurve,
                EncodingTarget::AbsoluteBytes(target),
                range,
                SearchMode::BudgetCeiling,
                SearchBudget::default(),
            )
            .unwrap();

            assert!(range.contains(out.quality), "floor {floor} target {target}");
            assert_eq!(out.size, out.bytes.len() as u64);
            assert!(out.probes.len() as u32 <= range.max_probes());

            let expected = (floor..=MAX_QUALITY)
                .rev()
                .find(|&q| SizeCurve::size(q) as u64 <= target);
            match expected {
                Some(q) => {
                    assert_eq!(out.quality, q, "floor {floor} target {target}");
                    assert!(out.within_budget());
                }
                None => {
                    assert_eq!(out.quality, floor, "floor {floor} target {target}");
                    assert!(!out.within_budget());
                }
            }
        }
    }
}

#[test]
fn budget_ceiling_quality_never_drops_as_target_grows() {
    let raster = tiny();
    let range = QualityRange::from_floor(30).unwrap();
    let mut last = 0u8;
    for target in (0..=110_000u64).step_by(2_500) {
        let out = find_best_quality(
            &raster,
            &SizeCurve,
            EncodingTarget::AbsoluteBytes(target),
            range,
            SearchMode::BudgetCeiling,
            SearchBudget::default(),
        )
        .unwrap();
        assert!(out.quality >= last, "target {target}: {} < {last}", out.quality);
        last = out.quality;
    }
    assert_eq!(last, MAX_QUALITY);
}

#[test]
fn smallest_valid_returns_the_smallest_probe() {
    let raster = tiny();
    for floor in [1u8, 40, 80, 100] {
        for fraction in [0.01, 0.25, 0.5, 1.0, 4.0] {
            let range = QualityRange::from_floor(floor).unwrap();
            let out = find_best_quality(
                &raster,
                &SizeCurve,
                EncodingTarget::FractionOfOriginal {
                    original_bytes: 100_000,
                    fraction,
                },
                range,
                SearchMode::SmallestValid,
                SearchBudget::default(),
            )
            .unwrap();

            assert!(range.contains(out.quality));
            assert!(out.probes.len() as u32 <= range.max_probes());
            let smallest = out.probes.iter().map(|p| p.size).min().unwrap();
            assert_eq!(out.size, smallest, "floor {floor} fraction {fraction}");
            assert!(
                out.probes.iter().any(|p| p.quality == out.quality && p.size == out.size),
                "result must be one of the probes"
            );
        }
    }
}

#[test]
fn probe_budget_is_respected() {
    let raster = tiny();
    let out = find_best_quality(
        &raster,
        &SizeCurve,
        EncodingTarget::AbsoluteBytes(50_000),
        QualityRange::new(1, 100).unwrap(),
        SearchMode::BudgetCeiling,
        SearchBudget {
            max_probes: Some(3),
            time_limit_ms: None,
        },
    )
    .unwrap();
    assert!(out.truncated);
    assert_eq!(out.probes.len(), 3);
    assert!(out.within_budget());
}

#[test]
fn webp_smallest_valid_beats_maximum_quality() {
    let raster = grainy_rgb(2000, 1000, 7);
    let codec = WebpCodec::default();
    let out = find_best_quality(
        &raster,
        &codec,
        EncodingTarget::FractionOfOriginal {
            original_bytes: raster.byte_len(),
            fraction: 0.5,
        },
        QualityRange::from_floor(80).unwrap(),
        SearchMode::SmallestValid,
        SearchBudget::default(),
    )
    .unwrap();

    assert!((80..=100).contains(&out.quality));
    let at_max = codec.encode(&raster, MAX_QUALITY).unwrap();
    assert!(
        out.size < at_max.len() as u64,
        "{} >= {}",
        out.size,
        at_max.len()
    );

    let decoded = Raster::decode(&out.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (2000, 1000));
}

#[test]
fn webp_budget_ceiling_fits_a_reachable_target() {
    let raster = grainy_rgb(320, 180, 11);
    let codec = WebpCodec::default();
    let at_floor = codec.encode(&raster, 50).unwrap().len() as u64;
    let at_max = codec.encode(&raster, 95).unwrap().len() as u64;
    let target = (at_floor + at_max) / 2;

    let out = find_best_quality(
        &raster,
        &codec,
        EncodingTarget::AbsoluteBytes(target),
        QualityRange::new(50, 95).unwrap(),
        SearchMode::BudgetCeiling,
        SearchBudget::default(),
    )
    .unwrap();

    assert!(out.quality >= 50 && out.quality <= 95);
    assert!(out.size <= target);
    assert_eq!(out.bytes, codec.encode(&raster, out.quality).unwrap());
}
