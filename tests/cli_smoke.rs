use std::path::{Path, PathBuf};

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_webptune")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "webptune.exe"
            } else {
                "webptune"
            });
            p
        })
}

fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 8) as u8])
    })
    .save(path)
    .unwrap();
}

fn arg(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

#[test]
fn cli_convert_writes_webp_and_crop() {
    let dir = PathBuf::from("target").join("cli_smoke").join("convert");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join("in.png");
    write_png(&input, 64, 48);
    let out = dir.join("out");

    let status = std::process::Command::new(exe())
        .args(["convert", "--in", arg(&input).as_str(), "--out", arg(&out).as_str()])
        .status()
        .unwrap();

    assert!(status.success());
    assert!(out.join("in.webp").exists());
    assert!(out.join("in_crop.webp").exists());
}

#[test]
fn cli_merge_with_settings_file() {
    let dir = PathBuf::from("target").join("cli_smoke").join("merge");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let left = dir.join("l.png");
    let right = dir.join("r.png");
    write_png(&left, 64, 36);
    write_png(&right, 64, 36);
    let settings = dir.join("settings.json");
    std::fs::write(&settings, r#"{ "merge": { "final_width": 48, "target_kb": 4 } }"#).unwrap();
    let out = dir.join("merged.webp");

    let status = std::process::Command::new(exe())
        .args([
            "--config",
            arg(&settings).as_str(),
            "merge",
            "--left",
            arg(&left).as_str(),
            "--right",
            arg(&right).as_str(),
            "--out",
            arg(&out).as_str(),
        ])
        .status()
        .unwrap();

    assert!(status.success());
    let bytes = std::fs::read(&out).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (48, 27));
}

#[test]
fn cli_directory_with_a_broken_file_exits_non_zero() {
    let dir = PathBuf::from("target").join("cli_smoke").join("batch");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    write_png(&dir.join("good.png"), 32, 32);
    std::fs::write(dir.join("bad.png"), b"garbage").unwrap();

    let status = std::process::Command::new(exe())
        .args(["convert", "--in", arg(&dir).as_str(), "--no-variant", "--parallel"])
        .status()
        .unwrap();

    assert!(!status.success());
    assert!(dir.join("webp").join("good.webp").exists());
}

#[test]
fn cli_missing_input_fails() {
    let status = std::process::Command::new(exe())
        .args(["zoom", "--in", "target/cli_smoke/missing.png", "--out", "target/cli_smoke/x.webp"])
        .status()
        .unwrap();
    assert!(!status.success());
}

fn zoom_dims(dir: &Path, config: Option<&str>, extra: &[&str], width: u32, height: u32) -> (u32, u32) {
    let _ = std::fs::remove_dir_all(dir);
    std::fs::create_dir_all(dir).unwrap();
    let input = dir.join("in.png");
    write_png(&input, width, height);
    let out = dir.join("out.webp");

    let mut cmd = std::process::Command::new(exe());
    if let Some(json) = config {
        let settings = dir.join("settings.json");
        std::fs::write(&settings, json).unwrap();
        cmd.args(["--config", arg(&settings).as_str()]);
    }
    let status = cmd
        .args(["zoom", "--in", arg(&input).as_str(), "--out", arg(&out).as_str()])
        .args(extra)
        .status()
        .unwrap();
    assert!(status.success());

    let img = image::load_from_memory(&std::fs::read(&out).unwrap()).unwrap();
    (img.width(), img.height())
}

#[test]
fn cli_zoom_defaults_to_a_centered_960x540_window() {
    let dir = PathBuf::from("target").join("cli_smoke").join("zoom_default");
    assert_eq!(zoom_dims(&dir, None, &[], 640, 360), (960, 540));
}

#[test]
fn cli_zoom_uses_crop_ratio_from_settings() {
    let dir = PathBuf::from("target").join("cli_smoke").join("zoom_settings");
    let json = r#"{ "zoom": { "crop_ratio": 4 } }"#;
    assert_eq!(zoom_dims(&dir, Some(json), &[], 1000, 1000), (500, 500));
}

#[test]
fn cli_zoom_flags_override_settings() {
    let dir = PathBuf::from("target").join("cli_smoke").join("zoom_flags");
    let json = r#"{ "zoom": { "crop_ratio": 4 } }"#;
    let flags = ["--scale", "1", "--width", "200", "--height", "100"];
    assert_eq!(zoom_dims(&dir, Some(json), &flags, 320, 180), (200, 100));
}
