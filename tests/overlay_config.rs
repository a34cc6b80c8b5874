use std::sync::Mutex;

use tempfile::NamedTempFile;

use pose_overlay::config::OverlayConfig;
use pose_overlay::KeypointSpace;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "OVERLAY_CONFIG",
        "OVERLAY_VIDEO",
        "OVERLAY_DETECTIONS",
        "OVERLAY_POSE",
        "OVERLAY_OUTPUT_CSV",
        "OVERLAY_OUTPUT_VIDEO",
        "OVERLAY_SPEED_FACTOR",
        "OVERLAY_SYNC_OFFSET",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        [input]
        video = "shift_3.mov"
        detections = "shift_3.json"
        detection_keypoints = "pixels"

        [output]
        csv = "shift_3.csv"
        video = "frames/"

        [sync]
        speed_factor = 0.5
        offset = 2

        [classifier]
        fall_aspect_ratio = 1.8

        [classifier.idle]
        enabled = true
        max_displacement_px = 3.5

        [render.known_trains]
        "12" = "No.12-K"

        [history]
        capacity = 64

        [progress]
        every = 10
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("OVERLAY_CONFIG", file.path());
    std::env::set_var("OVERLAY_DETECTIONS", "override.json");
    std::env::set_var("OVERLAY_SYNC_OFFSET", "-3");

    let cfg = OverlayConfig::load(None).expect("load config");

    assert_eq!(cfg.video, "shift_3.mov");
    assert_eq!(cfg.detections_path.to_str(), Some("override.json"));
    assert_eq!(cfg.detection_keypoint_space, KeypointSpace::Pixels);
    assert_eq!(cfg.output_csv.to_str(), Some("shift_3.csv"));
    assert_eq!(cfg.output_video.as_deref(), Some("frames/"));
    assert_eq!(cfg.sync.speed_factor, 0.5);
    assert_eq!(cfg.sync.offset, -3);
    assert_eq!(cfg.classifier.fall_aspect_ratio, 1.8);
    assert!(cfg.classifier.idle.enabled);
    assert_eq!(cfg.classifier.idle.max_displacement_px, 3.5);
    assert_eq!(cfg.known_trains.name(12), "No.12-K");
    assert_eq!(cfg.history_capacity, 64);
    assert_eq!(cfg.progress_every, 10);

    clear_env();
}

#[test]
fn explicit_path_wins_over_env_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"[sync]\nspeed_factor = 2.0\n").expect("write config");
    std::env::set_var("OVERLAY_CONFIG", "/nonexistent/overlay.toml");

    let cfg = OverlayConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.sync.speed_factor, 2.0);

    clear_env();
}

#[test]
fn defaults_apply_without_a_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = OverlayConfig::load(None).expect("load defaults");
    assert_eq!(cfg.video, "input_video.mov");
    assert_eq!(cfg.detections_path.to_str(), Some("final_report.json"));
    assert_eq!(cfg.sync.speed_factor, 0.33333);
    assert_eq!(cfg.sync.offset, 0);
    assert_eq!(cfg.known_trains.name(95), "No.77-B");

    clear_env();
}

#[test]
fn rejects_invalid_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("OVERLAY_SPEED_FACTOR", "fast");
    assert!(OverlayConfig::load(None).is_err());

    std::env::set_var("OVERLAY_SPEED_FACTOR", "0");
    let err = OverlayConfig::load(None).expect_err("zero speed factor");
    assert!(err.to_string().contains("speed_factor"), "{err}");

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("OVERLAY_CONFIG", "/nonexistent/overlay.toml");
    assert!(OverlayConfig::load(None).is_err());

    clear_env();
}

#[test]
fn check_inputs_requires_video_and_stream_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stream = dir.path().join("final_report.json");
    std::fs::write(&stream, b"[]").expect("write stream");
    let video = dir.path().join("shift_3.mov");

    let mut cfg = OverlayConfig::from_toml_str("").expect("defaults");
    cfg.video = video.display().to_string();
    let err = cfg.check_inputs(&stream).expect_err("missing video");
    assert!(err.to_string().contains("video file not found"), "{err}");

    std::fs::write(&video, b"").expect("write video");
    cfg.check_inputs(&stream).expect("both inputs present");

    let missing = dir.path().join("pose.json");
    let err = cfg.check_inputs(&missing).expect_err("missing stream");
    assert!(err.to_string().contains("pose.json"), "{err}");
    assert!(!dir.path().join("activity_report.csv").exists());
}

#[test]
fn check_inputs_skips_stub_videos() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stream = dir.path().join("pose.json");
    std::fs::write(&stream, b"[]").expect("write stream");

    let mut cfg = OverlayConfig::from_toml_str("").expect("defaults");
    cfg.video = "stub://64x48@25/10".to_string();
    cfg.check_inputs(&stream).expect("stub video needs no file");
    assert!(cfg.check_inputs(&dir.path().join("absent.json")).is_err());
}
