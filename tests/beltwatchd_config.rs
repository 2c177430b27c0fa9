use std::sync::Mutex;

use tempfile::NamedTempFile;

use beltwatch::config::BeltwatchConfig;
use beltwatch::count::CountingPolicy;
use beltwatch::ingest::VideoOrigin;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "BELTWATCH_CONFIG",
        "BELTWATCH_SOURCE",
        "BELTWATCH_MODEL_PATH",
        "BELTWATCH_DB_PATH",
        "BELTWATCH_CONFIDENCE",
        "BELTWATCH_FRAME_SKIP",
        "BELTWATCH_COUNTING_POLICY",
        "BELTWATCH_LINE_FRACTION",
        "BELTWATCH_DAMAGED_THRESHOLD",
        "BELTWATCH_PAUSE_ON_ALARM",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = BeltwatchConfig::load().expect("load config");

    assert_eq!(cfg.source, VideoOrigin::Stub("line_camera".to_string()));
    assert_eq!(cfg.model_path, None);
    assert_eq!(cfg.db_path, "beltwatch.db");
    assert_eq!(cfg.confidence_threshold, 0.5);
    assert!(!cfg.agnostic_nms);
    assert_eq!(cfg.frame_skip, 1);
    assert_eq!(cfg.counting_policy, CountingPolicy::LineCrossing);
    assert_eq!(cfg.line_fraction, 0.35);
    assert_eq!(cfg.consecutive_damaged_threshold, 10);
    assert!(!cfg.pause_on_alarm);

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        source = "stub://belt_a"
        model_path = "/models/belt.onnx"
        db_path = "inspection_prod.db"

        [detection]
        confidence_threshold = 0.8
        agnostic_nms = true
        frame_skip = 3

        [counting]
        policy = "per-frame"
        line_fraction = 0.4

        [alarm]
        consecutive_damaged_threshold = 5
        pause_on_alarm = true
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("BELTWATCH_CONFIG", file.path());
    std::env::set_var("BELTWATCH_SOURCE", "2");
    std::env::set_var("BELTWATCH_DAMAGED_THRESHOLD", "7");

    let cfg = BeltwatchConfig::load().expect("load config");

    assert_eq!(cfg.source, VideoOrigin::Camera(2));
    assert_eq!(cfg.model_path.as_deref(), Some("/models/belt.onnx"));
    assert_eq!(cfg.db_path, "inspection_prod.db");
    assert_eq!(cfg.confidence_threshold, 0.8);
    assert!(cfg.agnostic_nms);
    assert_eq!(cfg.frame_skip, 3);
    assert_eq!(cfg.counting_policy, CountingPolicy::PerFrame);
    assert_eq!(cfg.line_fraction, 0.4);
    assert_eq!(cfg.consecutive_damaged_threshold, 7);
    assert!(cfg.pause_on_alarm);

    clear_env();
}

#[test]
fn pipeline_settings_mirror_the_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BELTWATCH_CONFIDENCE", "0.7");
    std::env::set_var("BELTWATCH_FRAME_SKIP", "4");
    std::env::set_var("BELTWATCH_COUNTING_POLICY", "per-frame");
    std::env::set_var("BELTWATCH_PAUSE_ON_ALARM", "true");

    let cfg = BeltwatchConfig::load().expect("load config");
    let settings = cfg.pipeline_settings();

    assert_eq!(settings.inference.confidence_threshold, 0.7);
    assert_eq!(settings.frame_skip, 4);
    assert_eq!(settings.counting_policy, CountingPolicy::PerFrame);
    assert!(settings.pause_on_alarm);

    clear_env();
}

#[test]
fn rejects_out_of_range_confidence() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BELTWATCH_CONFIDENCE", "0.0");
    assert!(BeltwatchConfig::load().is_err());

    std::env::set_var("BELTWATCH_CONFIDENCE", "1.5");
    assert!(BeltwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_zero_frame_skip() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BELTWATCH_FRAME_SKIP", "0");
    assert!(BeltwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_degenerate_line_fraction() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BELTWATCH_LINE_FRACTION", "1.0");
    assert!(BeltwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unknown_counting_policy() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BELTWATCH_COUNTING_POLICY", "sliding-window");
    assert!(BeltwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unparseable_source() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BELTWATCH_SOURCE", "rtsp://camera-1");
    assert!(BeltwatchConfig::load().is_err());

    clear_env();
}
