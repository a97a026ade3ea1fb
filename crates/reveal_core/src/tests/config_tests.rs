use super::*;

use std::{
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

#[test]
fn defaults_match_observed_presentation_values() {
    let settings = RevealSettings::default();
    assert_eq!(settings.max_taps, 5);
    assert_eq!(settings.max_units, 10);
    assert_eq!(settings.stack_prepare_delay(), Duration::from_millis(100));
    assert_eq!(settings.finish_settle_delay(), Duration::from_millis(800));
    assert!(settings.validate().is_ok());
}

#[test]
fn apply_parses_integers_and_floats() {
    let mut settings = RevealSettings::default();
    settings.apply("max_taps", "3").expect("max_taps");
    settings.apply("stack_scale", " 0.75 ").expect("stack_scale");

    assert_eq!(settings.max_taps, 3);
    assert_eq!(settings.stack_scale, 0.75);
}

#[test]
fn apply_rejects_unknown_keys_and_garbage() {
    let mut settings = RevealSettings::default();
    assert_eq!(
        settings.apply("tap_budget", "3"),
        Err(SettingsError::UnknownKey("tap_budget".into()))
    );
    assert_eq!(
        settings.apply("max_units", "lots"),
        Err(SettingsError::InvalidValue {
            key: "max_units".into(),
            value: "lots".into(),
        })
    );
}

#[test]
fn overrides_that_break_validation_are_rolled_back() {
    let mut settings = RevealSettings::default();
    settings.apply_overrides([("max_taps", "0"), ("deal_ms", "250"), ("max_units", "x")]);

    assert_eq!(settings.max_taps, 5);
    assert_eq!(settings.deal_ms, 250);
    assert_eq!(settings.max_units, 10);
}

#[test]
fn settings_file_overrides_defaults() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("pack_reveal_settings_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp dir");
    let path = temp_root.join(SETTINGS_FILE);
    fs::write(
        &path,
        "max_taps = 7\nfinish_settle_ms = 1200\nstack_scale = 0.9\nunknown = true\n",
    )
    .expect("write settings");

    let settings = load_settings_from(&path);
    assert_eq!(settings.max_taps, 7);
    assert_eq!(settings.finish_settle_ms, 1200);
    assert_eq!(settings.stack_scale, 0.9);

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn missing_settings_file_keeps_defaults() {
    let settings = load_settings_from(Path::new("/definitely/not/here/reveal.toml"));
    assert_eq!(settings.flash_ms, RevealSettings::default().flash_ms);
}
