//! Settings deserialization as an embedder would layer it from TOML.

use dupe_index::config::Settings;

#[test]
fn settings_from_full_toml() {
    let settings: Settings = toml::from_str(
        r#"
        find_hardlinked_dupes = false
        must_match_original = true
        keep_all_originals = true
        "#,
    )
    .unwrap();

    assert!(!settings.find_hardlinked_dupes);
    assert!(settings.must_match_original);
    assert!(settings.keep_all_originals);
}

#[test]
fn missing_keys_fall_back_to_defaults() {
    let settings: Settings = toml::from_str("must_match_original = true").unwrap();

    assert!(settings.find_hardlinked_dupes);
    assert!(settings.must_match_original);
    assert!(!settings.keep_all_originals);
}

#[test]
fn settings_round_trip() {
    let original = Settings::default().with_keep_all_originals(true);
    let encoded = toml::to_string(&original).unwrap();
    let decoded: Settings = toml::from_str(&encoded).unwrap();
    assert_eq!(original, decoded);
}
