// tests/config_load.rs
use coral_investigator::config::{
    InvestigationConfig, ENV_CONFIG_PATH, ENV_DATABASE_URL, ENV_GEO_RADIUS_KM,
    ENV_SIMILARITY_THRESHOLD,
};
use coral_investigator::geo::IndeterminatePolicy;
use coral_investigator::sources::SourceKind;
use std::{env, fs};

fn clear_env() {
    for k in [
        ENV_CONFIG_PATH,
        ENV_SIMILARITY_THRESHOLD,
        ENV_GEO_RADIUS_KM,
        ENV_DATABASE_URL,
    ] {
        env::remove_var(k);
    }
}

#[test]
fn shipped_sample_config_parses() {
    let raw = include_str!("../config/investigation.toml");
    let cfg = InvestigationConfig::from_toml_str(raw).expect("sample config");
    assert_eq!(cfg.aggregator.broadest_source, SourceKind::CrossIndex);
    assert_eq!(
        cfg.aggregator.national_sources,
        vec![SourceKind::CrossIndex, SourceKind::Chamber, SourceKind::Senate]
    );
    assert_eq!(cfg.similarity.indeterminate, IndeterminatePolicy::Exclude);
    assert_eq!(cfg.sources.chamber.theme_codes.get("zeladoria"), Some(&54));
    assert_eq!(cfg.themes.synonyms.get("alagamento").map(String::as_str), Some("zeladoria"));
    assert!(!cfg.sources.gazette.enabled);
}

#[test]
fn partial_config_keeps_defaults_and_sanitizes() {
    let cfg = InvestigationConfig::from_toml_str(
        r#"
[similarity]
threshold = 1.7
geo_radius_km = -3.0

[ranking]
top_k = 0
"#,
    )
    .unwrap();
    assert_eq!(cfg.similarity.threshold, 1.0);
    assert_eq!(cfg.similarity.geo_radius_km, 2.0);
    assert_eq!(cfg.similarity.max_results, 3);
    assert_eq!(cfg.ranking.top_k, 1);
    assert_eq!(cfg.ranking.min_score, 3);
    assert_eq!(cfg.aggregator.result_floor, 3);
}

#[test]
fn unknown_source_name_is_an_error() {
    let err = InvestigationConfig::from_toml_str(
        r#"
[aggregator]
national_sources = ["chamber", "supreme_court"]
"#,
    );
    assert!(err.is_err());
}

#[serial_test::serial]
#[test]
fn load_uses_env_path_then_default_then_builtin() {
    clear_env();
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) nothing on disk -> defaults
    let cfg = InvestigationConfig::load().unwrap();
    assert_eq!(cfg.similarity.threshold, 0.75);

    // 2) ./config/investigation.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/investigation.toml"),
        "[similarity]\nthreshold = 0.8\n",
    )
    .unwrap();
    let cfg = InvestigationConfig::load().unwrap();
    assert_eq!(cfg.similarity.threshold, 0.8);

    // 3) explicit path wins
    let explicit = tmp.path().join("other.toml");
    fs::write(&explicit, "[similarity]\nthreshold = 0.9\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, explicit.display().to_string());
    let cfg = InvestigationConfig::load().unwrap();
    assert_eq!(cfg.similarity.threshold, 0.9);

    // 4) a missing explicit path is an error, not a silent default
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(InvestigationConfig::load().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_after_file() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("inv.toml");
    fs::write(&path, "[similarity]\nthreshold = 0.6\ngeo_radius_km = 5.0\n").unwrap();

    env::set_var(ENV_SIMILARITY_THRESHOLD, "0.82");
    env::set_var(ENV_GEO_RADIUS_KM, "not-a-number");
    env::set_var(ENV_DATABASE_URL, "postgres://localhost/civic");
    let cfg = InvestigationConfig::load_from(&path).unwrap();
    assert!((cfg.similarity.threshold - 0.82).abs() < 1e-6);
    // invalid override is ignored
    assert_eq!(cfg.similarity.geo_radius_km, 5.0);
    assert_eq!(cfg.database.url.as_deref(), Some("postgres://localhost/civic"));

    // out-of-range threshold is clamped
    env::set_var(ENV_SIMILARITY_THRESHOLD, "7");
    let cfg = InvestigationConfig::load_from(&path).unwrap();
    assert_eq!(cfg.similarity.threshold, 1.0);

    clear_env();
}
