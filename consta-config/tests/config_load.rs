//! Loading behavior across the file, the environment, and the defaults.

use consta_config::{ConstaConfigLoader, LogFormatSetting};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

fn write_toml(tmp: &TempDir, name: &str, toml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, toml).expect("write toml");
    p
}

#[test]
#[serial]
fn defaults_cover_every_section() {
    let config = ConstaConfigLoader::new().load().expect("defaults load");

    assert!(config.portal.form_url.contains("detran.rj.gov.br"));
    assert_eq!(config.solver.poll_ceiling_secs, 120);
    assert!(config.browser.headless);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.logging.filter, "info");
    assert!(config.leads.path.is_some());
}

#[test]
#[serial]
fn file_overrides_and_env_placeholders_expand() {
    let tmp = TempDir::new().unwrap();
    let file = write_toml(
        &tmp,
        "consta.toml",
        r#"
[solver]
api_key = "${CONSTA_TEST_KEY}"
poll_interval_secs = 3

[browser]
headless = false

[logging]
format = "json"
stderr = true
"#,
    );

    temp_env::with_var("CONSTA_TEST_KEY", Some("secret-123"), || {
        let config = ConstaConfigLoader::new()
            .with_file(&file)
            .load()
            .expect("load file config");

        assert_eq!(config.solver.api_key, "secret-123");
        assert_eq!(config.solver.poll_interval_secs, 3);
        assert!(!config.browser.headless);
        assert_eq!(config.logging.format, LogFormatSetting::Json);
        assert!(config.logging.stderr);
        // Untouched sections keep their defaults.
        assert_eq!(config.solver.poll_ceiling_secs, 120);
    });
}

#[test]
#[serial]
fn environment_beats_the_file() {
    let tmp = TempDir::new().unwrap();
    let file = write_toml(
        &tmp,
        "consta.toml",
        r#"
[solver]
base_url = "https://file.example"
"#,
    );

    temp_env::with_var(
        "CONSTA__SOLVER__BASE_URL",
        Some("https://env.example"),
        || {
            let config = ConstaConfigLoader::new()
                .with_file(&file)
                .load()
                .expect("load");
            assert_eq!(config.solver.base_url, "https://env.example");
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_is_tolerated() {
    let tmp = TempDir::new().unwrap();
    let config = ConstaConfigLoader::new()
        .with_optional_file(tmp.path().join("nope.toml"))
        .load()
        .expect("absent optional file");
    assert_eq!(config.retry.base_backoff_ms, 2000);
}

#[test]
#[serial]
fn required_file_must_exist() {
    let tmp = TempDir::new().unwrap();
    let result = ConstaConfigLoader::new()
        .with_file(tmp.path().join("nope.toml"))
        .load();
    assert!(result.is_err());
}

#[test]
#[serial]
fn phrase_lists_replace_rather_than_merge() {
    let tmp = TempDir::new().unwrap();
    let file = write_toml(
        &tmp,
        "consta.toml",
        r#"
[portal.phrases]
rejection = ["ACESSO NEGADO"]
"#,
    );

    let config = ConstaConfigLoader::new()
        .with_file(&file)
        .load()
        .expect("load");
    assert_eq!(config.portal.phrases.rejection, vec!["ACESSO NEGADO"]);
    // Sibling fields in the same section keep their defaults.
    assert!(!config.portal.phrases.presence.is_empty());
}
