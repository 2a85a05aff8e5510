//! Loader for the system configuration with TOML + environment overlays.
//!
//! One `consta.toml` drives every binary. All sections are optional: an
//! absent section takes that crate's own defaults, so an empty file (or no
//! file at all) still yields a working configuration. `CONSTA__`-prefixed
//! environment variables override the file, and `${VAR}` placeholders inside
//! string values are expanded after the sources merge, so secrets can stay
//! out of checked-in files.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use consta_browser::BrowserConfig;
use consta_engine::{PortalConfig, RetryPolicy};
use consta_leads::LeadStoreConfig;
use consta_solver::SolverConfig;
use serde::Deserialize;
use serde_json::Value;

pub use config::ConfigError;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Root of `consta.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConstaConfig {
    pub solver: SolverConfig,
    pub browser: BrowserConfig,
    pub portal: PortalConfig,
    pub retry: RetryPolicy,
    pub leads: LeadStoreConfig,
    pub logging: LoggingSettings,
}

/// Logging section. The binaries map this onto the shared tracing setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory for daily log files. `None` falls back to `CONSTA_LOG_DIR`
    /// and then the per-user data directory.
    pub dir: Option<PathBuf>,
    pub format: LogFormatSetting,
    /// Echo events to stderr besides the file sink.
    pub stderr: bool,
    /// Filter applied when `RUST_LOG` is unset.
    pub filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    Text,
    Json,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormatSetting::Text,
            stderr: false,
            filter: "info".to_string(),
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                // Expanded values may reference further variables; cap the
                // depth so cycles terminate. Unknown variables stay as-is.
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (TOML file + env overrides).
pub struct ConstaConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ConstaConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstaConfigLoader {
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a file that must exist.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, e.g. the default `consta.toml`.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline TOML snippet, mainly for tests.
    ///
    /// ```
    /// use consta_config::ConstaConfigLoader;
    ///
    /// let config = ConstaConfigLoader::new()
    ///     .with_toml_str(
    ///         r#"
    /// [solver]
    /// api_key = "k-123"
    /// poll_interval_secs = 2
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.solver.api_key, "k-123");
    /// assert_eq!(config.solver.poll_interval_secs, 2);
    /// assert_eq!(config.solver.poll_ceiling_secs, 120);
    /// ```
    pub fn with_toml_str(mut self, toml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(toml, config::FileFormat::Toml));
        self
    }

    /// Merge all sources and deserialize into [`ConstaConfig`].
    ///
    /// `${VAR}` placeholders in string values are expanded after merging:
    ///
    /// ```
    /// use consta_config::ConstaConfigLoader;
    ///
    /// std::env::set_var("DOCTEST_SOLVER_KEY", "from-env");
    ///
    /// let config = ConstaConfigLoader::new()
    ///     .with_toml_str(
    ///         r#"
    /// [solver]
    /// api_key = "${DOCTEST_SOLVER_KEY}"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.solver.api_key, "from-env");
    ///
    /// std::env::remove_var("DOCTEST_SOLVER_KEY");
    /// ```
    pub fn load(self) -> Result<ConstaConfig, ConfigError> {
        // Env goes in last so CONSTA__SECTION__FIELD always beats the file.
        let merged = self
            .builder
            .add_source(
                Environment::with_prefix("CONSTA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut value: Value = merged.try_deserialize()?;
        expand_env_in_value(&mut value);

        serde_json::from_value(value).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_a_plain_string() {
        temp_env::with_var("UF", Some("RJ"), || {
            let mut v = json!("detran-${UF}-portal");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("detran-RJ-portal"));
        });
    }

    #[test]
    fn expands_inside_arrays_and_objects() {
        temp_env::with_vars([("HOST", Some("localhost")), ("PORT", Some("9515"))], || {
            let mut v = json!([
                "http://$HOST",
                { "webdriver": "http://${HOST}:${PORT}" },
                9515,
                false,
                null
            ]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!([
                    "http://localhost",
                    { "webdriver": "http://localhost:9515" },
                    9515,
                    false,
                    null
                ])
            );
        });
    }

    #[test]
    fn expands_across_chained_variables() {
        temp_env::with_vars(
            [
                ("LEAF", Some("key-tail")),
                ("MIDDLE", Some("mid-${LEAF}")),
                ("ROOT", Some("head-${MIDDLE}")),
            ],
            || {
                let mut v = json!("${ROOT}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("head-mid-key-tail"));
            },
        );
    }

    #[test]
    fn terminates_on_cyclic_variables() {
        temp_env::with_vars([("PING", Some("${PONG}")), ("PONG", Some("${PING}"))], || {
            let mut v = json!("x=${PING}");
            expand_env_in_value(&mut v);
            // The depth cap stops the cycle; the leftover placeholder stays.
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x="));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_variables_are_left_untouched() {
        let mut v = json!("value-${CONSTA_TEST_DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("value-${CONSTA_TEST_DOES_NOT_EXIST}"));
    }
}
