//! Server configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use whodunit_generation::RetryPolicy;
use whodunit_generation::http::HttpGenerationConfig;
use whodunit_session::application::engine::EngineConfig;
use whodunit_session::domain::script::InMemoryScriptCatalog;

use crate::error::AppError;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// `PostgreSQL` URL; sessions are kept in memory when absent.
    pub database_url: Option<String>,
    /// YAML file with the playable scripts.
    pub scripts_path: Option<PathBuf>,
    /// Engine limits.
    pub engine: EngineConfig,
    /// Generation timeout and retry bounds.
    pub retry: RetryPolicy,
    /// Generation endpoints; every generation degrades when absent.
    pub generation: Option<HttpGenerationConfig>,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            max_acts: parse_or(&var, "MAX_ACTS", defaults.max_acts)?,
            qna_limit_per_act: parse_or(
                &var,
                "MAX_QNA_PER_CHARACTER_PER_ACT",
                defaults.qna_limit_per_act,
            )?,
            lock_wait: millis_or(&var, "SESSION_LOCK_WAIT_MS", defaults.lock_wait)?,
        };
        if engine.max_acts == 0 {
            return Err(AppError::Config("MAX_ACTS must be at least 1".into()));
        }
        if engine.qna_limit_per_act == 0 {
            return Err(AppError::Config(
                "MAX_QNA_PER_CHARACTER_PER_ACT must be at least 1".into(),
            ));
        }

        let policy = RetryPolicy::default();
        let retry = RetryPolicy {
            timeout: millis_or(&var, "GENERATION_TIMEOUT_MS", policy.timeout)?,
            max_attempts: parse_or(&var, "GENERATION_MAX_ATTEMPTS", policy.max_attempts)?,
            initial_backoff: millis_or(&var, "GENERATION_BACKOFF_MS", policy.initial_backoff)?,
            max_backoff: millis_or(&var, "GENERATION_MAX_BACKOFF_MS", policy.max_backoff)?,
            jitter: policy.jitter,
        };

        let generation = match (
            var("GENERATION_MONOLOGUE_URL"),
            var("GENERATION_QNA_URL"),
        ) {
            (Some(monologue_url), Some(qna_url)) => Some(HttpGenerationConfig {
                monologue_url,
                qna_url,
                api_key: var("GENERATION_API_KEY").unwrap_or_default(),
                user: "whodunit-engine".to_owned(),
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::Config(
                    "GENERATION_MONOLOGUE_URL and GENERATION_QNA_URL must be set together".into(),
                ));
            }
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&var, "PORT", 3000)?,
            database_url: var("DATABASE_URL"),
            scripts_path: var("SCRIPTS_PATH").map(PathBuf::from),
            engine,
            retry,
            generation,
        })
    }

    /// Loads the script catalog from [`scripts_path`](Self::scripts_path),
    /// or returns an empty catalog when no path is configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or parsed.
    pub fn load_catalog(&self) -> Result<InMemoryScriptCatalog, AppError> {
        let Some(path) = &self.scripts_path else {
            return Ok(InMemoryScriptCatalog::default());
        };
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read scripts file {}: {e}", path.display()))
        })?;
        InMemoryScriptCatalog::from_yaml_str(&yaml).map_err(|e| {
            AppError::Config(format!("invalid scripts file {}: {e}", path.display()))
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
    })
}

fn millis_or<F>(var: &F, key: &str, default: Duration) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    var(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map(Duration::from_millis)
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.generation.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("MAX_ACTS", "2"),
            ("MAX_QNA_PER_CHARACTER_PER_ACT", "5"),
            ("SESSION_LOCK_WAIT_MS", "250"),
            ("GENERATION_TIMEOUT_MS", "1500"),
            ("GENERATION_MONOLOGUE_URL", "http://gen/monologue"),
            ("GENERATION_QNA_URL", "http://gen/qna"),
            ("GENERATION_API_KEY", "secret"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.engine.max_acts, 2);
        assert_eq!(config.engine.qna_limit_per_act, 5);
        assert_eq!(config.engine.lock_wait, Duration::from_millis(250));
        assert_eq!(config.retry.timeout, Duration::from_millis(1500));
        let generation = config.generation.unwrap();
        assert_eq!(generation.qna_url, "http://gen/qna");
        assert_eq!(generation.api_key, "secret");
    }

    #[test]
    fn test_invalid_number_is_a_config_error() {
        let result = config_from(&[("PORT", "not-a-port")]);

        match result.unwrap_err() {
            AppError::Config(message) => assert!(message.starts_with("PORT is invalid")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_quota_is_rejected() {
        let result = config_from(&[("MAX_QNA_PER_CHARACTER_PER_ACT", "0")]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_half_configured_generation_is_rejected() {
        let result = config_from(&[("GENERATION_QNA_URL", "http://gen/qna")]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_scripts_file_is_a_config_error() {
        let config = config_from(&[("SCRIPTS_PATH", "/nonexistent/scripts.yaml")]).unwrap();

        assert!(matches!(config.load_catalog(), Err(AppError::Config(_))));
    }
}
