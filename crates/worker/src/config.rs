use std::time::Duration;

use tryon_pipeline::RemoteConfig;

use crate::queue::QueueConfig;

/// A configuration variable was missing or could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Dispatcher capacity (default: `10`).
    pub max_concurrent_jobs: usize,
    /// Fallback store poll interval (default: `1000` ms).
    pub dispatch_poll_interval: Duration,
    /// Hard ceiling for one pipeline step (default: `300` s).
    pub step_timeout: Duration,
    /// Generation gateway base URL (default: `http://localhost:8000`).
    pub generation_api_url: String,
    pub generation_api_token: Option<String>,
    /// Remote prediction poll interval (default: `5` s).
    pub prediction_poll_interval: Duration,
    /// Remote prediction poll ceiling (default: `60`).
    pub prediction_max_attempts: u32,
    /// Drain window for in-flight jobs on shutdown (default: `30` s).
    pub shutdown_timeout: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `DATABASE_URL`                  | required                |
    /// | `MAX_CONCURRENT_JOBS`           | `10`                    |
    /// | `DISPATCH_POLL_INTERVAL_MS`     | `1000`                  |
    /// | `STEP_TIMEOUT_SECS`             | `300`                   |
    /// | `GENERATION_API_URL`            | `http://localhost:8000` |
    /// | `GENERATION_API_TOKEN`          | unset                   |
    /// | `PREDICTION_POLL_INTERVAL_SECS` | `5`                     |
    /// | `PREDICTION_MAX_ATTEMPTS`       | `60`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`         | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_concurrent_jobs: usize = parse(&var, "MAX_CONCURRENT_JOBS", 10)?;
        if max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_CONCURRENT_JOBS",
                value: "0".into(),
                reason: "must be at least 1",
            });
        }

        let dispatch_poll_interval_ms: u64 = parse(&var, "DISPATCH_POLL_INTERVAL_MS", 1000)?;
        if dispatch_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "DISPATCH_POLL_INTERVAL_MS",
                value: "0".into(),
                reason: "must be at least 1",
            });
        }

        Ok(Self {
            database_url,
            max_concurrent_jobs,
            dispatch_poll_interval: Duration::from_millis(dispatch_poll_interval_ms),
            step_timeout: Duration::from_secs(parse(&var, "STEP_TIMEOUT_SECS", 300)?),
            generation_api_url: var("GENERATION_API_URL")
                .unwrap_or_else(|| "http://localhost:8000".into()),
            generation_api_token: var("GENERATION_API_TOKEN"),
            prediction_poll_interval: Duration::from_secs(parse(
                &var,
                "PREDICTION_POLL_INTERVAL_SECS",
                5,
            )?),
            prediction_max_attempts: parse(&var, "PREDICTION_MAX_ATTEMPTS", 60)?,
            shutdown_timeout: Duration::from_secs(parse(&var, "SHUTDOWN_TIMEOUT_SECS", 30)?),
        })
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_concurrent: self.max_concurrent_jobs,
            poll_interval: self.dispatch_poll_interval,
            step_timeout: self.step_timeout,
        }
    }

    pub fn remote_config(&self) -> RemoteConfig {
        let mut remote = RemoteConfig::new(self.generation_api_url.clone());
        remote.api_token = self.generation_api_token.clone();
        remote.poll_interval = self.prediction_poll_interval;
        remote.max_poll_attempts = self.prediction_max_attempts;
        remote
    }
}

fn parse<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value,
            reason: "not a valid unsigned integer",
        }),
    }
}
