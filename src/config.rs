use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::leaderboard::{DASHBOARD_TOP_N, LECTURE_TOP_N};

const DEFAULT_END_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub top_n: usize,
    pub dashboard_top_n: usize,
    pub end_delay: Duration,
    pub video_dir: PathBuf,
    pub sysfs_dir: PathBuf,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let parse_usize = |key: &str, default: usize| -> anyhow::Result<usize> {
            match get(key) {
                Some(value) => value
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be a non-negative integer, got {value:?}")),
                None => Ok(default),
            }
        };

        let end_delay_ms = match get("CLASSCORER_END_DELAY_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("CLASSCORER_END_DELAY_MS must be milliseconds, got {value:?}"))?,
            None => DEFAULT_END_DELAY_MS,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            top_n: parse_usize("CLASSCORER_TOP_N", LECTURE_TOP_N)?,
            dashboard_top_n: parse_usize("CLASSCORER_DASHBOARD_TOP_N", DASHBOARD_TOP_N)?,
            end_delay: Duration::from_millis(end_delay_ms),
            video_dir: get("CLASSCORER_VIDEO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/dev")),
            sysfs_dir: get("CLASSCORER_SYSFS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/sys/class/video4linux")),
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.dashboard_top_n, 10);
        assert_eq!(config.end_delay, Duration::from_millis(1000));
        assert_eq!(config.video_dir, PathBuf::from("/dev"));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/classcorer"),
            ("CLASSCORER_TOP_N", "3"),
            ("CLASSCORER_END_DELAY_MS", "0"),
            ("LOG_FORMAT", "JSON"),
            ("CLASSCORER_VIDEO_DIR", "/tmp/dev"),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/classcorer"));
        assert_eq!(config.top_n, 3);
        assert_eq!(config.end_delay, Duration::ZERO);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.video_dir, PathBuf::from("/tmp/dev"));
    }

    #[test]
    fn blank_database_url_is_ignored() {
        let config = config_from(&[("DATABASE_URL", "  ")]).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config_from(&[("CLASSCORER_TOP_N", "-1")]).unwrap_err();
        assert!(err.to_string().contains("CLASSCORER_TOP_N"));
        assert!(config_from(&[("CLASSCORER_END_DELAY_MS", "soon")]).is_err());
    }
}
