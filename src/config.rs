//! Runtime configuration loaded from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `RV_API` | `http://127.0.0.1:8000/api/v1` |
//! | `RV_DATA_DIR` | platform data dir |
//! | `RV_DATABASE` | `<data dir>/remote-viewer.db` |
//! | `RV_TARGETS_DIR` | `<data dir>/targets` |
//! | `OPENAI_API_KEY` | unset |
//! | `OPENAI_BASE_URL` | `https://api.openai.com/v1` |
//! | `RV_EMBEDDING_MODEL` | `text-embedding-3-small` |
//! | `RV_VISION_MODEL` | `gpt-4o-mini` |
//! | `RV_POLL_INTERVAL_MS` | `1000` |
//! | `RV_SCORE_DEADLINE_SECS` | unset (wait forever) |
//! | `RV_ACQUIRE_ATTEMPTS` | `3` |
//! | `RV_COUNTDOWN` | `true` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the session API used by the console client.
    pub api_url: String,
    pub database_path: PathBuf,
    pub targets_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub vision_model: String,
    /// How often the orchestrator polls for a score.
    pub poll_interval: Duration,
    /// Optional upper bound on the score wait. `None` waits forever.
    pub score_deadline: Option<Duration>,
    pub acquire_attempts: u32,
    /// Run per-stage countdown timers in the console.
    pub countdown: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("RV_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let database_path = lookup("RV_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("remote-viewer.db"));
        let targets_dir = lookup("RV_TARGETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("targets"));

        let poll_ms: u64 = parse_var(&lookup, "RV_POLL_INTERVAL_MS")?.unwrap_or(1000);
        let deadline_secs: Option<u64> = parse_var(&lookup, "RV_SCORE_DEADLINE_SECS")?;

        Ok(Self {
            api_url: lookup("RV_API").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            database_path,
            targets_dir,
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            openai_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            embedding_model: lookup("RV_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            vision_model: lookup("RV_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            poll_interval: Duration::from_millis(poll_ms),
            score_deadline: deadline_secs.map(Duration::from_secs),
            acquire_attempts: parse_var(&lookup, "RV_ACQUIRE_ATTEMPTS")?.unwrap_or(3),
            countdown: parse_var(&lookup, "RV_COUNTDOWN")?.unwrap_or(true),
        })
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "remote-viewer")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}
