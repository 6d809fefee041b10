use std::path::PathBuf;
use std::time::Duration;

use crate::epa::EpaConfig;
use crate::pairwise_api::PAIRWISE_DEFAULT_URL;
use crate::tba::TBA_DEFAULT_BASE;

const CACHE_DIR: &str = "pickscout";
const DB_FILE: &str = "scout.sqlite";
const DEFAULT_CATEGORIES: &[&str] = &["Match Efficiency", "Intake Efficiency"];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tba_base_url: String,
    pub tba_auth_key: String,
    pub pairwise_url: String,
    pub db_path: Option<PathBuf>,
    pub categories: Vec<String>,
    pub analysis_ttl: Duration,
    pub schedule_ttl: Duration,
    pub event_ttl: Duration,
    pub epa: EpaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Blank values count as unset and
    /// unparseable numbers fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |key: &str, default: u64| {
            Duration::from_secs(
                get(key)
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(default)
                    .max(1),
            )
        };
        let rate = |key: &str, default: f64| {
            get(key)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(default)
        };

        let categories = get("PICKSCOUT_CATEGORIES")
            .map(|raw| {
                raw.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect());

        let defaults = EpaConfig::default();
        Self {
            tba_base_url: get("TBA_BASE_URL").unwrap_or_else(|| TBA_DEFAULT_BASE.to_string()),
            tba_auth_key: get("TBA_AUTH_KEY").unwrap_or_default(),
            pairwise_url: get("PAIRWISE_API_URL")
                .unwrap_or_else(|| PAIRWISE_DEFAULT_URL.to_string()),
            db_path: get("PICKSCOUT_DB").map(PathBuf::from).or_else(default_db_path),
            categories,
            analysis_ttl: secs("ANALYSIS_CACHE_SECS", 3600),
            schedule_ttl: secs("SCHEDULE_CACHE_SECS", 600),
            event_ttl: secs("EVENT_CACHE_SECS", 3600),
            epa: EpaConfig {
                k: rate("EPA_K", defaults.k),
                def_k: rate("EPA_DEF_K", defaults.def_k),
                foul_k: rate("EPA_FOUL_K", defaults.foul_k),
                ..defaults
            },
        }
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}
