use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default redline data directory: ~/.redline
pub fn get_redline_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".redline"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.redline/config.toml (highest)
    let redline_dir = get_redline_data_dir()?;
    let redline_config = redline_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if redline_config.exists() {
        let s = std::fs::read_to_string(&redline_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else {
        AppConfig::default()
    };

    // Update logging directory to use redline data directory if not set
    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        let logs_dir = redline_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    // Environment variable overrides (Priority 0: highest)
    if let Ok(v) = std::env::var("REDLINE_BACKEND_ENDPOINT") {
        if !v.trim().is_empty() {
            cfg.backend.endpoint = v;
        }
    }
    if let Ok(v) = std::env::var("REDLINE_MAX_WORKERS") {
        if let Ok(n) = v.trim().parse::<usize>() {
            if n > 0 {
                cfg.dispatch.max_workers = n;
            }
        }
    }
    if let Ok(v) = std::env::var("REDLINE_MAX_CONCURRENT_REQUESTS") {
        if let Ok(n) = v.trim().parse::<usize>() {
            if n > 0 {
                cfg.throttle.max_concurrent_requests = n;
            }
        }
    }

    Ok(cfg)
}
