//! Configuration loading.
//!
//! Values come from an optional TOML file, overridden by `STUDIOLINK_`
//! environment variables using `__` as the section separator, e.g.
//! `STUDIOLINK_UPLOADS__MAX_VIDEO_SIZE=1073741824`.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::Path;
use studiolink_core::config::AppConfig;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "STUDIOLINK_";

/// Build the layered configuration source without extracting it.
pub fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::new();
    match path {
        Some(path) if path.exists() => {
            tracing::info!(config_path = %path.display(), "Loading configuration from file");
            figment = figment.merge(Toml::file(path));
        }
        Some(path) => {
            tracing::debug!("No config file found at {}", path.display());
        }
        None => {}
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load and validate configuration. Every value has a default, so neither a
/// file nor environment variables are required.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config: AppConfig = figment(path)
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[uploads]\nmax_video_size = 2048\nsweep_interval_secs = 30").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.uploads.max_video_size, 2048);
        assert_eq!(config.uploads.sweep_interval_secs, 30);
        assert_eq!(
            config.uploads.max_image_size,
            studiolink_core::DEFAULT_MAX_IMAGE_SIZE
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.uploads.session_inactivity_timeout_secs, 1800);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[uploads]\nsweep_interval_secs = 0").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("sweep_interval_secs"));
    }
}
