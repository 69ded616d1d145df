//! Configuration types shared across crates.

use crate::media::MediaKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chunked upload configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum declared size for image uploads, in bytes.
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u64,
    /// Maximum declared size for video uploads, in bytes.
    #[serde(default = "default_max_video_size")]
    pub max_video_size: u64,
    /// Interval in seconds between expiry sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Seconds without an accepted chunk before an incomplete session is
    /// reclaimed by the sweeper.
    #[serde(default = "default_session_inactivity_timeout_secs")]
    pub session_inactivity_timeout_secs: u64,
    /// Maximum size of a single chunk request body, in bytes.
    #[serde(default = "default_max_chunk_request_size")]
    pub max_chunk_request_size: u64,
}

fn default_max_image_size() -> u64 {
    crate::DEFAULT_MAX_IMAGE_SIZE
}

fn default_max_video_size() -> u64 {
    crate::DEFAULT_MAX_VIDEO_SIZE
}

fn default_sweep_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_session_inactivity_timeout_secs() -> u64 {
    1800 // 30 minutes
}

fn default_max_chunk_request_size() -> u64 {
    crate::DEFAULT_MAX_CHUNK_REQUEST_SIZE
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_size: default_max_image_size(),
            max_video_size: default_max_video_size(),
            sweep_interval_secs: default_sweep_interval_secs(),
            session_inactivity_timeout_secs: default_session_inactivity_timeout_secs(),
            max_chunk_request_size: default_max_chunk_request_size(),
        }
    }
}

impl UploadConfig {
    /// Create a test configuration with small ceilings.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            max_image_size: 1024,
            max_video_size: 4096,
            sweep_interval_secs: 1,
            session_inactivity_timeout_secs: 60,
            max_chunk_request_size: 512,
        }
    }

    /// Declared-size ceiling for the given media kind.
    pub fn max_size_for(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.max_image_size,
            MediaKind::Video => self.max_video_size,
        }
    }

    /// Get the sweep interval as a std::time::Duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Get the inactivity timeout as a time::Duration.
    pub fn inactivity_timeout(&self) -> time::Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.session_inactivity_timeout_secs).unwrap_or(i64::MAX);
        time::Duration::seconds(secs)
    }

    /// Validate upload configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_image_size == 0 {
            return Err("uploads.max_image_size cannot be 0".to_string());
        }
        if self.max_video_size == 0 {
            return Err("uploads.max_video_size cannot be 0".to_string());
        }
        if self.max_chunk_request_size == 0 {
            return Err("uploads.max_chunk_request_size cannot be 0".to_string());
        }

        // Zero would make tokio::time::interval panic
        if self.sweep_interval_secs == 0 {
            return Err("uploads.sweep_interval_secs cannot be 0. \
                 Use a value >= 1 second."
                .to_string());
        }

        if self.session_inactivity_timeout_secs == 0 {
            return Err("uploads.session_inactivity_timeout_secs cannot be 0".to_string());
        }

        if self.session_inactivity_timeout_secs > i64::MAX as u64 {
            return Err(format!(
                "uploads.session_inactivity_timeout_secs {} exceeds maximum value {}",
                self.session_inactivity_timeout_secs,
                i64::MAX
            ));
        }

        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chunked upload configuration.
    #[serde(default)]
    pub uploads: UploadConfig,
}

impl AppConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            uploads: UploadConfig::for_testing(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.uploads.validate()
    }
}
