//! Crawler configuration.
//!
//! Stored as JSON. Durations are written as whole seconds:
//!
//! ```json
//! {
//!   "host": "pop.example.com",
//!   "username": "pinboard@example.com",
//!   "password": "hunter2",
//!   "poll_interval": 60,
//!   "background": [255, 255, 255]
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Directory name used below the platform config and data directories.
pub const APP_DIR: &str = "pinboard";

/// Settings for one mail crawler.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// POP3 server hostname.
    pub host: String,
    /// POP3 server port (implicit TLS).
    pub port: u16,
    /// Mailbox name.
    pub username: String,
    /// Mailbox password.
    pub password: String,
    /// Time between the starts of two polling cycles.
    #[serde(with = "seconds")]
    pub poll_interval: Duration,
    /// Directory receiving `.cmsg` record files.
    pub record_dir: PathBuf,
    /// Directory receiving normalized `.rgba` images.
    pub attachment_dir: PathBuf,
    /// Largest stored image width in pixels.
    pub max_image_width: u32,
    /// Largest stored image height in pixels.
    pub max_image_height: u32,
    /// RGB color transparent images are flattened onto. `None` keeps alpha.
    pub background: Option<[u8; 3]>,
    /// Session lifetime before a forced QUIT and fresh login.
    #[serde(with = "seconds")]
    pub relogin_interval: Duration,
    /// Pause after a failed login.
    #[serde(with = "seconds")]
    pub auth_backoff: Duration,
    /// Pause after a failed fetch, parse or delete.
    #[serde(with = "seconds")]
    pub cycle_backoff: Duration,
    /// Pause between QUIT and the next login.
    #[serde(with = "seconds")]
    pub relogin_pause: Duration,
    /// Granularity of the wait between cycles.
    #[serde(with = "seconds")]
    pub wait_tick: Duration,
    /// Delete a message after this many consecutive failures. `None` retries forever.
    pub max_delivery_attempts: Option<u32>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            host: String::new(),
            port: pinboard_pop3::POP3S_PORT,
            username: String::new(),
            password: String::new(),
            poll_interval: Duration::from_secs(60),
            record_dir: data_dir.clone(),
            attachment_dir: data_dir,
            max_image_width: 1920,
            max_image_height: 1080,
            background: None,
            relogin_interval: Duration::from_secs(60 * 60),
            auth_backoff: Duration::from_secs(5 * 60),
            cycle_backoff: Duration::from_secs(60),
            relogin_pause: Duration::from_secs(3),
            wait_tick: Duration::from_secs(1),
            max_delivery_attempts: None,
        }
    }
}

impl fmt::Debug for CrawlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .field("poll_interval", &self.poll_interval)
            .field("record_dir", &self.record_dir)
            .field("attachment_dir", &self.attachment_dir)
            .field("max_image_width", &self.max_image_width)
            .field("max_image_height", &self.max_image_height)
            .field("background", &self.background)
            .field("relogin_interval", &self.relogin_interval)
            .field("auth_backoff", &self.auth_backoff)
            .field("cycle_backoff", &self.cycle_backoff)
            .field("relogin_pause", &self.relogin_pause)
            .field("wait_tick", &self.wait_tick)
            .field("max_delivery_attempts", &self.max_delivery_attempts)
            .finish()
    }
}

impl CrawlerConfig {
    /// Default location: `<config dir>/pinboard/config.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Loads a configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded crawler configuration");
        Ok(config)
    }

    /// Checks that the configuration can drive a crawler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(Error::Config("username must not be empty".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll_interval must be positive".to_string()));
        }
        if self.wait_tick.is_zero() {
            return Err(Error::Config("wait_tick must be positive".to_string()));
        }
        if self.max_image_width == 0 || self.max_image_height == 0 {
            return Err(Error::Config(
                "max_image_width and max_image_height must be positive".to_string(),
            ));
        }
        if self.max_delivery_attempts == Some(0) {
            return Err(Error::Config(
                "max_delivery_attempts must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Serializes a [`Duration`] as whole seconds.
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
