use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::CaptureConstraints;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub audio: AudioConfig,
    pub session: SessionDefaults,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-tutor".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Which mount the backend is reached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendProfile {
    /// Local development reverse-proxy mount
    Development,
    /// Direct origin
    #[default]
    Production,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub profile: BackendProfile,
    pub dev_proxy_url: String,
    pub origin_url: String,
    /// Transport-level timeout; the controller itself never times out requests
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            profile: BackendProfile::Production,
            dev_proxy_url: "http://localhost:5173/api".to_string(),
            origin_url: "http://localhost:8000".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn base_url(&self) -> &str {
        match self.profile {
            BackendProfile::Development => &self.dev_proxy_url,
            BackendProfile::Production => &self.origin_url,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    /// Where played clips are dumped as WAV files; unset means log only
    pub output_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
            output_dir: None,
        }
    }
}

impl AudioConfig {
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            sample_rate: self.sample_rate,
            channels: self.channels,
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub language: Language,
    pub scroll_interval_ms: u64,
    pub quiz_advance_ms: u64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            language: Language::Bangla,
            scroll_interval_ms: 50,
            quiz_advance_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Interaction language. Chosen per controller, never ambient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "bn")]
    Bangla,
    #[serde(rename = "en")]
    English,
}

impl Language {
    /// Locale code sent to the backend
    pub fn code(self) -> &'static str {
        match self {
            Language::Bangla => "bn-BD",
            Language::English => "en-US",
        }
    }

    /// Pick the variant for this language
    pub fn pick<'a, T: ?Sized>(self, bn: &'a T, en: &'a T) -> &'a T {
        match self {
            Language::Bangla => bn,
            Language::English => en,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bn" | "bn-bd" | "bangla" | "bengali" => Ok(Language::Bangla),
            "en" | "en-us" | "english" => Ok(Language::English),
            other => anyhow::bail!("Unknown language: {}", other),
        }
    }
}

impl Config {
    /// Load from an optional file (any format the `config` crate detects by
    /// extension) layered with `VOICE_TUTOR__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOICE_TUTOR").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}
