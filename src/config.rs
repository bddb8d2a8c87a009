//! ==============================================================================
//! config.rs - Controller Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `controller.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SerialConfig: Which port the ESP32 is on and how to talk to it.
//!     - LocatorConfig: Simulated fixture or the real wigle.net api.
//!     - LoggingConfig: Default log filter when RUST_LOG is unset.
//!
//! ==============================================================================

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const WIGLE_NAME_ENV: &str = "WIGLE_API_NAME";
pub const WIGLE_TOKEN_ENV: &str = "WIGLE_API_TOKEN";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ControllerConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    /// write timeout
    pub timeout_seconds: u64,
    /// pause between open and write while the esp32 resets
    pub settle_millis: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocatorMode {
    #[default]
    Simulated,
    Wigle,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LocatorConfig {
    pub mode: LocatorMode,
    pub api_url: String,
    pub api_name: String,
    pub api_token: String,
    pub results_per_page: u32,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// serial device the esp32 usually enumerates as on this platform
pub fn default_port() -> String {
    if cfg!(target_os = "windows") {
        "COM3".to_string()
    } else if cfg!(target_os = "macos") {
        "/dev/cu.usbserial-0001".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: 115_200,
            timeout_seconds: 5,
            settle_millis: 2_000,
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            mode: LocatorMode::Simulated,
            api_url: "https://api.wigle.net".to_string(),
            api_name: String::new(),
            api_token: String::new(),
            // the esp32 reads at most 1023 bytes per line; eight records is ~730
            results_per_page: 8,
            request_timeout_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl ControllerConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: ControllerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("controller.toml"),
            PathBuf::from("..").join("config").join("controller.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Credentials from the environment win over the file
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(WIGLE_NAME_ENV).filter(|v| !v.is_empty()) {
            self.locator.api_name = name;
        }
        if let Some(token) = lookup(WIGLE_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.locator.api_token = token;
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let mode = match self.locator.mode {
            LocatorMode::Simulated => "simulated",
            LocatorMode::Wigle => "wigle",
        };
        println!("┌─────────────────────────────────────────┐");
        println!("│        CONTROLLER CONFIGURATION         │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Locator: {:<31}│", mode);
        println!("│ Serial Timeout: {:<24}│", format!("{}s", self.serial.timeout_seconds));
        println!("│ Settle Delay: {:<26}│", format!("{}ms", self.serial.settle_millis));
        println!("│ Log Level: {:<29}│", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
