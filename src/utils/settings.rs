use crate::utils::{PollConfig, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const BASE_URL_ENV: &str = "CRITIC_CHAT_BASE_URL";
const APP_DIR: &str = "critic-chat";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("could not find a config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub processing_interval_ms: u64,
    pub score_sync_interval_ms: u64,
    pub simulation_interval_ms: u64,
    pub max_consecutive_failures: u32,
    pub max_backoff_ms: u64,
    pub send_delay_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            processing_interval_ms: 1000,
            score_sync_interval_ms: 5000,
            simulation_interval_ms: 1000,
            max_consecutive_failures: 30,
            max_backoff_ms: 30_000,
            send_delay_ms: 1000,
        }
    }
}

impl PollingSettings {
    pub fn processing(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.processing_interval_ms.max(1)),
            max_consecutive_failures: self.max_consecutive_failures.max(1),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.processing_interval_ms)),
        }
    }

    pub fn score_sync(&self) -> Duration {
        Duration::from_millis(self.score_sync_interval_ms.max(1))
    }

    pub fn simulation(&self) -> Duration {
        Duration::from_millis(self.simulation_interval_ms.max(1))
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

/// Toggles for the optional parts of the chat view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub critic_display: bool,
    pub dual_output: bool,
    pub extra_sections: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            critic_display: true,
            dual_output: true,
            extra_sections: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    pub polling: PollingSettings,
    pub features: FeatureFlags,
}

impl Settings {
    /// Get the platform-specific settings directory
    pub fn settings_dir() -> Result<PathBuf, SettingsError> {
        let dir = if cfg!(any(target_os = "windows", target_os = "macos")) {
            // %APPDATA%\critic-chat or ~/Library/Application Support/critic-chat
            dirs::config_dir()
                .ok_or(SettingsError::NoConfigDir)?
                .join(APP_DIR)
        } else {
            // $HOME/.critic-chat
            dirs::home_dir()
                .ok_or(SettingsError::NoConfigDir)?
                .join(format!(".{}", APP_DIR))
        };
        Ok(dir)
    }

    pub fn settings_path() -> Result<PathBuf, SettingsError> {
        Ok(Self::settings_dir()?.join("settings.toml"))
    }

    /// Loads the settings file, then applies the environment override.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_from(&Self::settings_path()?)?;
        settings.apply_env_override(std::env::var(BASE_URL_ENV).ok());
        Ok(settings)
    }

    /// Like [`Settings::load`], but logs failures and falls back to defaults.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            warn!(error = %e, "using default settings");
            let mut settings = Self::default();
            settings.apply_env_override(std::env::var(BASE_URL_ENV).ok());
            settings
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(write_err)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(write_err)?;

        // Credentials live in this file: owner read/write only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(write_err)?;
        }

        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    pub fn apply_env_override(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            self.server.base_url = url;
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials
            .as_ref()
            .is_some_and(|c| !c.username.is_empty())
    }

    pub fn set_credentials(&mut self, username: String, password: String) {
        self.credentials = Some(Credentials { username, password });
    }

    pub fn clear_credentials(&mut self) {
        self.credentials = None;
    }
}
