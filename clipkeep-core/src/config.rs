//! User settings persisted as TOML.

use crate::crypto::{generate_salt, open_token, seal_token, DerivationMode, TokenKey};
use crate::{ClipkeepError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Retention threshold as written by the user.
///
/// Kept loose so a hand-edited value never prevents the file from loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdDays {
    Number(i64),
    Text(String),
    Other(toml::Value),
}

impl Default for ThresholdDays {
    fn default() -> Self {
        Self::Number(30)
    }
}

impl ThresholdDays {
    /// Whole number of days, or `fallback` when the value isn't one
    pub fn days_or(&self, fallback: u32) -> u32 {
        let parsed = match self {
            Self::Number(n) => u32::try_from(*n).ok(),
            Self::Text(s) => s.trim().parse::<u32>().ok(),
            Self::Other(_) => None,
        };
        parsed.unwrap_or_else(|| {
            warn!("Invalid history threshold {:?}, using {} days", self, fallback);
            fallback
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub encryption_enabled: bool,
    pub use_personal_key: bool,
    /// Personal password. Stored sealed with the settings key on disk.
    pub personal_key: String,
    pub encryption_mode: DerivationMode,
    /// Base64 salt shared by every personal-mode envelope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_salt: Option<String>,
    /// `keep`, `auto-delete` or `archive`
    pub history_management: String,
    pub history_threshold_days: ThresholdDays,
    pub sync_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_dir: Option<PathBuf>,
    pub sync_interval_secs: u64,
    pub retention_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            encryption_enabled: true,
            use_personal_key: false,
            personal_key: String::new(),
            encryption_mode: DerivationMode::Normal,
            encryption_salt: None,
            history_management: "keep".to_string(),
            history_threshold_days: ThresholdDays::default(),
            sync_enabled: false,
            sync_dir: None,
            sync_interval_secs: 300,
            retention_interval_secs: 3600,
        }
    }
}

impl Settings {
    /// Load settings from `path`, returning defaults if the file is missing.
    ///
    /// With a settings key the stored personal key is unsealed; one that
    /// cannot be unsealed comes back empty.
    pub fn load(path: &Path, settings_key: Option<&TokenKey>) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let mut settings: Self = toml::from_str(&content)
            .map_err(|e| ClipkeepError::Config(format!("{}: {}", path.display(), e)))?;

        if let Some(key) = settings_key {
            if !settings.personal_key.is_empty() {
                settings.personal_key = match open_token(key, &settings.personal_key)
                    .ok()
                    .and_then(|raw| String::from_utf8(raw).ok())
                {
                    Some(password) => password,
                    None => {
                        warn!("Stored personal key could not be unsealed");
                        String::new()
                    }
                };
            }
        }

        Ok(settings)
    }

    /// Write settings atomically, sealing the personal key when a settings
    /// key is supplied.
    pub fn save(&self, path: &Path, settings_key: Option<&TokenKey>) -> Result<()> {
        let mut on_disk = self.clone();
        if let Some(key) = settings_key {
            if !on_disk.personal_key.is_empty() {
                on_disk.personal_key = seal_token(key, on_disk.personal_key.as_bytes())?;
            }
        }

        let content = toml::to_string_pretty(&on_disk)
            .map_err(|e| ClipkeepError::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Decoded personal-mode salt, if one has been recorded
    pub fn encryption_salt_bytes(&self) -> Result<Option<Vec<u8>>> {
        match self.encryption_salt.as_deref() {
            None | Some("") => Ok(None),
            Some(encoded) => STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(|e| ClipkeepError::Config(format!("invalid encryption_salt: {}", e))),
        }
    }

    pub fn set_encryption_salt(&mut self, salt: &[u8]) {
        self.encryption_salt = Some(STANDARD.encode(salt));
    }

    /// Record a fresh salt when personal encryption is on and none exists.
    /// Returns true if the settings changed.
    pub fn ensure_encryption_salt(&mut self) -> bool {
        let needs_salt = self.encryption_enabled
            && self.use_personal_key
            && self.encryption_salt.as_deref().map_or(true, str::is_empty);
        if needs_salt {
            self.set_encryption_salt(&generate_salt());
        }
        needs_salt
    }
}
