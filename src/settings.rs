//! Settings and provider resolution.
//!
//! Handles:
//! - `.env.local` / `.env` loading at startup
//! - Persisted preferences in `<config dir>/plantsnap/settings.json`
//! - Provider resolution (env override, saved choice, first configured key)
//! - API key lookup (env var, then OS keychain via keyring crate)

use crate::capture::DEFAULT_MAX_UPLOAD_BYTES;
use crate::llm::Provider;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "plantsnap";
const SETTINGS_FILE: &str = "settings.json";
const KEYRING_SERVICE: &str = "plantsnap";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("could not write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// User preferences. Missing fields take their defaults, so older files
/// keep loading as fields are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Saved provider choice. `LLM_PROVIDER` overrides it.
    pub provider: Option<Provider>,
    /// Model override. Empty means the provider's default model.
    pub model: Option<String>,
    /// Camera device passed to the capture backend.
    pub camera_device: Option<String>,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: u64,
    /// How long to wait for the first camera frame.
    pub camera_warmup_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            camera_device: None,
            request_timeout_secs: 60,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            camera_warmup_ms: 5_000,
        }
    }
}

impl Settings {
    /// Default location of the settings file.
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(SETTINGS_FILE)
    }

    /// Load from the default location and apply environment overrides.
    pub fn load() -> Self {
        let mut settings = Self::load_from(&Self::path());
        settings.apply_env();
        settings
    }

    /// Load from a file. A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => {
                    log::info!("[SETTINGS] Loaded {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("[SETTINGS] Ignoring invalid {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist to a file, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_err)?;
        log::info!("[SETTINGS] Saved {}", path.display());
        Ok(())
    }

    /// `PLANTSNAP_MODEL` and `PLANTSNAP_CAMERA_DEVICE` override saved values.
    pub fn apply_env(&mut self) {
        if let Some(model) = non_empty_env("PLANTSNAP_MODEL") {
            self.model = Some(model);
        }
        if let Some(device) = non_empty_env("PLANTSNAP_CAMERA_DEVICE") {
            self.camera_device = Some(device);
        }
    }

    /// Determine which provider to use.
    ///
    /// Priority:
    /// 1. LLM_PROVIDER env var
    /// 2. Saved provider choice
    /// 3. First provider with an API key (env var or keychain)
    /// 4. Gemini
    pub fn resolve_provider(&self) -> Provider {
        resolve_provider_with(
            non_empty_env("LLM_PROVIDER").as_deref(),
            self.provider,
            |p| self.api_key(p).is_some(),
        )
    }

    /// API key for a provider: env var first, then the OS keychain.
    pub fn api_key(&self, provider: Provider) -> Option<String> {
        if let Some(key) = non_empty_env(provider.env_key()) {
            return Some(key);
        }
        match keyring::Entry::new(KEYRING_SERVICE, provider.id()).and_then(|e| e.get_password()) {
            Ok(key) if !key.is_empty() => {
                log::info!("[SETTINGS] Loaded {} key from OS keychain", provider);
                Some(key)
            }
            _ => None,
        }
    }

    pub fn model_for(&self, provider: Provider) -> String {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string())
    }
}

fn resolve_provider_with(
    env_override: Option<&str>,
    saved: Option<Provider>,
    has_key: impl Fn(Provider) -> bool,
) -> Provider {
    if let Some(raw) = env_override {
        match raw.parse::<Provider>() {
            Ok(p) => {
                log::info!("[LLM] Provider override: {}", p);
                return p;
            }
            Err(e) => log::warn!("[LLM] Ignoring LLM_PROVIDER: {}", e),
        }
    }
    if let Some(p) = saved {
        return p;
    }
    Provider::ALL
        .into_iter()
        .find(|p| has_key(*p))
        .unwrap_or(Provider::Gemini)
}

/// Save an API key to the OS keychain.
pub fn save_api_key(provider: Provider, api_key: &str) -> Result<(), SettingsError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, provider.id())?;
    entry.set_password(api_key)?;
    log::info!("[SETTINGS] API key saved for provider: {}", provider);
    Ok(())
}

/// Load `.env.local`, falling back to `.env`, from the working directory.
///
/// Runs before the logger exists, so the loaded path is returned for the
/// caller to log.
pub fn load_env_files() -> Option<PathBuf> {
    for env_file in [".env.local", ".env"] {
        let path = Path::new(env_file);
        if path.exists() {
            return match dotenvy::from_path(path) {
                Ok(_) => Some(path.to_path_buf()),
                Err(e) => {
                    eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e);
                    None
                }
            };
        }
    }
    None
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        let p = resolve_provider_with(Some("anthropic"), Some(Provider::Gemini), |_| false);
        assert_eq!(p, Provider::Anthropic);
    }

    #[test]
    fn bad_override_falls_through_to_saved() {
        let p = resolve_provider_with(Some("local"), Some(Provider::Anthropic), |_| false);
        assert_eq!(p, Provider::Anthropic);
    }

    #[test]
    fn first_configured_key_wins() {
        let p = resolve_provider_with(None, None, |p| p == Provider::Anthropic);
        assert_eq!(p, Provider::Anthropic);
    }

    #[test]
    fn defaults_to_gemini() {
        assert_eq!(resolve_provider_with(None, None, |_| false), Provider::Gemini);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let settings = Settings {
            provider: Some(Provider::Anthropic),
            camera_device: Some("/dev/video2".to_string()),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"provider": "gemini"}"#).unwrap();
        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.provider, Some(Provider::Gemini));
        assert_eq!(loaded.request_timeout_secs, 60);
    }

    #[test]
    fn invalid_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn blank_model_uses_provider_default() {
        let settings = Settings {
            model: Some("  ".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.model_for(Provider::Gemini), crate::llm::GEMINI_MODEL);
    }
}
