use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::legacy::{FileLegacyStore, LegacyStore, NoLegacyStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the designer API server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Project used when `--project` is not given.
    #[serde(default)]
    pub project: Option<String>,

    /// Key material for API key encryption.
    /// Generated on first `init`. Losing it makes stored keys unreadable.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Consult settings saved on this machine before the server held them.
    #[serde(default = "default_legacy_store")]
    pub legacy_store: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Pause between a finished download and selecting the model.
    #[serde(default = "default_auto_select_delay")]
    pub auto_select_delay_ms: u64,
}

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_legacy_store() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

fn default_auto_select_delay() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            namespace: default_namespace(),
            project: None,
            client_secret: None,
            legacy_store: default_legacy_store(),
            request_timeout_secs: default_request_timeout(),
            auto_select_delay_ms: default_auto_select_delay(),
        }
    }
}

impl Config {
    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::home_dir()
            .context("Could not determine home directory")?
            .join(".ragstudio");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("config.toml"))
    }

    pub fn legacy_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("legacy.json"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        toml::from_str(&contents).context("Failed to parse config.toml")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, &contents)?;

        // Owner-only: the client secret decrypts every stored API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Generates a client secret if none exists. Returns whether one was created.
    pub fn ensure_client_secret(&mut self) -> bool {
        if self.client_secret.is_some() {
            return false;
        }
        use rand::Rng;
        let secret: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(48)
            .map(char::from)
            .collect();
        self.client_secret = Some(secret);
        true
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auto_select_delay(&self) -> Duration {
        Duration::from_millis(self.auto_select_delay_ms)
    }

    /// The legacy settings store, or a no-op store when disabled or unreadable.
    pub fn legacy_store(&self) -> Box<dyn LegacyStore> {
        if !self.legacy_store {
            return Box::new(NoLegacyStore);
        }
        let opened = Self::legacy_path().and_then(|path| FileLegacyStore::open(&path));
        match opened {
            Ok(store) => Box::new(store),
            Err(e) => {
                tracing::warn!("Ignoring legacy settings: {e:#}");
                Box::new(NoLegacyStore)
            }
        }
    }
}
