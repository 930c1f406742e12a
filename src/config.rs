use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::app::{APP_ID, PREFERENCES_FILE};
use crate::error::ConfigError;
use crate::supervisor::env;

/// User preferences, persisted as JSON between sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Location of the pm2 executable
    #[serde(default = "default_pm2_path")]
    pub pm2_path: PathBuf,

    /// Seconds between automatic refreshes, 0 disables polling
    #[serde(default = "default_refresh_interval")]
    pub auto_refresh_interval: u64,

    /// Upper bound on a single pm2 invocation, null waits forever
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: Option<u64>,

    /// Shell queried for the interactive PATH when none is inherited
    #[serde(default)]
    pub login_shell: Option<PathBuf>,
}

fn default_pm2_path() -> PathBuf {
    PathBuf::from("/opt/homebrew/bin/pm2")
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_command_timeout() -> Option<u64> {
    Some(60)
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            pm2_path: default_pm2_path(),
            auto_refresh_interval: default_refresh_interval(),
            command_timeout_secs: default_command_timeout(),
            login_shell: None,
        }
    }
}

impl Preferences {
    /// Default preferences file: <config_dir>/<app id>/preferences.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_ID).join(PREFERENCES_FILE))
    }

    /// Load preferences from the default location, falling back to defaults
    pub fn load() -> Self {
        let path = match Self::default_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("{}, using default preferences", e);
                return Self::default();
            }
        };

        match Self::load_from(&path) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("{}, using default preferences", e);
                Self::default()
            }
        }
    }

    /// Load preferences from a file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let prefs = serde_json::from_str(&contents)?;
        info!("Loaded preferences from {:?}", path);
        Ok(prefs)
    }

    /// Save preferences to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save preferences to a file, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(io_err)?;

        info!("Saved preferences to {:?}", path);
        Ok(())
    }

    /// Shell used to read the login PATH: preference, then $SHELL, then zsh
    pub fn effective_login_shell(&self) -> PathBuf {
        self.login_shell
            .clone()
            .or_else(|| std::env::var_os("SHELL").filter(|s| !s.is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("/bin/zsh"))
    }
}

/// Everything a supervisor invocation reads, fixed for the session
/// except through an explicit preferences update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub pm2_path: PathBuf,
    pub search_path: String,
    pub home: PathBuf,
    pub command_timeout: Option<Duration>,
    pub auto_refresh: Option<Duration>,
}

impl Settings {
    /// Resolve the runtime PATH and home directory once, then apply preferences
    pub fn resolve(prefs: &Preferences) -> Self {
        let search_path = env::resolve_path(
            std::env::var("PATH").ok(),
            &prefs.effective_login_shell(),
        );
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        let search_path = env::with_package_manager_dirs(&search_path, &home);

        info!("Resolved PATH for pm2: {}", search_path);

        Self::from_parts(prefs, search_path, home)
    }

    pub fn from_parts(prefs: &Preferences, search_path: String, home: PathBuf) -> Self {
        Self {
            pm2_path: prefs.pm2_path.clone(),
            search_path,
            home,
            command_timeout: prefs.command_timeout_secs.map(Duration::from_secs),
            auto_refresh: match prefs.auto_refresh_interval {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    /// Same session environment, new preferences
    pub fn with_preferences(&self, prefs: &Preferences) -> Self {
        Self::from_parts(prefs, self.search_path.clone(), self.home.clone())
    }
}

/// Process-wide settings slot. Readers take the current `Arc` once per
/// invocation; updates swap the whole value.
#[derive(Debug, Clone)]
pub struct SharedSettings(Arc<RwLock<Arc<Settings>>>);

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(settings))))
    }

    pub fn current(&self) -> Arc<Settings> {
        self.0.read().clone()
    }

    pub fn replace(&self, settings: Settings) {
        *self.0.write() = Arc::new(settings);
    }
}

static GLOBAL_SETTINGS: OnceCell<SharedSettings> = OnceCell::new();

/// Install the session settings; later calls return the slot installed first
pub fn install_global(settings: Settings) -> SharedSettings {
    GLOBAL_SETTINGS
        .get_or_init(|| SharedSettings::new(settings))
        .clone()
}
