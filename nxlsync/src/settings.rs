//! Persistent settings.
//!
//! Settings live in an INI file, by default `{config_dir}/nxlsync/config.ini`:
//!
//! ```ini
//! [paths]
//! install_directory = /games/maplestory
//!
//! [server]
//! manifest_pointer_url = http://3.129.199.50/manifest.txt
//! manifest_base_url = https://download2.nexon.net/Game/nxl/games/10100
//! chunk_base_url = https://download2.nexon.net/Game/nxl/games
//! timeout_secs = 60
//! max_attempts = 6
//!
//! [state]
//! last_manifest_id = 3f786850e387550fdab836ed7e6dc881de23001b
//! ```
//!
//! Missing keys fall back to their defaults. [`SettingsStore`] wraps a file
//! and implements [`SettingsProvider`], the interface the update check uses.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::chunk::{DEFAULT_CHUNK_BASE_URL, DEFAULT_MAX_ATTEMPTS};
use crate::config::SyncConfig;
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::manifest::source::{DEFAULT_MANIFEST_BASE_URL, DEFAULT_MANIFEST_POINTER_URL};

/// Keys accepted by [`Settings::get`] and [`Settings::set`], as
/// `section.key`.
pub const KEYS: &[&str] = &[
    "paths.install_directory",
    "server.manifest_pointer_url",
    "server.manifest_base_url",
    "server.chunk_base_url",
    "server.timeout_secs",
    "server.max_attempts",
    "state.last_manifest_id",
];

/// Errors from reading, writing or editing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root of the synchronized tree. Required before syncing.
    pub install_directory: Option<PathBuf>,
    pub manifest_pointer_url: String,
    pub manifest_base_url: String,
    pub chunk_base_url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Id of the last manifest synchronized without failures.
    pub last_manifest_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            install_directory: None,
            manifest_pointer_url: DEFAULT_MANIFEST_POINTER_URL.to_string(),
            manifest_base_url: DEFAULT_MANIFEST_BASE_URL.to_string(),
            chunk_base_url: DEFAULT_CHUNK_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            last_manifest_id: None,
        }
    }
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("nxlsync").join("config.ini"))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> SettingsResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Settings file not found, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => SettingsError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => SettingsError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let mut settings = Self::default();
        for key in KEYS {
            let (section, name) = split_key(key)?;
            if let Some(value) = ini.get_from(Some(section), name) {
                settings.set(key, value)?;
            }
        }
        Ok(settings)
    }

    /// Write settings to `path`, creating its directory if needed.
    pub fn save(&self, path: &Path) -> SettingsResult<()> {
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut ini = Ini::new();
        for key in KEYS {
            let (section, name) = split_key(key)?;
            if let Some(value) = self.get(key)? {
                ini.with_section(Some(section)).set(name, value);
            }
        }
        ini.write_to_file(path).map_err(io_error)
    }

    /// Current value of `key`; `None` for unset optional values.
    pub fn get(&self, key: &str) -> SettingsResult<Option<String>> {
        let value = match key {
            "paths.install_directory" => self
                .install_directory
                .as_ref()
                .map(|p| p.display().to_string()),
            "server.manifest_pointer_url" => Some(self.manifest_pointer_url.clone()),
            "server.manifest_base_url" => Some(self.manifest_base_url.clone()),
            "server.chunk_base_url" => Some(self.chunk_base_url.clone()),
            "server.timeout_secs" => Some(self.timeout_secs.to_string()),
            "server.max_attempts" => Some(self.max_attempts.to_string()),
            "state.last_manifest_id" => self.last_manifest_id.clone(),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        };
        Ok(value)
    }

    /// Set `key` from its textual form. An empty value clears optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> SettingsResult<()> {
        let value = value.trim();
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

        match key {
            "paths.install_directory" => {
                self.install_directory = optional(value).map(PathBuf::from)
            }
            "server.manifest_pointer_url" => self.manifest_pointer_url = value.to_string(),
            "server.manifest_base_url" => self.manifest_base_url = value.to_string(),
            "server.chunk_base_url" => self.chunk_base_url = value.to_string(),
            "server.timeout_secs" => self.timeout_secs = parse_number(key, value)?,
            "server.max_attempts" => {
                let attempts: u32 = parse_number(key, value)?;
                if attempts == 0 {
                    return Err(SettingsError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                self.max_attempts = attempts;
            }
            "state.last_manifest_id" => self.last_manifest_id = optional(value),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Sync configuration for `install_dir` using these server settings.
    pub fn to_sync_config(&self, install_dir: PathBuf) -> SyncConfig {
        SyncConfig::new(install_dir)
            .with_chunk_base_url(self.chunk_base_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_attempts(self.max_attempts)
    }
}

fn split_key(key: &str) -> SettingsResult<(&str, &str)> {
    key.split_once('.')
        .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
}

fn parse_number<T>(key: &str, value: &str) -> SettingsResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Source of the install directory and the last synchronized manifest id.
pub trait SettingsProvider: Send + Sync {
    fn install_dir(&self) -> Option<PathBuf>;

    fn last_manifest_id(&self) -> Option<String>;

    /// Remember `id` as the last synchronized manifest.
    fn set_last_manifest_id(&self, id: &str) -> SettingsResult<()>;
}

/// Settings backed by a file; every change is written through.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Mutex<Settings>,
}

impl SettingsStore {
    /// Open the settings file at `path` (defaults if it does not exist).
    pub fn open(path: impl Into<PathBuf>) -> SettingsResult<Self> {
        let path = path.into();
        let settings = Settings::load(&path)?;
        Ok(Self {
            path,
            settings: Mutex::new(settings),
        })
    }

    /// Open the settings file at [`Settings::default_path`].
    pub fn open_default() -> SettingsResult<Self> {
        Self::open(Settings::default_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.lock().clone()
    }

    /// Apply `change` and persist the result.
    ///
    /// The in-memory settings are only replaced once the file is written.
    pub fn update<F>(&self, change: F) -> SettingsResult<()>
    where
        F: FnOnce(&mut Settings) -> SettingsResult<()>,
    {
        let mut guard = self.settings.lock();
        let mut next = guard.clone();
        change(&mut next)?;
        next.save(&self.path)?;
        *guard = next;
        Ok(())
    }
}

impl SettingsProvider for SettingsStore {
    fn install_dir(&self) -> Option<PathBuf> {
        self.settings.lock().install_directory.clone()
    }

    fn last_manifest_id(&self) -> Option<String> {
        self.settings.lock().last_manifest_id.clone()
    }

    fn set_last_manifest_id(&self, id: &str) -> SettingsResult<()> {
        self.update(|settings| settings.set("state.last_manifest_id", id))
    }
}
