use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub ipc: IpcConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub host: HostConfig,
}

/// Where library URIs resolve to and which of them count as audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory that replaces `uri_prefix` when resolving a library URI.
    #[serde(default = "platform::default_library_base")]
    pub base_dir: PathBuf,
    #[serde(default = "default_uri_prefix")]
    pub uri_prefix: String,
    /// File extensions without the dot, matched case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcConfig {
    /// Bound by the service; the UI peer sends commands here.
    #[serde(default = "default_service_socket")]
    pub service_socket: PathBuf,
    /// Bound by the UI peer; snapshots are sent here.
    #[serde(default = "default_ui_socket")]
    pub ui_socket: PathBuf,
    #[serde(default = "default_send_buffer_bytes")]
    pub send_buffer_bytes: usize,
    /// How many times to look for the peer socket after launching the UI.
    #[serde(default = "default_startup_attempts")]
    pub startup_attempts: u32,
    #[serde(default = "default_startup_interval_ms")]
    pub startup_interval_ms: u64,
}

impl IpcConfig {
    pub fn startup_interval(&self) -> Duration {
        Duration::from_millis(self.startup_interval_ms)
    }
}

/// How to launch the UI peer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    /// Program to run.  When unset, `keywheel-ui` is looked up beside the
    /// executable and on PATH.
    #[serde(default)]
    pub command: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl UiConfig {
    pub fn resolve_command(&self) -> Option<PathBuf> {
        self.command.clone().or_else(platform::find_ui_binary)
    }
}

/// Initial filter state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_bpm_reference")]
    pub bpm_reference: f64,
    #[serde(default = "default_bpm_tolerance_percent")]
    pub bpm_tolerance_percent: f64,
    #[serde(default = "default_true")]
    pub bpm_filter: bool,
    #[serde(default = "default_true")]
    pub key_filter: bool,
}

/// Settings for the standalone host binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Interval between `poll()` calls.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Program run with the track path on `preview`.
    #[serde(default)]
    pub preview_command: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            base_dir: platform::default_library_base(),
            uri_prefix: default_uri_prefix(),
            extensions: default_extensions(),
        }
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            service_socket: default_service_socket(),
            ui_socket: default_ui_socket(),
            send_buffer_bytes: default_send_buffer_bytes(),
            startup_attempts: default_startup_attempts(),
            startup_interval_ms: default_startup_interval_ms(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            bpm_reference: default_bpm_reference(),
            bpm_tolerance_percent: default_bpm_tolerance_percent(),
            bpm_filter: true,
            key_filter: true,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            preview_command: None,
        }
    }
}

fn default_uri_prefix() -> String {
    "query:UserLibrary#".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["mp3".to_string(), "aiff".to_string()]
}

fn default_service_socket() -> PathBuf {
    PathBuf::from(platform::DEFAULT_SERVICE_SOCKET)
}

fn default_ui_socket() -> PathBuf {
    PathBuf::from(platform::DEFAULT_UI_SOCKET)
}

fn default_send_buffer_bytes() -> usize {
    250 * 1024
}

fn default_startup_attempts() -> u32 {
    10
}

fn default_startup_interval_ms() -> u64 {
    100
}

fn default_bpm_reference() -> f64 {
    100.0
}

fn default_bpm_tolerance_percent() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

fn default_tick_ms() -> u64 {
    20
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Reads `path`, writing a default config there first if it is missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
