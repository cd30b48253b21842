use anyhow::Context;
use dephealth_engine::ViewState;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub socket_path: String,
    pub poll_interval_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_cap_ms: u64,
    pub request_timeout_secs: u64,
    pub persist_view: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            poll_interval_secs: 15,
            max_retries: 3,
            retry_base_ms: 1000,
            retry_cap_ms: 5000,
            request_timeout_secs: 10,
            persist_view: true,
        }
    }
}

impl ViewerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn default_socket_path() -> String {
    static CACHED: OnceLock<String> = OnceLock::new();
    CACHED
        .get_or_init(|| {
            if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
                format!("{dir}/dephealth.sock")
            } else {
                "/tmp/dephealth.sock".to_string()
            }
        })
        .clone()
}

fn config_dir() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "dephealth")?;
    Some(proj.config_dir().to_path_buf())
}

// ----- Viewer config -----
pub fn load_or_default() -> ViewerConfig {
    let Some(dir) = config_dir() else {
        return ViewerConfig::default();
    };
    load_or_default_from_path(&dir.join("viewer.toml"))
}

fn load_or_default_from_path<T>(path: &Path) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    let Ok(contents) = fs::read_to_string(path) else {
        return T::default();
    };
    match toml::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            T::default()
        }
    }
}

fn save_to_path<T: Serialize>(value: &T, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let data = toml::to_string_pretty(value).context("failed to serialize config")?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

// ----- Persisted view -----
pub fn load_view_state() -> ViewState {
    let Some(dir) = config_dir() else {
        return ViewState::default();
    };
    load_or_default_from_path(&dir.join("view.toml"))
}

pub fn save_view_state(view: &ViewState) -> anyhow::Result<()> {
    let Some(dir) = config_dir() else {
        return Err(anyhow::anyhow!("no config directory available"));
    };
    save_to_path(view, &dir.join("view.toml"))
}
