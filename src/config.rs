use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "file_save_watcher.yml";

pub const DEFAULT_CONFIG: &str = r#"config:
  # Minimum seconds between two runs for the same file
  debounce_delay: 1.0
  ignore_dirs:
    - .git
    - node_modules
    - target
  # shell: /bin/zsh
  # path: /absolute/directory/to/watch

watchers:
  - name: markdown
    patterns: [".md"]
    command: "echo saved $FILE"
"#;

/// A named association of file-name suffixes to a shell command template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatcherRule {
    pub name: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    pub command: String,
}

/// Immutable watch configuration. A reload builds a new value; nothing
/// mutates one in place.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfiguration {
    pub debounce_delay: Duration,
    pub ignore_dirs: Vec<String>,
    pub shell: Option<String>,
    pub explicit_path: Option<String>,
    pub watchers: Vec<WatcherRule>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    config: GlobalSection,
    #[serde(default)]
    watchers: Vec<WatcherRule>,
}

#[derive(Debug, Deserialize)]
struct GlobalSection {
    debounce_delay: f64,
    #[serde(default)]
    ignore_dirs: Vec<String>,
    shell: Option<String>,
    path: Option<String>,
}

impl WatchConfiguration {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(text).context("Invalid configuration")?;
        let debounce_delay = Duration::try_from_secs_f64(file.config.debounce_delay)
            .with_context(|| {
                format!(
                    "debounce_delay must be a non-negative number of seconds, got {}",
                    file.config.debounce_delay
                )
            })?;
        Ok(Self {
            debounce_delay,
            ignore_dirs: file.config.ignore_dirs,
            shell: file.config.shell,
            explicit_path: file.config.path,
            watchers: file.watchers,
        })
    }

    pub fn shell(&self) -> Option<&str> {
        self.shell.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn with_explicit_path(mut self, path: &Path) -> Self {
        self.explicit_path = Some(path.to_string_lossy().into_owned());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub config: Arc<WatchConfiguration>,
}

impl ConfigSource {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = WatchConfiguration::from_yaml(&text)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        let path = fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve config path {}", path.display()))?;
        Ok(Self {
            path,
            config: Arc::new(config),
        })
    }

    pub fn with_explicit_path(self, root: &Path) -> Self {
        let config = (*self.config).clone().with_explicit_path(root);
        Self {
            path: self.path,
            config: Arc::new(config),
        }
    }

    /// The directory actually watched: the configured `path` when set,
    /// otherwise the directory holding the config file.
    pub fn root(&self) -> PathBuf {
        match self.config.explicit_path.as_deref() {
            Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
            _ => self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("/")),
        }
    }
}

/// Write the bundled default configuration, refusing to overwrite.
pub fn write_default(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
