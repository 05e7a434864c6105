use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use krshell_types::DEFAULT_LOCK_TIMEOUT_MS;

/// Default location of the executor wrapper template
pub const DEFAULT_EXECUTOR: &str = "kr-script/executor.sh";

/// Default toolkit directory exported to scripts as `TOOLKIT`
pub const DEFAULT_TOOLKIT_DIR: &str = "kr-script/toolkit";

/// Shell session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Start sessions through the elevation tool
    #[serde(default = "default_true")]
    pub root_mode: bool,
    /// Program used for normal shells
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Program used for elevated shells
    #[serde(default = "default_su")]
    pub su: String,
    /// How long a command may hold the session before the next caller recovers it
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Per-command read deadline, 0 disables it
    #[serde(default)]
    pub command_timeout_ms: u64,
    /// Run the privilege probe while starting an elevated session
    #[serde(default = "default_true")]
    pub verify_root_on_start: bool,
    /// Replacement for the built-in privilege probe
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub root_probe: Option<String>,
    /// Directory for JSONL session transcripts
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transcript_dir: Option<PathBuf>,
    /// TOML resource table used by the output translator
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resources_file: Option<PathBuf>,
    /// Extra environment for spawned shells
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub script: ScriptConfig,
}

/// Script environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Executor wrapper template every script is run through
    #[serde(default = "default_executor")]
    pub executor: PathBuf,
    /// Toolkit directory exported as `TOOLKIT`
    #[serde(default = "default_toolkit_dir")]
    pub toolkit_dir: PathBuf,
    /// Private files directory (executor copy, script cache)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data_dir: Option<PathBuf>,
    /// Directory exported as `TEMP_DIR`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temp_dir: Option<PathBuf>,
    /// Where `file:///android_asset/` references are looked up
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub assets_dir: Option<PathBuf>,
    /// Extra `$({KEY})` placeholders for the executor template
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_su() -> String {
    "su".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn default_executor() -> PathBuf {
    PathBuf::from(DEFAULT_EXECUTOR)
}

fn default_toolkit_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TOOLKIT_DIR)
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            executor: default_executor(),
            toolkit_dir: default_toolkit_dir(),
            data_dir: None,
            temp_dir: None,
            assets_dir: None,
            env: BTreeMap::new(),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            root_mode: true,
            shell: default_shell(),
            su: default_su(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            command_timeout_ms: 0,
            verify_root_on_start: true,
            root_probe: None,
            transcript_dir: None,
            resources_file: None,
            env: BTreeMap::new(),
            script: ScriptConfig::default(),
        }
    }
}

impl ShellConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ShellConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the file, writing the defaults there first if it does not exist yet
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from_file(path);
        }

        let config = ShellConfig::default();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        config.save_to_file(path)?;
        eprintln!("Created default config file: {}", path.display());
        Ok(config)
    }

    /// Apply `KRSHELL_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `KRSHELL_*` overrides from an arbitrary lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("KRSHELL_ROOT_MODE") {
            self.root_mode = parse_bool(&value)
                .with_context(|| format!("Invalid KRSHELL_ROOT_MODE: '{}'", value))?;
        }
        if let Some(value) = lookup("KRSHELL_SHELL") {
            self.shell = value;
        }
        if let Some(value) = lookup("KRSHELL_SU") {
            self.su = value;
        }
        if let Some(value) = lookup("KRSHELL_LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid KRSHELL_LOCK_TIMEOUT_MS: '{}'", value))?;
        }
        if let Some(value) = lookup("KRSHELL_COMMAND_TIMEOUT_MS") {
            self.command_timeout_ms = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid KRSHELL_COMMAND_TIMEOUT_MS: '{}'", value))?;
        }
        if let Some(value) = lookup("KRSHELL_DATA_DIR") {
            self.script.data_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// `None` when commands may run without a deadline
    pub fn command_timeout(&self) -> Option<Duration> {
        if self.command_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.command_timeout_ms))
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("expected a boolean, got '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ShellConfig::default();
        assert!(config.root_mode);
        assert_eq!(config.shell, "sh");
        assert_eq!(config.su, "su");
        assert_eq!(config.lock_timeout(), Duration::from_secs(10));
        assert_eq!(config.command_timeout(), None);
        assert_eq!(config.script.executor, PathBuf::from(DEFAULT_EXECUTOR));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ShellConfig = toml::from_str(
            r#"
            root_mode = false
            command_timeout_ms = 2500

            [env]
            LANG = "C"

            [script]
            executor = "/opt/kr/executor.sh"
            "#,
        )
        .unwrap();

        assert!(!config.root_mode);
        assert_eq!(config.command_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
        assert_eq!(config.env.get("LANG"), Some(&"C".to_string()));
        assert_eq!(config.script.executor, PathBuf::from("/opt/kr/executor.sh"));
        assert_eq!(config.script.toolkit_dir, PathBuf::from(DEFAULT_TOOLKIT_DIR));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("krshell.toml");

        let created = ShellConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, ShellConfig::default());

        let mut changed = created.clone();
        changed.su = "/system/xbin/su".to_string();
        changed.transcript_dir = Some(temp_dir.path().join("transcripts"));
        changed.save_to_file(&path).unwrap();

        let loaded = ShellConfig::load_or_create(&path).unwrap();
        assert_eq!(loaded, changed);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("KRSHELL_ROOT_MODE", "no"),
            ("KRSHELL_SU", "/sbin/su"),
            ("KRSHELL_LOCK_TIMEOUT_MS", "500"),
            ("KRSHELL_DATA_DIR", "/data/local/tmp/kr"),
        ]
        .into_iter()
        .collect();

        let mut config = ShellConfig::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert!(!config.root_mode);
        assert_eq!(config.su, "/sbin/su");
        assert_eq!(config.shell, "sh");
        assert_eq!(config.lock_timeout_ms, 500);
        assert_eq!(config.script.data_dir, Some(PathBuf::from("/data/local/tmp/kr")));
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = ShellConfig::default();
        let result = config.apply_overrides_from(|key| {
            (key == "KRSHELL_LOCK_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
