use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use krshell_config::ShellConfig;
use krshell_session::ShellRegistry;
use krshell_translation::{MapResources, ShellTranslation};

use crate::cli::Cli;

/// Everything the subcommands share
pub struct AppContext {
    pub config: ShellConfig,
    pub registry: Arc<ShellRegistry>,
    pub translation: Arc<ShellTranslation>,
}

/// Load config, resources and the shell registry for the parsed CLI
pub fn setup_from_cli(cli: &Cli) -> Result<AppContext> {
    let config_path = match cli.config {
        Some(ref path) => path.clone(),
        None => default_config_path()?,
    };

    let config = load_config(&config_path, cli)?;
    let translation = Arc::new(load_translation(
        cli.resources.as_deref().or(config.resources_file.as_deref()),
    )?);
    let registry = Arc::new(ShellRegistry::from_config(&config));

    log::debug!(
        "Loaded config from {} (root mode: {})",
        config_path.display(),
        config.root_mode
    );

    Ok(AppContext {
        config,
        registry,
        translation,
    })
}

fn default_config_path() -> Result<PathBuf> {
    Ok(krshell_logging::get_krshell_dir()?.join("config.toml"))
}

/// Config file, then `KRSHELL_*` variables, then CLI flags
pub fn load_config(path: &Path, cli: &Cli) -> Result<ShellConfig> {
    let mut config = ShellConfig::load_or_create(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env_overrides()?;

    if cli.no_root {
        config.root_mode = false;
    }

    Ok(config)
}

pub fn load_translation(resources_file: Option<&Path>) -> Result<ShellTranslation> {
    let resources = match resources_file {
        Some(path) => MapResources::load_from_file(path)
            .with_context(|| format!("Failed to load resources from {}", path.display()))?,
        None => MapResources::new(),
    };
    Ok(ShellTranslation::new(Arc::new(resources)))
}
