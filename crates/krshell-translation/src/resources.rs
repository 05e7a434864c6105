/// Resource table abstraction for `@string` / `@dimen` lookups
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Kind of resource a shell line can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    String,
    Dimen,
}

impl std::str::FromStr for ResourceKind {
    type Err = ResourceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(Self::String),
            "dimen" => Ok(Self::Dimen),
            other => Err(ResourceError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Dimen => write!(f, "dimen"),
        }
    }
}

/// A resolved resource
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    String(String),
    /// Dimension already scaled to pixels
    Dimen(f32),
}

impl ResourceValue {
    /// Text substituted into the shell output
    ///
    /// Dimensions become whole pixel counts.
    pub fn render(&self) -> String {
        match self {
            ResourceValue::String(value) => value.clone(),
            ResourceValue::Dimen(px) => format!("{}", px.round() as i64),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ResourceError {
    #[error("no {kind} resource named '{name}'")]
    NotFound { kind: ResourceKind, name: String },
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),
}

/// Read-only resource lookup, shared across threads
pub trait ResourceTable: Send + Sync {
    fn lookup(&self, kind: ResourceKind, name: &str) -> Result<ResourceValue, ResourceError>;
}

/// In-memory resource table, loadable from TOML
///
/// ```toml
/// density = 2.0
///
/// [strings]
/// app_name = "Demo"
///
/// [dimens]
/// icon_size = 24
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapResources {
    /// Multiplier applied to dimensions (dp to px)
    #[serde(default = "default_density")]
    pub density: f32,
    #[serde(default)]
    pub strings: HashMap<String, String>,
    #[serde(default)]
    pub dimens: HashMap<String, f32>,
}

fn default_density() -> f32 {
    1.0
}

impl Default for MapResources {
    fn default() -> Self {
        Self {
            density: default_density(),
            strings: HashMap::new(),
            dimens: HashMap::new(),
        }
    }
}

impl MapResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.strings.insert(name.into(), value.into());
        self
    }

    pub fn with_dimen(mut self, name: impl Into<String>, value: f32) -> Self {
        self.dimens.insert(name.into(), value);
        self
    }

    /// Load a resource table from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read resource file {}", path.display()))?;
        let resources: MapResources = toml::from_str(&content)
            .with_context(|| format!("Failed to parse resource file {}", path.display()))?;
        Ok(resources)
    }
}

impl ResourceTable for MapResources {
    fn lookup(&self, kind: ResourceKind, name: &str) -> Result<ResourceValue, ResourceError> {
        let not_found = || ResourceError::NotFound {
            kind,
            name: name.to_string(),
        };

        match kind {
            ResourceKind::String => self
                .strings
                .get(name)
                .map(|value| ResourceValue::String(value.clone()))
                .ok_or_else(not_found),
            ResourceKind::Dimen => self
                .dimens
                .get(name)
                .map(|value| ResourceValue::Dimen(value * self.density))
                .ok_or_else(not_found),
        }
    }
}
