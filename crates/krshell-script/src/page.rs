use std::path::Path;

use crate::ASSETS_PREFIX;

/// Page a script was launched from
///
/// Scripts see it through the `PAGE_CONFIG_*` and `PAGE_WORK_*` exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// Directory holding the page configuration
    pub config_dir: String,
    /// Page configuration file, possibly a bundled asset reference
    pub config_file: String,
}

impl PageContext {
    pub fn new(config_dir: impl Into<String>, config_file: impl Into<String>) -> Self {
        Self {
            config_dir: config_dir.into(),
            config_file: config_file.into(),
        }
    }

    /// Page context for a configuration file, using its parent as the directory
    pub fn from_file(config_file: impl Into<String>) -> Self {
        let config_file = config_file.into();
        let config_dir = Path::new(&config_file)
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { config_dir, config_file }
    }

    pub fn is_asset(&self) -> bool {
        self.config_file.starts_with(ASSETS_PREFIX)
    }

    /// Export block for the page; empty values when there is no page
    pub fn exports(page: Option<&PageContext>, data_dir: &Path) -> String {
        let (config_dir, config_file, work_dir, work_file) = match page {
            Some(page) if !page.config_file.is_empty() => {
                let (work_dir, work_file) = if page.is_asset() {
                    (
                        extracted_path(&page.config_dir, data_dir),
                        extracted_path(&page.config_file, data_dir),
                    )
                } else {
                    (page.config_dir.clone(), page.config_file.clone())
                };
                (page.config_dir.clone(), page.config_file.clone(), work_dir, work_file)
            }
            _ => Default::default(),
        };

        format!(
            "export PAGE_CONFIG_DIR='{}'\nexport PAGE_CONFIG_FILE='{}'\nexport PAGE_WORK_DIR='{}'\nexport PAGE_WORK_FILE='{}'\n",
            config_dir, config_file, work_dir, work_file
        )
    }
}

/// Where a bundled asset lands under the data directory
fn extracted_path(reference: &str, data_dir: &Path) -> String {
    let relative = reference.strip_prefix(ASSETS_PREFIX).unwrap_or(reference);
    data_dir.join(relative).to_string_lossy().into_owned()
}
