use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedSender;

use krshell_config::ShellConfig;
use krshell_logging::command_preview;
use krshell_session::{AsyncShellUnit, KeepShell, ShellLauncher, ShellRegistry};
use krshell_translation::ShellTranslation;
use krshell_types::{join_text, ShellEvent, ShellOutput};

use crate::files::{cache_relative_path, cached_script_body, copy_dir_missing, write_executable};
use crate::page::PageContext;
use crate::runner::ScriptRun;
use crate::ASSETS_PREFIX;

/// Name of the registry shell used when root is not available
const SCRIPT_SHELL_NAME: &str = "script";

/// Substitute `$({KEY})` placeholders in an executor template
///
/// Carriage returns are dropped and `$({EXECUTOR_PATH})` becomes the path the
/// rendered executor is written to.
pub fn render_executor(template: &str, env: &BTreeMap<String, String>, executor_path: &Path) -> String {
    let mut rendered = template.replace('\r', "");
    for (key, value) in env {
        rendered = rendered.replace(&format!("$({{{}}})", key), value);
    }
    rendered.replace("$({EXECUTOR_PATH})", &executor_path.to_string_lossy())
}

/// Runs menu scripts through the executor wrapper
pub struct ScriptEnvironment {
    data_dir: PathBuf,
    assets_dir: Option<PathBuf>,
    executor_path: PathBuf,
    rooted: bool,
    shell: Arc<KeepShell>,
    launcher: ShellLauncher,
    translation: Arc<ShellTranslation>,
}

impl std::fmt::Debug for ScriptEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEnvironment")
            .field("data_dir", &self.data_dir)
            .field("executor_path", &self.executor_path)
            .field("rooted", &self.rooted)
            .finish_non_exhaustive()
    }
}

impl ScriptEnvironment {
    /// Probe root, extract the toolkit and write the rendered executor
    pub fn init(
        config: &ShellConfig,
        registry: &ShellRegistry,
        translation: Arc<ShellTranslation>,
    ) -> Result<Self> {
        let script = &config.script;
        let data_dir = match script.data_dir {
            Some(ref dir) => dir.clone(),
            None => krshell_logging::get_data_dir()?,
        };
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        let assets_dir = script.assets_dir.clone();

        let rooted = registry.check_root();
        log::info!(target: "script_env", "Root permission: {}", rooted);

        let toolkit = extract_toolkit(&script.toolkit_dir, assets_dir.as_deref(), &data_dir)?;

        let executor_name = strip_assets_prefix(&script.executor.to_string_lossy()).to_string();
        let template_path = asset_source(Path::new(&executor_name), assets_dir.as_deref());
        let template = fs::read_to_string(&template_path).with_context(|| {
            format!("Failed to read executor template {}", template_path.display())
        })?;

        let temp_dir = script.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let mut env = BTreeMap::new();
        env.insert("TOOLKIT".to_string(), toolkit.to_string_lossy().into_owned());
        env.insert("START_DIR".to_string(), data_dir.to_string_lossy().into_owned());
        env.insert("TEMP_DIR".to_string(), temp_dir.to_string_lossy().into_owned());
        env.insert("ROOT_PERMISSION".to_string(), rooted.to_string());
        for (key, value) in &script.env {
            env.insert(key.clone(), value.clone());
        }

        let executor_path = data_dir.join(relative_name(&executor_name));
        let rendered = render_executor(&template, &env, &executor_path);
        write_executable(&executor_path, rendered.as_bytes())?;
        log::debug!(
            target: "script_env",
            "Executor written to {}",
            executor_path.display()
        );

        let shell = if rooted {
            registry.default_instance()
        } else {
            registry.instance(SCRIPT_SHELL_NAME, false)
        };

        Ok(Self {
            data_dir,
            assets_dir,
            executor_path,
            rooted,
            shell,
            launcher: ShellLauncher::from_config(config),
            translation,
        })
    }

    pub fn is_rooted(&self) -> bool {
        self.rooted
    }

    pub fn executor_path(&self) -> &Path {
        &self.executor_path
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Write an inline script to the hash-named cache, reusing existing files
    pub fn cache_script(&self, script: &str) -> Result<PathBuf> {
        let path = self.data_dir.join(cache_relative_path(script));
        if !path.exists() {
            write_executable(&path, cached_script_body(script).as_bytes())?;
        }
        Ok(path)
    }

    /// On-disk path for a script reference or inline script body
    pub fn resolve_script(&self, script: &str) -> Result<PathBuf> {
        match script.strip_prefix(ASSETS_PREFIX) {
            Some(relative) => self.extract_asset(relative),
            None => self.cache_script(script),
        }
    }

    /// Shell text that exports the page variables and runs `script_path`
    pub fn build_invocation(&self, script_path: &Path, page: Option<&PageContext>) -> String {
        format!(
            "\n{}\n\n{} \"{}\"",
            PageContext::exports(page, &self.data_dir),
            self.executor_path.display(),
            script_path.display()
        )
    }

    /// Run `script` on the environment shell and translate its output
    pub fn execute_result_outputs(
        &self,
        script: &str,
        page: Option<&PageContext>,
    ) -> Result<Vec<ShellOutput>> {
        if script.is_empty() {
            return Ok(Vec::new());
        }

        let path = self.resolve_script(script)?;
        log::debug!(
            target: "script_env",
            "Running {}",
            command_preview(script, 80)
        );
        let raw = self.shell.do_cmd_sync(&self.build_invocation(&path, page));
        let rows: Vec<&str> = raw.split('\n').collect();
        Ok(self.translation.resolve_lines(&rows))
    }

    /// Text items of [`execute_result_outputs`](Self::execute_result_outputs), trimmed
    pub fn execute_result(&self, script: &str, page: Option<&PageContext>) -> Result<String> {
        let outputs = self.execute_result_outputs(script, page)?;
        Ok(join_text(&outputs).trim().to_string())
    }

    /// Run `script` on a dedicated streaming shell
    ///
    /// Output arrives on `events`; the returned handle stops or awaits the run.
    pub async fn spawn_streaming(
        &self,
        script: &str,
        page: Option<&PageContext>,
        events: UnboundedSender<ShellEvent>,
    ) -> Result<ScriptRun> {
        let tag = format!("krshell_{}", chrono::Utc::now().timestamp_millis());
        let path = self.resolve_script(script)?;
        let stop_path = self.cache_script(&format!("shell_progres='{}' killtree", tag))?;
        let stop_command = self.build_invocation(&stop_path, None);

        let mut unit = AsyncShellUnit::new(self.launcher.clone(), self.rooted, events.clone());
        if !unit.start() {
            anyhow::bail!(
                "Failed to start '{}'",
                self.launcher.program(self.rooted)
            );
        }

        let _ = events.send(ShellEvent::Output("shell@android:".to_string()));
        let _ = events.send(ShellEvent::Output(script.trim().to_string()));

        let invocation = format!(
            "export shell_progres='{}'{}",
            tag,
            self.build_invocation(&path, page)
        );
        unit.exec(&invocation).await;

        Ok(ScriptRun::new(unit, tag, Arc::clone(&self.shell), stop_command))
    }

    fn extract_asset(&self, relative: &str) -> Result<PathBuf> {
        let source = asset_source(Path::new(relative), self.assets_dir.as_deref());
        let content = fs::read(&source)
            .with_context(|| format!("Failed to read asset {}", source.display()))?;
        let target = self.data_dir.join(relative_name(relative));
        write_executable(&target, &content)?;
        Ok(target)
    }
}

fn strip_assets_prefix(reference: &str) -> &str {
    reference.strip_prefix(ASSETS_PREFIX).unwrap_or(reference)
}

/// Asset location: relative names are looked up in the assets directory
fn asset_source(name: &Path, assets_dir: Option<&Path>) -> PathBuf {
    match assets_dir {
        Some(dir) if name.is_relative() => dir.join(name),
        _ => name.to_path_buf(),
    }
}

/// Path under the data directory for an asset name, absolute names keep their file name only
fn relative_name(name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.file_name().map(PathBuf::from).unwrap_or_default()
    } else {
        path.to_path_buf()
    }
}

/// Copy the toolkit out of the assets directory and return where it lives
fn extract_toolkit(toolkit_dir: &Path, assets_dir: Option<&Path>, data_dir: &Path) -> Result<PathBuf> {
    if toolkit_dir.as_os_str().is_empty() {
        return Ok(PathBuf::new());
    }
    if toolkit_dir.is_absolute() {
        return Ok(toolkit_dir.to_path_buf());
    }

    let target = data_dir.join(toolkit_dir);
    match assets_dir.map(|dir| dir.join(toolkit_dir)) {
        Some(source) if source.is_dir() => copy_dir_missing(&source, &target)?,
        _ => fs::create_dir_all(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?,
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_executor() {
        let mut env = BTreeMap::new();
        env.insert("TOOLKIT".to_string(), "/data/toolkit".to_string());
        env.insert("ROOT_PERMISSION".to_string(), "true".to_string());

        let template = "#!/system/bin/sh\r\nexport TOOLKIT=\"$({TOOLKIT})\"\r\nexport ROOT=$({ROOT_PERMISSION})\nexport SELF=$({EXECUTOR_PATH})\nexport KEEP=$({UNKNOWN})\n";
        let rendered = render_executor(template, &env, Path::new("/data/executor.sh"));

        assert_eq!(
            rendered,
            "#!/system/bin/sh\nexport TOOLKIT=\"/data/toolkit\"\nexport ROOT=true\nexport SELF=/data/executor.sh\nexport KEEP=$({UNKNOWN})\n"
        );
    }

    #[test]
    fn test_relative_name() {
        assert_eq!(relative_name("kr-script/executor.sh"), PathBuf::from("kr-script/executor.sh"));
        assert_eq!(relative_name("/opt/executor.sh"), PathBuf::from("executor.sh"));
    }

    #[test]
    fn test_asset_source() {
        assert_eq!(
            asset_source(Path::new("a/b.sh"), Some(Path::new("/assets"))),
            PathBuf::from("/assets/a/b.sh")
        );
        assert_eq!(asset_source(Path::new("/x/b.sh"), Some(Path::new("/assets"))), PathBuf::from("/x/b.sh"));
        assert_eq!(asset_source(Path::new("a/b.sh"), None), PathBuf::from("a/b.sh"));
    }
}
