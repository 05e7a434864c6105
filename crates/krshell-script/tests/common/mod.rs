#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use krshell_config::ShellConfig;
use krshell_script::ScriptEnvironment;
use krshell_session::ShellRegistry;
use krshell_translation::{MapResources, ShellTranslation};
use tempfile::TempDir;

/// Executor wrapper used by the tests: sources the script after exporting
/// the rendered placeholders and defines a fake `killtree`
pub const TEST_EXECUTOR: &str = "#!/bin/sh\r\n\
export TOOLKIT='$({TOOLKIT})'\r\n\
export START_DIR='$({START_DIR})'\r\n\
export ROOT_PERMISSION='$({ROOT_PERMISSION})'\r\n\
export EXECUTOR_PATH='$({EXECUTOR_PATH})'\r\n\
export DEVICE='$({DEVICE})'\r\n\
killtree() { echo \"killed $shell_progres\"; }\r\n\
script=\"$1\"\r\n\
. \"$script\"\r\n";

/// Common test utilities for script environment testing
pub struct TestFixtures {
    pub temp_dir: TempDir,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures = Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        };
        fixtures.create_asset("kr-script/executor.sh", TEST_EXECUTOR);
        fixtures.create_asset("kr-script/toolkit/busybox.sh", "echo toolkit");
        fixtures
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.temp_dir.path().join("assets")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp_dir.path().join("data")
    }

    pub fn create_asset(&self, name: &str, content: &str) -> PathBuf {
        let path = self.assets_dir().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).expect("Failed to create asset dir");
        std::fs::write(&path, content).expect("Failed to write asset");
        path
    }

    /// Config with plain `sh` shells and a probe that always denies root
    pub fn config(&self) -> ShellConfig {
        let mut config = ShellConfig::default();
        config.root_mode = false;
        config.shell = "sh".to_string();
        config.su = "sh".to_string();
        config.root_probe = Some("echo 'permission denied'".to_string());
        config.script.data_dir = Some(self.data_dir());
        config.script.assets_dir = Some(self.assets_dir());
        config.script.temp_dir = Some(self.temp_dir.path().join("tmp"));
        config
            .script
            .env
            .insert("DEVICE".to_string(), "test-device".to_string());
        config
    }

    pub fn translation() -> Arc<ShellTranslation> {
        let resources = MapResources::new().with_string("app_name", "Demo");
        Arc::new(ShellTranslation::new(Arc::new(resources)))
    }

    pub fn create_environment(&self) -> (ScriptEnvironment, ShellRegistry) {
        let config = self.config();
        let registry = ShellRegistry::from_config(&config);
        let environment = ScriptEnvironment::init(&config, &registry, Self::translation())
            .expect("Failed to init script environment");
        (environment, registry)
    }
}
