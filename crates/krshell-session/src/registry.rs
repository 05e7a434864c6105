// Shell registry: the default shell plus named secondary shells
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use krshell_config::ShellConfig;
use krshell_types::CommandExecutor;

use crate::keep_shell::{KeepShell, KeepShellOptions};
use crate::process::{CommandSpawner, ShellLauncher, ShellSpawner};

/// Owns every persistent shell of an application
///
/// Created once and handed to whoever needs a shell.
pub struct ShellRegistry {
    spawner: Arc<dyn ShellSpawner>,
    options: KeepShellOptions,
    default: Arc<KeepShell>,
    named: Mutex<HashMap<String, Arc<KeepShell>>>,
}

impl ShellRegistry {
    pub fn new(spawner: Arc<dyn ShellSpawner>, options: KeepShellOptions) -> Self {
        let default = Arc::new(KeepShell::new(Arc::clone(&spawner), options.clone()));
        Self {
            spawner,
            options,
            default,
            named: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ShellConfig) -> Self {
        let spawner = CommandSpawner::new(ShellLauncher::from_config(config));
        Self::new(Arc::new(spawner), KeepShellOptions::from_config(config))
    }

    /// The shell configured by the registry's options
    pub fn default_instance(&self) -> Arc<KeepShell> {
        Arc::clone(&self.default)
    }

    /// Named shell, created on first use with the requested privilege
    pub fn instance(&self, name: &str, root_mode: bool) -> Arc<KeepShell> {
        let mut named = self.named.lock();
        if let Some(shell) = named.get(name) {
            return Arc::clone(shell);
        }

        let options = self.options.clone().with_root_mode(root_mode);
        let shell = Arc::new(KeepShell::new(Arc::clone(&self.spawner), options));
        named.insert(name.to_string(), Arc::clone(&shell));
        shell
    }

    /// Stop and forget a named shell; returns whether it existed
    pub fn destroy_instance(&self, name: &str) -> bool {
        let removed = self.named.lock().remove(name);
        match removed {
            Some(shell) => {
                shell.try_exit();
                true
            }
            None => false,
        }
    }

    /// Stop every shell; the default shell restarts on its next command
    pub fn destroy_all(&self) {
        let named: Vec<_> = self.named.lock().drain().map(|(_, shell)| shell).collect();
        for shell in named {
            shell.try_exit();
        }
        self.default.try_exit();
    }

    pub fn check_root(&self) -> bool {
        self.default.check_root()
    }

    pub fn do_cmd_sync(&self, command: &str) -> String {
        self.default.do_cmd_sync(command)
    }

    pub fn try_exit(&self) {
        self.default.try_exit();
    }
}

impl CommandExecutor for ShellRegistry {
    fn do_cmd_sync(&self, command: &str) -> String {
        ShellRegistry::do_cmd_sync(self, command)
    }
}
