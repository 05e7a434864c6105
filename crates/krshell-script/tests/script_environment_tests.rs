mod common;

use std::fs;

use common::TestFixtures;
use krshell_script::PageContext;
use krshell_types::{ShellEvent, ShellOutput};
use pretty_assertions::assert_eq;

#[cfg(test)]
mod init_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_executor_is_rendered() {
        let fixtures = TestFixtures::new();
        let (environment, _registry) = fixtures.create_environment();

        assert!(!environment.is_rooted());
        let executor = environment.executor_path();
        assert_eq!(executor, fixtures.data_dir().join("kr-script/executor.sh"));

        let content = fs::read_to_string(executor).unwrap();
        assert!(!content.contains('\r'));
        assert!(content.contains("export ROOT_PERMISSION='false'"));
        assert!(content.contains("export DEVICE='test-device'"));
        assert!(content.contains(&format!("export EXECUTOR_PATH='{}'", executor.display())));
        assert!(content.contains(&format!(
            "export TOOLKIT='{}'",
            fixtures.data_dir().join("kr-script/toolkit").display()
        )));
    }

    #[test]
    fn test_toolkit_is_extracted() {
        let fixtures = TestFixtures::new();
        let (_environment, _registry) = fixtures.create_environment();
        assert_eq!(
            fs::read_to_string(fixtures.data_dir().join("kr-script/toolkit/busybox.sh")).unwrap(),
            "echo toolkit"
        );
    }

    #[test]
    fn test_missing_executor_fails() {
        let fixtures = TestFixtures::new();
        let mut config = fixtures.config();
        config.script.executor = "missing/executor.sh".into();

        let registry = krshell_session::ShellRegistry::from_config(&config);
        let result = krshell_script::ScriptEnvironment::init(&config, &registry, TestFixtures::translation());
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cache_script_reuses_file() {
        let fixtures = TestFixtures::new();
        let (environment, _registry) = fixtures.create_environment();

        let first = environment.cache_script("echo cached\r\n").unwrap();
        assert!(first.starts_with(fixtures.data_dir().join("kr-script/cache")));
        assert_eq!(
            fs::read_to_string(&first).unwrap(),
            "#!/system/bin/sh\n\necho cached\n"
        );

        let second = environment.cache_script("echo cached\r\n").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_asset_script() {
        let fixtures = TestFixtures::new();
        fixtures.create_asset("scripts/info.sh", "echo from-asset");
        let (environment, _registry) = fixtures.create_environment();

        let path = environment
            .resolve_script("file:///android_asset/scripts/info.sh")
            .unwrap();
        assert_eq!(path, fixtures.data_dir().join("scripts/info.sh"));
        assert_eq!(fs::read_to_string(path).unwrap(), "echo from-asset");
    }

    #[test]
    fn test_build_invocation() {
        let fixtures = TestFixtures::new();
        let (environment, _registry) = fixtures.create_environment();
        let script = fixtures.data_dir().join("x.sh");

        let invocation = environment.build_invocation(&script, Some(&PageContext::from_file("/sdcard/p.xml")));
        assert!(invocation.starts_with("\nexport PAGE_CONFIG_DIR='/sdcard'\n"));
        assert!(invocation.ends_with(&format!(
            "{} \"{}\"",
            environment.executor_path().display(),
            script.display()
        )));
    }
}

#[cfg(test)]
mod execution_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_execute_result() {
        let fixtures = TestFixtures::new();
        let (environment, _registry) = fixtures.create_environment();

        let output = environment
            .execute_result("echo \"$ROOT_PERMISSION\"\necho '@string:app_name'", None)
            .unwrap();
        assert_eq!(output, "false\nDemo");
    }

    #[test]
    fn test_execute_result_outputs_with_page() {
        let fixtures = TestFixtures::new();
        let (environment, _registry) = fixtures.create_environment();
        let page = PageContext::new("/sdcard/pages", "/sdcard/pages/main.xml");

        let outputs = environment
            .execute_result_outputs("echo \"$PAGE_WORK_FILE\"\necho '@img:/sdcard/a.png[(A)]'", Some(&page))
            .unwrap();
        assert_eq!(
            outputs,
            vec![
                ShellOutput::text("/sdcard/pages/main.xml"),
                ShellOutput::image("/sdcard/a.png", Some("A".to_string())),
            ]
        );
    }

    #[test]
    fn test_empty_script() {
        let fixtures = TestFixtures::new();
        let (environment, _registry) = fixtures.create_environment();
        assert!(environment.execute_result_outputs("", None).unwrap().is_empty());
        assert_eq!(environment.execute_result("", None).unwrap(), "");
    }
}

#[cfg(test)]
mod streaming_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_spawn_streaming() {
        let fixtures = TestFixtures::new();
        let (environment, _registry) = fixtures.create_environment();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut run = environment
            .spawn_streaming("echo streamed", None, tx)
            .await
            .unwrap();
        assert!(run.tag().starts_with("krshell_"));
        run.wait(None).expect("run was started").await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(events[0], ShellEvent::Started(true));
        assert_eq!(events[1], ShellEvent::Output("shell@android:".to_string()));
        assert_eq!(events[2], ShellEvent::Output("echo streamed".to_string()));
        assert!(events.contains(&ShellEvent::Output("streamed".to_string())));
        assert_eq!(events.last(), Some(&ShellEvent::Exited(true)));
    }

    #[tokio::test]
    async fn test_force_stop() {
        let fixtures = TestFixtures::new();
        let (environment, _registry) = fixtures.create_environment();
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut run = environment.spawn_streaming("sleep 30", None, tx).await.unwrap();
        let tag = run.tag().to_string();

        assert_eq!(run.force_stop(), format!("killed {}", tag));
        assert!(!run.is_running());
        assert!(run.wait(None).is_none());
    }
}
