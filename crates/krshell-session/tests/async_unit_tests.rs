mod common;

use common::TestFixtures;
use krshell_session::AsyncShellUnit;
use krshell_types::ShellEvent;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc::UnboundedReceiver;

fn collect_events(rx: &mut UnboundedReceiver<ShellEvent>) -> Vec<ShellEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_event_sequence() {
    let (mut unit, mut rx) = AsyncShellUnit::channel(TestFixtures::launcher(), false);
    let (done_tx, done_rx) = std::sync::mpsc::channel();

    unit.exec("echo hello").await;
    unit.exec("echo").await;
    unit.exec("echo oops >&2").await;
    let handle = unit
        .wait_for(Some(Box::new(move || {
            let _ = done_tx.send(());
        })))
        .expect("shell was running");
    handle.await.unwrap();

    assert!(done_rx.try_recv().is_ok());
    assert!(!unit.is_running());

    let events = collect_events(&mut rx);
    assert_eq!(events.first(), Some(&ShellEvent::Started(true)));
    assert_eq!(events.last(), Some(&ShellEvent::Exited(true)));
    assert!(events.contains(&ShellEvent::Output("hello".to_string())));
    assert!(events.contains(&ShellEvent::Error("oops".to_string())));
    assert!(!events.contains(&ShellEvent::Output(String::new())));
}

#[tokio::test]
async fn test_non_zero_exit() {
    let (mut unit, mut rx) = AsyncShellUnit::channel(TestFixtures::launcher(), false);
    assert!(unit.start());
    unit.exec("exit 3").await;

    unit.wait_for(None).expect("shell was running").await.unwrap();

    let events = collect_events(&mut rx);
    assert_eq!(events, vec![ShellEvent::Started(true), ShellEvent::Exited(false)]);
}

#[tokio::test]
async fn test_exec_after_destroy_restarts() {
    let (mut unit, mut rx) = AsyncShellUnit::channel(TestFixtures::launcher(), false);
    unit.start();
    unit.destroy();
    assert!(!unit.is_running());

    unit.exec("echo restarted").await;
    unit.wait_for(None).expect("shell was running").await.unwrap();

    let events = collect_events(&mut rx);
    assert_eq!(
        events,
        vec![
            ShellEvent::Started(true),
            ShellEvent::Started(true),
            ShellEvent::Output("restarted".to_string()),
            ShellEvent::Exited(true),
        ]
    );
}
