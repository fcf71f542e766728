use std::time::Duration;

use super::*;

#[test]
fn resume_args_empty_when_unknown() {
    assert!(resume_args(None).is_empty());
}

#[test]
fn resume_args_pairs_flag_with_id() {
    assert_eq!(resume_args(Some("abc-123")), vec!["--resume".to_string(), "abc-123".to_string()]);
}

#[test]
fn missing_binary_reports_install_instruction() {
    let launcher =
        ChildLauncher::new(PathBuf::from("definitely-not-a-real-binary-xyz"), std::env::temp_dir());
    let err = launcher.spawn(None, &[]).unwrap_err();
    assert!(err.to_string().contains("install"));
}

#[tokio::test]
#[serial_test::serial]
async fn spawn_runs_to_completion_and_reports_exit_code() {
    let launcher = ChildLauncher::new(PathBuf::from("true"), std::env::temp_dir());
    let mut handle = launcher.spawn(None, &[]).unwrap();
    let cancel = CancellationToken::new();
    let status = handle.run_until(&cancel).await.unwrap();
    assert_eq!(status.code, Some(0));
}

#[tokio::test]
#[serial_test::serial]
async fn cancellation_terminates_long_running_child() {
    let launcher = ChildLauncher::new(PathBuf::from("sleep"), std::env::temp_dir());
    let mut handle = launcher.spawn(None, &["30".to_string()]).unwrap();
    let cancel = CancellationToken::new();
    let cancel_trigger = cancel.clone();

    let waiter = tokio::spawn(async move { handle.run_until(&cancel).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel_trigger.cancel();

    let status = tokio::time::timeout(Duration::from_secs(6), waiter).await.unwrap().unwrap().unwrap();
    assert!(status.code.is_some() || status.signal.is_some());
}

#[tokio::test]
#[serial_test::serial]
async fn terminate_kills_unresponsive_child_within_grace() {
    let launcher = ChildLauncher::new(PathBuf::from("sleep"), std::env::temp_dir());
    let mut handle = launcher.spawn(None, &["30".to_string()]).unwrap();

    let status = tokio::time::timeout(Duration::from_secs(6), handle.terminate()).await.unwrap().unwrap();
    assert!(status.code.is_some() || status.signal.is_some());
}
