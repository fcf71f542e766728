use std::path::PathBuf;
use std::time::Duration;

use super::*;
use crate::child::launcher::ChildLauncher;
use crate::crypto::legacy::LegacyCipher;
use crate::crypto::Cipher;
use crate::queue::MessageQueue;
use crate::remote::client::RemoteClient;

fn test_cipher() -> std::sync::Arc<Cipher> {
    std::sync::Arc::new(Cipher::Legacy(LegacyCipher::new(&[7u8; 32]).unwrap()))
}

fn empty_transcripts_dir() -> PathBuf {
    // A directory that does not exist: the watcher treats this as "nothing
    // discovered yet" and simply waits on its poll interval until canceled.
    std::env::temp_dir().join(format!("happy-local-turn-test-{}", std::process::id()))
}

fn ctx<'a>(
    launcher: &'a ChildLauncher,
    remote: Arc<RemoteClient>,
    queue: Arc<MessageQueue>,
    dedup: &'a mut ScannerDedup,
    control_rx: broadcast::Receiver<ControlSignal>,
) -> LocalTurnCtx<'a> {
    LocalTurnCtx {
        launcher,
        transcripts_dir: empty_transcripts_dir(),
        resume_id: None,
        extra_args: &[],
        remote,
        queue,
        dedup,
        control_rx,
    }
}

#[tokio::test]
#[serial_test::serial]
async fn child_exit_ends_turn_with_terminate() {
    let launcher = ChildLauncher::new(PathBuf::from("true"), std::env::temp_dir());
    let (remote, _updates) = RemoteClient::new("sid-1", false, test_cipher());
    let remote = Arc::new(remote);
    let queue = Arc::new(MessageQueue::new());
    let mut dedup = ScannerDedup::new();
    let (_control_tx, control_rx) = broadcast::channel(8);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        run_local_turn(ctx(&launcher, remote, queue, &mut dedup, control_rx)),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(result.outcome, LocalTurnOutcome::Terminate);
}

#[tokio::test]
#[serial_test::serial]
async fn queued_message_switches_to_remote_before_child_finishes() {
    let launcher = ChildLauncher::new(PathBuf::from("sleep"), std::env::temp_dir());
    let (remote, _updates) = RemoteClient::new("sid-1", false, test_cipher());
    let remote = Arc::new(remote);
    let queue = Arc::new(MessageQueue::new());
    queue.push("hi".to_string(), "default".to_string(), None).await;
    let mut dedup = ScannerDedup::new();
    let (_control_tx, control_rx) = broadcast::channel(8);

    // `sleep` needs an argument; supply it through extra_args so the
    // spawned child does not exit immediately on its own.
    let extra = vec!["30".to_string()];
    let mut local_ctx = ctx(&launcher, remote, queue, &mut dedup, control_rx);
    local_ctx.extra_args = &extra;

    let result = tokio::time::timeout(Duration::from_secs(5), run_local_turn(local_ctx)).await.unwrap().unwrap();

    assert_eq!(result.outcome, LocalTurnOutcome::SwitchToRemote);
}

#[tokio::test]
#[serial_test::serial]
async fn switch_signal_ends_turn_and_terminates_child() {
    let launcher = ChildLauncher::new(PathBuf::from("sleep"), std::env::temp_dir());
    let (remote, _updates) = RemoteClient::new("sid-1", false, test_cipher());
    let remote = Arc::new(remote);
    let queue = Arc::new(MessageQueue::new());
    let mut dedup = ScannerDedup::new();
    let (control_tx, control_rx) = broadcast::channel(8);

    let extra = vec!["30".to_string()];
    let mut local_ctx = ctx(&launcher, remote, queue, &mut dedup, control_rx);
    local_ctx.extra_args = &extra;

    let run_fut = run_local_turn(local_ctx);
    let signal_fut = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = control_tx.send(ControlSignal::Switch);
    };

    let (result, _) =
        tokio::time::timeout(Duration::from_secs(6), async { tokio::join!(run_fut, signal_fut) }).await.unwrap();
    assert_eq!(result.unwrap().outcome, LocalTurnOutcome::SwitchToRemote);
}

#[tokio::test]
#[serial_test::serial]
async fn kill_signal_ends_turn_killed() {
    let launcher = ChildLauncher::new(PathBuf::from("sleep"), std::env::temp_dir());
    let (remote, _updates) = RemoteClient::new("sid-1", false, test_cipher());
    let remote = Arc::new(remote);
    let queue = Arc::new(MessageQueue::new());
    let mut dedup = ScannerDedup::new();
    let (control_tx, control_rx) = broadcast::channel(8);

    let extra = vec!["30".to_string()];
    let mut local_ctx = ctx(&launcher, remote, queue, &mut dedup, control_rx);
    local_ctx.extra_args = &extra;

    let run_fut = run_local_turn(local_ctx);
    let signal_fut = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = control_tx.send(ControlSignal::Kill);
    };

    let (result, _) =
        tokio::time::timeout(Duration::from_secs(6), async { tokio::join!(run_fut, signal_fut) }).await.unwrap();
    assert_eq!(result.unwrap().outcome, LocalTurnOutcome::Killed);
}
