use super::*;

#[test]
fn create_mints_a_fresh_id_scoped_to_the_tag() {
    let a = HappySession::create("/tmp/project-a");
    let b = HappySession::create("/tmp/project-a");
    assert_ne!(a.id, b.id);
    assert_eq!(a.creation_tag, "/tmp/project-a");
}

#[test]
fn agent_state_moves_requests_from_pending_to_completed() {
    let mut state = AgentState::default();
    state.record_created("req-1".to_string(), "Write".to_string(), serde_json::json!({}));
    assert!(state.requests.contains_key("req-1"));
    assert!(!state.completed_requests.contains_key("req-1"));

    state.record_completed("req-1", CompletionStatus::Approved);
    assert!(!state.requests.contains_key("req-1"));
    let completed = state.completed_requests.get("req-1").unwrap();
    assert_eq!(completed.status, "approved");
}

#[test]
fn archive_is_terminal() {
    let mut state = AgentState::default();
    assert_eq!(state.lifecycle_state, LifecycleState::Active);
    state.archive();
    assert_eq!(state.lifecycle_state, LifecycleState::Archived);
}

#[test]
fn machine_metadata_detect_fills_in_platform_and_version() {
    let meta = MachineMetadata::detect("1.2.3");
    assert_eq!(meta.happy_cli_version, "1.2.3");
    assert_eq!(meta.platform, std::env::consts::OS);
    assert_eq!(meta.arch, std::env::consts::ARCH);
    assert!(!meta.host.is_empty());
}

#[test]
fn tracked_doc_round_trips_through_resync() {
    let mut tracked = TrackedDoc::new(AgentState::default()).unwrap();
    tracked.value.record_created("r".to_string(), "Edit".to_string(), serde_json::json!({"path": "x"}));
    tracked.doc.plaintext = serde_json::to_vec(&tracked.value).unwrap();
    tracked.doc.version = 1;

    tracked.resync().unwrap();
    assert!(tracked.value.requests.contains_key("r"));
    assert_eq!(tracked.doc.version, 1);
}
