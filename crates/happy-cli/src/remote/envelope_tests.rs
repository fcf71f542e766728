use super::*;

#[test]
fn outbound_session_event_round_trips_through_json() {
    let env = Outbound::SessionEvent {
        scope: "sid:abc".to_string(),
        event: "ready".to_string(),
        data: serde_json::json!({ "turn": 1 }),
    };
    let text = serde_json::to_string(&env).unwrap();
    assert!(text.contains("\"type\":\"session-event\""));

    let parsed: Outbound = serde_json::from_str(&text).unwrap();
    match parsed {
        Outbound::SessionEvent { event, .. } => assert_eq!(event, "ready"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn inbound_rpc_request_parses() {
    let raw = r#"{"type":"rpc-request","id":"r1","method":"sid:permission","params":"ZGF0YQ=="}"#;
    let parsed: Inbound = serde_json::from_str(raw).unwrap();
    match parsed {
        Inbound::RpcRequest { id, method, params } => {
            assert_eq!(id, "r1");
            assert_eq!(method, "sid:permission");
            assert_eq!(params.as_deref(), Some("ZGF0YQ=="));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn inbound_update_body_tags_are_distinguishable() {
    let raw = r#"{"type":"update","body":{"kind":"new-message","value":"ZGF0YQ=="}}"#;
    let parsed: Inbound = serde_json::from_str(raw).unwrap();
    match parsed {
        Inbound::Update { body: UpdateBody::NewMessage { value } } => assert_eq!(value, "ZGF0YQ=="),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn state_ack_distinguishes_success_from_mismatch() {
    let success = r#"{"field":"agent-state","result":"success","version":8,"ciphertext":null}"#;
    let parsed: StateAck = serde_json::from_str(success).unwrap();
    assert_eq!(parsed.result, AckResult::Success);

    let mismatch = r#"{"field":"agent-state","result":"version-mismatch","version":7,"ciphertext":"abc"}"#;
    let parsed: StateAck = serde_json::from_str(mismatch).unwrap();
    assert_eq!(parsed.result, AckResult::VersionMismatch);
    assert_eq!(parsed.ciphertext.as_deref(), Some("abc"));
}
