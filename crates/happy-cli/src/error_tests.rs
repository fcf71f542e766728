use super::*;

#[yare::parameterized(
    unknown_method = {
        RpcError::UnknownMethod { method: "sid:bogus".to_string() },
        "unknown method: sid:bogus"
    },
    handler_failed = {
        RpcError::HandlerFailed { method: "permission".to_string(), detail: "timed out".to_string() },
        "handler for permission failed: timed out"
    },
)]
fn rpc_error_display(err: RpcError, expected: &str) {
    assert_eq!(err.to_string(), expected);
}

#[test]
fn startup_error_display() {
    assert_eq!(StartupError::MissingMachineId.to_string(), "machine id is missing");
}
