use distributed_dispatch::builtins::BuiltinError;
use distributed_dispatch::runtime::errors::{DispatchError, ErrorPayload};
use distributed_dispatch::runtime::value::Value;
use distributed_dispatch::run_target;
use distributed_dispatch::util::config::BridgeConfig;

fn payload_of(error: &anyhow::Error) -> &ErrorPayload {
    error
        .downcast_ref::<ErrorPayload>()
        .expect("error carries the payload the caller was resumed with")
}

#[test]
fn test_echo_returns_42() {
    let value = run_target("echo", "[42]", &BridgeConfig::default()).unwrap();
    assert_eq!(value, Value::Int(42));
}

#[test]
fn test_missing_target_is_not_found() {
    let error = run_target("missing", "[]", &BridgeConfig::default()).unwrap_err();
    assert!(matches!(
        payload_of(&error).downcast_ref::<DispatchError>(),
        Some(DispatchError::TargetNotFound { name }) if name == "missing"
    ));
}

#[test]
fn test_faulty_reports_code_7() {
    let error = run_target("faulty", "[]", &BridgeConfig::default()).unwrap_err();
    assert!(matches!(
        payload_of(&error).downcast_ref::<BuiltinError>(),
        Some(BuiltinError::Code(7))
    ));
}

#[test]
fn test_suspend_twice_completes() {
    let value = run_target("suspendTwice", r#"["later"]"#, &BridgeConfig::default()).unwrap();
    assert_eq!(value, Value::from("later"));
}

#[test]
fn test_add_and_countdown() {
    let config = BridgeConfig::default();
    assert_eq!(run_target("add", "[40, 2]", &config).unwrap(), Value::Int(42));
    assert_eq!(run_target("countdown", "[3]", &config).unwrap(), Value::Unit);
}

#[test]
fn test_bad_argument_json_is_rejected_before_dispatch() {
    let error = run_target("echo", "{", &BridgeConfig::default()).unwrap_err();
    assert!(error.to_string().contains("Failed to decode arguments"));
}
