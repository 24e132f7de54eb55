use std::fs;

use distributed_dispatch::runtime::errors::{DispatchError, ErrorPayload, FrameError};
use distributed_dispatch::run_target;
use distributed_dispatch::util::config::{load_config, ConfigError};
use distributed_dispatch::util::logger::LogLevel;

#[test]
fn test_frame_limit_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[arena]\nmax_live_frames = 2\ntrace_events = true\n\n[log]\nlevel = \"warn\"\n",
    )
    .unwrap();

    let config = load_config(Some(path.as_path())).unwrap();
    assert_eq!(config.arena.max_live_frames, Some(2));
    assert_eq!(config.log.level, LogLevel::Warn);

    // Caller plus intermediate frame fill the limit
    let error = run_target("echo", "[1]", &config).unwrap_err();
    let payload = error.downcast_ref::<ErrorPayload>().unwrap();
    assert!(matches!(
        payload.downcast_ref::<DispatchError>(),
        Some(DispatchError::FrameExhausted {
            source: FrameError::Exhausted { limit: 2 },
            ..
        })
    ));
}

#[test]
fn test_invalid_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[arena]\nmax_live_frames = \"many\"\n").unwrap();

    assert!(matches!(load_config(Some(path.as_path())), Err(ConfigError::Parse(_))));
}
