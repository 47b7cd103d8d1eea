use std::time::{Duration, Instant};

use gpm_core::command::{CommandRunner, Invocation, SystemCommandRunner};
use gpm_core::GpmError;
use tempfile::tempdir;

#[tokio::test]
async fn test_output_is_stdout_followed_by_stderr() {
    let runner = SystemCommandRunner::new(None);
    let finished = runner
        .run(Invocation::new(
            "sh",
            ["-c", "echo err 1>&2; echo out"],
        ))
        .await
        .expect("sh should launch");

    assert!(finished.success);
    assert_eq!(finished.output, "out\nerr\n");
}

#[tokio::test]
async fn test_non_zero_exit_is_reported_not_raised() {
    let runner = SystemCommandRunner::new(None);
    let invocation = Invocation::new("sh", ["-c", "echo out; echo err 1>&2; exit 3"]);
    let finished = runner.run(invocation.clone()).await.expect("sh should launch");

    assert!(!finished.success);
    assert!(finished.status.contains('3'), "status was {}", finished.status);
    assert!(finished.output.contains("out") && finished.output.contains("err"));

    let err = finished.check(&invocation).unwrap_err();
    assert!(matches!(err, GpmError::CommandFailed { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_working_directory_is_applied() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("marker.proto"), "").unwrap();

    let runner = SystemCommandRunner::new(None);
    let finished = runner
        .run(Invocation::new("ls", Vec::<String>::new()).in_dir(dir.path()))
        .await
        .unwrap();

    assert!(finished.output.contains("marker.proto"), "got {}", finished.output);
}

#[tokio::test]
async fn test_missing_program_is_a_launch_error() {
    let runner = SystemCommandRunner::new(None);
    let err = runner
        .run(Invocation::new("gpm-no-such-program", ["--help"]))
        .await
        .unwrap_err();

    match err {
        GpmError::CommandLaunch { command, .. } => {
            assert_eq!(command, "gpm-no-such-program --help");
        }
        other => panic!("expected CommandLaunch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_command_times_out() {
    let runner = SystemCommandRunner::new(Some(Duration::from_millis(200)));
    let started = Instant::now();
    let err = runner
        .run(Invocation::new("sleep", ["5"]))
        .await
        .unwrap_err();

    assert!(
        started.elapsed() < Duration::from_secs(4),
        "the timeout must not wait for the child"
    );
    match err {
        GpmError::CommandTimeout { command, timeout } => {
            assert_eq!(command, "sleep 5");
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("expected CommandTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fast_command_finishes_within_timeout() {
    let runner = SystemCommandRunner::new(Some(Duration::from_secs(10)));
    let finished = runner.run(Invocation::new("true", Vec::<String>::new())).await.unwrap();
    assert!(finished.success);
}
