use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gpm_core::command::{CommandOutput, Invocation, MockCommandRunner};
use gpm_core::config::ProviderKind;
use gpm_core::repository::{AuthStrategy, GitRepositoryProvider, RepositoryProvider};
use gpm_core::version::Version;
use gpm_core::GpmError;
use mockall::Sequence;
use tempfile::tempdir;

fn provider(kind: ProviderKind, runner: MockCommandRunner) -> GitRepositoryProvider {
    GitRepositoryProvider::new(
        AuthStrategy::for_provider(kind, "github.com"),
        Arc::new(runner),
    )
}

fn expect_git(runner: &mut MockCommandRunner, seq: &mut Sequence, args: &'static [&'static str]) {
    runner
        .expect_run()
        .times(1)
        .in_sequence(seq)
        .withf(move |invocation: &Invocation| invocation.program == "git" && invocation.args == args)
        .returning(|_| Ok(CommandOutput::succeeded("")));
}

#[test]
fn test_repo_url_per_provider() {
    struct TestCase {
        name: &'static str,
        kind: ProviderKind,
        token: Option<&'static str>,
        expected: &'static str,
    }

    let test_cases = vec![
        TestCase {
            name: "ssh ignores the token",
            kind: ProviderKind::GitHub,
            token: Some("s3cr3t"),
            expected: "git@github.com:gpm-project/grpc-agenda-go.git",
        },
        TestCase {
            name: "https without token",
            kind: ProviderKind::GitHubAction,
            token: None,
            expected: "https://github.com/gpm-project/grpc-agenda-go.git",
        },
        TestCase {
            name: "https with token",
            kind: ProviderKind::GitHubAction,
            token: Some("s3cr3t"),
            expected: "https://s3cr3t@github.com/gpm-project/grpc-agenda-go.git",
        },
    ];

    for tc in test_cases {
        let mut provider = provider(tc.kind, MockCommandRunner::new());
        provider
            .configure_pusher(None, None, tc.token.map(str::to_string))
            .unwrap();
        let url = provider.repo_url("gpm-project", "grpc-agenda-go").unwrap();
        assert_eq!(url, tc.expected, "{}", tc.name);
    }
}

#[tokio::test]
async fn test_last_version_reads_latest_tag() {
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .withf(|invocation: &Invocation| {
            invocation.args == ["describe", "--abbrev=0", "--tags"]
                && invocation.working_dir == Some(PathBuf::from("/tmp/gpm/grpc-agenda-go"))
        })
        .returning(|_| Ok(CommandOutput::succeeded("v1.3.0\n")));

    let version = provider(ProviderKind::GitHub, runner)
        .last_version(Path::new("/tmp/gpm/grpc-agenda-go"))
        .await
        .unwrap();
    assert_eq!(version, Version::new(1, 3, 0));
}

#[tokio::test]
async fn test_last_version_without_tags_is_empty() {
    let mut runner = MockCommandRunner::new();
    runner.expect_run().returning(|_| {
        Ok(CommandOutput::failed(
            "exit status: 128",
            "fatal: No names found, cannot describe anything.\n",
        ))
    });

    let version = provider(ProviderKind::GitHub, runner)
        .last_version(Path::new("/tmp/gpm/grpc-agenda-go"))
        .await
        .unwrap();
    assert_eq!(version, Version::empty());
}

#[tokio::test]
async fn test_last_version_other_failures_are_errors() {
    let mut runner = MockCommandRunner::new();
    runner.expect_run().returning(|_| {
        Ok(CommandOutput::failed(
            "exit status: 128",
            "fatal: not a git repository\n",
        ))
    });

    let err = provider(ProviderKind::GitHub, runner)
        .last_version(Path::new("/tmp/gpm/grpc-agenda-go"))
        .await
        .unwrap_err();
    assert!(matches!(err, GpmError::CommandFailed { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_last_version_rejects_non_semantic_tag() {
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .returning(|_| Ok(CommandOutput::succeeded("release-2021\n")));

    let err = provider(ProviderKind::GitHub, runner)
        .last_version(Path::new("/tmp/gpm/grpc-agenda-go"))
        .await
        .unwrap_err();
    assert!(matches!(err, GpmError::Version { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_publish_over_ssh_uses_global_identity() {
    let mut runner = MockCommandRunner::new();
    let mut seq = Sequence::new();
    expect_git(&mut runner, &mut seq, &["add", "-A"]);
    expect_git(&mut runner, &mut seq, &["commit", "-a", "-m", "gpm automatic publish"]);
    expect_git(&mut runner, &mut seq, &["push"]);
    expect_git(
        &mut runner,
        &mut seq,
        &["tag", "-a", "v1.4.0", "-m", "new version v1.4.0 generated by GPM"],
    );
    expect_git(&mut runner, &mut seq, &["push", "origin", "--tags"]);

    let mut provider = provider(ProviderKind::GitHub, runner);
    provider
        .configure_pusher(Some("gpm-bot".into()), Some("bot@gpm.dev".into()), None)
        .unwrap();
    provider
        .publish(Path::new("/tmp/gpm/grpc-agenda-go"), Version::new(1, 4, 0))
        .await
        .expect("publish should succeed");
}

#[tokio::test]
async fn test_publish_over_https_sets_local_identity_first() {
    let mut runner = MockCommandRunner::new();
    let mut seq = Sequence::new();
    expect_git(&mut runner, &mut seq, &["config", "user.name", "gpm-bot"]);
    expect_git(&mut runner, &mut seq, &["config", "user.email", "bot@gpm.dev"]);
    expect_git(&mut runner, &mut seq, &["add", "-A"]);
    expect_git(&mut runner, &mut seq, &["commit", "-a", "-m", "gpm automatic publish"]);
    expect_git(&mut runner, &mut seq, &["push"]);
    expect_git(
        &mut runner,
        &mut seq,
        &["tag", "-a", "v0.1.0", "-m", "new version v0.1.0 generated by GPM"],
    );
    expect_git(&mut runner, &mut seq, &["push", "origin", "--tags"]);

    let mut provider = provider(ProviderKind::GitHubAction, runner);
    provider
        .configure_pusher(
            Some("gpm-bot".into()),
            Some("bot@gpm.dev".into()),
            Some("s3cr3t".into()),
        )
        .unwrap();
    provider
        .publish(
            Path::new("/tmp/gpm/grpc-agenda-go"),
            Version::empty().increment_minor().unwrap(),
        )
        .await
        .expect("publish should succeed");
}

#[tokio::test]
async fn test_publish_stops_at_first_failure() {
    let calls: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
    let recorded = Arc::clone(&calls);
    let mut runner = MockCommandRunner::new();
    runner.expect_run().returning(move |invocation: Invocation| {
        recorded.lock().unwrap().push(invocation.args.clone());
        if invocation.args == ["push"] {
            return Ok(CommandOutput::failed(
                "exit status: 1",
                "! [rejected] main -> main (fetch first)\n",
            ));
        }
        Ok(CommandOutput::succeeded(""))
    });

    let err = provider(ProviderKind::GitHub, runner)
        .publish(Path::new("/tmp/gpm/grpc-agenda-go"), Version::new(1, 4, 0))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("rejected"), "got {err}");
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 3, "tagging must not happen: {calls:?}");
    assert_eq!(calls[2], ["push"]);
}

#[tokio::test]
async fn test_clone_replaces_previous_checkout() {
    let temp = tempdir().unwrap();
    let clone_path = temp.path().join("grpc-agenda-go");
    std::fs::create_dir_all(&clone_path).unwrap();
    std::fs::write(clone_path.join("stale.proto"), "message Stale {}\n").unwrap();

    let expected_target = clone_path.to_string_lossy().into_owned();
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .times(1)
        .withf(move |invocation: &Invocation| {
            invocation.args
                == [
                    "clone",
                    "git@github.com:gpm-project/grpc-agenda-go.git",
                    expected_target.as_str(),
                ]
        })
        .returning(|_| Ok(CommandOutput::succeeded("Cloning into 'grpc-agenda-go'...\n")));

    provider(ProviderKind::GitHub, runner)
        .clone_repository("git@github.com:gpm-project/grpc-agenda-go.git", &clone_path)
        .await
        .expect("clone should succeed");

    assert!(!clone_path.exists(), "previous checkout must be removed before cloning");
}

#[tokio::test]
async fn test_clone_failure_does_not_leak_token() {
    let temp = tempdir().unwrap();
    let mut runner = MockCommandRunner::new();
    runner.expect_run().returning(|invocation: Invocation| {
        Ok(CommandOutput::failed(
            "exit status: 128",
            format!("fatal: repository '{}' not found\n", invocation.args[1]),
        ))
    });

    let mut provider = provider(ProviderKind::GitHubAction, runner);
    provider
        .configure_pusher(None, None, Some("s3cr3t".into()))
        .unwrap();
    let url = provider.repo_url("gpm-project", "grpc-agenda-go").unwrap();
    let err = provider
        .clone_repository(&url, &temp.path().join("grpc-agenda-go"))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(!message.contains("s3cr3t"), "token leaked: {message}");
    assert!(message.contains("https://***@github.com/gpm-project/grpc-agenda-go.git"));
}
