use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gpm_core::command::{CommandOutput, Invocation, MockCommandRunner};
use gpm_core::config::GeneratorKind;
use gpm_core::generator::{Generator, ProtoGenerator, GENERATED_DIR};
use gpm_core::GpmError;
use tempfile::tempdir;

const IMAGE: &str = "namely/protoc-all:1.51_2";

fn project_with_agenda(root: &Path) {
    let agenda = root.join("agenda");
    fs::create_dir_all(&agenda).unwrap();
    fs::write(agenda.join("entities.proto"), "message Entry {}\n").unwrap();
    fs::write(agenda.join(".protolangs"), "go\n").unwrap();
}

#[test]
fn test_docker_invocation_mounts_project_root() {
    let generator = ProtoGenerator::new(
        GeneratorKind::Docker,
        IMAGE,
        Arc::new(MockCommandRunner::new()),
    );

    let invocation = generator.invocation(Path::new("/work/protos"), "agenda", "go");

    assert_eq!(invocation.program, "docker");
    assert_eq!(
        invocation.args,
        [
            "run",
            "--rm",
            "-v",
            "/work/protos:/defs",
            IMAGE,
            "-l",
            "go",
            "-d",
            "agenda",
            "-i",
            ".",
            "-o",
            "generated",
            "--with-gateway",
            "--with-validator",
        ]
    );
    assert_eq!(invocation.working_dir, None);
}

#[test]
fn test_dockerized_invocation_runs_entrypoint_in_project_root() {
    let generator = ProtoGenerator::new(
        GeneratorKind::Dockerized,
        IMAGE,
        Arc::new(MockCommandRunner::new()),
    );

    let invocation = generator.invocation(Path::new("/work/protos"), "agenda", "node");

    assert_eq!(invocation.program, "entrypoint.sh");
    assert_eq!(
        invocation.args,
        ["-l", "node", "-d", "agenda", "-i", ".", "-o", "generated"]
    );
    assert_eq!(invocation.working_dir, Some(PathBuf::from("/work/protos")));
}

#[tokio::test]
async fn test_generate_relocates_stubs_and_sources() {
    let project = tempdir().unwrap();
    let clone = tempdir().unwrap();
    project_with_agenda(project.path());

    let generated_root = project.path().join(GENERATED_DIR);
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .times(1)
        .withf(|invocation: &Invocation| {
            invocation.program == "docker" && invocation.args.contains(&"python".to_string())
        })
        .returning(move |_| {
            // Simulate protoc-all writing a nested output layout.
            let nested = generated_root.join("agenda");
            fs::create_dir_all(&nested).unwrap();
            fs::write(nested.join("entities_pb2.py"), "# generated\n").unwrap();
            fs::write(nested.join("entities_pb2_grpc.py"), "# generated\n").unwrap();
            Ok(CommandOutput::succeeded(""))
        });

    let generator = ProtoGenerator::new(GeneratorKind::Docker, IMAGE, Arc::new(runner));
    generator
        .generate(project.path(), "agenda", clone.path(), "python")
        .await
        .expect("generation should succeed");

    for name in ["entities_pb2.py", "entities_pb2_grpc.py", "entities.proto", ".protolangs"] {
        assert!(clone.path().join(name).exists(), "{name} should be in the clone");
    }
    assert!(
        !project.path().join(GENERATED_DIR).exists(),
        "generated tree must be removed"
    );
}

#[tokio::test]
async fn test_generate_failure_carries_tool_output() {
    let project = tempdir().unwrap();
    let clone = tempdir().unwrap();
    project_with_agenda(project.path());

    let mut runner = MockCommandRunner::new();
    runner.expect_run().times(1).returning(|_| {
        Ok(CommandOutput::failed(
            "exit status: 1",
            "agenda/entities.proto:3:1: Expected top-level statement\n",
        ))
    });

    let generator = ProtoGenerator::new(GeneratorKind::Docker, IMAGE, Arc::new(runner));
    let err = generator
        .generate(project.path(), "agenda", clone.path(), "go")
        .await
        .unwrap_err();

    match &err {
        GpmError::CommandFailed { command, output, .. } => {
            assert!(command.starts_with("docker run"), "command was {command}");
            assert!(output.contains("Expected top-level statement"));
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
    assert!(
        !clone.path().join("entities.proto").exists(),
        "nothing is copied after a failed generation"
    );
}

#[tokio::test]
async fn test_generate_without_output_is_an_error() {
    let project = tempdir().unwrap();
    let clone = tempdir().unwrap();
    project_with_agenda(project.path());

    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .returning(|_| Ok(CommandOutput::succeeded("")));

    let generator = ProtoGenerator::new(GeneratorKind::Docker, IMAGE, Arc::new(runner));
    let err = generator
        .generate(project.path(), "agenda", clone.path(), "go")
        .await
        .unwrap_err();

    assert!(matches!(err, GpmError::Io { .. }), "got {err:?}");
}
