#![cfg(windows)]

use std::time::Duration;

use capsules_shell_exec::{ProcessExecutor, ProcessRunner};
use wards::PathSandbox;

#[tokio::test]
async fn quoted_paths_reach_the_program_intact() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = PathSandbox::new(dir.path()).unwrap();
    let file = dir.path().join("with space.txt");
    std::fs::write(&file, "quoted-ok").unwrap();

    let command = format!("type \"{}\"", file.display());
    let out = ProcessExecutor::new("cmd", 4096)
        .run(&command, &sandbox.root(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(out.exit_code, 0, "stderr: {}", out.stderr);
    assert!(out.stdout.contains("quoted-ok"));
}
