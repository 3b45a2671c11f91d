use std::process::{Command, Output};

fn pipesh(shell_prelude: &str, line: &str) -> Output {
    let script = format!("{shell_prelude} exec \"$0\" -c \"$1\"");
    Command::new("sh")
        .args(["-c", &script, env!("CARGO_BIN_EXE_pipesh"), line])
        .env_remove("PIPESH_LOG")
        .output()
        .expect("run pipesh")
}

#[test]
#[cfg(unix)]
fn pipe_exhaustion_launches_nothing() {
    let output = pipesh("ulimit -n 6;", "echo hi | cat | cat");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stderr.contains("cannot create pipe"), "{stderr}");
    assert_eq!(output.status.code(), Some(2));
    assert!(!stdout.contains("hi"), "{stdout}");
}

#[test]
fn exit_status_of_the_last_stage_is_returned() {
    let output = pipesh("", "true | false");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_variable_is_reported_once() {
    let output = pipesh("", "true $PIPESH_TEST_NEVER_SET");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stderr.matches("PIPESH_TEST_NEVER_SET").count(),
        1,
        "{stderr}"
    );
}
