//! End-to-end tests of the `rlm` binary.

use std::{
    fs,
    io::Write,
    path::Path,
    process::{Command, Output, Stdio},
};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn rlm(state: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rlm"))
        .arg("--state")
        .arg(state)
        .args(args)
        .env_remove("RLM_STATE")
        .env_remove("RLM_LOG")
        .output()
        .expect("rlm should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Temp dir holding `ctx.txt` with `content`, already initialised.
fn initialised(content: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("ctx.txt");
    fs::write(&context, content).unwrap();
    let state = dir.path().join("state.bin");
    let out = rlm(&state, &["init", context.to_str().unwrap()]);
    assert!(out.status.success(), "{}", stderr(&out));
    (dir, state)
}

#[test]
fn init_prints_summary() {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("ctx.txt");
    fs::write(&context, "a".repeat(1500)).unwrap();
    let state = dir.path().join("state.bin");

    let out = rlm(&state, &["init", context.to_str().unwrap()]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.starts_with("Initialised RLM state at: "), "{text}");
    assert!(text.contains("(1,500 chars)"), "{text}");
    assert!(state.exists());
}

#[test]
fn exec_persists_between_invocations() {
    let (_dir, state) = initialised("hello");
    let first = rlm(&state, &["exec", "-c", "x = len(content)"]);
    assert!(first.status.success());
    assert_eq!(stdout(&first), "");

    let second = rlm(&state, &["exec", "-c", "print(x * 2)"]);
    assert_eq!(stdout(&second), "10\n");
    assert_eq!(stderr(&second), "");
}

#[test]
fn exec_reads_code_from_stdin() {
    let (_dir, state) = initialised("hello");
    let mut child = Command::new(env!("CARGO_BIN_EXE_rlm"))
        .arg("--state")
        .arg(&state)
        .arg("exec")
        .env_remove("RLM_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"for c in content[:2]:\n    print(c)\n")
        .unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success());
    assert_eq!(stdout(&out), "h\ne\n");
}

#[test]
fn snippet_errors_do_not_fail_the_process() {
    let (_dir, state) = initialised("hello");
    let out = rlm(&state, &["exec", "-c", "raise ValueError('bad')"]);
    assert!(out.status.success());
    assert!(stderr(&out).ends_with("ValueError: bad\n"), "{}", stderr(&out));
}

#[test]
fn missing_state_exits_with_fault_code() {
    let dir = TempDir::new().unwrap();
    let out = rlm(&dir.path().join("none.bin"), &["exec", "-c", "print(1)"]);
    assert_eq!(out.status.code(), Some(2));
    let err = stderr(&out);
    assert!(err.starts_with("ERROR: No state found at "), "{err}");
}

#[test]
fn missing_context_file_exits_with_fault_code() {
    let dir = TempDir::new().unwrap();
    let out = rlm(&dir.path().join("state.bin"), &["init", "/definitely/not/here.txt"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).starts_with("ERROR: Context file does not exist:"), "{}", stderr(&out));
}

#[test]
fn warn_unpersistable_and_legacy_alias() {
    let (_dir, state) = initialised("hello");
    for flag in ["--warn-unpersistable", "--warn-unpickleable"] {
        let out = rlm(&state, &["exec", flag, "-c", "f = lambda: 1"]);
        assert_eq!(stderr(&out), "Dropped unpersistable variables: f\n");
    }
}

#[test]
fn max_output_chars_truncates() {
    let (_dir, state) = initialised("hello");
    let out = rlm(&state, &["exec", "--max-output-chars", "3", "-c", "print('abcdef')"]);
    assert_eq!(stdout(&out), "abc\n... [truncated to 3 chars] ...\n");
    let out = rlm(&state, &["exec", "--max-output-chars", "-1", "-c", "print('abcdef')"]);
    assert_eq!(stdout(&out), "");
}

#[test]
fn status_export_and_reset() {
    let (dir, state) = initialised("hello");
    rlm(&state, &["exec", "-c", "add_buffer('one')\nadd_buffer('two')\nv = 1"]);

    let status = stdout(&rlm(&state, &["status", "--show-vars"]));
    assert!(status.contains("  Buffers: 2\n"), "{status}");
    assert!(status.contains("    - v\n"), "{status}");

    let out_file = dir.path().join("export").join("buffers.txt");
    let out = rlm(&state, &["export-buffers", out_file.to_str().unwrap()]);
    assert!(stdout(&out).starts_with("Wrote 2 buffers to: "), "{}", stdout(&out));
    assert_eq!(fs::read_to_string(&out_file).unwrap(), "one\n\ntwo");

    let out = rlm(&state, &["reset"]);
    assert!(stdout(&out).starts_with("Deleted state: "), "{}", stdout(&out));
    assert!(!state.exists());
    let out = rlm(&state, &["reset"]);
    assert!(out.status.success());
    assert!(stdout(&out).starts_with("No state to delete at: "), "{}", stdout(&out));
}

#[test]
fn init_repo_indexes_directory() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("main.rs"), "fn main() {}\n").unwrap();
    let state_dir = TempDir::new().unwrap();
    let state = state_dir.path().join("state.bin");

    let out = rlm(&state, &["init-repo", repo.path().to_str().unwrap()]);
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("  - 1 files indexed\n"), "{text}");
    assert!(text.contains("Next steps:"), "{text}");

    let out = rlm(&state, &["exec", "-c", "print(list(repo_index['files']))"]);
    assert_eq!(stdout(&out), "['main.rs']\n");
}

#[test]
fn state_path_from_environment() {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("ctx.txt");
    fs::write(&context, "x").unwrap();
    let state = dir.path().join("env-state.bin");
    let out = Command::new(env!("CARGO_BIN_EXE_rlm"))
        .args(["init", context.to_str().unwrap()])
        .env("RLM_STATE", &state)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(state.exists());
}
