//! Tests for `Workspace`: init, exec persistence, buffers and the snapshot file.

use std::fs;

use pretty_assertions::assert_eq;
use rlm::{ExecOptions, RlmError, StoreError, Workspace};
use tempfile::TempDir;

/// A workspace in a fresh temp dir whose context file holds `content`.
fn workspace_with(content: &str) -> (TempDir, Workspace) {
    let dir = TempDir::new().expect("tempdir");
    let context = dir.path().join("context.txt");
    fs::write(&context, content).expect("write context");
    let ws = Workspace::new(dir.path().join(".rlm").join("state.bin"));
    ws.init_from_file(&context, None).expect("init should succeed");
    (dir, ws)
}

fn exec(ws: &Workspace, code: &str) -> rlm::ExecReport {
    ws.exec(code, ExecOptions::default()).expect("exec should succeed")
}

// =============================================================================
// 1. init
// =============================================================================

#[test]
fn init_reports_char_count_and_creates_state() {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("ctx.txt");
    fs::write(&context, "héllo").unwrap();
    let state = dir.path().join("nested").join("state.bin");
    let ws = Workspace::new(&state);

    let report = ws.init_from_file(&context, None).unwrap();
    assert_eq!(report.chars, 5);
    assert!(state.exists());
    assert!(!dir.path().join("nested").join("state.bin.tmp").exists());

    let snapshot = ws.load().unwrap();
    assert_eq!(snapshot.context.content, "héllo");
    assert!(snapshot.buffers.is_empty());
    assert!(snapshot.globals.is_empty());
    assert!(snapshot.repo_index.is_none());
}

#[test]
fn init_honours_max_bytes() {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("ctx.txt");
    fs::write(&context, "abcdefghij").unwrap();
    let ws = Workspace::new(dir.path().join("state.bin"));

    let report = ws.init_from_file(&context, Some(4)).unwrap();
    assert_eq!(report.chars, 4);
    assert_eq!(ws.load().unwrap().context.content, "abcd");
}

#[test]
fn init_with_missing_context_file_fails() {
    let dir = TempDir::new().unwrap();
    let ws = Workspace::new(dir.path().join("state.bin"));
    let err = ws.init_from_file(&dir.path().join("nope.txt"), None).unwrap_err();
    assert!(matches!(err, RlmError::ContextFileMissing(_)), "{err:?}");
    assert!(err.to_string().starts_with("Context file does not exist:"), "{err}");
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn init_replaces_previous_state() {
    let (dir, ws) = workspace_with("first");
    exec(&ws, "x = 1\nadd_buffer('note')");

    let other = dir.path().join("other.txt");
    fs::write(&other, "second").unwrap();
    ws.init_from_file(&other, None).unwrap();

    let snapshot = ws.load().unwrap();
    assert_eq!(snapshot.context.content, "second");
    assert!(snapshot.buffers.is_empty());
    assert!(snapshot.globals.is_empty());
}

// =============================================================================
// 2. missing or broken state
// =============================================================================

#[test]
fn exec_without_state_is_a_fault() {
    let dir = TempDir::new().unwrap();
    let ws = Workspace::new(dir.path().join("state.bin"));
    let err = ws.exec("print(1)", ExecOptions::default()).unwrap_err();
    assert!(matches!(err, RlmError::Store(StoreError::Missing(_))), "{err:?}");
    assert!(err.to_string().starts_with("No state found at "), "{err}");
    assert!(err.to_string().ends_with("Run: rlm init <context_path>"), "{err}");
}

#[test]
fn corrupt_state_is_reported() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.bin");
    fs::write(&state, [0xff, 0xff, 0xff, 0xff, 0xff]).unwrap();
    let ws = Workspace::new(&state);
    let err = ws.status(false).unwrap_err();
    assert!(matches!(err, RlmError::Store(StoreError::Corrupt { .. })), "{err:?}");
}

#[test]
fn reset_deletes_state_once() {
    let (_dir, ws) = workspace_with("text");
    assert!(ws.reset().unwrap());
    assert!(!ws.state_path().exists());
    assert!(!ws.reset().unwrap());
}

// =============================================================================
// 3. exec persistence
// =============================================================================

#[test]
fn variables_persist_between_execs() {
    let (_dir, ws) = workspace_with("hello world");
    let first = exec(&ws, "x = 41\nnames = ['a', 'b']\nmeta = {'k': (1, 2)}");
    assert_eq!(first.stdout, "");
    assert_eq!(first.stderr, "");

    let second = exec(&ws, "print(x + 1, names, meta['k'])");
    assert_eq!(second.stdout, "42 ['a', 'b'] (1, 2)\n");
}

#[test]
fn content_and_context_are_injected() {
    let (_dir, ws) = workspace_with("hello world");
    let report = exec(&ws, "print(len(content), context['content'][:5], peek(6, 11))");
    assert_eq!(report.stdout, "11 hello world\n");
}

#[test]
fn context_mutations_persist() {
    let (_dir, ws) = workspace_with("original");
    exec(&ws, "context['content'] = 'replaced text'\ncontext['note'] = 'kept'");
    let report = exec(&ws, "print(content)\nprint(context['note'])");
    assert_eq!(report.stdout, "replaced text\nkept\n");
    assert_eq!(ws.load().unwrap().context.content, "replaced text");
}

#[test]
fn buffers_accumulate_and_export() {
    let (dir, ws) = workspace_with("text");
    exec(&ws, "add_buffer('first')");
    exec(&ws, "add_buffer(2)\nbuffers.append('third')");

    let out = dir.path().join("out").join("buffers.txt");
    let count = ws.export_buffers(&out).unwrap();
    assert_eq!(count, 3);
    assert_eq!(fs::read_to_string(&out).unwrap(), "first\n\n2\n\nthird");
}

#[test]
fn export_with_no_buffers_writes_empty_file() {
    let (dir, ws) = workspace_with("text");
    let out = dir.path().join("empty.txt");
    assert_eq!(ws.export_buffers(&out).unwrap(), 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "");
}

#[test]
fn assigning_an_injected_name_does_not_persist_it() {
    let (_dir, ws) = workspace_with("abc");
    exec(&ws, "grep = 5\npeek = 'x'");
    assert!(ws.load().unwrap().globals.is_empty());
    let report = exec(&ws, "print(peek(0, 2))");
    assert_eq!(report.stdout, "ab\n");
}

// =============================================================================
// 4. faults and dropped variables
// =============================================================================

#[test]
fn fault_keeps_state_assigned_before_it() {
    let (_dir, ws) = workspace_with("text");
    let report = exec(&ws, "a = 1\nadd_buffer('before')\n1 / 0\nb = 2");
    assert!(report.stderr.contains("ZeroDivisionError"), "{}", report.stderr);
    assert!(report.stderr.starts_with("Traceback (most recent call last):"), "{}", report.stderr);

    let snapshot = ws.load().unwrap();
    assert!(snapshot.globals.contains_key("a"));
    assert!(!snapshot.globals.contains_key("b"));
    assert_eq!(snapshot.buffers, vec!["before".to_owned()]);
}

#[test]
fn unpersistable_values_are_dropped_and_reported() {
    let (dir, ws) = workspace_with("text");
    let path = dir.path().join("scratch.txt");
    let code = format!("import re\nkeep = 1\nfh = open({:?}, 'w')\npat = re.compile('a+')", path.display().to_string());
    let options = ExecOptions {
        warn_unpersistable: true,
        ..ExecOptions::default()
    };
    let report = ws.exec(&code, options).unwrap();
    assert_eq!(report.dropped, vec!["re".to_owned(), "fh".to_owned()]);
    assert_eq!(report.stderr, "Dropped unpersistable variables: re, fh\n");

    let snapshot = ws.load().unwrap();
    assert!(snapshot.globals.contains_key("keep"));
    assert!(snapshot.globals.contains_key("pat"));
    assert!(!snapshot.globals.contains_key("fh"));
}

#[test]
fn patterns_and_class_references_survive_between_execs() {
    let (_dir, ws) = workspace_with("text");
    let first = exec(
        &ws,
        "import re\npat = re.compile(r'a+', re.IGNORECASE)\nf = len\nfind = re.findall\nE = ValueError\nt = str\nnt = type(None)\ns = slice(1, None, 2)\ne = ...",
    );
    assert_eq!(first.dropped, vec!["re".to_owned()]);

    let second = exec(
        &ws,
        "print(pat.findall('aA b aa'), f('abc'), find(r'\\d', 'a1b2'))\ntry:\n    raise E('bad')\nexcept ValueError as err:\n    print('caught', err)\nprint(t(5) + 'x', nt is type(None), 'abcdef'[s], e is ...)",
    );
    assert_eq!(second.stderr, "");
    assert_eq!(second.stdout, "['aA', 'aa'] 3 ['1', '2']\ncaught bad\n5x True bdf True\n");
}

#[test]
fn user_functions_and_match_objects_are_still_dropped() {
    let (_dir, ws) = workspace_with("text");
    let report = exec(&ws, "import re\ndef g():\n    return 1\nm = re.match('a', 'abc')\nk = 2");
    assert_eq!(report.dropped, vec!["re".to_owned(), "g".to_owned(), "m".to_owned()]);
    assert!(ws.load().unwrap().globals.contains_key("k"));
}

#[test]
fn dropped_variables_are_silent_without_warning_flag() {
    let (_dir, ws) = workspace_with("text");
    let report = exec(&ws, "f = lambda x: x");
    assert_eq!(report.dropped, vec!["f".to_owned()]);
    assert_eq!(report.stderr, "");
}

#[test]
fn warning_follows_traceback() {
    let (_dir, ws) = workspace_with("text");
    let options = ExecOptions {
        warn_unpersistable: true,
        ..ExecOptions::default()
    };
    let report = ws.exec("f = lambda: 0\nraise KeyError('k')", options).unwrap();
    assert!(report.stderr.contains("KeyError"), "{}", report.stderr);
    assert!(
        report.stderr.ends_with("\n\nDropped unpersistable variables: f\n"),
        "{}",
        report.stderr
    );
}

#[test]
fn output_is_truncated() {
    let (_dir, ws) = workspace_with("text");
    let options = ExecOptions {
        max_output_chars: 5,
        ..ExecOptions::default()
    };
    let report = ws.exec("print('abcdefghij')", options).unwrap();
    assert_eq!(report.stdout, "abcde\n... [truncated to 5 chars] ...\n");
}

// =============================================================================
// 5. status
// =============================================================================

#[test]
fn status_lists_variables() {
    let (_dir, ws) = workspace_with("0123456789");
    exec(&ws, "zeta = 1\nalpha = 2\nadd_buffer('x')");
    let text = ws.status(true).unwrap().to_string();
    assert!(text.contains("  Mode: Single file\n"), "{text}");
    assert!(text.contains("  Context chars: 10\n"), "{text}");
    assert!(text.contains("  Buffers: 1\n"), "{text}");
    assert!(text.contains("  Persisted vars: 2\n"), "{text}");
    assert!(text.contains("    - alpha\n    - zeta\n"), "{text}");
}
