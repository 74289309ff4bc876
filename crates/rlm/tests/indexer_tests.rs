//! Tests for `build_index` and `Workspace::init_repo`.

use std::{fs, path::Path, process::Command};

use pretty_assertions::assert_eq;
use rlm::{ExecOptions, IndexError, RlmError, Workspace, build_index};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

fn git(root: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .expect("git should run")
        .status;
    assert!(status.success(), "git {args:?} failed");
}

fn write_bytes(path: &Path, len: usize, byte: u8) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![byte; len]).unwrap();
}

// =============================================================================
// 1. git work trees
// =============================================================================

#[test]
fn git_repo_respects_ignore_rules() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    git(root, &["init", "-q"]);
    let info = root.join(".git").join("info");
    fs::create_dir_all(&info).unwrap();
    fs::write(info.join("exclude"), "*.log\n").unwrap();
    write_bytes(&root.join("a.py"), 40, b'x');
    write_bytes(&root.join("b.png"), 1000, 0);
    write_bytes(&root.join("c.log"), 10, b'l');

    let index = build_index(root, 10).unwrap();
    assert_eq!(index.total_files, 2);
    assert_eq!(index.total_size, 1040);
    assert_eq!(index.files.keys().collect::<Vec<_>>(), vec!["a.py", "b.png"]);
    assert_eq!(index.languages["Python"].count, 1);
    assert_eq!(index.languages["Python"].size, 40);

    let png = &index.files["b.png"];
    assert!(png.is_binary);
    assert_eq!(png.lang, "PNG Image");
    assert!(!index.files["a.py"].is_binary);
}

#[test]
fn git_repo_lists_tracked_files_in_subdirectories() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    git(root, &["init", "-q"]);
    write_bytes(&root.join("src").join("lib.rs"), 12, b'r');
    write_bytes(&root.join("with space.md"), 3, b'm');
    git(root, &["add", "src/lib.rs"]);

    let index = build_index(root, 10).unwrap();
    assert_eq!(
        index.files.keys().collect::<Vec<_>>(),
        vec!["src/lib.rs", "with space.md"]
    );
    assert_eq!(index.files["src/lib.rs"].lang, "Rust");
    assert_eq!(index.files["with space.md"].lang, "Markdown");
}

// =============================================================================
// 2. plain directories
// =============================================================================

#[test]
fn walk_skips_build_and_vendor_directories() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_bytes(&root.join("main.go"), 5, b'g');
    write_bytes(&root.join("node_modules").join("pkg").join("index.js"), 5, b'j');
    write_bytes(&root.join("target").join("out.rs"), 5, b'r');
    write_bytes(&root.join("__pycache__").join("m.pyc"), 5, 0);
    write_bytes(&root.join("docs").join("guide.txt"), 7, b't');

    let index = build_index(root, 10).unwrap();
    assert_eq!(index.files.keys().collect::<Vec<_>>(), vec!["docs/guide.txt", "main.go"]);
    assert_eq!(index.total_size, 12);
}

#[test]
fn large_files_are_flagged_not_skipped() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_bytes(&root.join("big.txt"), 1024 * 1024 + 1, b'a');
    write_bytes(&root.join("small.txt"), 10, b'a');

    let index = build_index(root, 1).unwrap();
    assert_eq!(index.total_files, 2);
    assert!(index.files["big.txt"].too_large);
    assert!(!index.files["small.txt"].too_large);
}

#[test]
fn empty_directory_gives_empty_index() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 10).unwrap();
    assert_eq!(index.total_files, 0);
    assert_eq!(index.total_size, 0);
    assert!(index.languages.is_empty());
}

#[test]
fn unknown_extensions_are_unknown_language() {
    let dir = TempDir::new().unwrap();
    write_bytes(&dir.path().join("data.zzz"), 4, b'z');
    write_bytes(&dir.path().join("README"), 4, b'r');
    write_bytes(&dir.path().join("Makefile"), 4, b'm');
    let index = build_index(dir.path(), 10).unwrap();
    assert_eq!(index.files["data.zzz"].lang, "Unknown");
    assert_eq!(index.files["Makefile"].lang, "Makefile");
    assert_eq!(index.languages["Unknown"].count, 2);
}

// =============================================================================
// 3. bad roots
// =============================================================================

#[test]
fn missing_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = build_index(&dir.path().join("missing"), 10).unwrap_err();
    assert!(matches!(err, IndexError::NotFound(_)), "{err:?}");
    assert!(err.to_string().starts_with("Repository path does not exist:"), "{err}");
}

#[test]
fn file_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("file.txt");
    fs::write(&file, "x").unwrap();
    let err = build_index(&file, 10).unwrap_err();
    assert!(matches!(err, IndexError::NotADirectory(_)), "{err:?}");
}

// =============================================================================
// 4. repository workspaces
// =============================================================================

#[test]
fn init_repo_exposes_index_to_snippets() {
    let repo = TempDir::new().unwrap();
    write_bytes(&repo.path().join("one.py"), 3, b'p');
    write_bytes(&repo.path().join("two.py"), 4, b'p');
    write_bytes(&repo.path().join("notes.md"), 5, b'm');

    let state = TempDir::new().unwrap();
    let ws = Workspace::new(state.path().join("state.bin"));
    let report = ws.init_repo(repo.path(), 10).unwrap();
    assert_eq!(report.total_files, 3);
    assert_eq!(report.languages[0].0, "Python");
    assert_eq!(report.languages[0].1.count, 2);

    let text = report.to_string();
    assert!(text.contains("  - 3 files indexed\n"), "{text}");
    assert!(text.contains("    • Python: 2 files (66.7%)\n"), "{text}");

    let out = ws
        .exec(
            "print(repo_index['total_files'], repo_index['languages']['Python']['count'])\nprint(len(content))\nprint(sorted(repo_index['files']))",
            ExecOptions::default(),
        )
        .unwrap();
    assert_eq!(out.stderr, "");
    assert_eq!(out.stdout, "3 2\n0\n['notes.md', 'one.py', 'two.py']\n");

    let status = ws.status(false).unwrap().to_string();
    assert!(status.contains("  Mode: Repository\n"), "{status}");
    assert!(status.contains("  Total files: 3\n"), "{status}");
}

#[test]
fn init_repo_on_missing_path_fails_with_fault_code() {
    let state = TempDir::new().unwrap();
    let ws = Workspace::new(state.path().join("state.bin"));
    let err = ws.init_repo(&state.path().join("nope"), 10).unwrap_err();
    assert!(matches!(err, RlmError::Index(IndexError::NotFound(_))), "{err:?}");
    assert_eq!(err.exit_code(), 2);
    assert!(!ws.state_path().exists());
}
