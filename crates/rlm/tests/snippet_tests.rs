//! Snippet-level behaviour: the helper functions and the interpreter subset they run in.

use std::fs;

use pretty_assertions::assert_eq;
use rlm::{CapturedOutput, ExcType, ExecOptions, Namespace, SnippetError, Workspace, execute};
use tempfile::TempDir;

/// Runs `code` in a fresh namespace and returns stdout, panicking on an uncaught exception.
fn run_ok(code: &str) -> String {
    let mut namespace = Namespace::new();
    let mut output = CapturedOutput::new();
    if let Err(err) = execute(code, &mut namespace, &mut output) {
        panic!("snippet failed: {}", err.render(code));
    }
    output.into_output().0
}

/// Runs `code` and returns the exception type it raised.
fn run_err(code: &str) -> ExcType {
    let mut namespace = Namespace::new();
    let mut output = CapturedOutput::new();
    match execute(code, &mut namespace, &mut output).expect_err("snippet should fail") {
        SnippetError::Run(err) => err.exc.exc_type,
        SnippetError::Parse(err) => panic!("unexpected parse error: {err}"),
    }
}

fn workspace_with(content: &str) -> (TempDir, Workspace) {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("context.txt");
    fs::write(&context, content).unwrap();
    let ws = Workspace::new(dir.path().join("state.bin"));
    ws.init_from_file(&context, None).unwrap();
    (dir, ws)
}

fn exec_stdout(ws: &Workspace, code: &str) -> String {
    let report = ws.exec(code, ExecOptions::default()).unwrap();
    assert_eq!(report.stderr, "", "unexpected stderr for {code:?}");
    report.stdout
}

// =============================================================================
// 1. helpers
// =============================================================================

#[test]
fn grep_returns_match_span_and_snippet() {
    let (_dir, ws) = workspace_with("xxTODOyy and TODO again");
    let out = exec_stdout(
        &ws,
        "hits = grep('TODO', window=2)\nfor h in hits:\n    print(h['match'], h['span'], h['snippet'])",
    );
    assert_eq!(out, "TODO (2, 6) xxTODOyy\nTODO (13, 17) d TODO a\n");
}

#[test]
fn grep_honours_max_matches_and_flags() {
    let (_dir, ws) = workspace_with("a A a A a");
    let out = exec_stdout(
        &ws,
        "import re\nprint(len(grep('a', max_matches=2)))\nprint(len(grep('a', flags=re.IGNORECASE)))\nprint(len(grep('a', max_matches=0)))",
    );
    assert_eq!(out, "2\n5\n0\n");
}

#[test]
fn pattern_search_is_grep() {
    let (_dir, ws) = workspace_with("one two three");
    let out = exec_stdout(&ws, "print([h['span'] for h in pattern_search(r't\\w+', window=0)])");
    assert_eq!(out, "[(4, 7), (8, 13)]\n");
}

#[test]
fn grep_accepts_compiled_patterns() {
    let (_dir, ws) = workspace_with("id=12 id=345");
    let out = exec_stdout(
        &ws,
        "import re\np = re.compile(r'\\d+')\nprint([h['match'] for h in grep(p, window=0)])\ndel p",
    );
    assert_eq!(out, "['12', '345']\n");
}

#[test]
fn invalid_pattern_is_a_snippet_error() {
    let (_dir, ws) = workspace_with("text");
    let report = ws.exec("grep('(')", ExecOptions::default()).unwrap();
    assert!(report.stderr.contains("Traceback"), "{}", report.stderr);
    assert_eq!(report.stdout, "");
}

#[test]
fn peek_uses_slice_semantics() {
    let (_dir, ws) = workspace_with("0123456789");
    let out = exec_stdout(&ws, "print(peek())\nprint(peek(2, 5))\nprint(peek(-3, 100))\nprint(repr(peek(8, 2)))");
    assert_eq!(out, "0123456789\n234\n789\n''\n");
}

#[test]
fn chunk_indices_cover_content() {
    let (_dir, ws) = workspace_with("abcdefghij");
    let out = exec_stdout(&ws, "print(chunk_indices(size=4))\nprint(chunk_indices(size=4, overlap=1))");
    assert_eq!(out, "[(0, 4), (4, 8), (8, 10)]\n[(0, 4), (3, 7), (6, 10)]\n");
}

#[test]
fn chunk_indices_rejects_bad_arguments() {
    let (_dir, ws) = workspace_with("abc");
    for (code, message) in [
        ("chunk_indices(size=0)", "ValueError: size must be > 0"),
        ("chunk_indices(size=2, overlap=-1)", "ValueError: overlap must be >= 0"),
        ("chunk_indices(size=2, overlap=2)", "ValueError: overlap must be < size"),
    ] {
        let report = ws.exec(code, ExecOptions::default()).unwrap();
        assert!(report.stderr.contains(message), "{code}: {}", report.stderr);
    }
}

#[test]
fn write_chunks_writes_numbered_files() {
    let (dir, ws) = workspace_with("αβγδε");
    let out_dir = dir.path().join("chunks");
    let code = format!(
        "paths = write_chunks({:?}, size=2, prefix='part')\nprint(len(paths))",
        out_dir.display().to_string()
    );
    assert_eq!(exec_stdout(&ws, &code), "3\n");
    assert_eq!(fs::read_to_string(out_dir.join("part_0000.txt")).unwrap(), "αβ");
    assert_eq!(fs::read_to_string(out_dir.join("part_0001.txt")).unwrap(), "γδ");
    assert_eq!(fs::read_to_string(out_dir.join("part_0002.txt")).unwrap(), "ε");
}

#[test]
fn helpers_follow_context_edits() {
    let (_dir, ws) = workspace_with("old text");
    let out = exec_stdout(&ws, "context['content'] = 'new TODO'\nprint(peek(0, 3), len(grep('TODO')))");
    assert_eq!(out, "new 1\n");
}

#[test]
fn add_buffer_stringifies() {
    let (_dir, ws) = workspace_with("x");
    exec_stdout(&ws, "add_buffer([1, 2])\nadd_buffer('plain')");
    assert_eq!(ws.load().unwrap().buffers, vec!["[1, 2]".to_owned(), "plain".to_owned()]);
}

// =============================================================================
// 2. interpreter subset
// =============================================================================

#[test]
fn functions_loops_and_comprehensions() {
    let code = "
def fib(n):
    a, b = 0, 1
    for _ in range(n):
        a, b = b, a + b
    return a

total = 0
i = 0
while i < 5:
    total += i
    i += 1
print([fib(n) for n in range(8)], total)
print({k: v for k, v in zip('ab', [1, 2])})
";
    assert_eq!(run_ok(code), "[0, 1, 1, 2, 3, 5, 8, 13] 10\n{'a': 1, 'b': 2}\n");
}

#[test]
fn string_methods_and_fstrings() {
    let code = "
name = 'World'
words = 'a,b,,c'.split(',')
print(f'Hello {name}!', words, '-'.join(w.upper() for w in words if w))
print(f'{3.14159:.2f}', 'abc'.startswith('ab'), ' x '.strip())
";
    assert_eq!(run_ok(code), "Hello World! ['a', 'b', '', 'c'] A-B-C\n3.14 True x\n");
}

#[test]
fn exceptions_can_be_caught() {
    let code = "
try:
    {}['missing']
except KeyError as e:
    print('caught', e)
finally:
    print('done')
";
    assert_eq!(run_ok(code), "caught 'missing'\ndone\n");
}

#[test]
fn uncaught_errors_have_python_types() {
    assert_eq!(run_err("1 / 0"), ExcType::ZeroDivisionError);
    assert_eq!(run_err("[][0]"), ExcType::IndexError);
    assert_eq!(run_err("undefined_name"), ExcType::NameError);
    assert_eq!(run_err("'a' + 1"), ExcType::TypeError);
    assert_eq!(run_err("import numpy"), ExcType::ModuleNotFoundError);
}

#[test]
fn json_and_re_modules() {
    let code = r#"
import json, re
data = json.loads('{"a": [1, 2.5, null, true]}')
print(data['a'], json.dumps({'k': 'v'}))
print(re.findall(r'\d+', 'a1b22c333'), re.sub('o', '0', 'foo'))
"#;
    assert_eq!(run_ok(code), "[1, 2.5, None, True] {\"k\": \"v\"}\n['1', '22', '333'] f00\n");
}

#[test]
fn math_and_sys_modules() {
    let code = "
import math, sys
print(math.floor(2.7), math.sqrt(16), math.gcd(12, 18))
sys.stdout.write('raw\\n')
";
    assert_eq!(run_ok(code), "2 4.0 6\nraw\n");
}

#[test]
fn print_keywords_and_stderr() {
    let mut namespace = Namespace::new();
    let mut output = CapturedOutput::new();
    let code = "import sys\nprint('a', 'b', sep='-', end='!')\nprint('oops', file=sys.stderr)";
    execute(code, &mut namespace, &mut output).unwrap();
    let (stdout, stderr) = output.into_output();
    assert_eq!(stdout, "a-b!");
    assert_eq!(stderr, "oops\n");
}

#[test]
fn files_can_be_written_and_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("f.txt");
    let code = format!(
        "p = {:?}\nwith open(p, 'w') as fh:\n    fh.write('line1\\nline2\\n')\nwith open(p) as fh:\n    print(fh.read().splitlines())",
        path.display().to_string()
    );
    assert_eq!(run_ok(&code), "['line1', 'line2']\n");
}

#[test]
fn update_modes_are_refused_before_touching_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("f.txt");
    fs::write(&path, "keep").unwrap();
    for mode in ["r+", "w+", "a+", "x+", "rb+", "+r"] {
        let code = format!("open({:?}, {mode:?})", path.display().to_string());
        assert_eq!(run_err(&code), ExcType::ValueError, "{mode}");
    }
    assert_eq!(fs::read_to_string(&path).unwrap(), "keep");
    let code = format!("with open({:?}, 'rb') as fh:\n    print(fh.read())", path.display().to_string());
    assert_eq!(run_ok(&code), "b'keep'\n");
}

#[test]
fn deep_recursion_raises_recursion_error() {
    let (_dir, ws) = workspace_with("x");
    let report = ws
        .exec("def f(n):\n    return f(n + 1)\nf(0)", ExecOptions::default())
        .unwrap();
    assert!(report.stderr.contains("RecursionError"), "{}", report.stderr);
}

#[test]
fn comparing_self_referencing_lists_raises_recursion_error() {
    let (_dir, ws) = workspace_with("x");
    for expr in ["a == b", "a < b", "sorted([a, b])", "a in [b]", "[a].count(b)"] {
        let code = format!("a = []\na.append(a)\nb = []\nb.append(b)\nadd_buffer('before')\n{expr}");
        let report = ws.exec(&code, ExecOptions::default()).unwrap();
        assert!(
            report.stderr.contains("RecursionError: maximum recursion depth exceeded in comparison"),
            "{expr}: {}",
            report.stderr
        );
    }
    let snapshot = ws.load().unwrap();
    assert_eq!(snapshot.buffers.len(), 5);
    assert_eq!(run_ok("a = []\na.append(a)\nprint(a == a, a is a)"), "True True\n");
}
