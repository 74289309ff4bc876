//! Runs snippets against a snapshot and decides what survives.

use std::{any::Any, io, thread};

use indexmap::IndexMap;

use crate::{
    environment::{self, BUFFERS, CONTEXT, Environment, InjectedNames},
    io::CapturedOutput,
    namespace::Namespace,
    persist::Persist,
    run::execute as execute_snippet,
    snapshot::{Context, Snapshot},
    value::Value,
};

/// Stack reserved for the evaluator thread; deep recursion in snippets needs more than the default.
const EXECUTOR_STACK_SIZE: usize = 256 * 1024 * 1024;

/// What a run printed and which variables could not be kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Names dropped from persistence, in namespace order.
    pub dropped: Vec<String>,
}

/// Runs `code` against `namespace`, returning everything it printed.
///
/// A failing snippet is not an error here: its traceback is appended to the captured stderr and
/// whatever it assigned before failing stays in the namespace.
pub fn run(code: &str, namespace: &mut Namespace) -> (String, String) {
    let mut output = CapturedOutput::new();
    if let Err(err) = execute_snippet(code, namespace, &mut output) {
        tracing::debug!(error = %err, "snippet raised");
        let rendered = err.render(code);
        let (stdout, mut stderr) = output.into_output();
        stderr.push_str(&rendered);
        return (stdout, stderr);
    }
    output.into_output()
}

/// Writes the environment's context, buffers and persistable variables back into `snapshot`.
///
/// Returns the names of variables that were dropped because they cannot be persisted.
pub fn pull_back(snapshot: &mut Snapshot, env: &Environment, names: &InjectedNames) -> Vec<String> {
    if let Some(Value::Dict(dict)) = env.namespace.get(CONTEXT) {
        match Context::from_dict(dict, &snapshot.context) {
            Some(context) => snapshot.context = context,
            None => tracing::debug!("context lost its 'content', keeping the previous context"),
        }
    }
    if let Some(Value::List(list)) = env.namespace.get(BUFFERS) {
        snapshot.buffers = list.borrow().iter().map(Value::py_str).collect();
    }

    let mut globals = IndexMap::new();
    let mut dropped = Vec::new();
    for (name, value) in env.namespace.iter() {
        if names.contains(name) {
            continue;
        }
        match value.persist() {
            Ok(stored) => {
                globals.insert(name.clone(), stored);
            }
            Err(err) => {
                tracing::debug!(name = %name, error = %err, "dropping variable");
                dropped.push(name.clone());
            }
        }
    }
    snapshot.globals = globals;
    dropped
}

/// Builds the environment for `snapshot`, runs `code` and returns the updated snapshot.
///
/// Evaluation happens on a dedicated thread with a large stack. If the evaluator itself panics the
/// snapshot comes back unchanged and the panic is reported on stderr.
pub fn execute(snapshot: Snapshot, code: String, names: &InjectedNames) -> io::Result<(Snapshot, ExecOutcome)> {
    let original = snapshot.clone();
    let names = names.clone();
    let handle = thread::Builder::new()
        .name("rlm-exec".to_owned())
        .stack_size(EXECUTOR_STACK_SIZE)
        .spawn(move || {
            let mut snapshot = snapshot;
            let mut env = environment::build(&snapshot, &names);
            let (stdout, stderr) = run(&code, &mut env.namespace);
            let dropped = pull_back(&mut snapshot, &env, &names);
            (snapshot, ExecOutcome { stdout, stderr, dropped })
        })?;
    match handle.join() {
        Ok(result) => Ok(result),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(%message, "evaluator panicked");
            let outcome = ExecOutcome {
                stderr: format!("internal error: evaluator panicked: {message}\n"),
                ..ExecOutcome::default()
            };
            Ok((original, outcome))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn run_captures_output_and_tracebacks() {
        let mut namespace = Namespace::new();
        let (stdout, stderr) = run("x = 1\nprint('hi', x)\nraise ValueError('boom')\ny = 2", &mut namespace);
        assert_eq!(stdout, "hi 1\n");
        assert_eq!(
            stderr,
            "Traceback (most recent call last):\n  File \"<snippet>\", line 3, in <module>\n    raise ValueError('boom')\nValueError: boom\n"
        );
        assert!(namespace.contains("x"));
        assert!(!namespace.contains("y"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let mut namespace = Namespace::new();
        let (stdout, stderr) = run("x = (", &mut namespace);
        assert_eq!(stdout, "");
        assert!(stderr.contains("SyntaxError"), "{stderr}");
    }
}
