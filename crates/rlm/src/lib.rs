#![doc = include_str!("../../../README.md")]

mod args;
mod builtins;
mod exception;
mod expressions;
mod fstring;
mod function;
mod io;
mod modules;
mod namespace;
mod ops;
mod parse;
mod run;
mod types;
mod value;

pub mod environment;
pub mod executor;
pub mod helpers;
pub mod logging;
pub mod persist;
pub mod repo_index;
pub mod snapshot;
pub mod store;
pub mod workspace;

pub use crate::{
    environment::{Environment, InjectedNames},
    exception::{ExcType, ExceptionValue, RunError, RunResult, TraceFrame},
    executor::ExecOutcome,
    helpers::{HelperError, HelperKind, SearchHit, TextHelpers},
    io::{CapturedOutput, NoPrint, PrintWriter},
    namespace::Namespace,
    parse::ParseError,
    persist::{MAX_PERSIST_DEPTH, Persist, PersistError, StoredValue},
    repo_index::{FileRecord, IndexError, LanguageStats, RepoIndex, build_index},
    run::{MAX_CALL_DEPTH, SnippetError, execute},
    snapshot::{Context, SNAPSHOT_VERSION, Snapshot},
    store::{DEFAULT_STATE_PATH, StoreError},
    value::Value,
    workspace::{
        DEFAULT_MAX_OUTPUT_CHARS, ExecOptions, ExecReport, InitReport, RepoReport, RlmError, StatusReport, Workspace,
        truncate_output,
    },
};
