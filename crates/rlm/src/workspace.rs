//! Workspace-level operations behind each command.

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use crate::{
    environment::InjectedNames,
    executor,
    helpers::HelperError,
    repo_index::{self, IndexError, LanguageStats, RepoIndex},
    snapshot::{Context, Snapshot},
    store::{self, StoreError},
};

/// Character budget for each of stdout and stderr printed by `exec`.
pub const DEFAULT_MAX_OUTPUT_CHARS: i64 = 8000;

/// Exit status for a host-level fault.
pub const FAULT_EXIT_CODE: i32 = 2;

/// A fault that aborts the current command.
#[derive(Debug)]
pub enum RlmError {
    Store(StoreError),
    Index(IndexError),
    Helper(HelperError),
    ContextFileMissing(PathBuf),
    Io { path: PathBuf, source: io::Error },
}

impl RlmError {
    /// Process exit code for this fault.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        FAULT_EXIT_CODE
    }
}

impl fmt::Display for RlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(err) => err.fmt(f),
            Self::Index(err) => err.fmt(f),
            Self::Helper(err) => err.fmt(f),
            Self::ContextFileMissing(path) => write!(f, "Context file does not exist: {}", path.display()),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for RlmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Index(err) => Some(err),
            Self::Helper(err) => Some(err),
            Self::ContextFileMissing(_) => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<StoreError> for RlmError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<IndexError> for RlmError {
    fn from(err: IndexError) -> Self {
        Self::Index(err)
    }
}

impl From<HelperError> for RlmError {
    fn from(err: HelperError) -> Self {
        Self::Helper(err)
    }
}

/// Cuts `text` to `max_chars` characters, marking the cut. A non-positive budget prints nothing.
#[must_use]
pub fn truncate_output(text: &str, max_chars: i64) -> String {
    let Ok(max) = usize::try_from(max_chars) else {
        return String::new();
    };
    if max == 0 {
        return String::new();
    }
    match text.char_indices().nth(max) {
        None => text.to_owned(),
        Some((cut, _)) => format!("{}\n... [truncated to {max} chars] ...\n", &text[..cut]),
    }
}

/// `1234567` -> `1,234,567`
fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Result of `init`.
#[derive(Debug, Clone)]
pub struct InitReport {
    pub state_path: PathBuf,
    pub context_path: PathBuf,
    pub chars: usize,
}

impl fmt::Display for InitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Initialised RLM state at: {}", self.state_path.display())?;
        writeln!(
            f,
            "Loaded context: {} ({} chars)",
            self.context_path.display(),
            thousands(self.chars as u64)
        )
    }
}

/// Result of `init-repo`.
#[derive(Debug, Clone)]
pub struct RepoReport {
    pub state_path: PathBuf,
    pub repo_root: String,
    pub total_files: u64,
    pub total_size: u64,
    /// Up to five most common languages.
    pub languages: Vec<(String, LanguageStats)>,
}

impl fmt::Display for RepoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RLM initialized for repository: {}", self.repo_root)?;
        writeln!(f, "  - {} files indexed", thousands(self.total_files))?;
        writeln!(f, "  - Size: {:.1} MB", megabytes(self.total_size))?;
        if !self.languages.is_empty() {
            writeln!(f, "  - Primary languages:")?;
            for (lang, stats) in &self.languages {
                let pct = if self.total_files > 0 {
                    stats.count as f64 / self.total_files as f64 * 100.0
                } else {
                    0.0
                };
                writeln!(f, "    • {lang}: {} files ({pct:.1}%)", stats.count)?;
            }
        }
        writeln!(f, "  - State saved to: {}", self.state_path.display())
    }
}

/// Result of `status`.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub state_path: PathBuf,
    pub snapshot: Snapshot,
    pub show_vars: bool,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = &self.snapshot;
        writeln!(f, "RLM status")?;
        writeln!(f, "  State file: {}", self.state_path.display())?;
        writeln!(f, "  Context path: {}", snapshot.context.path)?;
        match &snapshot.repo_index {
            Some(index) => {
                writeln!(f, "  Mode: Repository")?;
                writeln!(f, "  Total files: {}", thousands(index.total_files))?;
                writeln!(f, "  Total size: {:.1} MB", megabytes(index.total_size))?;
                writeln!(f, "  Languages: {}", index.languages.len())?;
                if self.show_vars {
                    for (lang, stats) in index.top_languages(10) {
                        writeln!(f, "    - {lang}: {} files", stats.count)?;
                    }
                }
            }
            None => {
                writeln!(f, "  Mode: Single file")?;
                let chars = snapshot.context.content.chars().count();
                writeln!(f, "  Context chars: {}", thousands(chars as u64))?;
            }
        }
        writeln!(f, "  Buffers: {}", snapshot.buffers.len())?;
        writeln!(f, "  Persisted vars: {}", snapshot.globals.len())?;
        if self.show_vars && !snapshot.globals.is_empty() {
            writeln!(f, "  Variables:")?;
            let mut names: Vec<_> = snapshot.globals.keys().collect();
            names.sort();
            for name in names {
                writeln!(f, "    - {name}")?;
            }
        }
        Ok(())
    }
}

/// How `exec` reports.
#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    pub max_output_chars: i64,
    /// Append the names of dropped variables to stderr.
    pub warn_unpersistable: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            warn_unpersistable: false,
        }
    }
}

/// Output of `exec`, already truncated for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecReport {
    pub stdout: String,
    pub stderr: String,
    pub dropped: Vec<String>,
}

/// A workspace rooted at one snapshot file.
#[derive(Debug, Clone)]
pub struct Workspace {
    state_path: PathBuf,
    names: InjectedNames,
}

impl Workspace {
    #[must_use]
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            names: InjectedNames::standard(),
        }
    }

    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn load(&self) -> Result<Snapshot, RlmError> {
        Ok(store::load(&self.state_path)?)
    }

    /// Starts a fresh workspace over the text of `context_path`, reading at most `max_bytes`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn init_from_file(&self, context_path: &Path, max_bytes: Option<u64>) -> Result<InitReport, RlmError> {
        if !context_path.exists() {
            return Err(RlmError::ContextFileMissing(context_path.to_owned()));
        }
        let io_err = |source| RlmError::Io {
            path: context_path.to_owned(),
            source,
        };
        let file = File::open(context_path).map_err(io_err)?;
        let mut data = Vec::new();
        let read = match max_bytes {
            Some(max) => file.take(max).read_to_end(&mut data),
            None => BufReader::new(file).read_to_end(&mut data),
        };
        read.map_err(io_err)?;
        let content = match String::from_utf8(data) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        let chars = content.chars().count();
        let context = Context::new(context_path.to_string_lossy(), content);
        store::save(&Snapshot::new(context, None), &self.state_path)?;
        Ok(InitReport {
            state_path: self.state_path.clone(),
            context_path: context_path.to_owned(),
            chars,
        })
    }

    /// Starts a fresh workspace over an index of `repo_path`; the context content is empty.
    pub fn init_repo(&self, repo_path: &Path, max_file_size_mb: u64) -> Result<RepoReport, RlmError> {
        let index: RepoIndex = repo_index::build_index(repo_path, max_file_size_mb)?;
        let report = RepoReport {
            state_path: self.state_path.clone(),
            repo_root: index.repo_root.clone(),
            total_files: index.total_files,
            total_size: index.total_size,
            languages: index
                .top_languages(5)
                .into_iter()
                .map(|(name, stats)| (name.to_owned(), stats))
                .collect(),
        };
        let context = Context::new(index.repo_root.clone(), String::new());
        store::save(&Snapshot::new(context, Some(index)), &self.state_path)?;
        Ok(report)
    }

    pub fn status(&self, show_vars: bool) -> Result<StatusReport, RlmError> {
        Ok(StatusReport {
            state_path: self.state_path.clone(),
            snapshot: self.load()?,
            show_vars,
        })
    }

    /// Deletes the snapshot; `false` when there was none.
    pub fn reset(&self) -> Result<bool, RlmError> {
        Ok(store::remove(&self.state_path)?)
    }

    /// Writes all buffers to `out`, separated by blank lines, and returns how many were written.
    pub fn export_buffers(&self, out: &Path) -> Result<usize, RlmError> {
        let snapshot = self.load()?;
        let io_err = |path: &Path| {
            let path = path.to_owned();
            move |source| RlmError::Io { path, source }
        };
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(out, snapshot.buffers.join("\n\n")).map_err(io_err(out))?;
        Ok(snapshot.buffers.len())
    }

    /// Runs `code` against the workspace and saves the result.
    ///
    /// Faults inside the snippet show up in `stderr` only.
    pub fn exec(&self, code: &str, options: ExecOptions) -> Result<ExecReport, RlmError> {
        let snapshot = self.load()?;
        let (snapshot, outcome) =
            executor::execute(snapshot, code.to_owned(), &self.names).map_err(|source| RlmError::Io {
                path: self.state_path.clone(),
                source,
            })?;
        store::save(&snapshot, &self.state_path)?;

        let mut stderr = outcome.stderr;
        if options.warn_unpersistable && !outcome.dropped.is_empty() {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str("Dropped unpersistable variables: ");
            stderr.push_str(&outcome.dropped.join(", "));
            stderr.push('\n');
        }
        Ok(ExecReport {
            stdout: truncate_output(&outcome.stdout, options.max_output_chars),
            stderr: truncate_output(&stderr, options.max_output_chars),
            dropped: outcome.dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn truncation_marks_the_cut() {
        assert_eq!(truncate_output("abcdef", 3), "abc\n... [truncated to 3 chars] ...\n");
        assert_eq!(truncate_output("abc", 3), "abc");
        assert_eq!(truncate_output("ééé", 2), "éé\n... [truncated to 2 chars] ...\n");
        assert_eq!(truncate_output("abc", 0), "");
        assert_eq!(truncate_output("abc", -1), "");
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1_234_567), "1,234,567");
    }
}
