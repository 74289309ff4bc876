//! Durable storage of the workspace snapshot.
//!
//! The snapshot lives in a single postcard-encoded file. Saves go through a `.tmp` sibling that is
//! renamed over the target, so an interrupted save never leaves a half-written snapshot behind.

use std::{
    ffi::OsString,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use crate::snapshot::{SNAPSHOT_VERSION, Snapshot};

/// Snapshot location used when neither `--state` nor `RLM_STATE` is given.
pub const DEFAULT_STATE_PATH: &str = ".rlm/state.bin";

/// Errors reading or writing the snapshot file.
#[derive(Debug)]
pub enum StoreError {
    /// No snapshot exists at the path.
    Missing(PathBuf),
    /// The file exists but does not hold a valid snapshot.
    Corrupt { path: PathBuf, reason: String },
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(path) => write!(
                f,
                "No state found at {}. Run: rlm init <context_path>",
                path.display()
            ),
            Self::Corrupt { path, reason } => write!(f, "Corrupt state file: {} ({reason})", path.display()),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_owned(),
        source,
    }
}

/// Reads the snapshot at `path`.
pub fn load(path: &Path) -> Result<Snapshot, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(StoreError::Missing(path.to_owned())),
        Err(err) => return Err(io_err(path)(err)),
    };
    let snapshot: Snapshot = postcard::from_bytes(&bytes).map_err(|err| StoreError::Corrupt {
        path: path.to_owned(),
        reason: err.to_string(),
    })?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::Corrupt {
            path: path.to_owned(),
            reason: format!("unsupported snapshot version {}", snapshot.version),
        });
    }
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded snapshot");
    Ok(snapshot)
}

/// `<path>.tmp`, next to the target.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(OsString::new, ToOwned::to_owned);
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically replaces the snapshot at `path`, creating parent directories as needed.
pub fn save(snapshot: &Snapshot, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let bytes = postcard::to_allocvec(snapshot).map_err(|err| StoreError::Corrupt {
        path: path.to_owned(),
        reason: format!("serialization failed: {err}"),
    })?;
    let tmp = temp_path(path);
    let written = fs::write(&tmp, &bytes)
        .map_err(io_err(&tmp))
        .and_then(|()| fs::rename(&tmp, path).map_err(io_err(path)));
    if let Err(err) = written {
        // the target is untouched; only the sibling needs cleaning up
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved snapshot");
    Ok(())
}

/// Deletes the snapshot; returns whether one existed.
pub fn remove(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path)(err)),
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        exception::{ExcType, ExceptionValue},
        persist::StoredValue,
        repo_index::{FileRecord, LanguageStats, RepoIndex},
        snapshot::Context,
    };

    fn full_snapshot() -> Snapshot {
        let mut files = IndexMap::new();
        files.insert(
            "src/main.rs".to_owned(),
            FileRecord {
                size: 12,
                is_binary: false,
                lang: "Rust".to_owned(),
                too_large: false,
                abs_path: "/repo/src/main.rs".to_owned(),
            },
        );
        files.insert(
            "logo.png".to_owned(),
            FileRecord {
                size: 2048,
                is_binary: true,
                lang: "PNG Image".to_owned(),
                too_large: true,
                abs_path: "/repo/logo.png".to_owned(),
            },
        );
        let mut languages = IndexMap::new();
        languages.insert("Rust".to_owned(), LanguageStats { count: 1, size: 12 });
        languages.insert("PNG Image".to_owned(), LanguageStats { count: 1, size: 2048 });
        let index = RepoIndex {
            repo_root: "/repo".to_owned(),
            indexed_at: 1_700_000_000.25,
            total_files: 2,
            total_size: 2060,
            files,
            languages,
        };

        let mut context = Context::new("/repo", "naïve café ✓".to_owned());
        context.extra.insert("note".to_owned(), StoredValue::Str("kept".to_owned()));
        context.extra.insert(
            "spans".to_owned(),
            StoredValue::List(vec![StoredValue::Tuple(vec![StoredValue::Int(0), StoredValue::Int(4)])]),
        );

        let mut snapshot = Snapshot::new(context, Some(index));
        snapshot.buffers = vec!["first".to_owned(), "ünïcode".to_owned()];
        let globals = [
            ("none", StoredValue::None),
            ("ellipsis", StoredValue::Ellipsis),
            ("flag", StoredValue::Bool(true)),
            ("count", StoredValue::Int(-42)),
            ("ratio", StoredValue::Float(0.125)),
            ("text", StoredValue::Str("héllo".to_owned())),
            ("raw", StoredValue::Bytes(vec![0, 159, 255])),
            (
                "nested",
                StoredValue::Dict(vec![
                    (
                        StoredValue::Tuple(vec![StoredValue::Int(1), StoredValue::Str("k".to_owned())]),
                        StoredValue::Set(vec![StoredValue::Int(3), StoredValue::Str("s".to_owned())]),
                    ),
                    (
                        StoredValue::Str("inner".to_owned()),
                        StoredValue::Dict(vec![(StoredValue::Bool(false), StoredValue::List(Vec::new()))]),
                    ),
                ]),
            ),
            ("span", StoredValue::Range { start: 10, stop: -2, step: -3 }),
            ("cut", StoredValue::Slice { lower: None, upper: Some(5), step: Some(2) }),
            (
                "err",
                StoredValue::Exception(ExceptionValue::new(ExcType::KeyError, "missing".to_owned())),
            ),
            ("pat", StoredValue::Pattern { source: r"\w+".to_owned(), flags: 2 }),
            ("f", StoredValue::Builtin("len".to_owned())),
            ("find", StoredValue::ModuleFunction("re.findall".to_owned())),
            ("E", StoredValue::ExcClass(ExcType::ValueError)),
            ("t", StoredValue::Type("NoneType".to_owned())),
        ];
        snapshot.globals = globals
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .collect();
        snapshot
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(temp_path(Path::new("a/state.bin")), PathBuf::from("a/state.bin.tmp"));
        assert_eq!(temp_path(Path::new("state")), PathBuf::from("state.tmp"));
    }

    #[test]
    fn full_snapshot_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.bin");
        let snapshot = full_snapshot();
        save(&snapshot, &path).unwrap();
        assert!(!temp_path(&path).exists());
        assert_eq!(load(&path).unwrap(), snapshot);
    }

    #[test]
    fn newer_snapshot_version_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.bin");
        let mut snapshot = full_snapshot();
        snapshot.version = 2;
        save(&snapshot, &path).unwrap();
        match load(&path) {
            Err(StoreError::Corrupt { reason, .. }) => assert_eq!(reason, "unsupported snapshot version 2"),
            other => panic!("expected a corrupt snapshot, got {other:?}"),
        }
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.bin");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), "x").unwrap();

        let err = save(&full_snapshot(), &path).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "{err:?}");
        assert!(!temp_path(&path).exists());
        assert!(path.join("occupied").exists());
    }
}
