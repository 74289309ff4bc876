//! Discovery and classification of the files in a source tree.

use std::{
    fmt,
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
    process::Command,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{
    snapshot::unix_now,
    types::Dict,
    value::Value,
};

/// Over-size threshold used by `init-repo` when none is given.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;

/// Bytes read from the start of a file when sniffing for binary content.
const SNIFF_LEN: u64 = 8192;

/// Directories the walk fallback never descends into.
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "__pycache__",
    "node_modules",
    "venv",
    "env",
    ".env",
    "build",
    "dist",
    ".idea",
    ".vscode",
    "target",
    "bin",
    "obj",
];

/// Label for files no rule recognises.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Metadata of one indexed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub size: u64,
    pub is_binary: bool,
    pub lang: String,
    /// Larger than the index's size threshold; still indexed.
    pub too_large: bool,
    pub abs_path: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub count: u64,
    pub size: u64,
}

/// Summary of a directory tree, keyed by root-relative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoIndex {
    pub repo_root: String,
    pub indexed_at: f64,
    pub total_files: u64,
    pub total_size: u64,
    pub files: IndexMap<String, FileRecord>,
    pub languages: IndexMap<String, LanguageStats>,
}

/// The root handed to [`build_index`] is unusable.
#[derive(Debug)]
pub enum IndexError {
    NotFound(PathBuf),
    NotADirectory(PathBuf),
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Repository path does not exist: {}", path.display()),
            Self::NotADirectory(path) => write!(f, "Repository path is not a directory: {}", path.display()),
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl RepoIndex {
    fn new(repo_root: String) -> Self {
        Self {
            repo_root,
            indexed_at: unix_now(),
            total_files: 0,
            total_size: 0,
            files: IndexMap::new(),
            languages: IndexMap::new(),
        }
    }

    fn add(&mut self, rel_path: String, record: FileRecord) {
        self.total_files += 1;
        self.total_size += record.size;
        let stats = self.languages.entry(record.lang.clone()).or_default();
        stats.count += 1;
        stats.size += record.size;
        self.files.insert(rel_path, record);
    }

    /// Languages ordered by file count, most common first; ties keep discovery order.
    #[must_use]
    pub fn top_languages(&self, limit: usize) -> Vec<(&str, LanguageStats)> {
        let mut langs: Vec<_> = self.languages.iter().map(|(name, stats)| (name.as_str(), *stats)).collect();
        langs.sort_by(|a, b| b.1.count.cmp(&a.1.count));
        langs.truncate(limit);
        langs
    }

    /// The index as the nested dict snippets see under `repo_index`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut files = Dict::new();
        for (path, record) in &self.files {
            let mut entry = Dict::new();
            entry.set_str("size", Value::Int(saturating_i64(record.size)));
            entry.set_str("is_binary", Value::Bool(record.is_binary));
            entry.set_str("lang", Value::from(record.lang.as_str()));
            entry.set_str("too_large", Value::Bool(record.too_large));
            entry.set_str("abs_path", Value::from(record.abs_path.as_str()));
            files.set_str(path, Value::dict(entry));
        }
        let mut languages = Dict::new();
        for (name, stats) in &self.languages {
            let mut entry = Dict::new();
            entry.set_str("count", Value::Int(saturating_i64(stats.count)));
            entry.set_str("size", Value::Int(saturating_i64(stats.size)));
            languages.set_str(name, Value::dict(entry));
        }
        let mut index = Dict::new();
        index.set_str("repo_root", Value::from(self.repo_root.as_str()));
        index.set_str("indexed_at", Value::Float(self.indexed_at));
        index.set_str("total_files", Value::Int(saturating_i64(self.total_files)));
        index.set_str("total_size", Value::Int(saturating_i64(self.total_size)));
        index.set_str("files", Value::dict(files));
        index.set_str("languages", Value::dict(languages));
        Value::dict(index)
    }
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Indexes every file under `root`.
///
/// Inside a git work tree the tracked and untracked-but-not-ignored files are used; otherwise the
/// tree is walked, skipping [`SKIP_DIRS`]. Files that vanish or cannot be read are skipped.
pub fn build_index(root: &Path, max_file_size_mb: u64) -> Result<RepoIndex, IndexError> {
    if !root.exists() {
        return Err(IndexError::NotFound(root.to_owned()));
    }
    let root = root.canonicalize().map_err(|source| IndexError::Io {
        path: root.to_owned(),
        source,
    })?;
    if !root.is_dir() {
        return Err(IndexError::NotADirectory(root));
    }

    let max_bytes = max_file_size_mb.saturating_mul(1024 * 1024);
    let mut index = RepoIndex::new(root.to_string_lossy().into_owned());
    for rel_path in discover_files(&root) {
        let path = root.join(&rel_path);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                tracing::debug!(path = %rel_path, "skipping non-file entry");
                continue;
            }
            Err(err) => {
                tracing::debug!(path = %rel_path, error = %err, "skipping unreadable file");
                continue;
            }
        };
        let size = metadata.len();
        let record = FileRecord {
            size,
            is_binary: is_binary_file(&path),
            lang: detect_language(&path).to_owned(),
            too_large: size > max_bytes,
            abs_path: path.to_string_lossy().into_owned(),
        };
        index.add(rel_path, record);
    }
    tracing::debug!(
        root = %index.repo_root,
        files = index.total_files,
        bytes = index.total_size,
        "repository indexed"
    );
    Ok(index)
}

/// Root-relative paths of the files to index, sorted.
fn discover_files(root: &Path) -> Vec<String> {
    match git_files(root) {
        Some(files) => files,
        None => walk_files(root),
    }
}

fn git_files(root: &Path) -> Option<Vec<String>> {
    let mut files = git_ls_files(root, &[])?;
    files.extend(git_ls_files(root, &["--others", "--exclude-standard"])?);
    files.sort();
    files.dedup();
    tracing::debug!(count = files.len(), "discovered files with git");
    Some(files)
}

/// Runs `git ls-files -z <extra>` in `root`; `None` when git is unavailable or `root` is not a work tree.
fn git_ls_files(root: &Path, extra: &[&str]) -> Option<Vec<String>> {
    let output = match Command::new("git")
        .args(["ls-files", "-z"])
        .args(extra)
        .current_dir(root)
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            tracing::warn!(error = %err, "git is unavailable, walking the directory instead");
            return None;
        }
    };
    if !output.status.success() {
        tracing::debug!(root = %root.display(), "not a git work tree, walking the directory instead");
        return None;
    }
    Some(
        String::from_utf8_lossy(&output.stdout)
            .split('\0')
            .filter(|path| !path.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}

fn walk_files(root: &Path) -> Vec<String> {
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() == 0 || !entry.file_name().to_str().is_some_and(|name| SKIP_DIRS.contains(&name))
    });
    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.path().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
            files.push(parts.join("/"));
        }
    }
    files.sort();
    files
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Language label from the file name: conventional build files first, then the extension.
#[must_use]
pub fn detect_language(path: &Path) -> &'static str {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match name.as_str() {
        "makefile" | "gnumakefile" => return "Makefile",
        "dockerfile" => return "Dockerfile",
        _ => {}
    }
    extension(path)
        .and_then(|ext| language_for_extension(&ext))
        .unwrap_or(UNKNOWN_LANGUAGE)
}

fn language_for_extension(ext: &str) -> Option<&'static str> {
    let lang = match ext {
        "py" | "pyx" | "pyi" => "Python",
        "js" | "jsx" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "java" => "Java",
        "kt" => "Kotlin",
        "cpp" | "cc" | "cxx" | "hpp" => "C++",
        "c" => "C",
        "h" => "C/C++",
        "cs" => "C#",
        "go" => "Go",
        "rs" => "Rust",
        "rb" => "Ruby",
        "php" => "PHP",
        "swift" => "Swift",
        "m" => "Objective-C",
        "mm" => "Objective-C++",
        "scala" => "Scala",
        "r" => "R",
        "lua" => "Lua",
        "perl" | "pl" => "Perl",
        "sh" => "Shell",
        "bash" => "Bash",
        "zsh" => "Zsh",
        "fish" => "Fish",
        "vim" => "VimScript",
        "el" => "Emacs Lisp",
        "clj" => "Clojure",
        "cljs" => "ClojureScript",
        "ex" | "exs" => "Elixir",
        "erl" | "hrl" => "Erlang",
        "ml" | "mli" => "OCaml",
        "hs" | "lhs" => "Haskell",
        "dart" => "Dart",
        "v" => "Verilog",
        "vhd" | "vhdl" => "VHDL",
        "sql" => "SQL",
        "asm" | "s" => "Assembly",
        "html" | "htm" => "HTML",
        "xml" => "XML",
        "svg" => "SVG",
        "css" => "CSS",
        "scss" => "SCSS",
        "sass" => "Sass",
        "less" => "Less",
        "md" | "markdown" => "Markdown",
        "rst" => "ReStructuredText",
        "txt" => "Text",
        "tex" => "LaTeX",
        "adoc" => "AsciiDoc",
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "toml" => "TOML",
        "ini" => "INI",
        "cfg" | "conf" => "Config",
        "csv" => "CSV",
        "tsv" => "TSV",
        "cmake" => "CMake",
        "gradle" => "Gradle",
        "make" => "Makefile",
        "dockerfile" => "Dockerfile",
        "pyc" | "pyo" => "Python Bytecode",
        "so" => "Shared Library",
        "dll" | "dylib" => "Dynamic Library",
        "a" => "Static Library",
        "o" | "obj" => "Object File",
        "exe" => "Executable",
        "bin" => "Binary",
        "class" => "Java Bytecode",
        "jar" => "Java Archive",
        "war" => "Web Archive",
        "png" => "PNG Image",
        "jpg" | "jpeg" => "JPEG Image",
        "gif" => "GIF Image",
        "bmp" => "BMP Image",
        "ico" => "Icon",
        "webp" => "WebP Image",
        "zip" => "ZIP Archive",
        "tar" => "TAR Archive",
        "gz" => "Gzip Archive",
        "bz2" => "Bzip2 Archive",
        "xz" => "XZ Archive",
        "7z" => "7-Zip Archive",
        "mp3" | "wav" => "Audio",
        "mp4" | "avi" | "mov" => "Video",
        "pdf" => "PDF",
        _ => return None,
    };
    Some(lang)
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "pyc" | "pyo" | "so" | "dll" | "dylib" | "a" | "o" | "obj" | "exe" | "bin" | "class" | "jar" | "war"
            | "png" | "jpg" | "jpeg" | "gif" | "bmp" | "ico" | "webp" | "svg"
            | "zip" | "tar" | "gz" | "bz2" | "xz" | "7z" | "rar"
            | "mp3" | "wav" | "ogg" | "flac" | "aac"
            | "mp4" | "avi" | "mov" | "mkv" | "wmv" | "flv"
            | "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx"
            | "ttf" | "otf" | "woff" | "woff2" | "eot"
            | "db" | "sqlite" | "sqlite3"
    )
}

/// Binary by extension, else by a NUL byte in the first 8 KiB. Unreadable files count as binary.
#[must_use]
pub fn is_binary_file(path: &Path) -> bool {
    if extension(path).is_some_and(|ext| is_binary_extension(&ext)) {
        return true;
    }
    if !path.is_file() {
        return false;
    }
    let mut head = Vec::new();
    match File::open(path).and_then(|file| file.take(SNIFF_LEN).read_to_end(&mut head)) {
        Ok(_) => head.contains(&0),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn languages_from_names_and_extensions() {
        assert_eq!(detect_language(Path::new("src/main.PY")), "Python");
        assert_eq!(detect_language(Path::new("GNUmakefile")), "Makefile");
        assert_eq!(detect_language(Path::new("docker/Dockerfile")), "Dockerfile");
        assert_eq!(detect_language(Path::new("kernel.S")), "Assembly");
        assert_eq!(detect_language(Path::new(".bashrc")), UNKNOWN_LANGUAGE);
        assert_eq!(detect_language(Path::new("README")), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn binary_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes");
        fs::write(&text, "plain text").unwrap();
        let blob = dir.path().join("blob");
        fs::write(&blob, b"ab\0cd").unwrap();
        let empty = dir.path().join("empty");
        fs::write(&empty, b"").unwrap();
        assert!(!is_binary_file(&text));
        assert!(is_binary_file(&blob));
        assert!(!is_binary_file(&empty));
        assert!(is_binary_file(Path::new("missing.PNG")));
    }
}
