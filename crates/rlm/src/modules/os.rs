//! The `os` and `os.path` modules, restricted to filesystem inspection and directory creation.

use std::{fs, path::Path};

use strum::{EnumString, IntoStaticStr};
use walkdir::WalkDir;

use crate::{
    args::{CallArgs, expect_str},
    exception::{ExcType, RunResult},
    types::file::io_error,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum OsFunction {
    Getcwd,
    Listdir,
    Makedirs,
    Remove,
    Walk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum PathFunction {
    Abspath,
    Basename,
    Dirname,
    Exists,
    Getsize,
    Isdir,
    Isfile,
    Join,
    Splitext,
}

fn path_arg(args: CallArgs, name: &str) -> RunResult<String> {
    let value = args.get_one_arg(name)?;
    Ok(expect_str(&value, &format!("{name}() argument"))?.to_owned())
}

pub(crate) fn call(function: OsFunction, args: CallArgs) -> RunResult<Value> {
    match function {
        OsFunction::Getcwd => {
            args.check_zero_args("getcwd")?;
            let cwd = std::env::current_dir().map_err(|err| io_error(&err, "."))?;
            Ok(Value::from(cwd.to_string_lossy().into_owned()))
        }
        OsFunction::Listdir => {
            let [path] = args.bind("listdir", ["path"], 0)?;
            let path = match &path {
                Some(path) => expect_str(path, "listdir() argument")?.to_owned(),
                None => ".".to_owned(),
            };
            let entries = fs::read_dir(&path).map_err(|err| io_error(&err, &path))?;
            let mut names: Vec<String> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            Ok(Value::list(names.into_iter().map(Value::from).collect()))
        }
        OsFunction::Makedirs => {
            let [path, exist_ok] = args.bind("makedirs", ["name", "exist_ok"], 1)?;
            let path = path.unwrap_or(Value::None);
            let path = expect_str(&path, "makedirs() argument")?;
            if Path::new(path).exists() && !exist_ok.is_some_and(|v| v.py_bool()) {
                return Err(io_error(&std::io::Error::from(std::io::ErrorKind::AlreadyExists), path));
            }
            fs::create_dir_all(path).map_err(|err| io_error(&err, path))?;
            Ok(Value::None)
        }
        OsFunction::Remove => {
            let path = path_arg(args, "remove")?;
            fs::remove_file(&path).map_err(|err| io_error(&err, &path))?;
            Ok(Value::None)
        }
        OsFunction::Walk => {
            let top = path_arg(args, "walk")?;
            walk(&top)
        }
    }
}

/// `os.walk(top)`, materialised as a list of `(dirpath, dirnames, filenames)` tuples.
fn walk(top: &str) -> RunResult<Value> {
    let mut rows = Vec::new();
    for entry in WalkDir::new(top).sort_by_file_name().into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_dir() {
            continue;
        }
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        if let Ok(children) = fs::read_dir(entry.path()) {
            for child in children.filter_map(Result::ok) {
                let name = Value::from(child.file_name().to_string_lossy().into_owned());
                if child.file_type().is_ok_and(|t| t.is_dir()) {
                    dirs.push(name);
                } else {
                    files.push(name);
                }
            }
        }
        let by_text = |a: &Value, b: &Value| a.py_str().cmp(&b.py_str());
        dirs.sort_by(by_text);
        files.sort_by(by_text);
        rows.push(Value::tuple(vec![
            Value::from(entry.path().to_string_lossy().into_owned()),
            Value::list(dirs),
            Value::list(files),
        ]));
    }
    Ok(Value::list(rows))
}

/// `os.path.join(a, *parts)` with POSIX semantics.
#[must_use]
pub fn join(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts {
        if part.starts_with('/') {
            out.clear();
        } else if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}

#[must_use]
pub fn basename(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, tail)| tail)
}

#[must_use]
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => {
            let head = &path[..=index];
            let trimmed = head.trim_end_matches('/');
            if trimmed.is_empty() { head } else { trimmed }
        }
        None => "",
    }
}

/// `os.path.splitext(path)`: a leading dot of the file name does not start an extension.
#[must_use]
pub fn splitext(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let name = &path[name_start..];
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name.rfind('.') {
        Some(dot) if dot >= leading_dots => path.split_at(name_start + dot),
        _ => (path, ""),
    }
}

pub(crate) fn call_path(function: PathFunction, args: CallArgs) -> RunResult<Value> {
    match function {
        PathFunction::Join => {
            if !args.keywords.is_empty() {
                return Err(ExcType::type_error("join() takes no keyword arguments"));
            }
            let parts = args
                .positional
                .iter()
                .map(|part| expect_str(part, "join() argument"))
                .collect::<RunResult<Vec<_>>>()?;
            if parts.is_empty() {
                return Err(ExcType::type_error("join() missing 1 required positional argument: 'a'"));
            }
            Ok(Value::from(join(&parts)))
        }
        PathFunction::Basename => Ok(Value::from(basename(&path_arg(args, "basename")?))),
        PathFunction::Dirname => Ok(Value::from(dirname(&path_arg(args, "dirname")?))),
        PathFunction::Splitext => {
            let path = path_arg(args, "splitext")?;
            let (root, ext) = splitext(&path);
            Ok(Value::tuple(vec![Value::from(root), Value::from(ext)]))
        }
        PathFunction::Exists => Ok(Value::Bool(Path::new(&path_arg(args, "exists")?).exists())),
        PathFunction::Isfile => Ok(Value::Bool(Path::new(&path_arg(args, "isfile")?).is_file())),
        PathFunction::Isdir => Ok(Value::Bool(Path::new(&path_arg(args, "isdir")?).is_dir())),
        PathFunction::Getsize => {
            let path = path_arg(args, "getsize")?;
            let metadata = fs::metadata(&path).map_err(|err| io_error(&err, &path))?;
            Ok(Value::Int(i64::try_from(metadata.len()).unwrap_or(i64::MAX)))
        }
        PathFunction::Abspath => {
            let path = path_arg(args, "abspath")?;
            let absolute = std::path::absolute(&path).map_err(|err| io_error(&err, &path))?;
            Ok(Value::from(absolute.to_string_lossy().into_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_path_helpers() {
        assert_eq!(join(&["a", "b", "c.txt"]), "a/b/c.txt");
        assert_eq!(join(&["a/", "/abs", "x"]), "/abs/x");
        assert_eq!(basename("dir/file.py"), "file.py");
        assert_eq!(dirname("dir/sub/file.py"), "dir/sub");
        assert_eq!(dirname("/file"), "/");
        assert_eq!(dirname("file"), "");
        assert_eq!(splitext("dir/archive.tar.gz"), ("dir/archive.tar", ".gz"));
        assert_eq!(splitext(".bashrc"), (".bashrc", ""));
    }
}
