use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Read, Write},
};

use crate::{
    args::{CallArgs, expect_str},
    exception::{ExcType, ExceptionValue, RunError, RunResult},
    value::{FileRef, Value},
};

/// An open file returned by `open()`.
#[derive(Debug)]
pub struct FileHandle {
    pub path: String,
    pub mode: String,
    binary: bool,
    state: FileState,
}

#[derive(Debug)]
enum FileState {
    Reading(BufReader<File>),
    Writing(File),
    Closed,
}

/// Maps an I/O failure on `path` to the matching Python exception.
pub(crate) fn io_error(err: &io::Error, path: &str) -> RunError {
    let (exc_type, errno) = match err.kind() {
        io::ErrorKind::NotFound => (ExcType::FileNotFoundError, 2),
        io::ErrorKind::PermissionDenied => (ExcType::PermissionError, 13),
        io::ErrorKind::AlreadyExists => (ExcType::FileExistsError, 17),
        io::ErrorKind::IsADirectory => (ExcType::IsADirectoryError, 21),
        io::ErrorKind::NotADirectory => (ExcType::NotADirectoryError, 20),
        _ => (ExcType::OSError, err.raw_os_error().unwrap_or(5)),
    };
    let reason = match exc_type {
        ExcType::FileNotFoundError => "No such file or directory".to_owned(),
        ExcType::PermissionError => "Permission denied".to_owned(),
        ExcType::IsADirectoryError => "Is a directory".to_owned(),
        _ => err.to_string(),
    };
    ExceptionValue::new(exc_type, format!("[Errno {errno}] {reason}: '{path}'")).into()
}

impl FileHandle {
    /// Opens `path` with a Python mode string (`r`, `w`, `a`, `x`, optionally `b`).
    ///
    /// Handles are read-only or write-only, so update modes (`r+`, `w+`, ...) are refused.
    pub fn open(path: &str, mode: &str) -> RunResult<Self> {
        if mode.contains('+') {
            return Err(ExcType::value_error(format_args!(
                "update mode is not supported: '{mode}'"
            )));
        }
        let binary = mode.contains('b');
        let kind = mode.trim_matches(|c| c == 'b' || c == 't');
        let result = match kind {
            "r" | "" => File::open(path).map(|f| FileState::Reading(BufReader::new(f))),
            "w" => File::create(path).map(FileState::Writing),
            "a" => OpenOptions::new().append(true).create(true).open(path).map(FileState::Writing),
            "x" => OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .map(FileState::Writing),
            _ => return Err(ExcType::value_error(format_args!("invalid mode: '{mode}'"))),
        };
        let state = result.map_err(|err| io_error(&err, path))?;
        if let FileState::Reading(reader) = &state
            && reader.get_ref().metadata().is_ok_and(|m| m.is_dir())
        {
            return Err(io_error(&io::Error::from(io::ErrorKind::IsADirectory), path));
        }
        Ok(Self {
            path: path.to_owned(),
            mode: mode.to_owned(),
            binary,
            state,
        })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state, FileState::Closed)
    }

    pub fn close(&mut self) {
        if let FileState::Writing(file) = &mut self.state {
            let _ = file.flush();
        }
        self.state = FileState::Closed;
    }

    fn reader(&mut self) -> RunResult<&mut BufReader<File>> {
        match &mut self.state {
            FileState::Reading(reader) => Ok(reader),
            FileState::Writing(_) => Err(ExceptionValue::new(
                ExcType::OSError,
                "not readable".to_owned(),
            )
            .into()),
            FileState::Closed => Err(ExcType::value_error("I/O operation on closed file.")),
        }
    }

    /// Reads the rest of the file.
    pub fn read(&mut self) -> RunResult<Value> {
        let path = self.path.clone();
        let binary = self.binary;
        let reader = self.reader()?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|err| io_error(&err, &path))?;
        if binary {
            Ok(Value::Bytes(bytes.into()))
        } else {
            Ok(Value::from(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    /// Reads one line including its terminator; empty at end of file.
    pub fn read_line(&mut self) -> RunResult<String> {
        let path = self.path.clone();
        let reader = self.reader()?;
        let mut bytes = Vec::new();
        reader.read_until(b'\n', &mut bytes).map_err(|err| io_error(&err, &path))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads all remaining lines, keeping line terminators.
    pub fn read_lines(&mut self) -> RunResult<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                return Ok(lines);
            }
            lines.push(line);
        }
    }

    pub fn write(&mut self, data: &Value) -> RunResult<usize> {
        let bytes: Vec<u8> = match data {
            Value::Str(s) if !self.binary => s.as_bytes().to_vec(),
            Value::Bytes(b) if self.binary => b.to_vec(),
            other => {
                let expected = if self.binary { "a bytes-like object" } else { "str" };
                return Err(ExcType::type_error(format_args!(
                    "write() argument must be {expected}, not {}",
                    other.type_name()
                )));
            }
        };
        let path = self.path.clone();
        match &mut self.state {
            FileState::Writing(file) => {
                file.write_all(&bytes).map_err(|err| io_error(&err, &path))?;
                Ok(match data {
                    Value::Str(s) => s.chars().count(),
                    _ => bytes.len(),
                })
            }
            FileState::Reading(_) => Err(ExceptionValue::new(ExcType::OSError, "not writable".to_owned()).into()),
            FileState::Closed => Err(ExcType::value_error("I/O operation on closed file.")),
        }
    }
}

/// Calls a method on an open file.
pub(crate) fn call_method(file: &FileRef, name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "read" => {
            let _ = args.bind("read", ["size"], 0)?;
            file.borrow_mut().read()
        }
        "readline" => {
            args.check_zero_args("readline")?;
            Ok(Value::from(file.borrow_mut().read_line()?))
        }
        "readlines" => {
            args.check_zero_args("readlines")?;
            let lines = file.borrow_mut().read_lines()?;
            Ok(Value::list(lines.into_iter().map(Value::from).collect()))
        }
        "write" => {
            let data = args.get_one_arg("write")?;
            Ok(Value::from(file.borrow_mut().write(&data)?))
        }
        "writelines" => {
            let lines = args.get_one_arg("writelines")?;
            for line in lines.py_iter()? {
                file.borrow_mut().write(&line)?;
            }
            Ok(Value::None)
        }
        "close" => {
            args.check_zero_args("close")?;
            file.borrow_mut().close();
            Ok(Value::None)
        }
        "flush" => Ok(Value::None),
        "__enter__" => Ok(Value::File(file.clone())),
        _ => Err(ExcType::attribute_error("TextIOWrapper", name)),
    }
}

/// `open(path, mode='r', encoding=None)`
pub(crate) fn open(args: CallArgs) -> RunResult<Value> {
    let [path, mode, _encoding, _errors] = args.bind("open", ["file", "mode", "encoding", "errors"], 1)?;
    let path = path.unwrap_or(Value::None);
    let path = expect_str(&path, "open() path")?;
    let mode = match &mode {
        Some(mode) => expect_str(mode, "open() mode")?.to_owned(),
        None => "r".to_owned(),
    };
    Ok(Value::File(std::rc::Rc::new(std::cell::RefCell::new(FileHandle::open(path, &mode)?))))
}
