use std::fmt::{self, Display, Write};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can raise inside a snippet.
pub type RunResult<T> = Result<T, RunError>;

/// Exception types a snippet can raise or catch.
///
/// The string representation matches the variant name exactly (e.g., `ValueError` -> "ValueError"),
/// which is also the name the class is bound to in snippet code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    BaseException,
    /// primary exception class - matches any exception in isinstance checks.
    Exception,
    KeyboardInterrupt,
    SystemExit,

    ArithmeticError,
    OverflowError,
    ZeroDivisionError,

    LookupError,
    IndexError,
    KeyError,

    RuntimeError,
    NotImplementedError,
    RecursionError,

    AttributeError,
    NameError,
    UnboundLocalError,

    ValueError,
    UnicodeDecodeError,
    #[strum(serialize = "JSONDecodeError")]
    JSONDecodeError,

    ImportError,
    ModuleNotFoundError,

    OSError,
    FileNotFoundError,
    FileExistsError,
    IsADirectoryError,
    NotADirectoryError,
    PermissionError,

    AssertionError,
    StopIteration,
    SyntaxError,
    TypeError,
}

impl ExcType {
    /// Direct base class in the exception hierarchy.
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::BaseException => None,
            Self::Exception | Self::KeyboardInterrupt | Self::SystemExit => Some(Self::BaseException),
            Self::OverflowError | Self::ZeroDivisionError => Some(Self::ArithmeticError),
            Self::IndexError | Self::KeyError => Some(Self::LookupError),
            Self::NotImplementedError | Self::RecursionError => Some(Self::RuntimeError),
            Self::UnboundLocalError => Some(Self::NameError),
            Self::UnicodeDecodeError | Self::JSONDecodeError => Some(Self::ValueError),
            Self::ModuleNotFoundError => Some(Self::ImportError),
            Self::FileNotFoundError
            | Self::FileExistsError
            | Self::IsADirectoryError
            | Self::NotADirectoryError
            | Self::PermissionError => Some(Self::OSError),
            _ => Some(Self::Exception),
        }
    }

    /// Returns true if `self` would be caught by `except handler_type:`.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        let mut current = Some(self);
        while let Some(exc_type) = current {
            if exc_type == handler_type {
                return true;
            }
            current = exc_type.parent();
        }
        false
    }

    /// Looks up an exception class by the name snippets use for it.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub(crate) fn type_error(msg: impl Display) -> RunError {
        ExceptionValue::new(Self::TypeError, msg.to_string()).into()
    }

    pub(crate) fn value_error(msg: impl Display) -> RunError {
        ExceptionValue::new(Self::ValueError, msg.to_string()).into()
    }

    pub(crate) fn index_error(msg: impl Display) -> RunError {
        ExceptionValue::new(Self::IndexError, msg.to_string()).into()
    }

    pub(crate) fn overflow_error(msg: impl Display) -> RunError {
        ExceptionValue::new(Self::OverflowError, msg.to_string()).into()
    }

    pub(crate) fn name_error(name: &str) -> RunError {
        ExceptionValue::new(Self::NameError, format!("name '{name}' is not defined")).into()
    }

    pub(crate) fn attribute_error(type_name: impl Display, attr: &str) -> RunError {
        ExceptionValue::new(
            Self::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
        .into()
    }

    pub(crate) fn recursion_error(msg: &str) -> RunError {
        ExceptionValue::new(Self::RecursionError, msg.to_owned()).into()
    }

    pub(crate) fn zero_division(msg: &str) -> RunError {
        ExceptionValue::new(Self::ZeroDivisionError, msg.to_owned()).into()
    }

    /// `KeyError` carries the repr of the missing key, like CPython.
    pub(crate) fn key_error(key_repr: String) -> RunError {
        ExceptionValue::new(Self::KeyError, key_repr).into()
    }

    pub(crate) fn not_callable(type_name: &str) -> RunError {
        Self::type_error(format_args!("'{type_name}' object is not callable"))
    }

    pub(crate) fn not_iterable(type_name: &str) -> RunError {
        Self::type_error(format_args!("'{type_name}' object is not iterable"))
    }

    pub(crate) fn unhashable(type_name: &str) -> RunError {
        Self::type_error(format_args!("unhashable type: '{type_name}'"))
    }

    /// `len() takes exactly one argument (2 given)`
    pub(crate) fn arg_count(name: &str, expected: usize, actual: usize) -> RunError {
        if expected == 1 {
            Self::type_error(format_args!("{name}() takes exactly one argument ({actual} given)"))
        } else {
            Self::type_error(format_args!("{name} expected {expected} arguments, got {actual}"))
        }
    }

    pub(crate) fn at_most(name: &str, max: usize, actual: usize) -> RunError {
        Self::type_error(format_args!("{name} expected at most {max} arguments, got {actual}"))
    }

    pub(crate) fn unexpected_keyword(name: &str, key: &str) -> RunError {
        Self::type_error(format_args!("{name}() got an unexpected keyword argument '{key}'"))
    }

    pub(crate) fn multiple_values(name: &str, key: &str) -> RunError {
        Self::type_error(format_args!("{name}() got multiple values for argument '{key}'"))
    }

    pub(crate) fn missing_argument(name: &str, param: &str) -> RunError {
        Self::type_error(format_args!("{name}() missing 1 required positional argument: '{param}'"))
    }
}

/// An exception instance: its class and message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionValue {
    pub exc_type: ExcType,
    /// `str(exc)`; empty when raised without arguments.
    pub message: String,
}

impl ExceptionValue {
    #[must_use]
    pub fn new(exc_type: ExcType, message: String) -> Self {
        Self { exc_type, message }
    }

    #[must_use]
    pub fn bare(exc_type: ExcType) -> Self {
        Self {
            exc_type,
            message: String::new(),
        }
    }
}

impl Display for ExceptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.exc_type)
        } else {
            write!(f, "{}: {}", self.exc_type, self.message)
        }
    }
}

/// One entry of a traceback: the function and line active when the exception passed through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub name: String,
    pub line: Option<u32>,
}

/// An exception propagating out of snippet code, together with its traceback.
#[derive(Debug, Clone)]
pub struct RunError {
    pub exc: ExceptionValue,
    /// Frames the exception has left, innermost first.
    frames: Vec<TraceFrame>,
    /// Line in the frame the exception is currently unwinding through.
    pending_line: Option<u32>,
}

impl RunError {
    #[must_use]
    pub fn new(exc: ExceptionValue) -> Self {
        Self {
            exc,
            frames: Vec::new(),
            pending_line: None,
        }
    }

    /// Records the statement line for the current frame, keeping the innermost one.
    #[must_use]
    pub fn at_line(mut self, line: u32) -> Self {
        if self.pending_line.is_none() {
            self.pending_line = Some(line);
        }
        self
    }

    /// Closes the current frame as the exception unwinds out of function `name`.
    #[must_use]
    pub fn leave_frame(mut self, name: &str) -> Self {
        self.frames.push(TraceFrame {
            name: name.to_owned(),
            line: self.pending_line.take(),
        });
        self
    }

    #[must_use]
    pub fn frames(&self) -> &[TraceFrame] {
        &self.frames
    }

    /// Renders a Python-style traceback against the snippet source.
    ///
    /// ```text
    /// Traceback (most recent call last):
    ///   File "<snippet>", line 2, in <module>
    ///     f()
    /// ValueError: boom
    /// ```
    #[must_use]
    pub fn render(&self, source: &str) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in self.frames.iter().rev() {
            match frame.line {
                Some(line) => {
                    let _ = writeln!(out, "  File \"<snippet>\", line {line}, in {}", frame.name);
                    if let Some(text) = source_line(source, line) {
                        let _ = writeln!(out, "    {text}");
                    }
                }
                None => {
                    let _ = writeln!(out, "  File \"<snippet>\", in {}", frame.name);
                }
            }
        }
        let _ = writeln!(out, "{}", self.exc);
        out
    }
}

impl From<ExceptionValue> for RunError {
    fn from(exc: ExceptionValue) -> Self {
        Self::new(exc)
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.exc.fmt(f)
    }
}

impl std::error::Error for RunError {}

/// Returns the trimmed text of 1-based `line`, if it exists and is not blank.
pub(crate) fn source_line(source: &str, line: u32) -> Option<&str> {
    let index = usize::try_from(line).ok()?.checked_sub(1)?;
    let text = source.lines().nth(index)?.trim();
    (!text.is_empty()).then_some(text)
}
