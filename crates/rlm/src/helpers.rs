//! Text helpers injected into every snippet namespace.
//!
//! The helpers share the snippet's `context` dict and `buffers` list, so anything they read or
//! append is the same object the snippet sees and the executor pulls back afterwards.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    rc::Rc,
};

use strum::{EnumIter, IntoStaticStr};

use crate::{
    args::{CallArgs, expect_str, int_or},
    exception::{ExcType, ExceptionValue, RunError, RunResult},
    modules::re::{Pattern, flags_arg},
    ops::slice_str,
    types::{Dict, file::io_error, str::char_slice},
    value::{DictRef, ListRef, Slice, Value},
};

/// Chunk size used by `chunk_indices()` and `write_chunks()` when none is given.
pub const DEFAULT_CHUNK_SIZE: i64 = 200_000;
/// Matches returned by `grep()` when `max_matches` is omitted.
pub const DEFAULT_MAX_MATCHES: i64 = 20;
/// Characters of surrounding text `grep()` includes on each side of a match.
pub const DEFAULT_WINDOW: i64 = 120;
/// End offset used by `peek()` when omitted.
pub const DEFAULT_PEEK_END: i64 = 1000;

/// Invalid use of a helper.
#[derive(Debug)]
pub enum HelperError {
    /// An argument is out of its accepted range, e.g. `chunk_indices(size=0)`.
    InvalidArgument(String),
    /// The search pattern did not compile.
    InvalidPattern(String),
    /// `context['content']` is not a string.
    ContentNotText(&'static str),
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for HelperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) | Self::InvalidPattern(msg) => f.write_str(msg),
            Self::ContentNotText(type_name) => write!(f, "context['content'] must be str, not {type_name}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for HelperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<HelperError> for RunError {
    fn from(err: HelperError) -> Self {
        match err {
            HelperError::InvalidArgument(msg) | HelperError::InvalidPattern(msg) => {
                ExceptionValue::new(ExcType::ValueError, msg).into()
            }
            HelperError::ContentNotText(_) => ExceptionValue::new(ExcType::TypeError, err.to_string()).into(),
            HelperError::Io { path, source } => io_error(&source, &path.to_string_lossy()),
        }
    }
}

/// The helpers available to snippets, in binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum HelperKind {
    Peek,
    Grep,
    /// Same behaviour as `grep`, under a descriptive name.
    PatternSearch,
    ChunkIndices,
    WriteChunks,
    AddBuffer,
}

impl HelperKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// `__doc__` of each helper.
#[must_use]
pub fn doc(kind: HelperKind) -> &'static str {
    match kind {
        HelperKind::Peek => "peek(start=0, end=1000) -> str\n\nReturn content[start:end].",
        HelperKind::Grep | HelperKind::PatternSearch => {
            "grep(pattern, max_matches=20, window=120, flags=0) -> list\n\n\
             Search content for pattern. Each hit is a dict with 'match', 'span' and a 'snippet' \
             of surrounding text."
        }
        HelperKind::ChunkIndices => {
            "chunk_indices(size=200000, overlap=0) -> list\n\nSplit content into (start, end) spans."
        }
        HelperKind::WriteChunks => {
            "write_chunks(out_dir, size=200000, overlap=0, prefix='chunk') -> list\n\n\
             Write each chunk of content to out_dir/<prefix>_NNNN.txt and return the paths."
        }
        HelperKind::AddBuffer => "add_buffer(text) -> None\n\nAppend str(text) to buffers.",
    }
}

/// One `grep()` hit; offsets are in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub matched: String,
    pub span: (usize, usize),
    pub snippet: String,
}

impl SearchHit {
    fn into_value(self) -> Value {
        let mut dict = Dict::new();
        dict.set_str("match", Value::from(self.matched));
        dict.set_str(
            "span",
            Value::tuple(vec![Value::from(self.span.0), Value::from(self.span.1)]),
        );
        dict.set_str("snippet", Value::from(self.snippet));
        Value::dict(dict)
    }
}

/// Splits `len` characters into windows of `size`, each starting `size - overlap` after the last.
///
/// The final window is clipped to `len`; empty content yields the single span `(0, 0)`.
pub fn chunk_indices(len: usize, size: i64, overlap: i64) -> Result<Vec<(usize, usize)>, HelperError> {
    if size <= 0 {
        return Err(HelperError::InvalidArgument("size must be > 0".to_owned()));
    }
    if overlap < 0 {
        return Err(HelperError::InvalidArgument("overlap must be >= 0".to_owned()));
    }
    if overlap >= size {
        return Err(HelperError::InvalidArgument("overlap must be < size".to_owned()));
    }
    let size = usize::try_from(size).unwrap_or(usize::MAX);
    let step = size - usize::try_from(overlap).unwrap_or(0);
    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        let end = len.min(start.saturating_add(size));
        spans.push((start, end));
        if end >= len {
            break;
        }
        start += step;
    }
    Ok(spans)
}

/// The context and buffers a set of helpers is bound to.
#[derive(Debug)]
pub struct TextHelpers {
    context: DictRef,
    buffers: ListRef,
}

impl TextHelpers {
    #[must_use]
    pub fn new(context: DictRef, buffers: ListRef) -> Self {
        Self { context, buffers }
    }

    /// Current `context['content']`; missing content reads as empty.
    pub fn content(&self) -> Result<Rc<str>, HelperError> {
        match self.context.borrow().get_str("content") {
            None => Ok(Rc::from("")),
            Some(Value::Str(text)) => Ok(text.clone()),
            Some(other) => Err(HelperError::ContentNotText(other.type_name())),
        }
    }

    /// `content[start:end]`, with slice semantics for negative and out-of-range indices.
    pub fn peek(&self, start: i64, end: i64) -> Result<String, HelperError> {
        let slice = Slice {
            lower: Some(start),
            upper: Some(end),
            step: None,
        };
        slice_str(&self.content()?, &slice).map_err(|err| HelperError::InvalidArgument(err.exc.message))
    }

    /// Left-to-right, non-overlapping matches of `pattern`, at most `max_matches` of them.
    pub fn pattern_search(
        &self,
        pattern: &str,
        max_matches: i64,
        window: i64,
        flags: i64,
    ) -> Result<Vec<SearchHit>, HelperError> {
        let compiled = Pattern::compile(pattern, flags).map_err(|err| HelperError::InvalidPattern(err.exc.message))?;
        self.search_compiled(&Rc::new(compiled), max_matches, window)
    }

    fn search_compiled(
        &self,
        pattern: &Rc<Pattern>,
        max_matches: i64,
        window: i64,
    ) -> Result<Vec<SearchHit>, HelperError> {
        if max_matches <= 0 {
            return Ok(Vec::new());
        }
        let content = self.content()?;
        let limit = usize::try_from(max_matches).unwrap_or(usize::MAX);
        let window = usize::try_from(window).unwrap_or(0);
        let found = pattern
            .find_all(&content, 0, limit)
            .map_err(|err| HelperError::InvalidPattern(err.exc.message))?;
        let len = content.chars().count();
        let hits = found
            .iter()
            .filter_map(|m| {
                let (start, end) = m.span(0)?;
                let snippet = char_slice(&content, start.saturating_sub(window), len.min(end.saturating_add(window)));
                Some(SearchHit {
                    matched: m.group_str(0).unwrap_or_default(),
                    span: (start, end),
                    snippet: snippet.to_owned(),
                })
            })
            .collect();
        Ok(hits)
    }

    /// Chunk spans over the current content; see [`chunk_indices`].
    pub fn chunk_indices(&self, size: i64, overlap: i64) -> Result<Vec<(usize, usize)>, HelperError> {
        chunk_indices(self.content()?.chars().count(), size, overlap)
    }

    /// Writes each chunk to `out_dir/<prefix>_NNNN.txt`, creating the directory, and returns the paths.
    pub fn write_chunks(
        &self,
        out_dir: &Path,
        size: i64,
        overlap: i64,
        prefix: &str,
    ) -> Result<Vec<PathBuf>, HelperError> {
        let content = self.content()?;
        let boundaries = char_boundaries(&content);
        let spans = chunk_indices(boundaries.len() - 1, size, overlap)?;
        fs::create_dir_all(out_dir).map_err(|source| HelperError::Io {
            path: out_dir.to_owned(),
            source,
        })?;
        let mut paths = Vec::with_capacity(spans.len());
        for (i, (start, end)) in spans.into_iter().enumerate() {
            let path = out_dir.join(format!("{prefix}_{i:04}.txt"));
            fs::write(&path, &content[boundaries[start]..boundaries[end]])
                .map_err(|source| HelperError::Io { path: path.clone(), source })?;
            paths.push(path);
        }
        tracing::debug!(dir = %out_dir.display(), chunks = paths.len(), "wrote chunks");
        Ok(paths)
    }

    /// Appends `text` to the buffers list.
    pub fn add_buffer(&self, text: String) {
        self.buffers.borrow_mut().push(Value::from(text));
    }
}

/// Byte offset of every character plus the end of the string.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

/// A helper bound to one environment, as stored in the namespace.
#[derive(Debug, Clone)]
pub struct BoundHelper {
    pub kind: HelperKind,
    pub helpers: Rc<TextHelpers>,
}

impl BoundHelper {
    #[must_use]
    pub fn new(kind: HelperKind, helpers: Rc<TextHelpers>) -> Self {
        Self { kind, helpers }
    }
}

fn spans_value(spans: &[(usize, usize)]) -> Value {
    Value::list(
        spans
            .iter()
            .map(|(start, end)| Value::tuple(vec![Value::from(*start), Value::from(*end)]))
            .collect(),
    )
}

/// Calls a helper from snippet code.
pub(crate) fn call(helper: &BoundHelper, args: CallArgs) -> RunResult<Value> {
    let helpers = &helper.helpers;
    let name = helper.kind.name();
    match helper.kind {
        HelperKind::Peek => {
            let [start, end] = args.bind(name, ["start", "end"], 0)?;
            let start = int_or(start, 0, "start")?;
            let end = int_or(end, DEFAULT_PEEK_END, "end")?;
            Ok(Value::from(helpers.peek(start, end)?))
        }
        HelperKind::Grep | HelperKind::PatternSearch => {
            let [pattern, max_matches, window, flags] =
                args.bind(name, ["pattern", "max_matches", "window", "flags"], 1)?;
            let max_matches = int_or(max_matches, DEFAULT_MAX_MATCHES, "max_matches")?;
            let window = int_or(window, DEFAULT_WINDOW, "window")?;
            let flags = flags_arg(flags)?;
            let hits = match pattern.unwrap_or(Value::None) {
                Value::Pattern(compiled) => {
                    if flags != 0 {
                        return Err(ExcType::value_error("cannot process flags argument with a compiled pattern"));
                    }
                    helpers.search_compiled(&compiled, max_matches, window)?
                }
                other => helpers.pattern_search(expect_str(&other, "pattern")?, max_matches, window, flags)?,
            };
            Ok(Value::list(hits.into_iter().map(SearchHit::into_value).collect()))
        }
        HelperKind::ChunkIndices => {
            let [size, overlap] = args.bind(name, ["size", "overlap"], 0)?;
            let size = int_or(size, DEFAULT_CHUNK_SIZE, "size")?;
            let overlap = int_or(overlap, 0, "overlap")?;
            Ok(spans_value(&helpers.chunk_indices(size, overlap)?))
        }
        HelperKind::WriteChunks => {
            let [out_dir, size, overlap, prefix, encoding] =
                args.bind(name, ["out_dir", "size", "overlap", "prefix", "encoding"], 1)?;
            let out_dir = out_dir.unwrap_or(Value::None);
            let out_dir = expect_str(&out_dir, "out_dir")?;
            let size = int_or(size, DEFAULT_CHUNK_SIZE, "size")?;
            let overlap = int_or(overlap, 0, "overlap")?;
            let prefix = match &prefix {
                None | Some(Value::None) => "chunk",
                Some(value) => expect_str(value, "prefix")?,
            };
            if let Some(encoding) = &encoding {
                let encoding = expect_str(encoding, "encoding")?;
                if !matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8") {
                    return Err(ExcType::value_error(format_args!("unsupported encoding: {encoding}")));
                }
            }
            let paths = helpers.write_chunks(Path::new(out_dir), size, overlap, prefix)?;
            Ok(Value::list(
                paths
                    .into_iter()
                    .map(|path| Value::from(path.to_string_lossy().into_owned()))
                    .collect(),
            ))
        }
        HelperKind::AddBuffer => {
            let [text] = args.bind(name, ["text"], 1)?;
            helpers.add_buffer(text.unwrap_or(Value::None).py_str());
            Ok(Value::None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn helpers_for(content: &str) -> TextHelpers {
        let mut context = Dict::new();
        context.set_str("content", Value::from(content));
        TextHelpers::new(Rc::new(RefCell::new(context)), Rc::new(RefCell::new(Vec::new())))
    }

    #[test]
    fn chunk_indices_clips_the_last_window() {
        assert_eq!(chunk_indices(10, 4, 0).unwrap(), vec![(0, 4), (4, 8), (8, 10)]);
        assert_eq!(chunk_indices(10, 4, 1).unwrap(), vec![(0, 4), (3, 7), (6, 10)]);
        assert_eq!(chunk_indices(3, 10, 5).unwrap(), vec![(0, 3)]);
        assert_eq!(chunk_indices(0, 10, 0).unwrap(), vec![(0, 0)]);
    }

    #[test]
    fn chunk_count_matches_closed_form() {
        for n in 1..60usize {
            let chars: Vec<char> = "aé✓𝄞ß ".chars().cycle().take(n).collect();
            let content: String = chars.iter().collect();
            for size in 1..8i64 {
                for overlap in 0..size {
                    let spans = chunk_indices(n, size, overlap).unwrap();
                    let mut rebuilt = String::new();
                    for (i, &(start, end)) in spans.iter().enumerate() {
                        let skip = if i == 0 { 0 } else { overlap as usize };
                        rebuilt.extend(&chars[start + skip..end]);
                    }
                    assert_eq!(rebuilt, content, "n={n} size={size} overlap={overlap}");
                    let step = (size - overlap) as usize;
                    let expected = if n > overlap as usize {
                        (n - overlap as usize).div_ceil(step)
                    } else {
                        1
                    };
                    assert_eq!(spans.len(), expected, "n={n} size={size} overlap={overlap}");
                    assert_eq!(spans.last().map(|s| s.1), Some(n));
                }
            }
        }
    }

    #[test]
    fn chunk_indices_rejects_bad_arguments() {
        for (size, overlap) in [(0, 0), (5, -1), (5, 5)] {
            assert!(matches!(
                chunk_indices(10, size, overlap),
                Err(HelperError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn peek_behaves_like_slicing() {
        let helpers = helpers_for("héllo world");
        assert_eq!(helpers.peek(0, 5).unwrap(), "héllo");
        assert_eq!(helpers.peek(-5, 100).unwrap(), "world");
        assert_eq!(helpers.peek(50, 60).unwrap(), "");
    }

    #[test]
    fn pattern_search_clamps_the_window() {
        let hits = helpers_for("xxTODOyy").pattern_search("TODO", 1, 5, 0).unwrap();
        assert_eq!(
            hits,
            vec![SearchHit {
                matched: "TODO".to_owned(),
                span: (2, 6),
                snippet: "xxTODOyy".to_owned(),
            }]
        );
    }

    #[test]
    fn pattern_search_stops_at_max_matches() {
        let helpers = helpers_for("a1 b2 c3 d4");
        let hits = helpers.pattern_search(r"\d", 2, 0, 0).unwrap();
        let spans: Vec<_> = hits.iter().map(|h| h.span).collect();
        assert_eq!(spans, vec![(1, 2), (4, 5)]);
        assert!(helpers.pattern_search("(", 2, 0, 0).is_err());
    }

    #[test]
    fn non_text_content_is_reported() {
        let mut context = Dict::new();
        context.set_str("content", Value::Int(3));
        let helpers = TextHelpers::new(Rc::new(RefCell::new(context)), Rc::new(RefCell::new(Vec::new())));
        assert!(matches!(helpers.peek(0, 1), Err(HelperError::ContentNotText("int"))));
    }
}
