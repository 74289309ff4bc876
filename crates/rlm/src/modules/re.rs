//! The `re` module, backed by `fancy_regex` for lookaround and backreference support.

use std::rc::Rc;

use fancy_regex::{Captures, Regex};
use strum::{EnumString, IntoStaticStr};

use crate::{
    args::{CallArgs, expect_int, expect_str, int_or},
    exception::{ExcType, RunError, RunResult},
    run::Interpreter,
    types::{
        Dict,
        str::{byte_to_char, char_to_byte, string_repr},
    },
    value::Value,
};

pub const IGNORECASE: i64 = 2;
pub const MULTILINE: i64 = 8;
pub const DOTALL: i64 = 16;
pub const VERBOSE: i64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ReFunction {
    Compile,
    Escape,
    Findall,
    Finditer,
    Fullmatch,
    Match,
    Search,
    Split,
    Sub,
    Subn,
}

/// A compiled regular expression.
#[derive(Debug)]
pub struct Pattern {
    /// Pattern text as written by the snippet.
    pub source: String,
    pub flags: i64,
    /// Inline flag group applied in front of every compiled variant, e.g. `(?im)`.
    prefix: String,
    /// `source` rewritten into `fancy_regex` syntax.
    translated: String,
    regex: Regex,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Search,
    Start,
    Full,
}

impl Pattern {
    pub fn compile(source: &str, flags: i64) -> RunResult<Self> {
        let translated = translate(source);
        let mut inline = String::new();
        for (bit, flag) in [(IGNORECASE, 'i'), (MULTILINE, 'm'), (DOTALL, 's'), (VERBOSE, 'x')] {
            if flags & bit != 0 {
                inline.push(flag);
            }
        }
        let prefix = if inline.is_empty() { String::new() } else { format!("(?{inline})") };
        let regex = build_regex(&format!("{prefix}{translated}"), source)?;
        Ok(Self {
            source: source.to_owned(),
            flags,
            prefix,
            translated,
            regex,
        })
    }

    fn group_names(&self) -> Vec<Option<String>> {
        self.regex.capture_names().map(|name| name.map(str::to_owned)).collect()
    }

    fn group_count(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }

    /// Finds one match starting the scan at byte `pos`.
    fn find_at(self: &Rc<Self>, text: &Rc<str>, pos: usize, anchor: Anchor) -> RunResult<Option<MatchValue>> {
        let full;
        let regex = if anchor == Anchor::Full {
            full = build_regex(&format!("{}(?:{})\\z", self.prefix, self.translated), &self.source)?;
            &full
        } else {
            &self.regex
        };
        let Some(caps) = regex.captures_from_pos(text, pos).map_err(runtime_error)? else {
            return Ok(None);
        };
        let found = MatchValue::new(self, text, &caps);
        if anchor != Anchor::Search && found.byte_span(0).is_none_or(|(start, _)| start != pos) {
            return Ok(None);
        }
        Ok(Some(found))
    }

    /// All non-overlapping matches from byte `pos`, allowing an empty match right after a non-empty one.
    pub(crate) fn find_all(self: &Rc<Self>, text: &Rc<str>, pos: usize, limit: usize) -> RunResult<Vec<MatchValue>> {
        let mut found = Vec::new();
        let mut at = pos;
        while at <= text.len() && (limit == 0 || found.len() < limit) {
            let Some(caps) = self.regex.captures_from_pos(text, at).map_err(runtime_error)? else {
                break;
            };
            let m = MatchValue::new(self, text, &caps);
            let Some((start, end)) = m.byte_span(0) else {
                break;
            };
            found.push(m);
            at = if start == end {
                match text[end..].chars().next() {
                    Some(c) => end + c.len_utf8(),
                    None => break,
                }
            } else {
                end
            };
        }
        Ok(found)
    }
}

fn build_regex(pattern: &str, source: &str) -> RunResult<Regex> {
    Regex::new(pattern).map_err(|err| {
        ExcType::value_error(format_args!("invalid regular expression {}: {err}", string_repr(source)))
    })
}

fn runtime_error(err: fancy_regex::Error) -> RunError {
    crate::exception::ExceptionValue::new(ExcType::RuntimeError, format!("regular expression failed: {err}")).into()
}

/// Rewrites Python-only syntax: `\Z` and `(?P=name)`.
fn translate(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('Z') => out.push_str("\\z"),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '(' if source_starts(&chars, "?P=") => {
                for _ in 0..3 {
                    chars.next();
                }
                out.push_str("\\k<");
                for c in chars.by_ref() {
                    if c == ')' {
                        break;
                    }
                    out.push(c);
                }
                out.push('>');
            }
            _ => out.push(c),
        }
    }
    out
}

fn source_starts(chars: &std::iter::Peekable<std::str::Chars<'_>>, prefix: &str) -> bool {
    chars.clone().take(prefix.len()).eq(prefix.chars())
}

/// Result of a successful match.
#[derive(Debug)]
pub struct MatchValue {
    pub text: Rc<str>,
    /// Byte span of each group; `None` when the group did not participate.
    spans: Vec<Option<(usize, usize)>>,
    pattern: Rc<Pattern>,
}

impl MatchValue {
    fn new(pattern: &Rc<Pattern>, text: &Rc<str>, caps: &Captures<'_>) -> Self {
        Self {
            text: text.clone(),
            spans: (0..caps.len()).map(|i| caps.get(i).map(|m| (m.start(), m.end()))).collect(),
            pattern: pattern.clone(),
        }
    }

    fn byte_span(&self, group: usize) -> Option<(usize, usize)> {
        self.spans.get(group).copied().flatten()
    }

    /// Character span of `group`.
    #[must_use]
    pub fn span(&self, group: usize) -> Option<(usize, usize)> {
        let (start, end) = self.byte_span(group)?;
        Some((byte_to_char(&self.text, start), byte_to_char(&self.text, end)))
    }

    #[must_use]
    pub fn group_str(&self, group: usize) -> Option<String> {
        let (start, end) = self.byte_span(group)?;
        Some(self.text[start..end].to_owned())
    }

    fn group_or(&self, group: usize, default: &Value) -> Value {
        self.group_str(group).map_or_else(|| default.clone(), Value::from)
    }

    /// Resolves a group reference given as an index or a name.
    fn group_index(&self, group: &Value) -> RunResult<usize> {
        let index = match group {
            Value::Str(name) => self
                .pattern
                .group_names()
                .iter()
                .position(|n| n.as_deref() == Some(&**name)),
            other => other.as_int().and_then(|i| usize::try_from(i).ok()),
        };
        index
            .filter(|i| *i < self.spans.len())
            .ok_or_else(|| ExcType::index_error("no such group"))
    }

    /// `m[group]`
    pub(crate) fn group_value(&self, group: &Value) -> RunResult<Value> {
        Ok(self.group_or(self.group_index(group)?, &Value::None))
    }

    fn position(&self, group: usize, end: bool) -> i64 {
        self.span(group).map_or(-1, |(s, e)| {
            let pos = if end { e } else { s };
            i64::try_from(pos).unwrap_or(i64::MAX)
        })
    }
}

/// Expands `\1`, `\g<name>` and escape sequences in a `sub()` replacement template.
fn expand_template(template: &str, m: &MatchValue) -> RunResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('g') if chars.peek() == Some(&'<') => {
                chars.next();
                let name: String = chars.by_ref().take_while(|c| *c != '>').collect();
                let group = match name.parse::<i64>() {
                    Ok(index) => Value::Int(index),
                    Err(_) => Value::from(name.as_str()),
                };
                let index = m
                    .group_index(&group)
                    .map_err(|_| ExcType::index_error(format_args!("unknown group name '{name}'")))?;
                out.push_str(&m.group_str(index).unwrap_or_default());
            }
            Some(d) if d.is_ascii_digit() => {
                let mut number = String::from(d);
                if let Some(next) = chars.peek().filter(|c| c.is_ascii_digit()) {
                    number.push(*next);
                    chars.next();
                }
                let index: usize = number.parse().unwrap_or(0);
                if index >= m.spans.len() {
                    return Err(ExcType::index_error(format_args!("invalid group reference {index}")));
                }
                out.push_str(&m.group_str(index).unwrap_or_default());
            }
            Some(other) if other.is_ascii_alphabetic() => {
                return Err(ExcType::value_error(format_args!("bad escape \\{other}")));
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err(ExcType::value_error("bad escape (end of pattern)")),
        }
    }
    Ok(out)
}

/// `re.escape(text)`
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "()[]{}?*+-|^$\\.&~# \t\n\r\x0b\x0c".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn text_arg(value: Option<Value>, what: &str) -> RunResult<Rc<str>> {
    match value {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(ExcType::type_error(format_args!(
            "{what}: expected string, got '{}'",
            other.type_name()
        ))),
        None => Err(ExcType::type_error(format_args!("{what}: missing string argument"))),
    }
}

fn compile_arg(pattern: Option<Value>, flags: Option<Value>) -> RunResult<Rc<Pattern>> {
    let flags = int_or(flags, 0, "flags")?;
    match pattern {
        Some(Value::Pattern(p)) => Ok(p),
        Some(Value::Str(source)) => Ok(Rc::new(Pattern::compile(&source, flags)?)),
        Some(other) => Err(ExcType::type_error(format_args!(
            "first argument must be string or compiled pattern, not '{}'",
            other.type_name()
        ))),
        None => Err(ExcType::missing_argument("re", "pattern")),
    }
}

/// Calls `re.<function>(...)`.
pub(crate) fn call(interp: &mut Interpreter<'_>, function: ReFunction, args: CallArgs) -> RunResult<Value> {
    match function {
        ReFunction::Compile => {
            let [pattern, flags] = args.bind("compile", ["pattern", "flags"], 1)?;
            Ok(Value::Pattern(compile_arg(pattern, flags)?))
        }
        ReFunction::Escape => {
            let text = args.get_one_arg("escape")?;
            Ok(Value::from(escape(expect_str(&text, "escape() argument")?)))
        }
        ReFunction::Search | ReFunction::Match | ReFunction::Fullmatch | ReFunction::Findall | ReFunction::Finditer => {
            let name: &'static str = function.into();
            let [pattern, string, flags] = args.bind(name, ["pattern", "string", "flags"], 2)?;
            let pattern = compile_arg(pattern, flags)?;
            let text = text_arg(string, name)?;
            scan(&pattern, name, &text, 0)
        }
        ReFunction::Sub | ReFunction::Subn => {
            let name: &'static str = function.into();
            let [pattern, repl, string, count, flags] =
                args.bind(name, ["pattern", "repl", "string", "count", "flags"], 3)?;
            let pattern = compile_arg(pattern, flags)?;
            let text = text_arg(string, name)?;
            let count = int_or(count, 0, "count")?;
            substitute(interp, &pattern, repl.unwrap_or(Value::None), &text, count, function == ReFunction::Subn)
        }
        ReFunction::Split => {
            let [pattern, string, maxsplit, flags] = args.bind("split", ["pattern", "string", "maxsplit", "flags"], 2)?;
            let pattern = compile_arg(pattern, flags)?;
            let text = text_arg(string, "split")?;
            split(&pattern, &text, int_or(maxsplit, 0, "maxsplit")?)
        }
    }
}

/// Runs one of the scanning operations (`search`, `findall`, ...) from character `pos`.
fn scan(pattern: &Rc<Pattern>, name: &str, text: &Rc<str>, pos: usize) -> RunResult<Value> {
    let pos = char_to_byte(text, pos);
    let single = |anchor| -> RunResult<Value> {
        Ok(pattern
            .find_at(text, pos, anchor)?
            .map_or(Value::None, |m| Value::Match(Rc::new(m))))
    };
    match name {
        "search" => single(Anchor::Search),
        "match" => single(Anchor::Start),
        "fullmatch" => single(Anchor::Full),
        "finditer" => Ok(Value::list(
            pattern
                .find_all(text, pos, 0)?
                .into_iter()
                .map(|m| Value::Match(Rc::new(m)))
                .collect(),
        )),
        _ => {
            let groups = pattern.group_count();
            let items = pattern
                .find_all(text, pos, 0)?
                .into_iter()
                .map(|m| match groups {
                    0 => m.group_or(0, &Value::from("")),
                    1 => m.group_or(1, &Value::from("")),
                    n => Value::tuple((1..=n).map(|g| m.group_or(g, &Value::from(""))).collect()),
                })
                .collect();
            Ok(Value::list(items))
        }
    }
}

fn substitute(
    interp: &mut Interpreter<'_>,
    pattern: &Rc<Pattern>,
    repl: Value,
    text: &Rc<str>,
    count: i64,
    with_count: bool,
) -> RunResult<Value> {
    let limit = usize::try_from(count).unwrap_or(0);
    let matches = pattern.find_all(text, 0, limit)?;
    let replaced = matches.len();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in matches {
        let Some((start, end)) = m.byte_span(0) else {
            continue;
        };
        out.push_str(&text[last..start]);
        match &repl {
            Value::Str(template) => out.push_str(&expand_template(template, &m)?),
            func => {
                let result = interp.call_value(func.clone(), CallArgs::new(vec![Value::Match(Rc::new(m))]))?;
                out.push_str(expect_str(&result, "sub() callback result")?);
            }
        }
        last = end;
    }
    out.push_str(&text[last..]);
    Ok(if with_count {
        Value::tuple(vec![Value::from(out), Value::from(replaced)])
    } else {
        Value::from(out)
    })
}

fn split(pattern: &Rc<Pattern>, text: &Rc<str>, maxsplit: i64) -> RunResult<Value> {
    let limit = usize::try_from(maxsplit).unwrap_or(0);
    let mut parts = Vec::new();
    let mut last = 0;
    for m in pattern.find_all(text, 0, limit)? {
        let Some((start, end)) = m.byte_span(0) else {
            continue;
        };
        parts.push(Value::from(&text[last..start]));
        for group in 1..m.spans.len() {
            parts.push(m.group_or(group, &Value::None));
        }
        last = end;
    }
    parts.push(Value::from(&text[last..]));
    Ok(Value::list(parts))
}

/// Calls a method on a compiled pattern.
pub(crate) fn call_pattern_method(
    interp: &mut Interpreter<'_>,
    pattern: &Rc<Pattern>,
    name: &str,
    args: CallArgs,
) -> RunResult<Value> {
    match name {
        "search" | "match" | "fullmatch" | "findall" | "finditer" => {
            let [string, pos] = args.bind(name, ["string", "pos"], 1)?;
            let text = text_arg(string, name)?;
            let pos = usize::try_from(int_or(pos, 0, "pos")?).unwrap_or(0);
            scan(pattern, name, &text, pos)
        }
        "sub" | "subn" => {
            let [repl, string, count] = args.bind(name, ["repl", "string", "count"], 2)?;
            let text = text_arg(string, name)?;
            let count = int_or(count, 0, "count")?;
            substitute(interp, pattern, repl.unwrap_or(Value::None), &text, count, name == "subn")
        }
        "split" => {
            let [string, maxsplit] = args.bind("split", ["string", "maxsplit"], 1)?;
            let text = text_arg(string, "split")?;
            split(pattern, &text, int_or(maxsplit, 0, "maxsplit")?)
        }
        _ => Err(ExcType::attribute_error("re.Pattern", name)),
    }
}

/// Calls a method on a match object.
pub(crate) fn call_match_method(m: &Rc<MatchValue>, name: &str, mut args: CallArgs) -> RunResult<Value> {
    match name {
        "group" => match args.positional.len() {
            0 => Ok(m.group_or(0, &Value::None)),
            1 => m.group_value(&args.positional[0]),
            _ => {
                let groups = args
                    .positional
                    .iter()
                    .map(|g| m.group_value(g))
                    .collect::<RunResult<Vec<_>>>()?;
                Ok(Value::tuple(groups))
            }
        },
        "groups" => {
            let [default] = args.bind("groups", ["default"], 0)?;
            let default = default.unwrap_or(Value::None);
            Ok(Value::tuple((1..m.spans.len()).map(|g| m.group_or(g, &default)).collect()))
        }
        "groupdict" => {
            let [default] = args.bind("groupdict", ["default"], 0)?;
            let default = default.unwrap_or(Value::None);
            let mut dict = Dict::new();
            for (index, group_name) in m.pattern.group_names().into_iter().enumerate() {
                if let Some(group_name) = group_name {
                    dict.set_str(&group_name, m.group_or(index, &default));
                }
            }
            Ok(Value::dict(dict))
        }
        "start" | "end" | "span" => {
            let group = args.positional.pop().unwrap_or(Value::Int(0));
            if !args.positional.is_empty() {
                return Err(ExcType::at_most(name, 1, args.positional.len() + 1));
            }
            let index = m.group_index(&group)?;
            Ok(match name {
                "start" => Value::Int(m.position(index, false)),
                "end" => Value::Int(m.position(index, true)),
                _ => Value::tuple(vec![
                    Value::Int(m.position(index, false)),
                    Value::Int(m.position(index, true)),
                ]),
            })
        }
        _ => Err(ExcType::attribute_error("re.Match", name)),
    }
}

/// Module-level constants: `re.I`, `re.MULTILINE`, ...
pub(crate) fn constant(name: &str) -> Option<Value> {
    let value = match name {
        "I" | "IGNORECASE" => IGNORECASE,
        "M" | "MULTILINE" => MULTILINE,
        "S" | "DOTALL" => DOTALL,
        "X" | "VERBOSE" => VERBOSE,
        "A" | "ASCII" | "U" | "UNICODE" => 0,
        _ => return None,
    };
    Some(Value::Int(value))
}

/// Checks a flags argument passed to a helper.
pub(crate) fn flags_arg(value: Option<Value>) -> RunResult<i64> {
    match value {
        None | Some(Value::None) => Ok(0),
        Some(value) => expect_int(&value, "flags"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(source: &str, flags: i64) -> Rc<Pattern> {
        Rc::new(Pattern::compile(source, flags).unwrap())
    }

    #[test]
    fn spans_are_character_offsets() {
        let text: Rc<str> = "héllo wörld".into();
        let found = compiled("w.rld", 0).find_at(&text, 0, Anchor::Search).unwrap().unwrap();
        assert_eq!(found.span(0), Some((6, 11)));
        assert_eq!(found.group_str(0).as_deref(), Some("wörld"));
    }

    #[test]
    fn empty_matches_follow_python_rules() {
        let text: Rc<str> = "abxd".into();
        let found = compiled("x*", 0).find_all(&text, 0, 0).unwrap();
        let spans: Vec<_> = found.iter().map(|m| m.span(0).unwrap()).collect();
        assert_eq!(spans, vec![(0, 0), (1, 1), (2, 3), (3, 3), (4, 4)]);
    }

    #[test]
    fn template_expansion_handles_groups() {
        let text: Rc<str> = "key=value".into();
        let pattern = compiled(r"(?P<k>\w+)=(\w+)", 0);
        let m = pattern.find_at(&text, 0, Anchor::Search).unwrap().unwrap();
        assert_eq!(expand_template(r"\2:\g<k>", &m).unwrap(), "value:key");
    }

    #[test]
    fn flags_and_anchors() {
        let text: Rc<str> = "Hello".into();
        let pattern = compiled("hello", IGNORECASE);
        assert!(pattern.find_at(&text, 0, Anchor::Full).unwrap().is_some());
        let partial = compiled("hell", 0);
        assert!(partial.find_at(&text, 0, Anchor::Start).unwrap().is_none());
        assert_eq!(translate(r"a\Z(?P=x)"), r"a\z\k<x>");
        assert_eq!(escape("a.b*c"), r"a\.b\*c");
    }
}
