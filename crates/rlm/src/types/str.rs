use std::fmt::Write as _;

use crate::{
    args::{CallArgs, expect_int, expect_str, int_or},
    exception::{ExcType, ExceptionValue, RunResult},
    fstring,
    value::Value,
};

/// Python `repr()` of a string: single quotes unless the text contains only single quotes.
#[must_use]
pub fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python `repr()` of bytes: `b'...'` with non-printable bytes escaped.
#[must_use]
pub fn bytes_repr(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') { b'"' } else { b'\'' };
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote as char);
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push(quote as char);
    out
}

/// Byte offset of the `char_index`th character, clamped to the end of `s`.
#[must_use]
pub fn char_to_byte(s: &str, char_index: usize) -> usize {
    if s.is_ascii() {
        return char_index.min(s.len());
    }
    s.char_indices().nth(char_index).map_or(s.len(), |(i, _)| i)
}

/// Number of characters before byte offset `byte`.
#[must_use]
pub fn byte_to_char(s: &str, byte: usize) -> usize {
    if s.is_ascii() {
        return byte.min(s.len());
    }
    s[..byte.min(s.len())].chars().count()
}

/// Substring between two character indices, clamped to the string.
#[must_use]
pub fn char_slice(s: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let start_byte = char_to_byte(s, start);
    let end_byte = char_to_byte(s, end);
    &s[start_byte..end_byte]
}

/// Resolves Python's optional `start`/`end` arguments into a byte window of `s`.
fn window(s: &str, start: Option<Value>, end: Option<Value>) -> RunResult<(usize, usize)> {
    let len = i64::try_from(s.chars().count()).unwrap_or(i64::MAX);
    let resolve = |value: Option<Value>, default: i64| -> RunResult<usize> {
        let index = int_or(value, default, "slice index")?;
        let index = if index < 0 { (index + len).max(0) } else { index.min(len) };
        Ok(char_to_byte(s, index as usize))
    };
    Ok((resolve(start, 0)?, resolve(end, len)?))
}

fn split_whitespace_max(s: &str, maxsplit: i64) -> Vec<Value> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if maxsplit >= 0 && parts.len() as i64 == maxsplit {
            parts.push(Value::from(rest));
            return parts;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(Value::from(&rest[..end]));
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(Value::from(rest));
                rest = "";
            }
        }
    }
    parts
}

fn split_lines(s: &str, keepends: bool) -> Vec<Value> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let ending = match bytes[i] {
            b'\n' => 1,
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => 2,
            b'\r' => 1,
            _ => 0,
        };
        if ending > 0 {
            let end = if keepends { i + ending } else { i };
            lines.push(Value::from(&s[start..end]));
            i += ending;
            start = i;
        } else {
            i += 1;
        }
    }
    if start < s.len() {
        lines.push(Value::from(&s[start..]));
    }
    lines
}

fn strip_chars(chars: Option<Value>) -> RunResult<Option<Vec<char>>> {
    match chars {
        None | Some(Value::None) => Ok(None),
        Some(value) => Ok(Some(expect_str(&value, "strip arg")?.chars().collect())),
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_cased = false;
    for ch in s.chars() {
        if previous_cased {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        previous_cased = ch.is_alphabetic();
    }
    out
}

fn pad(s: &str, args: CallArgs, name: &str) -> RunResult<Value> {
    let [width, fill] = args.bind(name, ["width", "fillchar"], 1)?;
    let width = usize::try_from(int_or(width, 0, "width")?).unwrap_or(0);
    let fill = match &fill {
        Some(value) => {
            let fill = expect_str(value, "fillchar")?;
            let mut chars = fill.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(ExcType::type_error(
                        "The fill character must be exactly one character long",
                    ));
                }
            }
        }
        None => ' ',
    };
    let len = s.chars().count();
    if width <= len {
        return Ok(Value::from(s));
    }
    let total = width - len;
    let (left, right) = match name {
        "ljust" => (0, total),
        "rjust" => (total, 0),
        _ => {
            // CPython puts the extra fill on the left when the text length is odd
            let left = total / 2 + (total & width & 1);
            (left, total - left)
        }
    };
    let fill = fill.to_string();
    Ok(Value::from(format!("{}{s}{}", fill.repeat(left), fill.repeat(right))))
}

fn affix_matches(s: &str, affix: &Value, prefix: bool) -> RunResult<bool> {
    let check = |candidate: &Value| -> RunResult<bool> {
        let candidate = expect_str(candidate, if prefix { "startswith arg" } else { "endswith arg" })?;
        Ok(if prefix { s.starts_with(candidate) } else { s.ends_with(candidate) })
    };
    match affix {
        Value::Tuple(items) => {
            for item in items.iter() {
                if check(item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => check(other),
    }
}

/// Calls a `str` method.
pub(crate) fn call_method(s: &str, name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "upper" => {
            args.check_zero_args("str.upper")?;
            Ok(Value::from(s.to_uppercase()))
        }
        "lower" | "casefold" => {
            args.check_zero_args("str.lower")?;
            Ok(Value::from(s.to_lowercase()))
        }
        "title" => {
            args.check_zero_args("str.title")?;
            Ok(Value::from(title_case(s)))
        }
        "capitalize" => {
            args.check_zero_args("str.capitalize")?;
            let mut chars = s.chars();
            Ok(Value::from(match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                None => String::new(),
            }))
        }
        "swapcase" => {
            args.check_zero_args("str.swapcase")?;
            Ok(Value::from(
                s.chars()
                    .flat_map(|c| -> Box<dyn Iterator<Item = char>> {
                        if c.is_uppercase() {
                            Box::new(c.to_lowercase())
                        } else {
                            Box::new(c.to_uppercase())
                        }
                    })
                    .collect::<String>(),
            ))
        }
        "strip" | "lstrip" | "rstrip" => {
            let [chars] = args.bind(name, ["chars"], 0)?;
            let chars = strip_chars(chars)?;
            let matcher = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Ok(Value::from(match name {
                "strip" => s.trim_matches(matcher),
                "lstrip" => s.trim_start_matches(matcher),
                _ => s.trim_end_matches(matcher),
            }))
        }
        "split" | "rsplit" => {
            let [sep, maxsplit] = args.bind(name, ["sep", "maxsplit"], 0)?;
            let maxsplit = int_or(maxsplit, -1, "maxsplit")?;
            let parts = match sep {
                None | Some(Value::None) => {
                    if name == "split" || maxsplit < 0 {
                        split_whitespace_max(s, maxsplit)
                    } else {
                        let reversed: String = s.chars().rev().collect();
                        let mut parts: Vec<Value> = split_whitespace_max(&reversed, maxsplit)
                            .into_iter()
                            .map(|p| Value::from(p.py_str().chars().rev().collect::<String>()))
                            .collect();
                        parts.reverse();
                        parts
                    }
                }
                Some(sep) => {
                    let sep = expect_str(&sep, "sep")?;
                    if sep.is_empty() {
                        return Err(ExcType::value_error("empty separator"));
                    }
                    if maxsplit < 0 {
                        s.split(sep).map(Value::from).collect()
                    } else if name == "split" {
                        s.splitn(maxsplit as usize + 1, sep).map(Value::from).collect()
                    } else {
                        let mut parts: Vec<Value> = s.rsplitn(maxsplit as usize + 1, sep).map(Value::from).collect();
                        parts.reverse();
                        parts
                    }
                }
            };
            Ok(Value::list(parts))
        }
        "splitlines" => {
            let [keepends] = args.bind("splitlines", ["keepends"], 0)?;
            let keepends = keepends.is_some_and(|k| k.py_bool());
            Ok(Value::list(split_lines(s, keepends)))
        }
        "join" => {
            let iterable = args.get_one_arg("str.join")?;
            let mut out = String::new();
            for (i, item) in iterable.py_iter()?.enumerate() {
                let Value::Str(part) = &item else {
                    return Err(ExcType::type_error(format_args!(
                        "sequence item {i}: expected str instance, {} found",
                        item.type_name()
                    )));
                };
                if i > 0 {
                    out.push_str(s);
                }
                out.push_str(part);
            }
            Ok(Value::from(out))
        }
        "replace" => {
            let [old, new, count] = args.bind("replace", ["old", "new", "count"], 2)?;
            let old = old.unwrap_or(Value::None);
            let new = new.unwrap_or(Value::None);
            let old = expect_str(&old, "replace() argument 1")?;
            let new = expect_str(&new, "replace() argument 2")?;
            let count = int_or(count, -1, "count")?;
            Ok(Value::from(if count < 0 {
                s.replace(old, new)
            } else {
                s.replacen(old, new, count as usize)
            }))
        }
        "startswith" | "endswith" => {
            let [affix, start, end] = args.bind(name, ["prefix", "start", "end"], 1)?;
            let (start, end) = window(s, start, end)?;
            let haystack = s.get(start..end.max(start)).unwrap_or("");
            Ok(Value::Bool(affix_matches(
                haystack,
                &affix.unwrap_or(Value::None),
                name == "startswith",
            )?))
        }
        "find" | "rfind" | "index" | "rindex" => {
            let [sub, start, end] = args.bind(name, ["sub", "start", "end"], 1)?;
            let sub = sub.unwrap_or(Value::None);
            let sub = expect_str(&sub, "must be str")?;
            let (start, end) = window(s, start, end)?;
            let haystack = s.get(start..end.max(start)).unwrap_or("");
            let found = if name.starts_with('r') { haystack.rfind(sub) } else { haystack.find(sub) };
            match found {
                Some(pos) => Ok(Value::from(byte_to_char(s, start + pos))),
                None if name.ends_with("find") => Ok(Value::Int(-1)),
                None => Err(ExcType::value_error("substring not found")),
            }
        }
        "count" => {
            let [sub, start, end] = args.bind("count", ["sub", "start", "end"], 1)?;
            let sub = sub.unwrap_or(Value::None);
            let sub = expect_str(&sub, "must be str")?;
            let (start, end) = window(s, start, end)?;
            let haystack = s.get(start..end.max(start)).unwrap_or("");
            let count = if sub.is_empty() {
                haystack.chars().count() + 1
            } else {
                haystack.matches(sub).count()
            };
            Ok(Value::from(count))
        }
        "partition" | "rpartition" => {
            let sep = args.get_one_arg(name)?;
            let sep = expect_str(&sep, "sep")?;
            if sep.is_empty() {
                return Err(ExcType::value_error("empty separator"));
            }
            let found = if name == "partition" { s.find(sep) } else { s.rfind(sep) };
            let parts = match found {
                Some(pos) => [&s[..pos], sep, &s[pos + sep.len()..]],
                None if name == "partition" => [s, "", ""],
                None => ["", "", s],
            };
            Ok(Value::tuple(parts.into_iter().map(Value::from).collect()))
        }
        "isdigit" | "isnumeric" | "isdecimal" => {
            Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c.is_numeric())))
        }
        "isalpha" => Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic))),
        "isalnum" => Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphanumeric))),
        "isspace" => Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_whitespace))),
        "isupper" => Ok(Value::Bool(
            s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase),
        )),
        "islower" => Ok(Value::Bool(
            s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase),
        )),
        "zfill" => {
            let width = expect_int(&args.get_one_arg("str.zfill")?, "width")?;
            let len = s.chars().count() as i64;
            if width <= len {
                return Ok(Value::from(s));
            }
            let zeros = "0".repeat((width - len) as usize);
            Ok(Value::from(match s.strip_prefix(['-', '+']) {
                Some(rest) => format!("{}{zeros}{rest}", &s[..1]),
                None => format!("{zeros}{s}"),
            }))
        }
        "ljust" | "rjust" | "center" => pad(s, args, name),
        "encode" => {
            let _ = args.bind("encode", ["encoding", "errors"], 0)?;
            Ok(Value::Bytes(s.as_bytes().into()))
        }
        "format" => fstring::str_format(s, args),
        _ => Err(ExcType::attribute_error("str", name)),
    }
}

/// Calls a `bytes` method.
pub(crate) fn call_bytes_method(bytes: &[u8], name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "decode" => {
            let [_, errors] = args.bind("decode", ["encoding", "errors"], 0)?;
            let strict = errors.as_ref().and_then(Value::as_str).is_none_or(|e| e == "strict");
            match std::str::from_utf8(bytes) {
                Ok(text) => Ok(Value::from(text)),
                Err(err) if strict => Err(ExceptionValue::new(
                    crate::exception::ExcType::UnicodeDecodeError,
                    format!(
                        "'utf-8' codec can't decode byte 0x{:02x} in position {}: invalid start byte",
                        bytes.get(err.valid_up_to()).copied().unwrap_or_default(),
                        err.valid_up_to()
                    ),
                )
                .into()),
                Err(_) => Ok(Value::from(String::from_utf8_lossy(bytes).into_owned())),
            }
        }
        "hex" => {
            args.check_zero_args("bytes.hex")?;
            Ok(Value::from(bytes.iter().fold(String::new(), |mut out, b| {
                let _ = write!(out, "{b:02x}");
                out
            })))
        }
        _ => Err(ExcType::attribute_error("bytes", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_picks_quotes_like_python() {
        assert_eq!(string_repr("abc"), "'abc'");
        assert_eq!(string_repr("it's"), "\"it's\"");
        assert_eq!(string_repr("a\nb"), "'a\\nb'");
    }

    #[test]
    fn char_slicing_handles_multibyte_text() {
        let text = "héllo wörld";
        assert_eq!(char_slice(text, 1, 5), "éllo");
        assert_eq!(byte_to_char(text, text.find('w').unwrap()), 6);
        assert_eq!(char_slice(text, 8, 100), "rld");
    }
}
