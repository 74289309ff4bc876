//! The `json` module: `dumps`/`dump` with Python's formatting and `loads`/`load` via `serde_json`.

use std::fmt::Write as _;

use strum::{EnumString, IntoStaticStr};

use crate::{
    args::{CallArgs, expect_str},
    exception::{ExcType, ExceptionValue, RunResult},
    types::Dict,
    value::{Value, float_repr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum JsonFunction {
    Dump,
    Dumps,
    Load,
    Loads,
}

struct DumpOptions {
    indent: Option<String>,
    sort_keys: bool,
    ensure_ascii: bool,
    item_separator: String,
    key_separator: String,
}

impl DumpOptions {
    fn from_args(args: &mut CallArgs) -> RunResult<Self> {
        let indent = match args.take_keyword("indent") {
            None | Some(Value::None) => None,
            Some(Value::Str(s)) => Some(s.to_string()),
            Some(value) => {
                let width = value.as_int().ok_or_else(|| {
                    ExcType::type_error(format_args!("indent must be int or str, not {}", value.type_name()))
                })?;
                Some(" ".repeat(usize::try_from(width).unwrap_or(0)))
            }
        };
        let sort_keys = args.take_keyword("sort_keys").is_some_and(|v| v.py_bool());
        let ensure_ascii = args.take_keyword("ensure_ascii").is_none_or(|v| v.py_bool());
        let default_item = if indent.is_some() { "," } else { ", " };
        let (item_separator, key_separator) = match args.take_keyword("separators") {
            None | Some(Value::None) => (default_item.to_owned(), ": ".to_owned()),
            Some(value) => {
                let parts = value.to_vec()?;
                match parts.as_slice() {
                    [item, key] => (
                        expect_str(item, "separators")?.to_owned(),
                        expect_str(key, "separators")?.to_owned(),
                    ),
                    _ => return Err(ExcType::value_error("separators must be an (item, key) pair")),
                }
            }
        };
        for ignored in ["default", "skipkeys", "allow_nan", "cls", "check_circular"] {
            args.take_keyword(ignored);
        }
        if let Some((key, _)) = args.keywords.first() {
            return Err(ExcType::unexpected_keyword("dumps", key));
        }
        Ok(Self {
            indent,
            sort_keys,
            ensure_ascii,
            item_separator,
            key_separator,
        })
    }
}

/// Serialises `value` the way `json.dumps` does.
fn dumps(value: &Value, options: &DumpOptions) -> RunResult<String> {
    let mut out = String::new();
    write_value(value, options, 0, &mut Vec::new(), &mut out)?;
    Ok(out)
}

fn newline(options: &DumpOptions, depth: usize, out: &mut String) {
    if let Some(indent) = &options.indent {
        out.push('\n');
        for _ in 0..depth {
            out.push_str(indent);
        }
    }
}

fn write_value(
    value: &Value,
    options: &DumpOptions,
    depth: usize,
    active: &mut Vec<usize>,
    out: &mut String,
) -> RunResult<()> {
    match value {
        Value::None => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => out.push_str(&float_text(*f)),
        Value::Str(s) => write_string(s, options.ensure_ascii, out),
        Value::List(_) | Value::Tuple(_) => {
            let items = value.to_vec()?;
            let id = container_id(value);
            enter(active, id)?;
            if items.is_empty() {
                out.push_str("[]");
            } else {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(&options.item_separator);
                    }
                    newline(options, depth + 1, out);
                    write_value(item, options, depth + 1, active, out)?;
                }
                newline(options, depth, out);
                out.push(']');
            }
            active.retain(|other| Some(*other) != id);
        }
        Value::Dict(dict) => {
            let id = container_id(value);
            enter(active, id)?;
            let mut entries = Vec::new();
            for (key, item) in dict.borrow().items() {
                entries.push((key_text(key)?, item.clone()));
            }
            if options.sort_keys {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
            }
            if entries.is_empty() {
                out.push_str("{}");
            } else {
                out.push('{');
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(&options.item_separator);
                    }
                    newline(options, depth + 1, out);
                    write_string(key, options.ensure_ascii, out);
                    out.push_str(&options.key_separator);
                    write_value(item, options, depth + 1, active, out)?;
                }
                newline(options, depth, out);
                out.push('}');
            }
            active.retain(|other| Some(*other) != id);
        }
        other => {
            return Err(ExcType::type_error(format_args!(
                "Object of type {} is not JSON serializable",
                other.type_name()
            )));
        }
    }
    Ok(())
}

fn container_id(value: &Value) -> Option<usize> {
    match value {
        Value::List(list) => Some(std::rc::Rc::as_ptr(list) as *const () as usize),
        Value::Dict(dict) => Some(std::rc::Rc::as_ptr(dict) as *const () as usize),
        _ => None,
    }
}

fn enter(active: &mut Vec<usize>, id: Option<usize>) -> RunResult<()> {
    if let Some(id) = id {
        if active.contains(&id) {
            return Err(ExcType::value_error("Circular reference detected"));
        }
        active.push(id);
    }
    Ok(())
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_owned()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else {
        float_repr(f)
    }
}

fn key_text(key: &Value) -> RunResult<String> {
    match key {
        Value::Str(s) => Ok(s.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(float_text(*f)),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_owned()),
        Value::None => Ok("null".to_owned()),
        other => Err(ExcType::type_error(format_args!(
            "keys must be str, int, float, bool or None, not {}",
            other.type_name()
        ))),
    }
}

fn write_string(s: &str, ensure_ascii: bool, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c if ensure_ascii && !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Parses JSON text into snippet values, raising `JSONDecodeError` on malformed input.
pub(crate) fn loads(text: &str) -> RunResult<Value> {
    let parsed: serde_json::Value = serde_json::from_str(text).map_err(|err| {
        ExceptionValue::new(
            ExcType::JSONDecodeError,
            format!("{}: line {} column {}", err, err.line(), err.column()),
        )
    })?;
    Ok(from_json(parsed))
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => Value::list(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let mut dict = Dict::new();
            for (key, item) in map {
                dict.set_str(&key, from_json(item));
            }
            Value::dict(dict)
        }
    }
}

pub(crate) fn call(function: JsonFunction, mut args: CallArgs) -> RunResult<Value> {
    match function {
        JsonFunction::Dumps => {
            let options = DumpOptions::from_args(&mut args)?;
            let value = args.get_one_arg("dumps")?;
            Ok(Value::from(dumps(&value, &options)?))
        }
        JsonFunction::Dump => {
            let options = DumpOptions::from_args(&mut args)?;
            let mut positional = args.positional.into_iter();
            let (Some(value), Some(target), None) = (positional.next(), positional.next(), positional.next()) else {
                return Err(ExcType::type_error("dump() takes exactly 2 positional arguments"));
            };
            let Value::File(file) = &target else {
                return Err(ExcType::attribute_error(target.type_name(), "write"));
            };
            file.borrow_mut().write(&Value::from(dumps(&value, &options)?))?;
            Ok(Value::None)
        }
        JsonFunction::Loads => {
            let text = args.get_one_arg("loads")?;
            match &text {
                Value::Str(s) => loads(s),
                Value::Bytes(b) => loads(&String::from_utf8_lossy(b)),
                other => Err(ExcType::type_error(format_args!(
                    "the JSON object must be str, bytes or bytearray, not {}",
                    other.type_name()
                ))),
            }
        }
        JsonFunction::Load => {
            let source = args.get_one_arg("load")?;
            let Value::File(file) = &source else {
                return Err(ExcType::attribute_error(source.type_name(), "read"));
            };
            let text = file.borrow_mut().read()?;
            match &text {
                Value::Str(s) => loads(s),
                Value::Bytes(b) => loads(&String::from_utf8_lossy(b)),
                _ => Ok(Value::None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact() -> DumpOptions {
        DumpOptions::from_args(&mut CallArgs::default()).unwrap()
    }

    #[test]
    fn dumps_uses_python_separators() {
        let mut dict = Dict::new();
        dict.set_str("a", Value::Int(1));
        dict.set_str("b", Value::list(vec![Value::Bool(true), Value::None, Value::Float(1.5)]));
        assert_eq!(dumps(&Value::dict(dict), &compact()).unwrap(), r#"{"a": 1, "b": [true, null, 1.5]}"#);
    }

    #[test]
    fn dumps_indents_nested_containers() {
        let mut args = CallArgs::default();
        args.keywords.push(("indent".to_owned(), Value::Int(2)));
        let options = DumpOptions::from_args(&mut args).unwrap();
        let value = Value::list(vec![Value::Int(1), Value::list(Vec::new())]);
        assert_eq!(dumps(&value, &options).unwrap(), "[\n  1,\n  []\n]");
    }

    #[test]
    fn non_ascii_is_escaped_by_default() {
        assert_eq!(
            dumps(&Value::from("é😀"), &compact()).unwrap(),
            r#""\u00e9\ud83d\ude00""#
        );
    }

    #[test]
    fn loads_preserves_key_order_and_reports_errors() {
        let value = loads(r#"{"z": 1, "a": [1, 2.5, "x"]}"#).unwrap();
        assert_eq!(value.py_repr(), "{'z': 1, 'a': [1, 2.5, 'x']}");
        let err = loads("{oops").unwrap_err();
        assert_eq!(err.exc.exc_type, ExcType::JSONDecodeError);
    }
}
