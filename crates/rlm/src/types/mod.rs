//! Methods and attributes of the built-in value types.

pub mod dict;
pub mod file;
pub mod list;
pub mod set;
pub mod str;

use std::rc::Rc;

pub use dict::{Dict, HashKey};
pub use set::Set;

use crate::{
    args::CallArgs,
    exception::{ExcType, RunResult},
    helpers,
    modules,
    run::Interpreter,
    value::{BoundMethod, Value},
};

/// Calls `receiver.name(*args)`.
pub(crate) fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    name: &str,
    args: CallArgs,
) -> RunResult<Value> {
    match receiver {
        Value::Str(s) => str::call_method(s, name, args),
        Value::Bytes(b) => str::call_bytes_method(b, name, args),
        Value::List(list) => list::call_method(interp, list, name, args),
        Value::Tuple(items) => list::call_tuple_method(items, name, args),
        Value::Dict(dict) => dict::call_method(dict, name, args),
        Value::Set(set) => set::call_method(set, name, args),
        Value::File(file) => file::call_method(file, name, args),
        Value::Stream(stream) => modules::sys::call_stream_method(interp, *stream, name, args),
        Value::Pattern(pattern) => modules::re::call_pattern_method(interp, pattern, name, args),
        Value::Match(m) => modules::re::call_match_method(m, name, args),
        Value::Float(f) if name == "is_integer" => {
            args.check_zero_args("float.is_integer")?;
            Ok(Value::Bool(f.fract() == 0.0))
        }
        Value::Module(_) => {
            let func = get_attr(receiver, name)?;
            interp.call_value(func, args)
        }
        other => Err(ExcType::attribute_error(other.type_name(), name)),
    }
}

/// Evaluates `value.name` outside a call.
pub(crate) fn get_attr(value: &Value, name: &str) -> RunResult<Value> {
    match (value, name) {
        (Value::Module(module), _) => modules::get_attr(*module, name),
        (Value::Exception(exc), "args") => Ok(if exc.message.is_empty() {
            Value::tuple(Vec::new())
        } else {
            Value::tuple(vec![Value::from(exc.message.as_str())])
        }),
        (Value::Function(f), "__name__") => Ok(Value::from(f.def.name.as_str())),
        (Value::Helper(h), "__name__") => Ok(Value::from(h.kind.name())),
        (Value::Helper(h), "__doc__") => Ok(Value::from(helpers::doc(h.kind))),
        (Value::Builtin(b), "__name__") => Ok(Value::from(b.name())),
        (Value::Type(t), "__name__") => Ok(Value::from(*t)),
        (Value::ExcClass(t), "__name__") => Ok(Value::from(t.name())),
        (Value::File(f), "name") => Ok(Value::from(f.borrow().path.as_str())),
        (Value::File(f), "mode") => Ok(Value::from(f.borrow().mode.as_str())),
        (Value::File(f), "closed") => Ok(Value::Bool(f.borrow().is_closed())),
        (Value::Pattern(p), "pattern") => Ok(Value::from(p.source.as_str())),
        (Value::Pattern(p), "flags") => Ok(Value::Int(p.flags)),
        (Value::Match(m), "string") => Ok(Value::Str(m.text.clone())),
        (Value::Range(r), "start") => Ok(Value::Int(r.start)),
        (Value::Range(r), "stop") => Ok(Value::Int(r.stop)),
        (Value::Range(r), "step") => Ok(Value::Int(r.step)),
        (Value::Slice(s), "start" | "stop" | "step") => {
            let part = match name {
                "start" => s.lower,
                "stop" => s.upper,
                _ => s.step,
            };
            Ok(part.map_or(Value::None, Value::Int))
        }
        _ => {
            if has_method(value, name) {
                Ok(Value::Method(Rc::new(BoundMethod {
                    receiver: value.clone(),
                    name: name.to_owned(),
                })))
            } else {
                Err(ExcType::attribute_error(value.type_name(), name))
            }
        }
    }
}

/// Whether `hasattr(value, name)` holds.
pub(crate) fn has_attr(value: &Value, name: &str) -> bool {
    get_attr(value, name).is_ok()
}

fn has_method(value: &Value, name: &str) -> bool {
    let methods: &[&str] = match value {
        Value::Str(_) => &[
            "upper", "lower", "casefold", "title", "capitalize", "swapcase", "strip", "lstrip", "rstrip", "split",
            "rsplit", "splitlines", "join", "replace", "startswith", "endswith", "find", "rfind", "index", "rindex",
            "count", "partition", "rpartition", "isdigit", "isnumeric", "isdecimal", "isalpha", "isalnum", "isspace",
            "isupper", "islower", "zfill", "ljust", "rjust", "center", "encode", "format",
        ],
        Value::Bytes(_) => &["decode", "hex"],
        Value::List(_) => &[
            "append", "extend", "insert", "pop", "remove", "index", "count", "sort", "reverse", "copy", "clear",
        ],
        Value::Tuple(_) => &["index", "count"],
        Value::Dict(_) => &[
            "get", "keys", "values", "items", "pop", "popitem", "setdefault", "update", "copy", "clear",
        ],
        Value::Set(_) => &[
            "add", "remove", "discard", "pop", "update", "union", "intersection", "difference",
            "symmetric_difference", "issubset", "issuperset", "copy", "clear",
        ],
        Value::File(_) => &["read", "readline", "readlines", "write", "writelines", "close", "flush"],
        Value::Stream(_) => &["write", "flush"],
        Value::Pattern(_) => &["search", "match", "fullmatch", "findall", "finditer", "sub", "split"],
        Value::Match(_) => &["group", "groups", "groupdict", "start", "end", "span"],
        Value::Float(_) => &["is_integer"],
        _ => &[],
    };
    methods.contains(&name)
}
