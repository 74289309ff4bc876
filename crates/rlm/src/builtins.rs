//! Builtin functions and type constructors available to every snippet.

use std::{cmp::Ordering, fmt::Write as _, rc::Rc};

use strum::{EnumString, IntoStaticStr};

use crate::{
    args::{CallArgs, expect_int, expect_str, int_or},
    exception::{ExcType, ExceptionValue, RunResult},
    expressions::Operator,
    fstring,
    modules::Stream,
    ops,
    run::Interpreter,
    types::{self, Dict, Set, file, list::sort_values},
    value::{Range, Slice, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    Abs,
    All,
    Any,
    Bin,
    Bool,
    Bytes,
    Callable,
    Chr,
    Dict,
    Divmod,
    Enumerate,
    Filter,
    Float,
    Format,
    Getattr,
    Hasattr,
    Hex,
    Int,
    Isinstance,
    Len,
    List,
    Map,
    Max,
    Min,
    Oct,
    Open,
    Ord,
    Pow,
    Print,
    Range,
    Repr,
    Reversed,
    Round,
    Set,
    Slice,
    Sorted,
    Str,
    Sum,
    Tuple,
    Type,
    Zip,
}

impl Builtin {
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Builtins that are classes rather than functions.
    #[must_use]
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Bytes
                | Self::Dict
                | Self::Enumerate
                | Self::Filter
                | Self::Float
                | Self::Int
                | Self::List
                | Self::Map
                | Self::Range
                | Self::Reversed
                | Self::Set
                | Self::Slice
                | Self::Str
                | Self::Tuple
                | Self::Type
                | Self::Zip
        )
    }
}

/// Calls builtin `builtin`.
pub(crate) fn call(interp: &mut Interpreter<'_>, builtin: Builtin, mut args: CallArgs) -> RunResult<Value> {
    match builtin {
        Builtin::Print => print(interp, args),
        Builtin::Len => {
            let value = args.get_one_arg("len")?;
            value.py_len().map(Value::from).ok_or_else(|| {
                ExcType::type_error(format_args!("object of type '{}' has no len()", value.type_name()))
            })
        }
        Builtin::Str => {
            let [value, encoding, _errors] = args.bind("str", ["object", "encoding", "errors"], 0)?;
            match (value, encoding) {
                (None, _) => Ok(Value::from("")),
                (Some(Value::Bytes(bytes)), Some(_)) => {
                    types::str::call_bytes_method(&bytes, "decode", CallArgs::default())
                }
                (Some(value), _) => Ok(Value::from(value.py_str())),
            }
        }
        Builtin::Repr => Ok(Value::from(args.get_one_arg("repr")?.py_repr())),
        Builtin::Int => {
            let [value, base] = args.bind("int", ["x", "base"], 0)?;
            match value {
                None => Ok(Value::Int(0)),
                Some(value) => to_int(&value, base),
            }
        }
        Builtin::Float => {
            let [value] = args.bind("float", ["x"], 0)?;
            match value {
                None => Ok(Value::Float(0.0)),
                Some(value) => to_float(&value),
            }
        }
        Builtin::Bool => {
            let [value] = args.bind("bool", ["x"], 0)?;
            Ok(Value::Bool(value.is_some_and(|v| v.py_bool())))
        }
        Builtin::List => {
            let [iterable] = args.bind("list", ["iterable"], 0)?;
            Ok(Value::list(match iterable {
                Some(iterable) => iterable.to_vec()?,
                None => Vec::new(),
            }))
        }
        Builtin::Tuple => {
            let [iterable] = args.bind("tuple", ["iterable"], 0)?;
            match iterable {
                Some(Value::Tuple(items)) => Ok(Value::Tuple(items)),
                Some(iterable) => Ok(Value::tuple(iterable.to_vec()?)),
                None => Ok(Value::tuple(Vec::new())),
            }
        }
        Builtin::Set => {
            let [iterable] = args.bind("set", ["iterable"], 0)?;
            Ok(Value::set(match iterable {
                Some(iterable) => Set::from_iterable(&iterable)?,
                None => Set::new(),
            }))
        }
        Builtin::Dict => {
            let keywords = std::mem::take(&mut args.keywords);
            let [pairs] = args.bind("dict", ["mapping"], 0)?;
            let mut dict = match pairs {
                Some(pairs) => Dict::from_pairs(&pairs)?,
                None => Dict::new(),
            };
            for (key, value) in keywords {
                dict.set_str(&key, value);
            }
            Ok(Value::dict(dict))
        }
        Builtin::Bytes => {
            let [source, encoding, _errors] = args.bind("bytes", ["source", "encoding", "errors"], 0)?;
            match (source, encoding) {
                (None, _) => Ok(Value::Bytes(Vec::new().into())),
                (Some(Value::Str(s)), Some(_)) => Ok(Value::Bytes(s.as_bytes().into())),
                (Some(Value::Str(_)), None) => Err(ExcType::type_error("string argument without an encoding")),
                (Some(Value::Bytes(b)), _) => Ok(Value::Bytes(b)),
                (Some(Value::Int(n)), _) => {
                    let n = usize::try_from(n).map_err(|_| ExcType::value_error("negative count"))?;
                    Ok(Value::Bytes(vec![0; n].into()))
                }
                (Some(iterable), _) => {
                    let mut bytes = Vec::new();
                    for item in iterable.py_iter()? {
                        let byte = expect_int(&item, "bytes() item")?;
                        let byte =
                            u8::try_from(byte).map_err(|_| ExcType::value_error("bytes must be in range(0, 256)"))?;
                        bytes.push(byte);
                    }
                    Ok(Value::Bytes(bytes.into()))
                }
            }
        }
        Builtin::Range => range(args),
        Builtin::Slice => slice(args),
        Builtin::Enumerate => {
            let [iterable, start] = args.bind("enumerate", ["iterable", "start"], 1)?;
            let start = int_or(start, 0, "enumerate() start")?;
            let iterable = iterable.unwrap_or(Value::None);
            let pairs = iterable
                .py_iter()?
                .zip(start..)
                .map(|(item, index)| Value::tuple(vec![Value::Int(index), item]))
                .collect();
            Ok(Value::list(pairs))
        }
        Builtin::Zip => {
            let _ = args.take_keyword("strict");
            let columns = args
                .positional
                .iter()
                .map(Value::to_vec)
                .collect::<RunResult<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            let zipped = (0..rows)
                .map(|row| Value::tuple(columns.iter().map(|column| column[row].clone()).collect()))
                .collect();
            Ok(Value::list(zipped))
        }
        Builtin::Sorted => {
            let key = args.take_keyword("key");
            let reverse = args.take_keyword("reverse").is_some_and(|r| r.py_bool());
            let items = args.get_one_arg("sorted")?.to_vec()?;
            Ok(Value::list(sort_values(interp, items, key, reverse)?))
        }
        Builtin::Reversed => {
            let mut items = args.get_one_arg("reversed")?.to_vec()?;
            items.reverse();
            Ok(Value::list(items))
        }
        Builtin::Min => min_max(interp, args, "min", Ordering::Less),
        Builtin::Max => min_max(interp, args, "max", Ordering::Greater),
        Builtin::Sum => {
            let [iterable, start] = args.bind("sum", ["iterable", "start"], 1)?;
            let mut total = start.unwrap_or(Value::Int(0));
            if matches!(total, Value::Str(_)) {
                return Err(ExcType::type_error("sum() can't sum strings [use ''.join(seq) instead]"));
            }
            for item in iterable.unwrap_or(Value::None).py_iter()? {
                total = ops::binary_op(Operator::Add, &total, &item)?;
            }
            Ok(total)
        }
        Builtin::Abs => match args.get_one_arg("abs")? {
            Value::Float(f) => Ok(Value::Float(f.abs())),
            value => match value.as_int() {
                Some(i) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| ExcType::overflow_error("integer overflow")),
                None => Err(ExcType::type_error(format_args!(
                    "bad operand type for abs(): '{}'",
                    value.type_name()
                ))),
            },
        },
        Builtin::Any => {
            let iterable = args.get_one_arg("any")?;
            Ok(Value::Bool(iterable.py_iter()?.any(|item| item.py_bool())))
        }
        Builtin::All => {
            let iterable = args.get_one_arg("all")?;
            Ok(Value::Bool(iterable.py_iter()?.all(|item| item.py_bool())))
        }
        Builtin::Round => round(args),
        Builtin::Divmod => {
            let [a, b] = args.bind("divmod", ["a", "b"], 2)?;
            let (a, b) = (a.unwrap_or(Value::None), b.unwrap_or(Value::None));
            let quotient = ops::binary_op(Operator::FloorDiv, &a, &b)?;
            let remainder = ops::binary_op(Operator::Mod, &a, &b)?;
            Ok(Value::tuple(vec![quotient, remainder]))
        }
        Builtin::Pow => {
            let [base, exp, modulus] = args.bind("pow", ["base", "exp", "mod"], 2)?;
            let (base, exp) = (base.unwrap_or(Value::None), exp.unwrap_or(Value::None));
            match modulus {
                None | Some(Value::None) => ops::binary_op(Operator::Pow, &base, &exp),
                Some(modulus) => mod_pow(&base, &exp, &modulus),
            }
        }
        Builtin::Hex => int_to_base(&args.get_one_arg("hex")?, 16, "0x"),
        Builtin::Oct => int_to_base(&args.get_one_arg("oct")?, 8, "0o"),
        Builtin::Bin => int_to_base(&args.get_one_arg("bin")?, 2, "0b"),
        Builtin::Isinstance => {
            let [value, spec] = args.bind("isinstance", ["obj", "class_or_tuple"], 2)?;
            let (value, spec) = (value.unwrap_or(Value::None), spec.unwrap_or(Value::None));
            Ok(Value::Bool(is_instance(&value, &spec)?))
        }
        Builtin::Type => Ok(type_of(&args.get_one_arg("type")?)),
        Builtin::Open => file::open(args),
        Builtin::Hasattr => {
            let [value, name] = args.bind("hasattr", ["obj", "name"], 2)?;
            let name = name.unwrap_or(Value::None);
            let name = expect_str(&name, "hasattr(): attribute name")?;
            Ok(Value::Bool(types::has_attr(&value.unwrap_or(Value::None), name)))
        }
        Builtin::Getattr => {
            let [value, name, default] = args.bind("getattr", ["obj", "name", "default"], 2)?;
            let name = name.unwrap_or(Value::None);
            let name = expect_str(&name, "getattr(): attribute name")?;
            match (types::get_attr(&value.unwrap_or(Value::None), name), default) {
                (Err(err), Some(default)) if err.exc.exc_type == ExcType::AttributeError => Ok(default),
                (result, _) => result,
            }
        }
        Builtin::Format => {
            let [value, spec] = args.bind("format", ["value", "format_spec"], 1)?;
            let spec = match &spec {
                Some(spec) => expect_str(spec, "format() argument 2")?,
                None => "",
            };
            Ok(Value::from(fstring::format_value(&value.unwrap_or(Value::None), spec)?))
        }
        Builtin::Chr => {
            let code = expect_int(&args.get_one_arg("chr")?, "chr() argument")?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::from(c.to_string()))
                .ok_or_else(|| ExcType::value_error("chr() arg not in range(0x110000)"))
        }
        Builtin::Ord => {
            let value = args.get_one_arg("ord")?;
            let mut chars = expect_str(&value, "ord() argument")?.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
                _ => Err(ExcType::type_error(format_args!(
                    "ord() expected a character, but string of length {} found",
                    value.py_len().unwrap_or(0)
                ))),
            }
        }
        Builtin::Map => {
            if args.positional.len() < 2 {
                return Err(ExcType::type_error("map() must have at least two arguments."));
            }
            let mut positional = args.positional.into_iter();
            let func = positional.next().unwrap_or(Value::None);
            let columns = positional.map(|it| it.to_vec()).collect::<RunResult<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            let mut mapped = Vec::with_capacity(rows);
            for row in 0..rows {
                let call_args = CallArgs::new(columns.iter().map(|column| column[row].clone()).collect());
                mapped.push(interp.call_value(func.clone(), call_args)?);
            }
            Ok(Value::list(mapped))
        }
        Builtin::Filter => {
            let [func, iterable] = args.bind("filter", ["function", "iterable"], 2)?;
            let func = func.unwrap_or(Value::None);
            let mut kept = Vec::new();
            for item in iterable.unwrap_or(Value::None).py_iter()? {
                let keep = match &func {
                    Value::None => item.py_bool(),
                    func => interp.call_value(func.clone(), CallArgs::new(vec![item.clone()]))?.py_bool(),
                };
                if keep {
                    kept.push(item);
                }
            }
            Ok(Value::list(kept))
        }
        Builtin::Callable => Ok(Value::Bool(matches!(
            args.get_one_arg("callable")?,
            Value::Function(_)
                | Value::Builtin(_)
                | Value::ExcClass(_)
                | Value::Helper(_)
                | Value::Method(_)
                | Value::ModuleFunction(_)
        ))),
    }
}

/// `print(*objects, sep=' ', end='\n', file=None, flush=False)`
fn print(interp: &mut Interpreter<'_>, mut args: CallArgs) -> RunResult<Value> {
    let sep = optional_str(args.take_keyword("sep"), " ", "sep")?;
    let end = optional_str(args.take_keyword("end"), "\n", "end")?;
    let target = args.take_keyword("file");
    let _ = args.take_keyword("flush");
    if let Some((key, _)) = args.keywords.first() {
        return Err(ExcType::unexpected_keyword("print", key));
    }
    let mut text = String::new();
    for (i, value) in args.positional.iter().enumerate() {
        if i > 0 {
            text.push_str(&sep);
        }
        text.push_str(&value.py_str());
    }
    match target {
        None | Some(Value::None | Value::Stream(Stream::Stdout)) => {
            let output = interp.print();
            output.stdout_write(text.into());
            if end == "\n" {
                output.stdout_push('\n');
            } else {
                output.stdout_write(end.into());
            }
        }
        Some(Value::Stream(Stream::Stderr)) => {
            text.push_str(&end);
            interp.print().stderr_write(text.into());
        }
        Some(Value::File(handle)) => {
            text.push_str(&end);
            handle.borrow_mut().write(&Value::from(text))?;
        }
        Some(other) => {
            return Err(ExcType::attribute_error(other.type_name(), "write"));
        }
    }
    Ok(Value::None)
}

fn optional_str(value: Option<Value>, default: &str, what: &str) -> RunResult<String> {
    match value {
        None | Some(Value::None) => Ok(default.to_owned()),
        Some(Value::Str(s)) => Ok(s.to_string()),
        Some(other) => Err(ExcType::type_error(format_args!(
            "{what} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}

fn to_int(value: &Value, base: Option<Value>) -> RunResult<Value> {
    if let Some(base) = base {
        let base = expect_int(&base, "int() base")?;
        let Value::Str(text) = value else {
            return Err(ExcType::type_error("int() can't convert non-string with explicit base"));
        };
        return parse_int(text, base).map(Value::Int);
    }
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(ExcType::value_error("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(ExcType::overflow_error("cannot convert float infinity to integer"));
            }
            let truncated = f.trunc();
            if truncated.abs() >= 9.223_372_036_854_776e18 {
                return Err(ExcType::overflow_error("integer overflow"));
            }
            Ok(Value::Int(truncated as i64))
        }
        Value::Str(text) => parse_int(text, 10).map(Value::Int),
        Value::Bytes(bytes) => parse_int(&String::from_utf8_lossy(bytes), 10).map(Value::Int),
        other => Err(ExcType::type_error(format_args!(
            "int() argument must be a string, a bytes-like object or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

/// Parses an int literal the way `int(text, base)` does.
fn parse_int(text: &str, base: i64) -> RunResult<i64> {
    let invalid = || {
        ExcType::value_error(format_args!(
            "invalid literal for int() with base {base}: {}",
            types::str::string_repr(text)
        ))
    };
    if base != 0 && !(2..=36).contains(&base) {
        return Err(ExcType::value_error("int() base must be >= 2 and <= 36, or 0"));
    }
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let lower = digits.to_ascii_lowercase();
    let (radix, digits) = match (base, lower.get(..2)) {
        (0 | 16, Some("0x")) => (16, &lower[2..]),
        (0 | 8, Some("0o")) => (8, &lower[2..]),
        (0 | 2, Some("0b")) => (2, &lower[2..]),
        (0, _) => (10, lower.as_str()),
        (base, _) => (base as u32, lower.as_str()),
    };
    let digits = digits.strip_prefix('_').unwrap_or(digits);
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return Err(invalid());
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    let magnitude = i64::from_str_radix(&cleaned, radix).map_err(|err| {
        if matches!(err.kind(), std::num::IntErrorKind::PosOverflow) {
            ExcType::overflow_error("integer overflow")
        } else {
            invalid()
        }
    })?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn to_float(value: &Value) -> RunResult<Value> {
    match value {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Str(text) => {
            let trimmed = text.trim();
            let lowered = trimmed.to_ascii_lowercase();
            let unsigned = lowered.trim_start_matches(['+', '-']);
            let parsed = match unsigned {
                "inf" | "infinity" => Some(f64::INFINITY),
                "nan" => Some(f64::NAN),
                _ => trimmed.replace('_', "").parse::<f64>().ok().filter(|_| !trimmed.contains("__")),
            };
            match parsed {
                Some(f) if lowered.starts_with('-') && !f.is_finite() => Ok(Value::Float(-f)),
                Some(f) => Ok(Value::Float(f)),
                None => Err(ExcType::value_error(format_args!(
                    "could not convert string to float: {}",
                    types::str::string_repr(text)
                ))),
            }
        }
        other => match other.as_int() {
            Some(i) => Ok(Value::Float(i as f64)),
            None => Err(ExcType::type_error(format_args!(
                "float() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn range(args: CallArgs) -> RunResult<Value> {
    if !args.keywords.is_empty() {
        return Err(ExcType::type_error("range() takes no keyword arguments"));
    }
    let bounds = args
        .positional
        .iter()
        .map(|v| expect_int(v, "range() argument"))
        .collect::<RunResult<Vec<_>>>()?;
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        [] => return Err(ExcType::type_error("range expected at least 1 argument, got 0")),
        _ => return Err(ExcType::at_most("range", 3, bounds.len())),
    };
    if step == 0 {
        return Err(ExcType::value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range(Range { start, stop, step }))
}

fn slice(args: CallArgs) -> RunResult<Value> {
    if !args.keywords.is_empty() {
        return Err(ExcType::type_error("slice() takes no keyword arguments"));
    }
    let bounds = args
        .positional
        .iter()
        .map(|v| match v {
            Value::None => Ok(None),
            v => expect_int(v, "slice() argument").map(Some),
        })
        .collect::<RunResult<Vec<_>>>()?;
    let (lower, upper, step) = match bounds.as_slice() {
        [upper] => (None, *upper, None),
        [lower, upper] => (*lower, *upper, None),
        [lower, upper, step] => (*lower, *upper, *step),
        [] => return Err(ExcType::type_error("slice expected at least 1 argument, got 0")),
        _ => return Err(ExcType::at_most("slice", 3, bounds.len())),
    };
    Ok(Value::Slice(Rc::new(Slice { lower, upper, step })))
}

fn min_max(interp: &mut Interpreter<'_>, mut args: CallArgs, name: &str, keep: Ordering) -> RunResult<Value> {
    let key = args.take_keyword("key");
    let default = args.take_keyword("default");
    if let Some((key, _)) = args.keywords.first() {
        return Err(ExcType::unexpected_keyword(name, key));
    }
    let items = match args.positional.len() {
        0 => {
            return Err(ExcType::type_error(format_args!(
                "{name} expected at least 1 argument, got 0"
            )));
        }
        1 => args.positional.remove(0).to_vec()?,
        _ => args.positional,
    };
    let mut best: Option<(Value, Value)> = None;
    for item in items {
        let item_key = match &key {
            None | Some(Value::None) => item.clone(),
            Some(func) => interp.call_value(func.clone(), CallArgs::new(vec![item.clone()]))?,
        };
        let replace = match &best {
            None => true,
            Some((best_key, _)) => item_key.py_partial_cmp(best_key)? == Some(keep),
        };
        if replace {
            best = Some((item_key, item));
        }
    }
    match (best, default) {
        (Some((_, item)), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(ExcType::value_error(format_args!("{name}() iterable argument is empty"))),
    }
}

fn round(args: CallArgs) -> RunResult<Value> {
    let [number, ndigits] = args.bind("round", ["number", "ndigits"], 1)?;
    let number = number.unwrap_or(Value::None);
    let ndigits = match ndigits {
        None | Some(Value::None) => None,
        Some(n) => Some(expect_int(&n, "round() ndigits")?),
    };
    match (&number, ndigits) {
        (Value::Float(f), None) => {
            if !f.is_finite() {
                return Err(ExcType::overflow_error("cannot convert float infinity to integer"));
            }
            Ok(Value::Int(f.round_ties_even() as i64))
        }
        (Value::Float(f), Some(n)) => {
            let factor = 10f64.powi(i32::try_from(n).unwrap_or(i32::MAX));
            let scaled = f * factor;
            if !scaled.is_finite() {
                return Ok(Value::Float(*f));
            }
            Ok(Value::Float(scaled.round_ties_even() / factor))
        }
        (value, ndigits) => {
            let Some(i) = value.as_int() else {
                return Err(ExcType::type_error(format_args!(
                    "type {} doesn't define __round__ method",
                    value.type_name()
                )));
            };
            match ndigits {
                Some(n) if n < 0 => {
                    let factor = u32::try_from(-n).ok().and_then(|n| 10i64.checked_pow(n));
                    let Some(factor) = factor else {
                        return Ok(Value::Int(0));
                    };
                    let rounded = ((i as f64) / (factor as f64)).round_ties_even() as i64;
                    Ok(Value::Int(rounded * factor))
                }
                _ => Ok(Value::Int(i)),
            }
        }
    }
}

fn mod_pow(base: &Value, exp: &Value, modulus: &Value) -> RunResult<Value> {
    let (Some(base), Some(exp), Some(modulus)) = (base.as_int(), exp.as_int(), modulus.as_int()) else {
        return Err(ExcType::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    };
    if modulus == 0 {
        return Err(ExcType::value_error("pow() 3rd argument cannot be 0"));
    }
    if exp < 0 {
        return Err(ExcType::value_error("base is not invertible for the given modulus"));
    }
    let m = i128::from(modulus);
    let mut result: i128 = 1;
    let mut b = i128::from(base).rem_euclid(m);
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = (result * b).rem_euclid(m);
        }
        b = (b * b).rem_euclid(m);
        e >>= 1;
    }
    // Python gives the result the sign of the modulus
    if modulus < 0 && result != 0 {
        result += m;
    }
    Ok(Value::Int(i64::try_from(result).unwrap_or_default()))
}

fn int_to_base(value: &Value, radix: u32, prefix: &str) -> RunResult<Value> {
    let i = expect_int(value, "integer argument")?;
    let magnitude = i.unsigned_abs();
    let digits = match radix {
        16 => format!("{magnitude:x}"),
        8 => format!("{magnitude:o}"),
        _ => format!("{magnitude:b}"),
    };
    let sign = if i < 0 { "-" } else { "" };
    Ok(Value::from(format!("{sign}{prefix}{digits}")))
}

/// `isinstance(value, spec)`
pub(crate) fn is_instance(value: &Value, spec: &Value) -> RunResult<bool> {
    match spec {
        Value::Tuple(specs) => {
            for spec in specs.iter() {
                if is_instance(value, spec)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Builtin(builtin) if builtin.is_type() => Ok(match builtin {
            Builtin::Int => matches!(value, Value::Int(_) | Value::Bool(_)),
            Builtin::Type => matches!(value, Value::Type(_) | Value::ExcClass(_) | Value::Builtin(_)),
            other => value.type_name() == other.name(),
        }),
        Value::Type(name) => Ok(value.type_name() == *name),
        Value::ExcClass(exc_type) => Ok(match value {
            Value::Exception(exc) => exc.exc_type.is_subclass_of(*exc_type),
            _ => false,
        }),
        other => Err(ExcType::type_error(format_args!(
            "isinstance() arg 2 must be a type, a tuple of types, or a union, not {}",
            other.type_name()
        ))),
    }
}

/// `type(value)`
pub(crate) fn type_of(value: &Value) -> Value {
    match value {
        Value::Exception(exc) => Value::ExcClass(exc.exc_type),
        Value::Builtin(b) if b.is_type() => Value::Builtin(Builtin::Type),
        Value::ExcClass(_) | Value::Type(_) => Value::Builtin(Builtin::Type),
        other => {
            let name = other.type_name();
            match name.parse::<Builtin>() {
                Ok(builtin) if builtin.is_type() => Value::Builtin(builtin),
                _ => Value::Type(name),
            }
        }
    }
}

/// Instantiates an exception class: `ValueError("bad input")`.
pub(crate) fn new_exception(exc_type: ExcType, args: CallArgs) -> RunResult<Value> {
    if let Some((key, _)) = args.keywords.first() {
        return Err(ExcType::unexpected_keyword(exc_type.name(), key));
    }
    let message = match args.positional.as_slice() {
        [] => String::new(),
        [value] if exc_type == ExcType::KeyError => value.py_repr(),
        [value] => value.py_str(),
        values => {
            let mut text = String::from("(");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    text.push_str(", ");
                }
                let _ = write!(text, "{}", value.py_repr());
            }
            text.push(')');
            text
        }
    };
    Ok(Value::exception(ExceptionValue::new(exc_type, message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_accepts_prefixes_and_underscores() {
        assert_eq!(parse_int("  42 ", 10).unwrap(), 42);
        assert_eq!(parse_int("-0x1f", 0).unwrap(), -31);
        assert_eq!(parse_int("1_000", 10).unwrap(), 1000);
        assert_eq!(parse_int("ff", 16).unwrap(), 255);
        let err = parse_int("abc", 10).unwrap_err();
        assert_eq!(err.exc.message, "invalid literal for int() with base 10: 'abc'");
    }

    #[test]
    fn float_parsing_handles_specials() {
        assert!(matches!(to_float(&Value::from("-inf")).unwrap(), Value::Float(f) if f == f64::NEG_INFINITY));
        assert!(matches!(to_float(&Value::from(" 2.5 ")).unwrap(), Value::Float(f) if f == 2.5));
        assert!(to_float(&Value::from("x")).is_err());
    }

    #[test]
    fn rounding_is_bankers() {
        let half = |f: f64| round(CallArgs::new(vec![Value::Float(f)])).unwrap().as_int();
        assert_eq!(half(2.5), Some(2));
        assert_eq!(half(3.5), Some(4));
        assert_eq!(half(-0.5), Some(0));
    }

    #[test]
    fn builtin_names_round_trip() {
        assert_eq!("isinstance".parse::<Builtin>().unwrap(), Builtin::Isinstance);
        assert_eq!(Builtin::Print.name(), "print");
        assert!(Builtin::Dict.is_type());
        assert!(!Builtin::Len.is_type());
    }
}
