//! Operators: arithmetic, comparison, membership and subscripting.

use crate::{
    exception::{ExcType, RunError, RunResult},
    expressions::{CmpOperator, Operator, UnaryOperator},
    fstring,
    types::{
        Dict,
        list::{normalize_index, repeat},
        str::char_slice,
    },
    value::{Number, Slice, Value},
};

fn unsupported(op: Operator, left: &Value, right: &Value) -> RunError {
    ExcType::type_error(format_args!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn int_overflow() -> RunError {
    ExcType::overflow_error("integer overflow")
}

/// Python floor division on ints.
fn floor_div(a: i64, b: i64) -> RunResult<i64> {
    if b == 0 {
        return Err(ExcType::zero_division("integer division or modulo by zero"));
    }
    let q = a.checked_div(b).ok_or_else(int_overflow)?;
    Ok(if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q })
}

/// Python modulo on ints: the result has the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> RunResult<i64> {
    if b == 0 {
        return Err(ExcType::zero_division("integer division or modulo by zero"));
    }
    let r = a.checked_rem(b).unwrap_or(0);
    Ok(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
}

fn float_mod(a: f64, b: f64) -> RunResult<f64> {
    if b == 0.0 {
        return Err(ExcType::zero_division("float modulo"));
    }
    let r = a % b;
    Ok(if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r })
}

fn int_pow(base: i64, exp: i64) -> RunResult<Value> {
    if exp < 0 {
        if base == 0 {
            return Err(ExcType::zero_division("0.0 cannot be raised to a negative power"));
        }
        return Ok(Value::Float((base as f64).powf(exp as f64)));
    }
    let exp = u32::try_from(exp).map_err(|_| int_overflow())?;
    base.checked_pow(exp).map(Value::Int).ok_or_else(int_overflow)
}

fn numeric_op(op: Operator, a: Number, b: Number) -> RunResult<Option<Value>> {
    use Number::{Float, Int};
    let value = match (op, a, b) {
        (Operator::Add, Int(a), Int(b)) => Value::Int(a.checked_add(b).ok_or_else(int_overflow)?),
        (Operator::Sub, Int(a), Int(b)) => Value::Int(a.checked_sub(b).ok_or_else(int_overflow)?),
        (Operator::Mult, Int(a), Int(b)) => Value::Int(a.checked_mul(b).ok_or_else(int_overflow)?),
        (Operator::FloorDiv, Int(a), Int(b)) => Value::Int(floor_div(a, b)?),
        (Operator::Mod, Int(a), Int(b)) => Value::Int(floor_mod(a, b)?),
        (Operator::Pow, Int(a), Int(b)) => int_pow(a, b)?,
        (Operator::BitAnd, Int(a), Int(b)) => Value::Int(a & b),
        (Operator::BitOr, Int(a), Int(b)) => Value::Int(a | b),
        (Operator::BitXor, Int(a), Int(b)) => Value::Int(a ^ b),
        (Operator::LShift, Int(a), Int(b)) => {
            if b < 0 {
                return Err(ExcType::value_error("negative shift count"));
            }
            let shifted = u32::try_from(b).ok().and_then(|b| a.checked_shl(b)).ok_or_else(int_overflow)?;
            if shifted >> b != a {
                return Err(int_overflow());
            }
            Value::Int(shifted)
        }
        (Operator::RShift, Int(a), Int(b)) => {
            if b < 0 {
                return Err(ExcType::value_error("negative shift count"));
            }
            Value::Int(a >> b.min(63))
        }
        (Operator::Div, a, b) => {
            let divisor = b.to_f64();
            if divisor == 0.0 {
                return Err(ExcType::zero_division("division by zero"));
            }
            Value::Float(a.to_f64() / divisor)
        }
        (Operator::BitAnd | Operator::BitOr | Operator::BitXor | Operator::LShift | Operator::RShift, _, _) => {
            return Ok(None);
        }
        (op, a, b) => {
            let (a, b) = (a.to_f64(), b.to_f64());
            Value::Float(match op {
                Operator::Add => a + b,
                Operator::Sub => a - b,
                Operator::Mult => a * b,
                Operator::FloorDiv => {
                    if b == 0.0 {
                        return Err(ExcType::zero_division("float floor division by zero"));
                    }
                    (a / b).floor()
                }
                Operator::Mod => float_mod(a, b)?,
                Operator::Pow => {
                    if a == 0.0 && b < 0.0 {
                        return Err(ExcType::zero_division("0.0 cannot be raised to a negative power"));
                    }
                    a.powf(b)
                }
                _ => return Ok(None),
            })
        }
    };
    Ok(Some(value))
}

/// Evaluates `left <op> right`.
pub fn binary_op(op: Operator, left: &Value, right: &Value) -> RunResult<Value> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return numeric_op(op, a, b)?.ok_or_else(|| unsupported(op, left, right));
    }
    match (op, left, right) {
        (Operator::Add, Value::Str(a), Value::Str(b)) => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(Value::from(out))
        }
        (Operator::Add, Value::Bytes(a), Value::Bytes(b)) => Ok(Value::Bytes([&a[..], &b[..]].concat().into())),
        (Operator::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Operator::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Operator::Mult, Value::Str(s), n) | (Operator::Mult, n, Value::Str(s)) if n.as_int().is_some() => {
            let count = usize::try_from(n.as_int().unwrap_or_default()).unwrap_or(0);
            Ok(Value::from(s.repeat(count)))
        }
        (Operator::Mult, Value::List(items), n) | (Operator::Mult, n, Value::List(items)) if n.as_int().is_some() => {
            let items = items.borrow().clone();
            Ok(Value::list(repeat(&items, n)?))
        }
        (Operator::Mult, Value::Tuple(items), n) | (Operator::Mult, n, Value::Tuple(items)) if n.as_int().is_some() => {
            Ok(Value::tuple(repeat(items, n)?))
        }
        (Operator::Mod, Value::Str(template), args) => Ok(Value::from(fstring::percent_format(template, args)?)),
        (Operator::Sub, Value::Set(a), Value::Set(b)) => Ok(Value::set(a.borrow().difference(&b.borrow()))),
        (Operator::BitOr, Value::Set(a), Value::Set(b)) => Ok(Value::set(a.borrow().union(&b.borrow()))),
        (Operator::BitAnd, Value::Set(a), Value::Set(b)) => Ok(Value::set(a.borrow().intersection(&b.borrow()))),
        (Operator::BitXor, Value::Set(a), Value::Set(b)) => {
            Ok(Value::set(a.borrow().symmetric_difference(&b.borrow())))
        }
        (Operator::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged = a.borrow().clone();
            for (key, value) in b.borrow().items() {
                merged.insert(key.clone(), value.clone())?;
            }
            Ok(Value::dict(merged))
        }
        _ => Err(unsupported(op, left, right)),
    }
}

/// Evaluates `left <op>= right`, mutating lists and dicts in place like CPython.
pub fn inplace_op(op: Operator, left: &Value, right: Value) -> RunResult<Value> {
    match (op, left) {
        (Operator::Add, Value::List(list)) => {
            let items = right.to_vec()?;
            list.borrow_mut().extend(items);
            Ok(left.clone())
        }
        (Operator::BitOr, Value::Dict(dict)) => {
            let updates = Dict::from_pairs(&right)?;
            let mut target = dict.borrow_mut();
            for (key, value) in updates.items() {
                target.insert(key.clone(), value.clone())?;
            }
            Ok(left.clone())
        }
        _ => binary_op(op, left, &right),
    }
}

pub fn unary_op(op: UnaryOperator, operand: &Value) -> RunResult<Value> {
    match (op, operand) {
        (UnaryOperator::Not, v) => Ok(Value::Bool(!v.py_bool())),
        (UnaryOperator::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOperator::Neg, v) if v.as_int().is_some() => v
            .as_int()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or_else(int_overflow),
        (UnaryOperator::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOperator::Pos, v) if v.as_int().is_some() => Ok(Value::Int(v.as_int().unwrap_or_default())),
        (UnaryOperator::Invert, v) if v.as_int().is_some() => Ok(Value::Int(!v.as_int().unwrap_or_default())),
        (op, v) => {
            let symbol = match op {
                UnaryOperator::Neg => "-",
                UnaryOperator::Pos => "+",
                _ => "~",
            };
            Err(ExcType::type_error(format_args!(
                "bad operand type for unary {symbol}: '{}'",
                v.type_name()
            )))
        }
    }
}

/// `item in container`
pub fn contains(container: &Value, item: &Value) -> RunResult<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(&**needle)),
            other => Err(ExcType::type_error(format_args!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Bytes(haystack) => match item {
            Value::Bytes(needle) => Ok(needle.is_empty() || haystack.windows(needle.len()).any(|w| w == &needle[..])),
            Value::Int(byte) => Ok(haystack.iter().any(|b| i64::from(*b) == *byte)),
            other => Err(ExcType::type_error(format_args!(
                "a bytes-like object is required, not '{}'",
                other.type_name()
            ))),
        },
        Value::List(items) => {
            let items = items.borrow().clone();
            seq_contains(&items, item)
        }
        Value::Tuple(items) => seq_contains(items, item),
        Value::Dict(dict) => dict.borrow().contains_key(item),
        Value::Set(set) => set.borrow().contains(item),
        Value::Range(r) => Ok(match item.as_number() {
            Some(Number::Int(i)) => {
                let in_bounds = if r.step > 0 { i >= r.start && i < r.stop } else { i <= r.start && i > r.stop };
                in_bounds && (i - r.start) % r.step == 0
            }
            _ => false,
        }),
        other => Err(ExcType::type_error(format_args!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn seq_contains(items: &[Value], item: &Value) -> RunResult<bool> {
    for v in items {
        if v.is(item) || v.py_eq(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Evaluates one comparison of a (possibly chained) comparison expression.
pub fn compare(op: CmpOperator, left: &Value, right: &Value) -> RunResult<bool> {
    let ordering = |left: &Value, right: &Value| -> RunResult<Option<std::cmp::Ordering>> {
        left.py_partial_cmp(right).map_err(|err| {
            if err.exc.exc_type != ExcType::TypeError {
                return err;
            }
            ExcType::type_error(format_args!(
                "'{}' not supported between instances of '{}' and '{}'",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ))
        })
    };
    Ok(match op {
        CmpOperator::Eq => left.py_eq(right)?,
        CmpOperator::NotEq => !left.py_eq(right)?,
        CmpOperator::Is => left.is(right),
        CmpOperator::IsNot => !left.is(right),
        CmpOperator::In => contains(right, left)?,
        CmpOperator::NotIn => !contains(right, left)?,
        CmpOperator::Lt => ordering(left, right)?.is_some_and(std::cmp::Ordering::is_lt),
        CmpOperator::LtE => ordering(left, right)?.is_some_and(std::cmp::Ordering::is_le),
        CmpOperator::Gt => ordering(left, right)?.is_some_and(std::cmp::Ordering::is_gt),
        CmpOperator::GtE => ordering(left, right)?.is_some_and(std::cmp::Ordering::is_ge),
    })
}

fn index_type_error(container: &Value, index: &Value) -> RunError {
    ExcType::type_error(format_args!(
        "{} indices must be integers or slices, not {}",
        container.type_name(),
        index.type_name()
    ))
}

/// `container[index]`
pub fn get_item(container: &Value, index: &Value) -> RunResult<Value> {
    match (container, index) {
        (Value::Dict(dict), key) => dict
            .borrow()
            .get(key)?
            .ok_or_else(|| ExcType::key_error(key.py_repr())),
        (Value::List(items), Value::Slice(slice)) => {
            let items = items.borrow();
            let picked = slice.index_list(items.len())?.into_iter().map(|i| items[i].clone()).collect();
            Ok(Value::list(picked))
        }
        (Value::Tuple(items), Value::Slice(slice)) => {
            let picked = slice.index_list(items.len())?.into_iter().map(|i| items[i].clone()).collect();
            Ok(Value::tuple(picked))
        }
        (Value::Str(s), Value::Slice(slice)) => Ok(Value::from(slice_str(s, slice)?)),
        (Value::Bytes(b), Value::Slice(slice)) => {
            let picked: Vec<u8> = slice.index_list(b.len())?.into_iter().map(|i| b[i]).collect();
            Ok(Value::Bytes(picked.into()))
        }
        (Value::List(items), index) if index.as_int().is_some() => {
            let items = items.borrow();
            normalize_index(index.as_int().unwrap_or_default(), items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| ExcType::index_error("list index out of range"))
        }
        (Value::Tuple(items), index) if index.as_int().is_some() => {
            normalize_index(index.as_int().unwrap_or_default(), items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| ExcType::index_error("tuple index out of range"))
        }
        (Value::Str(s), index) if index.as_int().is_some() => {
            let i = index.as_int().unwrap_or_default();
            let len = if s.is_ascii() { s.len() } else { s.chars().count() };
            normalize_index(i, len)
                .map(|i| Value::from(char_slice(s, i, i + 1)))
                .ok_or_else(|| ExcType::index_error("string index out of range"))
        }
        (Value::Bytes(b), index) if index.as_int().is_some() => {
            normalize_index(index.as_int().unwrap_or_default(), b.len())
                .map(|i| Value::Int(i64::from(b[i])))
                .ok_or_else(|| ExcType::index_error("index out of range"))
        }
        (Value::Range(r), index) if index.as_int().is_some() => {
            normalize_index(index.as_int().unwrap_or_default(), r.len())
                .map(|i| Value::Int(r.nth(i)))
                .ok_or_else(|| ExcType::index_error("range object index out of range"))
        }
        (Value::Match(m), index) => m.group_value(index),
        (Value::List(_) | Value::Tuple(_) | Value::Str(_) | Value::Bytes(_) | Value::Range(_), index) => {
            Err(index_type_error(container, index))
        }
        (other, _) => Err(ExcType::type_error(format_args!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Slices a string by character positions.
pub fn slice_str(s: &str, slice: &Slice) -> RunResult<String> {
    let len = if s.is_ascii() { s.len() } else { s.chars().count() };
    let (start, stop, step, count) = slice.indices(len)?;
    if step == 1 {
        if count == 0 {
            return Ok(String::new());
        }
        return Ok(char_slice(s, start as usize, stop as usize).to_owned());
    }
    let chars: Vec<char> = s.chars().collect();
    Ok(slice.index_list(chars.len())?.into_iter().map(|i| chars[i]).collect())
}

/// `container[index] = value`
pub fn set_item(container: &Value, index: Value, value: Value) -> RunResult<()> {
    match container {
        Value::Dict(dict) => dict.borrow_mut().insert(index, value),
        Value::List(items) => match &index {
            Value::Slice(slice) => {
                let replacement = value.to_vec()?;
                let mut items = items.borrow_mut();
                let (start, stop, step, count) = slice.indices(items.len())?;
                if step == 1 {
                    let start = start.max(0) as usize;
                    let stop = (stop.max(0) as usize).max(start);
                    items.splice(start..stop, replacement);
                    Ok(())
                } else if replacement.len() == count {
                    for (offset, item) in replacement.into_iter().enumerate() {
                        items[(start + step * offset as i64) as usize] = item;
                    }
                    Ok(())
                } else {
                    Err(ExcType::value_error(format_args!(
                        "attempt to assign sequence of size {} to extended slice of size {count}",
                        replacement.len()
                    )))
                }
            }
            index => {
                let i = index.as_int().ok_or_else(|| {
                    ExcType::type_error(format_args!(
                        "list indices must be integers or slices, not {}",
                        index.type_name()
                    ))
                })?;
                let mut items = items.borrow_mut();
                let len = items.len();
                let slot = normalize_index(i, len)
                    .ok_or_else(|| ExcType::index_error("list assignment index out of range"))?;
                items[slot] = value;
                Ok(())
            }
        },
        other => Err(ExcType::type_error(format_args!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `del container[index]`
pub fn del_item(container: &Value, index: &Value) -> RunResult<()> {
    match container {
        Value::Dict(dict) => match dict.borrow_mut().remove(index)? {
            Some(_) => Ok(()),
            None => Err(ExcType::key_error(index.py_repr())),
        },
        Value::List(items) => {
            let mut items = items.borrow_mut();
            if let Value::Slice(slice) = index {
                let mut doomed = slice.index_list(items.len())?;
                doomed.sort_unstable();
                for i in doomed.into_iter().rev() {
                    items.remove(i);
                }
                return Ok(());
            }
            let i = index.as_int().ok_or_else(|| index_type_error(&Value::list(Vec::new()), index))?;
            let len = items.len();
            let slot = normalize_index(i, len)
                .ok_or_else(|| ExcType::index_error("list assignment index out of range"))?;
            items.remove(slot);
            Ok(())
        }
        other => Err(ExcType::type_error(format_args!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}
