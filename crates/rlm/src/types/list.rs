use std::cmp::Ordering;

use crate::{
    args::{CallArgs, expect_int, int_or},
    exception::{ExcType, RunResult},
    run::Interpreter,
    value::{ListRef, Value},
};

/// Normalises a possibly negative index against `len`.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

/// Position of the first element equal to `needle`.
fn position(items: &[Value], needle: &Value) -> RunResult<Option<usize>> {
    for (i, item) in items.iter().enumerate() {
        if item.py_eq(needle)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn count(items: &[Value], needle: &Value) -> RunResult<usize> {
    let mut n = 0;
    for item in items {
        if item.py_eq(needle)? {
            n += 1;
        }
    }
    Ok(n)
}

/// Sorts `items` stably, optionally by `key`, surfacing comparison errors.
pub(crate) fn sort_values(
    interp: &mut Interpreter<'_>,
    items: Vec<Value>,
    key: Option<Value>,
    reverse: bool,
) -> RunResult<Vec<Value>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let sort_key = match &key {
            Some(Value::None) | None => item.clone(),
            Some(func) => interp.call_value(func.clone(), CallArgs::new(vec![item.clone()]))?,
        };
        keyed.push((sort_key, item));
    }
    let mut error = None;
    keyed.sort_by(|(a, _), (b, _)| {
        let (a, b) = if reverse { (b, a) } else { (a, b) };
        match a.py_partial_cmp(b) {
            Ok(ordering) => ordering.unwrap_or(Ordering::Equal),
            Err(err) => {
                error.get_or_insert(err);
                Ordering::Equal
            }
        }
    });
    match error {
        Some(err) => Err(err),
        None => Ok(keyed.into_iter().map(|(_, item)| item).collect()),
    }
}

/// Calls a `list` method.
pub(crate) fn call_method(
    interp: &mut Interpreter<'_>,
    list: &ListRef,
    name: &str,
    mut args: CallArgs,
) -> RunResult<Value> {
    match name {
        "append" => {
            let item = args.get_one_arg("list.append")?;
            list.borrow_mut().push(item);
            Ok(Value::None)
        }
        "extend" => {
            let items = args.get_one_arg("list.extend")?.to_vec()?;
            list.borrow_mut().extend(items);
            Ok(Value::None)
        }
        "insert" => {
            let [index, item] = args.bind("insert", ["index", "object"], 2)?;
            let index = int_or(index, 0, "index")?;
            let mut items = list.borrow_mut();
            let len = items.len() as i64;
            let index = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(index as usize, item.unwrap_or(Value::None));
            Ok(Value::None)
        }
        "pop" => {
            let [index] = args.bind("pop", ["index"], 0)?;
            let index = int_or(index, -1, "index")?;
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(ExcType::index_error("pop from empty list"));
            }
            match normalize_index(index, items.len()) {
                Some(i) => Ok(items.remove(i)),
                None => Err(ExcType::index_error("pop index out of range")),
            }
        }
        "remove" => {
            let needle = args.get_one_arg("list.remove")?;
            let snapshot = list.borrow().clone();
            match position(&snapshot, &needle)? {
                Some(i) => {
                    list.borrow_mut().remove(i);
                    Ok(Value::None)
                }
                None => Err(ExcType::value_error("list.remove(x): x not in list")),
            }
        }
        "index" => {
            let needle = args.get_one_arg("list.index")?;
            let snapshot = list.borrow().clone();
            match position(&snapshot, &needle)? {
                Some(i) => Ok(Value::from(i)),
                None => Err(ExcType::value_error(format_args!("{} is not in list", needle.py_repr()))),
            }
        }
        "count" => {
            let needle = args.get_one_arg("list.count")?;
            let snapshot = list.borrow().clone();
            Ok(Value::from(count(&snapshot, &needle)?))
        }
        "sort" => {
            let key = args.take_keyword("key");
            let reverse = args.take_keyword("reverse").is_some_and(|r| r.py_bool());
            args.check_zero_args("list.sort")?;
            let items = list.borrow().clone();
            let sorted = sort_values(interp, items, key, reverse)?;
            *list.borrow_mut() = sorted;
            Ok(Value::None)
        }
        "reverse" => {
            args.check_zero_args("list.reverse")?;
            list.borrow_mut().reverse();
            Ok(Value::None)
        }
        "copy" => {
            args.check_zero_args("list.copy")?;
            Ok(Value::list(list.borrow().clone()))
        }
        "clear" => {
            args.check_zero_args("list.clear")?;
            list.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => Err(ExcType::attribute_error("list", name)),
    }
}

/// Calls a `tuple` method.
pub(crate) fn call_tuple_method(items: &[Value], name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "index" => {
            let needle = args.get_one_arg("tuple.index")?;
            position(items, &needle)?
                .map(Value::from)
                .ok_or_else(|| ExcType::value_error("tuple.index(x): x not in tuple"))
        }
        "count" => {
            let needle = args.get_one_arg("tuple.count")?;
            Ok(Value::from(count(items, &needle)?))
        }
        _ => Err(ExcType::attribute_error("tuple", name)),
    }
}

/// Repeats a sequence `count` times; negative counts give an empty result.
pub(crate) fn repeat(items: &[Value], count: &Value) -> RunResult<Vec<Value>> {
    let count = expect_int(count, "can't multiply sequence by non-int")?;
    let count = usize::try_from(count).unwrap_or(0);
    let mut out = Vec::with_capacity(items.len().saturating_mul(count));
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}
