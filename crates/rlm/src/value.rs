use std::{
    cell::RefCell,
    cmp::Ordering,
    fmt::Write as _,
    rc::Rc,
};

use crate::{
    builtins::Builtin,
    exception::{ExcType, ExceptionValue, RunResult},
    function::Function,
    helpers::BoundHelper,
    modules::{Module, ModuleFunction, Stream, re::{MatchValue, Pattern}},
    run::MAX_CALL_DEPTH,
    types::{
        Dict, Set,
        file::FileHandle,
        str::{bytes_repr, string_repr},
    },
};

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<Dict>>;
pub type SetRef = Rc<RefCell<Set>>;
pub type FileRef = Rc<RefCell<FileHandle>>;

/// A runtime value inside the snippet interpreter.
///
/// Mutable containers are shared through `Rc<RefCell<..>>`, so aliasing follows Python's
/// reference semantics: `b = a; b.append(1)` is visible through `a`.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    List(ListRef),
    Tuple(Rc<[Value]>),
    Dict(DictRef),
    Set(SetRef),
    Range(Range),
    Slice(Rc<Slice>),
    Function(Rc<Function>),
    Builtin(Builtin),
    /// Result of `type(x)` for values whose type has no constructor binding.
    Type(&'static str),
    ExcClass(ExcType),
    Exception(Rc<ExceptionValue>),
    /// A text helper bound to the current environment's context and buffers.
    Helper(BoundHelper),
    /// A method looked up without being called, e.g. `f = text.upper`.
    Method(Rc<BoundMethod>),
    Module(Module),
    ModuleFunction(ModuleFunction),
    File(FileRef),
    Stream(Stream),
    Pattern(Rc<Pattern>),
    Match(Rc<MatchValue>),
}

#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub receiver: Value,
    pub name: String,
}

/// `range(start, stop, step)`; iteration is lazy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    #[must_use]
    pub fn len(&self) -> usize {
        let (start, stop, step) = (i128::from(self.start), i128::from(self.stop), i128::from(self.step));
        let count = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && start > stop {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        };
        usize::try_from(count).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`th element, which the caller has bounds-checked.
    #[must_use]
    pub fn nth(&self, index: usize) -> i64 {
        self.start + self.step * index as i64
    }
}

/// `slice(lower, upper, step)` as produced by `a[x:y:z]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    pub step: Option<i64>,
}

impl Slice {
    /// Resolves the slice against a sequence of `len` items, following CPython's
    /// `PySlice_AdjustIndices`. Returns `(start, stop, step, count)`.
    pub fn indices(&self, len: usize) -> RunResult<(i64, i64, i64, usize)> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(ExcType::value_error("slice step cannot be zero"));
        }
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        let clamp = |value: i64| -> i64 {
            if value < 0 {
                let shifted = value + len;
                if shifted < 0 {
                    if step < 0 { -1 } else { 0 }
                } else {
                    shifted
                }
            } else if value >= len {
                if step < 0 { len - 1 } else { len }
            } else {
                value
            }
        };
        let start = match self.lower {
            Some(v) => clamp(v),
            None if step < 0 => len - 1,
            None => 0,
        };
        let stop = match self.upper {
            Some(v) => clamp(v),
            None if step < 0 => -1,
            None => len,
        };
        let count = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && stop < start {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        };
        Ok((start, stop, step, usize::try_from(count).unwrap_or(0)))
    }

    /// Indices selected by this slice, in order.
    pub fn index_list(&self, len: usize) -> RunResult<Vec<usize>> {
        let (start, _, step, count) = self.indices(len)?;
        Ok((0..count).map(|i| (start + step * i as i64) as usize).collect())
    }
}

/// Numeric view of a value: bools are ints.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn to_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

/// Lazy iterator over an iterable value.
pub enum ValueIter {
    Values(std::vec::IntoIter<Value>),
    Range { next: i64, remaining: usize, step: i64 },
    Chars { text: Rc<str>, pos: usize },
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            Self::Values(values) => values.next(),
            Self::Range { next, remaining, step } => {
                if *remaining == 0 {
                    return None;
                }
                let value = *next;
                *remaining -= 1;
                *next = next.wrapping_add(*step);
                Some(Value::Int(value))
            }
            Self::Chars { text, pos } => {
                let ch = text[*pos..].chars().next()?;
                let start = *pos;
                *pos += ch.len_utf8();
                Some(Value::Str(text[start..*pos].into()))
            }
        }
    }
}

impl Value {
    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(items.into())
    }

    #[must_use]
    pub fn dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    #[must_use]
    pub fn set(set: Set) -> Self {
        Self::Set(Rc::new(RefCell::new(set)))
    }

    #[must_use]
    pub fn exception(exc: ExceptionValue) -> Self {
        Self::Exception(Rc::new(exc))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value of ints and bools.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(i64::from(*b))),
            Self::Int(i) => Some(Number::Int(*i)),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Python type name, as shown in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Ellipsis => "ellipsis",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::Range(_) => "range",
            Self::Slice(_) => "slice",
            Self::Function(_) | Self::Helper(_) => "function",
            Self::Builtin(_) | Self::ModuleFunction(_) => "builtin_function_or_method",
            Self::Type(_) | Self::ExcClass(_) => "type",
            Self::Exception(exc) => exc.exc_type.name(),
            Self::Method(_) => "method",
            Self::Module(_) => "module",
            Self::File(_) | Self::Stream(_) => "TextIOWrapper",
            Self::Pattern(_) => "re.Pattern",
            Self::Match(_) => "re.Match",
        }
    }

    /// `bool(value)`
    #[must_use]
    pub fn py_bool(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::List(l) => !l.borrow().is_empty(),
            Self::Tuple(t) => !t.is_empty(),
            Self::Dict(d) => !d.borrow().is_empty(),
            Self::Set(s) => !s.borrow().is_empty(),
            Self::Range(r) => !r.is_empty(),
            _ => true,
        }
    }

    /// `len(value)`, or `None` for values without a length.
    #[must_use]
    pub fn py_len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::Bytes(b) => Some(b.len()),
            Self::List(l) => Some(l.borrow().len()),
            Self::Tuple(t) => Some(t.len()),
            Self::Dict(d) => Some(d.borrow().len()),
            Self::Set(s) => Some(s.borrow().len()),
            Self::Range(r) => Some(r.len()),
            _ => None,
        }
    }

    /// `iter(value)`; containers are snapshotted so mutation during iteration is safe.
    pub fn py_iter(&self) -> RunResult<ValueIter> {
        let items = match self {
            Self::Str(s) => {
                return Ok(ValueIter::Chars {
                    text: s.clone(),
                    pos: 0,
                });
            }
            Self::Range(r) => {
                return Ok(ValueIter::Range {
                    next: r.start,
                    remaining: r.len(),
                    step: r.step,
                });
            }
            Self::List(l) => l.borrow().clone(),
            Self::Tuple(t) => t.to_vec(),
            Self::Dict(d) => d.borrow().keys().cloned().collect(),
            Self::Set(s) => s.borrow().values().cloned().collect(),
            Self::Bytes(b) => b.iter().map(|byte| Self::Int(i64::from(*byte))).collect(),
            Self::File(f) => f.borrow_mut().read_lines()?.into_iter().map(Self::from).collect(),
            _ => return Err(ExcType::not_iterable(self.type_name())),
        };
        Ok(ValueIter::Values(items.into_iter()))
    }

    /// Collects an iterable into a vector.
    pub fn to_vec(&self) -> RunResult<Vec<Self>> {
        match self {
            Self::List(l) => Ok(l.borrow().clone()),
            Self::Tuple(t) => Ok(t.to_vec()),
            _ => Ok(self.py_iter()?.collect()),
        }
    }

    /// `value == other`
    ///
    /// Self-referencing containers that never bottom out raise `RecursionError`.
    pub fn py_eq(&self, other: &Self) -> RunResult<bool> {
        self.eq_at(other, 0)
    }

    pub(crate) fn eq_at(&self, other: &Self, depth: usize) -> RunResult<bool> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(match (a, b) {
                (Number::Int(a), Number::Int(b)) => a == b,
                (a, b) => a.to_f64() == b.to_f64(),
            });
        }
        Ok(match (self, other) {
            (Self::None, Self::None) | (Self::Ellipsis, Self::Ellipsis) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || seq_eq(&a.borrow(), &b.borrow(), depth)?,
            (Self::Tuple(a), Self::Tuple(b)) => seq_eq(a, b, depth)?,
            (Self::Dict(a), Self::Dict(b)) => {
                Rc::ptr_eq(a, b) || {
                    check_compare_depth(depth)?;
                    a.borrow().eq_at(&b.borrow(), depth + 1)?
                }
            }
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b) || a.borrow().py_eq(&b.borrow()),
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Slice(a), Self::Slice(b)) => a == b,
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::ExcClass(a), Self::ExcClass(b)) => a == b,
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Helper(a), Self::Helper(b)) => a.kind == b.kind,
            (Self::Module(a), Self::Module(b)) => a == b,
            (Self::ModuleFunction(a), Self::ModuleFunction(b)) => a == b,
            (Self::File(a), Self::File(b)) => Rc::ptr_eq(a, b),
            (Self::Stream(a), Self::Stream(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.source == b.source && a.flags == b.flags,
            (Self::Match(a), Self::Match(b)) => Rc::ptr_eq(a, b),
            _ => false,
        })
    }

    /// `value is other`
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) | (Self::Ellipsis, Self::Ellipsis) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b),
            (Self::Float(_) | Self::Bytes(_) | Self::Range(_) | Self::Slice(_), _) => false,
            // only scalar kinds remain, so equality cannot recurse
            _ => self.py_eq(other).unwrap_or(false),
        }
    }

    /// Ordering used by `<`, `sorted()`, `min()` and `max()`.
    ///
    /// `Ok(None)` means the values are unordered (NaN).
    pub fn py_partial_cmp(&self, other: &Self) -> RunResult<Option<Ordering>> {
        self.cmp_at(other, 0)
    }

    fn cmp_at(&self, other: &Self, depth: usize) -> RunResult<Option<Ordering>> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(match (a, b) {
                (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
                (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
            });
        }
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Ok(Some(a.cmp(b))),
            (Self::Bytes(a), Self::Bytes(b)) => Ok(Some(a.cmp(b))),
            (Self::List(a), Self::List(b)) => {
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                seq_cmp(&a, &b, depth)
            }
            (Self::Tuple(a), Self::Tuple(b)) => seq_cmp(a, b, depth),
            _ => Err(ExcType::type_error(format_args!(
                "'<' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// `repr(value)`
    #[must_use]
    pub fn py_repr(&self) -> String {
        let mut out = String::new();
        self.repr_into(&mut out, &mut Vec::new());
        out
    }

    /// `str(value)`
    #[must_use]
    pub fn py_str(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            Self::Exception(exc) => exc.message.clone(),
            _ => self.py_repr(),
        }
    }

    /// Writes the repr, printing `[...]`/`{...}` for containers already being printed.
    fn repr_into(&self, out: &mut String, seen: &mut Vec<usize>) {
        match self {
            Self::None => out.push_str("None"),
            Self::Ellipsis => out.push_str("Ellipsis"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => out.push_str(&float_repr(*f)),
            Self::Str(s) => out.push_str(&string_repr(s)),
            Self::Bytes(b) => out.push_str(&bytes_repr(b)),
            Self::List(list) => {
                let id = Rc::as_ptr(list) as *const () as usize;
                if seen.contains(&id) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(id);
                out.push('[');
                repr_items(list.borrow().iter(), out, seen);
                out.push(']');
                seen.pop();
            }
            Self::Tuple(items) => {
                out.push('(');
                repr_items(items.iter(), out, seen);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Self::Dict(dict) => {
                let id = Rc::as_ptr(dict) as *const () as usize;
                if seen.contains(&id) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(id);
                out.push('{');
                for (i, (key, value)) in dict.borrow().items().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.repr_into(out, seen);
                    out.push_str(": ");
                    value.repr_into(out, seen);
                }
                out.push('}');
                seen.pop();
            }
            Self::Set(set) => {
                let set = set.borrow();
                if set.is_empty() {
                    out.push_str("set()");
                } else {
                    out.push('{');
                    repr_items(set.values(), out, seen);
                    out.push('}');
                }
            }
            Self::Range(r) => {
                if r.step == 1 {
                    let _ = write!(out, "range({}, {})", r.start, r.stop);
                } else {
                    let _ = write!(out, "range({}, {}, {})", r.start, r.stop, r.step);
                }
            }
            Self::Slice(s) => {
                let part = |v: Option<i64>| v.map_or_else(|| "None".to_owned(), |v| v.to_string());
                let _ = write!(out, "slice({}, {}, {})", part(s.lower), part(s.upper), part(s.step));
            }
            Self::Function(f) => {
                let _ = write!(out, "<function {} at {:p}>", f.def.name, Rc::as_ptr(f));
            }
            Self::Builtin(b) => {
                if b.is_type() {
                    let _ = write!(out, "<class '{}'>", b.name());
                } else {
                    let _ = write!(out, "<built-in function {}>", b.name());
                }
            }
            Self::Type(name) => {
                let _ = write!(out, "<class '{name}'>");
            }
            Self::ExcClass(t) => {
                let _ = write!(out, "<class '{t}'>");
            }
            Self::Exception(exc) => {
                let _ = write!(out, "{}(", exc.exc_type);
                if !exc.message.is_empty() {
                    out.push_str(&string_repr(&exc.message));
                }
                out.push(')');
            }
            Self::Helper(h) => {
                let _ = write!(out, "<function {}>", h.kind.name());
            }
            Self::Method(m) => {
                let _ = write!(
                    out,
                    "<built-in method {} of {} object>",
                    m.name,
                    m.receiver.type_name()
                );
            }
            Self::Module(m) => {
                let _ = write!(out, "<module '{}'>", m.name());
            }
            Self::ModuleFunction(f) => {
                let _ = write!(out, "<function {}>", f.qualified_name());
            }
            Self::File(f) => {
                let f = f.borrow();
                let _ = write!(
                    out,
                    "<_io.TextIOWrapper name={} mode={} encoding='UTF-8'>",
                    string_repr(&f.path),
                    string_repr(&f.mode)
                );
            }
            Self::Stream(s) => {
                let _ = write!(out, "<_io.TextIOWrapper name='<{}>' mode='w' encoding='utf-8'>", s.name());
            }
            Self::Pattern(p) => {
                let _ = write!(out, "re.compile({})", string_repr(&p.source));
            }
            Self::Match(m) => {
                let (start, end) = m.span(0).unwrap_or((0, 0));
                let matched = m.group_str(0).unwrap_or_default();
                let _ = write!(
                    out,
                    "<re.Match object; span=({start}, {end}), match={}>",
                    string_repr(&matched)
                );
            }
        }
    }
}

fn repr_items<'a>(items: impl Iterator<Item = &'a Value>, out: &mut String, seen: &mut Vec<usize>) {
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.repr_into(out, seen);
    }
}

fn check_compare_depth(depth: usize) -> RunResult<()> {
    if depth >= MAX_CALL_DEPTH {
        return Err(ExcType::recursion_error("maximum recursion depth exceeded in comparison"));
    }
    Ok(())
}

fn seq_eq(a: &[Value], b: &[Value], depth: usize) -> RunResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    check_compare_depth(depth)?;
    for (x, y) in a.iter().zip(b) {
        if !x.eq_at(y, depth + 1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn seq_cmp(a: &[Value], b: &[Value], depth: usize) -> RunResult<Option<Ordering>> {
    check_compare_depth(depth)?;
    for (x, y) in a.iter().zip(b) {
        if !x.eq_at(y, depth + 1)? {
            return x.cmp_at(y, depth + 1);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// Formats a float the way Python's `repr(float)` does: shortest round-trip digits,
/// positional between 1e-4 and 1e16, scientific with a two-digit exponent otherwise.
#[must_use]
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_owned();
    }
    let sci = format!("{:e}", f.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exp: i64 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let sign = if f < 0.0 { "-" } else { "" };
    if (-4..16).contains(&exp) {
        let point = exp + 1;
        if point <= 0 {
            format!("{sign}0.{}{digits}", "0".repeat((-point) as usize))
        } else if point as usize >= digits.len() {
            format!("{sign}{digits}{}.0", "0".repeat(point as usize - digits.len()))
        } else {
            let (int_part, frac_part) = digits.split_at(point as usize);
            format!("{sign}{int_part}.{frac_part}")
        }
    } else {
        let mantissa = if digits.len() > 1 {
            format!("{}.{}", &digits[..1], &digits[1..])
        } else {
            digits
        };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{sign}{mantissa}e{exp_sign}{:02}", exp.abs())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_matches_python() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(-2.5), "-2.5");
        assert_eq!(float_repr(123.0), "123.0");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(0.0001), "0.0001");
    }

    #[test]
    fn slice_indices_clamp_like_python() {
        let slice = Slice {
            lower: Some(-3),
            upper: None,
            step: None,
        };
        assert_eq!(slice.index_list(5).unwrap(), vec![2, 3, 4]);
        let reverse = Slice {
            lower: None,
            upper: None,
            step: Some(-2),
        };
        assert_eq!(reverse.index_list(5).unwrap(), vec![4, 2, 0]);
        let past_end = Slice {
            lower: Some(10),
            upper: Some(20),
            step: None,
        };
        assert!(past_end.index_list(5).unwrap().is_empty());
    }

    #[test]
    fn recursive_list_repr_terminates() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(inner) = &list {
            inner.borrow_mut().push(list.clone());
        }
        assert_eq!(list.py_repr(), "[1, [...]]");
    }
}
