//! Format-spec mini-language shared by f-strings, `format()`, `str.format` and `%`.

use crate::{
    args::CallArgs,
    exception::{ExcType, RunResult},
    expressions::Conversion,
    types::Dict,
    value::{Value, float_repr},
};

/// Parsed `[[fill]align][sign][#][0][width][grouping][.precision][type]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FormatSpec {
    fill: char,
    align: Option<char>,
    sign: Option<char>,
    alternate: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            fill: ' ',
            align: None,
            sign: None,
            alternate: false,
            width: 0,
            grouping: None,
            precision: None,
            kind: None,
        }
    }
}

fn invalid_spec(spec: &str) -> crate::exception::RunError {
    ExcType::value_error(format_args!("Invalid format specifier '{spec}'"))
}

fn parse_spec(spec: &str) -> RunResult<FormatSpec> {
    let chars: Vec<char> = spec.chars().collect();
    let mut parsed = FormatSpec::default();
    let mut i = 0;
    let is_align = |c: char| matches!(c, '<' | '>' | '=' | '^');
    if chars.len() >= 2 && is_align(chars[1]) {
        parsed.fill = chars[0];
        parsed.align = Some(chars[1]);
        i = 2;
    } else if chars.first().copied().is_some_and(is_align) {
        parsed.align = Some(chars[0]);
        i = 1;
    }
    if let Some(&c) = chars.get(i)
        && matches!(c, '+' | '-' | ' ')
    {
        parsed.sign = Some(c);
        i += 1;
    }
    if chars.get(i) == Some(&'z') {
        i += 1;
    }
    if chars.get(i) == Some(&'#') {
        parsed.alternate = true;
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        if parsed.align.is_none() {
            parsed.fill = '0';
            parsed.align = Some('=');
        }
        i += 1;
    }
    let start = i;
    while chars.get(i).is_some_and(char::is_ascii_digit) {
        i += 1;
    }
    if i > start {
        let digits: String = chars[start..i].iter().collect();
        parsed.width = digits.parse().map_err(|_| invalid_spec(spec))?;
    }
    if let Some(&c) = chars.get(i)
        && matches!(c, ',' | '_')
    {
        parsed.grouping = Some(c);
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            i += 1;
        }
        if i == start {
            return Err(ExcType::value_error("Format specifier missing precision"));
        }
        let digits: String = chars[start..i].iter().collect();
        parsed.precision = Some(digits.parse().map_err(|_| invalid_spec(spec))?);
    }
    match chars.len() - i {
        0 => {}
        1 => parsed.kind = Some(chars[i]),
        _ => return Err(invalid_spec(spec)),
    }
    Ok(parsed)
}

/// Inserts `sep` between groups of three digits.
fn group_digits(digits: &str, sep: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}

/// Pads `body` (with its `sign` prefix) to the spec width.
fn pad(spec: &FormatSpec, sign: &str, body: &str, default_align: char) -> String {
    let len = sign.chars().count() + body.chars().count();
    if spec.width <= len {
        return format!("{sign}{body}");
    }
    let fill = spec.fill.to_string();
    let total = spec.width - len;
    match spec.align.unwrap_or(default_align) {
        '<' => format!("{sign}{body}{}", fill.repeat(total)),
        '^' => {
            let left = total / 2;
            format!("{}{sign}{body}{}", fill.repeat(left), fill.repeat(total - left))
        }
        '=' => format!("{sign}{}{body}", fill.repeat(total)),
        _ => format!("{}{sign}{body}", fill.repeat(total)),
    }
}

fn sign_prefix(negative: bool, spec: &FormatSpec) -> &'static str {
    match (negative, spec.sign) {
        (true, _) => "-",
        (false, Some('+')) => "+",
        (false, Some(' ')) => " ",
        _ => "",
    }
}

/// `{:e}` with Python's two-digit signed exponent.
fn format_exponent(value: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{value:.precision$e}");
    let (mantissa, exp) = raw.split_once('e').unwrap_or((&raw, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{:02}", exp.abs())
}

fn strip_trailing_zeros(text: &str) -> String {
    if let Some((mantissa, exp)) = text.split_once(['e', 'E']) {
        let sep = if text.contains('E') { 'E' } else { 'e' };
        let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
        format!("{mantissa}{sep}{exp}")
    } else if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        text.to_owned()
    }
}

/// Python's `g` presentation type.
fn format_general(value: f64, precision: usize, alternate: bool, upper: bool) -> String {
    let precision = precision.max(1);
    if value == 0.0 {
        return "0".to_owned();
    }
    let exp_text = format!("{:.*e}", precision - 1, value);
    let exp: i64 = exp_text
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    let text = if exp >= -4 && exp < precision as i64 {
        let decimals = (precision as i64 - 1 - exp).max(0) as usize;
        format!("{value:.decimals$}")
    } else {
        format_exponent(value, precision - 1, upper)
    };
    if alternate { text } else { strip_trailing_zeros(&text) }
}

fn format_float(value: f64, spec: &FormatSpec) -> RunResult<String> {
    let negative = value < 0.0;
    let magnitude = value.abs();
    let body = if magnitude.is_nan() {
        "nan".to_owned()
    } else if magnitude.is_infinite() {
        "inf".to_owned()
    } else {
        match spec.kind {
            Some('f' | 'F') => format!("{magnitude:.*}", spec.precision.unwrap_or(6)),
            Some('e' | 'E') => format_exponent(magnitude, spec.precision.unwrap_or(6), spec.kind == Some('E')),
            Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), magnitude * 100.0),
            Some('g' | 'G') => format_general(magnitude, spec.precision.unwrap_or(6), spec.alternate, spec.kind == Some('G')),
            None => match spec.precision {
                Some(precision) => format_general(magnitude, precision, spec.alternate, false),
                None => float_repr(magnitude),
            },
            Some(other) => {
                return Err(ExcType::value_error(format_args!(
                    "Unknown format code '{other}' for object of type 'float'"
                )));
            }
        }
    };
    let body = match spec.grouping {
        Some(sep) => {
            let (int_part, rest) = body
                .find(|c: char| !c.is_ascii_digit())
                .map_or((body.as_str(), ""), |i| body.split_at(i));
            format!("{}{rest}", group_digits(int_part, sep))
        }
        None => body,
    };
    Ok(pad(spec, sign_prefix(negative, spec), &body, '>'))
}

fn format_int(value: i64, spec: &FormatSpec) -> RunResult<String> {
    let magnitude = value.unsigned_abs();
    let (prefix, digits) = match spec.kind {
        None | Some('d' | 'n') => ("", magnitude.to_string()),
        Some('x') => ("0x", format!("{magnitude:x}")),
        Some('X') => ("0X", format!("{magnitude:X}")),
        Some('o') => ("0o", format!("{magnitude:o}")),
        Some('b') => ("0b", format!("{magnitude:b}")),
        Some('c') => {
            let ch = u32::try_from(value)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| ExcType::overflow_error("%c arg not in range(0x110000)"))?;
            return Ok(pad(spec, "", &ch.to_string(), '<'));
        }
        Some('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%') => return format_float(value as f64, spec),
        Some(other) => {
            return Err(ExcType::value_error(format_args!(
                "Unknown format code '{other}' for object of type 'int'"
            )));
        }
    };
    let digits = match spec.grouping {
        Some(sep) => group_digits(&digits, sep),
        None => digits,
    };
    let sign = sign_prefix(value < 0, spec);
    let sign = if spec.alternate { format!("{sign}{prefix}") } else { sign.to_owned() };
    Ok(pad(spec, &sign, &digits, '>'))
}

/// `format(value, spec)`
pub fn format_value(value: &Value, spec: &str) -> RunResult<String> {
    if spec.is_empty() {
        return Ok(value.py_str());
    }
    let parsed = parse_spec(spec)?;
    match value {
        Value::Bool(b) if parsed.kind.is_none() => {
            let text = if *b { "True" } else { "False" };
            Ok(pad(&parsed, "", text, '<'))
        }
        Value::Int(_) | Value::Bool(_) => format_int(value.as_int().unwrap_or_default(), &parsed),
        Value::Float(f) => format_float(*f, &parsed),
        Value::Str(s) => {
            if !matches!(parsed.kind, None | Some('s')) {
                return Err(ExcType::value_error(format_args!(
                    "Unknown format code '{}' for object of type 'str'",
                    parsed.kind.unwrap_or_default()
                )));
            }
            let text: String = match parsed.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.to_string(),
            };
            Ok(pad(&parsed, "", &text, '<'))
        }
        other => Err(ExcType::type_error(format_args!(
            "unsupported format string passed to {}.__format__",
            other.type_name()
        ))),
    }
}

/// Applies an f-string / `str.format` conversion flag.
#[must_use]
pub fn convert(value: Value, conversion: Conversion) -> Value {
    match conversion {
        Conversion::None => value,
        Conversion::Str => Value::from(value.py_str()),
        Conversion::Repr => Value::from(value.py_repr()),
        Conversion::Ascii => Value::from(
            value
                .py_repr()
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        c.to_string()
                    } else if (c as u32) <= 0xff {
                        format!("\\x{:02x}", c as u32)
                    } else if (c as u32) <= 0xffff {
                        format!("\\u{:04x}", c as u32)
                    } else {
                        format!("\\U{:08x}", c as u32)
                    }
                })
                .collect::<String>(),
        ),
    }
}

/// `template.format(*args, **kwargs)`
pub fn str_format(template: &str, args: CallArgs) -> RunResult<Value> {
    let CallArgs { positional, keywords } = args;
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0usize;
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                let mut depth = 1;
                for c in chars.by_ref() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    field.push(c);
                }
                if depth != 0 {
                    return Err(ExcType::value_error("expected '}' before end of string"));
                }
                let (field, spec) = field.split_once(':').unwrap_or((&field, ""));
                let (name, conversion) = match field.split_once('!') {
                    Some((name, "r")) => (name, Conversion::Repr),
                    Some((name, "s")) => (name, Conversion::Str),
                    Some((name, "a")) => (name, Conversion::Ascii),
                    Some(_) => return Err(ExcType::value_error("Unknown conversion specifier")),
                    None => (field, Conversion::None),
                };
                let value = if name.is_empty() {
                    let value = positional.get(auto_index).cloned();
                    auto_index += 1;
                    value.ok_or_else(|| {
                        ExcType::index_error(format_args!(
                            "Replacement index {} out of range for positional args tuple",
                            auto_index - 1
                        ))
                    })?
                } else if let Ok(index) = name.parse::<usize>() {
                    positional.get(index).cloned().ok_or_else(|| {
                        ExcType::index_error(format_args!(
                            "Replacement index {index} out of range for positional args tuple"
                        ))
                    })?
                } else {
                    keywords
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| ExcType::key_error(format!("'{name}'")))?
                };
                let value = convert(value, conversion);
                out.push_str(&format_value(&value, spec)?);
            }
            '}' => return Err(ExcType::value_error("Single '}' encountered in format string")),
            c => out.push(c),
        }
    }
    Ok(Value::from(out))
}

/// printf-style `template % args`.
pub fn percent_format(template: &str, args: &Value) -> RunResult<String> {
    let (values, mapping): (Vec<Value>, Option<Dict>) = match args {
        Value::Tuple(items) => (items.to_vec(), None),
        Value::Dict(dict) => (vec![args.clone()], Some(dict.borrow().clone())),
        other => (vec![other.clone()], None),
    };
    let mut values = values.into_iter();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let mut key = None;
        if chars.peek() == Some(&'(') {
            chars.next();
            let name: String = chars.by_ref().take_while(|c| *c != ')').collect();
            key = Some(name);
        }
        let mut spec = FormatSpec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.align = Some('<'),
                '0' => {
                    if spec.align.is_none() {
                        spec.fill = '0';
                        spec.align = Some('=');
                    }
                }
                '+' | ' ' => spec.sign = Some(flag),
                '#' => spec.alternate = true,
                _ => break,
            }
            chars.next();
        }
        if spec.align == Some('<') {
            spec.fill = ' ';
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek().filter(|c| c.is_ascii_digit()) {
            width.push(d);
            chars.next();
        }
        spec.width = width.parse().unwrap_or(0);
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut precision = String::new();
            while let Some(&d) = chars.peek().filter(|c| c.is_ascii_digit()) {
                precision.push(d);
                chars.next();
            }
            spec.precision = Some(precision.parse().unwrap_or(0));
        }
        let Some(kind) = chars.next() else {
            return Err(ExcType::value_error("incomplete format"));
        };
        let value = match (&key, &mapping) {
            (Some(name), Some(dict)) => dict
                .get_str(name)
                .cloned()
                .ok_or_else(|| ExcType::key_error(format!("'{name}'")))?,
            (Some(_), None) => return Err(ExcType::type_error("format requires a mapping")),
            (None, _) => values
                .next()
                .ok_or_else(|| ExcType::type_error("not enough arguments for format string"))?,
        };
        let text = match kind {
            's' | 'r' | 'a' => {
                let text = if kind == 's' { value.py_str() } else { value.py_repr() };
                let text: String = match spec.precision {
                    Some(p) => text.chars().take(p).collect(),
                    None => text,
                };
                pad(&FormatSpec { precision: None, ..spec }, "", &text, '>')
            }
            'd' | 'i' | 'u' => {
                let int = match &value {
                    Value::Float(f) => *f as i64,
                    other => other.as_int().ok_or_else(|| {
                        ExcType::type_error(format_args!(
                            "%{kind} format: a real number is required, not {}",
                            other.type_name()
                        ))
                    })?,
                };
                format_int(int, &FormatSpec { precision: None, ..spec })?
            }
            'x' | 'X' | 'o' | 'c' => {
                let int = value
                    .as_int()
                    .ok_or_else(|| ExcType::type_error(format_args!("%{kind} format: an integer is required")))?;
                format_int(int, &FormatSpec { kind: Some(kind), ..spec })?
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                let number = value.as_number().ok_or_else(|| {
                    ExcType::type_error(format_args!("must be real number, not {}", value.type_name()))
                })?;
                format_float(number.to_f64(), &FormatSpec { kind: Some(kind), ..spec })?
            }
            other => {
                return Err(ExcType::value_error(format_args!(
                    "unsupported format character '{other}'"
                )));
            }
        };
        out.push_str(&text);
    }
    if mapping.is_none() && values.next().is_some() {
        return Err(ExcType::type_error("not all arguments converted during string formatting"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_specs() {
        assert_eq!(format_value(&Value::Float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(format_value(&Value::Int(1_234_567), ",").unwrap(), "1,234,567");
        assert_eq!(format_value(&Value::Int(42), "05d").unwrap(), "00042");
        assert_eq!(format_value(&Value::Int(255), "#x").unwrap(), "0xff");
        assert_eq!(format_value(&Value::Float(0.256), ".1%").unwrap(), "25.6%");
        assert_eq!(format_value(&Value::Float(12345.678), ".3g").unwrap(), "1.23e+04");
    }

    #[test]
    fn alignment_specs() {
        assert_eq!(format_value(&Value::from("ab"), ">5").unwrap(), "   ab");
        assert_eq!(format_value(&Value::from("ab"), "*^6").unwrap(), "**ab**");
        assert_eq!(format_value(&Value::Int(7), "<3").unwrap(), "7  ");
    }

    #[test]
    fn percent_formatting() {
        let args = Value::tuple(vec![Value::from("x"), Value::Int(3), Value::Float(2.5)]);
        assert_eq!(percent_format("%s=%d (%.2f) 100%%", &args).unwrap(), "x=3 (2.50) 100%");
        assert_eq!(percent_format("%5s|%-4d|", &Value::tuple(vec![Value::from("ab"), Value::Int(1)])).unwrap(), "   ab|1   |");
    }

    #[test]
    fn str_format_fields() {
        let args = CallArgs {
            positional: vec![Value::Int(1), Value::from("two")],
            keywords: vec![("name".to_owned(), Value::from("rlm"))],
        };
        let result = str_format("{} {!r} {name:>4} {{}}", args).unwrap();
        assert_eq!(result.py_str(), "1 'two'  rlm {}");
    }
}
