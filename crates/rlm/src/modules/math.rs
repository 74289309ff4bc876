use strum::{EnumString, IntoStaticStr};

use crate::{
    args::CallArgs,
    exception::{ExcType, RunResult},
    value::{Number, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum MathFunction {
    Ceil,
    Exp,
    Fabs,
    Floor,
    Gcd,
    Isclose,
    Isfinite,
    Isinf,
    Isnan,
    Log,
    Log10,
    Log2,
    Pow,
    Sqrt,
    Trunc,
}

pub(crate) fn constant(name: &str) -> Option<Value> {
    let value = match name {
        "pi" => std::f64::consts::PI,
        "e" => std::f64::consts::E,
        "tau" => std::f64::consts::TAU,
        "inf" => f64::INFINITY,
        "nan" => f64::NAN,
        _ => return None,
    };
    Some(Value::Float(value))
}

fn number(value: &Value, name: &str) -> RunResult<Number> {
    value.as_number().ok_or_else(|| {
        ExcType::type_error(format_args!(
            "{name}() must be a real number, not {}",
            value.type_name()
        ))
    })
}

fn float(value: &Value, name: &str) -> RunResult<f64> {
    number(value, name).map(Number::to_f64)
}

fn domain_error() -> crate::exception::RunError {
    ExcType::value_error("math domain error")
}

/// Rounds toward an integer result, keeping ints exact.
fn to_integral(value: &Value, name: &str, op: fn(f64) -> f64) -> RunResult<Value> {
    match number(value, name)? {
        Number::Int(i) => Ok(Value::Int(i)),
        Number::Float(f) => {
            if f.is_nan() {
                return Err(ExcType::value_error("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(ExcType::overflow_error("cannot convert float infinity to integer"));
            }
            Ok(Value::Int(op(f) as i64))
        }
    }
}

pub(crate) fn call(function: MathFunction, args: CallArgs) -> RunResult<Value> {
    let name: &'static str = function.into();
    match function {
        MathFunction::Ceil => to_integral(&args.get_one_arg(name)?, name, f64::ceil),
        MathFunction::Floor => to_integral(&args.get_one_arg(name)?, name, f64::floor),
        MathFunction::Trunc => to_integral(&args.get_one_arg(name)?, name, f64::trunc),
        MathFunction::Sqrt => {
            let x = float(&args.get_one_arg(name)?, name)?;
            if x < 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x.sqrt()))
        }
        MathFunction::Exp => {
            let x = float(&args.get_one_arg(name)?, name)?;
            let result = x.exp();
            if result.is_infinite() && x.is_finite() {
                return Err(ExcType::overflow_error("math range error"));
            }
            Ok(Value::Float(result))
        }
        MathFunction::Fabs => Ok(Value::Float(float(&args.get_one_arg(name)?, name)?.abs())),
        MathFunction::Log => {
            let [x, base] = args.bind("log", ["x", "base"], 1)?;
            let x = float(&x.unwrap_or(Value::None), name)?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            match base {
                None => Ok(Value::Float(x.ln())),
                Some(base) => {
                    let base = float(&base, name)?;
                    if base <= 0.0 || base == 1.0 {
                        return Err(domain_error());
                    }
                    Ok(Value::Float(x.ln() / base.ln()))
                }
            }
        }
        MathFunction::Log2 | MathFunction::Log10 => {
            let x = float(&args.get_one_arg(name)?, name)?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(if function == MathFunction::Log2 { x.log2() } else { x.log10() }))
        }
        MathFunction::Pow => {
            let [x, y] = args.bind("pow", ["x", "y"], 2)?;
            let x = float(&x.unwrap_or(Value::None), name)?;
            let y = float(&y.unwrap_or(Value::None), name)?;
            Ok(Value::Float(x.powf(y)))
        }
        MathFunction::Isnan => Ok(Value::Bool(float(&args.get_one_arg(name)?, name)?.is_nan())),
        MathFunction::Isinf => Ok(Value::Bool(float(&args.get_one_arg(name)?, name)?.is_infinite())),
        MathFunction::Isfinite => Ok(Value::Bool(float(&args.get_one_arg(name)?, name)?.is_finite())),
        MathFunction::Isclose => {
            let [a, b, rel_tol, abs_tol] = args.bind("isclose", ["a", "b", "rel_tol", "abs_tol"], 2)?;
            let a = float(&a.unwrap_or(Value::None), name)?;
            let b = float(&b.unwrap_or(Value::None), name)?;
            let rel_tol = rel_tol.map_or(Ok(1e-9), |v| float(&v, name))?;
            let abs_tol = abs_tol.map_or(Ok(0.0), |v| float(&v, name))?;
            let close = a == b || (a - b).abs() <= (rel_tol * b.abs().max(a.abs())).max(abs_tol);
            Ok(Value::Bool(close))
        }
        MathFunction::Gcd => {
            let mut result: i64 = 0;
            for value in &args.positional {
                let Some(mut b) = value.as_int() else {
                    return Err(ExcType::type_error(format_args!(
                        "'{}' object cannot be interpreted as an integer",
                        value.type_name()
                    )));
                };
                let mut a = result;
                while b != 0 {
                    (a, b) = (b, a % b);
                }
                result = a.abs();
            }
            Ok(Value::Int(result))
        }
    }
}
