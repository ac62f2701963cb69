use super::EvalError;
use super::interpreter::Interpreter;
use super::value::Value;

const NAMES: &[&str] = &[
    "len", "sum", "mean", "min", "max", "abs", "sqrt", "round", "floor", "range", "str", "num",
    "type", "upper", "lower", "map", "filter",
];

pub(super) fn lookup(name: &str) -> Option<&'static str> {
    NAMES.iter().copied().find(|candidate| *candidate == name)
}

fn arity(name: &str, expected: usize, args: &[Value]) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::Arity {
            name: name.to_owned(),
            expected,
            found: args.len(),
        })
    }
}

fn number(name: &str, value: &Value) -> Result<f64, EvalError> {
    value
        .as_f64()
        .ok_or_else(|| EvalError::TypeMismatch(format!("{name} expects a number, not {}", value.kind())))
}

fn list<'v>(name: &str, value: &'v Value) -> Result<&'v [Value], EvalError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(EvalError::TypeMismatch(format!(
            "{name} expects a list, not {}",
            other.kind()
        ))),
    }
}

fn text<'v>(name: &str, value: &'v Value) -> Result<&'v str, EvalError> {
    value
        .as_str()
        .ok_or_else(|| EvalError::TypeMismatch(format!("{name} expects a string, not {}", value.kind())))
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_int(n: f64) -> Result<i64, EvalError> {
    if n.is_finite() && n.abs() < 9.0e15 {
        Ok(n as i64)
    } else {
        Err(EvalError::Overflow)
    }
}

/// Arguments of `min`/`max`/`sum`: either one list or the values themselves.
fn spread(args: Vec<Value>) -> Vec<Value> {
    match <[Value; 1]>::try_from(args) {
        Ok([Value::List(items)]) => items,
        Ok([single]) => vec![single],
        Err(args) => args,
    }
}

fn extremum(name: &str, args: Vec<Value>, want_max: bool) -> Result<Value, EvalError> {
    let items = spread(args);
    let mut best: Option<(f64, Value)> = None;
    for item in items {
        let n = number(name, &item)?;
        let replace = match &best {
            None => true,
            Some((current, _)) => (want_max && n > *current) || (!want_max && n < *current),
        };
        if replace {
            best = Some((n, item));
        }
    }
    best.map(|(_, value)| value)
        .ok_or_else(|| EvalError::Builtin(format!("{name} of an empty list")))
}

#[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
pub(super) fn call(
    interpreter: &mut Interpreter<'_>,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    match name {
        "len" => {
            arity(name, 1, &args)?;
            let len = match &args[0] {
                Value::List(items) => items.len(),
                Value::Str(s) => s.chars().count(),
                other => {
                    return Err(EvalError::TypeMismatch(format!(
                        "len expects a list or string, not {}",
                        other.kind()
                    )));
                }
            };
            i64::try_from(len).map(Value::Int).map_err(|_| EvalError::Overflow)
        }
        "sum" => {
            let items = spread(args);
            if items.iter().all(|item| matches!(item, Value::Int(_))) {
                let mut total = 0_i64;
                for item in &items {
                    if let Value::Int(n) = item {
                        total = total.checked_add(*n).ok_or(EvalError::Overflow)?;
                    }
                }
                return Ok(Value::Int(total));
            }
            let mut total = 0.0;
            for item in &items {
                total += number(name, item)?;
            }
            Ok(Value::Float(total))
        }
        "mean" => {
            let items = spread(args);
            if items.is_empty() {
                return Err(EvalError::Builtin("mean of an empty list".into()));
            }
            let mut total = 0.0;
            for item in &items {
                total += number(name, item)?;
            }
            Ok(Value::Float(total / items.len() as f64))
        }
        "min" => extremum(name, args, false),
        "max" => extremum(name, args, true),
        "abs" => {
            arity(name, 1, &args)?;
            match &args[0] {
                Value::Int(n) => n.checked_abs().map(Value::Int).ok_or(EvalError::Overflow),
                other => Ok(Value::Float(number(name, other)?.abs())),
            }
        }
        "sqrt" => {
            arity(name, 1, &args)?;
            let n = number(name, &args[0])?;
            if n < 0.0 {
                return Err(EvalError::Builtin("sqrt of a negative number".into()));
            }
            Ok(Value::Float(n.sqrt()))
        }
        "round" => {
            let digits = match args.len() {
                1 => 0,
                2 => float_to_int(number(name, &args[1])?)?,
                found => {
                    return Err(EvalError::Arity {
                        name: name.to_owned(),
                        expected: 2,
                        found,
                    });
                }
            };
            let n = number(name, &args[0])?;
            let scale = 10_f64.powi(i32::try_from(digits).map_err(|_| EvalError::Overflow)?);
            Ok(Value::Float((n * scale).round() / scale))
        }
        "floor" => {
            arity(name, 1, &args)?;
            float_to_int(number(name, &args[0])?.floor()).map(Value::Int)
        }
        "range" => {
            let (start, end) = match args.as_slice() {
                [Value::Int(end)] => (0, *end),
                [Value::Int(start), Value::Int(end)] => (*start, *end),
                _ => return Err(EvalError::Builtin("range expects one or two ints".into())),
            };
            if end.saturating_sub(start) > 1_000_000 {
                return Err(EvalError::Builtin("range is too large".into()));
            }
            Ok(Value::List((start..end).map(Value::Int).collect()))
        }
        "str" => {
            arity(name, 1, &args)?;
            Ok(match &args[0] {
                Value::Str(s) => Value::Str(s.clone()),
                other => Value::Str(other.to_string()),
            })
        }
        "num" => {
            arity(name, 1, &args)?;
            match &args[0] {
                Value::Int(_) | Value::Float(_) => Ok(args[0].clone()),
                other => {
                    let raw = text(name, other)?.trim();
                    raw.parse::<i64>()
                        .map(Value::Int)
                        .or_else(|_| raw.parse::<f64>().map(Value::Float))
                        .map_err(|_| EvalError::Builtin(format!("cannot convert \"{raw}\" to a number")))
                }
            }
        }
        "type" => {
            arity(name, 1, &args)?;
            Ok(Value::Str(args[0].kind().name().to_owned()))
        }
        "upper" => {
            arity(name, 1, &args)?;
            Ok(Value::Str(text(name, &args[0])?.to_uppercase()))
        }
        "lower" => {
            arity(name, 1, &args)?;
            Ok(Value::Str(text(name, &args[0])?.to_lowercase()))
        }
        "map" => {
            arity(name, 2, &args)?;
            let items = list(name, &args[0])?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(interpreter.call(&args[1], vec![item.clone()])?);
            }
            Ok(Value::List(out))
        }
        "filter" => {
            arity(name, 2, &args)?;
            let items = list(name, &args[0])?;
            let mut out = Vec::new();
            for item in items {
                if interpreter.call(&args[1], vec![item.clone()])?.is_truthy() {
                    out.push(item.clone());
                }
            }
            Ok(Value::List(out))
        }
        other => Err(EvalError::UnknownName(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use crate::eval::{EvalContext, Value, evaluate};

    fn eval(src: &str) -> Value {
        evaluate(src, &mut EvalContext::new()).into_result().unwrap()
    }

    #[test]
    fn aggregates() {
        assert_eq!(eval("sum([1, 2, 3])"), Value::Int(6));
        assert_eq!(eval("sum(1, 2.5)"), Value::Float(3.5));
        assert_eq!(eval("mean([2, 4])"), Value::Float(3.0));
        assert_eq!(eval("max(3, 9, 4)"), Value::Int(9));
        assert_eq!(eval("min([3, 9, 4])"), Value::Int(3));
        assert_eq!(eval("len(\"abc\")"), Value::Int(3));
    }

    #[test]
    fn higher_order_builtins_call_closures() {
        assert_eq!(
            eval("map(range(1, 4), fn(x) => x * x)"),
            Value::from(vec![1_i64, 4, 9])
        );
        assert_eq!(
            eval("filter(range(6), fn(x) => x % 2 == 0)"),
            Value::from(vec![0_i64, 2, 4])
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(eval("num(\" 42 \")"), Value::Int(42));
        assert_eq!(eval("str(4) + \"!\""), Value::from("4!"));
        assert_eq!(eval("type(fn(x) => x)"), Value::from("function"));
        assert_eq!(eval("round(3.14159, 2)"), Value::Float(3.14));
    }

    #[test]
    fn builtins_can_be_shadowed() {
        assert_eq!(eval("len = 3; len + 1"), Value::Int(4));
    }
}
