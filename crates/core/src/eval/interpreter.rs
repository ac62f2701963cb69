use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use super::builtins;
use super::context::EvalContext;
use super::parser::parse_program;
use super::value::{Closure, Value};
use super::{EvalError, EvaluationResult};

/// Nesting limit for function calls; deeper recursion is reported as an
/// evaluation error.
pub const MAX_CALL_DEPTH: usize = 256;

type Locals = HashMap<String, Value>;

/// Evaluates `snippet` against `context`.
///
/// Statements run in order; assignments write into `context` as they
/// execute, so a runtime failure in a later statement keeps the bindings made
/// by earlier ones. The value of the last statement is the result.
pub fn evaluate(snippet: &str, context: &mut EvalContext) -> EvaluationResult {
    let program = match parse_program(snippet) {
        Ok(program) => program,
        Err(err) => return EvaluationResult::failure(err),
    };

    let mut created = Vec::new();
    let mut last = Value::Null;
    for stmt in &program.statements {
        let evaluated = Interpreter::new(context).eval(stmt.expr(), &Locals::new());
        let value = match evaluated {
            Ok(value) => value,
            Err(err) => return EvaluationResult::failure(err).with_new_bindings(created),
        };
        if let Stmt::Assign { name, .. } = stmt {
            if context.set(name.clone(), value.clone()) {
                created.push(name.clone());
            }
        }
        last = value;
    }

    trace!(statements = program.statements.len(), "snippet evaluated");
    EvaluationResult::success(last).with_new_bindings(created)
}

/// Calls a function value with `args`, resolving free names in `context`.
///
/// # Errors
///
/// Returns `EvalError::NotCallable` for non-function values, or any error
/// raised while running the function body.
pub fn call_function(
    function: &Value,
    args: Vec<Value>,
    context: &EvalContext,
) -> Result<Value, EvalError> {
    Interpreter::new(context).call(function, args)
}

pub(super) struct Interpreter<'a> {
    globals: &'a EvalContext,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    fn new(globals: &'a EvalContext) -> Self {
        Self { globals, depth: 0 }
    }

    fn lookup(&self, name: &str, locals: &Locals) -> Result<Value, EvalError> {
        if let Some(value) = locals.get(name).or_else(|| self.globals.get(name)) {
            return Ok(value.clone());
        }
        builtins::lookup(name)
            .map(Value::Builtin)
            .ok_or_else(|| EvalError::UnknownName(name.to_owned()))
    }

    fn eval(&mut self, expr: &Expr, locals: &Locals) -> Result<Value, EvalError> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => self.lookup(name, locals),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item, locals))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, locals)?;
                unary(*op, &value)
            }
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                if !self.eval(left, locals)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right, locals)?.is_truthy()))
            }
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                if self.eval(left, locals)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right, locals)?.is_truthy()))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, locals)?;
                let right = self.eval(right, locals)?;
                binary(*op, &left, &right)
            }
            Expr::Call { callee, args } => {
                let function = self.eval(callee, locals)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, locals))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(&function, args)
            }
            Expr::Index { target, index } => {
                let target = self.eval(target, locals)?;
                let index = self.eval(index, locals)?;
                index_value(&target, &index)
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(cond, locals)?.is_truthy() {
                    self.eval(then_branch, locals)
                } else {
                    self.eval(else_branch, locals)
                }
            }
            Expr::Lambda { params, body } => Ok(Value::Function(Arc::new(Closure {
                params: params.clone(),
                body: Arc::clone(body),
                captured: locals.clone(),
            }))),
        }
    }

    pub(super) fn call(&mut self, function: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::RecursionLimit(MAX_CALL_DEPTH));
        }
        self.depth += 1;
        let result = match function {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Builtin(name) => builtins::call(self, name, args),
            other => Err(EvalError::NotCallable(other.kind())),
        };
        self.depth -= 1;
        result
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value, EvalError> {
        if closure.params.len() != args.len() {
            return Err(EvalError::Arity {
                name: "function".into(),
                expected: closure.params.len(),
                found: args.len(),
            });
        }
        let mut locals = closure.captured.clone();
        for (param, arg) in closure.params.iter().zip(args) {
            locals.insert(param.clone(), arg);
        }
        self.eval(&closure.body, &locals)
    }
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
        (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Neg, other) => Err(EvalError::TypeMismatch(format!(
            "cannot negate a {} value",
            other.kind()
        ))),
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeMismatch(format!(
        "cannot apply '{op}' to {} and {}",
        left.kind(),
        right.kind()
    ))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use Value::{Float, Int, List, Str};

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => return Ok(Value::Bool(left != right)),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            return compare(op, left, right);
        }
        _ => {}
    }

    match (op, left, right) {
        (BinaryOp::Add, Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
        (BinaryOp::Add, List(a), List(b)) => Ok(List(a.iter().chain(b).cloned().collect())),
        (BinaryOp::Add, Int(a), Int(b)) => a.checked_add(*b).map(Int).ok_or(EvalError::Overflow),
        (BinaryOp::Sub, Int(a), Int(b)) => a.checked_sub(*b).map(Int).ok_or(EvalError::Overflow),
        (BinaryOp::Mul, Int(a), Int(b)) => a.checked_mul(*b).map(Int).ok_or(EvalError::Overflow),
        (BinaryOp::Div | BinaryOp::Rem, Int(_), Int(0)) => Err(EvalError::DivisionByZero),
        (BinaryOp::Div, Int(a), Int(b)) if a.checked_rem(*b) == Some(0) => {
            a.checked_div(*b).map(Int).ok_or(EvalError::Overflow)
        }
        (BinaryOp::Rem, Int(a), Int(b)) => a.checked_rem(*b).map(Int).ok_or(EvalError::Overflow),
        (BinaryOp::Pow, Int(a), Int(b)) if *b >= 0 => u32::try_from(*b)
            .ok()
            .and_then(|exp| a.checked_pow(exp))
            .map(Int)
            .ok_or(EvalError::Overflow),
        _ => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(mismatch(op, left, right));
            };
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(EvalError::DivisionByZero),
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                BinaryOp::Pow => a.powf(b),
                _ => return Err(mismatch(op, left, right)),
            };
            Ok(Float(value))
        }
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(mismatch(op, left, right)),
        },
    };
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    let result = match op {
        BinaryOp::Less => ordering.is_lt(),
        BinaryOp::LessEq => ordering.is_le(),
        BinaryOp::Greater => ordering.is_gt(),
        _ => ordering.is_ge(),
    };
    Ok(Value::Bool(result))
}

fn index_value(target: &Value, index: &Value) -> Result<Value, EvalError> {
    let Value::Int(raw) = index else {
        return Err(EvalError::TypeMismatch(format!(
            "index must be an int, not {}",
            index.kind()
        )));
    };
    let resolve = |len: usize| -> Result<usize, EvalError> {
        let out_of_range = EvalError::IndexOutOfRange { index: *raw, len };
        let signed_len = i64::try_from(len).map_err(|_| EvalError::Overflow)?;
        let position = if *raw < 0 { signed_len + raw } else { *raw };
        if (0..signed_len).contains(&position) {
            usize::try_from(position).map_err(|_| out_of_range)
        } else {
            Err(out_of_range)
        }
    };
    match target {
        Value::List(items) => Ok(items[resolve(items.len())?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[resolve(chars.len())?].to_string()))
        }
        other => Err(EvalError::TypeMismatch(format!(
            "a {} value cannot be indexed",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> EvaluationResult {
        evaluate(src, &mut EvalContext::new())
    }

    #[test]
    fn last_statement_is_the_value() {
        let result = eval("a = 2; b = 3\na * b");
        assert_eq!(result.value(), Some(&Value::Int(6)));
        assert_eq!(result.new_bindings(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn deeply_nested_input_is_an_error_not_a_crash() {
        let mut ctx = EvalContext::new();
        let wrapped = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        let result = evaluate(&wrapped, &mut ctx);
        assert!(matches!(result.error(), Some(EvalError::Syntax(_))));
        assert!(!evaluate(&"(".repeat(10_000), &mut ctx).is_success());
        assert!(ctx.is_empty());
    }

    #[test]
    fn bindings_persist_across_snippets() {
        let mut ctx = EvalContext::new();
        assert!(evaluate("x = 5", &mut ctx).is_success());
        let second = evaluate("x + 1", &mut ctx);
        assert_eq!(second.value(), Some(&Value::Int(6)));
        assert!(second.new_bindings().is_empty());
    }

    #[test]
    fn reassignment_is_not_a_new_binding() {
        let mut ctx = EvalContext::new();
        evaluate("x = 1", &mut ctx);
        let result = evaluate("x = 2", &mut ctx);
        assert!(result.new_bindings().is_empty());
        assert_eq!(ctx.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn errors_are_captured_not_raised() {
        let result = eval("1 / 0");
        assert_eq!(result.error(), Some(&EvalError::DivisionByZero));
        assert!(result.value().is_none());

        let result = eval("nope + 1");
        assert!(matches!(result.error(), Some(EvalError::UnknownName(name)) if name == "nope"));

        let result = eval("(1 + ");
        assert!(matches!(result.error(), Some(EvalError::Syntax(_))));
    }

    #[test]
    fn earlier_statements_survive_a_later_failure() {
        let mut ctx = EvalContext::new();
        let result = evaluate("kept = 1; boom()", &mut ctx);
        assert!(!result.is_success());
        assert!(ctx.contains("kept"));
        assert_eq!(result.new_bindings(), ["kept".to_string()]);
    }

    #[test]
    fn closures_capture_enclosing_parameters() {
        let result = eval("adder = fn(n) => fn(x) => x + n\nadd3 = adder(3)\nadd3(4)");
        assert_eq!(result.value(), Some(&Value::Int(7)));
    }

    #[test]
    fn recursion_resolves_through_the_context() {
        let result = eval("fact = fn(n) => if n <= 1 then 1 else n * fact(n - 1)\nfact(5)");
        assert_eq!(result.value(), Some(&Value::Int(120)));
    }

    #[test]
    fn runaway_recursion_is_an_error() {
        let result = eval("loop = fn(n) => loop(n + 1)\nloop(0)");
        assert_eq!(result.error(), Some(&EvalError::RecursionLimit(MAX_CALL_DEPTH)));
    }

    #[test]
    fn arithmetic_mixes_ints_and_floats() {
        assert_eq!(eval("7 / 2").value(), Some(&Value::Float(3.5)));
        assert_eq!(eval("8 / 2").value(), Some(&Value::Int(4)));
        assert_eq!(eval("2 ^ 10").value(), Some(&Value::Int(1024)));
        assert_eq!(eval("1.5 + 1").value(), Some(&Value::Float(2.5)));
        assert_eq!(eval("\"ab\" + \"c\"").value(), Some(&Value::from("abc")));
    }

    #[test]
    fn indexing_supports_negative_positions() {
        assert_eq!(eval("[1, 2, 3][-1]").value(), Some(&Value::Int(3)));
        assert!(matches!(
            eval("[1][5]").error(),
            Some(EvalError::IndexOutOfRange { index: 5, len: 1 })
        ));
    }

    #[test]
    fn logic_short_circuits() {
        assert_eq!(eval("false and missing").value(), Some(&Value::Bool(false)));
        assert_eq!(eval("true or missing").value(), Some(&Value::Bool(true)));
        assert_eq!(eval("not 1 == 2").value(), Some(&Value::Bool(true)));
    }

    #[test]
    fn call_function_uses_the_context() {
        let mut ctx = EvalContext::new();
        evaluate("scale = 10; f = fn(x) => x * scale", &mut ctx);
        let f = ctx.get("f").cloned().unwrap();
        let out = call_function(&f, vec![Value::Int(2)], &ctx).unwrap();
        assert_eq!(out, Value::Int(20));
    }

    #[test]
    fn empty_snippet_is_null() {
        assert_eq!(eval("").value(), Some(&Value::Null));
    }
}
