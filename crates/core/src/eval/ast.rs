use std::fmt;
use std::sync::Arc;

/// Parsed snippet: a sequence of statements, only the last of which yields
/// the snippet's value.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { name: String, value: Expr },
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

/// Expression tree. Carries no source positions, so two snippets that differ
/// only in whitespace or redundant parentheses parse to equal trees.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Arc<Expr>,
    },
}

impl Expr {
    /// Returns true if `needle` equals this expression or any expression
    /// nested inside it.
    #[must_use]
    pub fn contains(&self, needle: &Expr) -> bool {
        if self == needle {
            return true;
        }
        match self {
            Expr::List(items) => items.iter().any(|item| item.contains(needle)),
            Expr::Unary { operand, .. } => operand.contains(needle),
            Expr::Binary { left, right, .. } => left.contains(needle) || right.contains(needle),
            Expr::Call { callee, args } => {
                callee.contains(needle) || args.iter().any(|arg| arg.contains(needle))
            }
            Expr::Index { target, index } => target.contains(needle) || index.contains(needle),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.contains(needle) || then_branch.contains(needle) || else_branch.contains(needle)
            }
            Expr::Lambda { body, .. } => body.contains(needle),
            _ => false,
        }
    }
}

impl Stmt {
    /// The expression evaluated by this statement.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        match self {
            Stmt::Assign { value, .. } => value,
            Stmt::Expr(expr) => expr,
        }
    }

    #[must_use]
    pub fn contains(&self, needle: &Expr) -> bool {
        self.expr().contains(needle)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        f.write_str(symbol)
    }
}
