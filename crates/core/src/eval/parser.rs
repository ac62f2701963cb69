use std::sync::Arc;

use super::EvalError;
use super::ast::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use super::lexer::{Token, tokenize};

/// Deepest tree the parser will build. Evaluation and drop both recurse
/// over the tree, so this also bounds their stack use.
pub const MAX_NESTING: usize = 64;

/// Parses a snippet into a [`Program`].
///
/// # Errors
///
/// Returns `EvalError::Syntax` if the snippet is not well formed.
pub fn parse_program(source: &str) -> Result<Program, EvalError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.program()
}

/// Parses a snippet that must consist of exactly one expression.
///
/// # Errors
///
/// Returns `EvalError::Syntax` if the snippet does not parse or holds more
/// than one statement.
pub fn parse_expression(source: &str) -> Result<Expr, EvalError> {
    let program = parse_program(source)?;
    let mut statements = program.statements.into_iter();
    match (statements.next(), statements.next()) {
        (Some(Stmt::Expr(expr)), None) => Ok(expr),
        (Some(Stmt::Assign { name, value }), None) => Ok(Expr::Binary {
            op: BinaryOp::Eq,
            left: Box::new(Expr::Ident(name)),
            right: Box::new(value),
        }),
        (None, _) => Err(EvalError::Syntax("expected an expression".into())),
        (Some(_), Some(_)) => Err(EvalError::Syntax("expected a single expression".into())),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), EvalError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> EvalError {
        match self.peek() {
            Some(token) => EvalError::Syntax(format!("expected {what}, found {}", describe(token))),
            None => EvalError::Syntax(format!("expected {what}, found end of input")),
        }
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(EvalError::Syntax("expression is nested too deeply".into()));
        }
        Ok(())
    }

    fn skip_separators(&mut self) {
        while self.eat(&Token::Separator) {}
    }

    fn program(&mut self) -> Result<Program, EvalError> {
        let mut statements = Vec::new();
        self.skip_separators();
        while self.peek().is_some() {
            statements.push(self.statement()?);
            if self.peek().is_some() && !self.eat(&Token::Separator) {
                return Err(self.unexpected("end of statement"));
            }
            self.skip_separators();
        }
        Ok(Program { statements })
    }

    fn statement(&mut self) -> Result<Stmt, EvalError> {
        if let (Some(Token::Ident(name)), Some(Token::Assign)) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            self.pos += 2;
            let value = self.expression()?;
            return Ok(Stmt::Assign { name, value });
        }
        Ok(Stmt::Expr(self.expression()?))
    }

    fn expression(&mut self) -> Result<Expr, EvalError> {
        self.descend()?;
        let expr = match self.peek() {
            Some(Token::If) => self.if_expression(),
            Some(Token::Fn) => self.lambda(),
            _ => self.logical_or(),
        };
        self.depth -= 1;
        expr
    }

    fn if_expression(&mut self) -> Result<Expr, EvalError> {
        self.expect(&Token::If, "'if'")?;
        let cond = self.expression()?;
        self.expect(&Token::Then, "'then'")?;
        let then_branch = self.expression()?;
        self.expect(&Token::Else, "'else'")?;
        let else_branch = self.expression()?;
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn lambda(&mut self) -> Result<Expr, EvalError> {
        self.expect(&Token::Fn, "'fn'")?;
        self.expect(&Token::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                match self.advance() {
                    Some(Token::Ident(name)) => params.push(name),
                    _ => return Err(EvalError::Syntax("expected a parameter name".into())),
                }
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma, "',' or ')'")?;
            }
        }
        self.expect(&Token::Arrow, "'=>'")?;
        let body = self.expression()?;
        Ok(Expr::Lambda {
            params,
            body: Arc::new(body),
        })
    }

    fn logical_or(&mut self) -> Result<Expr, EvalError> {
        let entry = self.depth;
        let mut left = self.logical_and()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            let right = self.logical_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth = entry;
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, EvalError> {
        let entry = self.depth;
        let mut left = self.logical_not()?;
        while self.eat(&Token::And) {
            self.descend()?;
            let right = self.logical_not()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth = entry;
        Ok(left)
    }

    fn logical_not(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Not) {
            self.descend()?;
            let operand = self.logical_not()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        let entry = self.depth;
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::Less) => BinaryOp::Less,
                Some(Token::LessEq) => BinaryOp::LessEq,
                Some(Token::Greater) => BinaryOp::Greater,
                Some(Token::GreaterEq) => BinaryOp::GreaterEq,
                _ => {
                    self.depth = entry;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        let entry = self.depth;
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => {
                    self.depth = entry;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalError> {
        let entry = self.depth;
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => {
                    self.depth = entry;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Minus) {
            self.descend()?;
            let operand = self.unary()?;
            self.depth -= 1;
            // Fold negative literals so `-3` and `- 3` match a literal answer.
            return Ok(match operand {
                Expr::Int(n) => Expr::Int(-n),
                Expr::Float(n) => Expr::Float(-n),
                other => Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(other),
                },
            });
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, EvalError> {
        let base = self.postfix()?;
        if self.eat(&Token::Caret) {
            self.descend()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, EvalError> {
        let entry = self.depth;
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::LParen) {
                self.descend()?;
                let args = self.list_items(&Token::RParen)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.eat(&Token::LBracket) {
                self.descend()?;
                let index = self.expression()?;
                self.expect(&Token::RBracket, "']'")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                self.depth = entry;
                return Ok(expr);
            }
        }
    }

    fn list_items(&mut self, close: &Token) -> Result<Vec<Expr>, EvalError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma, "','")?;
        }
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::If) => return self.if_expression(),
            Some(Token::Fn) => return self.lambda(),
            _ => {}
        }
        let Some(token) = self.advance() else {
            return Err(EvalError::Syntax("unexpected end of input".into()));
        };
        match token {
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Float(n) => Ok(Expr::Float(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Null => Ok(Expr::Null),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::List(self.list_items(&Token::RBracket)?)),
            other => Err(EvalError::Syntax(format!("unexpected {}", describe(&other)))),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Int(n) => format!("number {n}"),
        Token::Float(n) => format!("number {n}"),
        Token::Str(s) => format!("string \"{s}\""),
        Token::Ident(name) => format!("name '{name}'"),
        Token::Separator => "end of statement".into(),
        other => format!("{other:?}").to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_follows_arithmetic() {
        let parsed = parse_expression("1 + 2 * 3").unwrap();
        let expected = binary(
            BinaryOp::Add,
            Expr::Int(1),
            binary(BinaryOp::Mul, Expr::Int(2), Expr::Int(3)),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_negation() {
        let parsed = parse_expression("-x ^ 2").unwrap();
        assert!(matches!(parsed, Expr::Unary { op: UnaryOp::Neg, .. }));
        let chained = parse_expression("2 ^ 3 ^ 2").unwrap();
        let Expr::Binary { right, .. } = chained else {
            panic!("expected binary");
        };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn whitespace_and_parentheses_do_not_change_the_tree() {
        assert_eq!(
            parse_expression("y = 2*x").unwrap(),
            parse_expression("y=(2 * x)").unwrap()
        );
    }

    #[test]
    fn parses_assignments_lambdas_and_calls() {
        let program = parse_program("double = fn(n) => n * 2\ndouble(4)").unwrap();
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(program.statements[0], Stmt::Assign { .. }));
        assert!(matches!(
            program.statements[1],
            Stmt::Expr(Expr::Call { .. })
        ));
    }

    #[test]
    fn empty_program_has_no_statements() {
        assert!(parse_program("  ;\n ").unwrap().statements.is_empty());
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let source = "(".repeat(10_000);
        let err = parse_program(&source).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"), "{err}");

        let wrapped = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        assert!(parse_program(&wrapped).is_err());
        assert!(parse_program(&"-".repeat(10_000)).is_err());
        assert!(parse_program(&"not ".repeat(10_000)).is_err());
        let chain = vec!["1"; 10_000].join(" + ");
        assert!(parse_program(&chain).is_err());
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let wrapped = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(parse_expression(&wrapped).unwrap(), Expr::Int(1));
        assert!(parse_expression("[[1, [2, 3]], (4 + 5) * -(6 - 7)]").is_ok());
    }

    #[test]
    fn reports_trailing_garbage() {
        let err = parse_program("4 4").unwrap_err();
        assert!(err.to_string().contains("end of statement"));
    }
}
