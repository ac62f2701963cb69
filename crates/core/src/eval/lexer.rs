use super::EvalError;

/// Lexical token of the snippet language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Fn,
    If,
    Then,
    Else,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Assign,
    Arrow,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    /// Statement separator: `;` or a newline outside of brackets.
    Separator,
}

impl Token {
    fn keyword(word: &str) -> Option<Self> {
        match word {
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            "null" => Some(Self::Null),
            "fn" => Some(Self::Fn),
            "if" => Some(Self::If),
            "then" => Some(Self::Then),
            "else" => Some(Self::Else),
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            _ => None,
        }
    }
}

/// Splits a snippet into tokens.
///
/// Newlines nested inside `(...)` or `[...]` are treated as whitespace so a
/// call or list literal may span lines. `#` starts a comment running to the
/// end of the line.
///
/// # Errors
///
/// Returns `EvalError::Syntax` for unterminated strings, malformed numbers or
/// characters outside the language.
pub fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut depth = 0_usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                if depth == 0 {
                    tokens.push(Token::Separator);
                }
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ';' => {
                tokens.push(Token::Separator);
                i += 1;
            }
            '0'..='9' | '.' if c != '.' || chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                let (token, next) = lex_number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            '"' | '\'' => {
                let (token, next) = lex_string(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(Token::keyword(&word).unwrap_or(Token::Ident(word)));
            }
            _ => {
                let next = chars.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    ('=', Some('=')) => (Token::EqEq, 2),
                    ('=', Some('>')) => (Token::Arrow, 2),
                    ('!', Some('=')) => (Token::NotEq, 2),
                    ('<', Some('=')) => (Token::LessEq, 2),
                    ('>', Some('=')) => (Token::GreaterEq, 2),
                    ('&', Some('&')) => (Token::And, 2),
                    ('|', Some('|')) => (Token::Or, 2),
                    ('=', _) => (Token::Assign, 1),
                    ('!', _) => (Token::Not, 1),
                    ('<', _) => (Token::Less, 1),
                    ('>', _) => (Token::Greater, 1),
                    ('+', _) => (Token::Plus, 1),
                    ('-', _) => (Token::Minus, 1),
                    ('*', _) => (Token::Star, 1),
                    ('/', _) => (Token::Slash, 1),
                    ('%', _) => (Token::Percent, 1),
                    ('^', _) => (Token::Caret, 1),
                    (',', _) => (Token::Comma, 1),
                    ('(', _) => (Token::LParen, 1),
                    ('[', _) => (Token::LBracket, 1),
                    (')', _) => (Token::RParen, 1),
                    (']', _) => (Token::RBracket, 1),
                    _ => return Err(EvalError::Syntax(format!("unexpected character '{c}'"))),
                };
                match token {
                    Token::LParen | Token::LBracket => depth += 1,
                    Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                    _ => {}
                }
                tokens.push(token);
                i += width;
            }
        }
    }

    Ok(tokens)
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize), EvalError> {
    let mut i = start;
    let mut is_float = false;
    while i < chars.len() {
        match chars[i] {
            '0'..='9' | '_' => i += 1,
            '.' if !is_float && chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                is_float = true;
                i += 1;
            }
            'e' | 'E'
                if chars.get(i + 1).is_some_and(|c| c.is_ascii_digit() || *c == '-' || *c == '+') =>
            {
                is_float = true;
                i += 2;
            }
            _ => break,
        }
    }

    let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    let token = if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| EvalError::Syntax(format!("malformed number '{text}'")))?
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| EvalError::Syntax(format!("integer literal '{text}' is out of range")))?
    };
    Ok((token, i))
}

fn lex_string(chars: &[char], start: usize) -> Result<(Token, usize), EvalError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((Token::Str(out), i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| EvalError::Syntax("unterminated string".into()))?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(EvalError::Syntax("unterminated string".into()))
}
