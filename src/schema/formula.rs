//! Calculation formulas
//!
//! Formulas are arithmetic expressions over field names: `+ - * /` with the
//! usual precedence, unary minus and parentheses. Identifiers are matched
//! against field names case-insensitively.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::schema::error::FormulaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Field(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    start: usize,
    end: usize,
}

fn tokenize(source: &str) -> Result<Vec<Spanned>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
            // A word containing a letter or underscore is a field name, so
            // sanitized names such as `2024yield` stay one token
            let end = scan_while(&mut chars, start, |c| c.is_ascii_alphanumeric() || c == '_');
            let word = &source[start..end];
            if !word.bytes().all(|b| b.is_ascii_digit()) {
                tokens.push(Spanned {
                    token: Token::Ident(word.to_ascii_lowercase()),
                    start,
                    end,
                });
                continue;
            }

            let end = scan_while(&mut chars, end, |c| c.is_ascii_digit() || c == '.');
            let literal = &source[start..end];
            let value = literal
                .parse::<f64>()
                .map_err(|_| FormulaError::InvalidNumber(literal.to_string()))?;
            tokens.push(Spanned {
                token: Token::Number(value),
                start,
                end,
            });
            continue;
        }

        let token = match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => return Err(FormulaError::UnexpectedChar { ch, offset: start }),
        };
        chars.next();
        tokens.push(Spanned {
            token,
            start,
            end: start + ch.len_utf8(),
        });
    }

    Ok(tokens)
}

/// Consume characters while `accept` holds; returns the end offset
fn scan_while<F>(chars: &mut Peekable<CharIndices<'_>>, start: usize, accept: F) -> usize
where
    F: Fn(char) -> bool,
{
    let mut end = start;
    while let Some(&(i, c)) = chars.peek() {
        if !accept(c) {
            break;
        }
        end = i + c.len_utf8();
        chars.next();
    }
    end
}

/// Deepest allowed nesting of parentheses and unary signs
pub const MAX_DEPTH: usize = 64;

/// Longest allowed formula, in tokens
pub const MAX_TOKENS: usize = 512;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        let negate = match self.peek() {
            Some(Token::Minus) => true,
            Some(Token::Plus) => false,
            _ => return self.primary(),
        };
        self.advance();
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(if negate {
            Expr::Neg(Box::new(operand))
        } else {
            operand
        })
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => Ok(Expr::Field(name)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.expression()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(FormulaError::UnexpectedToken {
                        found: other.describe(),
                        expected: "')'",
                    }),
                    None => Err(FormulaError::UnexpectedToken {
                        found: "end of formula".to_string(),
                        expected: "')'",
                    }),
                }
            }
            Some(other) => Err(FormulaError::UnexpectedToken {
                found: other.describe(),
                expected: "a number, field name or '('",
            }),
            None => Err(FormulaError::UnexpectedToken {
                found: "end of formula".to_string(),
                expected: "a number, field name or '('",
            }),
        }
    }
}

/// A parsed calculation formula
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens: Vec<Token> = tokenize(source)?.into_iter().map(|s| s.token).collect();
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        if tokens.len() > MAX_TOKENS {
            return Err(FormulaError::TooLong { limit: MAX_TOKENS });
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expression()?;
        if let Some(extra) = parser.peek() {
            return Err(FormulaError::UnexpectedToken {
                found: extra.describe(),
                expected: "an operator or end of formula",
            });
        }

        Ok(Self { expr })
    }

    /// Field names referenced by the formula, lower-cased, in first-use order
    pub fn references(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_references(&self.expr, &mut names);
        names
    }

    /// Evaluate with `lookup` supplying each field's numeric value.
    ///
    /// Division by zero yields 0 for that sub-expression, and any non-finite
    /// intermediate result collapses to 0.
    pub fn evaluate<F>(&self, lookup: F) -> f64
    where
        F: Fn(&str) -> f64,
    {
        eval(&self.expr, &lookup)
    }
}

fn collect_references(expr: &Expr, names: &mut Vec<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Field(name) => {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        Expr::Neg(inner) => collect_references(inner, names),
        Expr::Binary { left, right, .. } => {
            collect_references(left, names);
            collect_references(right, names);
        }
    }
}

fn eval<F>(expr: &Expr, lookup: &F) -> f64
where
    F: Fn(&str) -> f64,
{
    let value = match expr {
        Expr::Number(value) => *value,
        Expr::Field(name) => lookup(name),
        Expr::Neg(inner) => -eval(inner, lookup),
        Expr::Binary { op, left, right } => {
            let l = eval(left, lookup);
            let r = eval(right, lookup);
            match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => {
                    if r == 0.0 {
                        0.0
                    } else {
                        l / r
                    }
                }
            }
        }
    };

    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Rewrite every reference to `old` in `source` as `new`, leaving the rest
/// of the text untouched. Unparsable formulas are returned unchanged.
pub fn rename_reference(source: &str, old: &str, new: &str) -> String {
    let Ok(tokens) = tokenize(source) else {
        return source.to_string();
    };

    let mut result = String::with_capacity(source.len());
    let mut cursor = 0;
    for spanned in tokens {
        if let Token::Ident(name) = &spanned.token {
            if name.eq_ignore_ascii_case(old) {
                result.push_str(&source[cursor..spanned.start]);
                result.push_str(new);
                cursor = spanned.end;
            }
        }
    }
    result.push_str(&source[cursor..]);
    result
}
