// Context conditions for scoping rules to the focused window.
//
// Grammar: `expr := or`; `or := and ('or' and)*`; `and := not ('and' not)*`;
// `not := 'not' not | primary`; `primary := '(' expr ')' | field (op value)?`.
// Fields: wm_class / wm_name / device_name (with `==` or `=~`), capslock /
// numlock (bare booleans). `=~` values compile to case-insensitive regexes
// at parse time; evaluation is pure.

use regex::Regex;

use crate::window::Context;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PredicateError {
    #[error("empty condition")]
    Empty,

    #[error("unexpected character '{0}' in condition")]
    BadChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("malformed condition near '{0}'")]
    Malformed(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("invalid pattern '{0}': {1}")]
    BadPattern(String, String),

    #[error("field '{0}' requires a comparison")]
    MissingComparison(String),
}

/// A compiled condition, evaluated against a [`Context`] snapshot.
#[derive(Debug, Clone)]
pub struct Predicate {
    expr: Expr,
    source: String,
}

#[derive(Debug, Clone)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Flag(Flag),
    Equals(TextField, String),
    Matches(TextField, Regex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    WmClass,
    WmName,
    DeviceName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    CapsLock,
    NumLock,
}

impl Predicate {
    pub fn parse(source: &str) -> Result<Self, PredicateError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(PredicateError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        if let Some(tok) = parser.peek() {
            return Err(PredicateError::Malformed(tok.describe()));
        }
        Ok(Self {
            expr,
            source: source.trim().to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, ctx: &Context) -> bool {
        eval_expr(&self.expr, ctx)
    }
}

fn eval_expr(expr: &Expr, ctx: &Context) -> bool {
    match expr {
        Expr::And(l, r) => eval_expr(l, ctx) && eval_expr(r, ctx),
        Expr::Or(l, r) => eval_expr(l, ctx) || eval_expr(r, ctx),
        Expr::Not(inner) => !eval_expr(inner, ctx),
        Expr::Flag(Flag::CapsLock) => ctx.capslock_on,
        Expr::Flag(Flag::NumLock) => ctx.numlock_on,
        Expr::Equals(field, value) => field_value(*field, ctx).eq_ignore_ascii_case(value),
        Expr::Matches(field, regex) => regex.is_match(field_value(*field, ctx)),
    }
}

fn field_value(field: TextField, ctx: &Context) -> &str {
    match field {
        TextField::WmClass => &ctx.wm_class,
        TextField::WmName => &ctx.wm_name,
        TextField::DeviceName => &ctx.device_name,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Eq,
    Match,
    Word(String),
    Str(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::And => "and".into(),
            Token::Or => "or".into(),
            Token::Not => "not".into(),
            Token::Eq => "==".into(),
            Token::Match => "=~".into(),
            Token::Word(w) => w.clone(),
            Token::Str(s) => format!("'{s}'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, PredicateError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            '=' => {
                match chars.get(i + 1) {
                    Some('=') => out.push(Token::Eq),
                    Some('~') => out.push(Token::Match),
                    _ => return Err(PredicateError::BadChar('=')),
                }
                i += 2;
            }
            '\'' | '"' => {
                let quote = ch;
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(PredicateError::UnterminatedString);
                }
                out.push(Token::Str(chars[start..i].iter().collect()));
                i += 1;
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.to_lowercase().as_str() {
                    "and" => out.push(Token::And),
                    "or" => out.push(Token::Or),
                    "not" => out.push(Token::Not),
                    _ => out.push(Token::Word(word)),
                }
            }
            c => return Err(PredicateError::BadChar(c)),
        }
    }

    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expr(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.next();
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.not()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.next();
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, PredicateError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.next();
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, PredicateError> {
        match self.next() {
            Some(Token::LParen) => {
                let expr = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(expr),
                    other => Err(PredicateError::Malformed(
                        other.map(|t| t.describe()).unwrap_or_else(|| "end".into()),
                    )),
                }
            }
            Some(Token::Word(word)) => self.comparison(word),
            other => Err(PredicateError::Malformed(
                other.map(|t| t.describe()).unwrap_or_else(|| "end".into()),
            )),
        }
    }

    fn comparison(&mut self, field: String) -> Result<Expr, PredicateError> {
        let lowered = field.to_lowercase();

        if let Some(flag) = match lowered.as_str() {
            "capslock" => Some(Flag::CapsLock),
            "numlock" => Some(Flag::NumLock),
            _ => None,
        } {
            return Ok(Expr::Flag(flag));
        }

        let text_field = match lowered.as_str() {
            "wm_class" => TextField::WmClass,
            "wm_name" => TextField::WmName,
            "device_name" => TextField::DeviceName,
            _ => return Err(PredicateError::UnknownField(field)),
        };

        let is_match = match self.peek() {
            Some(Token::Eq) => false,
            Some(Token::Match) => true,
            _ => return Err(PredicateError::MissingComparison(field)),
        };
        self.next();

        let value = match self.next() {
            Some(Token::Str(s)) => s,
            Some(Token::Word(w)) => w,
            other => {
                return Err(PredicateError::Malformed(
                    other.map(|t| t.describe()).unwrap_or_else(|| "end".into()),
                ))
            }
        };

        if is_match {
            let regex = Regex::new(&format!("(?i){value}"))
                .map_err(|e| PredicateError::BadPattern(value, e.to_string()))?;
            Ok(Expr::Matches(text_field, regex))
        } else {
            Ok(Expr::Equals(text_field, value))
        }
    }
}
