// SPDX-License-Identifier: MIT

//! Rule expression parser
//!
//! Parses expressions like:
//! - `$resource.details.is_pii == true`
//! - `5 + 5 in [9, 11, 12]`
//! - `$foo == "bar" && ($x == 1 && $y > $x)`

use super::ast::{BinOp, Expr, Literal};
use super::evaluator::EvalError;

/// Parse an expression string into an AST
pub fn parse(input: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(EvalError::Parse(format!(
            "unexpected trailing input in expression: {}",
            input
        )));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Var(String),
    In,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Gte,
    Lte,
    Gt,
    Lt,
    Plus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    tokens.push(Token::AndAnd);
                    i += 2;
                } else {
                    return Err(EvalError::Parse("expected '&&'".to_string()));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    tokens.push(Token::OrOr);
                    i += 2;
                } else {
                    return Err(EvalError::Parse("expected '||'".to_string()));
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err(EvalError::Parse("expected '=='".to_string()));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    return Err(EvalError::Parse("expected '!='".to_string()));
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Gte);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Lte);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end == chars.len() {
                    return Err(EvalError::Parse("unterminated string literal".to_string()));
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() {
                    // Brackets only appear in paths as the `[]` flatten pair
                    if chars[end] == '[' {
                        if chars.get(end + 1) == Some(&']') {
                            end += 2;
                            continue;
                        }
                        break;
                    }
                    if is_path_char(chars[end]) {
                        end += 1;
                        continue;
                    }
                    break;
                }
                if end == start {
                    return Err(EvalError::Parse("empty variable reference".to_string()));
                }
                tokens.push(Token::Var(chars[start..end].iter().collect()));
                i = end;
            }
            _ if c.is_ascii_digit() || (c == '-' && next_is_digit(&chars, i)) => {
                let start = i;
                let mut end = i + 1;
                while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
                    end += 1;
                }
                let text: String = chars[start..end].iter().collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| EvalError::Parse(format!("invalid number literal: {}", text)))?;
                tokens.push(Token::Num(num));
                i = end;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut end = i;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                let word: String = chars[start..end].iter().collect();
                match word.as_str() {
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    "null" => tokens.push(Token::Null),
                    "in" => tokens.push(Token::In),
                    other => {
                        return Err(EvalError::Parse(format!(
                            "unexpected identifier: {} (variables use a '$' prefix)",
                            other
                        )))
                    }
                }
                i = end;
            }
            other => {
                return Err(EvalError::Parse(format!(
                    "unexpected character in expression: {}",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn next_is_digit(chars: &[char], i: usize) -> bool {
    chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
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

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_comparison()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::NotEq) => BinOp::NotEq,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Gte) => BinOp::Gte,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Lte) => BinOp::Lte,
            Some(Token::In) => BinOp::In,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_additive()?;
        Ok(Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_primary()?;
        while self.eat(&Token::Plus) {
            let right = self.parse_primary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinOp::Add,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Literal::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(Literal::Number(n))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Literal::Bool(b))),
            Some(Token::Null) => Ok(Expr::Literal(Literal::Null)),
            Some(Token::Var(path)) => Ok(Expr::Var(path)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(EvalError::Parse("missing closing ')'".to_string()));
                }
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if self.eat(&Token::RBracket) {
                    return Ok(Expr::List(items));
                }
                loop {
                    items.push(self.parse_or()?);
                    if self.eat(&Token::Comma) {
                        continue;
                    }
                    if self.eat(&Token::RBracket) {
                        break;
                    }
                    return Err(EvalError::Parse("missing closing ']'".to_string()));
                }
                Ok(Expr::List(items))
            }
            other => Err(EvalError::Parse(format!(
                "unexpected token in expression: {:?}",
                other
            ))),
        }
    }
}
