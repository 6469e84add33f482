//! The calculation widget. Unlike the other domain widgets it has no
//! external backend: it extracts and evaluates a simple arithmetic
//! expression from the query locally.

use async_trait::async_trait;
use serde_json::json;

use crate::actions::context::ActionContext;
use crate::actions::widgets::Widget;
use crate::classifier::Classification;
use crate::error::ToolError;

pub struct CalculationWidget;

#[async_trait]
impl Widget for CalculationWidget {
    fn widget_type(&self) -> &'static str {
        "calculation"
    }

    fn enabled(&self, classification: &Classification) -> bool {
        classification.widgets.show_calculation_widget
    }

    async fn run(&self, query: &str, _ctx: &ActionContext) -> Result<Vec<serde_json::Value>, ToolError> {
        let expr = extract_expression(query);
        match expr.as_deref().map(evaluate) {
            Some(Ok(value)) => Ok(vec![json!({ "expression": expr, "result": value })]),
            _ => Ok(vec![]),
        }
    }
}

/// Pull out the longest run of characters that look like an arithmetic
/// expression (digits, operators, parens, decimal points, whitespace).
fn extract_expression(query: &str) -> Option<String> {
    let is_expr_char = |c: char| c.is_ascii_digit() || "+-*/(). ".contains(c);
    let mut best: Option<&str> = None;
    let chars: Vec<(usize, char)> = query.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        if is_expr_char(chars[i].1) && chars[i].1.is_ascii_digit() {
            let start = chars[i].0;
            let mut end = start;
            let mut j = i;
            while j < chars.len() && is_expr_char(chars[j].1) {
                end = chars[j].0 + chars[j].1.len_utf8();
                j += 1;
            }
            let candidate = query[start..end].trim();
            if candidate.chars().any(|c| "+-*/".contains(c)) {
                if best.map(|b| candidate.len() > b.len()).unwrap_or(true) {
                    best = Some(candidate);
                }
            }
            i = j;
        } else {
            i += 1;
        }
    }
    best.map(str::to_string)
}

/// A minimal recursive-descent evaluator for `+ - * / ( )` over f64s.
fn evaluate(expr: &str) -> Result<f64, ToolError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ToolError::InvalidRequest(format!("unexpected trailing input in expression: {expr}")));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ToolError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| ToolError::InvalidRequest(format!("bad number: {text}")))?;
                tokens.push(Token::Number(value));
            }
            other => return Err(ToolError::InvalidRequest(format!("unexpected character in expression: {other}"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_expr(&mut self) -> Result<f64, ToolError> {
        let mut value = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.parse_factor()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.parse_factor()?;
                    if divisor == 0.0 {
                        return Err(ToolError::InvalidRequest("division by zero".to_string()));
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_factor(&mut self) -> Result<f64, ToolError> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.parse_factor()?)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.parse_expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err(ToolError::InvalidRequest("unmatched parenthesis".to_string())),
                }
            }
            _ => Err(ToolError::InvalidRequest("expected a number or parenthesis".to_string())),
        }
    }
}
