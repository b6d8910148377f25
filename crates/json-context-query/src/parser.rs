//! Query expression parser.

use json_context_value::Value;
use thiserror::Error;

use crate::types::*;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character {0:?} at {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("expected identifier at {0}")]
    ExpectedIdentifier(usize),
    #[error("unclosed string starting at {0}")]
    UnclosedString(usize),
    #[error("invalid operand at {0}")]
    InvalidOperand(usize),
}

/// Characters that terminate identifiers and bare words.
const RESERVED: &str = ".[]{}:=!<>&,()'\"";

fn is_ident_char(c: char) -> bool {
    !c.is_whitespace() && !RESERVED.contains(c)
}

/// Query expression parser.
pub struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> QueryParser<'a> {
    /// Parse a complete query expression.
    ///
    /// ```
    /// use json_context_query::{Origin, QueryParser};
    ///
    /// let query = QueryParser::parse("pages[id={.id}]").unwrap();
    /// assert_eq!(query.origin, Origin::Root);
    /// assert_eq!(query.steps.len(), 2);
    ///
    /// assert!(QueryParser::parse("pages[id=").is_err());
    /// ```
    pub fn parse(input: &'a str) -> Result<Query, ParseError> {
        let mut parser = Self { input, pos: 0 };
        let query = parser.parse_query()?;
        parser.skip_whitespace();
        match parser.peek() {
            None => Ok(query),
            Some(c) => Err(ParseError::UnexpectedChar(c, parser.pos)),
        }
    }

    fn parse_query(&mut self) -> Result<Query, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut steps = Vec::new();

        let origin = match self.peek() {
            Some('.') => {
                self.advance();
                if self.peek().is_some_and(is_ident_char) {
                    steps.push(Step::Field(self.parse_identifier()?));
                }
                Origin::Context
            }
            Some(':') => Origin::Context,
            Some(c) if is_ident_char(c) => {
                steps.push(Step::Field(self.parse_identifier()?));
                Origin::Root
            }
            _ => Origin::Root,
        };

        loop {
            match self.peek() {
                Some('.') => {
                    self.advance();
                    steps.push(Step::Field(self.parse_identifier()?));
                }
                Some('[') => {
                    self.advance();
                    steps.push(Step::Select(self.parse_selector()?));
                }
                Some(':') => {
                    self.advance();
                    steps.push(Step::Filter(self.parse_filter_call()?));
                }
                _ => break,
            }
        }

        Ok(Query {
            source: self.input[start..self.pos].trim().to_string(),
            origin,
            steps,
        })
    }

    fn parse_selector(&mut self) -> Result<Selector, ParseError> {
        self.skip_whitespace();
        let selector = match self.peek() {
            Some('{') => {
                self.advance();
                let query = self.parse_query()?;
                self.skip_whitespace();
                self.expect('}')?;
                Selector::Dynamic(Box::new(query))
            }
            Some('*') => {
                self.advance();
                Selector::Each
            }
            Some('\'') | Some('"') => Selector::Name(self.parse_string()?),
            Some(c) if c.is_ascii_digit() => {
                let save = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
                let digits = &self.input[save..self.pos];
                self.skip_whitespace();
                match (self.peek(), digits.parse::<usize>()) {
                    (Some(']'), Ok(index)) => Selector::Index(index),
                    _ => {
                        self.pos = save;
                        Selector::Where(self.parse_conditions()?)
                    }
                }
            }
            Some(_) => Selector::Where(self.parse_conditions()?),
            None => return Err(ParseError::UnexpectedEnd),
        };
        self.skip_whitespace();
        self.expect(']')?;
        Ok(selector)
    }

    fn parse_conditions(&mut self) -> Result<Vec<Condition>, ParseError> {
        let mut conditions = vec![self.parse_condition()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some('&') {
                self.advance();
                conditions.push(self.parse_condition()?);
            } else {
                return Ok(conditions);
            }
        }
    }

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        self.skip_whitespace();
        let negate = self.peek() == Some('!');
        if negate {
            self.advance();
        }

        let mut path = vec![self.parse_identifier()?];
        while self.peek() == Some('.') {
            self.advance();
            path.push(self.parse_identifier()?);
        }

        self.skip_whitespace();
        let test = match self.parse_cmp_op() {
            Some(op) => Some((op, self.parse_operand()?)),
            None => None,
        };

        Ok(Condition { path, test, negate })
    }

    fn parse_cmp_op(&mut self) -> Option<CmpOp> {
        let rest = &self.input[self.pos..];
        let (op, len) = if rest.starts_with("!=") {
            (CmpOp::Ne, 2)
        } else if rest.starts_with(">=") {
            (CmpOp::Ge, 2)
        } else if rest.starts_with("<=") {
            (CmpOp::Le, 2)
        } else if rest.starts_with('=') {
            (CmpOp::Eq, 1)
        } else if rest.starts_with('>') {
            (CmpOp::Gt, 1)
        } else if rest.starts_with('<') {
            (CmpOp::Lt, 1)
        } else {
            return None;
        };
        self.pos += len;
        Some(op)
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => {
                self.advance();
                let query = self.parse_query()?;
                self.skip_whitespace();
                self.expect('}')?;
                Ok(Operand::Query(Box::new(query)))
            }
            Some('\'') | Some('"') => Ok(Operand::Literal(Value::String(self.parse_string()?))),
            Some(_) => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if "]&,)}".contains(c) {
                        break;
                    }
                    self.advance();
                }
                let word = self.input[start..self.pos].trim();
                if word.is_empty() {
                    return Err(ParseError::InvalidOperand(start));
                }
                Ok(Operand::Literal(literal_from_bareword(word)))
            }
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_filter_call(&mut self) -> Result<FilterCall, ParseError> {
        let name = self.parse_identifier()?;
        let mut args = Vec::new();
        if self.peek() == Some('(') {
            self.advance();
            loop {
                self.skip_whitespace();
                if self.peek() == Some(')') {
                    self.advance();
                    break;
                }
                args.push(self.parse_operand()?);
                self.skip_whitespace();
                match self.peek() {
                    Some(',') => self.advance(),
                    Some(')') => {
                        self.advance();
                        break;
                    }
                    Some(c) => return Err(ParseError::UnexpectedChar(c, self.pos)),
                    None => return Err(ParseError::UnexpectedEnd),
                }
            }
        }
        Ok(FilterCall { name, args })
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.advance();
        }
        if start == self.pos {
            return Err(ParseError::ExpectedIdentifier(start));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let quote = self.peek().ok_or(ParseError::UnexpectedEnd)?;
        self.advance();
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedString(start)),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(out);
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self.peek().ok_or(ParseError::UnclosedString(start))?;
                    self.advance();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                Some(c) => {
                    self.advance();
                    out.push(c);
                }
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.advance();
                Ok(())
            }
            Some(c) => Err(ParseError::UnexpectedChar(c, self.pos)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }
}

/// Bare words read as `true`, `false`, `null`, numbers, or else strings.
fn literal_from_bareword(word: &str) -> Value {
    match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(n) = word.parse::<i64>() {
                Value::from(n)
            } else if let Some(n) = word.parse::<f64>().ok().filter(|n| n.is_finite()) {
                Value::from(n)
            } else {
                Value::from(word)
            }
        }
    }
}
