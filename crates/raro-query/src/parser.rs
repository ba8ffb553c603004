use crate::ast::{Arg, Query, Step};
use crate::error::QueryError;

type Result<T> = std::result::Result<T, QueryError>;

/// Recursive-descent parser for the small fluent traversal grammar:
/// `g(.step(args?))*`. Operates on chars with byte offsets so error
/// positions line up with the source string.
pub struct Parser<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
        }
    }

    pub fn parse(mut self) -> Result<Query> {
        self.skip_ws();
        self.expect_ident("g")?;
        let mut steps = Vec::new();
        self.skip_ws();
        while self.peek() == Some('.') {
            self.advance();
            let step = self.parse_step()?;
            steps.push(step);
            self.skip_ws();
        }
        self.skip_ws();
        if self.pos != self.chars.len() {
            return Err(self.err("unexpected trailing input"));
        }
        Ok(Query { steps })
    }

    fn parse_step(&mut self) -> Result<Step> {
        let name = self.parse_ident()?;
        self.expect_char('(')?;
        let args = self.parse_args()?;
        self.expect_char(')')?;
        build_step(&name, args, self)
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            return Ok(args);
        }
        loop {
            self.skip_ws();
            args.push(self.parse_arg()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                _ => break,
            }
        }
        Ok(args)
    }

    fn parse_arg(&mut self) -> Result<Arg> {
        match self.peek() {
            Some('\'') | Some('"') => self.parse_string().map(Arg::Str),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number(),
            Some(_) => self.parse_bool(),
            None => Err(self.err("expected argument")),
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = self.advance().unwrap();
        let mut s = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(s),
                Some(c) => s.push(c),
                None => return Err(self.err("unterminated string")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Arg> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.advance();
        }
        let text = self.slice_from(start);
        text.parse::<f64>()
            .map(Arg::Num)
            .map_err(|_| self.err("invalid number literal"))
    }

    fn parse_bool(&mut self) -> Result<Arg> {
        if self.try_consume_ident("true") {
            Ok(Arg::Bool(true))
        } else if self.try_consume_ident("false") {
            Ok(Arg::Bool(false))
        } else {
            Err(self.err("expected string, number, or boolean"))
        }
    }

    fn parse_ident(&mut self) -> Result<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        if self.pos == start {
            return Err(self.err("expected identifier"));
        }
        Ok(self.slice_from(start))
    }

    fn expect_ident(&mut self, expected: &str) -> Result<()> {
        let ident = self.parse_ident()?;
        if ident != expected {
            return Err(self.err(format!("expected '{expected}'")));
        }
        Ok(())
    }

    fn try_consume_ident(&mut self, expected: &str) -> bool {
        let checkpoint = self.pos;
        if self.parse_ident().as_deref() == Ok(expected) {
            true
        } else {
            self.pos = checkpoint;
            false
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        if self.advance() == Some(expected) {
            Ok(())
        } else {
            Err(self.err(format!("expected '{expected}'")))
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn slice_from(&self, start: usize) -> String {
        let byte_start = self.chars[start].0;
        let byte_end = self
            .chars
            .get(self.pos)
            .map(|(b, _)| *b)
            .unwrap_or(self.src.len());
        self.src[byte_start..byte_end].to_string()
    }

    fn byte_offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(b, _)| *b)
            .unwrap_or(self.src.len())
    }

    fn err(&self, message: impl Into<String>) -> QueryError {
        QueryError::Parse {
            offset: self.byte_offset(),
            message: message.into(),
        }
    }
}

fn build_step(name: &str, args: Vec<Arg>, parser: &Parser) -> Result<Step> {
    let strings = || -> Vec<String> {
        args.iter()
            .filter_map(|a| a.as_str().map(str::to_string))
            .collect()
    };
    match name {
        "V" => Ok(Step::V(strings())),
        "E" => Ok(Step::E(strings())),
        "hasLabel" => Ok(Step::HasLabel(strings())),
        "has" => match args.len() {
            1 => Ok(Step::Has(
                args[0].as_str().unwrap_or_default().to_string(),
                None,
            )),
            2 => Ok(Step::Has(
                args[0].as_str().unwrap_or_default().to_string(),
                Some(args[1].to_value()),
            )),
            _ => Err(parser.err("has() takes 1 or 2 arguments")),
        },
        "out" => Ok(Step::Out(strings())),
        "in" => Ok(Step::In(strings())),
        "both" => Ok(Step::Both(strings())),
        "values" => Ok(Step::Values(strings())),
        "count" => Ok(Step::Count),
        "limit" => {
            let n = args
                .first()
                .and_then(|a| match a {
                    Arg::Num(n) => Some(*n as usize),
                    _ => None,
                })
                .ok_or_else(|| parser.err("limit() requires a numeric argument"))?;
            Ok(Step::Limit(n))
        }
        other => Err(parser.err(format!("unknown step '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v_count_query() {
        let query = Parser::new("g.V().hasLabel('User').count()").parse().unwrap();
        assert_eq!(
            query.steps,
            vec![
                Step::V(vec![]),
                Step::HasLabel(vec!["User".to_string()]),
                Step::Count
            ]
        );
    }

    #[test]
    fn rejects_queries_not_starting_with_g() {
        let err = Parser::new("h.V()").parse().unwrap_err();
        assert!(matches!(err, QueryError::Parse { offset: 0, .. }));
    }
}
