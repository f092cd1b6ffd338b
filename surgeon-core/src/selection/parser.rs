//! Recursive-descent parser for the selection-set expression syntax.
//!
//! Precedence, loosest to tightest: `,` union, `|` union (alias), `&`
//! intersection, postfix `~` complement and `?` neighbor-expansion, `..`
//! range, then atoms and `@func(...)` calls.

use bstr::BString;

use super::lexer::{LexError, Lexer, Token};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Int(u64),
    Mark(u64),
    Name(BString),
    Regex(BString),
    Path(BString),
    Cap(char),
    Range(Box<Expr>, Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Intersect(Box<Expr>, Box<Expr>),
    Complement(Box<Expr>),
    Neighbors(Box<Expr>),
    Func(String, Box<Expr>),
    /// A bare `@func` with no argument list, operating on the whole
    /// repository (e.g. `@srt` to sort all events).
    FuncAll(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected token {0:?}")]
    Unexpected(Token),
    #[error("unexpected end of selection expression")]
    Eof,
}

pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut p = Parser { tokens, pos: 0 };
    let expr = p.union()?;
    p.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.peek() {
            Token::Eof => Ok(()),
            t => Err(ParseError::Unexpected(t.clone())),
        }
    }

    fn union(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.intersect()?;
        loop {
            match self.peek() {
                Token::Comma | Token::Pipe => {
                    self.advance();
                    let rhs = self.intersect()?;
                    lhs = Expr::Union(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn intersect(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.postfix()?;
        while matches!(self.peek(), Token::Amp) {
            self.advance();
            let rhs = self.postfix()?;
            lhs = Expr::Intersect(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.range()?;
        loop {
            match self.peek() {
                Token::Tilde => {
                    self.advance();
                    expr = Expr::Complement(Box::new(expr));
                }
                Token::Question => {
                    self.advance();
                    expr = Expr::Neighbors(Box::new(expr));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn range(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.atom()?;
        if matches!(self.peek(), Token::DotDot) {
            self.advance();
            let rhs = self.atom()?;
            Ok(Expr::Range(Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Mark(m) => Ok(Expr::Mark(m)),
            Token::Name(n) => Ok(Expr::Name(n)),
            Token::Regex(r) => Ok(Expr::Regex(r)),
            Token::Path(p) => Ok(Expr::Path(p)),
            Token::Cap(c) => Ok(Expr::Cap(c)),
            Token::LParen => {
                let inner = self.union()?;
                match self.advance() {
                    Token::RParen => Ok(inner),
                    t => Err(ParseError::Unexpected(t)),
                }
            }
            Token::At(name) => {
                let name = String::from_utf8_lossy(&name).into_owned();
                if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let inner = self.union()?;
                    match self.advance() {
                        Token::RParen => Ok(Expr::Func(name, Box::new(inner))),
                        t => Err(ParseError::Unexpected(t)),
                    }
                } else {
                    Ok(Expr::FuncAll(name))
                }
            }
            Token::Eof => Err(ParseError::Eof),
            t => Err(ParseError::Unexpected(t)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_range() {
        assert_eq!(parse("1..5").unwrap(), Expr::Range(Box::new(Expr::Int(1)), Box::new(Expr::Int(5))));
    }

    #[test]
    fn parses_union_and_intersect_precedence() {
        // `&` binds tighter than `,`, so this is 1 | (2 & 3).
        let expr = parse("1, 2 & 3").unwrap();
        assert_eq!(
            expr,
            Expr::Union(
                Box::new(Expr::Int(1)),
                Box::new(Expr::Intersect(Box::new(Expr::Int(2)), Box::new(Expr::Int(3)))),
            )
        );
    }

    #[test]
    fn parses_complement_and_neighbors() {
        let expr = parse("=C~?").unwrap();
        assert_eq!(expr, Expr::Neighbors(Box::new(Expr::Complement(Box::new(Expr::Cap('C'))))));
    }

    #[test]
    fn parses_function_call() {
        let expr = parse("@anc(:5)").unwrap();
        assert_eq!(expr, Expr::Func("anc".into(), Box::new(Expr::Mark(5))));
    }

    #[test]
    fn parses_parenthesized_group() {
        let expr = parse("(1, 2) & 3").unwrap();
        assert_eq!(
            expr,
            Expr::Intersect(
                Box::new(Expr::Union(Box::new(Expr::Int(1)), Box::new(Expr::Int(2)))),
                Box::new(Expr::Int(3)),
            )
        );
    }
}
