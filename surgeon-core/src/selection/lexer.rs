//! Tokenizer for the selection-set expression syntax.

use bstr::BString;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Int(u64),
    Mark(u64),
    Name(BString),
    Regex(BString),
    Path(BString),
    Cap(char),
    DotDot,
    Comma,
    Pipe,
    Amp,
    Tilde,
    Question,
    At(BString),
    LParen,
    RParen,
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated regex literal")]
    UnterminatedRegex,
    #[error("unterminated path literal")]
    UnterminatedPath,
    #[error("unexpected character {0:?}")]
    Unexpected(char),
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Lexer { chars: src.char_indices().peekable(), src }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Token::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let Some(&(_, c)) = self.chars.peek() else { return Ok(Token::Eof) };
        match c {
            '(' => {
                self.chars.next();
                Ok(Token::LParen)
            }
            ')' => {
                self.chars.next();
                Ok(Token::RParen)
            }
            ',' => {
                self.chars.next();
                Ok(Token::Comma)
            }
            '|' => {
                self.chars.next();
                Ok(Token::Pipe)
            }
            '&' => {
                self.chars.next();
                Ok(Token::Amp)
            }
            '~' => {
                self.chars.next();
                Ok(Token::Tilde)
            }
            '?' => {
                self.chars.next();
                Ok(Token::Question)
            }
            '.' => {
                self.chars.next();
                if matches!(self.chars.peek(), Some((_, '.'))) {
                    self.chars.next();
                    Ok(Token::DotDot)
                } else {
                    Err(LexError::Unexpected('.'))
                }
            }
            ':' => {
                self.chars.next();
                let digits = self.take_while(|c| c.is_ascii_digit());
                digits.parse().map(Token::Mark).map_err(|_| LexError::Unexpected(':'))
            }
            '@' => {
                self.chars.next();
                let name = self.take_while(|c| c.is_alphanumeric());
                Ok(Token::At(name.into()))
            }
            '=' => {
                self.chars.next();
                match self.chars.next() {
                    Some((_, c)) if is_cap_letter(c) => Ok(Token::Cap(c)),
                    Some((_, c)) => Err(LexError::Unexpected(c)),
                    None => Err(LexError::Unexpected('=')),
                }
            }
            '/' => {
                self.chars.next();
                let body = self.take_until('/').ok_or(LexError::UnterminatedRegex)?;
                Ok(Token::Regex(body.into()))
            }
            '"' => {
                self.chars.next();
                let body = self.take_until('"').ok_or(LexError::UnterminatedPath)?;
                Ok(Token::Path(body.into()))
            }
            c if c.is_ascii_digit() => {
                let digits = self.take_while(|c| c.is_ascii_digit());
                digits.parse().map(Token::Int).map_err(|_| LexError::Unexpected(c))
            }
            c if c.is_alphabetic() || c == '_' => {
                let name = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '/' || c == '-' || c == '.');
                Ok(Token::Name(name.into()))
            }
            c => Err(LexError::Unexpected(c)),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        &self.src[start..end]
    }

    fn take_until(&mut self, delim: char) -> Option<&'a str> {
        let start = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        let mut end = start;
        loop {
            match self.chars.next() {
                Some((i, c)) if c == delim => {
                    end = i;
                    return Some(&self.src[start..end]);
                }
                Some((i, c)) => end = i + c.len_utf8(),
                None => return None,
            }
        }
    }
}

/// Capability letters recognized after `=`: commits, heads, tags,
/// blobs, resets, passthroughs, orphans, callout-parented, zero-fileop,
/// merges, forks, unclean-comment, non-UTF-8, all-deletes, legacy-id match.
fn is_cap_letter(c: char) -> bool {
    matches!(c, 'C' | 'H' | 'T' | 'B' | 'R' | 'P' | 'O' | 'U' | 'Z' | 'M' | 'F' | 'L' | 'I' | 'D' | 'N')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_range() {
        let tokens = Lexer::new("1..5").tokenize().unwrap();
        assert_eq!(tokens, vec![Token::Int(1), Token::DotDot, Token::Int(5), Token::Eof]);
    }

    #[test]
    fn lexes_mark_and_function() {
        let tokens = Lexer::new("@anc(:42)").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::At("anc".into()),
                Token::LParen,
                Token::Mark(42),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lexes_regex_and_path() {
        let tokens = Lexer::new(r#"/fix.*bug/ & "src/main.rs""#).tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Regex("fix.*bug".into()),
                Token::Amp,
                Token::Path("src/main.rs".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn cap_letter_requires_equals_prefix() {
        let tokens = Lexer::new("=C").tokenize().unwrap();
        assert_eq!(tokens, vec![Token::Cap('C'), Token::Eof]);
    }

    #[test]
    fn branch_name_not_cap_letter() {
        let tokens = Lexer::new("trunk").tokenize().unwrap();
        assert_eq!(tokens, vec![Token::Name("trunk".into()), Token::Eof]);
    }

    #[test]
    fn bare_letter_is_a_name_not_a_cap() {
        let tokens = Lexer::new("C").tokenize().unwrap();
        assert_eq!(tokens, vec![Token::Name("C".into()), Token::Eof]);
    }
}
