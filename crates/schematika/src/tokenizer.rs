//! Incremental character scanner.
//!
//! The reader feeds text in whatever chunks the host provides; the tokenizer
//! buffers it and hands back one classified [`Token`] at a time. A token that
//! touches the end of the buffer is not emitted until either more input
//! arrives or the caller signals end-of-input, since it might still extend
//! (`1` then `.5`, `:` then `=`, an identifier split across reads).

use crate::{
    error::{LexError, LexErrorKind},
    token::{Span, Token, TokenKind},
};

#[derive(Debug, Default)]
pub struct Tokenizer {
    buf: String,
    /// Byte offset of the next unconsumed character within `buf`.
    pos: usize,
    /// Global offset of `buf[0]`, so spans survive buffer compaction.
    base: usize,
}

impl Tokenizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends input text, compacting already-consumed bytes first.
    pub fn push(&mut self, input: &str) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.base += self.pos;
            self.pos = 0;
        }
        self.buf.push_str(input);
    }

    /// Discards all buffered input.
    pub fn clear(&mut self) {
        self.base += self.buf.len();
        self.buf.clear();
        self.pos = 0;
    }

    /// True if unconsumed input remains in the buffer.
    #[must_use]
    pub fn has_pending_input(&self) -> bool {
        self.buf[self.pos..].chars().any(|c| !c.is_whitespace())
    }

    /// Scans the next token.
    ///
    /// Returns `Ok(None)` when the buffer holds no complete token: either it
    /// is exhausted, or (`eof` false) the trailing bytes could still extend
    /// into a longer token once more input arrives.
    pub fn next(&mut self, eof: bool) -> Result<Option<Token>, LexError> {
        loop {
            self.skip_whitespace();
            let bytes = self.buf.as_bytes();
            if self.pos >= bytes.len() {
                return Ok(None);
            }
            // Line comments. A lone '/' at the end of the buffer may yet
            // become '//', so hold it back until eof.
            if bytes[self.pos] == b'/' {
                if self.pos + 1 >= bytes.len() {
                    if eof {
                        return self.punctuation();
                    }
                    return Ok(None);
                }
                if bytes[self.pos + 1] == b'/' {
                    match self.buf[self.pos..].find('\n') {
                        Some(nl) => {
                            self.pos += nl + 1;
                            continue;
                        }
                        None if eof => {
                            self.pos = self.buf.len();
                            return Ok(None);
                        }
                        None => return Ok(None),
                    }
                }
            }
            break;
        }

        let ch = self.buf[self.pos..]
            .chars()
            .next()
            .expect("scan position inside buffer");
        if ch == '_' || ch.is_ascii_alphabetic() {
            self.identifier(eof)
        } else if ch.is_ascii_digit() {
            self.number(eof)
        } else if ch == '"' {
            self.string(eof)
        } else {
            self.punctuation_or_hold(eof)
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.buf[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn span(&self, start: usize) -> Span {
        Span {
            start: self.base + start,
            end: self.base + self.pos,
        }
    }

    fn identifier(&mut self, eof: bool) -> Result<Option<Token>, LexError> {
        let start = self.pos;
        let bytes = self.buf.as_bytes();
        let mut end = start;
        while end < bytes.len() && (bytes[end] == b'_' || bytes[end].is_ascii_alphanumeric()) {
            end += 1;
        }
        if end == bytes.len() && !eof {
            return Ok(None);
        }
        self.pos = end;
        let text = &self.buf[start..end];
        let kind = match text {
            "def" => TokenKind::Def,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "lambda" => TokenKind::Lambda,
            "let" => TokenKind::Let,
            "in" => TokenKind::In,
            "end" => TokenKind::End,
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => TokenKind::Symbol(text.to_owned()),
        };
        Ok(Some(Token::new(kind, self.span(start))))
    }

    fn number(&mut self, eof: bool) -> Result<Option<Token>, LexError> {
        let start = self.pos;
        let bytes = self.buf.as_bytes();
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let mut is_float = false;
        // A fraction only if '.' is followed by a digit; otherwise the dot
        // is its own token.
        if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
            is_float = true;
            end += 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        } else if end < bytes.len() && bytes[end] == b'.' && end + 1 >= bytes.len() && !eof {
            // "1." at the buffer edge: the next chunk may bring the digits.
            return Ok(None);
        }
        if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut exp = end + 1;
            if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
                exp += 1;
            }
            if exp < bytes.len() && bytes[exp].is_ascii_digit() {
                is_float = true;
                end = exp;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
            } else if exp >= bytes.len() && !eof {
                return Ok(None);
            }
        }
        if end == bytes.len() && !eof {
            return Ok(None);
        }
        self.pos = end;
        let text = &self.buf[start..end];
        let kind = if is_float {
            match text.parse::<f64>() {
                Ok(v) => TokenKind::F64(v),
                Err(_) => {
                    return Err(LexError {
                        kind: LexErrorKind::MalformedNumber,
                        pos: self.base + start,
                    });
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => TokenKind::I64(v),
                Err(_) => {
                    return Err(LexError {
                        kind: LexErrorKind::MalformedNumber,
                        pos: self.base + start,
                    });
                }
            }
        };
        Ok(Some(Token::new(kind, self.span(start))))
    }

    fn string(&mut self, eof: bool) -> Result<Option<Token>, LexError> {
        let start = self.pos;
        let bytes = self.buf.as_bytes();
        let mut out = String::new();
        let mut i = start + 1;
        loop {
            if i >= bytes.len() {
                if eof {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        pos: self.base + start,
                    });
                }
                return Ok(None);
            }
            match bytes[i] {
                b'"' => {
                    self.pos = i + 1;
                    return Ok(Some(Token::new(TokenKind::Str(out), self.span(start))));
                }
                b'\\' => {
                    if i + 1 >= bytes.len() {
                        if eof {
                            return Err(LexError {
                                kind: LexErrorKind::UnterminatedString,
                                pos: self.base + start,
                            });
                        }
                        return Ok(None);
                    }
                    match bytes[i + 1] {
                        b'n' => out.push('\n'),
                        b't' => out.push('\t'),
                        b'r' => out.push('\r'),
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        other => {
                            return Err(LexError {
                                kind: LexErrorKind::UnexpectedChar(char::from(other)),
                                pos: self.base + i + 1,
                            });
                        }
                    }
                    i += 2;
                }
                _ => {
                    let ch = self.buf[i..].chars().next().expect("in-bounds char");
                    out.push(ch);
                    i += ch.len_utf8();
                }
            }
        }
    }

    /// Punctuation dispatch, holding back prefixes of two-character
    /// operators that sit at the buffer edge.
    fn punctuation_or_hold(&mut self, eof: bool) -> Result<Option<Token>, LexError> {
        let bytes = self.buf.as_bytes();
        let ch = bytes[self.pos];
        let at_edge = self.pos + 1 >= bytes.len();
        if at_edge && !eof && matches!(ch, b'=' | b'<' | b'>' | b':' | b'-' | b'!') {
            return Ok(None);
        }
        self.punctuation()
    }

    fn punctuation(&mut self) -> Result<Option<Token>, LexError> {
        let bytes = self.buf.as_bytes();
        let start = self.pos;
        let ch = bytes[start];
        let next = bytes.get(start + 1).copied();
        let (kind, width) = match (ch, next) {
            (b'=', Some(b'=')) => (TokenKind::CmpEq, 2),
            (b'!', Some(b'=')) => (TokenKind::CmpNe, 2),
            (b'<', Some(b'=')) => (TokenKind::LessEqual, 2),
            (b'>', Some(b'=')) => (TokenKind::GreatEqual, 2),
            (b':', Some(b'=')) => (TokenKind::Assign, 2),
            (b':', Some(b':')) => (TokenKind::DoubleColon, 2),
            (b'-', Some(b'>')) => (TokenKind::Yields, 2),
            (b'=', _) => (TokenKind::SingleAssign, 1),
            (b'<', _) => (TokenKind::LeftAngle, 1),
            (b'>', _) => (TokenKind::RightAngle, 1),
            (b':', _) => (TokenKind::Colon, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b';', _) => (TokenKind::Semicolon, 1),
            (b',', _) => (TokenKind::Comma, 1),
            (b'.', _) => (TokenKind::Dot, 1),
            (b'(', _) => (TokenKind::LeftParen, 1),
            (b')', _) => (TokenKind::RightParen, 1),
            (b'{', _) => (TokenKind::LeftBrace, 1),
            (b'}', _) => (TokenKind::RightBrace, 1),
            (b'[', _) => (TokenKind::LeftBracket, 1),
            (b']', _) => (TokenKind::RightBracket, 1),
            _ => {
                let ch = self.buf[start..].chars().next().expect("in-bounds char");
                return Err(LexError {
                    kind: LexErrorKind::UnexpectedChar(ch),
                    pos: self.base + start,
                });
            }
        };
        self.pos = start + width;
        Ok(Some(Token::new(kind, self.span(start))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<TokenKind> {
        let mut tz = Tokenizer::new();
        tz.push(src);
        let mut out = Vec::new();
        while let Some(tk) = tz.next(true).expect("lex") {
            out.push(tk.kind);
        }
        out
    }

    #[test]
    fn keywords_and_symbols() {
        assert_eq!(
            lex_all("def pi lambda iffy"),
            vec![
                TokenKind::Def,
                TokenKind::Symbol("pi".to_owned()),
                TokenKind::Lambda,
                TokenKind::Symbol("iffy".to_owned()),
            ]
        );
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(
            lex_all("42 3.14 1e3"),
            vec![TokenKind::I64(42), TokenKind::F64(3.14), TokenKind::F64(1e3)]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            lex_all(":= == != <= >= -> ::"),
            vec![
                TokenKind::Assign,
                TokenKind::CmpEq,
                TokenKind::CmpNe,
                TokenKind::LessEqual,
                TokenKind::GreatEqual,
                TokenKind::Yields,
                TokenKind::DoubleColon,
            ]
        );
    }

    #[test]
    fn token_split_across_reads_is_held_back() {
        let mut tz = Tokenizer::new();
        tz.push("fa");
        assert_eq!(tz.next(false).expect("lex"), None);
        tz.push("ct(5)");
        assert_eq!(
            tz.next(false).expect("lex").map(|t| t.kind),
            Some(TokenKind::Symbol("fact".to_owned()))
        );
    }

    #[test]
    fn colon_at_edge_waits_for_possible_assign() {
        let mut tz = Tokenizer::new();
        tz.push("x :");
        assert_eq!(
            tz.next(false).expect("lex").map(|t| t.kind),
            Some(TokenKind::Symbol("x".to_owned()))
        );
        assert_eq!(tz.next(false).expect("lex"), None);
        tz.push("= 1");
        assert_eq!(tz.next(false).expect("lex").map(|t| t.kind), Some(TokenKind::Assign));
    }

    #[test]
    fn string_literals_with_escapes() {
        assert_eq!(
            lex_all(r#""hi\n" "a\"b""#),
            vec![
                TokenKind::Str("hi\n".to_owned()),
                TokenKind::Str("a\"b".to_owned()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            lex_all("1 // ignored\n2"),
            vec![TokenKind::I64(1), TokenKind::I64(2)]
        );
    }

    #[test]
    fn spans_survive_compaction() {
        let mut tz = Tokenizer::new();
        tz.push("ab ");
        let t1 = tz.next(true).expect("lex").expect("token");
        tz.push("cd");
        let t2 = tz.next(true).expect("lex").expect("token");
        assert_eq!(t1.span, Some(Span { start: 0, end: 2 }));
        assert_eq!(t2.span, Some(Span { start: 3, end: 5 }));
    }
}
