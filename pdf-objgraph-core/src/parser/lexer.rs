//! PDF Tokenizer
//!
//! Splits a seekable byte source into literal and delimiter tokens following
//! the lexical rules of ISO 32000-1 Section 7.2. Values are assembled from
//! these tokens in `variant_reader`.

use crate::error::{PdfError, Result};
use std::collections::VecDeque;
use std::io::{BufReader, Read, Seek, SeekFrom};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Keywords, numbers and the body of names.
    Literal,
    /// `<<`, `>>`, `<`, `>`, `[`, `]`, `(`, `)`, `{`, `}`, `/`.
    Delimiter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Vec<u8>,
}

impl Token {
    pub fn literal(text: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: TokenKind::Literal,
            text: text.into(),
        }
    }

    pub fn delimiter(text: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: TokenKind::Delimiter,
            text: text.into(),
        }
    }

    pub fn is_literal(&self, text: &[u8]) -> bool {
        self.kind == TokenKind::Literal && self.text == text
    }

    pub fn is_delimiter(&self, text: &[u8]) -> bool {
        self.kind == TokenKind::Delimiter && self.text == text
    }

    /// Text for diagnostics.
    pub fn display(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }
}

/// PDF whitespace: NUL, TAB, LF, FF, CR and SPACE.
pub fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

pub fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Leading integer of `text`, like C `strtol`: optional sign then digits.
/// `None` when no digit follows the sign. Overflow saturates.
pub fn parse_integer_prefix(text: &[u8]) -> Option<i64> {
    let (negative, digits) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let len = digits.iter().take_while(|c| c.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let magnitude = digits[..len].iter().fold(0i64, |acc, &d| {
        acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

/// Tokenizer over a seekable source with a queue of pushed-back tokens.
pub struct Tokenizer<R> {
    reader: BufReader<R>,
    position: u64,
    peek_buffer: Option<u8>,
    queue: VecDeque<Token>,
}

impl<R: Read + Seek> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            position: 0,
            peek_buffer: None,
            queue: VecDeque::new(),
        }
    }

    /// Offset of the next unread byte. Queued tokens are not counted.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move to an absolute offset. Pending tokens are discarded.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(position))?;
        self.position = position;
        self.peek_buffer = None;
        self.queue.clear();
        Ok(())
    }

    /// Total size of the source in bytes. The read position is kept.
    pub fn len(&mut self) -> Result<u64> {
        let end = self.reader.seek(SeekFrom::End(0))?;
        self.reader.seek(SeekFrom::Start(self.position))?;
        self.peek_buffer = None;
        Ok(end)
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Next byte without consuming it.
    pub fn look(&mut self) -> Result<Option<u8>> {
        if let Some(ch) = self.peek_buffer {
            return Ok(Some(ch));
        }

        let mut buf = [0u8; 1];
        match self.reader.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => {
                self.peek_buffer = Some(buf[0]);
                Ok(Some(buf[0]))
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => self.look(),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_char(&mut self) -> Result<Option<u8>> {
        let ch = self.look()?;
        if ch.is_some() {
            self.peek_buffer = None;
            self.position += 1;
        }
        Ok(ch)
    }

    /// Read up to `len` raw bytes from the current position.
    pub fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(len.min(1 << 20));
        if len > 0 {
            if let Some(ch) = self.peek_buffer.take() {
                data.push(ch);
            }
        }
        let remaining = (len - data.len()) as u64;
        (&mut self.reader).take(remaining).read_to_end(&mut data)?;
        self.position += data.len() as u64;
        Ok(data)
    }

    /// Consume whitespace at the current position.
    pub fn skip_whitespace(&mut self) -> Result<usize> {
        let mut count = 0;
        while let Some(ch) = self.look()? {
            if !is_whitespace(ch) {
                break;
            }
            self.get_char()?;
            count += 1;
        }
        Ok(count)
    }

    /// Next token, taking queued tokens first. `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.queue.pop_front() {
            return Ok(Some(token));
        }

        let mut text = Vec::new();
        while let Some(ch) = self.look()? {
            if text.is_empty() && is_whitespace(ch) {
                self.get_char()?;
                continue;
            }

            if ch == b'%' {
                self.skip_comment()?;
                if !text.is_empty() {
                    break;
                }
                continue;
            }

            if text.is_empty() && (ch == b'<' || ch == b'>') {
                self.get_char()?;
                text.push(ch);
                if self.look()? == Some(ch) {
                    self.get_char()?;
                    text.push(ch);
                }
                return Ok(Some(Token::delimiter(text)));
            }

            if !text.is_empty() && (is_whitespace(ch) || is_delimiter(ch)) {
                break;
            }

            self.get_char()?;
            text.push(ch);
            if is_delimiter(ch) {
                return Ok(Some(Token::delimiter(text)));
            }
        }

        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Token::literal(text)))
        }
    }

    /// Next token, failing with `UnexpectedEOF` at end of input.
    pub fn require_token(&mut self) -> Result<Token> {
        self.next_token()?
            .ok_or_else(|| PdfError::UnexpectedEOF("expected another token".to_string()))
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<Token>> {
        let token = self.next_token()?;
        if let Some(token) = &token {
            self.queue.push_front(token.clone());
        }
        Ok(token)
    }

    /// Append a token to the back of the pending queue.
    pub fn enqueue_token(&mut self, token: Token) {
        self.queue.push_back(token);
    }

    /// Return tokens to the front of the queue so they are read again in the
    /// given order, ahead of anything already pending.
    pub fn push_back_tokens(&mut self, tokens: impl IntoIterator<Item = Token>) {
        let tokens: Vec<Token> = tokens.into_iter().collect();
        for token in tokens.into_iter().rev() {
            self.queue.push_front(token);
        }
    }

    pub fn has_queued_tokens(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Read an integer token. A token that does not start with one is put
    /// back and reported as `NoNumber`.
    pub fn read_next_number(&mut self) -> Result<i64> {
        let token = self
            .next_token()?
            .ok_or_else(|| PdfError::UnexpectedEOF("expected a number".to_string()))?;
        match token.kind {
            TokenKind::Literal => match parse_integer_prefix(&token.text) {
                Some(n) => Ok(n),
                None => {
                    let shown = token.display();
                    self.push_back_tokens([token]);
                    Err(PdfError::NoNumber(shown))
                }
            },
            TokenKind::Delimiter => {
                let shown = token.display();
                self.push_back_tokens([token]);
                Err(PdfError::NoNumber(shown))
            }
        }
    }

    /// Consume the next token and report whether its text is `expected`.
    pub fn is_next_token(&mut self, expected: &[u8]) -> Result<bool> {
        let token = self.require_token()?;
        Ok(token.text == expected)
    }

    fn skip_comment(&mut self) -> Result<()> {
        while let Some(ch) = self.get_char()? {
            match ch {
                b'\n' => break,
                b'\r' => {
                    if self.look()? == Some(b'\n') {
                        self.get_char()?;
                    }
                    break;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tokenizer(input: &[u8]) -> Tokenizer<Cursor<Vec<u8>>> {
        Tokenizer::new(Cursor::new(input.to_vec()))
    }

    fn all_tokens(input: &[u8]) -> Vec<Token> {
        let mut t = tokenizer(input);
        let mut tokens = Vec::new();
        while let Some(token) = t.next_token().unwrap() {
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn test_dictionary_delimiters() {
        let tokens = all_tokens(b"<</Type/Catalog>>");
        assert_eq!(
            tokens,
            vec![
                Token::delimiter("<<"),
                Token::delimiter("/"),
                Token::literal("Type"),
                Token::delimiter("/"),
                Token::literal("Catalog"),
                Token::delimiter(">>"),
            ]
        );
    }

    #[test]
    fn test_single_angle_brackets() {
        let tokens = all_tokens(b"<48656C>");
        assert_eq!(
            tokens,
            vec![
                Token::delimiter("<"),
                Token::literal("48656C"),
                Token::delimiter(">"),
            ]
        );
    }

    #[test]
    fn test_comment_ends_token() {
        let tokens = all_tokens(b"abc%comment\r\ndef % another\n[");
        assert_eq!(
            tokens,
            vec![
                Token::literal("abc"),
                Token::literal("def"),
                Token::delimiter("["),
            ]
        );
    }

    #[test]
    fn test_eof_and_whitespace_only() {
        assert!(all_tokens(b"").is_empty());
        assert!(all_tokens(b" \r\n\t\x0C\0").is_empty());
        assert!(all_tokens(b"% only a comment").is_empty());
    }

    #[test]
    fn test_whitespace_is_not_consumed_after_token() {
        let mut t = tokenizer(b"obj\nstream");
        assert_eq!(t.next_token().unwrap(), Some(Token::literal("obj")));
        assert_eq!(t.position(), 3);
        assert_eq!(t.look().unwrap(), Some(b'\n'));
    }

    #[test]
    fn test_queue_is_consulted_first() {
        let mut t = tokenizer(b"a b");
        let a = t.next_token().unwrap().unwrap();
        t.enqueue_token(Token::literal("x"));
        t.push_back_tokens([a.clone()]);
        assert_eq!(t.next_token().unwrap(), Some(a));
        assert_eq!(t.next_token().unwrap(), Some(Token::literal("x")));
        assert_eq!(t.next_token().unwrap(), Some(Token::literal("b")));
        assert_eq!(t.next_token().unwrap(), None);
    }

    #[test]
    fn test_peek_token() {
        let mut t = tokenizer(b"1 2");
        assert_eq!(t.peek_token().unwrap(), Some(Token::literal("1")));
        assert_eq!(t.next_token().unwrap(), Some(Token::literal("1")));
        assert_eq!(t.next_token().unwrap(), Some(Token::literal("2")));
    }

    #[test]
    fn test_read_next_number() {
        let mut t = tokenizer(b"42 -7 +3 abc");
        assert_eq!(t.read_next_number().unwrap(), 42);
        assert_eq!(t.read_next_number().unwrap(), -7);
        assert_eq!(t.read_next_number().unwrap(), 3);
        assert!(matches!(t.read_next_number().unwrap_err(), PdfError::NoNumber(_)));
        assert_eq!(t.next_token().unwrap(), Some(Token::literal("abc")));
        assert!(matches!(
            t.read_next_number().unwrap_err(),
            PdfError::UnexpectedEOF(_)
        ));
    }

    #[test]
    fn test_is_next_token() {
        let mut t = tokenizer(b"xref trailer");
        assert!(t.is_next_token(b"xref").unwrap());
        assert!(!t.is_next_token(b"xref").unwrap());
        assert!(t.is_next_token(b"xref").is_err());
    }

    #[test]
    fn test_seek_discards_queue() {
        let mut t = tokenizer(b"one two three");
        t.next_token().unwrap();
        t.enqueue_token(Token::literal("queued"));
        t.seek(8).unwrap();
        assert_eq!(t.next_token().unwrap(), Some(Token::literal("three")));
    }

    #[test]
    fn test_read_raw_after_look() {
        let mut t = tokenizer(b"stream\r\nDATA");
        t.next_token().unwrap();
        assert_eq!(t.look().unwrap(), Some(b'\r'));
        assert_eq!(t.read_raw(2).unwrap(), b"\r\n");
        assert_eq!(t.read_raw(10).unwrap(), b"DATA");
        assert_eq!(t.position(), 12);
        assert_eq!(t.len().unwrap(), 12);
    }

    #[test]
    fn test_parse_integer_prefix() {
        assert_eq!(parse_integer_prefix(b"12"), Some(12));
        assert_eq!(parse_integer_prefix(b"12abc"), Some(12));
        assert_eq!(parse_integer_prefix(b"-0"), Some(0));
        assert_eq!(parse_integer_prefix(b"+"), None);
        assert_eq!(parse_integer_prefix(b"R"), None);
        assert_eq!(parse_integer_prefix(b"99999999999999999999"), Some(i64::MAX));
    }
}
