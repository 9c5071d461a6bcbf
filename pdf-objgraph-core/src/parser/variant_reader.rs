//! Assembles values from tokens: type detection, the `n g R` lookahead and
//! the readers for dictionaries, arrays, strings and names.

use super::encryption_handler::Decryptor;
use super::lexer::{is_whitespace, parse_integer_prefix, Token, TokenKind, Tokenizer};
use super::stack_safe::StackSafeContext;
use crate::error::{PdfError, Result};
use crate::objects::{Array, DataType, Dictionary, Name, PdfString, Reference, Variant};
use std::io::{Read, Seek};

impl<R: Read + Seek> Tokenizer<R> {
    /// Read the next complete value. Strings are decrypted with `decryptor`.
    pub(crate) fn read_next_variant(&mut self, decryptor: Option<Decryptor<'_>>) -> Result<Variant> {
        let token = self
            .next_token()?
            .ok_or_else(|| PdfError::UnexpectedEOF("expected a variant".to_string()))?;
        self.read_variant_from(token, decryptor)
    }

    /// Read the value that starts with an already consumed `token`.
    pub(crate) fn read_variant_from(
        &mut self,
        token: Token,
        decryptor: Option<Decryptor<'_>>,
    ) -> Result<Variant> {
        let mut context = StackSafeContext::new();
        self.read_variant(token, decryptor, &mut context)
    }

    /// Unencrypted convenience form of [`read_next_variant`](Self::read_next_variant).
    pub fn next_variant(&mut self) -> Result<Variant> {
        self.read_next_variant(None)
    }

    /// Classify `token`. Scalars (and references found by looking two tokens
    /// ahead) are returned fully parsed; containers, strings and names only
    /// have their type reported.
    pub fn determine_data_type(&mut self, token: &Token) -> Result<(DataType, Option<Variant>)> {
        match token.kind {
            TokenKind::Delimiter => {
                let data_type = match token.text.as_slice() {
                    b"<<" => DataType::Dictionary,
                    b"[" => DataType::Array,
                    b"(" => DataType::String,
                    b"<" => DataType::HexString,
                    b"/" => DataType::Name,
                    _ => DataType::Unknown,
                };
                Ok((data_type, None))
            }
            TokenKind::Literal => self.determine_literal_type(&token.text),
        }
    }

    fn determine_literal_type(&mut self, text: &[u8]) -> Result<(DataType, Option<Variant>)> {
        if text.starts_with(b"null") {
            return Ok((DataType::Null, Some(Variant::Null)));
        }
        if text.starts_with(b"true") {
            return Ok((DataType::Bool, Some(Variant::Bool(true))));
        }
        if text.starts_with(b"false") {
            return Ok((DataType::Bool, Some(Variant::Bool(false))));
        }

        let mut data_type = DataType::Number;
        for &ch in text {
            if ch == b'.' {
                data_type = DataType::Real;
            } else if !(ch.is_ascii_digit() || ch == b'-' || ch == b'+') {
                return Ok((DataType::Unknown, None));
            }
        }

        if data_type == DataType::Real {
            let value = std::str::from_utf8(text)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| {
                    PdfError::InvalidDataType(format!(
                        "invalid real number {:?}",
                        String::from_utf8_lossy(text)
                    ))
                })?;
            return Ok((DataType::Real, Some(Variant::Real(value))));
        }

        let number = parse_integer_prefix(text).ok_or_else(|| {
            PdfError::InvalidDataType(format!(
                "invalid number {:?}",
                String::from_utf8_lossy(text)
            ))
        })?;
        self.lookahead_reference(number)
    }

    /// After a number, check whether `gen R` follows. Consumed tokens that do
    /// not complete a reference are returned to the tokenizer in order.
    fn lookahead_reference(&mut self, number: i64) -> Result<(DataType, Option<Variant>)> {
        let plain = (DataType::Number, Some(Variant::Number(number)));

        let Some(second) = self.next_token()? else {
            return Ok(plain);
        };
        if second.kind != TokenKind::Literal {
            self.push_back_tokens([second]);
            return Ok(plain);
        }
        let Some(generation) = parse_integer_prefix(&second.text) else {
            self.push_back_tokens([second]);
            return Ok(plain);
        };

        let Some(third) = self.next_token()? else {
            self.push_back_tokens([second]);
            return Ok(plain);
        };
        if third.is_literal(b"R") {
            if let (Ok(object_number), Ok(generation)) =
                (u32::try_from(number), u16::try_from(generation))
            {
                let reference = Reference::new(object_number, generation);
                return Ok((DataType::Reference, Some(Variant::Reference(reference))));
            }
        }
        self.push_back_tokens([second, third]);
        Ok(plain)
    }

    /// Read the value starting at `token`. Nested arrays and dictionaries
    /// are kept on an explicit stack, so input depth never grows the call
    /// stack; `context` bounds the nesting.
    fn read_variant(
        &mut self,
        token: Token,
        decryptor: Option<Decryptor<'_>>,
        context: &mut StackSafeContext,
    ) -> Result<Variant> {
        let mut open: Vec<Container> = Vec::new();
        let mut next = token;

        loop {
            let mut value = match self.read_element(&next, decryptor)? {
                Element::Value(value) => Some(value),
                Element::Open(container) => {
                    context.enter()?;
                    open.push(container);
                    None
                }
            };

            next = loop {
                let Some(container) = open.last_mut() else {
                    return value.ok_or_else(|| {
                        PdfError::InternalLogic("no value after closing containers".to_string())
                    });
                };
                if let Some(value) = value.take() {
                    container.accept(value);
                }

                let token = self.next_token()?.ok_or_else(|| container.eof_error())?;
                match container {
                    Container::Array(_) if token.is_delimiter(b"]") => {}
                    Container::Array(_) => break token,
                    Container::Dictionary { key: None, .. } if token.is_delimiter(b">>") => {}
                    Container::Dictionary { key, contents, .. } => {
                        let Some(name) = key.as_ref() else {
                            *key = Some(self.read_key(&token, decryptor)?);
                            continue;
                        };
                        if *name != "Contents" {
                            break token;
                        }
                        if !token.is_delimiter(b"<") {
                            *contents = None;
                            break token;
                        }
                        *contents = Some(self.read_hex_string()?);
                        *key = None;
                        continue;
                    }
                }

                // The closing delimiter was consumed
                if let Some(container) = open.pop() {
                    context.exit();
                    value = Some(container.finish(decryptor)?);
                }
            };
        }
    }

    /// A scalar read in full, or the container that `token` opens.
    fn read_element(&mut self, token: &Token, decryptor: Option<Decryptor<'_>>) -> Result<Element> {
        let (data_type, value) = self.determine_data_type(token)?;
        if let Some(value) = value {
            return Ok(Element::Value(value));
        }

        match data_type {
            DataType::Dictionary => Ok(Element::Open(Container::Dictionary {
                dict: Dictionary::new(),
                key: None,
                contents: None,
            })),
            DataType::Array => Ok(Element::Open(Container::Array(Array::new()))),
            DataType::String => {
                let data = self.read_literal_string()?;
                Ok(Element::Value(Variant::String(PdfString::new(decrypt(
                    decryptor, data,
                )?))))
            }
            DataType::HexString => {
                let data = self.read_hex_string()?;
                Ok(Element::Value(Variant::String(PdfString::new_hex(
                    decrypt(decryptor, data)?,
                ))))
            }
            DataType::Name => Ok(Element::Value(Variant::Name(self.read_name()?))),
            other => Err(PdfError::InvalidDataType(format!(
                "unexpected {} token {:?}",
                other,
                token.display()
            ))),
        }
    }

    fn read_key(&mut self, token: &Token, decryptor: Option<Decryptor<'_>>) -> Result<Name> {
        let found = match self.read_element(token, decryptor)? {
            Element::Value(Variant::Name(name)) => return Ok(name),
            Element::Value(other) => other.data_type(),
            Element::Open(Container::Array(_)) => DataType::Array,
            Element::Open(Container::Dictionary { .. }) => DataType::Dictionary,
        };
        Err(PdfError::InvalidDataType(format!(
            "dictionary key must be a Name, found {found}"
        )))
    }

    /// Body of a `(...)` string, after the opening parenthesis. Balanced
    /// parentheses are kept; end of input ends the string.
    fn read_literal_string(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut depth = 0usize;

        while let Some(ch) = self.get_char()? {
            match ch {
                b'\\' => {
                    let Some(escaped) = self.get_char()? else {
                        break;
                    };
                    match escaped {
                        b'n' => data.push(b'\n'),
                        b'r' => data.push(b'\r'),
                        b't' => data.push(b'\t'),
                        b'b' => data.push(0x08),
                        b'f' => data.push(0x0C),
                        b'\r' => {
                            if self.look()? == Some(b'\n') {
                                self.get_char()?;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u16::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.look()? {
                                    Some(digit @ b'0'..=b'7') => {
                                        self.get_char()?;
                                        value = value * 8 + u16::from(digit - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            data.push(value as u8);
                        }
                        // includes \( \) and \\
                        other => data.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    data.push(ch);
                }
                b')' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    data.push(ch);
                }
                _ => data.push(ch),
            }
        }

        Ok(data)
    }

    /// Body of a `<...>` string. Non-hex bytes are skipped; an odd digit
    /// count is padded with `0`.
    fn read_hex_string(&mut self) -> Result<Vec<u8>> {
        let mut digits = Vec::new();
        while let Some(ch) = self.get_char()? {
            if ch == b'>' {
                break;
            }
            if ch.is_ascii_hexdigit() {
                digits.push(ch);
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(b'0');
        }
        Ok(PdfString::from_hex_digits(&digits).into_bytes())
    }

    /// Name body after `/`. `/` directly followed by whitespace or a
    /// delimiter is the empty name.
    fn read_name(&mut self) -> Result<Name> {
        if !self.has_queued_tokens() {
            match self.look()? {
                None => return Ok(Name::default()),
                Some(ch) if is_whitespace(ch) => return Ok(Name::default()),
                _ => {}
            }
        }

        match self.next_token()? {
            Some(token) if token.kind == TokenKind::Literal => Ok(Name::from_escaped(&token.text)),
            Some(token) => {
                self.push_back_tokens([token]);
                Ok(Name::default())
            }
            None => Ok(Name::default()),
        }
    }

    /// Read an `n g obj` header.
    pub(crate) fn read_object_header(&mut self) -> Result<Reference> {
        let numbers = self
            .read_next_number()
            .and_then(|n| Ok((n, self.read_next_number()?)));
        let reference = match numbers {
            Ok((n, g)) => match (u32::try_from(n), u16::try_from(g)) {
                (Ok(n), Ok(g)) => Reference::new(n, g),
                _ => {
                    return Err(PdfError::NoObject(format!(
                        "object number {n} {g} out of range"
                    )))
                }
            },
            Err(_) => {
                return Err(PdfError::NoObject(
                    "Object and generation number cannot be read".to_string(),
                ))
            }
        };

        if !self.is_next_token(b"obj")? {
            return Err(PdfError::NoObject(format!(
                "Error while reading object {reference}: next token is not 'obj'"
            )));
        }
        Ok(reference)
    }
}

enum Element {
    Value(Variant),
    Open(Container),
}

/// An array or dictionary whose closing delimiter has not been read yet
enum Container {
    Array(Array),
    Dictionary {
        dict: Dictionary,
        /// Key waiting for its value
        key: Option<Name>,
        /// `/Contents` hex string, held back until `/Type` is known
        contents: Option<Vec<u8>>,
    },
}

impl Container {
    fn accept(&mut self, value: Variant) {
        match self {
            Container::Array(array) => array.push(value),
            Container::Dictionary { dict, key, .. } => {
                if let Some(key) = key.take() {
                    dict.insert(key, value);
                }
            }
        }
    }

    fn eof_error(&self) -> PdfError {
        match self {
            Container::Array(_) => {
                PdfError::UnexpectedEOF("expected an array element or ']'".to_string())
            }
            Container::Dictionary { key: None, .. } => {
                PdfError::UnexpectedEOF("expected a dictionary key or '>>'".to_string())
            }
            Container::Dictionary { key: Some(key), .. } => {
                PdfError::UnexpectedEOF(format!("expected a value for key {key}"))
            }
        }
    }

    fn finish(self, decryptor: Option<Decryptor<'_>>) -> Result<Variant> {
        match self {
            Container::Array(array) => Ok(Variant::Array(array)),
            Container::Dictionary {
                mut dict, contents, ..
            } => {
                if let Some(data) = contents {
                    // Signature values are never encrypted
                    let unencrypted = matches!(
                        dict.get_type().and_then(|t| t.as_str()),
                        Some("Sig") | Some("DocTimeStamp")
                    );
                    let data = if unencrypted {
                        data
                    } else {
                        decrypt(decryptor, data)?
                    };
                    dict.insert("Contents", PdfString::new_hex(data));
                }
                Ok(Variant::Dictionary(dict))
            }
        }
    }
}

fn decrypt(decryptor: Option<Decryptor<'_>>, data: Vec<u8>) -> Result<Vec<u8>> {
    match decryptor {
        Some(decryptor) => decryptor.decrypt(&data),
        None => Ok(data),
    }
}
