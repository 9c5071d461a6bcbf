//! Delayed-load backend
//!
//! Objects created while parsing a file only remember their offset. The
//! [`FileLoader`] shares the parser's tokenizer and reads values and stream
//! payloads back from the device when an object is first accessed.

use super::encryption_handler::{Decryptor, SecurityHandler};
use super::filters::{filter_chain, Filter};
use super::lexer::Tokenizer;
use super::xref::{XRefEntry, XRefTable};
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, LoadedObject, ObjectLoader, Reference, Stream, Variant};
use std::cell::{Cell, RefCell, RefMut};
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::rc::Rc;
use tracing::warn;

const ENDSTREAM: &[u8] = b"endstream";

/// Stream recovery settings taken from the parse options
#[derive(Debug, Clone, Copy)]
pub(crate) struct StreamRecovery {
    pub enabled: bool,
    pub max_bytes: usize,
}

pub(crate) struct FileLoader<R> {
    tokenizer: Rc<RefCell<Tokenizer<R>>>,
    xref: RefCell<XRefTable>,
    /// Numbers parsed out of object streams, for indirect `/Length` values
    remembered: RefCell<HashMap<Reference, i64>>,
    security: RefCell<Option<Rc<dyn SecurityHandler>>>,
    encrypt_ref: Cell<Option<Reference>>,
    recovery: StreamRecovery,
}

impl<R: Read + Seek> FileLoader<R> {
    pub(crate) fn new(tokenizer: Rc<RefCell<Tokenizer<R>>>, recovery: StreamRecovery) -> Self {
        Self {
            tokenizer,
            xref: RefCell::new(XRefTable::new()),
            remembered: RefCell::new(HashMap::new()),
            security: RefCell::new(None),
            encrypt_ref: Cell::new(None),
            recovery,
        }
    }

    pub(crate) fn set_xref(&self, xref: XRefTable) {
        *self.xref.borrow_mut() = xref;
    }

    pub(crate) fn remember_number(&self, reference: Reference, value: i64) {
        self.remembered.borrow_mut().insert(reference, value);
    }

    pub(crate) fn set_security_handler(&self, handler: Option<Rc<dyn SecurityHandler>>) {
        *self.security.borrow_mut() = handler;
    }

    /// The encryption dictionary is never decrypted.
    pub(crate) fn set_encrypt_ref(&self, reference: Option<Reference>) {
        self.encrypt_ref.set(reference);
    }

    fn tokenizer(&self) -> Result<RefMut<'_, Tokenizer<R>>> {
        self.tokenizer
            .try_borrow_mut()
            .map_err(|_| PdfError::InternalLogic("the input device is already in use".to_string()))
    }

    fn handler_for(&self, reference: Reference) -> Option<Rc<dyn SecurityHandler>> {
        if self.encrypt_ref.get() == Some(reference) {
            return None;
        }
        self.security.borrow().clone()
    }

    /// Resolve `/Length`, following an indirect Number.
    fn stream_length(&self, dict: &Dictionary) -> Result<usize> {
        let length = match dict.get("Length") {
            Some(Variant::Number(n)) => *n,
            Some(Variant::Reference(reference)) => self.indirect_number(*reference)?,
            Some(other) => {
                return Err(PdfError::InvalidStreamLength(format!(
                    "/Length is a {}",
                    other.data_type()
                )))
            }
            None => return Err(PdfError::InvalidStreamLength("no /Length key".to_string())),
        };
        usize::try_from(length)
            .map_err(|_| PdfError::InvalidStreamLength(format!("negative /Length {length}")))
    }

    fn indirect_number(&self, reference: Reference) -> Result<i64> {
        if let Some(&n) = self.remembered.borrow().get(&reference) {
            return Ok(n);
        }
        let entry = self.xref.borrow().get(reference.object_number()).copied();
        match entry {
            Some(XRefEntry::InUse { offset, .. }) => {
                let mut tokenizer = self.tokenizer()?;
                read_number_object(&mut tokenizer, reference, offset)
            }
            _ => Err(PdfError::NoObject(format!(
                "/Length object {reference} not found"
            ))),
        }
    }

    fn should_decrypt_stream(&self, handler: &dyn SecurityHandler, dict: &Dictionary) -> bool {
        match dict.get_type().and_then(|t| t.as_str()) {
            Some("XRef") => return false,
            Some("Metadata") if !handler.encrypts_metadata() => return false,
            _ => {}
        }
        !has_identity_crypt_filter(dict)
    }
}

impl<R: Read + Seek> ObjectLoader for FileLoader<R> {
    fn load_object(&self, reference: Reference, offset: u64) -> Result<LoadedObject> {
        let handler = self.handler_for(reference);
        let mut tokenizer = self.tokenizer()?;
        let decryptor = handler
            .as_deref()
            .map(|handler| Decryptor::new(handler, reference));

        let loaded = read_indirect_object(&mut tokenizer, reference, offset, decryptor)?;
        let is_xref_stream = loaded
            .value
            .as_dict()
            .and_then(|d| d.get_type())
            .is_some_and(|t| t == "XRef");
        if decryptor.is_some() && is_xref_stream {
            // Cross-reference streams are stored unencrypted
            return read_indirect_object(&mut tokenizer, reference, offset, None);
        }
        Ok(loaded)
    }

    fn load_stream(&self, reference: Reference, dict: &Dictionary, offset: u64) -> Result<Stream> {
        let length = self.stream_length(dict);
        let data = {
            let mut tokenizer = self.tokenizer()?;
            read_stream_payload(&mut tokenizer, offset, length, self.recovery)?
        };

        match self.handler_for(reference) {
            Some(handler) if self.should_decrypt_stream(handler.as_ref(), dict) => {
                Ok(Stream::from_file(handler.decrypt_stream(reference, &data)?))
            }
            _ => Ok(Stream::from_file(data)),
        }
    }
}

/// Parse `n g obj <value> (endobj | stream)` at `offset`.
pub(crate) fn read_indirect_object<R: Read + Seek>(
    tokenizer: &mut Tokenizer<R>,
    reference: Reference,
    offset: u64,
    decryptor: Option<Decryptor<'_>>,
) -> Result<LoadedObject> {
    tokenizer.seek(offset)?;
    let found = tokenizer.read_object_header()?;
    if found.object_number() != reference.object_number() {
        return Err(PdfError::NoObject(format!(
            "Found object with reference {found} different from reference {reference} in xref"
        )));
    }

    let token = tokenizer.require_token()?;
    if token.is_literal(b"endobj") {
        return Ok(LoadedObject {
            value: Variant::Null,
            stream_offset: None,
        });
    }
    let value = tokenizer.read_variant_from(token, decryptor)?;

    match tokenizer.next_token()? {
        Some(token) if token.is_literal(b"endobj") => Ok(LoadedObject {
            value,
            stream_offset: None,
        }),
        Some(token) if token.is_literal(b"stream") && value.is_dictionary() => {
            let stream_offset = tokenizer.position();
            Ok(LoadedObject {
                value,
                stream_offset: Some(stream_offset),
            })
        }
        other => Err(PdfError::NoObject(format!(
            "Error while reading object {reference}: expected 'endobj' or 'stream', found {}",
            other.map_or_else(|| "end of file".to_string(), |t| t.display())
        ))),
    }
}

/// Read an indirect object that must hold a Number, such as a `/Length`.
pub(crate) fn read_number_object<R: Read + Seek>(
    tokenizer: &mut Tokenizer<R>,
    reference: Reference,
    offset: u64,
) -> Result<i64> {
    let loaded = read_indirect_object(tokenizer, reference, offset, None)?;
    loaded.value.as_number().ok_or_else(|| {
        PdfError::InvalidStreamLength(format!(
            "object {reference} is a {}, not a Number",
            loaded.value.data_type()
        ))
    })
}

/// Read the raw payload that starts after the `stream` keyword at `offset`.
///
/// With recovery enabled, a `length` that is unusable or not followed by
/// `endstream` is replaced by a forward search for `endstream`.
pub(crate) fn read_stream_payload<R: Read + Seek>(
    tokenizer: &mut Tokenizer<R>,
    offset: u64,
    length: Result<usize>,
    recovery: StreamRecovery,
) -> Result<Vec<u8>> {
    tokenizer.seek(offset)?;
    skip_stream_eol(tokenizer)?;
    let start = tokenizer.position();

    let length = match length {
        Ok(length) => length,
        Err(e) if recovery.enabled => {
            return recover_payload(tokenizer, start, recovery.max_bytes).ok_or(e)?;
        }
        Err(e) => return Err(e),
    };

    let data = tokenizer.read_raw(length)?;
    if data.len() != length {
        let error = PdfError::UnexpectedEOF(format!(
            "stream data ends after {} of {} bytes",
            data.len(),
            length
        ));
        return match recovery.enabled {
            true => recover_payload(tokenizer, start, recovery.max_bytes).ok_or(error)?,
            false => Err(error),
        };
    }

    if recovery.enabled {
        let ends_properly = tokenizer
            .next_token()?
            .is_some_and(|token| token.is_literal(ENDSTREAM));
        if !ends_properly {
            let error = PdfError::InvalidStreamLength(format!(
                "/Length {length} is not followed by 'endstream'"
            ));
            return recover_payload(tokenizer, start, recovery.max_bytes).ok_or(error)?;
        }
    }
    Ok(data)
}

fn recover_payload<R: Read + Seek>(
    tokenizer: &mut Tokenizer<R>,
    start: u64,
    max_bytes: usize,
) -> Option<Result<Vec<u8>>> {
    let window = match tokenizer
        .seek(start)
        .and_then(|_| tokenizer.read_raw(max_bytes.saturating_add(ENDSTREAM.len())))
    {
        Ok(window) => window,
        Err(e) => return Some(Err(e)),
    };
    let end = window.windows(ENDSTREAM.len()).position(|w| w == ENDSTREAM)?;

    let mut data = window;
    data.truncate(end);
    if data.ends_with(b"\r\n") {
        data.truncate(data.len() - 2);
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data.truncate(data.len() - 1);
    }
    warn!(
        "Recovered stream at offset {} by searching for 'endstream': {} bytes",
        start,
        data.len()
    );
    Some(Ok(data))
}

/// Spaces after `stream`, then CRLF or LF.
fn skip_stream_eol<R: Read + Seek>(tokenizer: &mut Tokenizer<R>) -> Result<()> {
    while tokenizer.look()? == Some(b' ') {
        tokenizer.get_char()?;
    }
    match tokenizer.look()? {
        Some(b'\r') => {
            tokenizer.get_char()?;
            if tokenizer.look()? == Some(b'\n') {
                tokenizer.get_char()?;
            }
        }
        Some(b'\n') => {
            tokenizer.get_char()?;
        }
        _ => {}
    }
    Ok(())
}

/// `/Filter [/Crypt]` with an `/Identity` (or unnamed) crypt filter
fn has_identity_crypt_filter(dict: &Dictionary) -> bool {
    let Ok(chain) = filter_chain(dict) else {
        return false;
    };
    chain.iter().any(|(filter, params)| {
        *filter == Filter::Crypt
            && params
                .as_ref()
                .and_then(|p| p.get_name("Name"))
                .map_or(true, |name| name == "Identity")
    })
}
