//! Document parser
//!
//! Finds the structural anchors of a file (header, `%%EOF`, `startxref`,
//! trailer), walks every cross-reference section of every incremental
//! update, bootstraps encryption and fills an [`IndirectObjectTable`] with
//! objects that are read from the file on first access.

use super::encryption_handler::{EncryptionInfo, SecurityHandler, SecurityHandlerFactory};
use super::header::{PdfHeader, PdfVersion};
use super::lexer::{is_delimiter, is_whitespace, Tokenizer};
use super::linearization::{detect_linearization, Linearization};
use super::loader::{read_indirect_object, read_number_object, read_stream_payload, FileLoader, StreamRecovery};
use super::object_stream::expand_object_stream;
use super::trailer::{section_offset, PdfTrailer};
use super::xref::{read_xref_subsection, XRefEntry, XRefTable};
use super::xref_stream::XRefStream;
use super::ParseOptions;
use crate::error::{PdfError, Result, ResultExt};
use crate::objects::{
    Dictionary, IndirectObjectTable, Object, ObjectLoader, PdfString, Reference, Stream, Variant,
};
use std::cell::{RefCell, RefMut};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

/// How far before the end-of-file anchor `startxref` and `trailer` are searched
const SEARCH_WINDOW: u64 = 512;
/// How far before the anchor `xref` is searched when `startxref` is wrong
const XREF_SEARCH_WINDOW: u64 = 2048;
/// Bytes read for header detection
const HEADER_WINDOW: usize = 1024;
const EOF_MARKER: &[u8] = b"%%EOF";
/// Chunk size of the backward `%%EOF` scan
const EOF_SCAN_CHUNK: u64 = 1024;

/// Where a cross-reference section was referenced from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    /// The offset after `startxref`
    Start,
    /// `/Prev` of a classic trailer
    Prev,
    /// `/XRefStm` of a hybrid file
    XRefStm,
    /// `/Prev` of a cross-reference stream
    StreamPrev,
}

#[derive(Debug, Clone, Copy)]
struct Section {
    offset: u64,
    kind: SectionKind,
}

/// Reads the object graph of a PDF file
pub struct PdfParser<R: Read + Seek + 'static> {
    tokenizer: Rc<RefCell<Tokenizer<R>>>,
    loader: Rc<FileLoader<R>>,
    options: ParseOptions,
    header: Option<PdfHeader>,
    version: PdfVersion,
    file_size: u64,
    /// End of the `%%EOF` marker; backward searches start here
    eof_anchor: u64,
    xref_offset: u64,
    xref: XRefTable,
    trailer: PdfTrailer,
    objects: IndirectObjectTable,
    linearization: Option<Linearization>,
    incremental_updates: usize,
    factory: Option<Box<dyn SecurityHandlerFactory>>,
    /// Handler waiting for a password
    pending_handler: Option<Box<dyn SecurityHandler>>,
    encrypted: bool,
    encrypt_ref: Option<Reference>,
    document_id: Vec<u8>,
}

impl<R: Read + Seek + 'static> std::fmt::Debug for PdfParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfParser")
            .field("version", &self.version)
            .field("file_size", &self.file_size)
            .field("xref_offset", &self.xref_offset)
            .field("encrypted", &self.encrypted)
            .finish_non_exhaustive()
    }
}

impl PdfParser<File> {
    /// Open and parse a PDF file leniently
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(File::open(path)?, ParseOptions::lenient())
    }

    /// Open and parse a PDF file with strict parsing
    pub fn open_strict<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(File::open(path)?, ParseOptions::strict())
    }
}

impl<R: Read + Seek + 'static> PdfParser<R> {
    /// A parser with default options. Nothing is read until [`parse`](Self::parse).
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, ParseOptions::default())
    }

    pub fn with_options(reader: R, options: ParseOptions) -> Self {
        let tokenizer = Rc::new(RefCell::new(Tokenizer::new(reader)));
        let loader = Rc::new(FileLoader::new(tokenizer.clone(), recovery(&options)));
        let mut objects = IndirectObjectTable::new();
        objects.set_can_reuse_object_numbers(options.can_reuse_object_numbers);
        Self {
            tokenizer,
            loader,
            options,
            header: None,
            version: PdfVersion::default(),
            file_size: 0,
            eof_anchor: 0,
            xref_offset: 0,
            xref: XRefTable::new(),
            trailer: PdfTrailer::default(),
            objects,
            linearization: None,
            incremental_updates: 0,
            factory: None,
            pending_handler: None,
            encrypted: false,
            encrypt_ref: None,
            document_id: Vec::new(),
        }
    }

    /// Create a parser and parse `reader` right away
    pub fn read(reader: R, options: ParseOptions) -> Result<Self> {
        let mut parser = Self::with_options(reader, options);
        parser.parse()?;
        Ok(parser)
    }

    /// Install the factory that builds security handlers for encrypted files
    pub fn set_security_handler_factory(&mut self, factory: impl SecurityHandlerFactory + 'static) {
        self.factory = Some(Box::new(factory));
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse the document structure and populate the object table.
    ///
    /// An [`InvalidPassword`](PdfError::InvalidPassword) error leaves the
    /// parser ready for [`set_password`](Self::set_password).
    pub fn parse(&mut self) -> Result<()> {
        self.reset();

        let start = {
            let mut tokenizer = device(&self.tokenizer)?;
            tokenizer.seek(0)?;
            tokenizer.read_raw(HEADER_WINDOW)?
        };
        let header = PdfHeader::parse(&start)?;
        self.version = header.version;
        self.header = Some(header);

        self.linearization = detect_linearization(&mut *device(&self.tokenizer)?);
        if let Some(linearization) = &self.linearization {
            debug!("Linearized file, dictionary {}", linearization.reference());
        }

        self.read_document_structure()?;
        self.read_objects()
            .context("Unable to load objects from file.")
    }

    /// Retry authentication after `parse` failed with `InvalidPassword`
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        if !self.encrypted {
            return Err(PdfError::InternalLogic(
                "set_password called on a document that is not encrypted".to_string(),
            ));
        }
        let Some(mut handler) = self.pending_handler.take() else {
            return Err(PdfError::InternalLogic(
                "the document is already unlocked".to_string(),
            ));
        };
        if !handler.authenticate(password, &self.document_id) {
            self.pending_handler = Some(handler);
            return Err(PdfError::InvalidPassword(
                "The supplied password is incorrect.".to_string(),
            ));
        }
        self.install_security_handler(handler);
        self.read_objects_internal()
            .context("Unable to load objects from file.")
    }

    /// Version of the document, upgraded by a newer Catalog `/Version`
    pub fn version(&self) -> PdfVersion {
        self.version
    }

    /// Version announced by the file header
    pub fn header_version(&self) -> PdfVersion {
        self.header.as_ref().map_or(self.version, |h| h.version)
    }

    pub fn header(&self) -> Option<&PdfHeader> {
        self.header.as_ref()
    }

    /// The trailer merged over all revisions
    pub fn trailer(&self) -> &PdfTrailer {
        &self.trailer
    }

    pub fn xref(&self) -> &XRefTable {
        &self.xref
    }

    /// Offset given by `startxref`
    pub fn xref_offset(&self) -> u64 {
        self.xref_offset
    }

    /// First element of the trailer `/ID`
    pub fn document_id(&self) -> Result<&PdfString> {
        self.trailer.document_id()
    }

    /// Number of `/Prev` links followed
    pub fn incremental_updates(&self) -> usize {
        self.incremental_updates
    }

    pub fn linearization(&self) -> Option<&Linearization> {
        self.linearization.as_ref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Whether objects can be read, false while a password is needed
    pub fn is_unlocked(&self) -> bool {
        self.pending_handler.is_none()
    }

    pub fn objects(&self) -> &IndirectObjectTable {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut IndirectObjectTable {
        &mut self.objects
    }

    pub fn into_objects(self) -> IndirectObjectTable {
        self.objects
    }

    pub fn get_object(&self, reference: Reference) -> Option<&Object> {
        self.objects.get_object(reference)
    }

    /// Value of `key` in `object`'s dictionary, one Reference hop resolved
    pub fn get_indirect_key(&self, object: &Object, key: &str) -> Result<Option<Variant>> {
        self.objects.get_indirect_key(object, key)
    }

    pub fn create_object(&mut self, value: impl Into<Variant>) -> &mut Object {
        self.objects.create_object(value)
    }

    /// The document catalog named by `/Root`
    pub fn catalog(&self) -> Result<&Object> {
        let root = self
            .trailer
            .root()
            .ok_or_else(|| PdfError::NoObject("trailer has no /Root".to_string()))?;
        self.objects.must_get_object(root)
    }

    fn reset(&mut self) {
        self.header = None;
        self.file_size = 0;
        self.eof_anchor = 0;
        self.xref_offset = 0;
        self.xref = XRefTable::new();
        self.trailer = PdfTrailer::default();
        self.objects = IndirectObjectTable::new();
        self.objects
            .set_can_reuse_object_numbers(self.options.can_reuse_object_numbers);
        self.linearization = None;
        self.incremental_updates = 0;
        self.pending_handler = None;
        self.encrypted = false;
        self.encrypt_ref = None;
        self.document_id.clear();
        self.loader = Rc::new(FileLoader::new(self.tokenizer.clone(), recovery(&self.options)));
    }

    fn read_document_structure(&mut self) -> Result<()> {
        self.file_size = device(&self.tokenizer)?.len()?;

        self.check_eof_marker()
            .context("EOF marker could not be found.")?;
        self.xref_offset = self
            .read_startxref()
            .context("Unable to find startxref entry in file.")?;
        self.read_trailer()
            .context("Unable to find trailer in file.")?;

        match self.trailer.size() {
            Some(size) => {
                let max_objects = self.options.max_objects;
                let size = u32::try_from(size)
                    .ok()
                    .filter(|&size| max_objects.map_or(true, |max| size as usize <= max))
                    .ok_or_else(|| {
                        PdfError::ValueOutOfRange(format!("/Size {size} in trailer is out of range"))
                    })?;
                self.xref = XRefTable::with_size(size);
                self.objects.reserve(size as usize);
            }
            None => {
                warn!("PDF Standard Violation: No /Size key was specified in the trailer directory. Will attempt to recover.");
                self.xref = XRefTable::new();
            }
        }

        self.read_xref_sections(self.xref_offset)
            .context("Unable to load xref entries.")
    }

    fn check_eof_marker(&mut self) -> Result<()> {
        let file_size = self.file_size;
        let tail_len = file_size.min(EOF_MARKER.len() as u64 + 2);
        let tail = {
            let mut tokenizer = device(&self.tokenizer)?;
            tokenizer.seek(file_size - tail_len)?;
            tokenizer.read_raw(tail_len as usize)?
        };
        if let Some(end) = marker_at_end(&tail) {
            self.eof_anchor = file_size - tail_len + end as u64;
            return Ok(());
        }
        if self.options.strict {
            return Err(PdfError::NoEOFToken);
        }

        match self.find_backward(EOF_MARKER, file_size)? {
            Some(position) => {
                self.eof_anchor = position + EOF_MARKER.len() as u64;
                warn!(
                    "Found %%EOF marker followed by {} bytes of garbage",
                    file_size - self.eof_anchor
                );
            }
            None => {
                warn!("No %%EOF marker in file, searching from the end of the file");
                self.eof_anchor = file_size;
            }
        }
        Ok(())
    }

    fn read_startxref(&mut self) -> Result<u64> {
        let mut found = self.find_token(b"startxref", SEARCH_WINDOW)?;
        if found.is_none() && !self.options.strict {
            found = self.find_token(b"startref", SEARCH_WINDOW)?;
            if found.is_some() {
                warn!("Found nonstandard 'startref' keyword instead of 'startxref'");
            }
        }
        let position = found.ok_or_else(|| PdfError::NoXRef("no startxref keyword".to_string()))?;

        let mut tokenizer = device(&self.tokenizer)?;
        tokenizer.seek(position)?;
        tokenizer.require_token()?;
        let offset = tokenizer
            .read_next_number()
            .map_err(|e| PdfError::NoXRef(format!("no offset after startxref: {e}")))?;
        u64::try_from(offset).map_err(|_| PdfError::InvalidXRef(format!("startxref offset {offset}")))
    }

    fn read_trailer(&mut self) -> Result<()> {
        if let Some(position) = self.find_token(b"trailer", SEARCH_WINDOW)? {
            let mut tokenizer = device(&self.tokenizer)?;
            tokenizer.seek(position)?;
            tokenizer.require_token()?;
            match tokenizer.next_variant()? {
                Variant::Dictionary(dict) => {
                    self.trailer = PdfTrailer::from_section(dict);
                    return Ok(());
                }
                other => {
                    return Err(PdfError::NoTrailer.context(format!(
                        "trailer keyword is followed by {}",
                        other.data_type()
                    )))
                }
            }
        }

        if !self.version.supports_xref_streams() {
            return Err(PdfError::NoTrailer);
        }

        // Cross-reference streams carry the trailer keys in their dictionary
        let offset = self.xref_offset;
        let mut tokenizer = device(&self.tokenizer)?;
        tokenizer.seek(offset)?;
        tokenizer
            .read_object_header()
            .map_err(|e| PdfError::NoTrailer.context(e.to_string()))?;
        match tokenizer.next_variant()? {
            Variant::Dictionary(dict) => {
                self.trailer = PdfTrailer::from_section(dict);
                Ok(())
            }
            _ => Err(PdfError::NoTrailer),
        }
    }

    /// Walk the cross-reference sections depth first: a section, its
    /// `/XRefStm`, then its `/Prev` chain. Entries seen first win.
    fn read_xref_sections(&mut self, start: u64) -> Result<()> {
        let mut pending = vec![Section {
            offset: start,
            kind: SectionKind::Start,
        }];
        let mut visited = 0usize;

        while let Some(section) = pending.pop() {
            visited += 1;
            if visited > self.options.max_xref_sections {
                return Err(PdfError::InvalidXRef(format!(
                    "more than {} cross-reference sections, /Prev chain is probably a loop",
                    self.options.max_xref_sections
                )));
            }
            debug!("Reading {:?} xref section at offset {}", section.kind, section.offset);

            let result = match section.kind {
                SectionKind::XRefStm => self.read_xref_stream(section.offset, &mut pending),
                _ => self.read_xref_contents(section.offset, &mut pending),
            };
            match (section.kind, result) {
                (_, Ok(())) => {}
                (SectionKind::StreamPrev, Err(e)) if matches!(e.root(), PdfError::NoNumber(_)) => {
                    warn!("Ignoring unreadable /Prev section of an xref stream: {}", e);
                }
                (SectionKind::Start, Err(e)) => return Err(e),
                (SectionKind::XRefStm, Err(e)) => {
                    return Err(e.context("Unable to load /XRefStm xref stream."))
                }
                (SectionKind::Prev | SectionKind::StreamPrev, Err(e)) => {
                    return Err(e.context("Unable to load /Prev xref entries."))
                }
            }
        }
        Ok(())
    }

    fn read_xref_contents(&mut self, offset: u64, pending: &mut Vec<Section>) -> Result<()> {
        let offset = if offset >= self.file_size {
            self.recover_xref_offset(offset)?
        } else {
            offset
        };

        let is_table = {
            let mut tokenizer = device(&self.tokenizer)?;
            tokenizer.seek(offset)?;
            tokenizer
                .next_token()?
                .is_some_and(|token| token.is_literal(b"xref"))
        };
        if !is_table {
            if !self.version.supports_xref_streams() {
                return Err(PdfError::NoXRef(format!("no xref keyword at offset {offset}")));
            }
            return self.read_xref_stream(offset, pending);
        }

        self.read_xref_subsections()?;

        match self.read_next_trailer(pending) {
            Err(e) if matches!(e.root(), PdfError::NoTrailer) => {
                warn!("No trailer after xref section at offset {}", offset);
                Ok(())
            }
            other => other,
        }
    }

    fn recover_xref_offset(&mut self, offset: u64) -> Result<u64> {
        if self.options.strict {
            return Err(PdfError::NoXRef(format!(
                "startxref offset {offset} is beyond the end of the file"
            )));
        }
        let found = self
            .find_token(b"xref", XREF_SEARCH_WINDOW)?
            .ok_or_else(|| PdfError::NoXRef(format!("invalid xref offset {offset}")))?;
        warn!(
            "xref offset {} is beyond the end of the file, using 'xref' keyword at {}",
            offset, found
        );
        Ok(found)
    }

    fn read_xref_subsections(&mut self) -> Result<()> {
        let strict = self.options.strict;
        let mut tokenizer = device(&self.tokenizer)?;
        let mut first_section = true;

        loop {
            if !first_section {
                match tokenizer.peek_token()? {
                    Some(token) if token.is_literal(b"trailer") => break,
                    None => break,
                    _ => {}
                }
            }
            first_section = false;

            let result = tokenizer
                .read_next_number()
                .and_then(|first| Ok((first, tokenizer.read_next_number()?)))
                .and_then(|(first, count)| {
                    read_xref_subsection(&mut tokenizer, first, count, &mut self.xref)
                });
            match result {
                Ok(()) => {}
                Err(PdfError::InvalidXRef(message)) if strict => {
                    return Err(PdfError::InvalidXRef(message))
                }
                Err(PdfError::NoNumber(_) | PdfError::InvalidXRef(_) | PdfError::UnexpectedEOF(_)) => {
                    break
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn read_next_trailer(&mut self, pending: &mut Vec<Section>) -> Result<()> {
        let dict = {
            let mut tokenizer = device(&self.tokenizer)?;
            let is_trailer = tokenizer
                .next_token()?
                .is_some_and(|token| token.is_literal(b"trailer"));
            if !is_trailer {
                return Err(PdfError::NoTrailer);
            }
            match tokenizer.next_variant()? {
                Variant::Dictionary(dict) => dict,
                _ => return Err(PdfError::NoTrailer),
            }
        };
        self.trailer.merge(&dict);

        let prev = section_offset(&dict, "Prev");
        if let Some(prev) = prev {
            self.incremental_updates += 1;
            pending.push(Section {
                offset: prev,
                kind: SectionKind::Prev,
            });
        }
        if let Some(xref_stm) = section_offset(&dict, "XRefStm") {
            if prev.is_none() {
                self.incremental_updates += 1;
            }
            pending.push(Section {
                offset: xref_stm,
                kind: SectionKind::XRefStm,
            });
        }
        Ok(())
    }

    fn read_xref_stream(&mut self, offset: u64, pending: &mut Vec<Section>) -> Result<()> {
        let (reference, dict, stream_offset) = {
            let mut tokenizer = device(&self.tokenizer)?;
            tokenizer.seek(offset)?;
            let reference = tokenizer.read_object_header()?;
            let dict = match tokenizer.next_variant()? {
                Variant::Dictionary(dict) => dict,
                other => {
                    return Err(PdfError::NoXRef(format!(
                        "object {reference} at offset {offset} is a {}",
                        other.data_type()
                    )))
                }
            };
            if !tokenizer.is_next_token(b"stream")? {
                return Err(PdfError::NoXRef(format!(
                    "xref stream {reference} has no stream data"
                )));
            }
            (reference, dict, tokenizer.position())
        };

        let xref_stream = XRefStream::from_dict(&dict)?;
        self.trailer.merge(&dict);

        let length = self.xref_stream_length(&dict);
        let data = {
            let mut tokenizer = device(&self.tokenizer)?;
            read_stream_payload(&mut tokenizer, stream_offset, length, recovery(&self.options))?
        };
        let decoded = Stream::from_file(data)
            .decode(&dict)
            .with_context(|| format!("Unable to decode xref stream {reference}"))?;

        if xref_stream.size() > self.xref.size() {
            warn!(
                "xref stream {} declares /Size {}, more than the {} entries expected",
                reference,
                xref_stream.size(),
                self.xref.size()
            );
            self.xref.grow_to(xref_stream.size());
        }
        let applied = xref_stream.apply(&decoded, &mut self.xref)?;
        debug!("xref stream {} provided {} new entries", reference, applied);

        if let Some(prev) = section_offset(&dict, "Prev") {
            self.incremental_updates += 1;
            pending.push(Section {
                offset: prev,
                kind: SectionKind::StreamPrev,
            });
        }
        Ok(())
    }

    /// `/Length` of an xref stream, following a reference through the
    /// entries read so far.
    fn xref_stream_length(&self, dict: &Dictionary) -> Result<usize> {
        let length = match dict.get("Length") {
            Some(Variant::Number(n)) => *n,
            Some(Variant::Reference(reference)) => {
                match self.xref.get(reference.object_number()) {
                    Some(XRefEntry::InUse { offset, .. }) => {
                        read_number_object(&mut *device(&self.tokenizer)?, *reference, *offset)?
                    }
                    _ => {
                        return Err(PdfError::InvalidStreamLength(format!(
                            "/Length {reference} of xref stream cannot be resolved"
                        )))
                    }
                }
            }
            _ => {
                return Err(PdfError::InvalidStreamLength(
                    "xref stream has no /Length".to_string(),
                ))
            }
        };
        usize::try_from(length)
            .map_err(|_| PdfError::InvalidStreamLength(format!("negative /Length {length}")))
    }

    fn read_objects(&mut self) -> Result<()> {
        let Some(encrypt) = self.trailer.encrypt().cloned() else {
            return self.read_objects_internal();
        };
        self.encrypted = true;

        let dict = match encrypt {
            Variant::Reference(reference) => {
                let offset = match self.xref.get(reference.object_number()) {
                    Some(XRefEntry::InUse { offset, .. }) => *offset,
                    _ => {
                        return Err(PdfError::InvalidEncryptionDict(format!(
                            "encryption dictionary {reference} is not in the xref table"
                        )))
                    }
                };
                let loaded = read_indirect_object(&mut *device(&self.tokenizer)?, reference, offset, None)?;
                let Variant::Dictionary(dict) = loaded.value else {
                    return Err(PdfError::InvalidEncryptionDict(format!(
                        "object {reference} is not a dictionary"
                    )));
                };
                self.objects.insert(Object::new(reference, dict.clone()));
                self.encrypt_ref = Some(reference);
                self.loader.set_encrypt_ref(Some(reference));
                dict
            }
            Variant::Dictionary(dict) => dict,
            other => {
                return Err(PdfError::InvalidEncryptionDict(format!(
                    "/Encrypt is a {}",
                    other.data_type()
                )))
            }
        };

        let info = EncryptionInfo::from_dict(&dict)?;
        let factory = self.factory.as_ref().ok_or_else(|| {
            PdfError::UnsupportedEncryption(format!(
                "no security handler available for filter {}",
                info.filter
            ))
        })?;
        let mut handler = factory.create(&info)?;
        self.document_id = self.trailer.document_id()?.as_bytes().to_vec();

        if !handler.authenticate("", &self.document_id) {
            info!("Encrypted document requires a password");
            self.pending_handler = Some(handler);
            return Err(PdfError::InvalidPassword(
                "A password is required to read this PDF file.".to_string(),
            ));
        }
        self.install_security_handler(handler);
        self.read_objects_internal()
    }

    fn install_security_handler(&mut self, handler: Box<dyn SecurityHandler>) {
        let handler: Rc<dyn SecurityHandler> = Rc::from(handler);
        self.loader.set_security_handler(Some(handler));
    }

    fn read_objects_internal(&mut self) -> Result<()> {
        self.loader.set_xref(self.xref.clone());

        let entries: Vec<(u32, XRefEntry)> = self.xref.iter().map(|(n, e)| (n, *e)).collect();
        for (object_number, entry) in entries {
            match entry {
                XRefEntry::InUse { offset, generation } if offset > 0 => {
                    let reference = Reference::new(object_number, generation);
                    if self.encrypt_ref == Some(reference) {
                        continue;
                    }
                    match self.materialize(reference, offset) {
                        Ok(object) => {
                            self.objects.insert(object);
                        }
                        Err(e) if self.options.ignore_broken_objects => {
                            error!("Error while loading object {}: {}", reference, e);
                            self.objects.add_free_object(Reference::new(object_number, 0));
                        }
                        Err(e) => {
                            return Err(e.context(format!("Unable to load object {reference}")))
                        }
                    }
                }
                XRefEntry::InUse { .. } => {
                    if self.options.strict {
                        return Err(PdfError::InvalidXRef(format!(
                            "in-use object {object_number} has offset 0"
                        )));
                    }
                    if object_number != 0 {
                        warn!("Treating object {} 0 R as a free object.", object_number);
                        self.objects.add_free_object(Reference::new(object_number, 1));
                    }
                }
                XRefEntry::Free { .. } => {
                    if object_number != 0 {
                        self.objects.add_free_object(Reference::new(object_number, 1));
                    }
                }
                XRefEntry::Compressed { .. } => {}
            }
        }
        for object_number in 1..self.xref.size() {
            if !self.xref.is_parsed(object_number) {
                self.objects.add_free_object(Reference::new(object_number, 1));
            }
        }

        self.expand_object_streams()?;

        if !self.options.load_on_demand {
            self.load_streams()?;
        }

        self.objects.sort();
        self.update_document_version();
        Ok(())
    }

    /// Check the object header now; the value is read on first access, or
    /// right away when loading eagerly.
    fn materialize(&self, reference: Reference, offset: u64) -> Result<Object> {
        {
            let mut tokenizer = device(&self.tokenizer)?;
            tokenizer.seek(offset)?;
            let found = tokenizer.read_object_header()?;
            if found.object_number() != reference.object_number() {
                return Err(PdfError::NoObject(format!(
                    "Found object with reference {found} different from reference {reference} in xref"
                )));
            }
        }
        let loader: Rc<dyn ObjectLoader> = self.loader.clone();
        let object = Object::delayed(reference, offset, loader);
        if !self.options.load_on_demand {
            object.value()?;
        }
        Ok(object)
    }

    fn expand_object_streams(&mut self) -> Result<()> {
        for container in self.xref.containers() {
            let wanted = self.xref.compressed_in(container);
            match expand_object_stream(&mut self.objects, container, &wanted) {
                Ok(inserted) => {
                    for reference in inserted {
                        let number = self
                            .objects
                            .get_object(reference)
                            .and_then(|object| object.value().ok().and_then(|v| v.as_number()));
                        if let Some(number) = number {
                            self.loader.remember_number(reference, number);
                        }
                    }
                }
                Err(e) if self.options.ignore_broken_objects => {
                    error!("Error while loading object stream {} 0 R: {}", container, e);
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "Unable to load objects from object stream {container} 0 R"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Eager mode reads streams after object streams are expanded, so an
    /// indirect `/Length` stored in one can be resolved.
    fn load_streams(&mut self) -> Result<()> {
        for reference in self.objects.references() {
            let result = match self.objects.get_object(reference) {
                Some(object) => object.force_load(),
                None => continue,
            };
            match result {
                Ok(()) => {}
                Err(e) if self.options.ignore_broken_objects => {
                    error!("Error while loading object {}: {}", reference, e);
                    self.objects.detach_object(reference);
                    self.objects
                        .add_free_object(Reference::new(reference.object_number(), 0));
                }
                Err(e) => return Err(e.context(format!("Unable to load object {reference}"))),
            }
        }
        Ok(())
    }

    fn update_document_version(&mut self) {
        let Ok(catalog) = self.catalog() else {
            return;
        };
        let name = match catalog.value() {
            Ok(value) => value
                .as_dict()
                .and_then(|dict| dict.get_name("Version"))
                .map(|name| String::from_utf8_lossy(name.as_bytes()).into_owned()),
            Err(e) => {
                warn!("Unable to read the document catalog: {}", e);
                return;
            }
        };
        let Some(name) = name else {
            return;
        };

        match PdfVersion::from_name(&name) {
            Some(version) if version > self.version => {
                info!(
                    "Updating version from {} to {}",
                    self.version, version
                );
                self.version = version;
            }
            Some(version) if version < self.version => {
                warn!(
                    "Catalog /Version {} is older than the header version {}, keeping {}",
                    version, self.version, self.version
                );
            }
            Some(_) => {}
            None => warn!("Ignoring unknown catalog /Version {:?}", name),
        }
    }

    /// Start offset of the last `token` within `window` bytes before the
    /// end-of-file anchor.
    fn find_token(&self, token: &[u8], window: u64) -> Result<Option<u64>> {
        let end = self.eof_anchor;
        let start = end.saturating_sub(window);
        let mut tokenizer = device(&self.tokenizer)?;
        tokenizer.seek(start)?;
        let data = tokenizer.read_raw((end - start) as usize)?;
        Ok(rfind_keyword(&data, token).map(|position| start + position as u64))
    }

    /// Scan backward from `end` to the start of the file in chunks.
    fn find_backward(&self, token: &[u8], end: u64) -> Result<Option<u64>> {
        let overlap = token.len() as u64;
        let mut chunk_end = end;
        let mut tokenizer = device(&self.tokenizer)?;
        while chunk_end > 0 {
            let chunk_start = chunk_end.saturating_sub(EOF_SCAN_CHUNK);
            tokenizer.seek(chunk_start)?;
            let data = tokenizer.read_raw((chunk_end - chunk_start) as usize)?;
            if let Some(position) = rfind(&data, token) {
                return Ok(Some(chunk_start + position as u64));
            }
            if chunk_start == 0 {
                break;
            }
            chunk_end = (chunk_start + overlap).min(chunk_end - 1);
        }
        Ok(None)
    }
}

fn device<R>(tokenizer: &RefCell<Tokenizer<R>>) -> Result<RefMut<'_, Tokenizer<R>>> {
    tokenizer
        .try_borrow_mut()
        .map_err(|_| PdfError::InternalLogic("the input device is already in use".to_string()))
}

fn recovery(options: &ParseOptions) -> StreamRecovery {
    StreamRecovery {
        enabled: options.lenient_streams && !options.strict,
        max_bytes: options.max_recovery_bytes,
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Like `rfind`, but the match must not be part of a longer word
fn rfind_keyword(haystack: &[u8], keyword: &[u8]) -> Option<usize> {
    let is_regular = |b: u8| !is_whitespace(b) && !is_delimiter(b);
    let mut end = haystack.len();
    while let Some(position) = rfind(&haystack[..end], keyword) {
        let before = position.checked_sub(1).map(|i| haystack[i]);
        let after = haystack.get(position + keyword.len()).copied();
        if !before.is_some_and(is_regular) && !after.is_some_and(is_regular) {
            return Some(position);
        }
        end = position + keyword.len() - 1;
    }
    None
}

/// End of a `%%EOF` marker that is followed by at most one end-of-line
fn marker_at_end(tail: &[u8]) -> Option<usize> {
    let content = tail
        .strip_suffix(b"\r\n")
        .or_else(|| tail.strip_suffix(b"\n"))
        .or_else(|| tail.strip_suffix(b"\r"))
        .unwrap_or(tail);
    content
        .ends_with(EOF_MARKER)
        .then_some(content.len())
}
