//! Indirect objects and their delayed-load state machine.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, IndirectObjectTable, Reference, Stream, Variant};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// Where an object is in its delayed-load life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

/// Backend that materializes delayed objects, usually the document parser.
pub(crate) trait ObjectLoader {
    /// Parse the object whose `n g obj` header starts at `offset`.
    fn load_object(&self, reference: Reference, offset: u64) -> Result<LoadedObject>;

    /// Read the stream payload that starts right after the `stream` keyword.
    fn load_stream(&self, reference: Reference, dict: &Dictionary, offset: u64) -> Result<Stream>;
}

pub(crate) struct LoadedObject {
    pub value: Variant,
    /// Position of the `stream` keyword's end, when the value is followed by one.
    pub stream_offset: Option<u64>,
}

enum StreamSlot {
    Absent,
    Pending { offset: u64 },
    Loading,
    Loaded(Stream),
}

enum Body {
    NotLoaded { offset: u64 },
    Loading,
    Loaded { value: Variant, stream: StreamSlot },
}

/// A value with an identity, an optional stream, and lazily materialized content.
pub struct Object {
    reference: Reference,
    body: RefCell<Body>,
    loader: Option<Rc<dyn ObjectLoader>>,
}

impl Object {
    pub fn new(reference: Reference, value: impl Into<Variant>) -> Self {
        Self {
            reference,
            body: RefCell::new(Body::Loaded {
                value: value.into(),
                stream: StreamSlot::Absent,
            }),
            loader: None,
        }
    }

    /// A stream object built in memory.
    pub fn with_stream(reference: Reference, dict: Dictionary, stream: Stream) -> Self {
        Self {
            reference,
            body: RefCell::new(Body::Loaded {
                value: Variant::Dictionary(dict),
                stream: StreamSlot::Loaded(stream),
            }),
            loader: None,
        }
    }

    /// A placeholder whose content is parsed from `offset` on first access.
    pub(crate) fn delayed(reference: Reference, offset: u64, loader: Rc<dyn ObjectLoader>) -> Self {
        Self {
            reference,
            body: RefCell::new(Body::NotLoaded { offset }),
            loader: Some(loader),
        }
    }

    pub fn reference(&self) -> Reference {
        self.reference
    }

    pub fn load_state(&self) -> LoadState {
        match &*self.body.borrow() {
            Body::NotLoaded { .. } => LoadState::NotLoaded,
            Body::Loading => LoadState::Loading,
            Body::Loaded { .. } => LoadState::Loaded,
        }
    }

    /// The value, loading it first if needed.
    pub fn value(&self) -> Result<Ref<'_, Variant>> {
        self.ensure_loaded()?;
        Ref::filter_map(self.body.borrow(), |body| match body {
            Body::Loaded { value, .. } => Some(value),
            _ => None,
        })
        .map_err(|_| self.not_loaded_error())
    }

    pub fn value_mut(&mut self) -> Result<&mut Variant> {
        self.ensure_loaded()?;
        match self.body.get_mut() {
            Body::Loaded { value, .. } => Ok(value),
            _ => Err(PdfError::InternalLogic(format!(
                "object {} is not loaded",
                self.reference
            ))),
        }
    }

    pub fn into_value(self) -> Result<Variant> {
        self.ensure_loaded()?;
        match self.body.into_inner() {
            Body::Loaded { value, .. } => Ok(value),
            _ => Err(PdfError::InternalLogic("object is not loaded".to_string())),
        }
    }

    pub fn has_stream(&self) -> Result<bool> {
        self.ensure_loaded()?;
        Ok(matches!(
            &*self.body.borrow(),
            Body::Loaded { stream, .. } if !matches!(stream, StreamSlot::Absent)
        ))
    }

    /// The stream payload, reading it from the device on first access.
    pub fn stream(&self) -> Result<Option<Ref<'_, Stream>>> {
        self.ensure_stream_loaded()?;
        Ok(Ref::filter_map(self.body.borrow(), |body| match body {
            Body::Loaded {
                stream: StreamSlot::Loaded(stream),
                ..
            } => Some(stream),
            _ => None,
        })
        .ok())
    }

    pub fn stream_mut(&mut self) -> Result<Option<&mut Stream>> {
        self.ensure_stream_loaded()?;
        match self.body.get_mut() {
            Body::Loaded {
                stream: StreamSlot::Loaded(stream),
                ..
            } => Ok(Some(stream)),
            _ => Ok(None),
        }
    }

    /// Attach a stream; only dictionaries can carry one.
    pub fn set_stream(&mut self, stream: Stream) -> Result<()> {
        self.ensure_loaded()?;
        match self.body.get_mut() {
            Body::Loaded {
                value: Variant::Dictionary(_),
                stream: slot,
            } => {
                *slot = StreamSlot::Loaded(stream);
                Ok(())
            }
            Body::Loaded { value, .. } => Err(PdfError::InvalidDataType(format!(
                "a stream needs a Dictionary value, object {} holds {}",
                self.reference,
                value.data_type()
            ))),
            _ => Err(self.not_loaded_error()),
        }
    }

    /// Load value and stream now.
    pub fn force_load(&self) -> Result<()> {
        self.ensure_stream_loaded()
    }

    /// Value of `key` in this object's dictionary, following one Reference hop
    /// through `table`. A dangling reference yields `None`.
    pub fn get_indirect_key(&self, key: &str, table: &IndirectObjectTable) -> Result<Option<Variant>> {
        let target = {
            let value = self.value()?;
            let Some(dict) = value.as_dict() else {
                return Ok(None);
            };
            match dict.get(key) {
                None => return Ok(None),
                Some(Variant::Reference(reference)) => *reference,
                Some(direct) => return Ok(Some(direct.clone())),
            }
        };
        if target == self.reference {
            return Ok(Some(self.value()?.clone()));
        }
        match table.get_object(target) {
            Some(object) => Ok(Some(object.value()?.clone())),
            None => Ok(None),
        }
    }

    /// Unloaded objects are never dirty.
    pub fn is_dirty(&self) -> bool {
        match &*self.body.borrow() {
            Body::Loaded { value, stream } => {
                value.is_dirty() || matches!(stream, StreamSlot::Loaded(s) if s.is_dirty())
            }
            _ => false,
        }
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        if let Body::Loaded { value, stream } = self.body.get_mut() {
            value.set_dirty(dirty);
            if let StreamSlot::Loaded(s) = stream {
                s.set_dirty(dirty);
            }
        }
    }

    fn ensure_loaded(&self) -> Result<()> {
        let offset = match &*self.body.borrow() {
            Body::Loaded { .. } => return Ok(()),
            Body::Loading => return Err(PdfError::CircularReference(self.reference)),
            Body::NotLoaded { offset } => *offset,
        };
        let loader = self.loader.as_ref().ok_or_else(|| {
            PdfError::InternalLogic(format!("object {} has no loader", self.reference))
        })?;

        *self.body.borrow_mut() = Body::Loading;
        match loader.load_object(self.reference, offset) {
            Ok(mut loaded) => {
                loaded.value.set_dirty(false);
                let stream = match loaded.stream_offset {
                    Some(offset) => StreamSlot::Pending { offset },
                    None => StreamSlot::Absent,
                };
                *self.body.borrow_mut() = Body::Loaded {
                    value: loaded.value,
                    stream,
                };
                Ok(())
            }
            Err(e) => {
                *self.body.borrow_mut() = Body::NotLoaded { offset };
                Err(e)
            }
        }
    }

    fn ensure_stream_loaded(&self) -> Result<()> {
        self.ensure_loaded()?;
        let offset = {
            let mut body = self.body.borrow_mut();
            let Body::Loaded { stream, .. } = &mut *body else {
                return Err(self.not_loaded_error());
            };
            match *stream {
                StreamSlot::Pending { offset } => {
                    *stream = StreamSlot::Loading;
                    offset
                }
                StreamSlot::Loading => return Err(PdfError::CircularReference(self.reference)),
                StreamSlot::Absent | StreamSlot::Loaded(_) => return Ok(()),
            }
        };
        let loader = self.loader.as_ref().ok_or_else(|| {
            PdfError::InternalLogic(format!("object {} has no loader", self.reference))
        })?;

        let result = match &*self.body.borrow() {
            Body::Loaded {
                value: Variant::Dictionary(dict),
                ..
            } => loader.load_stream(self.reference, dict, offset),
            _ => Err(PdfError::InvalidDataType(format!(
                "object {} has a stream but no dictionary",
                self.reference
            ))),
        };

        if let Body::Loaded { stream, .. } = &mut *self.body.borrow_mut() {
            match result {
                Ok(loaded) => {
                    *stream = StreamSlot::Loaded(loaded);
                    return Ok(());
                }
                Err(e) => {
                    *stream = StreamSlot::Pending { offset };
                    return Err(e.context(format!(
                        "Unable to parse the stream for object {}",
                        self.reference
                    )));
                }
            }
        }
        Err(self.not_loaded_error())
    }

    fn not_loaded_error(&self) -> PdfError {
        PdfError::InternalLogic(format!("object {} is not loaded", self.reference))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Object");
        s.field("reference", &self.reference);
        match self.body.try_borrow() {
            Ok(body) => match &*body {
                Body::NotLoaded { offset } => s.field("offset", offset),
                Body::Loading => s.field("state", &LoadState::Loading),
                Body::Loaded { value, stream } => s
                    .field("value", value)
                    .field("has_stream", &!matches!(stream, StreamSlot::Absent)),
            },
            Err(_) => s.field("state", &"borrowed"),
        };
        s.finish()
    }
}
