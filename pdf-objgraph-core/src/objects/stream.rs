use crate::error::Result;
use crate::objects::Dictionary;
use crate::parser::filters;

/// Payload of a stream object, kept as stored in the file (filters still applied,
/// document encryption already removed).
#[derive(Debug, Clone, Default)]
pub struct Stream {
    data: Vec<u8>,
    dirty: bool,
}

impl Stream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, dirty: true }
    }

    pub(crate) fn from_file(data: Vec<u8>) -> Self {
        Self { data, dirty: false }
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn set_raw_data(&mut self, data: Vec<u8>) {
        self.data = data;
        self.dirty = true;
    }

    /// Apply the `/Filter` chain named by the owning object's dictionary.
    pub fn decode(&self, dict: &Dictionary) -> Result<Vec<u8>> {
        filters::decode_stream(&self.data, dict)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}
