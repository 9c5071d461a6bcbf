//! The PDF object model: values, containers, indirect objects and their table.

mod array;
mod dictionary;
mod object;
mod primitive;
mod stream;
mod table;
mod variant;

pub use array::Array;
pub use dictionary::Dictionary;
pub use object::{LoadState, Object};
pub(crate) use object::{LoadedObject, ObjectLoader};
pub(crate) use primitive::hex_value;
pub use primitive::{Name, PdfString, Reference};
pub use stream::Stream;
pub use table::{IndirectObjectTable, MAX_GENERATION, MAX_RESERVE_SIZE};
pub use variant::{DataType, Variant};
