use crate::error::{PdfError, Result};
use crate::objects::{Array, Dictionary, Name, PdfString, Reference};
use std::fmt;

/// Classification of a value or of the token that starts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Bool,
    Number,
    Real,
    Reference,
    Dictionary,
    Array,
    String,
    HexString,
    Name,
    RawData,
    Unknown,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "Null",
            DataType::Bool => "Bool",
            DataType::Number => "Number",
            DataType::Real => "Real",
            DataType::Reference => "Reference",
            DataType::Dictionary => "Dictionary",
            DataType::Array => "Array",
            DataType::String => "String",
            DataType::HexString => "HexString",
            DataType::Name => "Name",
            DataType::RawData => "RawData",
            DataType::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Every PDF value. Composite payloads are owned by the variant that holds them.
///
/// Equality is structural; `Number(1)` and `Real(1.0)` are different values.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Number(i64),
    Real(f64),
    String(PdfString),
    Name(Name),
    Array(Array),
    Dictionary(Dictionary),
    Reference(Reference),
    RawData(Vec<u8>),
}

impl Variant {
    pub fn data_type(&self) -> DataType {
        match self {
            Variant::Null => DataType::Null,
            Variant::Bool(_) => DataType::Bool,
            Variant::Number(_) => DataType::Number,
            Variant::Real(_) => DataType::Real,
            Variant::String(s) if s.is_hex() => DataType::HexString,
            Variant::String(_) => DataType::String,
            Variant::Name(_) => DataType::Name,
            Variant::Array(_) => DataType::Array,
            Variant::Dictionary(_) => DataType::Dictionary,
            Variant::Reference(_) => DataType::Reference,
            Variant::RawData(_) => DataType::RawData,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Variant::Number(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Variant::Reference(_))
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, Variant::Dictionary(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Variant::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Real value; integers widen.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Variant::Real(r) => Some(*r),
            Variant::Number(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Variant::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Variant::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Variant::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Variant::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Variant::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            Variant::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Like `as_name` but fails with `InvalidDataType`.
    pub fn try_name(&self) -> Result<&Name> {
        self.as_name().ok_or_else(|| {
            PdfError::InvalidDataType(format!("expected Name, found {}", self.data_type()))
        })
    }

    pub fn try_number(&self) -> Result<i64> {
        self.as_number().ok_or_else(|| {
            PdfError::InvalidDataType(format!("expected Number, found {}", self.data_type()))
        })
    }

    pub fn try_dict(&self) -> Result<&Dictionary> {
        self.as_dict().ok_or_else(|| {
            PdfError::InvalidDataType(format!("expected Dictionary, found {}", self.data_type()))
        })
    }

    /// Whether this value or any nested container was modified.
    pub fn is_dirty(&self) -> bool {
        match self {
            Variant::Array(a) => a.is_dirty(),
            Variant::Dictionary(d) => d.is_dirty(),
            _ => false,
        }
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        match self {
            Variant::Array(a) => a.set_dirty(dirty),
            Variant::Dictionary(d) => d.set_dirty(dirty),
            _ => {}
        }
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Bool(b)
    }
}

impl From<i32> for Variant {
    fn from(i: i32) -> Self {
        Variant::Number(i as i64)
    }
}

impl From<i64> for Variant {
    fn from(i: i64) -> Self {
        Variant::Number(i)
    }
}

impl From<f64> for Variant {
    fn from(f: f64) -> Self {
        Variant::Real(f)
    }
}

impl From<PdfString> for Variant {
    fn from(s: PdfString) -> Self {
        Variant::String(s)
    }
}

impl From<Name> for Variant {
    fn from(n: Name) -> Self {
        Variant::Name(n)
    }
}

impl From<Array> for Variant {
    fn from(a: Array) -> Self {
        Variant::Array(a)
    }
}

impl From<Dictionary> for Variant {
    fn from(d: Dictionary) -> Self {
        Variant::Dictionary(d)
    }
}

impl From<Reference> for Variant {
    fn from(r: Reference) -> Self {
        Variant::Reference(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_classification() {
        assert_eq!(Variant::Null.data_type(), DataType::Null);
        assert_eq!(Variant::from(true).data_type(), DataType::Bool);
        assert_eq!(Variant::from(3).data_type(), DataType::Number);
        assert_eq!(Variant::from(3.5).data_type(), DataType::Real);
        assert_eq!(
            Variant::String(PdfString::new_hex(vec![1])).data_type(),
            DataType::HexString
        );
        assert_eq!(Variant::from(PdfString::from("a")).data_type(), DataType::String);
        assert_eq!(Variant::from(Reference::new(1, 0)).data_type(), DataType::Reference);
        assert_eq!(Variant::RawData(vec![]).data_type(), DataType::RawData);
    }

    #[test]
    fn test_number_and_real_are_distinct() {
        assert_ne!(Variant::Number(1), Variant::Real(1.0));
        assert_eq!(Variant::Real(1.0), Variant::Real(1.0));
        assert_eq!(Variant::Number(1).as_real(), Some(1.0));
        assert_eq!(Variant::Real(1.0).as_number(), None);
    }

    #[test]
    fn test_try_accessors() {
        let v = Variant::from(Name::from("Catalog"));
        assert_eq!(v.try_name().unwrap(), &Name::from("Catalog"));
        let err = Variant::Number(4).try_name().unwrap_err();
        assert!(matches!(err, PdfError::InvalidDataType(_)));
        assert!(Variant::Null.try_dict().is_err());
        assert_eq!(Variant::Number(9).try_number().unwrap(), 9);
    }

    #[test]
    fn test_dirty_propagates_from_children() {
        let mut inner = Dictionary::new();
        inner.set_dirty(false);
        let mut outer = Dictionary::new();
        outer.insert("Inner", inner);
        let mut value = Variant::from(outer);
        value.set_dirty(false);
        assert!(!value.is_dirty());

        value
            .as_dict_mut()
            .and_then(|d| d.get_mut("Inner"))
            .and_then(|v| v.as_dict_mut())
            .unwrap()
            .insert("Key", 1);
        assert!(value.is_dirty());
    }
}
