use crate::objects::{Name, Variant};
use std::collections::BTreeMap;

/// Name-keyed map of values. Re-inserting a key replaces the old value in place.
///
/// The dirty flag is set by every mutation made through this type; `is_dirty`
/// also reports modifications made to nested arrays and dictionaries.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: BTreeMap<Name, Variant>,
    dirty: bool,
}

impl Dictionary {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn insert(&mut self, key: impl Into<Name>, value: impl Into<Variant>) -> Option<Variant> {
        self.dirty = true;
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Variant> {
        self.entries.get(key.as_bytes())
    }

    pub fn get_by_name(&self, key: &Name) -> Option<&Variant> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Variant> {
        self.entries.get_mut(key.as_bytes())
    }

    pub fn remove(&mut self, key: &str) -> Option<Variant> {
        let removed = self.entries.remove(key.as_bytes());
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.dirty = true;
        }
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Variant)> {
        self.entries.iter()
    }

    /// Entries in output order: `/Type` first, the rest by key.
    pub fn iter_for_output(&self) -> impl Iterator<Item = (&Name, &Variant)> {
        let type_entry = self.entries.get_key_value(b"Type".as_slice());
        type_entry
            .into_iter()
            .chain(self.entries.iter().filter(|(k, _)| *k != "Type"))
    }

    /// The `/Type` name, if present.
    pub fn get_type(&self) -> Option<&Name> {
        self.get("Type").and_then(|v| v.as_name())
    }

    pub fn get_name(&self, key: &str) -> Option<&Name> {
        self.get(key).and_then(|v| v.as_name())
    }

    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        self.get(key).and_then(|v| v.as_dict())
    }

    /// Integer value of `key`, or `default` when absent or not a Number.
    pub fn get_number_or(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| v.as_number()).unwrap_or(default)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.entries.values().any(|v| v.is_dirty())
    }

    /// Set or clear the flag on this dictionary and every nested container.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
        if !dirty {
            for value in self.entries.values_mut() {
                value.set_dirty(false);
            }
        }
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<Name>, V: Into<Variant>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut dict = Dictionary::new();
        for (key, value) in iter {
            dict.insert(key, value);
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{PdfString, Reference};

    #[test]
    fn test_insert_replaces_in_place() {
        let mut dict = Dictionary::new();
        assert!(dict.insert("Size", 3).is_none());
        let old = dict.insert("Size", 5);
        assert_eq!(old, Some(Variant::Number(3)));
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("Size"), Some(&Variant::Number(5)));
    }

    #[test]
    fn test_type_is_first_in_output_order() {
        let mut dict = Dictionary::new();
        dict.insert("Annots", Variant::Null);
        dict.insert("Type", Name::from("Page"));
        dict.insert("Contents", Reference::new(4, 0));

        let keys: Vec<String> = dict
            .iter_for_output()
            .map(|(k, _)| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["Type", "Annots", "Contents"]);
    }

    #[test]
    fn test_output_order_without_type() {
        let dict: Dictionary = vec![("B", 2), ("A", 1)].into_iter().collect();
        let keys: Vec<&Name> = dict.iter_for_output().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&Name::from("A"), &Name::from("B")]);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut dict = Dictionary::new();
        assert!(!dict.is_dirty());
        dict.insert("Key", PdfString::from("value"));
        assert!(dict.is_dirty());
        dict.set_dirty(false);
        assert!(!dict.is_dirty());
        assert!(dict.remove("Missing").is_none());
        assert!(!dict.is_dirty());
        dict.remove("Key");
        assert!(dict.is_dirty());
    }

    #[test]
    fn test_equality_ignores_dirty_flag() {
        let mut a = Dictionary::new();
        a.insert("K", 1);
        let mut b = a.clone();
        b.set_dirty(false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_typed_getters() {
        let mut dict = Dictionary::new();
        dict.insert("Type", Name::from("XRef"));
        dict.insert("Size", 12);
        dict.insert("Real", 1.5);
        assert_eq!(dict.get_type(), Some(&Name::from("XRef")));
        assert_eq!(dict.get_number_or("Size", 0), 12);
        assert_eq!(dict.get_number_or("Real", -1), -1);
        assert_eq!(dict.get_number_or("Missing", 7), 7);
        assert!(dict.get_dict("Type").is_none());
    }
}
