use crate::objects::Variant;
use std::ops::Index;

#[derive(Debug, Clone, Default)]
pub struct Array {
    elements: Vec<Variant>,
    dirty: bool,
}

impl Array {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            dirty: false,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
            dirty: false,
        }
    }

    pub fn push(&mut self, value: impl Into<Variant>) {
        self.dirty = true;
        self.elements.push(value.into());
    }

    pub fn insert(&mut self, index: usize, value: impl Into<Variant>) {
        self.dirty = true;
        self.elements.insert(index, value.into());
    }

    /// Remove the element at `index`; `None` if out of bounds.
    pub fn remove(&mut self, index: usize) -> Option<Variant> {
        if index >= self.elements.len() {
            return None;
        }
        self.dirty = true;
        Some(self.elements.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&Variant> {
        self.elements.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Variant> {
        self.elements.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.elements.is_empty() {
            self.dirty = true;
        }
        self.elements.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variant> {
        self.elements.iter()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.elements.iter().any(|v| v.is_dirty())
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
        if !dirty {
            for value in &mut self.elements {
                value.set_dirty(false);
            }
        }
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl Index<usize> for Array {
    type Output = Variant;

    fn index(&self, index: usize) -> &Variant {
        &self.elements[index]
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Variant;
    type IntoIter = std::slice::Iter<'a, Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<V: Into<Variant>> FromIterator<V> for Array {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Self {
            elements: iter.into_iter().map(Into::into).collect(),
            dirty: true,
        }
    }
}

impl From<Vec<Variant>> for Array {
    fn from(elements: Vec<Variant>) -> Self {
        Self {
            elements,
            dirty: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Dictionary, Reference};

    #[test]
    fn test_append_insert_erase() {
        let mut array = Array::new();
        array.push(1);
        array.push(3);
        array.insert(1, 2);
        assert_eq!(array.len(), 3);
        assert_eq!(array[1], Variant::Number(2));

        assert_eq!(array.remove(0), Some(Variant::Number(1)));
        assert_eq!(array.remove(10), None);
        let values: Vec<i64> = array.iter().filter_map(|v| v.as_number()).collect();
        assert_eq!(values, vec![2, 3]);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut array: Array = vec![Variant::from(Reference::new(1, 0))].into();
        assert!(array.is_dirty());
        array.set_dirty(false);
        assert!(!array.is_dirty());
        assert_eq!(array.remove(5), None);
        assert!(!array.is_dirty());

        array.push(Dictionary::new());
        array.set_dirty(false);
        array
            .get_mut(1)
            .and_then(|v| v.as_dict_mut())
            .unwrap()
            .insert("K", true);
        assert!(array.is_dirty());
    }

    #[test]
    fn test_collect_and_equality() {
        let a: Array = (1..=3).map(|i: i64| Variant::Number(i)).collect();
        let mut b = Array::new();
        for i in 1..=3i64 {
            b.push(i);
        }
        b.set_dirty(false);
        assert_eq!(a, b);
        assert_eq!((&a).into_iter().count(), 3);
    }
}
