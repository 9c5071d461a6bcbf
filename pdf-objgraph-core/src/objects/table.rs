//! The document's indirect object table.
//!
//! Objects live in an arena of slots addressed through a reference index, so
//! removing or replacing an object never moves the others.

use crate::error::{PdfError, Result};
use crate::objects::{Object, Reference, Variant};
use crate::parser::stack_safe::StackSafeContext;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Largest object count the table will pre-allocate for.
pub const MAX_RESERVE_SIZE: usize = 8_388_607;

/// Entries freed with this generation can never be reused.
pub const MAX_GENERATION: u16 = 65_535;

#[derive(Debug)]
pub struct IndirectObjectTable {
    slots: Vec<Option<Object>>,
    index: HashMap<Reference, usize>,
    free_objects: BTreeSet<Reference>,
    object_count: u32,
    can_reuse_object_numbers: bool,
}

impl Default for IndirectObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

impl IndirectObjectTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            free_objects: BTreeSet::new(),
            object_count: 1,
            can_reuse_object_numbers: true,
        }
    }

    pub fn can_reuse_object_numbers(&self) -> bool {
        self.can_reuse_object_numbers
    }

    /// When disabled, the free list is dropped and new objects always get fresh numbers.
    pub fn set_can_reuse_object_numbers(&mut self, can_reuse: bool) {
        self.can_reuse_object_numbers = can_reuse;
        if !can_reuse {
            self.free_objects.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Object number the next freshly allocated object gets, if no free number is reused.
    pub fn next_object_number(&self) -> u32 {
        self.object_count
    }

    pub fn free_objects(&self) -> impl Iterator<Item = &Reference> {
        self.free_objects.iter()
    }

    pub fn get_object(&self, reference: Reference) -> Option<&Object> {
        self.index
            .get(&reference)
            .and_then(|&slot| self.slots[slot].as_ref())
    }

    pub fn get_object_mut(&mut self, reference: Reference) -> Option<&mut Object> {
        match self.index.get(&reference) {
            Some(&slot) => self.slots[slot].as_mut(),
            None => None,
        }
    }

    /// Like `get_object` but a missing object is an error.
    pub fn must_get_object(&self, reference: Reference) -> Result<&Object> {
        self.get_object(reference)
            .ok_or_else(|| PdfError::NoObject(format!("object {reference} not found")))
    }

    pub fn contains(&self, reference: Reference) -> bool {
        self.index.contains_key(&reference)
    }

    /// Create an object under the next free reference and return it.
    pub fn create_object(&mut self, value: impl Into<Variant>) -> &mut Object {
        let reference = self.next_free_reference();
        self.bump_object_count(reference);
        self.index.insert(reference, self.slots.len());
        self.slots.push(None);
        let slot = self.slots.len() - 1;
        self.slots[slot].insert(Object::new(reference, value))
    }

    /// Insert an object under its own reference. An object already stored
    /// there is replaced in its slot and returned.
    pub fn insert(&mut self, object: Object) -> Option<Object> {
        let reference = object.reference();
        self.free_objects.remove(&reference);
        self.bump_object_count(reference);
        match self.index.get(&reference) {
            Some(&slot) => self.slots[slot].replace(object),
            None => {
                self.store(object);
                None
            }
        }
    }

    /// Remove an object and record its reference in the free list.
    pub fn remove_object(&mut self, reference: Reference) -> Option<Object> {
        let removed = self.detach_object(reference);
        if removed.is_some() {
            self.add_free_object(reference);
        }
        removed
    }

    /// Remove an object without freeing its number.
    pub fn detach_object(&mut self, reference: Reference) -> Option<Object> {
        let slot = self.index.remove(&reference)?;
        self.slots[slot].take()
    }

    /// Record a free reference. Duplicates are ignored.
    pub fn add_free_object(&mut self, reference: Reference) {
        if self.free_objects.contains(&reference) {
            debug!("Adding {} to freelist, is already contained", reference);
            return;
        }
        self.bump_object_count(reference);
        if self.can_reuse_object_numbers {
            self.free_objects.insert(reference);
        }
    }

    /// Pre-allocate room for `count` objects.
    pub fn reserve(&mut self, count: usize) {
        if count <= MAX_RESERVE_SIZE {
            self.slots.reserve(count.saturating_sub(self.slots.len()));
        } else {
            debug!(
                "Call to reserve with {} is over allowed limit of {}",
                count, MAX_RESERVE_SIZE
            );
        }
    }

    /// Compact the arena and order objects by reference.
    pub fn sort(&mut self) {
        let mut objects: Vec<Object> = self.slots.drain(..).flatten().collect();
        objects.sort_by_key(|object| object.reference());
        self.index.clear();
        for (slot, object) in objects.into_iter().enumerate() {
            self.index.insert(object.reference(), slot);
            self.slots.push(Some(object));
        }
    }

    /// Live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.slots.iter_mut().flatten()
    }

    pub fn references(&self) -> Vec<Reference> {
        self.iter().map(|object| object.reference()).collect()
    }

    /// Value of `key` in `object`'s dictionary with one Reference hop resolved.
    pub fn get_indirect_key(&self, object: &Object, key: &str) -> Result<Option<Variant>> {
        object.get_indirect_key(key, self)
    }

    /// Follow a chain of references to a direct value. Dangling references
    /// resolve to Null; cycles are errors.
    pub fn resolve(&self, value: &Variant) -> Result<Variant> {
        let mut context = StackSafeContext::new();
        let mut current = value.clone();
        while let Variant::Reference(reference) = current {
            context.visit_ref(reference)?;
            current = match self.get_object(reference) {
                Some(object) => object.value()?.clone(),
                None => Variant::Null,
            };
        }
        Ok(current)
    }

    fn next_free_reference(&mut self) -> Reference {
        if self.can_reuse_object_numbers {
            let reusable = self
                .free_objects
                .iter()
                .copied()
                .find(|r| r.generation() < MAX_GENERATION && !self.index.contains_key(r));
            if let Some(reference) = reusable {
                self.free_objects.remove(&reference);
                return reference;
            }
        }
        Reference::new(self.object_count, 0)
    }

    fn store(&mut self, object: Object) {
        let reference = object.reference();
        self.bump_object_count(reference);
        self.index.insert(reference, self.slots.len());
        self.slots.push(Some(object));
    }

    fn bump_object_count(&mut self, reference: Reference) {
        let next = reference.object_number().saturating_add(1);
        if next > self.object_count {
            self.object_count = next;
        }
    }
}
