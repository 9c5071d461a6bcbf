//! Depth and cycle limits for walking nested or self-referential structures
//! without unbounded recursion.

use crate::error::{PdfError, Result};
use crate::objects::Reference;
use std::collections::HashSet;

/// Maximum nesting of arrays and dictionaries accepted by the reader.
pub const MAX_RECURSION_DEPTH: usize = 1000;

#[derive(Debug)]
pub struct StackSafeContext {
    pub depth: usize,
    pub max_depth: usize,
    /// References currently being followed.
    pub visited_refs: HashSet<Reference>,
}

impl Default for StackSafeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl StackSafeContext {
    pub fn new() -> Self {
        Self::with_limit(MAX_RECURSION_DEPTH)
    }

    pub fn with_limit(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
            visited_refs: HashSet::new(),
        }
    }

    /// Enter a new nesting level
    pub fn enter(&mut self) -> Result<()> {
        if self.depth + 1 > self.max_depth {
            return Err(PdfError::ValueOutOfRange(format!(
                "maximum nesting depth exceeded: {} (limit: {})",
                self.depth + 1,
                self.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Record that `reference` is being followed; fails if it already is.
    pub fn visit_ref(&mut self, reference: Reference) -> Result<()> {
        if !self.visited_refs.insert(reference) {
            return Err(PdfError::CircularReference(reference));
        }
        Ok(())
    }

    pub fn unvisit_ref(&mut self, reference: Reference) {
        self.visited_refs.remove(&reference);
    }
}
