//! Output arena owning materialized measurements after they leave the stage.
//!
//! The stage places each sampled document here and hands the pipeline an
//! [`OutputHandle`]. Handles are small, `Copy`, and never reused within one
//! arena, so a stale handle simply finds nothing.

use crate::materializer::Document;
use std::collections::HashMap;

/// Opaque reference to a document held by an [`OutputArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct OutputHandle(u64);

impl OutputHandle {
    /// Underlying numeric value, mainly for debugging.
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// Single-owner pool of output documents.
#[derive(Debug, Default)]
pub struct OutputArena {
    next_id: u64,
    docs: HashMap<OutputHandle, Document>,
}

impl OutputArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `doc` and return its handle.
    pub fn insert(&mut self, doc: Document) -> OutputHandle {
        let handle = OutputHandle(self.next_id);
        self.next_id += 1;
        self.docs.insert(handle, doc);
        handle
    }

    #[must_use]
    pub fn get(&self, handle: OutputHandle) -> Option<&Document> {
        self.docs.get(&handle)
    }

    /// Move the document out of the arena.
    pub fn take(&mut self, handle: OutputHandle) -> Option<Document> {
        self.docs.remove(&handle)
    }

    /// Drop the document. Returns whether it was still present.
    pub fn free(&mut self, handle: OutputHandle) -> bool {
        self.docs.remove(&handle).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
