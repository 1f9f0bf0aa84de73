//! Newtype for class indices.
//!
//! Normalized-center labels store a zero-based index into the dataset's class
//! catalog; the other formats store names or dataset-specific codes. Keeping
//! the index in its own type stops it being confused with a raw format code.

use std::fmt;

/// A zero-based position in a [`ClassCatalog`](super::ClassCatalog).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub usize);

impl ClassId {
    #[inline]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for ClassId {
    fn from(index: usize) -> Self {
        ClassId::new(index)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
