//! References to externally managed values
//!
//! Cells can hold an owning reference to an object whose lifetime is
//! managed by reference counting rather than by the collector. The
//! collector only ever moves these references; it never looks inside.
//! An external value that itself holds cell pointers must register
//! them with [`Heap::add_owned_root`](super::heap::Heap::add_owned_root)
//! and keep the returned `OwnedRoot`; dropping the value then releases
//! the root.

use std::{fmt, rc::Rc};

/// An object referenced from cells but owned elsewhere
pub trait ExternalValue {
    /// Short description of the kind of value (e.g. "proc", "file")
    fn name(&self) -> &str;
}

/// Counted reference to an external value
///
/// Cloning increments and dropping decrements the count.
#[derive(Clone)]
pub struct ValueRef(Rc<dyn ExternalValue>);

impl ValueRef {
    pub fn new<V: ExternalValue + 'static>(value: V) -> Self {
        ValueRef(Rc::new(value))
    }

    pub fn from_rc(rc: Rc<dyn ExternalValue>) -> Self {
        ValueRef(rc)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Number of strong references currently held
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ValueRef) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }
}

impl fmt::Debug for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} x{}>", self.name(), self.ref_count())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    struct File;

    impl ExternalValue for File {
        fn name(&self) -> &str {
            "file"
        }
    }

    #[test]
    pub fn test_counting() {
        let v = ValueRef::new(File);
        assert_eq!(v.ref_count(), 1);
        let w = v.clone();
        assert_eq!(v.ref_count(), 2);
        assert!(v.ptr_eq(&w));
        drop(w);
        assert_eq!(v.ref_count(), 1);
        assert_eq!(v.name(), "file");
        assert_eq!(format!("{:?}", v), "<file x1>");
    }

    #[test]
    pub fn test_distinct_values_differ() {
        let v = ValueRef::new(File);
        let w = ValueRef::new(File);
        assert!(!v.ptr_eq(&w));
    }
}
