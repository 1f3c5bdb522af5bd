//! Cons cell storage and generational garbage collection
pub mod alloc;
pub mod cell;
pub mod collect;
pub mod compact;
pub mod heap;
pub mod mark;
pub mod relocate;
pub mod roots;
pub mod settings;
pub mod stats;
pub mod symbol;
pub mod value;
