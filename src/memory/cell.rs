//! Cons cells
//!
//! A cell is two independently typed slots (`car` and `cdr`) plus a
//! flags word reserved for the collector. Each slot is a closed enum
//! so the payload can never disagree with its tag; replacing a slot
//! drops whatever it owned before.

use std::fmt;

use bitflags::bitflags;

use super::{alloc::CellPtr, symbol::SymbolId, value::ValueRef};

bitflags! {
    /// Collector state carried by every cell
    #[derive(Default)]
    pub struct CellFlags: u16 {
        /// Reached during the current mark phase
        const MARKED = 0b0001;
        /// Survived one young collection
        const SURVIVOR1 = 0b0010;
        /// Survived two young collections
        const SURVIVOR2 = 0b0100;
        /// Lives in the old generation
        const PROMOTED = 0b1000;
    }
}

impl CellFlags {
    /// Number of young collections survived so far (saturates at 2)
    pub fn age(self) -> u8 {
        if self.contains(CellFlags::SURVIVOR2) {
            2
        } else if self.contains(CellFlags::SURVIVOR1) {
            1
        } else {
            0
        }
    }

    /// Flags after surviving one more young collection
    pub fn aged(self) -> CellFlags {
        match self.age() {
            0 => self | CellFlags::SURVIVOR1,
            _ => (self - CellFlags::SURVIVOR1) | CellFlags::SURVIVOR2,
        }
    }
}

/// Discriminator for the payload held in a slot
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotTag {
    Nil,
    Int,
    Float,
    Double,
    CellRef,
    ValueRef,
    String,
    Symbol,
}

/// One half of a cell
#[derive(Debug, Default)]
pub enum Slot {
    #[default]
    Nil,
    Int(i32),
    Float(f32),
    Double(f64),
    CellRef(CellPtr),
    ValueRef(ValueRef),
    String(String),
    Symbol(SymbolId),
}

impl Slot {
    pub fn tag(&self) -> SlotTag {
        match self {
            Slot::Nil => SlotTag::Nil,
            Slot::Int(_) => SlotTag::Int,
            Slot::Float(_) => SlotTag::Float,
            Slot::Double(_) => SlotTag::Double,
            Slot::CellRef(_) => SlotTag::CellRef,
            Slot::ValueRef(_) => SlotTag::ValueRef,
            Slot::String(_) => SlotTag::String,
            Slot::Symbol(_) => SlotTag::Symbol,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Slot::Nil)
    }

    /// The cell pointer held in this slot, if any
    pub fn cell_ref(&self) -> Option<CellPtr> {
        match self {
            Slot::CellRef(ptr) => Some(*ptr),
            _ => None,
        }
    }

    /// Mutable access to the cell pointer held in this slot, for
    /// pointer fixup
    pub fn cell_ref_mut(&mut self) -> Option<&mut CellPtr> {
        match self {
            Slot::CellRef(ptr) => Some(ptr),
            _ => None,
        }
    }

    /// Store a payload, overwriting in place when the tag is unchanged
    pub fn set<T: IntoSlot>(&mut self, value: T) {
        value.store(self)
    }

    pub fn clear(&mut self) {
        *self = Slot::Nil;
    }
}

impl Clone for Slot {
    fn clone(&self) -> Self {
        match self {
            Slot::Nil => Slot::Nil,
            Slot::Int(i) => Slot::Int(*i),
            Slot::Float(f) => Slot::Float(*f),
            Slot::Double(d) => Slot::Double(*d),
            Slot::CellRef(c) => Slot::CellRef(*c),
            Slot::ValueRef(v) => Slot::ValueRef(v.clone()),
            Slot::String(s) => Slot::String(s.clone()),
            Slot::Symbol(y) => Slot::Symbol(*y),
        }
    }

    /// Matching string slots reuse the existing buffer
    fn clone_from(&mut self, source: &Self) {
        match (self, source) {
            (Slot::String(dst), Slot::String(src)) => dst.clone_from(src),
            (Slot::ValueRef(dst), Slot::ValueRef(src)) => dst.clone_from(src),
            (dst, src) => *dst = src.clone(),
        }
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Slot::Nil, Slot::Nil) => true,
            (Slot::Int(a), Slot::Int(b)) => a == b,
            (Slot::Float(a), Slot::Float(b)) => a == b,
            (Slot::Double(a), Slot::Double(b)) => a == b,
            (Slot::CellRef(a), Slot::CellRef(b)) => a == b,
            (Slot::ValueRef(a), Slot::ValueRef(b)) => a.ptr_eq(b),
            (Slot::String(a), Slot::String(b)) => a == b,
            (Slot::Symbol(a), Slot::Symbol(b)) => a == b,
            _ => false,
        }
    }
}

/// A payload that can be written into a slot
pub trait IntoSlot {
    fn store(self, slot: &mut Slot);
}

/// A payload that can be read back out of a slot
pub trait FromSlot {
    fn from_slot(slot: &Slot) -> Option<&Self>;
    fn from_slot_mut(slot: &mut Slot) -> Option<&mut Self>;
}

macro_rules! slot_payload {
    ($ty:ty, $variant:ident) => {
        impl IntoSlot for $ty {
            fn store(self, slot: &mut Slot) {
                match slot {
                    Slot::$variant(current) => *current = self,
                    other => *other = Slot::$variant(self),
                }
            }
        }

        impl FromSlot for $ty {
            fn from_slot(slot: &Slot) -> Option<&Self> {
                match slot {
                    Slot::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_slot_mut(slot: &mut Slot) -> Option<&mut Self> {
                match slot {
                    Slot::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

slot_payload!(i32, Int);
slot_payload!(f32, Float);
slot_payload!(f64, Double);
slot_payload!(CellPtr, CellRef);
slot_payload!(ValueRef, ValueRef);
slot_payload!(String, String);
slot_payload!(SymbolId, Symbol);

impl IntoSlot for &str {
    fn store(self, slot: &mut Slot) {
        match slot {
            Slot::String(current) => {
                current.clear();
                current.push_str(self);
            }
            other => *other = Slot::String(self.to_string()),
        }
    }
}

impl FromSlot for str {
    fn from_slot(slot: &Slot) -> Option<&Self> {
        match slot {
            Slot::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn from_slot_mut(slot: &mut Slot) -> Option<&mut Self> {
        match slot {
            Slot::String(s) => Some(s.as_mut_str()),
            _ => None,
        }
    }
}

/// A cons cell
#[derive(Default)]
pub struct Cell {
    car: Slot,
    cdr: Slot,
    flags: CellFlags,
}

impl Cell {
    pub fn new() -> Self {
        Cell::default()
    }

    /// Build a cell from two slots
    pub fn cons(car: Slot, cdr: Slot) -> Self {
        Cell {
            car,
            cdr,
            flags: CellFlags::empty(),
        }
    }

    pub fn set_car<T: IntoSlot>(&mut self, value: T) {
        self.car.set(value)
    }

    pub fn set_cdr<T: IntoSlot>(&mut self, value: T) {
        self.cdr.set(value)
    }

    pub fn set_car_nil(&mut self) {
        self.car.clear()
    }

    pub fn set_cdr_nil(&mut self) {
        self.cdr.clear()
    }

    /// Typed view of the car, `None` when the tag does not match
    pub fn car<T: FromSlot + ?Sized>(&self) -> Option<&T> {
        T::from_slot(&self.car)
    }

    /// Typed view of the cdr, `None` when the tag does not match
    pub fn cdr<T: FromSlot + ?Sized>(&self) -> Option<&T> {
        T::from_slot(&self.cdr)
    }

    pub fn car_mut<T: FromSlot + ?Sized>(&mut self) -> Option<&mut T> {
        T::from_slot_mut(&mut self.car)
    }

    pub fn cdr_mut<T: FromSlot + ?Sized>(&mut self) -> Option<&mut T> {
        T::from_slot_mut(&mut self.cdr)
    }

    pub fn car_is_nil(&self) -> bool {
        self.car.is_nil()
    }

    pub fn cdr_is_nil(&self) -> bool {
        self.cdr.is_nil()
    }

    pub fn car_tag(&self) -> SlotTag {
        self.car.tag()
    }

    pub fn cdr_tag(&self) -> SlotTag {
        self.cdr.tag()
    }

    pub fn car_slot(&self) -> &Slot {
        &self.car
    }

    pub fn cdr_slot(&self) -> &Slot {
        &self.cdr
    }

    /// Both slots, for the collector
    pub fn slots_mut(&mut self) -> [&mut Slot; 2] {
        [&mut self.car, &mut self.cdr]
    }

    /// Cell pointers held in either slot
    pub fn references(&self) -> impl Iterator<Item = CellPtr> + '_ {
        self.car
            .cell_ref()
            .into_iter()
            .chain(self.cdr.cell_ref())
    }

    /// Move the contents out, leaving `Nil`/`Nil` with no flags behind
    pub fn take(&mut self) -> Cell {
        std::mem::take(self)
    }

    pub fn flags(&self) -> CellFlags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut CellFlags {
        &mut self.flags
    }

    pub fn is_marked(&self) -> bool {
        self.flags.contains(CellFlags::MARKED)
    }

    /// Mark the cell and report whether it was previously unmarked
    pub fn mark(&mut self) -> bool {
        let fresh = !self.is_marked();
        self.flags.insert(CellFlags::MARKED);
        fresh
    }

    pub fn unmark(&mut self) {
        self.flags.remove(CellFlags::MARKED);
    }
}

impl Clone for Cell {
    fn clone(&self) -> Self {
        Cell {
            car: self.car.clone(),
            cdr: self.cdr.clone(),
            flags: self.flags,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.car.clone_from(&source.car);
        self.cdr.clone_from(&source.cdr);
        self.flags = source.flags;
    }
}

/// Content equality: tags and payloads, ignoring collector flags
impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.car == other.car && self.cdr == other.cdr
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?} . {:?}) [{:?}]", self.car, self.cdr, self.flags)
    }
}
