//! Closures and their upvalues.
//!
//! An upvalue starts *open*: it names an absolute slot of the register
//! stack, so writes through the closure and writes through the owning frame
//! see the same storage. When the owning frame is popped (or `CLOSE` runs)
//! the slot's value is copied into the upvalue, which becomes *closed* and
//! owns the value from then on.

use core::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use super::error::BoundsError;
use super::stack::CallStack;
use crate::value::Value;

pub type UpvalueRef = Rc<RefCell<Upvalue>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Upvalue {
    /// Still backed by a live stack slot.
    Open { slot: usize },
    /// Detached copy, owned by the upvalue.
    Closed(Value),
}

/// A function instantiated with its captured upvalues.
#[derive(Debug)]
pub struct Closure {
    /// Index into the module's function list.
    pub function: usize,
    pub upvalues: SmallVec<[UpvalueRef; 4]>,
}

impl Closure {
    pub fn new(function: usize, upvalues: impl IntoIterator<Item = UpvalueRef>) -> Self {
        Closure {
            function,
            upvalues: upvalues.into_iter().collect(),
        }
    }

    pub fn upvalue(&self, index: usize) -> Option<&UpvalueRef> {
        self.upvalues.get(index)
    }
}

/// Builds a closure over `function`, capturing registers `0..count` of the
/// current frame as open upvalues.
///
/// A register that already has an open upvalue is shared rather than
/// captured twice, so sibling closures observe each other's writes.
pub fn make_closure(
    stack: &mut CallStack,
    function: usize,
    count: usize,
) -> Result<Closure, BoundsError> {
    let (base, size) = stack.window();
    if count > size {
        return Err(BoundsError::Register {
            index: count as i64 - 1,
            size,
        });
    }
    let upvalues: SmallVec<[UpvalueRef; 4]> =
        (0..count).map(|r| stack.capture(base + r)).collect();
    Ok(Closure { function, upvalues })
}
