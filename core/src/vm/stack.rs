//! The register stack and its call frames.

use core::cell::RefCell;
use core::ops::Range;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::trace;

use super::closure::{Upvalue, UpvalueRef};
use super::error::BoundsError;
use crate::value::{ClosureRef, Value};

/// Where a callee's results land in its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReturnRange {
    /// First destination register, relative to the caller's base.
    pub base: usize,
    /// Number of results wanted; `None` takes every returned value.
    pub count: Option<usize>,
}

/// Bookkeeping for one active invocation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Index into the module's function list.
    pub function: usize,
    /// Closure being executed; `None` for the entry function.
    pub closure: Option<ClosureRef>,
    /// Address of the next instruction.
    pub ip: usize,
    /// Absolute index of register 0.
    pub base: usize,
    /// Number of registers in the window.
    pub size: usize,
    pub ret: ReturnRange,
}

/// One growable register stack shared by every frame.
///
/// Frame N owns the window `[base_N, base_N + size_N)`. Frames are strictly
/// nested, so the top frame's window always ends at the top of the stack.
#[derive(Debug)]
pub struct CallStack {
    slots: Vec<Value>,
    frames: Vec<Frame>,
    /// Open upvalues, sorted by slot.
    open_upvalues: Vec<UpvalueRef>,
    max_slots: usize,
}

impl CallStack {
    /// Creates an empty stack that may hold at most `max_slots` registers.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use luna_core::vm::CallStack;
    ///
    /// let stack = CallStack::new(1024);
    /// assert_eq!(stack.depth(), 0);
    /// assert_eq!(stack.len(), 0);
    /// ```
    pub fn new(max_slots: usize) -> Self {
        CallStack {
            slots: Vec::new(),
            frames: Vec::new(),
            open_upvalues: Vec::new(),
            max_slots,
        }
    }

    /// Opens a window of `size` registers, all `Nil`, above the current top.
    ///
    /// Returns [`BoundsError::StackOverflow`] if the stack would grow past
    /// its limit; the stack is left unchanged in that case.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use luna_core::vm::{CallStack, ReturnRange};
    ///
    /// let mut stack = CallStack::new(8);
    /// stack.push_frame(0, 4, None, ReturnRange::default())?;
    /// stack.push_frame(1, 4, None, ReturnRange::default())?;
    /// assert_eq!(stack.window(), (4, 4));
    /// assert!(stack.push_frame(2, 1, None, ReturnRange::default()).is_err());
    /// ```
    pub fn push_frame(
        &mut self,
        function: usize,
        size: usize,
        closure: Option<ClosureRef>,
        ret: ReturnRange,
    ) -> Result<(), BoundsError> {
        let base = self.slots.len();
        let requested = base + size;
        if requested > self.max_slots {
            return Err(BoundsError::StackOverflow {
                requested,
                limit: self.max_slots,
            });
        }
        self.slots.resize(requested, Value::Nil);
        self.frames.push(Frame {
            function,
            closure,
            ip: 0,
            base,
            size,
            ret,
        });
        Ok(())
    }

    /// Pops the current frame, copying its registers `returned` into the
    /// caller.
    ///
    /// The caller receives exactly `ret.count` values at `ret.base` (or every
    /// returned value if the count is open); missing values are `Nil` and
    /// surplus values are dropped. Caller registers outside that range are
    /// left as they were. Upvalues pointing into the popped window are
    /// closed first.
    pub fn pop_frame(&mut self, returned: Range<usize>) -> Result<Frame, BoundsError> {
        let (base, size) = self.window();
        if returned.end > size {
            return Err(BoundsError::Register {
                index: returned.end as i64 - 1,
                size,
            });
        }
        let ret = self.current().ok_or(BoundsError::NoFrame)?.ret;
        let wanted = ret.count.unwrap_or(returned.len());

        // Check the destination before anything is torn down.
        if let Some(caller) = self.frames.iter().rev().nth(1) {
            let end = ret.base + wanted;
            if end > caller.size {
                return Err(BoundsError::Register {
                    index: end as i64 - 1,
                    size: caller.size,
                });
            }
        }

        let values: SmallVec<[Value; 8]> = self
            .slots
            .get(base + returned.start..base + returned.end)
            .unwrap_or_default()
            .iter()
            .cloned()
            .collect();
        let frame = self.discard_frame().ok_or(BoundsError::NoFrame)?;
        if self.frames.is_empty() {
            return Ok(frame);
        }

        let (caller_base, _) = self.window();
        for i in 0..wanted {
            self.slots[caller_base + ret.base + i] = values.get(i).cloned().unwrap_or_default();
        }
        Ok(frame)
    }

    /// Pops the current frame without transferring results.
    pub fn discard_frame(&mut self) -> Option<Frame> {
        let frame = self.frames.pop()?;
        self.close_upvalues(frame.base);
        self.slots.truncate(frame.base);
        Some(frame)
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Total number of allocated register slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// `(base, size)` of the current frame, or `(0, 0)` with no frame.
    pub fn window(&self) -> (usize, usize) {
        self.frames
            .last()
            .map_or((0, 0), |frame| (frame.base, frame.size))
    }

    /// Registers of the current frame.
    pub fn registers(&self) -> &[Value] {
        let (base, size) = self.window();
        &self.slots[base..base + size]
    }

    fn slot_index(&self, index: i32) -> Result<usize, BoundsError> {
        let (base, size) = self.window();
        match usize::try_from(index) {
            Ok(i) if i < size => Ok(base + i),
            _ => Err(BoundsError::Register {
                index: index as i64,
                size,
            }),
        }
    }

    /// Reads register `index` of the current frame.
    pub fn reg(&self, index: i32) -> Result<&Value, BoundsError> {
        let slot = self.slot_index(index)?;
        Ok(&self.slots[slot])
    }

    /// Writes register `index` of the current frame.
    pub fn set_reg(&mut self, index: i32, value: Value) -> Result<(), BoundsError> {
        let slot = self.slot_index(index)?;
        self.slots[slot] = value;
        Ok(())
    }

    /// Returns the open upvalue for absolute `slot`, creating it if needed.
    pub fn capture(&mut self, slot: usize) -> UpvalueRef {
        match self
            .open_upvalues
            .binary_search_by_key(&slot, |up| open_slot(up))
        {
            Ok(i) => self.open_upvalues[i].clone(),
            Err(i) => {
                let up = Rc::new(RefCell::new(Upvalue::Open { slot }));
                self.open_upvalues.insert(i, up.clone());
                up
            }
        }
    }

    /// Closes every open upvalue at or above absolute slot `level`.
    pub fn close_upvalues(&mut self, level: usize) {
        let split = self
            .open_upvalues
            .partition_point(|up| open_slot(up) < level);
        if split == self.open_upvalues.len() {
            return;
        }
        trace!(level, count = self.open_upvalues.len() - split, "closing upvalues");
        for up in self.open_upvalues.drain(split..) {
            let mut cell = up.borrow_mut();
            if let Upvalue::Open { slot } = *cell {
                *cell = Upvalue::Closed(self.slots.get(slot).cloned().unwrap_or_default());
            }
        }
    }

    pub fn open_upvalue_count(&self) -> usize {
        self.open_upvalues.len()
    }

    pub fn read_upvalue(&self, up: &UpvalueRef) -> Value {
        match &*up.borrow() {
            Upvalue::Open { slot } => self.slots.get(*slot).cloned().unwrap_or_default(),
            Upvalue::Closed(value) => value.clone(),
        }
    }

    pub fn write_upvalue(&mut self, up: &UpvalueRef, value: Value) {
        match &mut *up.borrow_mut() {
            Upvalue::Open { slot } => {
                if let Some(target) = self.slots.get_mut(*slot) {
                    *target = value;
                }
            }
            Upvalue::Closed(stored) => *stored = value,
        }
    }
}

fn open_slot(up: &UpvalueRef) -> usize {
    match *up.borrow() {
        Upvalue::Open { slot } => slot,
        Upvalue::Closed(_) => usize::MAX,
    }
}
