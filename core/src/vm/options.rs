//! Configuration options for the virtual machine.

/// Resource limits for one [`VM`](super::VM) instance.
///
/// # Example
///
/// ```
/// use luna_core::vm::VmOptions;
///
/// let options = VmOptions::default().with_max_call_depth(50);
/// assert_eq!(options.max_call_depth, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmOptions {
    /// Maximum number of register slots across all frames.
    ///
    /// Default: 65536
    pub max_stack_slots: usize,

    /// Maximum number of nested frames, the entry frame included.
    ///
    /// Default: 200
    pub max_call_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            max_stack_slots: 1 << 16,
            max_call_depth: 200,
        }
    }
}

impl VmOptions {
    pub fn with_max_stack_slots(mut self, slots: usize) -> Self {
        self.max_stack_slots = slots;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}
