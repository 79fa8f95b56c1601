//! Offsets of the fields of the execution context record that entry
//! trampolines access directly.

// The execution context is laid out by the host like this:
//
// struct ExecutionContext {
//      exit_code: u64,
//      caller_module_context_ptr: *const u8,
//      original_frame_pointer: usize,
//      original_stack_pointer: usize,
//      host_return_address: usize,
// }
//
// Only the three `original_*`/`host_return_address` fields are touched by
// entry trampolines: they are written in the prologue and read back in the
// epilogue, and the unwinder reads them when compiled code traps.

use core::mem::offset_of;
use serde_derive::{Deserialize, Serialize};

/// The host-owned record through which an entry trampoline hands control
/// state back to the host.
///
/// One record must be used by at most one in-flight call at a time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ExecutionContext {
    /// Set by compiled code when it exits to the host for a reason other than
    /// returning.
    pub exit_code: u64,
    /// The module context of the caller, used by host calls out of compiled
    /// code.
    pub caller_module_context_ptr: u64,
    /// The frame pointer of the host at the moment the trampoline was entered.
    pub original_frame_pointer: u64,
    /// The stack pointer of the host at the moment the trampoline was entered.
    pub original_stack_pointer: u64,
    /// The address the trampoline returns to.
    pub host_return_address: u64,
}

impl ExecutionContext {
    /// The size of the record, in bytes.
    pub const SIZE: u32 = core::mem::size_of::<ExecutionContext>() as u32;
}

/// Byte offsets of the `ExecutionContext` fields used by entry trampolines.
///
/// The defaults mirror the `#[repr(C)]` layout of [`ExecutionContext`]; a
/// host with a different record layout supplies its own offsets through
/// [`crate::Tunables`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionContextOffsets {
    /// Offset of the saved frame pointer.
    pub original_frame_pointer: u32,
    /// Offset of the saved stack pointer.
    pub original_stack_pointer: u32,
    /// Offset of the saved return address.
    pub host_return_address: u32,
}

impl Default for ExecutionContextOffsets {
    fn default() -> Self {
        Self {
            original_frame_pointer: offset_of!(ExecutionContext, original_frame_pointer) as u32,
            original_stack_pointer: offset_of!(ExecutionContext, original_stack_pointer) as u32,
            host_return_address: offset_of!(ExecutionContext, host_return_address) as u32,
        }
    }
}

impl ExecutionContextOffsets {
    /// Iterates over the offsets of every field, in field order.
    pub fn fields(&self) -> [(&'static str, u32); 3] {
        [
            ("original_frame_pointer", self.original_frame_pointer),
            ("original_stack_pointer", self.original_stack_pointer),
            ("host_return_address", self.host_return_address),
        ]
    }

    /// Smallest record size, in bytes, that contains every field.
    pub fn record_size(&self) -> u32 {
        self.fields()
            .iter()
            .map(|(_, offset)| offset + 8)
            .max()
            .unwrap_or(0)
    }
}
