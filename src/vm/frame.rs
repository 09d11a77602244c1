//! Control frames and the execution context.
//!
//! The generated code addresses these structs by raw byte offsets, so their
//! layout is part of the native ABI: `#[repr(C)]`, one machine word per
//! field. Frames live in a downward-growing frame stack (a call subtracts
//! `FRAME_SIZE` from the frame pointer, a return adds it back), while the
//! value stack the frames point into grows upward.

use crate::vm::value::Value;

/// Per-call activation record.
///
/// `ep` points one past the last argument slot, so local `i` lives at
/// `ep - 8*i`.
#[repr(C)]
#[derive(Debug)]
pub struct ControlFrame {
    /// Top of this frame's value stack (first free slot).
    pub sp: *mut Value,
    /// Environment pointer for local variable access.
    pub ep: *mut Value,
    /// Receiver of the current call.
    pub recv: Value,
}

/// Per-thread execution state shared with generated code.
#[repr(C)]
#[derive(Debug)]
pub struct ExecutionContext {
    /// Current control frame; a returning method stores the popped frame
    /// pointer back here.
    pub cfp: *mut ControlFrame,
}

/// Byte offset of `ControlFrame::sp`.
pub const CFP_SP_OFFSET: i32 = std::mem::offset_of!(ControlFrame, sp) as i32;

/// Byte offset of `ControlFrame::ep`.
pub const CFP_EP_OFFSET: i32 = std::mem::offset_of!(ControlFrame, ep) as i32;

/// Byte offset of `ControlFrame::recv`.
pub const CFP_RECV_OFFSET: i32 = std::mem::offset_of!(ControlFrame, recv) as i32;

/// Size of one control frame in bytes.
pub const FRAME_SIZE: i32 = std::mem::size_of::<ControlFrame>() as i32;

/// Byte offset of `ExecutionContext::cfp`.
pub const EC_CFP_OFFSET: i32 = std::mem::offset_of!(ExecutionContext, cfp) as i32;

/// Size of a value-stack slot in bytes.
pub const SLOT_SIZE: i32 = std::mem::size_of::<Value>() as i32;
