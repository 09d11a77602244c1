//! x86-64 architecture-specific components.
//!
//! This module contains all x86-64 specific code:
//! - The narrow assembler surface over iced-x86
//! - The native calling-convention register assignments
//! - Diagnostic disassembly of emitted bytes

pub mod assembler;
pub mod disasm;

pub use assembler::{EncodingError, MethodAssembler, Reg};

/// Register carrying the execution-context pointer across calls.
pub const EC: Reg = Reg::Rdi;

/// Register carrying the current control-frame pointer across calls.
pub const CFP: Reg = Reg::Rsi;

/// Scratch register; also the native return-value register.
pub const SCRATCH: Reg = Reg::Rax;

/// Second scratch register for the call sequence.
pub const SCRATCH2: Reg = Reg::Rcx;

/// The fixed register window the operand stack is mapped onto. Depth `d`
/// lives in `STACK_REGS[d]`; there is no spill path past the window.
pub const STACK_REGS: [Reg; 4] = [Reg::R8, Reg::R9, Reg::R10, Reg::R11];

/// Number of operand-stack slots the window can hold.
pub const STACK_WINDOW: usize = STACK_REGS.len();
