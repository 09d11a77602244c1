// This module defines the error types for the JIT compilation pipeline using the
// thiserror crate for idiomatic Rust error handling. CompileError covers every failure
// class the pipeline can hit: unsupported instruction words at decode time, operand
// stack violations caught at partition time, missing terminators and bad branch
// targets, method registry lookups, compile-cycle detection for mutually recursive
// methods, code arena capacity and protection failures, unresolved branch targets at
// link time, and assembler errors bubbling up from the x86-64 layer. Every variant is
// locally recoverable by the embedder; the library never aborts the process, and no
// error path leaves a partially emitted method reachable as an entry point. The module
// also provides CompileResult<T> as a convenience alias for Result<T, CompileError>.

//! Error types for the method JIT.
//!
//! Using thiserror for more idiomatic error handling.

use crate::vm::method::MethodId;
use crate::x64::assembler::EncodingError;
use thiserror::Error;

/// Main error type for method compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("unsupported instruction word {word:#x} at index {index}")]
    UnsupportedInstruction { word: u64, index: usize },

    #[error("operand stack depth {depth} exceeds the {limit}-register window at index {index}")]
    StackOverflow {
        index: usize,
        depth: usize,
        limit: usize,
    },

    #[error("operand stack underflow at index {index}")]
    StackUnderflow { index: usize },

    #[error("instruction sequence runs past index {index} without a return")]
    MissingReturn { index: usize },

    #[error("branch target {target} is outside the instruction sequence")]
    InvalidBranchTarget { target: usize },

    #[error("method {0:?} is not registered")]
    MethodNotFound(MethodId),

    #[error("method {0:?} is already being compiled (recursive call cycle)")]
    CompileCycle(MethodId),

    #[error("code arena exhausted: {requested} bytes requested, {remaining} remaining")]
    ArenaExhausted { requested: usize, remaining: usize },

    #[error("address {addr:#x} is outside the written code arena range")]
    AddressOutOfArena { addr: u64 },

    #[error("branch to block {block} whose code was never emitted")]
    UnresolvedBranchTarget { block: usize },

    #[error("patched branch sequence ({patched} bytes) exceeds its reserved slot ({reserved} bytes)")]
    BranchSlotOverflow { patched: usize, reserved: usize },

    #[error("assembler error: {0}")]
    Assembler(#[from] EncodingError),

    #[error("failed to {op} code arena memory: {source}")]
    ArenaProtection {
        op: &'static str,
        source: std::io::Error,
    },
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
