//! mjit - a method-level just-in-time compiler.
//!
//! mjit translates a small stack-based bytecode into x86-64 machine code,
//! one method at a time: instructions are decoded and partitioned into
//! basic blocks, each block is lowered with the operand stack mapped onto a
//! fixed register window, forward branches are resolved in a link pass once
//! every block has an address, and all code lands in one shared
//! write-XOR-execute arena.
//!
//! # Primary Usage
//!
//! ```ignore
//! use mjit::{MethodCompiler, MethodRegistry, Method, Opcode, Value, VmThread};
//!
//! let mut registry = MethodRegistry::new();
//! let id = registry.add(Method::new(
//!     vec![
//!         Opcode::PushInt.encode(), 1,
//!         Opcode::PushInt.encode(), 2,
//!         Opcode::Add.encode(),
//!         Opcode::Return.encode(),
//!     ],
//!     0,
//! ));
//!
//! let compiler = MethodCompiler::new()?;
//! let entry = compiler.compile(&registry, id)?;
//!
//! let mut thread = VmThread::new();
//! let result = unsafe { thread.enter(entry, Value::NIL, &[]) };
//! assert_eq!(result.as_fixnum(), 3);
//! ```
//!
//! # Architecture
//!
//! - [`compiler`] - the per-method driver, reentrant for compile-on-demand
//! - [`analyzer`] - basic-block discovery with static stack-depth checks
//! - [`codegen`] - per-block lowering against the register window
//! - [`linker`] - explicit relocation records for conditional branches
//! - [`core`] - shared infrastructure (errors, the executable code arena)
//! - [`vm`] - the host contract (values, frames, opcodes, methods)
//! - [`x64`] - the narrow assembler surface and ABI register assignments

pub mod analyzer;
pub mod codegen;
pub mod compiler;
pub mod core;
pub mod linker;
pub mod vm;
pub mod x64;

pub use crate::core::{CodeArena, CompileError, CompileResult};
pub use analyzer::{Block, BlockExit, BlockId};
pub use compiler::MethodCompiler;
pub use linker::BranchSite;
pub use vm::{CallSite, CompileState, Method, MethodId, MethodRegistry, Opcode, Value, VmThread};
