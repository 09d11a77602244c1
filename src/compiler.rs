// This module is the per-method orchestrator. compile() checks the method's tri-state
// first: an already-compiled method returns its cached entry (the entry address is
// published exactly once, recompilation never re-emits), and a method already marked
// compiling means the call graph re-entered it on the same stack, which is reported
// as a typed cycle error instead of recursing forever. Otherwise the method is marked
// compiling, partitioned into blocks, each block is generated in discovery order, the
// branch linker patches every reserved slot, and only then is block 0's address
// published as the native entry point. Any failure along the way resets the method to
// uncompiled so a half-written method is never reachable. compile() takes &self -
// the arena sits behind a mutex and method states are interior-mutable - which is
// what lets a call instruction's compile-on-demand re-enter the driver synchronously
// while the caller's block is still being generated.

//! The compiler driver.

use crate::analyzer::partition;
use crate::codegen::BlockCodegen;
use crate::core::arena::CodeArena;
use crate::core::error::{CompileError, CompileResult};
use crate::linker::link_branches;
use crate::vm::method::{CompileState, Method, MethodId, MethodRegistry};
use crate::x64::disasm;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Compiles methods on demand into one shared code arena.
pub struct MethodCompiler {
    arena: Mutex<CodeArena>,
}

impl MethodCompiler {
    /// Create a compiler with the default 1 MiB arena.
    pub fn new() -> CompileResult<Self> {
        Ok(Self {
            arena: Mutex::new(CodeArena::new()?),
        })
    }

    /// Create a compiler with an arena of the given capacity.
    pub fn with_arena_capacity(capacity: usize) -> CompileResult<Self> {
        Ok(Self {
            arena: Mutex::new(CodeArena::with_capacity(capacity)?),
        })
    }

    /// Compile a method and return its native entry address.
    ///
    /// Reentrant: generating a call instruction for an uncompiled callee
    /// invokes `compile` again before the caller's block finishes. A method
    /// found in the `Compiling` state is a call cycle and fails; nothing is
    /// published for any method on the failing path.
    pub fn compile(&self, registry: &MethodRegistry, id: MethodId) -> CompileResult<u64> {
        let method = registry.get(id)?;
        match method.state() {
            CompileState::Compiled(entry) => return Ok(entry),
            CompileState::Compiling => return Err(CompileError::CompileCycle(id)),
            CompileState::Uncompiled => {}
        }

        log::debug!("compiling method {id:?} ({} words)", method.insns().len());
        method.set_state(CompileState::Compiling);
        match self.compile_method(registry, method) {
            Ok(entry) => {
                method.set_state(CompileState::Compiled(entry));
                log::debug!("method {id:?} entry at {entry:#x}");
                Ok(entry)
            }
            Err(err) => {
                method.set_state(CompileState::Uncompiled);
                Err(err)
            }
        }
    }

    fn compile_method(&self, registry: &MethodRegistry, method: &Method) -> CompileResult<u64> {
        let mut blocks = partition(method.insns(), registry)?;
        let codegen = BlockCodegen {
            compiler: self,
            registry,
            insns: method.insns(),
        };

        let mut entry = 0;
        let mut sites = Vec::new();
        for id in 0..blocks.len() {
            let emitted = codegen.emit(&blocks[id])?;
            blocks[id].addr = Some(emitted.addr);
            sites.extend(emitted.branch);
            if id == 0 {
                entry = emitted.addr;
            }
        }

        link_branches(&mut self.lock_arena(), &blocks, &sites)?;
        Ok(entry)
    }

    /// Total bytes of code emitted so far.
    pub fn code_size(&self) -> usize {
        self.lock_arena().written().len()
    }

    /// Address of the first byte of the code arena.
    pub fn code_base(&self) -> u64 {
        self.lock_arena().base()
    }

    /// Disassembly of everything emitted at or after `from`. Diagnostic
    /// only.
    pub fn disassembly(&self, from: u64) -> CompileResult<Vec<String>> {
        let arena = self.lock_arena();
        let offset = from
            .checked_sub(arena.base())
            .filter(|&o| o <= arena.written().len() as u64)
            .ok_or(CompileError::AddressOutOfArena { addr: from })?;
        Ok(disasm::disassemble(&arena.written()[offset as usize..], from))
    }

    pub(crate) fn lock_arena(&self) -> MutexGuard<'_, CodeArena> {
        self.arena.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
