// This module holds the method registry side of the host contract: Method owns one
// instruction sequence plus its argument count, and tracks compilation through a
// tri-state Cell (Uncompiled -> Compiling -> Compiled(entry)). The tri-state replaces
// a bare settable-once entry field so the driver can detect re-entry into a method
// that is already on the compilation stack and fail with a typed cycle error instead
// of recursing forever on mutually recursive methods. MethodRegistry resolves call
// operands to call-site metadata (argument count + target), mirroring how the host VM
// resolves call data at a send site. Interior mutability keeps the whole compile path
// on shared references, which is what makes the driver's recursive compile-on-demand
// re-entry work on a single call stack.

//! Methods, the method registry, and compilation state.

use crate::core::error::{CompileError, CompileResult};
use std::cell::Cell;

/// Identifies a method in the registry. Call operands carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub u32);

/// Compilation status of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileState {
    Uncompiled,
    /// On the compilation stack right now; re-entry means a call cycle.
    Compiling,
    /// Fully emitted and linked; the address is the native entry point.
    Compiled(u64),
}

/// One method's instruction sequence plus its compilation state.
#[derive(Debug)]
pub struct Method {
    insns: Vec<u64>,
    argc: usize,
    state: Cell<CompileState>,
}

impl Method {
    pub fn new(insns: Vec<u64>, argc: usize) -> Self {
        Self {
            insns,
            argc,
            state: Cell::new(CompileState::Uncompiled),
        }
    }

    /// The encoded instruction words.
    pub fn insns(&self) -> &[u64] {
        &self.insns
    }

    /// Number of arguments a caller passes (receiver not included).
    pub fn argc(&self) -> usize {
        self.argc
    }

    pub fn state(&self) -> CompileState {
        self.state.get()
    }

    /// The native entry point, present only after a fully linked compile.
    pub fn native_entry(&self) -> Option<u64> {
        match self.state.get() {
            CompileState::Compiled(addr) => Some(addr),
            _ => None,
        }
    }

    pub(crate) fn set_state(&self, state: CompileState) {
        self.state.set(state);
    }
}

/// Call-site metadata resolved from a call instruction's operand.
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub argc: usize,
    pub target: MethodId,
}

/// Owns every method the host has handed to the JIT.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    methods: Vec<Method>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method and hand back its id for use in call operands.
    pub fn add(&mut self, method: Method) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        self.methods.push(method);
        id
    }

    pub fn get(&self, id: MethodId) -> CompileResult<&Method> {
        self.methods
            .get(id.0 as usize)
            .ok_or(CompileError::MethodNotFound(id))
    }

    /// Resolve a call instruction's operand to its argument count and
    /// target method.
    pub fn resolve_call(&self, operand: u64) -> CompileResult<CallSite> {
        let target = MethodId(operand as u32);
        let method = self.get(target)?;
        Ok(CallSite {
            argc: method.argc(),
            target,
        })
    }
}
