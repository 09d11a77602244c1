//! Deferred branch resolution.
//!
//! A conditional branch cannot be encoded while its successors have no
//! addresses, so generation reserves an arena slot sized against
//! worst-case placeholder targets and records an explicit relocation:
//! slot address, reserved length, tested register, successor block ids.
//! After every block of the method is emitted, `link_branches` re-assembles
//! each slot against the now-known addresses and patches it in place
//! through the arena's scoped cursor. The emitted sequence always ends in
//! an unconditional jump, so a relink that encodes shorter leaves only
//! unreachable bytes behind it.

use crate::analyzer::{Block, BlockId};
use crate::core::arena::CodeArena;
use crate::core::error::{CompileError, CompileResult};
use crate::vm::value::Value;
use crate::x64::{MethodAssembler, Reg};

/// Relocation record for one conditional branch site.
#[derive(Debug)]
pub struct BranchSite {
    /// Arena address of the reserved slot.
    pub patch_addr: u64,
    /// Slot size reserved at generation time.
    pub reserved_len: usize,
    /// Register holding the tested value.
    pub value: Reg,
    /// Block to jump to when the value is falsy.
    pub target: BlockId,
    /// Block control falls into otherwise.
    pub fallthrough: BlockId,
}

/// Assemble the branch-on-falsy sequence at `base`: compare the value
/// against tagged `false` and tagged `nil`, jump to `target` on either
/// match, jump to `fallthrough` otherwise.
pub fn emit_branch_code(
    value: Reg,
    target: u64,
    fallthrough: u64,
    base: u64,
) -> CompileResult<Vec<u8>> {
    let mut asm = MethodAssembler::new()?;
    asm.cmp_reg_imm(value, Value::FALSE.raw() as i32)?;
    asm.je_addr(target)?;
    asm.cmp_reg_imm(value, Value::NIL.raw() as i32)?;
    asm.je_addr(target)?;
    asm.jmp_addr(fallthrough)?;
    Ok(asm.assemble(base)?)
}

/// Patch every recorded site now that block addresses are known.
///
/// A successor that was discovered but never emitted is a typed error; a
/// placeholder target never survives a successful compile.
pub fn link_branches(
    arena: &mut CodeArena,
    blocks: &[Block],
    sites: &[BranchSite],
) -> CompileResult<()> {
    for site in sites {
        let target = block_addr(blocks, site.target)?;
        let fallthrough = block_addr(blocks, site.fallthrough)?;
        let bytes = emit_branch_code(site.value, target, fallthrough, site.patch_addr)?;
        if bytes.len() > site.reserved_len {
            return Err(CompileError::BranchSlotOverflow {
                patched: bytes.len(),
                reserved: site.reserved_len,
            });
        }
        log::trace!(
            "patching branch slot at {:#x}: target {target:#x}, fallthrough {fallthrough:#x}",
            site.patch_addr
        );
        arena.with_position(site.patch_addr, |a| a.write(&bytes))?;
    }
    Ok(())
}

fn block_addr(blocks: &[Block], id: BlockId) -> CompileResult<u64> {
    blocks
        .get(id)
        .and_then(|b| b.addr)
        .ok_or(CompileError::UnresolvedBranchTarget { block: id })
}
