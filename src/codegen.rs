// This module turns one basic block into native code. Each block gets its own
// assembler and is lowered instruction by instruction at the block's entry stack
// depth, with the abstract operand stack mapped onto the fixed register window
// r8-r11. Constants are materialized as tagged immediates; add/sub operate on tagged
// small integers with a one-off tag correction; the less-than comparison materializes
// tagged false into the destination and tagged true into the scratch register, then
// conditionally moves the true value in, so the common path never branches. A call
// instruction first makes sure the callee has a native entry (recursively invoking
// the driver if it does not), then builds the callee frame inline: it spills the
// receiver and arguments from stack registers into the callee's value-stack area,
// advances the stack pointer past them, pushes a control frame, fills in its
// sp/ep/receiver fields, saves the register window around the native call and writes
// the returned value back into the receiver's slot. The block body is assembled only
// after any embedded callee compilation has finished, so its base address is simply
// the arena cursor at write time; a trailing conditional branch reserves a
// placeholder slot for the linker instead of encoding jump targets here.

//! Native code generation for one basic block.

use crate::analyzer::{Block, BlockExit};
use crate::compiler::MethodCompiler;
use crate::core::error::{CompileError, CompileResult};
use crate::linker::{emit_branch_code, BranchSite};
use crate::vm::frame::{
    CFP_EP_OFFSET, CFP_RECV_OFFSET, CFP_SP_OFFSET, EC_CFP_OFFSET, FRAME_SIZE, SLOT_SIZE,
};
use crate::vm::method::MethodRegistry;
use crate::vm::opcode::Opcode;
use crate::vm::value::Value;
use crate::x64::{MethodAssembler, CFP, EC, SCRATCH, SCRATCH2, STACK_REGS};

/// Result of emitting one block into the arena.
pub(crate) struct EmittedBlock {
    /// Address of the block's first byte.
    pub addr: u64,
    /// Relocation record for the trailing branch, if the block has one.
    pub branch: Option<BranchSite>,
}

/// Generates code for the blocks of a single method.
pub(crate) struct BlockCodegen<'a> {
    pub compiler: &'a MethodCompiler,
    pub registry: &'a MethodRegistry,
    pub insns: &'a [u64],
}

impl BlockCodegen<'_> {
    /// Emit one block's body, write it to the arena, and reserve its branch
    /// slot when the block ends in a conditional branch.
    pub fn emit(&self, block: &Block) -> CompileResult<EmittedBlock> {
        let mut asm = MethodAssembler::new()?;
        let mut depth = block.entry_depth;
        let mut index = block.start;

        while index < block.end {
            let op = Opcode::decode(self.insns[index], index)?;
            log::trace!("emit {op:?} at word {index}, depth {depth}");
            match op {
                Opcode::Nop => {}
                Opcode::PushNil => {
                    asm.mov_reg_imm(STACK_REGS[depth], Value::NIL.raw())?;
                    depth += 1;
                }
                Opcode::PushTrue => {
                    asm.mov_reg_imm(STACK_REGS[depth], Value::TRUE.raw())?;
                    depth += 1;
                }
                Opcode::PushFalse => {
                    asm.mov_reg_imm(STACK_REGS[depth], Value::FALSE.raw())?;
                    depth += 1;
                }
                Opcode::PushInt => {
                    let literal = self.operand(index)? as i64;
                    asm.mov_reg_imm(STACK_REGS[depth], Value::fixnum(literal).raw())?;
                    depth += 1;
                }
                Opcode::PushSelf => {
                    asm.mov_reg_mem(STACK_REGS[depth], CFP, CFP_RECV_OFFSET)?;
                    depth += 1;
                }
                Opcode::LoadLocal => {
                    let slot = self.operand(index)? as i32;
                    asm.mov_reg_mem(SCRATCH, CFP, CFP_EP_OFFSET)?;
                    asm.mov_reg_mem(STACK_REGS[depth], SCRATCH, -(SLOT_SIZE * slot))?;
                    depth += 1;
                }
                Opcode::Add => {
                    let lhs = STACK_REGS[depth - 2];
                    let rhs = STACK_REGS[depth - 1];
                    asm.add_reg_reg(lhs, rhs)?;
                    // (2a+1) + (2b+1) carries both tag bits; drop one.
                    asm.sub_reg_imm(lhs, 1)?;
                    depth -= 1;
                }
                Opcode::Sub => {
                    let lhs = STACK_REGS[depth - 2];
                    let rhs = STACK_REGS[depth - 1];
                    asm.sub_reg_reg(lhs, rhs)?;
                    asm.add_reg_imm(lhs, 1)?;
                    depth -= 1;
                }
                Opcode::Lt => {
                    let lhs = STACK_REGS[depth - 2];
                    let rhs = STACK_REGS[depth - 1];
                    // The moves leave the flags alone; the scratch register
                    // is written after the compare and read only by cmovl.
                    asm.cmp_reg_reg(lhs, rhs)?;
                    asm.mov_reg_imm(lhs, Value::FALSE.raw())?;
                    asm.mov_reg_imm(SCRATCH, Value::TRUE.raw())?;
                    asm.cmovl_reg_reg(lhs, SCRATCH)?;
                    depth -= 1;
                }
                Opcode::BranchUnless => {
                    // The tested value stays resident in its register; the
                    // comparison sequence lives in the reserved slot.
                    depth -= 1;
                }
                Opcode::Return => {
                    asm.add_reg_imm(CFP, FRAME_SIZE)?;
                    asm.mov_mem_reg(EC, EC_CFP_OFFSET, CFP)?;
                    asm.mov_reg_reg(SCRATCH, STACK_REGS[depth - 1])?;
                    asm.ret()?;
                    depth -= 1;
                }
                Opcode::Call => {
                    let site = self.registry.resolve_call(self.operand(index)?)?;
                    // Compile on demand: the callee needs a concrete entry
                    // address before this call can be encoded.
                    let entry = self.compiler.compile(self.registry, site.target)?;

                    let recv_slot = depth - 1 - site.argc;
                    asm.mov_reg_mem(SCRATCH, CFP, CFP_SP_OFFSET)?;
                    for i in 0..=site.argc {
                        asm.mov_mem_reg(SCRATCH, SLOT_SIZE * i as i32, STACK_REGS[recv_slot + i])?;
                    }
                    asm.add_reg_imm(SCRATCH, SLOT_SIZE * (site.argc as i32 + 1))?;
                    asm.sub_reg_imm(CFP, FRAME_SIZE)?;
                    asm.mov_mem_reg(CFP, CFP_SP_OFFSET, SCRATCH)?;
                    asm.mov_mem_reg(CFP, CFP_EP_OFFSET, SCRATCH)?;
                    asm.mov_reg_reg(SCRATCH2, STACK_REGS[recv_slot])?;
                    asm.mov_mem_reg(CFP, CFP_RECV_OFFSET, SCRATCH2)?;

                    for reg in STACK_REGS {
                        asm.push_reg(reg)?;
                    }
                    asm.call_addr(entry)?;
                    for reg in STACK_REGS.iter().rev() {
                        asm.pop_reg(*reg)?;
                    }

                    depth -= site.argc;
                    asm.mov_reg_reg(STACK_REGS[depth - 1], SCRATCH)?;
                }
            }
            index += op.width();
        }

        let mut arena = self.compiler.lock_arena();
        let base = arena.position();
        let bytes = asm.assemble(base)?;
        let addr = arena.write(&bytes)?;

        let branch = if let BlockExit::Branch {
            target,
            fallthrough,
        } = block.exit
        {
            // The branch popped the value, so it sits just above the final
            // depth. Reserve the slot against worst-case-distance targets.
            let value = STACK_REGS[depth];
            let slot_base = arena.position();
            let placeholder = arena.end();
            let slot = emit_branch_code(value, placeholder, placeholder, slot_base)?;
            let patch_addr = arena.write(&slot)?;
            Some(BranchSite {
                patch_addr,
                reserved_len: slot.len(),
                value,
                target,
                fallthrough,
            })
        } else {
            None
        };

        Ok(EmittedBlock { addr, branch })
    }

    fn operand(&self, index: usize) -> CompileResult<u64> {
        self.insns
            .get(index + 1)
            .copied()
            .ok_or(CompileError::MissingReturn { index })
    }
}
