// This module wraps the iced-x86 CodeAssembler in the narrow assembler surface the
// code generator is written against: moves between registers, immediates and
// frame-relative memory, tagged-integer arithmetic (add/sub with immediates),
// compare/test, the conditional move used for branch-free comparisons, stack
// push/pop around calls, and call/ret plus conditional and unconditional jumps to
// absolute addresses. Jump and call targets are absolute u64 addresses rather than
// labels because blocks are assembled one at a time at their final arena address,
// with branch slots re-assembled during the link pass once successor addresses are
// known. assemble(base) lowers everything recorded so far to bytes at the given base
// address. Register names are a small closed enum covering exactly the registers the
// operand-stack model and the native calling convention use.

//! x86-64 instruction encoding using iced-x86.

use iced_x86::code_asm::{AsmRegister64, CodeAssembler};

/// Error types for instruction encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Assembly error from iced-x86.
    Assembly(String),
}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingError::Assembly(msg) => write!(f, "assembly error: {msg}"),
        }
    }
}

impl std::error::Error for EncodingError {}

/// The registers generated code is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rcx,
    Rdi,
    Rsi,
    R8,
    R9,
    R10,
    R11,
}

impl Reg {
    fn to_gp64(self) -> AsmRegister64 {
        use iced_x86::code_asm::*;
        match self {
            Reg::Rax => rax,
            Reg::Rcx => rcx,
            Reg::Rdi => rdi,
            Reg::Rsi => rsi,
            Reg::R8 => r8,
            Reg::R9 => r9,
            Reg::R10 => r10,
            Reg::R11 => r11,
        }
    }
}

/// Records abstract operations and lowers them to machine code at an
/// absolute base address.
pub struct MethodAssembler {
    asm: CodeAssembler,
}

macro_rules! emit {
    ($self:ident . $op:ident ( $($arg:expr),* )) => {
        $self
            .asm
            .$op($($arg),*)
            .map_err(|e| EncodingError::Assembly(e.to_string()))
    };
}

impl MethodAssembler {
    pub fn new() -> Result<Self, EncodingError> {
        let asm = CodeAssembler::new(64).map_err(|e| EncodingError::Assembly(e.to_string()))?;
        Ok(Self { asm })
    }

    /// MOV register, 64-bit immediate.
    pub fn mov_reg_imm(&mut self, dst: Reg, imm: u64) -> Result<(), EncodingError> {
        emit!(self.mov(dst.to_gp64(), imm))
    }

    /// MOV register, register.
    pub fn mov_reg_reg(&mut self, dst: Reg, src: Reg) -> Result<(), EncodingError> {
        emit!(self.mov(dst.to_gp64(), src.to_gp64()))
    }

    /// MOV register, qword [base + offset].
    pub fn mov_reg_mem(&mut self, dst: Reg, base: Reg, offset: i32) -> Result<(), EncodingError> {
        let mem = iced_x86::code_asm::qword_ptr(base.to_gp64() + offset);
        emit!(self.mov(dst.to_gp64(), mem))
    }

    /// MOV qword [base + offset], register.
    pub fn mov_mem_reg(&mut self, base: Reg, offset: i32, src: Reg) -> Result<(), EncodingError> {
        let mem = iced_x86::code_asm::qword_ptr(base.to_gp64() + offset);
        emit!(self.mov(mem, src.to_gp64()))
    }

    /// ADD register, register.
    pub fn add_reg_reg(&mut self, dst: Reg, src: Reg) -> Result<(), EncodingError> {
        emit!(self.add(dst.to_gp64(), src.to_gp64()))
    }

    /// ADD register, immediate.
    pub fn add_reg_imm(&mut self, dst: Reg, imm: i32) -> Result<(), EncodingError> {
        emit!(self.add(dst.to_gp64(), imm))
    }

    /// SUB register, register.
    pub fn sub_reg_reg(&mut self, dst: Reg, src: Reg) -> Result<(), EncodingError> {
        emit!(self.sub(dst.to_gp64(), src.to_gp64()))
    }

    /// SUB register, immediate.
    pub fn sub_reg_imm(&mut self, dst: Reg, imm: i32) -> Result<(), EncodingError> {
        emit!(self.sub(dst.to_gp64(), imm))
    }

    /// CMP register, register.
    pub fn cmp_reg_reg(&mut self, left: Reg, right: Reg) -> Result<(), EncodingError> {
        emit!(self.cmp(left.to_gp64(), right.to_gp64()))
    }

    /// CMP register, immediate.
    pub fn cmp_reg_imm(&mut self, reg: Reg, imm: i32) -> Result<(), EncodingError> {
        emit!(self.cmp(reg.to_gp64(), imm))
    }

    /// CMOVL register, register (move on signed less).
    pub fn cmovl_reg_reg(&mut self, dst: Reg, src: Reg) -> Result<(), EncodingError> {
        emit!(self.cmovl(dst.to_gp64(), src.to_gp64()))
    }

    /// PUSH register.
    pub fn push_reg(&mut self, reg: Reg) -> Result<(), EncodingError> {
        emit!(self.push(reg.to_gp64()))
    }

    /// POP register.
    pub fn pop_reg(&mut self, reg: Reg) -> Result<(), EncodingError> {
        emit!(self.pop(reg.to_gp64()))
    }

    /// CALL to an absolute address.
    pub fn call_addr(&mut self, target: u64) -> Result<(), EncodingError> {
        emit!(self.call(target))
    }

    /// JMP to an absolute address.
    pub fn jmp_addr(&mut self, target: u64) -> Result<(), EncodingError> {
        emit!(self.jmp(target))
    }

    /// JE to an absolute address.
    pub fn je_addr(&mut self, target: u64) -> Result<(), EncodingError> {
        emit!(self.je(target))
    }

    /// RET.
    pub fn ret(&mut self) -> Result<(), EncodingError> {
        emit!(self.ret())
    }

    /// Lower all recorded operations to bytes at `base`.
    pub fn assemble(&mut self, base: u64) -> Result<Vec<u8>, EncodingError> {
        self.asm
            .assemble(base)
            .map_err(|e| EncodingError::Assembly(e.to_string()))
    }
}
