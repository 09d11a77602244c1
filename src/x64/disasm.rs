//! Diagnostic disassembly of emitted machine code.
//!
//! Purely informational; nothing in the pipeline depends on the output.

use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, NasmFormatter};

/// Render the bytes at `ip` as one formatted line per instruction.
pub fn disassemble(bytes: &[u8], ip: u64) -> Vec<String> {
    let mut decoder = Decoder::with_ip(64, bytes, ip, DecoderOptions::NONE);
    let mut formatter = NasmFormatter::new();
    let mut instruction = Instruction::default();
    let mut lines = Vec::new();
    let mut text = String::new();

    while decoder.can_decode() {
        decoder.decode_out(&mut instruction);
        text.clear();
        formatter.format(&instruction, &mut text);
        lines.push(format!("  {:#010x}: {}", instruction.ip(), text));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x64::assembler::{MethodAssembler, Reg};

    #[test]
    fn test_disassembles_what_was_assembled() {
        let mut asm = MethodAssembler::new().unwrap();
        asm.mov_reg_imm(Reg::Rax, 42).unwrap();
        asm.ret().unwrap();
        let bytes = asm.assemble(0x4000).unwrap();

        let lines = disassemble(&bytes, 0x4000);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("mov"));
        assert!(lines[1].contains("ret"));
    }
}
