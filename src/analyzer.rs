//! Basic-block discovery over one method's instruction sequence.
//!
//! Walks the encoded instructions from index 0, accumulating an abstract
//! operand-stack depth, and closes a block at every two-way branch
//! (inclusive) or return. Each branch recursively discovers its
//! fall-through and jump-target successors at the post-branch depth; a
//! start-index map terminates the recursion on loops and merge points, so
//! every reachable instruction lands in exactly one block.
//!
//! Because the operand stack maps onto a fixed register window with no
//! spill path, depth violations are rejected here, before any code is
//! generated.

use crate::core::error::{CompileError, CompileResult};
use crate::vm::method::MethodRegistry;
use crate::vm::opcode::Opcode;
use crate::x64::STACK_WINDOW;
use std::collections::HashMap;

/// Index of a block within one method's partition.
pub type BlockId = usize;

/// How a block hands control off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockExit {
    Return,
    Branch {
        target: BlockId,
        fallthrough: BlockId,
    },
}

/// One maximal straight-line run of instructions.
#[derive(Debug, Clone)]
pub struct Block {
    /// Word index of the first instruction.
    pub start: usize,
    /// One past the last word, branch or return included.
    pub end: usize,
    /// Operand-stack depth on entry.
    pub entry_depth: usize,
    pub exit: BlockExit,
    /// Arena address, assigned when the block's code is written.
    pub addr: Option<u64>,
}

/// Partition a method into basic blocks in discovery order; block 0 is the
/// method entry.
pub fn partition(insns: &[u64], registry: &MethodRegistry) -> CompileResult<Vec<Block>> {
    let mut partitioner = Partitioner {
        insns,
        registry,
        blocks: Vec::new(),
        by_start: HashMap::new(),
    };
    partitioner.discover(0, 0)?;
    log::debug!(
        "partitioned {} instruction words into {} blocks",
        insns.len(),
        partitioner.blocks.len()
    );
    Ok(partitioner.blocks)
}

struct Partitioner<'a> {
    insns: &'a [u64],
    registry: &'a MethodRegistry,
    blocks: Vec<Block>,
    by_start: HashMap<usize, BlockId>,
}

impl Partitioner<'_> {
    fn discover(&mut self, start: usize, entry_depth: usize) -> CompileResult<BlockId> {
        if let Some(&id) = self.by_start.get(&start) {
            return Ok(id);
        }
        if start >= self.insns.len() {
            return Err(CompileError::InvalidBranchTarget { target: start });
        }

        let id = self.blocks.len();
        self.by_start.insert(start, id);
        self.blocks.push(Block {
            start,
            end: start,
            entry_depth,
            exit: BlockExit::Return,
            addr: None,
        });

        let mut depth = entry_depth;
        let mut index = start;
        loop {
            let Some(&word) = self.insns.get(index) else {
                return Err(CompileError::MissingReturn { index });
            };
            let op = Opcode::decode(word, index)?;

            let (pops, pushes) = match op.fixed_stack_io() {
                Some(io) => io,
                None => {
                    let site = self.registry.resolve_call(self.operand(index)?)?;
                    (site.argc + 1, 1)
                }
            };
            if depth < pops {
                return Err(CompileError::StackUnderflow { index });
            }
            depth = depth - pops + pushes;
            if depth > STACK_WINDOW {
                return Err(CompileError::StackOverflow {
                    index,
                    depth,
                    limit: STACK_WINDOW,
                });
            }

            let next = index + op.width();
            if op.is_return() {
                self.blocks[id].end = next;
                return Ok(id);
            }
            if op.is_branch() {
                let target = self.operand(index)? as usize;
                if target >= self.insns.len() {
                    return Err(CompileError::InvalidBranchTarget { target });
                }
                self.blocks[id].end = next;
                let fallthrough = self.discover(next, depth)?;
                let target = self.discover(target, depth)?;
                self.blocks[id].exit = BlockExit::Branch {
                    target,
                    fallthrough,
                };
                return Ok(id);
            }
            index = next;
        }
    }

    fn operand(&self, index: usize) -> CompileResult<u64> {
        self.insns
            .get(index + 1)
            .copied()
            .ok_or(CompileError::MissingReturn { index })
    }
}
