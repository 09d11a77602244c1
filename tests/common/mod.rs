//! Shared test fixtures: an instruction-stream builder and a reference
//! interpreter used to check compiled code against the source semantics.

use mjit::{MethodId, MethodRegistry, Opcode, Value};

/// Encode an instruction stream from (opcode, operand) pairs.
pub fn words(insns: &[(Opcode, Option<u64>)]) -> Vec<u64> {
    let mut out = Vec::new();
    for &(op, operand) in insns {
        out.push(op.encode());
        if let Some(operand) = operand {
            out.push(operand);
        }
    }
    out
}

/// Interpret a method the way the host VM would.
///
/// Local `i` reads the `i`-th slot back from the environment pointer, which
/// sits one past the last argument: local 1 is the last argument.
pub fn interpret(registry: &MethodRegistry, id: MethodId, recv: Value, args: &[Value]) -> Value {
    let method = registry.get(id).unwrap();
    let insns = method.insns();
    let mut stack: Vec<Value> = Vec::new();
    let mut pc = 0;

    loop {
        let op = Opcode::decode(insns[pc], pc).unwrap();
        let operand = |at: usize| insns[at + 1];
        match op {
            Opcode::Nop => {}
            Opcode::PushNil => stack.push(Value::NIL),
            Opcode::PushTrue => stack.push(Value::TRUE),
            Opcode::PushFalse => stack.push(Value::FALSE),
            Opcode::PushInt => stack.push(Value::fixnum(operand(pc) as i64)),
            Opcode::PushSelf => stack.push(recv),
            Opcode::LoadLocal => {
                let slot = operand(pc) as usize;
                stack.push(args[args.len() - slot]);
            }
            Opcode::Add => {
                let rhs = stack.pop().unwrap();
                let lhs = stack.pop().unwrap();
                stack.push(Value::fixnum(lhs.as_fixnum() + rhs.as_fixnum()));
            }
            Opcode::Sub => {
                let rhs = stack.pop().unwrap();
                let lhs = stack.pop().unwrap();
                stack.push(Value::fixnum(lhs.as_fixnum() - rhs.as_fixnum()));
            }
            Opcode::Lt => {
                let rhs = stack.pop().unwrap();
                let lhs = stack.pop().unwrap();
                stack.push(if lhs.as_fixnum() < rhs.as_fixnum() {
                    Value::TRUE
                } else {
                    Value::FALSE
                });
            }
            Opcode::BranchUnless => {
                let value = stack.pop().unwrap();
                if !value.is_truthy() {
                    pc = operand(pc) as usize;
                    continue;
                }
            }
            Opcode::Return => return stack.pop().unwrap(),
            Opcode::Call => {
                let site = registry.resolve_call(operand(pc)).unwrap();
                let callee_args = stack.split_off(stack.len() - site.argc);
                let callee_recv = stack.pop().unwrap();
                stack.push(interpret(registry, site.target, callee_recv, &callee_args));
            }
        }
        pc += op.width();
    }
}
