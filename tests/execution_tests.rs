// This test suite executes the emitted machine code. Each test registers one or more
// methods, compiles them, jumps into the published entry through a VmThread, and
// checks the tagged result - and, for the behavioural scenarios, cross-checks the
// compiled result against the reference interpreter over a range of inputs. Covered:
// tagged arithmetic on small integers, the branch-free less-than comparison, both
// arms of a falsy-tested conditional (including nil and false, which are falsy, and
// zero, which is not), compile-on-demand calls that build the callee frame inline,
// nested calls that must preserve the caller's register window, and returning the
// immediate singletons.

//! End-to-end tests that run compiled methods.

#![cfg(all(target_arch = "x86_64", unix))]

mod common;

use common::{interpret, words};
use mjit::{Method, MethodCompiler, MethodId, MethodRegistry, Opcode, Value, VmThread};

fn run(registry: &MethodRegistry, id: MethodId, recv: Value, args: &[Value]) -> Value {
    let compiler = MethodCompiler::new().unwrap();
    let entry = compiler.compile(registry, id).unwrap();
    let mut thread = VmThread::new();
    unsafe { thread.enter(entry, recv, args) }
}

#[test]
fn test_add_two_literals() {
    let mut registry = MethodRegistry::new();
    let id = registry.add(Method::new(
        words(&[
            (Opcode::PushInt, Some(1)),
            (Opcode::PushInt, Some(2)),
            (Opcode::Add, None),
            (Opcode::Return, None),
        ]),
        0,
    ));
    let result = run(&registry, id, Value::NIL, &[]);
    assert_eq!(result, Value::fixnum(3));
    assert_eq!(result, interpret(&registry, id, Value::NIL, &[]));
}

#[test]
fn test_sub_keeps_the_tag() {
    let mut registry = MethodRegistry::new();
    let id = registry.add(Method::new(
        words(&[
            (Opcode::PushInt, Some(45)),
            (Opcode::PushInt, Some(3)),
            (Opcode::Sub, None),
            (Opcode::Return, None),
        ]),
        0,
    ));
    let result = run(&registry, id, Value::NIL, &[]);
    assert!(result.is_fixnum());
    assert_eq!(result.as_fixnum(), 42);
}

#[test]
fn test_negative_arithmetic() {
    let mut registry = MethodRegistry::new();
    let id = registry.add(Method::new(
        words(&[
            (Opcode::PushInt, Some((-7i64) as u64)),
            (Opcode::LoadLocal, Some(1)),
            (Opcode::Add, None),
            (Opcode::Return, None),
        ]),
        1,
    ));
    let result = run(&registry, id, Value::NIL, &[Value::fixnum(3)]);
    assert_eq!(result.as_fixnum(), -4);
}

#[test]
fn test_singleton_returns() {
    for (op, expected) in [
        (Opcode::PushTrue, Value::TRUE),
        (Opcode::PushFalse, Value::FALSE),
        (Opcode::PushNil, Value::NIL),
    ] {
        let mut registry = MethodRegistry::new();
        let id = registry.add(Method::new(
            words(&[(op, None), (Opcode::Return, None)]),
            0,
        ));
        assert_eq!(run(&registry, id, Value::NIL, &[]), expected);
    }
}

/// A two-armed conditional over `1 < local`: falsy comparison takes the
/// branch to the 20 arm, truthy falls through to the 10 arm.
fn branchy_method() -> Method {
    Method::new(
        words(&[
            (Opcode::PushInt, Some(1)),       // words 0-1
            (Opcode::LoadLocal, Some(1)),     // words 2-3
            (Opcode::Lt, None),               // word 4
            (Opcode::BranchUnless, Some(10)), // words 5-6
            (Opcode::PushInt, Some(10)),      // words 7-8
            (Opcode::Return, None),           // word 9
            (Opcode::PushInt, Some(20)),      // words 10-11
            (Opcode::Return, None),           // word 12
        ]),
        1,
    )
}

#[test]
fn test_branch_takes_the_falsy_arm() {
    let mut registry = MethodRegistry::new();
    let id = registry.add(branchy_method());
    // 1 < 0 is false, so control jumps to the 20 arm.
    assert_eq!(
        run(&registry, id, Value::NIL, &[Value::fixnum(0)]),
        Value::fixnum(20)
    );
}

#[test]
fn test_branch_falls_through_on_truthy() {
    let mut registry = MethodRegistry::new();
    let id = registry.add(branchy_method());
    // 1 < 5 is true, so control falls through to the 10 arm.
    assert_eq!(
        run(&registry, id, Value::NIL, &[Value::fixnum(5)]),
        Value::fixnum(10)
    );
}

#[test]
fn test_branch_agrees_with_the_interpreter() {
    let mut registry = MethodRegistry::new();
    let id = registry.add(branchy_method());
    let compiler = MethodCompiler::new().unwrap();
    let entry = compiler.compile(&registry, id).unwrap();
    let mut thread = VmThread::new();

    for n in [-5, 0, 1, 2, 100] {
        let args = [Value::fixnum(n)];
        let compiled = unsafe { thread.enter(entry, Value::NIL, &args) };
        assert_eq!(compiled, interpret(&registry, id, Value::NIL, &args), "n = {n}");
    }
}

#[test]
fn test_nil_and_false_are_falsy_but_zero_is_not() {
    for (op, operand, expected) in [
        (Opcode::PushNil, None, 2),
        (Opcode::PushFalse, None, 2),
        (Opcode::PushInt, Some(0), 1),
    ] {
        let mut registry = MethodRegistry::new();
        let mut insns = words(&[(op, operand)]);
        let base = insns.len();
        // branch-unless <base + 5>; push 1; return; push 2; return
        insns.extend(words(&[
            (Opcode::BranchUnless, Some(base as u64 + 5)),
            (Opcode::PushInt, Some(1)),
            (Opcode::Return, None),
            (Opcode::PushInt, Some(2)),
            (Opcode::Return, None),
        ]));
        let id = registry.add(Method::new(insns, 0));
        assert_eq!(
            run(&registry, id, Value::NIL, &[]),
            Value::fixnum(expected),
            "pushed via {op:?}"
        );
    }
}

#[test]
fn test_call_compiles_callee_on_demand_and_passes_arguments() {
    let mut registry = MethodRegistry::new();
    let add_one = registry.add(Method::new(
        words(&[
            (Opcode::LoadLocal, Some(1)),
            (Opcode::PushInt, Some(1)),
            (Opcode::Add, None),
            (Opcode::Return, None),
        ]),
        1,
    ));
    let caller = registry.add(Method::new(
        words(&[
            (Opcode::PushSelf, None),
            (Opcode::LoadLocal, Some(1)),
            (Opcode::Call, Some(add_one.0 as u64)),
            (Opcode::Return, None),
        ]),
        1,
    ));

    let args = [Value::fixnum(41)];
    let result = run(&registry, caller, Value::NIL, &args);
    assert_eq!(result, Value::fixnum(42));
    assert_eq!(result, interpret(&registry, caller, Value::NIL, &args));
}

#[test]
fn test_nested_calls_preserve_the_register_window() {
    let mut registry = MethodRegistry::new();
    let add_two = registry.add(Method::new(
        words(&[
            (Opcode::LoadLocal, Some(1)),
            (Opcode::PushInt, Some(2)),
            (Opcode::Add, None),
            (Opcode::Return, None),
        ]),
        1,
    ));
    // x + add_two(x): x is pushed before the call and consumed after it, so
    // it must survive the callee in its saved stack register.
    let outer = registry.add(Method::new(
        words(&[
            (Opcode::LoadLocal, Some(1)),
            (Opcode::PushSelf, None),
            (Opcode::LoadLocal, Some(1)),
            (Opcode::Call, Some(add_two.0 as u64)),
            (Opcode::Add, None),
            (Opcode::Return, None),
        ]),
        1,
    ));

    let args = [Value::fixnum(20)];
    let result = run(&registry, outer, Value::NIL, &args);
    assert_eq!(result, Value::fixnum(42));
    assert_eq!(result, interpret(&registry, outer, Value::NIL, &args));
}

#[test]
fn test_two_level_call_chain() {
    let mut registry = MethodRegistry::new();
    let leaf = registry.add(Method::new(
        words(&[
            (Opcode::LoadLocal, Some(1)),
            (Opcode::PushInt, Some(1)),
            (Opcode::Add, None),
            (Opcode::Return, None),
        ]),
        1,
    ));
    let mid = registry.add(Method::new(
        words(&[
            (Opcode::PushSelf, None),
            (Opcode::LoadLocal, Some(1)),
            (Opcode::Call, Some(leaf.0 as u64)),
            (Opcode::PushInt, Some(10)),
            (Opcode::Add, None),
            (Opcode::Return, None),
        ]),
        1,
    ));
    let top = registry.add(Method::new(
        words(&[
            (Opcode::PushSelf, None),
            (Opcode::LoadLocal, Some(1)),
            (Opcode::Call, Some(mid.0 as u64)),
            (Opcode::Return, None),
        ]),
        1,
    ));

    // top(x) = mid(x) = leaf(x) + 10 = x + 11
    let args = [Value::fixnum(31)];
    let result = run(&registry, top, Value::NIL, &args);
    assert_eq!(result, Value::fixnum(42));
    assert_eq!(result, interpret(&registry, top, Value::NIL, &args));
}

#[test]
fn test_receiver_flows_into_the_callee() {
    let mut registry = MethodRegistry::new();
    // Callee answers its own receiver.
    let identity = registry.add(Method::new(
        words(&[(Opcode::PushSelf, None), (Opcode::Return, None)]),
        0,
    ));
    // Caller sends to a pushed literal receiver.
    let caller = registry.add(Method::new(
        words(&[
            (Opcode::PushInt, Some(7)),
            (Opcode::Call, Some(identity.0 as u64)),
            (Opcode::Return, None),
        ]),
        0,
    ));
    assert_eq!(
        run(&registry, caller, Value::NIL, &[]),
        Value::fixnum(7)
    );
}
