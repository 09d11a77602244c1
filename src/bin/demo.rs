//! Demo driver: builds two small methods, JIT-compiles them, runs the
//! result, and optionally dumps the emitted machine code.
//!
//! The caller computes `self.clamp(x)`: if `x < 10` it calls a second
//! method that doubles `x`, otherwise it answers 20. Compiling the caller
//! triggers compilation of the callee on demand.

use clap::Parser;
use mjit::{CompileResult, Method, MethodCompiler, MethodRegistry, Opcode, Value, VmThread};

#[derive(Parser)]
#[command(name = "mjit-demo", about = "Compile and run a sample method")]
struct Args {
    /// Argument passed to the compiled method.
    #[arg(long, default_value_t = 5)]
    value: i64,

    /// Dump disassembly of the emitted machine code.
    #[arg(long)]
    dump_disasm: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    // The embedder owns the abort policy; the library only returns errors.
    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> CompileResult<()> {
    let mut registry = MethodRegistry::new();

    // double(a) = a + a
    let double = registry.add(Method::new(
        vec![
            Opcode::LoadLocal.encode(),
            1,
            Opcode::LoadLocal.encode(),
            1,
            Opcode::Add.encode(),
            Opcode::Return.encode(),
        ],
        1,
    ));

    // clamp(x) = if x < 10 { self.double(x) } else { 20 }
    let clamp = registry.add(Method::new(
        vec![
            Opcode::LoadLocal.encode(), // word 0
            1,
            Opcode::PushInt.encode(), // word 2
            10,
            Opcode::Lt.encode(),           // word 4
            Opcode::BranchUnless.encode(), // word 5
            13,
            Opcode::PushSelf.encode(), // word 7
            Opcode::LoadLocal.encode(), // word 8
            1,
            Opcode::Call.encode(), // word 10
            double.0 as u64,
            Opcode::Return.encode(),  // word 12
            Opcode::PushInt.encode(), // word 13
            20,
            Opcode::Return.encode(), // word 15
        ],
        1,
    ));

    let compiler = MethodCompiler::new()?;
    let start = compiler.code_base();
    let entry = compiler.compile(&registry, clamp)?;
    println!(
        "compiled 2 methods, {} bytes of code, entry at {entry:#x}",
        compiler.code_size()
    );

    if args.dump_disasm {
        for line in compiler.disassembly(start)? {
            println!("{line}");
        }
    }

    let mut thread = VmThread::new();
    let result = unsafe { thread.enter(entry, Value::NIL, &[Value::fixnum(args.value)]) };
    println!("clamp({}) = {result:?}", args.value);
    Ok(())
}
