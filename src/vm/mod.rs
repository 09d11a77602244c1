//! The host VM contract the compiler is written against.
//!
//! Everything the generated code touches at runtime lives here: the tagged
//! value encoding, the control-frame and execution-context layout, the
//! instruction encoding, and the method registry that resolves call sites.

pub mod exec;
pub mod frame;
pub mod method;
pub mod opcode;
pub mod value;

pub use exec::VmThread;
pub use frame::{ControlFrame, ExecutionContext};
pub use method::{CallSite, CompileState, Method, MethodId, MethodRegistry};
pub use opcode::Opcode;
pub use value::Value;
