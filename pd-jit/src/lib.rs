pub mod ast;
mod bridge;
pub mod buffer;
pub mod cell;
pub mod encode;
pub mod error;
pub mod jit;
pub mod logging;
pub mod memory;
pub mod translator;

pub use ast::{BinaryOp, CompareOp, Node, NodeKind};
pub use buffer::CodeBuffer;
pub use cell::ValueCell;
pub use error::{JitError, JitResult};
pub use jit::{CompiledCode, DEFAULT_BUFFER_CAPACITY, Jit, JitConfig, native_jit_supported};
pub use memory::ExecutableMemory;
pub use translator::{RuntimeContext, ValueKind, compile, value_kind};
