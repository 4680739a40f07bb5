use crate::ast::NodeKind;
use crate::translator::ValueKind;

#[derive(Debug, Clone, PartialEq)]
pub enum JitError {
    Alloc(String),
    BufferOverflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    Unsupported(NodeKind),
    ValueKind {
        kind: NodeKind,
        expected: ValueKind,
    },
    UnboundVariable(String),
    Displacement(String),
    UnsupportedTarget,
    Disabled,
    ResultKind {
        expected: ValueKind,
        actual: ValueKind,
    },
}

impl JitError {
    /// True for failures that a larger buffer would fix.
    pub fn is_overflow(&self) -> bool {
        matches!(self, JitError::BufferOverflow { .. })
    }
}

impl std::fmt::Display for JitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JitError::Alloc(message) => write!(f, "executable memory allocation failed: {message}"),
            JitError::BufferOverflow {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "jit buffer overflow: {len} byte(s) at offset {offset} exceed capacity {capacity}"
            ),
            JitError::Unsupported(kind) => write!(f, "unsupported node kind '{kind}'"),
            JitError::ValueKind { kind, expected } => {
                write!(f, "node kind '{kind}' cannot produce a {expected} value")
            }
            JitError::UnboundVariable(name) => {
                write!(f, "variable '{name}' is not bound in the runtime context")
            }
            JitError::Displacement(message) => write!(f, "jump displacement: {message}"),
            JitError::UnsupportedTarget => {
                write!(f, "native code generation requires x86_64 on unix or windows")
            }
            JitError::Disabled => write!(f, "jit is disabled by configuration"),
            JitError::ResultKind { expected, actual } => write!(
                f,
                "compiled code produces a {actual} result, not a {expected} result"
            ),
        }
    }
}

impl std::error::Error for JitError {}

pub type JitResult<T> = Result<T, JitError>;
