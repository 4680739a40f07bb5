#![allow(dead_code, unused_imports)]

pub use jit::{
    BinaryOp, CodeBuffer, CompareOp, Jit, JitConfig, JitError, Node, NodeKind, RuntimeContext,
    ValueCell, ValueKind, native_jit_supported,
};

pub const VAR: &str = "x";

pub fn x() -> Node {
    Node::var(VAR)
}

pub fn num(value: f64) -> Node {
    Node::number(value)
}

pub fn text(value: &str) -> Node {
    Node::string(value).expect("literal without NUL")
}

pub fn eval_number(node: &Node, cell: &ValueCell) -> f64 {
    let ctx = RuntimeContext::new(VAR, cell);
    let code = Jit::default().compile(node, &ctx).expect("tree should compile");
    code.run_number().expect("numeric result")
}

pub fn eval_string(node: &Node, cell: &ValueCell) -> String {
    let ctx = RuntimeContext::new(VAR, cell);
    let code = Jit::default().compile(node, &ctx).expect("tree should compile");
    code.run_string().expect("string result")
}

pub fn execute(node: &Node, cell: &ValueCell) {
    let ctx = RuntimeContext::new(VAR, cell);
    let code = Jit::default().compile(node, &ctx).expect("tree should compile");
    code.run();
}

pub fn constant(value: f64) -> f64 {
    eval_number(&num(value), &ValueCell::new())
}

/// `while x { x = x - 1 }`
pub fn countdown() -> Node {
    Node::while_loop(x(), Node::assign(VAR, Node::sub(x(), num(1.0))))
}
