//! Tree shape handed over by the interpreter front end.
//!
//! Only part of the tree is native-compilable; the remaining node kinds exist
//! so the evaluator's full tree can be offered to the compiler, which rejects
//! them with [`JitError::Unsupported`](crate::JitError::Unsupported).

use std::ffi::{CString, NulError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Number(f64),
    /// String literal; its bytes are referenced in place by compiled code.
    Str(CString),
    Var(String),
    Assign {
        name: String,
        value: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Neg(Box<Node>),
    Concat(Box<Node>, Box<Node>),
    While {
        cond: Box<Node>,
        body: Box<Node>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Block(Vec<Node>),
    Print(Vec<Node>),
    Call {
        name: String,
        args: Vec<Node>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Number,
    Str,
    Var,
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Concat,
    While,
    Compare,
    Block,
    Print,
    Call,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Number => "number",
            NodeKind::Str => "string",
            NodeKind::Var => "var",
            NodeKind::Assign => "assign",
            NodeKind::Add => "add",
            NodeKind::Sub => "sub",
            NodeKind::Mul => "mul",
            NodeKind::Div => "div",
            NodeKind::Mod => "mod",
            NodeKind::Neg => "neg",
            NodeKind::Concat => "concat",
            NodeKind::While => "while",
            NodeKind::Compare => "compare",
            NodeKind::Block => "block",
            NodeKind::Print => "print",
            NodeKind::Call => "call",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Number(_) => NodeKind::Number,
            Node::Str(_) => NodeKind::Str,
            Node::Var(_) => NodeKind::Var,
            Node::Assign { .. } => NodeKind::Assign,
            Node::Binary { op, .. } => match op {
                BinaryOp::Add => NodeKind::Add,
                BinaryOp::Sub => NodeKind::Sub,
                BinaryOp::Mul => NodeKind::Mul,
                BinaryOp::Div => NodeKind::Div,
                BinaryOp::Mod => NodeKind::Mod,
            },
            Node::Neg(_) => NodeKind::Neg,
            Node::Concat(_, _) => NodeKind::Concat,
            Node::While { .. } => NodeKind::While,
            Node::Compare { .. } => NodeKind::Compare,
            Node::Block(_) => NodeKind::Block,
            Node::Print(_) => NodeKind::Print,
            Node::Call { .. } => NodeKind::Call,
        }
    }

    pub fn number(value: f64) -> Self {
        Node::Number(value)
    }

    pub fn string(text: &str) -> Result<Self, NulError> {
        Ok(Node::Str(CString::new(text)?))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Node::Var(name.into())
    }

    pub fn assign(name: impl Into<String>, value: Node) -> Self {
        Node::Assign {
            name: name.into(),
            value: Box::new(value),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Self {
        Node::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Node, rhs: Node) -> Self {
        Self::binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Node, rhs: Node) -> Self {
        Self::binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Node, rhs: Node) -> Self {
        Self::binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(lhs: Node, rhs: Node) -> Self {
        Self::binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn rem(lhs: Node, rhs: Node) -> Self {
        Self::binary(BinaryOp::Mod, lhs, rhs)
    }

    pub fn neg(operand: Node) -> Self {
        Node::Neg(Box::new(operand))
    }

    pub fn concat(lhs: Node, rhs: Node) -> Self {
        Node::Concat(Box::new(lhs), Box::new(rhs))
    }

    pub fn while_loop(cond: Node, body: Node) -> Self {
        Node::While {
            cond: Box::new(cond),
            body: Box::new(body),
        }
    }
}
