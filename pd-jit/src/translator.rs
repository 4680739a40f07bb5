//! Tree-to-machine-code translation.
//!
//! Numeric nodes leave an IEEE-754 double in `xmm0`; string nodes leave a
//! NUL-terminated pointer in `rax`; statements leave nothing. Every node's
//! code is stack-balanced. Which convention applies is decided from the
//! node's kind alone, before any byte for it is emitted.

use tracing::debug;

use crate::ast::{BinaryOp, Node};
use crate::bridge;
use crate::buffer::CodeBuffer;
use crate::cell::ValueCell;
use crate::encode::{self, ARG0, ARG1, F64_ARG_AFTER_PTR, Gpr, SPILL_SLOT, ScalarOp, Xmm};
use crate::error::{JitError, JitResult};
use crate::logging::category_fallback;

/// Padding that keeps `rsp` aligned around a single 8-byte push.
const PUSH_PAD: u8 = SPILL_SLOT - 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Number,
    String,
    Unit,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Number => f.write_str("number"),
            ValueKind::String => f.write_str("string"),
            ValueKind::Unit => f.write_str("statement"),
        }
    }
}

/// The one variable compiled code may touch, and where it lives.
///
/// The cell's address is baked into the generated instructions, so the
/// borrow must outlive the code built from this context.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeContext<'a> {
    name: &'a str,
    cell: &'a ValueCell,
}

impl<'a> RuntimeContext<'a> {
    pub fn new(name: &'a str, cell: &'a ValueCell) -> Self {
        Self { name, cell }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn cell(&self) -> &'a ValueCell {
        self.cell
    }

    fn cell_addr(&self) -> u64 {
        encode::helper_address(self.cell as *const ValueCell as *const ())
    }
}

/// Static value kind of a compilable node.
pub fn value_kind(node: &Node) -> JitResult<ValueKind> {
    match node {
        Node::Number(_) | Node::Var(_) | Node::Binary { .. } | Node::Neg(_) => {
            Ok(ValueKind::Number)
        }
        Node::Str(_) | Node::Concat(_, _) => Ok(ValueKind::String),
        Node::Assign { .. } | Node::While { .. } => Ok(ValueKind::Unit),
        Node::Compare { .. } | Node::Block(_) | Node::Print(_) | Node::Call { .. } => {
            Err(unsupported(node))
        }
    }
}

/// Appends code for `node` at the buffer's cursor.
///
/// On failure the bytes already written for enclosing or earlier sibling
/// nodes stay in the buffer, which must then be discarded.
pub fn compile(
    buf: &mut CodeBuffer,
    node: &Node,
    ctx: &RuntimeContext<'_>,
) -> JitResult<ValueKind> {
    let mut translator = Translator { buf, ctx };
    translator.node(node)
}

fn unsupported(node: &Node) -> JitError {
    debug!("{} rejected node kind '{}'", category_fallback(), node.kind());
    JitError::Unsupported(node.kind())
}

fn mismatch(node: &Node, expected: ValueKind) -> JitError {
    JitError::ValueKind {
        kind: node.kind(),
        expected,
    }
}

fn scalar_op(op: BinaryOp) -> Option<ScalarOp> {
    match op {
        BinaryOp::Add => Some(ScalarOp::Add),
        BinaryOp::Sub => Some(ScalarOp::Sub),
        BinaryOp::Mul => Some(ScalarOp::Mul),
        BinaryOp::Div => Some(ScalarOp::Div),
        BinaryOp::Mod => None,
    }
}

struct Translator<'b, 'c> {
    buf: &'b mut CodeBuffer,
    ctx: &'b RuntimeContext<'c>,
}

impl Translator<'_, '_> {
    fn node(&mut self, node: &Node) -> JitResult<ValueKind> {
        let kind = value_kind(node)?;
        match kind {
            ValueKind::Number => self.number(node)?,
            ValueKind::String => self.string(node)?,
            ValueKind::Unit => self.statement(node)?,
        }
        Ok(kind)
    }

    fn number(&mut self, node: &Node) -> JitResult<()> {
        match node {
            Node::Number(value) => {
                encode::mov_imm64(self.buf, Gpr::Rax, value.to_bits())?;
                encode::movq_xmm_gpr(self.buf, Xmm::Xmm0, Gpr::Rax)
            }
            Node::Var(name) => {
                self.check_bound(name)?;
                self.call_with_cell(bridge::read_number_addr())
            }
            Node::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Node::Neg(operand) => self.negate(operand),
            Node::Str(_) | Node::Concat(_, _) | Node::Assign { .. } | Node::While { .. } => {
                Err(mismatch(node, ValueKind::Number))
            }
            _ => Err(unsupported(node)),
        }
    }

    fn string(&mut self, node: &Node) -> JitResult<()> {
        match node {
            Node::Str(text) => {
                let addr = encode::helper_address(text.as_ptr() as *const ());
                encode::mov_imm64(self.buf, Gpr::Rax, addr)
            }
            Node::Var(name) => {
                self.check_bound(name)?;
                self.call_with_cell(bridge::read_string_addr())
            }
            Node::Concat(lhs, rhs) => self.concat(lhs, rhs),
            Node::Number(_)
            | Node::Binary { .. }
            | Node::Neg(_)
            | Node::Assign { .. }
            | Node::While { .. } => Err(mismatch(node, ValueKind::String)),
            _ => Err(unsupported(node)),
        }
    }

    fn statement(&mut self, node: &Node) -> JitResult<()> {
        match node {
            Node::Assign { name, value } => self.assign(name, value),
            Node::While { cond, body } => self.while_loop(cond, body),
            Node::Number(_)
            | Node::Str(_)
            | Node::Var(_)
            | Node::Binary { .. }
            | Node::Neg(_)
            | Node::Concat(_, _) => Err(mismatch(node, ValueKind::Unit)),
            _ => Err(unsupported(node)),
        }
    }

    fn check_bound(&self, name: &str) -> JitResult<()> {
        if name == self.ctx.name() {
            Ok(())
        } else {
            Err(JitError::UnboundVariable(name.to_string()))
        }
    }

    fn call_with_cell(&mut self, helper: *const ()) -> JitResult<()> {
        encode::mov_imm64(self.buf, ARG0, self.ctx.cell_addr())?;
        encode::call_abs(self.buf, encode::helper_address(helper))
    }

    fn assign(&mut self, name: &str, value: &Node) -> JitResult<()> {
        self.check_bound(name)?;
        match value_kind(value)? {
            ValueKind::Number => {
                self.number(value)?;
                if F64_ARG_AFTER_PTR != Xmm::Xmm0 {
                    encode::movapd(self.buf, F64_ARG_AFTER_PTR, Xmm::Xmm0)?;
                }
                self.call_with_cell(bridge::write_number_addr())
            }
            ValueKind::String => {
                self.string(value)?;
                encode::mov_reg(self.buf, ARG1, Gpr::Rax)?;
                self.call_with_cell(bridge::write_string_addr())
            }
            ValueKind::Unit => Err(mismatch(value, ValueKind::Number)),
        }
    }

    /// Left operand is spilled while the right one is computed, then
    /// `xmm1 = left`, `xmm0 = right` and the result is `left op right`.
    fn binary(&mut self, op: BinaryOp, lhs: &Node, rhs: &Node) -> JitResult<()> {
        self.number(lhs)?;
        encode::sub_rsp(self.buf, SPILL_SLOT)?;
        encode::movsd_store_rsp(self.buf, Xmm::Xmm0)?;

        self.number(rhs)?;
        encode::movsd_load_rsp(self.buf, Xmm::Xmm1)?;
        encode::add_rsp(self.buf, SPILL_SLOT)?;

        match scalar_op(op) {
            Some(scalar) => {
                encode::scalar_sd(self.buf, scalar, Xmm::Xmm1, Xmm::Xmm0)?;
                encode::movapd(self.buf, Xmm::Xmm0, Xmm::Xmm1)
            }
            None => {
                // fmod(left, right) takes its operands in xmm0, xmm1.
                encode::movapd(self.buf, Xmm::Xmm2, Xmm::Xmm0)?;
                encode::movapd(self.buf, Xmm::Xmm0, Xmm::Xmm1)?;
                encode::movapd(self.buf, Xmm::Xmm1, Xmm::Xmm2)?;
                encode::call_abs(self.buf, encode::helper_address(bridge::fmod_addr()))
            }
        }
    }

    /// `-0.0 - x`: the subtraction keeps NaN propagation, and starting from
    /// negative zero maps `0.0` to `-0.0`.
    fn negate(&mut self, operand: &Node) -> JitResult<()> {
        self.number(operand)?;
        encode::mov_imm64(self.buf, Gpr::Rax, (-0.0f64).to_bits())?;
        encode::movq_xmm_gpr(self.buf, Xmm::Xmm1, Gpr::Rax)?;
        encode::scalar_sd(self.buf, ScalarOp::Sub, Xmm::Xmm1, Xmm::Xmm0)?;
        encode::movapd(self.buf, Xmm::Xmm0, Xmm::Xmm1)
    }

    fn concat(&mut self, lhs: &Node, rhs: &Node) -> JitResult<()> {
        self.string(lhs)?;
        encode::push(self.buf, Gpr::Rax)?;
        encode::sub_rsp(self.buf, PUSH_PAD)?;

        self.string(rhs)?;
        encode::add_rsp(self.buf, PUSH_PAD)?;
        encode::pop(self.buf, Gpr::Rcx)?;

        encode::mov_reg(self.buf, ARG1, Gpr::Rax)?;
        if ARG0 != Gpr::Rcx {
            encode::mov_reg(self.buf, ARG0, Gpr::Rcx)?;
        }
        encode::call_abs(self.buf, encode::helper_address(bridge::concat_addr()))
    }

    /// Condition, `je` to the exit, body, `jmp` back to the condition. Both
    /// displacements are written as zero and patched once the exit offset is
    /// known.
    fn while_loop(&mut self, cond: &Node, body: &Node) -> JitResult<()> {
        let loop_start = self.buf.offset();
        self.number(cond)?;
        encode::xorpd(self.buf, Xmm::Xmm1, Xmm::Xmm1)?;
        encode::ucomisd(self.buf, Xmm::Xmm0, Xmm::Xmm1)?;
        let jump_to_end = encode::je_rel32(self.buf)?;

        self.node(body)?;
        let jump_to_start = encode::jmp_rel32(self.buf)?;

        let loop_end = self.buf.offset();
        encode::patch_rel32(self.buf, jump_to_end, loop_end)?;
        encode::patch_rel32(self.buf, jump_to_start, loop_start)
    }
}
