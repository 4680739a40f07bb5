mod common;

use common::*;

const FRAME_BYTES: usize = 4 + 5;
const NUMBER_LITERAL_BYTES: usize = 10 + 5;

fn host_can_map() -> bool {
    cfg!(any(unix, target_os = "windows"))
}

#[test]
fn translation_fits_exact_capacity() {
    if !host_can_map() {
        return;
    }
    let cell = ValueCell::new();
    let ctx = RuntimeContext::new(VAR, &cell);

    let mut buf = CodeBuffer::new(NUMBER_LITERAL_BYTES).expect("buffer");
    let kind = jit::compile(&mut buf, &num(2.0), &ctx).expect("fits exactly");
    assert_eq!(kind, ValueKind::Number);
    assert_eq!(buf.offset(), NUMBER_LITERAL_BYTES);
    assert_eq!(buf.remaining(), 0);
}

#[test]
fn translation_one_byte_short_overflows() {
    if !host_can_map() {
        return;
    }
    let cell = ValueCell::new();
    let ctx = RuntimeContext::new(VAR, &cell);

    let mut buf = CodeBuffer::new(NUMBER_LITERAL_BYTES - 1).expect("buffer");
    let err = jit::compile(&mut buf, &num(2.0), &ctx).expect_err("one byte short");
    assert!(err.is_overflow(), "unexpected error {err:?}");
    // The immediate load fit; the movq that follows was refused whole.
    assert_eq!(
        err,
        JitError::BufferOverflow {
            offset: 10,
            len: 5,
            capacity: NUMBER_LITERAL_BYTES - 1
        }
    );
    assert_eq!(buf.offset(), 10);
}

#[test]
fn compiled_function_fits_exact_capacity() {
    if !native_jit_supported() {
        return;
    }
    let cell = ValueCell::new();
    let ctx = RuntimeContext::new(VAR, &cell);
    let node = num(-6.5);
    let exact = FRAME_BYTES + NUMBER_LITERAL_BYTES;

    let jit = Jit::new(JitConfig {
        enabled: true,
        buffer_capacity: exact,
    });
    let code = jit.compile(&node, &ctx).expect("fits exactly");
    assert_eq!(code.len(), exact);
    assert_eq!(code.run_number().expect("run"), -6.5);

    let jit = Jit::new(JitConfig {
        enabled: true,
        buffer_capacity: exact - 1,
    });
    let err = jit.compile(&node, &ctx).expect_err("one byte short");
    assert!(err.is_overflow(), "unexpected error {err:?}");
}

#[test]
fn loop_overflow_during_backpatch_region_fails_cleanly() {
    if !native_jit_supported() {
        return;
    }
    let cell = ValueCell::with_number(3.0);
    let ctx = RuntimeContext::new(VAR, &cell);
    let node = countdown();

    let full = Jit::default().compile(&node, &ctx).expect("compile").len();
    for capacity in [full - 1, full - 6, FRAME_BYTES + 20] {
        let jit = Jit::new(JitConfig {
            enabled: true,
            buffer_capacity: capacity,
        });
        let err = jit.compile(&node, &ctx).expect_err("too small");
        assert!(err.is_overflow(), "capacity {capacity}: {err:?}");
    }
    assert_eq!(cell.number(), 3.0, "failed compiles must not run anything");
}

#[test]
fn unsupported_kind_emits_nothing() {
    if !host_can_map() {
        return;
    }
    let cell = ValueCell::new();
    let ctx = RuntimeContext::new(VAR, &cell);
    let unsupported = [
        Node::Print(vec![x()]),
        Node::Block(vec![Node::assign(VAR, num(1.0))]),
        Node::Call {
            name: "length".to_string(),
            args: vec![x()],
        },
        Node::Compare {
            op: CompareOp::Le,
            lhs: Box::new(x()),
            rhs: Box::new(num(3.0)),
        },
    ];
    for node in unsupported {
        let mut buf = CodeBuffer::new(64).expect("buffer");
        buf.emit_nop().expect("marker byte");
        let err = jit::compile(&mut buf, &node, &ctx).expect_err("not compilable");
        assert_eq!(err, JitError::Unsupported(node.kind()));
        assert_eq!(buf.offset(), 1, "{} wrote bytes", node.kind());
    }
}

#[test]
fn unsupported_subtree_fails_whole_compile() {
    if !native_jit_supported() {
        return;
    }
    let cell = ValueCell::new();
    let ctx = RuntimeContext::new(VAR, &cell);
    let node = Node::while_loop(x(), Node::Block(vec![countdown()]));
    let err = Jit::default()
        .compile(&node, &ctx)
        .expect_err("block body is not compiled");
    assert_eq!(err, JitError::Unsupported(NodeKind::Block));
    assert_eq!(
        err.to_string(),
        "unsupported node kind 'block'",
        "message names the kind"
    );
}
