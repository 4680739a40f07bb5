use std::ffi::{CStr, c_char};
use std::marker::PhantomData;

use tracing::debug;

use crate::ast::Node;
use crate::buffer::CodeBuffer;
use crate::encode;
use crate::error::{JitError, JitResult};
use crate::logging::category_jit;
use crate::memory::ExecutableMemory;
use crate::translator::{self, RuntimeContext, ValueKind};

pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JitConfig {
    pub enabled: bool,
    pub buffer_capacity: usize,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            enabled: native_jit_supported(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

pub fn native_jit_supported() -> bool {
    cfg!(target_arch = "x86_64") && (cfg!(unix) || cfg!(target_os = "windows"))
}

type UnitEntry = unsafe extern "C" fn();
type NumberEntry = unsafe extern "C" fn() -> f64;
type StringEntry = unsafe extern "C" fn() -> *const c_char;

#[derive(Debug, Default)]
pub struct Jit {
    config: JitConfig,
}

impl Jit {
    pub fn new(config: JitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: JitConfig) {
        self.config = config;
    }

    /// Compiles `node` into a standalone native function.
    ///
    /// The returned code borrows the tree (string literals are referenced in
    /// place) and the context's cell (its address is an immediate operand).
    pub fn compile<'a>(
        &self,
        node: &'a Node,
        ctx: &RuntimeContext<'a>,
    ) -> JitResult<CompiledCode<'a>> {
        if !self.config.enabled {
            return Err(JitError::Disabled);
        }
        if !native_jit_supported() {
            return Err(JitError::UnsupportedTarget);
        }

        let mut buf = CodeBuffer::new(self.config.buffer_capacity)?;
        encode::prologue(&mut buf)?;
        let result = translator::compile(&mut buf, node, ctx)?;
        encode::epilogue(&mut buf)?;

        let len = buf.offset();
        debug!(
            "{} compiled '{}' tree into {len} bytes ({result} result, capacity {})",
            category_jit(),
            node.kind(),
            buf.capacity()
        );
        Ok(CompiledCode {
            memory: buf.into_memory(),
            len,
            result,
            owns_result: matches!(node, Node::Concat(_, _)),
            _borrows: PhantomData,
        })
    }
}

/// Executable function produced by [`Jit::compile`]; unmapped on drop.
#[derive(Debug)]
pub struct CompiledCode<'a> {
    memory: ExecutableMemory,
    len: usize,
    result: ValueKind,
    owns_result: bool,
    _borrows: PhantomData<&'a ()>,
}

impl CompiledCode<'_> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn result_kind(&self) -> ValueKind {
        self.result
    }

    pub fn code(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.memory.as_ptr(), self.len) }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.memory.as_ptr()
    }

    /// Runs the code for its side effects, discarding any result.
    pub fn run(&self) {
        if self.result == ValueKind::String && self.owns_result {
            let ptr = unsafe { (self.string_entry())() };
            unsafe { libc::free(ptr as *mut libc::c_void) };
        } else {
            unsafe { (self.unit_entry())() };
        }
    }

    pub fn run_number(&self) -> JitResult<f64> {
        self.expect_result(ValueKind::Number)?;
        Ok(unsafe { (self.number_entry())() })
    }

    /// Runs string-producing code and copies the result out.
    ///
    /// A freshly concatenated result is freed after the copy; literal and
    /// cell-owned results are left alone.
    pub fn run_string(&self) -> JitResult<String> {
        self.expect_result(ValueKind::String)?;
        let ptr = unsafe { (self.string_entry())() };
        let text = unsafe { CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned();
        if self.owns_result {
            unsafe { libc::free(ptr as *mut libc::c_void) };
        }
        Ok(text)
    }

    fn expect_result(&self, expected: ValueKind) -> JitResult<()> {
        if self.result == expected {
            Ok(())
        } else {
            Err(JitError::ResultKind {
                expected,
                actual: self.result,
            })
        }
    }

    fn unit_entry(&self) -> UnitEntry {
        unsafe { std::mem::transmute::<*mut u8, UnitEntry>(self.memory.as_ptr()) }
    }

    fn number_entry(&self) -> NumberEntry {
        unsafe { std::mem::transmute::<*mut u8, NumberEntry>(self.memory.as_ptr()) }
    }

    fn string_entry(&self) -> StringEntry {
        unsafe { std::mem::transmute::<*mut u8, StringEntry>(self.memory.as_ptr()) }
    }
}
