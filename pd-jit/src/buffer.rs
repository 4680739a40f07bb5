use crate::error::{JitError, JitResult};
use crate::memory::ExecutableMemory;

/// Fixed-capacity code region with a write cursor.
///
/// Every write checks the full length first, so a failed write leaves both
/// the bytes and the cursor untouched.
#[derive(Debug)]
pub struct CodeBuffer {
    memory: ExecutableMemory,
    offset: usize,
}

impl CodeBuffer {
    pub fn new(capacity: usize) -> JitResult<Self> {
        let memory = ExecutableMemory::allocate(capacity)?;
        Ok(Self { memory, offset: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.capacity() - self.offset
    }

    /// Bytes written so far.
    pub fn code(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.memory.as_ptr(), self.offset) }
    }

    pub fn emit_byte(&mut self, byte: u8) -> JitResult<()> {
        self.emit_bytes(&[byte])
    }

    pub fn emit_i32(&mut self, value: i32) -> JitResult<()> {
        self.emit_bytes(&value.to_le_bytes())
    }

    pub fn emit_i64(&mut self, value: i64) -> JitResult<()> {
        self.emit_bytes(&value.to_le_bytes())
    }

    pub fn emit_nop(&mut self) -> JitResult<()> {
        self.emit_byte(0x90)
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) -> JitResult<()> {
        self.check_range(self.offset, bytes.len())?;
        self.write_at(self.offset, bytes);
        self.offset += bytes.len();
        Ok(())
    }

    /// Overwrites four already-emitted bytes; the cursor does not move.
    pub fn patch_i32(&mut self, offset: usize, value: i32) -> JitResult<()> {
        self.check_range(offset, 4)?;
        self.write_at(offset, &value.to_le_bytes());
        Ok(())
    }

    pub fn into_memory(self) -> ExecutableMemory {
        self.memory
    }

    fn check_range(&self, offset: usize, len: usize) -> JitResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(()),
            _ => Err(JitError::BufferOverflow {
                offset,
                len,
                capacity: self.capacity(),
            }),
        }
    }

    fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.memory.as_ptr().add(offset),
                bytes.len(),
            );
        }
    }
}
