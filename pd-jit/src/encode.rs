//! x86-64 encodings used by the translator.
//!
//! Each function appends one whole instruction (or one fixed sequence) to a
//! [`CodeBuffer`]. Only the low eight registers are ever named, so no REX.R/B
//! bits are needed.

use crate::buffer::CodeBuffer;
use crate::error::{JitError, JitResult};

const REX_W: u8 = 0x48;

/// Bytes reserved per spilled value; keeps `rsp` 16-byte aligned for calls.
pub const SPILL_SLOT: u8 = 16;

#[cfg(target_os = "windows")]
const SHADOW_SPACE: u8 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Gpr {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Xmm {
    Xmm0 = 0,
    Xmm1 = 1,
    Xmm2 = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ScalarOp {
    Add = 0x58,
    Mul = 0x59,
    Sub = 0x5C,
    Div = 0x5E,
}

/// First pointer argument of a native call.
#[cfg(not(target_os = "windows"))]
pub const ARG0: Gpr = Gpr::Rdi;
/// Second pointer argument of a native call.
#[cfg(not(target_os = "windows"))]
pub const ARG1: Gpr = Gpr::Rsi;
/// Double argument that follows one pointer argument.
#[cfg(not(target_os = "windows"))]
pub const F64_ARG_AFTER_PTR: Xmm = Xmm::Xmm0;

#[cfg(target_os = "windows")]
pub const ARG0: Gpr = Gpr::Rcx;
#[cfg(target_os = "windows")]
pub const ARG1: Gpr = Gpr::Rdx;
#[cfg(target_os = "windows")]
pub const F64_ARG_AFTER_PTR: Xmm = Xmm::Xmm1;

fn modrm_direct(reg: u8, rm: u8) -> u8 {
    0xC0 | (reg << 3) | rm
}

/// ModRM + SIB selecting `[rsp]` with no displacement.
fn modrm_rsp_indirect(reg: u8) -> [u8; 2] {
    [(reg << 3) | 0x04, 0x24]
}

pub fn prologue(buf: &mut CodeBuffer) -> JitResult<()> {
    push(buf, Gpr::Rbp)?;
    mov_reg(buf, Gpr::Rbp, Gpr::Rsp)
}

pub fn epilogue(buf: &mut CodeBuffer) -> JitResult<()> {
    mov_reg(buf, Gpr::Rsp, Gpr::Rbp)?;
    pop(buf, Gpr::Rbp)?;
    buf.emit_byte(0xC3) // ret
}

pub fn mov_imm64(buf: &mut CodeBuffer, dst: Gpr, imm: u64) -> JitResult<()> {
    let mut bytes = [0u8; 10];
    bytes[0] = REX_W;
    bytes[1] = 0xB8 + dst as u8;
    bytes[2..].copy_from_slice(&imm.to_le_bytes());
    buf.emit_bytes(&bytes)
}

/// `mov dst, src` between general-purpose registers.
pub fn mov_reg(buf: &mut CodeBuffer, dst: Gpr, src: Gpr) -> JitResult<()> {
    buf.emit_bytes(&[REX_W, 0x89, modrm_direct(src as u8, dst as u8)])
}

/// `movq xmm, r64`: raw bit move, no conversion.
pub fn movq_xmm_gpr(buf: &mut CodeBuffer, dst: Xmm, src: Gpr) -> JitResult<()> {
    buf.emit_bytes(&[0x66, REX_W, 0x0F, 0x6E, modrm_direct(dst as u8, src as u8)])
}

pub fn movapd(buf: &mut CodeBuffer, dst: Xmm, src: Xmm) -> JitResult<()> {
    buf.emit_bytes(&[0x66, 0x0F, 0x28, modrm_direct(dst as u8, src as u8)])
}

pub fn xorpd(buf: &mut CodeBuffer, dst: Xmm, src: Xmm) -> JitResult<()> {
    buf.emit_bytes(&[0x66, 0x0F, 0x57, modrm_direct(dst as u8, src as u8)])
}

pub fn ucomisd(buf: &mut CodeBuffer, lhs: Xmm, rhs: Xmm) -> JitResult<()> {
    buf.emit_bytes(&[0x66, 0x0F, 0x2E, modrm_direct(lhs as u8, rhs as u8)])
}

/// `addsd`/`subsd`/`mulsd`/`divsd dst, src`, i.e. `dst = dst op src`.
pub fn scalar_sd(buf: &mut CodeBuffer, op: ScalarOp, dst: Xmm, src: Xmm) -> JitResult<()> {
    buf.emit_bytes(&[0xF2, 0x0F, op as u8, modrm_direct(dst as u8, src as u8)])
}

pub fn movsd_store_rsp(buf: &mut CodeBuffer, src: Xmm) -> JitResult<()> {
    let [modrm, sib] = modrm_rsp_indirect(src as u8);
    buf.emit_bytes(&[0xF2, 0x0F, 0x11, modrm, sib])
}

pub fn movsd_load_rsp(buf: &mut CodeBuffer, dst: Xmm) -> JitResult<()> {
    let [modrm, sib] = modrm_rsp_indirect(dst as u8);
    buf.emit_bytes(&[0xF2, 0x0F, 0x10, modrm, sib])
}

pub fn sub_rsp(buf: &mut CodeBuffer, bytes: u8) -> JitResult<()> {
    buf.emit_bytes(&[REX_W, 0x83, 0xEC, bytes])
}

pub fn add_rsp(buf: &mut CodeBuffer, bytes: u8) -> JitResult<()> {
    buf.emit_bytes(&[REX_W, 0x83, 0xC4, bytes])
}

pub fn push(buf: &mut CodeBuffer, reg: Gpr) -> JitResult<()> {
    buf.emit_byte(0x50 + reg as u8)
}

pub fn pop(buf: &mut CodeBuffer, reg: Gpr) -> JitResult<()> {
    buf.emit_byte(0x58 + reg as u8)
}

pub fn call_reg(buf: &mut CodeBuffer, reg: Gpr) -> JitResult<()> {
    buf.emit_bytes(&[0xFF, modrm_direct(2, reg as u8)])
}

/// Calls a fixed native address through `rax`; arguments must already be in
/// place since `rax` is clobbered.
pub fn call_abs(buf: &mut CodeBuffer, addr: u64) -> JitResult<()> {
    #[cfg(target_os = "windows")]
    sub_rsp(buf, SHADOW_SPACE)?;
    mov_imm64(buf, Gpr::Rax, addr)?;
    call_reg(buf, Gpr::Rax)?;
    #[cfg(target_os = "windows")]
    add_rsp(buf, SHADOW_SPACE)?;
    Ok(())
}

/// `je rel32` with a zero placeholder; returns the displacement's offset.
pub fn je_rel32(buf: &mut CodeBuffer) -> JitResult<usize> {
    buf.emit_bytes(&[0x0F, 0x84])?;
    let disp = buf.offset();
    buf.emit_i32(0)?;
    Ok(disp)
}

/// `jmp rel32` with a zero placeholder; returns the displacement's offset.
pub fn jmp_rel32(buf: &mut CodeBuffer) -> JitResult<usize> {
    buf.emit_byte(0xE9)?;
    let disp = buf.offset();
    buf.emit_i32(0)?;
    Ok(disp)
}

/// Points the rel32 at `disp_offset` to `target`, relative to the end of the
/// displacement field.
pub fn patch_rel32(buf: &mut CodeBuffer, disp_offset: usize, target: usize) -> JitResult<()> {
    let rel = (target as i64) - ((disp_offset + 4) as i64);
    let rel = i32::try_from(rel).map_err(|_| {
        JitError::Displacement(format!(
            "jump from {disp_offset} to {target} exceeds rel32 range"
        ))
    })?;
    buf.patch_i32(disp_offset, rel)
}

pub fn helper_address(ptr: *const ()) -> u64 {
    ptr as usize as u64
}
