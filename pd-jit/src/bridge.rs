//! Native helpers called from generated code.
//!
//! Generated code embeds the address of each routine as an immediate and
//! calls it with the platform C ABI. Nothing here can report an error back to
//! the caller: machine code frames have no unwind path, so an impossible
//! request aborts the process instead.
//!
//! Every cell or string pointer must come from a live [`ValueCell`] or
//! NUL-terminated buffer; the translator only embeds addresses borrowed for
//! the lifetime of the compiled code, so these stay crate-private.

use std::ffi::{CStr, c_char};

use tracing::error;

use crate::cell::ValueCell;

pub(crate) extern "C" fn jit_read_number(cell: *const ValueCell) -> f64 {
    debug_assert!(!cell.is_null());
    let cell = unsafe { &*cell };
    cell.number()
}

pub(crate) extern "C" fn jit_write_number(cell: *const ValueCell, value: f64) {
    debug_assert!(!cell.is_null());
    let cell = unsafe { &*cell };
    cell.set_number(value);
}

pub(crate) extern "C" fn jit_read_string(cell: *const ValueCell) -> *const c_char {
    debug_assert!(!cell.is_null());
    let cell = unsafe { &*cell };
    cell.string_ptr()
}

pub(crate) extern "C" fn jit_write_string(cell: *const ValueCell, text: *const c_char) {
    debug_assert!(!cell.is_null() && !text.is_null());
    let cell = unsafe { &*cell };
    let text = unsafe { CStr::from_ptr(text) };
    cell.set_string(text);
}

/// Joins two NUL-terminated strings into a fresh `malloc` block.
///
/// The block is never freed by compiled code. Both operands are copied; the
/// prefix is not left uninitialized.
pub(crate) extern "C" fn jit_concat(lhs: *const c_char, rhs: *const c_char) -> *mut c_char {
    debug_assert!(!lhs.is_null() && !rhs.is_null());
    let lhs_len = unsafe { libc::strlen(lhs) };
    let rhs_len = unsafe { libc::strlen(rhs) };
    let total = lhs_len + rhs_len;
    let result = unsafe { libc::malloc(total + 1) } as *mut c_char;
    if result.is_null() {
        error!("jit concat could not allocate {} bytes", total + 1);
        std::process::abort();
    }
    unsafe {
        std::ptr::copy_nonoverlapping(lhs, result, lhs_len);
        std::ptr::copy_nonoverlapping(rhs, result.add(lhs_len), rhs_len);
        *result.add(total) = 0;
    }
    result
}

/// Floating remainder; the sign follows the dividend.
pub(crate) extern "C" fn jit_fmod(lhs: f64, rhs: f64) -> f64 {
    lhs % rhs
}

pub(crate) fn read_number_addr() -> *const () {
    jit_read_number as *const ()
}

pub(crate) fn write_number_addr() -> *const () {
    jit_write_number as *const ()
}

pub(crate) fn read_string_addr() -> *const () {
    jit_read_string as *const ()
}

pub(crate) fn write_string_addr() -> *const () {
    jit_write_string as *const ()
}

pub(crate) fn concat_addr() -> *const () {
    jit_concat as *const ()
}

pub(crate) fn fmod_addr() -> *const () {
    jit_fmod as *const ()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take_c_string(ptr: *mut c_char) -> String {
        let text = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        unsafe { libc::free(ptr as *mut libc::c_void) };
        text
    }

    #[test]
    fn number_accessors_reach_the_cell() {
        let cell = ValueCell::new();
        jit_write_number(&cell, -12.75);
        assert_eq!(cell.number(), -12.75);
        assert_eq!(jit_read_number(&cell), -12.75);
    }

    #[test]
    fn string_accessors_copy_into_the_cell() {
        let cell = ValueCell::with_number(3.5);
        let materialized = unsafe { CStr::from_ptr(jit_read_string(&cell)) };
        assert_eq!(materialized.to_str().expect("utf8"), "3.5");

        let source = c"12 apples".to_owned();
        jit_write_string(&cell, source.as_ptr());
        drop(source);
        assert_eq!(cell.string(), "12 apples");
        assert_eq!(jit_read_number(&cell), 12.0);
    }

    #[test]
    fn concat_joins_both_operands() {
        let joined = take_c_string(jit_concat(c"left-".as_ptr(), c"right".as_ptr()));
        assert_eq!(joined, "left-right");
    }

    #[test]
    fn concat_handles_empty_operands() {
        assert_eq!(take_c_string(jit_concat(c"".as_ptr(), c"b".as_ptr())), "b");
        assert_eq!(take_c_string(jit_concat(c"a".as_ptr(), c"".as_ptr())), "a");
        assert_eq!(take_c_string(jit_concat(c"".as_ptr(), c"".as_ptr())), "");
    }

    #[test]
    fn fmod_follows_dividend_sign() {
        assert_eq!(jit_fmod(7.0, 3.0), 1.0);
        assert_eq!(jit_fmod(-7.0, 3.0), -1.0);
        assert_eq!(jit_fmod(7.0, -3.0), 1.0);
        assert_eq!(jit_fmod(2.5, 1.0), 0.5);
        assert!(jit_fmod(1.0, 0.0).is_nan());
    }

    #[test]
    fn helper_addresses_point_at_the_bridges() {
        let addresses = [
            read_number_addr(),
            write_number_addr(),
            read_string_addr(),
            write_string_addr(),
            concat_addr(),
            fmod_addr(),
        ];
        for (index, address) in addresses.iter().enumerate() {
            assert!(!address.is_null());
            assert!(
                addresses[index + 1..].iter().all(|other| other != address),
                "helper {index} shares an address"
            );
        }
    }
}
