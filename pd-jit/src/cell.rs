use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString, c_char};

const NUM: u8 = 0b01;
const STR: u8 = 0b10;

/// Interpreter variable slot holding a number and/or a string.
///
/// Compiled code reaches a cell only through the bridge routines, which take
/// `*const ValueCell`. All mutation goes through interior mutability, so the
/// cell can stay shared-borrowed by the caller while native code updates it.
#[derive(Debug)]
pub struct ValueCell {
    flags: Cell<u8>,
    number: Cell<f64>,
    text: RefCell<CString>,
}

impl Default for ValueCell {
    fn default() -> Self {
        Self {
            flags: Cell::new(NUM | STR),
            number: Cell::new(0.0),
            text: RefCell::new(CString::default()),
        }
    }
}

impl ValueCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_number(value: f64) -> Self {
        let cell = Self::default();
        cell.set_number(value);
        cell
    }

    pub fn with_string(text: &CStr) -> Self {
        let cell = Self::default();
        cell.set_string(text);
        cell
    }

    pub fn is_number(&self) -> bool {
        self.flags.get() & NUM != 0
    }

    pub fn is_string(&self) -> bool {
        self.flags.get() & STR != 0
    }

    /// Numeric payload; a string-only cell yields its leading numeric prefix.
    pub fn number(&self) -> f64 {
        if self.is_number() {
            return self.number.get();
        }
        let text = self.text.borrow();
        parse_number_prefix(&text.to_string_lossy())
    }

    pub fn set_number(&self, value: f64) {
        self.number.set(value);
        self.flags.set(NUM);
    }

    /// Pointer to the string payload, materialized from the number if needed.
    ///
    /// Stays valid until the next `set_string`/`set_number` on this cell.
    pub fn string_ptr(&self) -> *const c_char {
        if !self.is_string() {
            *self.text.borrow_mut() = number_to_cstring(self.number.get());
            self.flags.set(self.flags.get() | STR);
        }
        self.text.borrow().as_ptr()
    }

    pub fn string(&self) -> String {
        self.string_ptr();
        self.text.borrow().to_string_lossy().into_owned()
    }

    pub fn set_string(&self, text: &CStr) {
        let owned = text.to_owned();
        *self.text.borrow_mut() = owned;
        self.flags.set(STR);
    }
}

fn number_to_cstring(value: f64) -> CString {
    // Formatted numbers never contain NUL.
    CString::new(format_number(value)).unwrap_or_default()
}

/// Integral values print as integers, everything else like `%.6g`.
pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        return if value.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == value.trunc() && value.abs() < 1e18 {
        return format!("{}", value as i64);
    }
    format_general(value, 6)
}

fn format_general(value: f64, precision: usize) -> String {
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

pub(crate) fn parse_number_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0usize;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        let frac_start = end;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
        digits += end - frac_start;
    }
    if digits == 0 {
        return 0.0;
    }
    let mut accepted = end;
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            accepted = exp_end;
        }
    }
    trimmed[..accepted].parse().unwrap_or(0.0)
}
