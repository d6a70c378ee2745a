//! Binary-coded decimal helpers for the DS1307 registers.
//!
//! The chip keeps every time field as two BCD digits. These functions do not
//! validate their input: out-of-range decimals and non-BCD nibbles still map
//! to a deterministic value, which is how the chip's own registers behave.

/// Offset of the chip's two-digit year field.
pub const BASE_YEAR: i32 = 2000;

/// Encodes a decimal value (0-99) as BCD: tens digit in the high nibble,
/// ones digit in the low nibble.
#[must_use]
pub const fn decimal_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Decodes a BCD byte as `high nibble * 10 + low nibble`.
///
/// Nibbles above 9 are not rejected, so `0x1A` decodes to 20.
#[must_use]
pub const fn bcd_to_decimal(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

/// Converts the decoded year register (years since 2000) to a full year.
#[must_use]
pub const fn year_from_chip_field(field: u8) -> i32 {
    BASE_YEAR + field as i32
}

/// Converts a full year to the chip's year field.
///
/// Only the low two decimal digits of `year - 2000` survive, so 2100 and
/// 2000 share the same field.
#[must_use]
pub const fn chip_field_from_year(year: i32) -> u8 {
    // reduce before subtracting so extreme years cannot overflow; the
    // result stays in 0..100 and the cast cannot truncate
    (year.rem_euclid(100) - BASE_YEAR.rem_euclid(100)).rem_euclid(100) as u8
}
