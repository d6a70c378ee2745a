//! Register definitions and bitfield structures for the DS1307 RTC.
//!
//! The time block lives at 0x00-0x06 and the calibration byte at 0x07. Only
//! the registers that carry flags besides their BCD value get a bitfield type;
//! the remaining time registers are plain BCD bytes.

use bitfield::bitfield;

use crate::bcd::decimal_to_bcd;

/// Register addresses for the DS1307 RTC.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Seconds register (0-59) and clock-halt flag
    Seconds = 0x00,
    /// Minutes register (0-59)
    Minutes = 0x01,
    /// Hours register (0-23)
    Hours = 0x02,
    /// Day of week register (1-7)
    Weekday = 0x03,
    /// Day of month register (1-31)
    Date = 0x04,
    /// Month register (1-12)
    Month = 0x05,
    /// Year register (0-99)
    Year = 0x06,
    /// Calibration register
    Calibration = 0x07,
}

/// Number of registers in the time block starting at [`RegAddr::Seconds`].
pub const TIME_BLOCK_LEN: usize = 7;

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Seconds register: BCD seconds plus the clock-halt flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Seconds(u8);
    impl Debug;
    /// Clock halt: set means the oscillator is stopped
    pub clock_halt, set_clock_halt: 7;
    /// BCD seconds (0x00-0x59)
    pub bcd, set_bcd: 6, 0;
}
from_register_u8!(Seconds);

impl Seconds {
    /// Builds a seconds register from a decimal value with the halt flag clear.
    #[must_use]
    pub fn running(second: u8) -> Self {
        let mut value = Seconds::default();
        value.set_bcd(decimal_to_bcd(second));
        value
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Seconds {
    fn format(&self, f: defmt::Formatter) {
        let seconds = crate::bcd::bcd_to_decimal(self.bcd());
        defmt::write!(f, "Seconds({}s halted={})", seconds, self.clock_halt());
    }
}

bitfield! {
    /// Hours register. The driver always runs the chip in 24-hour mode.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Hours(u8);
    impl Debug;
    /// 12-hour mode select, ignored on read and cleared on write
    pub twelve_hour, set_twelve_hour: 6;
    /// BCD hours in 24-hour format (0x00-0x23)
    pub bcd, set_bcd: 5, 0;
}
from_register_u8!(Hours);

#[cfg(feature = "defmt")]
impl defmt::Format for Hours {
    fn format(&self, f: defmt::Formatter) {
        let hours = crate::bcd::bcd_to_decimal(self.bcd());
        defmt::write!(f, "Hours({}h)", hours);
    }
}

bitfield! {
    /// Calibration register in sign-magnitude form.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Calibration(u8);
    impl Debug;
    /// S-bit: set speeds the clock up, clear slows it down
    pub speed_up, set_speed_up: 5;
    /// Calibration magnitude (0-31)
    pub magnitude, set_magnitude: 4, 0;
}
from_register_u8!(Calibration);

impl Calibration {
    /// Encodes a signed calibration value.
    ///
    /// Magnitudes above 31 keep only their low five bits. Zero counts as a
    /// positive value and sets the S-bit.
    #[must_use]
    pub fn from_offset(offset: i8) -> Self {
        let mut value = Calibration::default();
        value.set_magnitude(offset.unsigned_abs() & 0x1F);
        value.set_speed_up(offset >= 0);
        value
    }

    /// Decodes the signed calibration value (-31..=31).
    #[must_use]
    pub fn offset(&self) -> i8 {
        // five bits always fit in an i8
        let magnitude = self.magnitude() as i8;
        if self.speed_up() {
            magnitude
        } else {
            -magnitude
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Calibration {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Calibration({})", self.offset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_register_conversions() {
        let seconds = Seconds::from(0x59);
        assert!(!seconds.clock_halt());
        assert_eq!(seconds.bcd(), 0x59);
        assert_eq!(u8::from(seconds), 0x59);

        let seconds = Seconds::from(0xB0); // halted at 30 seconds
        assert!(seconds.clock_halt());
        assert_eq!(seconds.bcd(), 0x30);
        assert_eq!(u8::from(seconds), 0xB0);
    }

    #[test]
    fn test_seconds_running() {
        let seconds = Seconds::running(42);
        assert!(!seconds.clock_halt());
        assert_eq!(u8::from(seconds), 0x42);
    }

    #[test]
    fn test_seconds_set_clock_halt() {
        let mut seconds = Seconds::running(7);
        seconds.set_clock_halt(true);
        assert_eq!(u8::from(seconds), 0x87);
        seconds.set_clock_halt(false);
        assert_eq!(u8::from(seconds), 0x07);
    }

    #[test]
    fn test_hours_register_ignores_mode_bit() {
        let hours = Hours::from(0x23);
        assert!(!hours.twelve_hour());
        assert_eq!(hours.bcd(), 0x23);

        // 12-hour bit set, the BCD field still only sees bits 0-5
        let hours = Hours::from(0x52);
        assert!(hours.twelve_hour());
        assert_eq!(hours.bcd(), 0x12);

        let hours = Hours::from(0xC8);
        assert_eq!(hours.bcd(), 0x08);
    }

    #[test]
    fn test_calibration_from_offset() {
        assert_eq!(u8::from(Calibration::from_offset(17)), 0x20 | 17);
        assert_eq!(u8::from(Calibration::from_offset(-17)), 17);
        assert_eq!(u8::from(Calibration::from_offset(0)), 0x20);
        assert_eq!(u8::from(Calibration::from_offset(31)), 0x3F);
        assert_eq!(u8::from(Calibration::from_offset(-31)), 0x1F);
    }

    #[test]
    fn test_calibration_truncates_large_magnitudes() {
        // 40 = 0b10_1000, only the low five bits are kept
        assert_eq!(Calibration::from_offset(40).magnitude(), 8);
        assert_eq!(Calibration::from_offset(-40).offset(), -8);
        assert_eq!(Calibration::from_offset(i8::MIN).offset(), 0);
        assert!(!Calibration::from_offset(i8::MIN).speed_up());
    }

    #[test]
    fn test_calibration_offset_decoding() {
        assert_eq!(Calibration::from(0x31).offset(), 17);
        assert_eq!(Calibration::from(0x11).offset(), -17);
        assert_eq!(Calibration::from(0x20).offset(), 0);
        assert_eq!(Calibration::from(0x00).offset(), 0);
        // reserved bits are ignored
        assert_eq!(Calibration::from(0xE5).offset(), 5);
    }

    #[test]
    fn test_register_addresses() {
        assert_eq!(RegAddr::Seconds as u8, 0x00);
        assert_eq!(RegAddr::Year as u8, 0x06);
        assert_eq!(RegAddr::Calibration as u8, 0x07);
    }
}
