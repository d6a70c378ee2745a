//! Time block encoding and calendar conversion for the DS1307 RTC.
//!
//! The DS1307 stores date and time in 7 consecutive BCD registers:
//! seconds, minutes, hours, weekday, date, month and year. This module maps
//! that block to [`TimeFields`] and converts [`TimeFields`] to and from
//! chrono's `NaiveDateTime`.
//!
//! # Register Model
//!
//! - Bit 7 of the seconds register is the clock-halt flag.
//! - Bit 6 of the hours register selects 12-hour mode. It is masked off on
//!   read and always cleared on write, so the chip runs in 24-hour mode.
//! - The year register holds years since 2000, two BCD digits.
//!
//! Decoding never validates the BCD digits. Calendar validation only happens
//! when converting to a `NaiveDateTime`.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::bcd::{bcd_to_decimal, chip_field_from_year, decimal_to_bcd, year_from_chip_field};
use crate::registers::{Hours, Seconds, TIME_BLOCK_LEN};

/// Structured time as stored by the chip.
///
/// Fields are not validated against each other: the weekday is whatever the
/// chip holds and the date may be impossible (e.g. February 31st) until it is
/// converted with [`TimeFields::to_datetime`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeFields {
    /// Seconds (0-59)
    pub second: u8,
    /// Minutes (0-59)
    pub minute: u8,
    /// Hours in 24-hour format (0-23)
    pub hour: u8,
    /// Day of week (1-7, 1 = Sunday)
    pub weekday: u8,
    /// Day of month (1-31)
    pub day: u8,
    /// Month (1-12)
    pub month: u8,
    /// Full year. Only 2000-2099 survives a round trip through the chip.
    pub year: i32,
}

impl TimeFields {
    /// Builds the chip fields for a calendar date and time.
    ///
    /// The weekday is derived from the date with Sunday as 1.
    #[must_use]
    pub fn from_datetime(datetime: &NaiveDateTime) -> Self {
        // chrono keeps every component below in range, the casts cannot truncate
        TimeFields {
            second: datetime.second() as u8,
            minute: datetime.minute() as u8,
            hour: datetime.hour() as u8,
            weekday: datetime.weekday().number_from_sunday() as u8,
            day: datetime.day() as u8,
            month: datetime.month() as u8,
            year: datetime.year(),
        }
    }

    /// Converts the fields to a calendar date and time.
    ///
    /// The weekday is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DateTimeError::InvalidDateTime`] if the fields do not name a
    /// real date and time.
    pub fn to_datetime(&self) -> Result<NaiveDateTime, DateTimeError> {
        NaiveDate::from_ymd_opt(self.year, u32::from(self.month), u32::from(self.day))
            .and_then(|d| {
                d.and_hms_opt(
                    u32::from(self.hour),
                    u32::from(self.minute),
                    u32::from(self.second),
                )
            })
            .ok_or(DateTimeError::InvalidDateTime)
    }
}

/// Time fields together with the oscillator state read in the same transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeSnapshot {
    /// Decoded time registers
    pub fields: TimeFields,
    /// Clock-halt flag from the seconds register
    pub clock_halted: bool,
}

/// Raw contents of the 7 time registers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct DS1307DateTime {
    seconds: Seconds,
    minutes: u8,
    hours: Hours,
    weekday: u8,
    date: u8,
    month: u8,
    year: u8,
}

impl DS1307DateTime {
    /// Encodes the fields with the halt flag clear and 24-hour mode selected.
    pub(crate) fn from_fields(fields: &TimeFields) -> Self {
        let mut hours = Hours::default();
        hours.set_bcd(decimal_to_bcd(fields.hour));
        DS1307DateTime {
            seconds: Seconds::running(fields.second),
            minutes: decimal_to_bcd(fields.minute),
            hours,
            weekday: decimal_to_bcd(fields.weekday),
            date: decimal_to_bcd(fields.day),
            month: decimal_to_bcd(fields.month),
            year: decimal_to_bcd(chip_field_from_year(fields.year)),
        }
    }

    pub(crate) fn clock_halted(&self) -> bool {
        self.seconds.clock_halt()
    }

    pub(crate) fn set_clock_halted(&mut self, halted: bool) {
        self.seconds.set_clock_halt(halted);
    }

    /// Decodes the block. The halt flag and the 12-hour bit are dropped.
    pub(crate) fn into_fields(self) -> TimeFields {
        TimeFields {
            second: bcd_to_decimal(self.seconds.bcd()),
            minute: bcd_to_decimal(self.minutes),
            hour: bcd_to_decimal(self.hours.bcd()),
            weekday: bcd_to_decimal(self.weekday),
            day: bcd_to_decimal(self.date),
            month: bcd_to_decimal(self.month),
            year: year_from_chip_field(bcd_to_decimal(self.year)),
        }
    }

    pub(crate) fn into_snapshot(self) -> TimeSnapshot {
        TimeSnapshot {
            clock_halted: self.clock_halted(),
            fields: self.into_fields(),
        }
    }
}

impl From<[u8; TIME_BLOCK_LEN]> for DS1307DateTime {
    fn from(data: [u8; TIME_BLOCK_LEN]) -> Self {
        DS1307DateTime {
            seconds: Seconds::from(data[0]),
            minutes: data[1],
            hours: Hours::from(data[2]),
            weekday: data[3],
            date: data[4],
            month: data[5],
            year: data[6],
        }
    }
}

impl From<&DS1307DateTime> for [u8; TIME_BLOCK_LEN] {
    fn from(dt: &DS1307DateTime) -> [u8; TIME_BLOCK_LEN] {
        [
            u8::from(dt.seconds),
            dt.minutes,
            u8::from(dt.hours),
            dt.weekday,
            dt.date,
            dt.month,
            dt.year,
        ]
    }
}

/// Errors that can occur while converting between chip fields and calendar time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DateTimeError {
    /// The chip fields do not form a valid calendar date and time
    InvalidDateTime,
    /// The timestamp cannot be represented as a calendar date
    TimestampOutOfRange,
}
