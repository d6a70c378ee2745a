//! A platform-agnostic driver for the DS1307 battery-backed real-time clock.
//!
//! The driver converts between calendar time and the chip's BCD registers,
//! reports whether the oscillator is running and exposes the calibration
//! register. It talks to the chip through the [`Bus`] trait; [`I2cBus`]
//! implements it for any `embedded-hal` I2C bus.
//!
//! # Example
//!
//! ```rust,ignore
//! use ds1307::{DS1307, I2cBus, RunState};
//!
//! let mut rtc = DS1307::new(I2cBus::new(i2c));
//!
//! if rtc.is_running() == RunState::Stopped {
//!     rtc.set_datetime(&datetime)?;
//! }
//! let now = rtc.datetime()?;
//! ```
//!
//! # Setting the time
//!
//! A write happens in two transfers. The first halts the oscillator and loads
//! every field with the seconds register still flagged as halted. The second
//! writes the real seconds value, which restarts the oscillator. If the
//! second transfer fails the chip is left halted with the new calendar
//! fields; [`DS1307::is_running`] reports [`RunState::Stopped`] and
//! [`DS1307::start_clock`] finishes the job.
//!
//! # Features
//!
//! - `async`: async driver in [`asynch`] on top of `embedded-hal-async`
//! - `log`: logging through the `log` crate
//! - `defmt`: logging and `defmt::Format` implementations through `defmt`
#![no_std]

cfg_if::cfg_if! {
    if #[cfg(feature = "defmt")] {
        #[allow(unused_macros)]
        macro_rules! debug {
            ($($arg:tt)*) => { defmt::debug!($($arg)*) };
        }
        #[allow(unused_macros)]
        macro_rules! warn {
            ($($arg:tt)*) => { defmt::warn!($($arg)*) };
        }
    } else if #[cfg(feature = "log")] {
        #[allow(unused_macros)]
        macro_rules! debug {
            ($($arg:tt)*) => { log::debug!($($arg)*) };
        }
        #[allow(unused_macros)]
        macro_rules! warn {
            ($($arg:tt)*) => { log::warn!($($arg)*) };
        }
    } else {
        #[allow(unused_macros)]
        macro_rules! debug {
            ($($arg:tt)*) => {{}};
        }
        #[allow(unused_macros)]
        macro_rules! warn {
            ($($arg:tt)*) => {{}};
        }
    }
}

#[cfg(feature = "async")]
pub mod asynch;
pub mod bcd;
mod bus;
mod datetime;
mod registers;

use chrono::{DateTime, NaiveDateTime, Utc};
use paste::paste;

pub use crate::bus::{Bus, I2cBus};
pub use crate::datetime::{DateTimeError, TimeFields, TimeSnapshot};
pub use crate::registers::{Calibration, Hours, RegAddr, Seconds, TIME_BLOCK_LEN};

use crate::datetime::DS1307DateTime;

/// Fixed I2C address of the DS1307.
pub const DEVICE_ADDRESS: u8 = 0x68;

/// Value returned by [`DS1307::get_calibration`] when the chip could not be
/// read. Valid calibration values are in -31..=31.
pub const CALIBRATION_ERROR: i8 = 64;

/// Errors reported by the driver.
#[derive(Debug, PartialEq)]
pub enum DS1307Error<E> {
    /// The bus transfer failed (no acknowledge, timeout, ...)
    Bus(E),
    /// The chip returned fewer bytes than requested
    ShortRead,
    /// The registers were read but the oscillator is halted
    ClockHalted,
    /// Calendar conversion failed
    DateTime(DateTimeError),
}

impl<E> From<DateTimeError> for DS1307Error<E> {
    fn from(e: DateTimeError) -> Self {
        DS1307Error::DateTime(e)
    }
}

/// Oscillator state as reported by [`DS1307::is_running`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    /// The clock-halt flag is clear
    Running,
    /// The clock-halt flag is set
    Stopped,
    /// The chip could not be read
    Unknown,
}

/// DS1307 Real-Time Clock driver.
pub struct DS1307<B: Bus> {
    bus: B,
    present: bool,
}

impl<B: Bus> DS1307<B> {
    /// Creates a new driver. The chip is not accessed until the first
    /// operation, so [`chip_present`](Self::chip_present) starts out false.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            present: false,
        }
    }

    /// Releases the bus.
    pub fn destroy(self) -> B {
        self.bus
    }

    /// Returns whether the chip answered the last bus transfer.
    pub fn chip_present(&self) -> bool {
        self.present
    }

    /// Records the outcome of a bus transfer in the presence flag.
    fn track<T>(&mut self, result: Result<T, B::Error>) -> Result<T, DS1307Error<B::Error>> {
        match result {
            Ok(value) => {
                self.present = true;
                Ok(value)
            }
            Err(e) => {
                warn!("DS1307: no response on the bus");
                self.present = false;
                Err(DS1307Error::Bus(e))
            }
        }
    }

    /// Points the chip at `start` and reads `buffer.len()` registers.
    fn read_registers(
        &mut self,
        start: RegAddr,
        buffer: &mut [u8],
    ) -> Result<(), DS1307Error<B::Error>> {
        let result = self.bus.write_register_pointer(DEVICE_ADDRESS, start as u8);
        self.track(result)?;
        let result = self.bus.read_block(DEVICE_ADDRESS, buffer);
        let received = self.track(result)?;
        if received < buffer.len() {
            warn!(
                "DS1307: short read, {} of {} bytes",
                received,
                buffer.len()
            );
            return Err(DS1307Error::ShortRead);
        }
        Ok(())
    }

    fn write_registers(&mut self, start: RegAddr, data: &[u8]) -> Result<(), DS1307Error<B::Error>> {
        let result = self.bus.write_block(DEVICE_ADDRESS, start as u8, data);
        self.track(result)
    }

    /// Reads the time registers without checking the clock-halt flag.
    ///
    /// # Errors
    ///
    /// * `DS1307Error::Bus` if a transfer fails
    /// * `DS1307Error::ShortRead` if the chip sends fewer than 7 bytes
    pub fn snapshot(&mut self) -> Result<TimeSnapshot, DS1307Error<B::Error>> {
        let mut data = [0; TIME_BLOCK_LEN];
        self.read_registers(RegAddr::Seconds, &mut data)?;
        debug!("DS1307: read time block {:?}", data);
        Ok(DS1307DateTime::from(data).into_snapshot())
    }

    /// Reads the time registers.
    ///
    /// # Errors
    ///
    /// * `DS1307Error::Bus` if a transfer fails
    /// * `DS1307Error::ShortRead` if the chip sends fewer than 7 bytes
    /// * `DS1307Error::ClockHalted` if the oscillator is stopped; the fields
    ///   are discarded
    pub fn read(&mut self) -> Result<TimeFields, DS1307Error<B::Error>> {
        let snapshot = self.snapshot()?;
        if snapshot.clock_halted {
            warn!("DS1307: clock is halted");
            return Err(DS1307Error::ClockHalted);
        }
        Ok(snapshot.fields)
    }

    /// Writes the time registers and starts the oscillator.
    ///
    /// The first transfer writes every field with the clock-halt flag set,
    /// the second writes the seconds with the flag clear. If the first
    /// transfer fails the whole write must be repeated. If only the second
    /// one fails the chip holds the new fields but stays halted, and
    /// [`start_clock`](Self::start_clock) completes the write.
    ///
    /// # Errors
    ///
    /// * `DS1307Error::Bus` if either transfer fails
    pub fn write(&mut self, fields: &TimeFields) -> Result<(), DS1307Error<B::Error>> {
        let mut raw = DS1307DateTime::from_fields(fields);
        raw.set_clock_halted(true);
        let data: [u8; TIME_BLOCK_LEN] = (&raw).into();
        debug!("DS1307: loading time block {:?}", data);
        self.write_registers(RegAddr::Seconds, &data)?;
        self.start_clock(fields.second)
    }

    /// Writes the seconds register with the clock-halt flag clear, which
    /// restarts a halted oscillator.
    ///
    /// # Errors
    ///
    /// * `DS1307Error::Bus` if the transfer fails
    pub fn start_clock(&mut self, second: u8) -> Result<(), DS1307Error<B::Error>> {
        self.set_seconds_register(Seconds::running(second))
    }

    /// Gets the current date and time.
    ///
    /// # Errors
    ///
    /// * any error from [`read`](Self::read)
    /// * `DS1307Error::DateTime` if the registers do not hold a valid date
    pub fn datetime(&mut self) -> Result<NaiveDateTime, DS1307Error<B::Error>> {
        let fields = self.read()?;
        Ok(fields.to_datetime()?)
    }

    /// Sets the current date and time.
    ///
    /// Years outside 2000-2099 keep only their last two digits.
    ///
    /// # Errors
    ///
    /// * `DS1307Error::Bus` if a transfer fails
    pub fn set_datetime(&mut self, datetime: &NaiveDateTime) -> Result<(), DS1307Error<B::Error>> {
        self.write(&TimeFields::from_datetime(datetime))
    }

    /// Gets the current time as seconds since the Unix epoch, or `None` if
    /// the chip could not be read, is halted or holds an invalid date.
    pub fn get(&mut self) -> Option<i64> {
        self.datetime().ok().map(|dt| dt.and_utc().timestamp())
    }

    /// Sets the time from seconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// * `DS1307Error::DateTime` if the timestamp is not a representable date
    /// * `DS1307Error::Bus` if a transfer fails
    pub fn set(&mut self, timestamp: i64) -> Result<(), DS1307Error<B::Error>> {
        let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0)
            .ok_or(DateTimeError::TimestampOutOfRange)?;
        self.set_datetime(&datetime.naive_utc())
    }

    /// Reports whether the oscillator is running.
    ///
    /// Unlike a plain flag this tells a halted clock apart from a chip that
    /// could not be read.
    pub fn is_running(&mut self) -> RunState {
        match self.seconds_register() {
            Ok(seconds) if seconds.clock_halt() => RunState::Stopped,
            Ok(_) => RunState::Running,
            Err(_) => RunState::Unknown,
        }
    }

    /// Reads the calibration value (-31..=31).
    ///
    /// # Errors
    ///
    /// * `DS1307Error::Bus` if a transfer fails
    /// * `DS1307Error::ShortRead` if the chip sends no data
    pub fn calibration(&mut self) -> Result<i8, DS1307Error<B::Error>> {
        let calibration = self.calibration_register()?;
        debug!("DS1307: calibration register {:?}", calibration);
        Ok(calibration.offset())
    }

    /// Reads the calibration value, returning [`CALIBRATION_ERROR`] if the
    /// chip could not be read.
    pub fn get_calibration(&mut self) -> i8 {
        self.calibration().unwrap_or(CALIBRATION_ERROR)
    }

    /// Writes the calibration value.
    ///
    /// Positive values (and zero) speed the clock up, negative values slow
    /// it down. Magnitudes above 31 keep only their low five bits.
    ///
    /// # Errors
    ///
    /// * `DS1307Error::Bus` if the transfer fails
    pub fn set_calibration(&mut self, value: i8) -> Result<(), DS1307Error<B::Error>> {
        self.set_calibration_register(Calibration::from_offset(value))
    }
}

// Register access implementations
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        impl<B: Bus> DS1307<B> {
            $(
                paste! {
                    #[doc = concat!("Reads the raw ", stringify!($name), " register.")]
                    #[doc = "\n\n# Errors"]
                    #[doc = "* `DS1307Error::Bus` if a transfer fails"]
                    #[doc = "* `DS1307Error::ShortRead` if the chip sends no data"]
                    pub fn [<$name _register>](&mut self) -> Result<$typ, DS1307Error<B::Error>> {
                        let mut data = [0];
                        self.read_registers($regaddr, &mut data)?;
                        Ok(<$typ>::from(data[0]))
                    }

                    #[doc = concat!("Writes the raw ", stringify!($name), " register.")]
                    #[doc = "\n\n# Errors"]
                    #[doc = "* `DS1307Error::Bus` if the transfer fails"]
                    pub fn [<set_ $name _register>](&mut self, value: $typ) -> Result<(), DS1307Error<B::Error>> {
                        self.write_registers($regaddr, &[value.into()])
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    (seconds, RegAddr::Seconds, Seconds),
    (calibration, RegAddr::Calibration, Calibration)
);
