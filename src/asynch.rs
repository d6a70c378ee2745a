//! Async implementation of the DS1307 driver.
//!
//! This module provides an async interface to the DS1307 RTC device using
//! `embedded-hal-async` traits. It is only available when the `async` feature
//! is enabled. Semantics match the blocking [`DS1307`](crate::DS1307).
//!
//! # Example
//!
//! ```rust,ignore
//! use ds1307::asynch::DS1307;
//! use ds1307::I2cBus;
//!
//! let mut rtc = DS1307::new(I2cBus::new(i2c));
//!
//! // Get current date/time asynchronously
//! let datetime = rtc.datetime().await?;
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use embedded_hal_async::i2c::{I2c, Operation};

use crate::datetime::DS1307DateTime;
use crate::{
    Calibration, DS1307Error, DateTimeError, I2cBus, RegAddr, RunState, Seconds, TimeFields,
    TimeSnapshot, CALIBRATION_ERROR, DEVICE_ADDRESS, TIME_BLOCK_LEN,
};

/// Async register-level access to a device on a two-wire bus.
///
/// See [`Bus`](crate::Bus) for the contract of each method.
#[allow(async_fn_in_trait)]
pub trait AsyncBus {
    /// Transport error
    type Error;

    /// Sets the device's register pointer without transferring data.
    async fn write_register_pointer(&mut self, address: u8, register: u8)
        -> Result<(), Self::Error>;

    /// Writes `data` to consecutive registers starting at `start`.
    async fn write_block(&mut self, address: u8, start: u8, data: &[u8])
        -> Result<(), Self::Error>;

    /// Reads from the current register pointer, returning the byte count.
    async fn read_block(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<I2C: I2c> AsyncBus for I2cBus<I2C> {
    type Error = I2C::Error;

    async fn write_register_pointer(
        &mut self,
        address: u8,
        register: u8,
    ) -> Result<(), Self::Error> {
        self.i2c.write(address, &[register]).await
    }

    async fn write_block(
        &mut self,
        address: u8,
        start: u8,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        self.i2c
            .transaction(
                address,
                &mut [Operation::Write(&[start]), Operation::Write(data)],
            )
            .await
    }

    async fn read_block(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        self.i2c.read(address, buffer).await?;
        Ok(buffer.len())
    }
}

/// DS1307 Real-Time Clock async driver.
pub struct DS1307<B: AsyncBus> {
    bus: B,
    present: bool,
}

impl<B: AsyncBus> DS1307<B> {
    /// Creates a new DS1307 async driver instance.
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

    async fn read_registers(
        &mut self,
        start: RegAddr,
        buffer: &mut [u8],
    ) -> Result<(), DS1307Error<B::Error>> {
        let result = self
            .bus
            .write_register_pointer(DEVICE_ADDRESS, start as u8)
            .await;
        self.track(result)?;
        let result = self.bus.read_block(DEVICE_ADDRESS, buffer).await;
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

    async fn write_registers(
        &mut self,
        start: RegAddr,
        data: &[u8],
    ) -> Result<(), DS1307Error<B::Error>> {
        let result = self.bus.write_block(DEVICE_ADDRESS, start as u8, data).await;
        self.track(result)
    }

    /// Reads the time registers without checking the clock-halt flag.
    ///
    /// # Errors
    /// * `DS1307Error::Bus` if a transfer fails
    /// * `DS1307Error::ShortRead` if the chip sends fewer than 7 bytes
    pub async fn snapshot(&mut self) -> Result<TimeSnapshot, DS1307Error<B::Error>> {
        let mut data = [0; TIME_BLOCK_LEN];
        self.read_registers(RegAddr::Seconds, &mut data).await?;
        debug!("DS1307: read time block {:?}", data);
        Ok(DS1307DateTime::from(data).into_snapshot())
    }

    /// Reads the time registers, failing with `ClockHalted` if the
    /// oscillator is stopped.
    ///
    /// # Errors
    /// * `DS1307Error::Bus`, `DS1307Error::ShortRead` or `DS1307Error::ClockHalted`
    pub async fn read(&mut self) -> Result<TimeFields, DS1307Error<B::Error>> {
        let snapshot = self.snapshot().await?;
        if snapshot.clock_halted {
            warn!("DS1307: clock is halted");
            return Err(DS1307Error::ClockHalted);
        }
        Ok(snapshot.fields)
    }

    /// Writes the time registers in two transfers and starts the oscillator.
    ///
    /// # Errors
    /// * `DS1307Error::Bus` if either transfer fails
    pub async fn write(&mut self, fields: &TimeFields) -> Result<(), DS1307Error<B::Error>> {
        let mut raw = DS1307DateTime::from_fields(fields);
        raw.set_clock_halted(true);
        let data: [u8; TIME_BLOCK_LEN] = (&raw).into();
        debug!("DS1307: loading time block {:?}", data);
        self.write_registers(RegAddr::Seconds, &data).await?;
        self.start_clock(fields.second).await
    }

    /// Writes the seconds register with the clock-halt flag clear.
    ///
    /// # Errors
    /// * `DS1307Error::Bus` if the transfer fails
    pub async fn start_clock(&mut self, second: u8) -> Result<(), DS1307Error<B::Error>> {
        let seconds = Seconds::running(second);
        self.write_registers(RegAddr::Seconds, &[seconds.into()])
            .await
    }

    /// Gets the current date and time.
    ///
    /// # Errors
    /// * any error from [`read`](Self::read)
    /// * `DS1307Error::DateTime` if the registers do not hold a valid date
    pub async fn datetime(&mut self) -> Result<NaiveDateTime, DS1307Error<B::Error>> {
        let fields = self.read().await?;
        Ok(fields.to_datetime()?)
    }

    /// Sets the current date and time.
    ///
    /// # Errors
    /// * `DS1307Error::Bus` if a transfer fails
    pub async fn set_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), DS1307Error<B::Error>> {
        self.write(&TimeFields::from_datetime(datetime)).await
    }

    /// Gets the current time as seconds since the Unix epoch.
    pub async fn get(&mut self) -> Option<i64> {
        self.datetime()
            .await
            .ok()
            .map(|dt| dt.and_utc().timestamp())
    }

    /// Sets the time from seconds since the Unix epoch.
    ///
    /// # Errors
    /// * `DS1307Error::DateTime` if the timestamp is not a representable date
    /// * `DS1307Error::Bus` if a transfer fails
    pub async fn set(&mut self, timestamp: i64) -> Result<(), DS1307Error<B::Error>> {
        let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0)
            .ok_or(DateTimeError::TimestampOutOfRange)?;
        self.set_datetime(&datetime.naive_utc()).await
    }

    /// Reports whether the oscillator is running.
    pub async fn is_running(&mut self) -> RunState {
        let mut data = [0];
        match self.read_registers(RegAddr::Seconds, &mut data).await {
            Ok(()) if Seconds::from(data[0]).clock_halt() => RunState::Stopped,
            Ok(()) => RunState::Running,
            Err(_) => RunState::Unknown,
        }
    }

    /// Reads the calibration value (-31..=31).
    ///
    /// # Errors
    /// * `DS1307Error::Bus` or `DS1307Error::ShortRead`
    pub async fn calibration(&mut self) -> Result<i8, DS1307Error<B::Error>> {
        let mut data = [0];
        self.read_registers(RegAddr::Calibration, &mut data)
            .await?;
        let calibration = Calibration::from(data[0]);
        debug!("DS1307: calibration register {:?}", calibration);
        Ok(calibration.offset())
    }

    /// Reads the calibration value, returning [`CALIBRATION_ERROR`] on failure.
    pub async fn get_calibration(&mut self) -> i8 {
        self.calibration().await.unwrap_or(CALIBRATION_ERROR)
    }

    /// Writes the calibration value.
    ///
    /// # Errors
    /// * `DS1307Error::Bus` if the transfer fails
    pub async fn set_calibration(&mut self, value: i8) -> Result<(), DS1307Error<B::Error>> {
        let calibration = Calibration::from_offset(value);
        self.write_registers(RegAddr::Calibration, &[calibration.into()])
            .await
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use alloc::vec;
    use chrono::{Datelike, NaiveDate, Timelike};
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    async fn setup_mock(expectations: &[I2cTrans]) -> (I2cMock, DS1307<I2cBus<I2cMock>>) {
        let mock = I2cMock::new(expectations);
        let dev = DS1307::new(I2cBus::new(mock.clone()));
        (mock, dev)
    }

    fn block_write(data: &[u8]) -> [I2cTrans; 4] {
        [
            I2cTrans::transaction_start(DEVICE_ADDRESS),
            I2cTrans::write(DEVICE_ADDRESS, vec![data[0]]),
            I2cTrans::write(DEVICE_ADDRESS, data[1..].to_vec()),
            I2cTrans::transaction_end(DEVICE_ADDRESS),
        ]
    }

    #[tokio::test]
    async fn test_async_read_datetime() {
        // 2024-03-14 15:30:00
        let datetime_registers = [
            0x00, // seconds
            0x30, // minutes
            0x15, // hours (24-hour mode)
            0x05, // weekday (Thursday)
            0x14, // date
            0x03, // month
            0x24, // year
        ];

        let (mut mock, mut dev) = setup_mock(&[
            I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Seconds as u8]),
            I2cTrans::read(DEVICE_ADDRESS, datetime_registers.to_vec()),
        ])
        .await;

        let dt = dev.datetime().await.unwrap();
        assert_eq!(dt.hour(), 15);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.second(), 0);
        assert_eq!(dt.day(), 14);
        assert_eq!(dt.month(), 3);
        assert_eq!(dt.year(), 2024);
        assert!(dev.chip_present());
        mock.done();
    }

    #[tokio::test]
    async fn test_async_read_halted() {
        let (mut mock, mut dev) = setup_mock(&[
            I2cTrans::write(DEVICE_ADDRESS, vec![0x00]),
            I2cTrans::read(
                DEVICE_ADDRESS,
                vec![0x80, 0x30, 0x15, 0x05, 0x14, 0x03, 0x24],
            ),
        ])
        .await;

        assert_eq!(dev.read().await, Err(DS1307Error::ClockHalted));
        mock.done();
    }

    #[tokio::test]
    async fn test_async_set_datetime() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(15, 30, 12)
            .unwrap();

        let mut expectations = vec![];
        expectations.extend(block_write(&[
            RegAddr::Seconds as u8,
            0x92, // seconds with the halt flag
            0x30, // minutes (BCD for 30)
            0x15, // hours (BCD for 15 in 24-hour mode)
            0x05, // weekday (Thursday)
            0x14, // date
            0x03, // month
            0x24, // year
        ]));
        expectations.extend(block_write(&[RegAddr::Seconds as u8, 0x12]));
        let (mut mock, mut dev) = setup_mock(&expectations).await;

        dev.set_datetime(&dt).await.unwrap();
        mock.done();
    }

    #[tokio::test]
    async fn test_async_is_running() {
        let (mut mock, mut dev) = setup_mock(&[
            I2cTrans::write(DEVICE_ADDRESS, vec![0x00]),
            I2cTrans::read(DEVICE_ADDRESS, vec![0x80]),
            I2cTrans::write(DEVICE_ADDRESS, vec![0x00]).with_error(ErrorKind::Other),
        ])
        .await;

        assert_eq!(dev.is_running().await, RunState::Stopped);
        assert_eq!(dev.is_running().await, RunState::Unknown);
        assert!(!dev.chip_present());
        mock.done();
    }

    #[tokio::test]
    async fn test_async_calibration() {
        let mut expectations = vec![];
        expectations.extend(block_write(&[RegAddr::Calibration as u8, 0x11]));
        expectations.push(I2cTrans::write(DEVICE_ADDRESS, vec![0x07]));
        expectations.push(I2cTrans::read(DEVICE_ADDRESS, vec![0x11]));
        expectations.push(I2cTrans::write(DEVICE_ADDRESS, vec![0x07]).with_error(ErrorKind::Other));
        let (mut mock, mut dev) = setup_mock(&expectations).await;

        dev.set_calibration(-17).await.unwrap();
        assert_eq!(dev.get_calibration().await, -17);
        assert_eq!(dev.get_calibration().await, CALIBRATION_ERROR);
        assert!(!dev.chip_present());
        mock.done();
    }

    #[tokio::test]
    async fn test_async_get_and_set_timestamp() {
        let mut expectations = vec![
            I2cTrans::write(DEVICE_ADDRESS, vec![0x00]),
            I2cTrans::read(
                DEVICE_ADDRESS,
                vec![0x00, 0x30, 0x15, 0x05, 0x14, 0x03, 0x24],
            ),
        ];
        expectations.extend(block_write(&[
            0x00, 0x80, 0x30, 0x15, 0x05, 0x14, 0x03, 0x24,
        ]));
        expectations.extend(block_write(&[0x00, 0x00]));
        let (mut mock, mut dev) = setup_mock(&expectations).await;

        let now = dev.get().await.unwrap();
        assert_eq!(now, 1_710_430_200);
        dev.set(now).await.unwrap();
        mock.done();
    }
}
