//! Transport capability used by the driver.
//!
//! The driver only needs three primitives from the two-wire bus: point the
//! chip at a register, write a block starting at a register, and read a
//! block from the current register pointer. [`I2cBus`] provides them on top
//! of any `embedded-hal` I2C implementation; other bus libraries plug in by
//! implementing [`Bus`] directly.

use embedded_hal::i2c::{I2c, Operation};

/// Blocking register-level access to a device on a two-wire bus.
pub trait Bus {
    /// Transport error (no acknowledge, arbitration loss, timeout, ...)
    type Error;

    /// Sets the device's register pointer without transferring data.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the device does not respond.
    fn write_register_pointer(&mut self, address: u8, register: u8) -> Result<(), Self::Error>;

    /// Writes `data` to consecutive registers starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the transfer fails.
    fn write_block(&mut self, address: u8, start: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads from the current register pointer into `buffer`.
    ///
    /// Returns the number of bytes received, which may be less than the
    /// buffer length.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the transfer fails.
    fn read_block(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

/// [`Bus`] adapter for `embedded-hal` I2C buses.
///
/// With the `async` feature enabled the same adapter also implements
/// [`AsyncBus`](crate::asynch::AsyncBus) for `embedded-hal-async` buses.
#[derive(Debug)]
pub struct I2cBus<I2C> {
    pub(crate) i2c: I2C,
}

impl<I2C> I2cBus<I2C> {
    /// Wraps an I2C bus.
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Returns the wrapped I2C bus.
    pub fn destroy(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> Bus for I2cBus<I2C> {
    type Error = I2C::Error;

    fn write_register_pointer(&mut self, address: u8, register: u8) -> Result<(), Self::Error> {
        self.i2c.write(address, &[register])
    }

    fn write_block(&mut self, address: u8, start: u8, data: &[u8]) -> Result<(), Self::Error> {
        // adjacent writes in one transaction go out as a single frame
        self.i2c.transaction(
            address,
            &mut [Operation::Write(&[start]), Operation::Write(data)],
        )
    }

    fn read_block(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        self.i2c.read(address, buffer)?;
        Ok(buffer.len())
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use alloc::vec;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const DEVICE_ADDRESS: u8 = 0x68;

    #[test]
    fn test_write_register_pointer() {
        let mut mock = I2cMock::new(&[I2cTrans::write(DEVICE_ADDRESS, vec![0x07])]);
        let mut bus = I2cBus::new(mock.clone());
        bus.write_register_pointer(DEVICE_ADDRESS, 0x07).unwrap();
        mock.done();
    }

    #[test]
    fn test_write_register_pointer_error() {
        let mut mock = I2cMock::new(&[
            I2cTrans::write(DEVICE_ADDRESS, vec![0x00]).with_error(ErrorKind::Other)
        ]);
        let mut bus = I2cBus::new(mock.clone());
        assert_eq!(
            bus.write_register_pointer(DEVICE_ADDRESS, 0x00),
            Err(ErrorKind::Other)
        );
        mock.done();
    }

    #[test]
    fn test_write_block_is_one_transaction() {
        let mut mock = I2cMock::new(&[
            I2cTrans::transaction_start(DEVICE_ADDRESS),
            I2cTrans::write(DEVICE_ADDRESS, vec![0x00]),
            I2cTrans::write(DEVICE_ADDRESS, vec![0x80, 0x30, 0x15]),
            I2cTrans::transaction_end(DEVICE_ADDRESS),
        ]);
        let mut bus = I2cBus::new(mock.clone());
        bus.write_block(DEVICE_ADDRESS, 0x00, &[0x80, 0x30, 0x15])
            .unwrap();
        mock.done();
    }

    #[test]
    fn test_read_block_fills_buffer() {
        let mut mock = I2cMock::new(&[I2cTrans::read(DEVICE_ADDRESS, vec![0x12, 0x34])]);
        let mut bus = I2cBus::new(mock.clone());
        let mut buffer = [0; 2];
        assert_eq!(bus.read_block(DEVICE_ADDRESS, &mut buffer), Ok(2));
        assert_eq!(buffer, [0x12, 0x34]);
        mock.done();
    }

    #[test]
    fn test_destroy_returns_bus() {
        let mock = I2cMock::new(&[]);
        let bus = I2cBus::new(mock);
        let mut mock = bus.destroy();
        mock.done();
    }
}
