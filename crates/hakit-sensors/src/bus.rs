//! Register access over `embedded-hal` buses.
//!
//! Bus errors only implement `Debug`, so they are flattened into
//! `Error::Transfer` with the failing register in the message.

use embedded_hal::i2c::I2c;
use hakit_core::{Error, Result};
use std::fmt::Debug;

pub(crate) fn transfer_error(what: impl std::fmt::Display, err: impl Debug) -> Error {
    Error::transfer(format!("{what}: {err:?}"))
}

/// One chip on an I2C bus, addressed by 8-bit register pointer.
#[derive(Debug)]
pub(crate) struct RegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> RegisterBus<I2C> {
    pub(crate) fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub(crate) fn address(&self) -> u8 {
        self.address
    }

    pub(crate) fn read_u8(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|e| transfer_error(format_args!("read 0x{reg:02X}"), e))?;
        Ok(buf[0])
    }

    pub(crate) fn write_u8(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|e| transfer_error(format_args!("write 0x{reg:02X}"), e))
    }

    /// Big-endian 16-bit register.
    pub(crate) fn read_u16_be(&mut self, reg: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|e| transfer_error(format_args!("read 0x{reg:02X}"), e))?;
        Ok(u16::from_be_bytes(buf))
    }

    pub(crate) fn read_i16_be(&mut self, reg: u8) -> Result<i16> {
        self.read_u16_be(reg).map(|raw| raw as i16)
    }

    pub(crate) fn write_u16_be(&mut self, reg: u8, value: u16) -> Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[reg, hi, lo])
            .map_err(|e| transfer_error(format_args!("write 0x{reg:02X}"), e))
    }

    /// Little-endian 16-bit register, low byte first.
    pub(crate) fn read_u16_le(&mut self, reg: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|e| transfer_error(format_args!("read 0x{reg:02X}"), e))?;
        Ok(u16::from_le_bytes(buf))
    }
}
