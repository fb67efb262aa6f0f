//! INA3221 three-channel current and bus voltage monitor (I2C).
//!
//! Each of the three inputs yields two independent channels: the shunt
//! register (current) and the bus register (voltage). Channel ids 0-2 are
//! `current1..3`, ids 3-5 are `voltage1..3`.

use crate::bus::RegisterBus;
use crate::props::{self, Properties};
use embedded_hal::i2c::I2c;
use hakit_bridge::{ChannelId, ChannelSpec, DeviceOperation, DriverConfig, RawValue};
use hakit_core::{Error, Result};
use serde::Deserialize;
use tracing::{debug, info};

pub const CLASS_NAME: &str = "ina3221";

pub const DEFAULT_BUS: u32 = 1;
pub const MIN_ADDRESS: u8 = 0x40;
pub const MAX_ADDRESS: u8 = 0x43;
pub const INPUTS: u8 = 3;

/// Shunt resistance in ohms fitted on common breakout boards.
pub const DEFAULT_RSHUNT: f64 = 0.1;

pub const MANUFACTURER_ID: u16 = 0x5449;

/// Bus voltage LSB in millivolts, after dropping the 3 unused bits.
pub const BUS_VOLTAGE_LSB_MV: f64 = 8.0;

mod reg {
    pub const CONFIG: u8 = 0x00;
    pub const SHUNT1: u8 = 0x01;
    pub const BUS1: u8 = 0x02;
    pub const MANUFACTURER_ID: u8 = 0xFE;
    pub const DIE_ID: u8 = 0xFF;
}

const CONFIG_RESET: u16 = 0x8000;

/// What a channel id measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// Shunt voltage of input `n` (0-based).
    Current(u8),
    /// Bus voltage of input `n` (0-based).
    Voltage(u8),
}

impl Measurement {
    pub fn from_channel(channel: ChannelId) -> Option<Self> {
        match channel.as_u8() {
            n @ 0..INPUTS => Some(Self::Current(n)),
            n if n < 2 * INPUTS => Some(Self::Voltage(n - INPUTS)),
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            Self::Current(n) => n,
            Self::Voltage(n) => INPUTS + n,
        }
    }

    fn register(&self) -> u8 {
        match *self {
            Self::Current(n) => reg::SHUNT1 + n * 2,
            Self::Voltage(n) => reg::BUS1 + n * 2,
        }
    }
}

/// Properties of an `ina3221` instance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Ina3221Config {
    pub bus: u32,
    pub addr: u8,
    /// Shunt resistance in ohms.
    pub rshunt: f64,
    pub period: i64,
}

impl Default for Ina3221Config {
    fn default() -> Self {
        Self {
            bus: DEFAULT_BUS,
            addr: MIN_ADDRESS,
            rshunt: DEFAULT_RSHUNT,
            period: 0,
        }
    }
}

impl Ina3221Config {
    /// Parse instance properties.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an address outside 0x40-0x43 or a
    /// shunt resistance that is not a positive number.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let bus = u32::try_from(props::int(props, "bus"))
            .ok()
            .filter(|&bus| bus > 0)
            .unwrap_or(DEFAULT_BUS);

        let addr = match props::text(props, "addr") {
            None => MIN_ADDRESS,
            Some(text) => props::parse_number(text)
                .and_then(|addr| u8::try_from(addr).ok())
                .filter(|addr| (MIN_ADDRESS..=MAX_ADDRESS).contains(addr))
                .ok_or_else(|| {
                    Error::configuration(format!("ina3221: wrong I2C address '{}'", text.trim()))
                })?,
        };

        let rshunt = match props::text(props, "rshunt") {
            None => DEFAULT_RSHUNT,
            Some(text) => props::parse_float("rshunt", text)?,
        };
        if rshunt.is_nan() || rshunt <= 0.0 {
            return Err(Error::configuration(format!(
                "ina3221: illegal rshunt value {rshunt:.3}"
            )));
        }

        Ok(Self {
            bus,
            addr,
            rshunt,
            period: props::int(props, "period"),
        })
    }

    /// Milliamps per raw shunt count: 5 µV per count across `rshunt`.
    pub fn current_scale(&self) -> f64 {
        1.0 / (200.0 * self.rshunt)
    }

    /// `current1..3` (mA) and `voltage1..3` (mV) outputs with a global
    /// `trig` input.
    pub fn driver_config(&self, name: &str) -> Result<DriverConfig> {
        let mut specs = Vec::with_capacity(usize::from(2 * INPUTS));
        for n in 0..INPUTS {
            let current = Measurement::Current(n);
            let voltage = Measurement::Voltage(n);
            specs.push(
                ChannelSpec::new(ChannelId::new(current.channel())?, format!("current{}", n + 1))
                    .with_scale(self.current_scale()),
            );
            specs.push(
                ChannelSpec::new(ChannelId::new(voltage.channel())?, format!("voltage{}", n + 1))
                    .with_scale(BUS_VOLTAGE_LSB_MV),
            );
        }
        Ok(DriverConfig::new(name)
            .with_channels(specs)
            .with_period_ms(self.period))
    }
}

/// INA3221 on an I2C bus.
#[derive(Debug)]
pub struct Ina3221<I2C> {
    bus: RegisterBus<I2C>,
}

impl<I2C: I2c> Ina3221<I2C> {
    /// Verify the manufacturer id and reset the chip.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the chip does not answer with the
    /// Texas Instruments id, `Error::InitializationFailed` if the reset fails.
    pub fn new(i2c: I2C, config: &Ina3221Config) -> Result<Self> {
        let mut bus = RegisterBus::new(i2c, config.addr);
        let setup = |e: Error| Error::initialization_failed(format!("{CLASS_NAME}: {e}"));

        let manufacturer = bus.read_u16_be(reg::MANUFACTURER_ID).map_err(|e| {
            Error::device_not_found(format!("{CLASS_NAME} at 0x{:02X}: {e}", config.addr))
        })?;
        let die = bus.read_u16_be(reg::DIE_ID).unwrap_or(0);
        info!(
            addr = config.addr,
            manufacturer = format_args!("0x{manufacturer:04X}"),
            die = format_args!("0x{die:04X}"),
            rshunt = config.rshunt,
            "INA3221 detected"
        );

        if manufacturer != MANUFACTURER_ID {
            return Err(Error::device_not_found(format!(
                "{CLASS_NAME} at 0x{:02X}: wrong manufacturer id 0x{manufacturer:04X}",
                config.addr
            )));
        }

        bus.write_u16_be(reg::CONFIG, CONFIG_RESET).map_err(setup)?;
        let readback = bus.read_u16_be(reg::CONFIG).map_err(setup)?;
        debug!(config = format_args!("0x{readback:04X}"), "INA3221 reset");

        Ok(Self { bus })
    }
}

impl<I2C: I2c + Send + 'static> DeviceOperation for Ina3221<I2C> {
    fn family(&self) -> &str {
        CLASS_NAME
    }

    fn channel_count(&self) -> usize {
        usize::from(2 * INPUTS)
    }

    fn read(&mut self, channel: ChannelId) -> Result<RawValue> {
        let measurement = Measurement::from_channel(channel)
            .ok_or_else(|| Error::invalid_channel(channel, "INA3221 has 6 channels"))?;
        match measurement {
            Measurement::Current(_) => self
                .bus
                .read_i16_be(measurement.register())
                .map(RawValue::from),
            Measurement::Voltage(_) => self
                .bus
                .read_u16_be(measurement.register())
                .map(|raw| RawValue::from(raw >> 3)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::fake::FakeI2c;
    use rstest::rstest;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn chip(addr: u8) -> FakeI2c {
        let i2c = FakeI2c::new(addr);
        i2c.set_u16_be(reg::MANUFACTURER_ID, MANUFACTURER_ID);
        i2c.set_u16_be(reg::DIE_ID, 0x3220);
        i2c
    }

    fn ch(id: u8) -> ChannelId {
        ChannelId::new(id).unwrap()
    }

    #[rstest]
    #[case(0, Some(Measurement::Current(0)), 0x01)]
    #[case(2, Some(Measurement::Current(2)), 0x05)]
    #[case(3, Some(Measurement::Voltage(0)), 0x02)]
    #[case(5, Some(Measurement::Voltage(2)), 0x06)]
    #[case(6, None, 0)]
    fn test_channel_mapping(
        #[case] id: u8,
        #[case] expected: Option<Measurement>,
        #[case] register: u8,
    ) {
        let measurement = Measurement::from_channel(ch(id));
        assert_eq!(measurement, expected);
        if let Some(m) = measurement {
            assert_eq!(m.register(), register);
            assert_eq!(m.channel(), id);
        }
    }

    #[rstest]
    #[case("0x40", 0x40)]
    #[case("0x43", 0x43)]
    #[case("65", 0x41)]
    fn test_valid_address(#[case] addr: &str, #[case] expected: u8) {
        let config = Ina3221Config::from_properties(&props(&[("addr", addr)])).unwrap();
        assert_eq!(config.addr, expected);
    }

    #[rstest]
    #[case("0x44")]
    #[case("0x3F")]
    #[case("gpio")]
    fn test_wrong_address(#[case] addr: &str) {
        let err = Ina3221Config::from_properties(&props(&[("addr", addr)])).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[rstest]
    #[case("0")]
    #[case("-0.1")]
    #[case("none")]
    fn test_illegal_rshunt(#[case] rshunt: &str) {
        let err = Ina3221Config::from_properties(&props(&[("rshunt", rshunt)])).unwrap_err();
        assert!(err.is_construction_fatal());
    }

    #[test]
    fn test_driver_config_outputs() {
        let config = Ina3221Config::from_properties(&props(&[("rshunt", "0.05")])).unwrap();
        let driver = config.driver_config("rails").unwrap();

        let names: Vec<_> = driver.channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["current1", "voltage1", "current2", "voltage2", "current3", "voltage3"]
        );
        assert_eq!(driver.channels[0].scale, 0.1);
        assert_eq!(driver.channels[1].scale, BUS_VOLTAGE_LSB_MV);
        assert_eq!(driver.period, None);
    }

    #[test]
    fn test_open_checks_manufacturer() {
        let i2c = FakeI2c::new(0x40);
        i2c.set_u16_be(reg::MANUFACTURER_ID, 0x1234);
        let err = Ina3221::new(i2c.clone(), &Ina3221Config::default()).unwrap_err();

        assert!(matches!(err, Error::DeviceNotFound(_)));
        assert!(i2c.writes().is_empty());
    }

    #[test]
    fn test_open_resets_chip() {
        let i2c = chip(0x40);
        Ina3221::new(i2c.clone(), &Ina3221Config::default()).unwrap();
        assert_eq!(i2c.writes(), vec![vec![0x00, 0x80, 0x00]]);
    }

    #[test]
    fn test_sub_reads_are_independent() {
        let i2c = chip(0x40);
        let config = Ina3221Config::default();
        let mut device = Ina3221::new(i2c.clone(), &config).unwrap();
        let driver = config.driver_config("rails").unwrap();

        // 100 mA through 0.1 ohm: 10 mV across the shunt, 2000 counts of 5 uV
        i2c.set_u16_be(0x03, 2000);
        // 5 V on input 2: 625 counts of 8 mV
        i2c.set_u16_be(0x04, 625 << 3);
        i2c.fail(0x01);

        assert!(device.read(ch(0)).unwrap_err().is_transient());

        let current = device.read(ch(1)).unwrap();
        let voltage = device.read(ch(4)).unwrap();
        assert_eq!(driver.channels[2].convert(current), 100);
        assert_eq!(driver.channels[3].convert(voltage), 5000);
    }
}
