//! INA219 single-channel current and bus voltage monitor (I2C).
//!
//! The chip is reset, calibrated and configured when the device is opened.
//! Reads then return raw register counts; the channel scale turns them into
//! millivolts and milliamps.

use crate::bus::RegisterBus;
use crate::props::{self, Properties};
use embedded_hal::i2c::I2c;
use hakit_bridge::{ChannelId, ChannelSpec, DeviceOperation, DriverConfig, RawValue};
use hakit_core::{Error, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const CLASS_NAME: &str = "ina219";

pub const DEFAULT_BUS: u32 = 1;
pub const MIN_ADDRESS: u8 = 0x40;
pub const MAX_ADDRESS: u8 = 0x4F;

/// Bus voltage LSB in millivolts, after dropping the 3 status bits.
pub const BUS_VOLTAGE_LSB_MV: f64 = 4.0;

pub const CURRENT_CHANNEL: u8 = 0;
pub const VOLTAGE_CHANNEL: u8 = 1;

mod reg {
    pub const CONFIG: u8 = 0x00;
    pub const BUS_VOLTAGE: u8 = 0x02;
    pub const CURRENT: u8 = 0x04;
    pub const CALIBRATION: u8 = 0x05;
}

mod bits {
    pub const RESET: u16 = 0x8000;
    pub const RANGE_16V: u16 = 0x0000;
    pub const RANGE_32V: u16 = 0x2000;
    pub const GAIN_40MV: u16 = 0x0000;
    pub const GAIN_160MV: u16 = 0x1000;
    pub const GAIN_320MV: u16 = 0x1800;
    pub const BADC_SHIFT: u16 = 7;
    pub const SADC_SHIFT: u16 = 3;
    pub const ADC_MASK: u16 = 0xF;
    pub const ADC_12BIT_1S: u16 = 0x3;
    pub const MODE_SHUNT_BUS_CONTINUOUS: u16 = 0x0007;
}

/// Full-scale range and calibration preset, named as in the `scale`
/// property. All presets assume a 0.1 Ω shunt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Ina219Range {
    #[default]
    #[serde(rename = "32V_2A")]
    V32A2,
    #[serde(rename = "32V_1A")]
    V32A1,
    #[serde(rename = "16V_400mA")]
    V16Ma400,
    #[serde(rename = "16V_5A")]
    V16A5,
}

impl Ina219Range {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "32V_2A" => Some(Self::V32A2),
            "32V_1A" => Some(Self::V32A1),
            "16V_400mA" => Some(Self::V16Ma400),
            "16V_5A" => Some(Self::V16A5),
            _ => None,
        }
    }

    /// Current LSB in milliamps.
    pub fn current_lsb(&self) -> f64 {
        match self {
            Self::V32A2 => 0.1,
            Self::V32A1 => 0.04,
            Self::V16Ma400 => 0.05,
            Self::V16A5 => 0.1524,
        }
    }

    /// Value of the calibration register.
    pub fn calibration(&self) -> u16 {
        match self {
            Self::V32A2 => 4096,
            Self::V32A1 => 10240,
            Self::V16Ma400 => 8192,
            Self::V16A5 => 13434,
        }
    }

    fn range_and_gain(&self) -> u16 {
        match self {
            Self::V32A2 | Self::V32A1 => bits::RANGE_32V | bits::GAIN_320MV,
            Self::V16Ma400 => bits::RANGE_16V | bits::GAIN_40MV,
            Self::V16A5 => bits::RANGE_16V | bits::GAIN_160MV,
        }
    }
}

/// ADC field value for a requested sample count, and the count it stands
/// for. Counts round down to a power of two up to 128.
pub fn adc_resolution(samples: i64) -> (u16, u32) {
    match samples {
        128.. => (0xF, 128),
        64.. => (0xE, 64),
        32.. => (0xD, 32),
        16.. => (0xC, 16),
        8.. => (0xB, 8),
        4.. => (0xA, 4),
        2.. => (0x9, 2),
        _ => (bits::ADC_12BIT_1S, 1),
    }
}

/// Properties of an `ina219` instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Ina219Config {
    /// I2C bus number, `/dev/i2c-<bus>`.
    pub bus: u32,
    pub addr: u8,
    #[serde(rename = "scale")]
    pub range: Ina219Range,
    /// Samples averaged by the chip per conversion.
    #[serde(rename = "res")]
    pub samples: u32,
    pub period: i64,
}

impl Default for Ina219Config {
    fn default() -> Self {
        Self {
            bus: DEFAULT_BUS,
            addr: MIN_ADDRESS,
            range: Ina219Range::default(),
            samples: 1,
            period: 0,
        }
    }
}

impl Ina219Config {
    /// Parse instance properties. Out-of-range values are clamped and an
    /// unknown `scale` falls back to `32V_2A`.
    pub fn from_properties(props: &Properties) -> Self {
        let bus = u32::try_from(props::int(props, "bus"))
            .ok()
            .filter(|&bus| bus > 0)
            .unwrap_or(DEFAULT_BUS);

        let addr = props::text(props, "addr")
            .and_then(props::parse_number)
            .unwrap_or(0)
            .clamp(u32::from(MIN_ADDRESS), u32::from(MAX_ADDRESS)) as u8;

        let range = match props::text(props, "scale") {
            None => Ina219Range::default(),
            Some(name) => Ina219Range::from_name(name).unwrap_or_else(|| {
                warn!(scale = %name, "unknown INA219 scale, using 32V_2A");
                Ina219Range::default()
            }),
        };

        let (_, samples) = adc_resolution(props::int(props, "res"));

        Self {
            bus,
            addr,
            range,
            samples,
            period: props::int(props, "period"),
        }
    }

    /// Configuration register value for this preset and resolution.
    pub fn config_register(&self) -> u16 {
        let (adc, _) = adc_resolution(i64::from(self.samples));
        let adc = adc & bits::ADC_MASK;
        self.range.range_and_gain()
            | (adc << bits::BADC_SHIFT)
            | (adc << bits::SADC_SHIFT)
            | bits::MODE_SHUNT_BUS_CONTINUOUS
    }

    /// `current` (mA) and `voltage` (mV) outputs with a global `trig` input.
    pub fn driver_config(&self, name: &str) -> Result<DriverConfig> {
        let current = ChannelSpec::new(ChannelId::new(CURRENT_CHANNEL)?, "current")
            .with_scale(self.range.current_lsb());
        let voltage = ChannelSpec::new(ChannelId::new(VOLTAGE_CHANNEL)?, "voltage")
            .with_scale(BUS_VOLTAGE_LSB_MV);
        Ok(DriverConfig::new(name)
            .with_channels([current, voltage])
            .with_period_ms(self.period))
    }
}

/// INA219 on an I2C bus.
#[derive(Debug)]
pub struct Ina219<I2C> {
    bus: RegisterBus<I2C>,
}

impl<I2C: I2c> Ina219<I2C> {
    /// Reset, calibrate and configure the chip.
    ///
    /// # Errors
    ///
    /// Returns `Error::InitializationFailed` if any setup transfer fails.
    pub fn new(i2c: I2C, config: &Ina219Config) -> Result<Self> {
        let mut bus = RegisterBus::new(i2c, config.addr);
        let setup = |e: Error| Error::initialization_failed(format!("{CLASS_NAME}: {e}"));

        bus.write_u16_be(reg::CONFIG, bits::RESET).map_err(setup)?;

        let calibration = config.range.calibration();
        info!(addr = bus.address(), calibration, samples = config.samples, "INA219 calibration");
        bus.write_u16_be(reg::CALIBRATION, calibration).map_err(setup)?;
        bus.write_u16_be(reg::CONFIG, config.config_register()).map_err(setup)?;

        let readback = bus.read_u16_be(reg::CONFIG).map_err(setup)?;
        debug!(config = format_args!("0x{readback:04X}"), "INA219 configured");

        Ok(Self { bus })
    }
}

impl<I2C: I2c + Send + 'static> DeviceOperation for Ina219<I2C> {
    fn family(&self) -> &str {
        CLASS_NAME
    }

    fn channel_count(&self) -> usize {
        2
    }

    fn read(&mut self, channel: ChannelId) -> Result<RawValue> {
        match channel.as_u8() {
            CURRENT_CHANNEL => self.bus.read_i16_be(reg::CURRENT).map(RawValue::from),
            VOLTAGE_CHANNEL => self
                .bus
                .read_u16_be(reg::BUS_VOLTAGE)
                .map(|raw| RawValue::from(raw >> 3)),
            _ => Err(Error::invalid_channel(channel, "INA219 has 2 channels")),
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

    #[rstest]
    #[case(0, 0x3, 1)]
    #[case(1, 0x3, 1)]
    #[case(3, 0x9, 2)]
    #[case(100, 0xE, 64)]
    #[case(128, 0xF, 128)]
    #[case(5000, 0xF, 128)]
    fn test_adc_resolution(#[case] samples: i64, #[case] field: u16, #[case] effective: u32) {
        assert_eq!(adc_resolution(samples), (field, effective));
    }

    #[test]
    fn test_defaults() {
        let config = Ina219Config::from_properties(&props(&[]));
        assert_eq!(config, Ina219Config::default());
        // 32 V range, /8 gain, 12-bit single samples, continuous
        assert_eq!(config.config_register(), 0x399F);
    }

    #[rstest]
    #[case("0x45", 0x45)]
    #[case("0x10", MIN_ADDRESS)]
    #[case("200", MAX_ADDRESS)]
    #[case("none", MIN_ADDRESS)]
    fn test_address_clamped(#[case] addr: &str, #[case] expected: u8) {
        let config = Ina219Config::from_properties(&props(&[("addr", addr)]));
        assert_eq!(config.addr, expected);
    }

    #[test]
    fn test_presets() {
        let config = Ina219Config::from_properties(&props(&[
            ("scale", "16V_400mA"),
            ("res", "20"),
            ("bus", "-2"),
        ]));
        assert_eq!(config.range, Ina219Range::V16Ma400);
        assert_eq!(config.samples, 16);
        assert_eq!(config.bus, DEFAULT_BUS);
        assert_eq!(config.config_register(), 0x0667);

        let unknown = Ina219Config::from_properties(&props(&[("scale", "48V_10A")]));
        assert_eq!(unknown.range, Ina219Range::V32A2);
    }

    #[test]
    fn test_open_resets_and_calibrates() {
        let i2c = FakeI2c::new(0x40);
        Ina219::new(i2c.clone(), &Ina219Config::default()).unwrap();

        assert_eq!(
            i2c.writes(),
            vec![
                vec![0x00, 0x80, 0x00],
                vec![0x05, 0x10, 0x00],
                vec![0x00, 0x39, 0x9F],
            ]
        );
    }

    #[test]
    fn test_open_without_chip_fails() {
        let i2c = FakeI2c::new(0x41);
        let err = Ina219::new(i2c, &Ina219Config::default()).unwrap_err();
        assert!(matches!(err, Error::InitializationFailed(_)));
    }

    #[test]
    fn test_read_raw_counts() {
        let i2c = FakeI2c::new(0x40);
        let mut chip = Ina219::new(i2c.clone(), &Ina219Config::default()).unwrap();
        // 12 V: 3000 counts of 4 mV, shifted past the status bits
        i2c.set_u16_be(reg::BUS_VOLTAGE, 3000 << 3 | 0b010);
        i2c.set_u16_be(reg::CURRENT, (-250i16) as u16);

        let current = chip.read(ChannelId::new(CURRENT_CHANNEL).unwrap()).unwrap();
        let voltage = chip.read(ChannelId::new(VOLTAGE_CHANNEL).unwrap()).unwrap();
        assert_eq!(current, -250);
        assert_eq!(voltage, 3000);

        let driver = Ina219Config::default().driver_config("supply").unwrap();
        assert_eq!(driver.channels[0].convert(current), -25);
        assert_eq!(driver.channels[1].convert(voltage), 12000);
    }

    #[test]
    fn test_current_failure_leaves_voltage_readable() {
        let i2c = FakeI2c::new(0x40);
        let mut chip = Ina219::new(i2c.clone(), &Ina219Config::default()).unwrap();
        i2c.set_u16_be(reg::BUS_VOLTAGE, 1250 << 3);
        i2c.fail(reg::CURRENT);

        let err = chip.read(ChannelId::new(CURRENT_CHANNEL).unwrap()).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(chip.read(ChannelId::new(VOLTAGE_CHANNEL).unwrap()).unwrap(), 1250);
    }
}
