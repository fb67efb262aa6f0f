//! TCS34725 RGB color sensor (I2C).
//!
//! The oscillator is powered on when the device is opened. The ADC is only
//! enabled right before the first read, on the poll worker, once the
//! power-on settling time has passed.

use crate::bus::RegisterBus;
use crate::props::{self, Properties};
use embedded_hal::i2c::I2c;
use hakit_bridge::{ChannelId, ChannelSpec, DeviceOperation, DriverConfig, RawValue};
use hakit_core::{Error, Result};
use serde::Deserialize;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const CLASS_NAME: &str = "tcs34725";

pub const DEFAULT_BUS: u32 = 1;
pub const ADDRESS: u8 = 0x29;
pub const CHIP_ID: u8 = 0x44;

/// Output names, in channel id order.
pub const COLORS: [&str; 4] = ["c", "r", "g", "b"];

/// Wait between power-on and ADC enable.
pub const POWER_ON_DELAY: Duration = Duration::from_millis(10);

pub const SETTING_ATIME: &str = "atime";
pub const SETTING_GAIN: &str = "gain";

const COMMAND_BIT: u8 = 0x80;
const AUTO_INCREMENT: u8 = 0x20;

mod reg {
    pub const ENABLE: u8 = 0x00;
    pub const ATIME: u8 = 0x01;
    pub const CONTROL: u8 = 0x0F;
    pub const ID: u8 = 0x12;
    pub const CDATAL: u8 = 0x14;
}

const ENABLE_PON: u8 = 0x01;
const ENABLE_AEN: u8 = 0x02;

/// ATIME register value for an integration time in milliseconds, rounded
/// down to the nearest supported step (2.4, 24, 50, 101, 154, 700 ms).
pub fn integration_time(ms: i64) -> u8 {
    match ms {
        700.. => 0x00,
        154.. => 0xC0,
        101.. => 0xD5,
        50.. => 0xEB,
        24.. => 0xF6,
        _ => 0xFF,
    }
}

/// CONTROL register value for a gain multiplier, rounded down to 1, 4, 16
/// or 60.
pub fn gain(multiplier: i64) -> u8 {
    match multiplier {
        60.. => 0x03,
        16.. => 0x02,
        4.. => 0x01,
        _ => 0x00,
    }
}

/// Properties of a `tcs34725` instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Tcs34725Config {
    /// I2C bus number, `/dev/i2c-<num>`.
    pub num: u32,

    /// Integration time in milliseconds applied at open.
    pub atime: Option<i64>,

    /// Gain multiplier applied at open.
    pub gain: Option<i64>,
}

impl Default for Tcs34725Config {
    fn default() -> Self {
        Self {
            num: DEFAULT_BUS,
            atime: None,
            gain: None,
        }
    }
}

impl Tcs34725Config {
    pub fn from_properties(props: &Properties) -> Self {
        Self {
            num: u32::try_from(props::int(props, "num"))
                .ok()
                .filter(|&num| num > 0)
                .unwrap_or(DEFAULT_BUS),
            atime: props::text(props, "atime").map(|_| props::int(props, "atime")),
            gain: props::text(props, "gain").map(|_| props::int(props, "gain")),
        }
    }

    /// `c`, `r`, `g`, `b` outputs with a global `trig` input.
    pub fn driver_config(&self, name: &str) -> Result<DriverConfig> {
        let specs = (0u8..)
            .zip(COLORS)
            .map(|(id, color)| Ok(ChannelSpec::new(ChannelId::new(id)?, color)))
            .collect::<Result<Vec<_>>>()?;
        Ok(DriverConfig::new(name).with_channels(specs))
    }
}

/// TCS34725 on an I2C bus.
#[derive(Debug)]
pub struct Tcs34725<I2C> {
    bus: RegisterBus<I2C>,
    powered_on: Instant,
    adc_enabled: bool,
}

impl<I2C: I2c> Tcs34725<I2C> {
    /// Check the chip id and power the oscillator on.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the id register does not read
    /// 0x44, `Error::InitializationFailed` if power-on fails.
    pub fn new(i2c: I2C, config: &Tcs34725Config) -> Result<Self> {
        let mut bus = RegisterBus::new(i2c, ADDRESS);
        let setup = |e: Error| Error::initialization_failed(format!("{CLASS_NAME}: {e}"));

        let id = bus
            .read_u8(COMMAND_BIT | reg::ID)
            .map_err(|e| Error::device_not_found(format!("{CLASS_NAME}: unable to read chip id: {e}")))?;
        if id != CHIP_ID {
            return Err(Error::device_not_found(format!(
                "{CLASS_NAME}: wrong chip id 0x{id:02X} (0x{CHIP_ID:02X} expected)"
            )));
        }

        if let Some(ms) = config.atime {
            bus.write_u8(COMMAND_BIT | reg::ATIME, integration_time(ms))
                .map_err(setup)?;
        }
        if let Some(multiplier) = config.gain {
            bus.write_u8(COMMAND_BIT | reg::CONTROL, gain(multiplier))
                .map_err(setup)?;
        }

        bus.write_u8(COMMAND_BIT | reg::ENABLE, ENABLE_PON)
            .map_err(setup)?;
        info!(addr = bus.address(), "TCS34725 powered on");

        Ok(Self {
            bus,
            powered_on: Instant::now(),
            adc_enabled: false,
        })
    }

    fn enable_adc(&mut self) -> Result<()> {
        if let Some(remaining) = POWER_ON_DELAY.checked_sub(self.powered_on.elapsed()) {
            thread::sleep(remaining);
        }
        self.bus
            .write_u8(COMMAND_BIT | reg::ENABLE, ENABLE_PON | ENABLE_AEN)?;
        self.adc_enabled = true;
        debug!("TCS34725 ADC enabled");
        Ok(())
    }
}

impl<I2C: I2c + Send + 'static> DeviceOperation for Tcs34725<I2C> {
    fn family(&self) -> &str {
        CLASS_NAME
    }

    fn channel_count(&self) -> usize {
        COLORS.len()
    }

    fn read(&mut self, channel: ChannelId) -> Result<RawValue> {
        if channel.index() >= COLORS.len() {
            return Err(Error::invalid_channel(channel, "TCS34725 has 4 channels"));
        }
        if !self.adc_enabled {
            self.enable_adc()?;
        }
        let register = reg::CDATAL + 2 * channel.as_u8();
        self.bus
            .read_u16_le(COMMAND_BIT | AUTO_INCREMENT | register)
            .map(RawValue::from)
    }

    fn settings(&self) -> &'static [&'static str] {
        &[SETTING_ATIME, SETTING_GAIN]
    }

    fn write(&mut self, setting: &str, value: i32) -> Result<()> {
        let (register, byte) = match setting {
            SETTING_ATIME => (reg::ATIME, integration_time(i64::from(value))),
            SETTING_GAIN => (reg::CONTROL, gain(i64::from(value))),
            _ => {
                return Err(Error::unsupported(format!(
                    "{CLASS_NAME} has no setting '{setting}'"
                )));
            }
        };
        debug!(setting, value, byte = format_args!("0x{byte:02X}"), "TCS34725 setting");
        self.bus.write_u8(COMMAND_BIT | register, byte)
    }
}
