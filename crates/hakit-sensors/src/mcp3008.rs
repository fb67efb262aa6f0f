//! MCP3008 8-channel 10-bit SPI ADC.
//!
//! Each conversion is one 3-byte full-duplex transfer: a start bit, then the
//! mode and channel nibble, then a padding byte while the chip clocks out
//! the result. The 10-bit code comes back in the low bits of the last two
//! bytes.

use crate::props::{self, Properties};
use embedded_hal::spi::SpiDevice;
use hakit_bridge::{ChannelId, ChannelSpec, DeviceOperation, DriverConfig, RawValue};
use hakit_core::{Error, Result};
use serde::Deserialize;

pub const CLASS_NAME: &str = "mcp3008";

pub const CHANNELS: usize = 8;

/// Millivolts per code with a 3.3 V reference.
pub const DEFAULT_SCALE: f64 = 3300.0 / 1024.0;

/// `B.C` suffix of `/dev/spidevB.C`.
pub const DEFAULT_DEVICE: &str = "0.0";

pub const SPI_SPEED_HZ: u32 = 1_000_000;

const START_BIT: u8 = 0x01;
const SINGLE_ENDED: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    SingleEnded,
    /// Channel measured against its pair (0/1, 2/3, ...).
    Differential,
}

/// One enabled ADC input.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AdcChannel {
    pub number: u8,
    pub mode: InputMode,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    DEFAULT_SCALE
}

impl AdcChannel {
    /// Second byte of the conversion command.
    pub fn command(&self) -> u8 {
        let mode = match self.mode {
            InputMode::SingleEnded => SINGLE_ENDED,
            InputMode::Differential => 0x00,
        };
        mode | ((self.number & 0x07) << 4)
    }
}

/// Properties of an `mcp3008` instance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Mcp3008Config {
    /// SPI device, `B.C` for `/dev/spidevB.C`.
    pub id: String,

    /// Periodic read interval in milliseconds, 0 or less disables it.
    pub period: i64,

    pub channels: Vec<AdcChannel>,

    /// Samples averaged per reading.
    pub mean: u32,
}

impl Default for Mcp3008Config {
    fn default() -> Self {
        Self {
            id: DEFAULT_DEVICE.to_string(),
            period: 0,
            channels: Vec::new(),
            mean: 1,
        }
    }
}

impl Mcp3008Config {
    /// Parse instance properties.
    ///
    /// `channels` is required and lists channel numbers, a leading `*`
    /// selecting differential mode (`"0,1,*2"`). `scale` is a positional
    /// list indexed by channel number; blank entries keep [`DEFAULT_SCALE`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `channels` is missing or malformed,
    /// or an invalid channel error for channel numbers above 7.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let channels = props::text(props, "channels")
            .ok_or_else(|| Error::configuration("mcp3008: 'channels' property is required"))?;
        let mut channels = parse_channels(channels)?;

        let mut scales = [DEFAULT_SCALE; CHANNELS];
        if let Some(text) = props::text(props, "scale") {
            for (slot, entry) in scales.iter_mut().zip(props::list(text)) {
                if !entry.is_empty() {
                    *slot = props::parse_float("scale", entry)?;
                }
            }
        }
        for channel in &mut channels {
            channel.scale = scales[usize::from(channel.number)];
        }

        let mean = props::int(props, "mean").clamp(1, i64::from(u32::MAX)) as u32;

        Ok(Self {
            id: props::text(props, "id")
                .unwrap_or(DEFAULT_DEVICE)
                .trim()
                .to_string(),
            period: props::int(props, "period"),
            channels,
            mean,
        })
    }

    /// `out<N>` outputs with `trig<N>` inputs for every enabled channel.
    ///
    /// # Errors
    ///
    /// Returns an invalid channel error for channel numbers above 7.
    pub fn driver_config(&self, name: &str) -> Result<DriverConfig> {
        let specs = self
            .channels
            .iter()
            .map(|channel| {
                let n = channel.number;
                if usize::from(n) >= CHANNELS {
                    return Err(Error::invalid_channel(n, "MCP3008 has 8 channels"));
                }
                Ok(ChannelSpec::new(ChannelId::new(n)?, format!("out{n}"))
                    .with_trigger(format!("trig{n}"))
                    .with_scale(channel.scale))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DriverConfig::new(name)
            .with_channels(specs)
            .with_period_ms(self.period))
    }
}

/// Parse a channel list such as `"0,1,*2"`. Blank entries are skipped.
///
/// # Errors
///
/// Returns a configuration error for entries that are not numbers and an
/// invalid channel error for numbers above 7.
pub fn parse_channels(text: &str) -> Result<Vec<AdcChannel>> {
    props::list(text)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (mode, number) = match entry.strip_prefix('*') {
                Some(rest) => (InputMode::Differential, rest),
                None => (InputMode::SingleEnded, entry),
            };
            let number = props::parse_number(number).ok_or_else(|| {
                Error::configuration(format!("mcp3008: '{entry}' is not a channel number"))
            })?;
            match u8::try_from(number) {
                Ok(number) if usize::from(number) < CHANNELS => Ok(AdcChannel {
                    number,
                    mode,
                    scale: DEFAULT_SCALE,
                }),
                _ => Err(Error::invalid_channel(number, "MCP3008 has 8 channels")),
            }
        })
        .collect()
}

/// MCP3008 on an SPI device.
#[derive(Debug)]
pub struct Mcp3008<SPI> {
    spi: SPI,
    commands: [Option<u8>; CHANNELS],
}

impl<SPI: SpiDevice> Mcp3008<SPI> {
    /// Wrap an SPI device, enabling the given channels.
    pub fn new(spi: SPI, channels: &[AdcChannel]) -> Self {
        let mut commands = [None; CHANNELS];
        for channel in channels {
            if let Some(slot) = commands.get_mut(usize::from(channel.number)) {
                *slot = Some(channel.command());
            }
        }
        Self { spi, commands }
    }
}

impl<SPI: SpiDevice + Send + 'static> DeviceOperation for Mcp3008<SPI> {
    fn family(&self) -> &str {
        CLASS_NAME
    }

    fn channel_count(&self) -> usize {
        CHANNELS
    }

    fn read(&mut self, channel: ChannelId) -> Result<RawValue> {
        let command = self
            .commands
            .get(channel.index())
            .copied()
            .flatten()
            .ok_or_else(|| Error::invalid_channel(channel, "channel not enabled"))?;

        let mut frame = [START_BIT, command, 0x00];
        self.spi
            .transfer_in_place(&mut frame)
            .map_err(|e| crate::bus::transfer_error(format_args!("channel {channel}"), e))?;

        Ok((RawValue::from(frame[1] & 0x03) << 8) | RawValue::from(frame[2]))
    }
}
