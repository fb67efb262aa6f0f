use crate::{Result, constants::MAX_CHANNELS, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw value produced by a device operation, in device units.
pub type RawValue = i32;

/// One addressable measurement point of a device.
///
/// The id is an index into the driver's channel table: an MCP3008 input
/// (0-7), an INA3221 sub-measurement, a TCS34725 color component, or 0 for
/// single-channel devices such as a DS18B20.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create a new channel id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidChannel` if the id is not below [`MAX_CHANNELS`].
    pub fn new(id: u8) -> Result<Self> {
        if usize::from(id) >= MAX_CHANNELS {
            return Err(Error::invalid_channel(
                id,
                format!("channel ids must be below {MAX_CHANNELS}"),
            ));
        }
        Ok(ChannelId(id))
    }

    /// Get the raw channel id.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Position of this channel in a channel table.
    #[must_use]
    pub fn index(&self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::invalid_channel(s, "not a channel number"))?;
        ChannelId::new(id)
    }
}

/// A read request for one channel.
///
/// `force` asks the dedup layer to publish the answer even when it equals
/// the last published value. The flag travels with the request and comes
/// back in the matching [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub channel: ChannelId,
    pub force: bool,
}

impl Request {
    /// Request that publishes only if the value changed.
    #[must_use]
    pub fn poll(channel: ChannelId) -> Self {
        Self {
            channel,
            force: false,
        }
    }

    /// Request that always publishes its answer.
    #[must_use]
    pub fn refresh(channel: ChannelId) -> Self {
        Self {
            channel,
            force: true,
        }
    }
}

/// Message sent from the event loop to the poll worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read one channel and answer with a [`Response`].
    Read(Request),

    /// Apply a device setting. No response is produced.
    Write { setting: &'static str, value: i32 },

    /// Terminate the worker. No response is produced.
    Close,
}

/// Message sent from the poll worker back to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub channel: ChannelId,

    /// Copied from the originating request.
    pub force: bool,

    /// `None` when the device operation failed.
    pub value: Option<RawValue>,
}

impl Response {
    /// Successful answer to `request`.
    #[must_use]
    pub fn valid(request: Request, value: RawValue) -> Self {
        Self {
            channel: request.channel,
            force: request.force,
            value: Some(value),
        }
    }

    /// Failed answer to `request`.
    #[must_use]
    pub fn invalid(request: Request) -> Self {
        Self {
            channel: request.channel,
            force: request.force,
            value: None,
        }
    }

    /// Returns `true` if the device operation succeeded.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }
}

/// Text rendering of a scaled channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// Plain integer, e.g. `1234`.
    #[default]
    Integer,

    /// Fixed point with `places` decimals: 215 with one place is `21.5`.
    Decimal { places: u8 },
}

impl ValueFormat {
    /// Render a scaled value.
    ///
    /// # Examples
    ///
    /// ```
    /// use hakit_core::ValueFormat;
    ///
    /// assert_eq!(ValueFormat::Integer.format(-42), "-42");
    /// assert_eq!(ValueFormat::Decimal { places: 1 }.format(215), "21.5");
    /// assert_eq!(ValueFormat::Decimal { places: 1 }.format(-5), "-0.5");
    /// ```
    #[must_use]
    pub fn format(&self, value: i64) -> String {
        match *self {
            ValueFormat::Integer | ValueFormat::Decimal { places: 0 } => value.to_string(),
            ValueFormat::Decimal { places } => {
                let sign = if value < 0 { "-" } else { "" };
                let magnitude = u128::from(value.unsigned_abs());
                // Beyond 10^38 every i64 is below the divisor
                let (whole, fraction) = match 10u128.checked_pow(u32::from(places)) {
                    Some(divisor) => (magnitude / divisor, magnitude % divisor),
                    None => (0, magnitude),
                };
                format!(
                    "{sign}{whole}.{fraction:0width$}",
                    width = usize::from(places)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", 0)]
    #[case("7", 7)]
    #[case(" 3 ", 3)]
    #[case("63", 63)]
    fn test_channel_id_valid(#[case] input: &str, #[case] expected: u8) {
        let id: ChannelId = input.parse().unwrap();
        assert_eq!(id.as_u8(), expected);
        assert_eq!(id.index(), usize::from(expected));
    }

    #[rstest]
    #[case("64")]
    #[case("-1")]
    #[case("x")]
    #[case("")]
    fn test_channel_id_invalid(#[case] input: &str) {
        let result: Result<ChannelId> = input.parse();
        assert!(matches!(result, Err(Error::InvalidChannel { .. })));
    }

    #[test]
    fn test_response_carries_request_force() {
        let channel = ChannelId::new(2).unwrap();

        let ok = Response::valid(Request::refresh(channel), 12);
        assert!(ok.is_valid());
        assert!(ok.force);
        assert_eq!(ok.channel, channel);

        let failed = Response::invalid(Request::poll(channel));
        assert!(!failed.is_valid());
        assert!(!failed.force);
    }

    #[rstest]
    #[case(ValueFormat::Integer, 0, "0")]
    #[case(ValueFormat::Integer, 3223, "3223")]
    #[case(ValueFormat::Decimal { places: 1 }, 215, "21.5")]
    #[case(ValueFormat::Decimal { places: 1 }, 0, "0.0")]
    #[case(ValueFormat::Decimal { places: 1 }, -5, "-0.5")]
    #[case(ValueFormat::Decimal { places: 1 }, -123, "-12.3")]
    #[case(ValueFormat::Decimal { places: 2 }, 1005, "10.05")]
    #[case(ValueFormat::Decimal { places: 0 }, -7, "-7")]
    #[case(ValueFormat::Decimal { places: 20 }, 215, "0.00000000000000000215")]
    #[case(ValueFormat::Decimal { places: 19 }, i64::MIN, "-0.9223372036854775808")]
    fn test_value_format(#[case] format: ValueFormat, #[case] value: i64, #[case] expected: &str) {
        assert_eq!(format.format(value), expected);
    }

    #[test]
    fn test_value_format_many_places() {
        let text = ValueFormat::Decimal { places: 255 }.format(-12);
        assert!(text.starts_with("-0.000"));
        assert!(text.ends_with("012"));
        assert_eq!(text.len(), "-0.".len() + 255);
    }

    #[test]
    fn test_value_format_deserialization() {
        let format: ValueFormat = serde_json::from_str(r#"{"decimal":{"places":1}}"#).unwrap();
        assert_eq!(format, ValueFormat::Decimal { places: 1 });

        let format: ValueFormat = serde_json::from_str(r#""integer""#).unwrap();
        assert_eq!(format, ValueFormat::Integer);
    }
}
