//! Instance properties as delivered by the host engine.
//!
//! The engine stores every property as text. Integer properties follow C
//! `atoi` rules (garbage reads as 0), addresses and channel numbers also
//! accept a `0x` prefix, and missing properties fall back to the class
//! default.

use hakit_bridge::trigger::parse_level;
use hakit_core::{Error, Result};
use std::collections::BTreeMap;

/// Name to text map of one instance's properties.
pub type Properties = BTreeMap<String, String>;

/// Text value of a property, if set.
pub fn text<'a>(props: &'a Properties, name: &str) -> Option<&'a str> {
    props.get(name).map(String::as_str)
}

/// Integer value of a property, `atoi` style. Missing properties read as 0.
pub fn int(props: &Properties, name: &str) -> i64 {
    text(props, name).map_or(0, parse_level)
}

/// Parse an unsigned number in decimal, `0x` hexadecimal or `0` octal.
///
/// # Examples
///
/// ```
/// use hakit_sensors::props::parse_number;
///
/// assert_eq!(parse_number("64"), Some(64));
/// assert_eq!(parse_number("0x41"), Some(0x41));
/// assert_eq!(parse_number("010"), Some(8));
/// assert_eq!(parse_number("forty"), None);
/// ```
pub fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if text.len() > 1
        && let Some(octal) = text.strip_prefix('0')
    {
        u32::from_str_radix(octal, 8).ok()
    } else {
        text.parse().ok()
    }
}

/// Parse a floating point property.
///
/// # Errors
///
/// Returns a configuration error naming `name` if the text is not a number.
pub fn parse_float(name: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse()
        .map_err(|_| Error::configuration(format!("{name}: '{}' is not a number", text.trim())))
}

/// Split a comma separated list, trimming each entry.
pub fn list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim)
}
