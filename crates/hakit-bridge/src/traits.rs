//! Seams between the bridge and its collaborators.
//!
//! The bridge depends on exactly two capabilities:
//!
//! - a [`DeviceOperation`], the blocking, sensor-family-specific bus
//!   transaction. It is moved into the poll worker at construction and is
//!   never touched from the event loop again.
//! - a [`Publisher`], the host engine's output side. It lives on the event
//!   loop and receives `(channel name, formatted value)` pairs.
//!
//! Both traits are object-safe, so hosts may use `Box<dyn DeviceOperation>`
//! and `Box<dyn Publisher>` when the concrete type is chosen at runtime.

use crate::{ChannelId, Error, RawValue, Result};

/// Blocking measurement primitive of one sensor family.
///
/// Implementations perform the actual bus transaction (1-wire file read,
/// I2C register read, SPI transfer) and return a raw value in device units.
/// They are only ever called from the poll worker thread, one call at a
/// time, so they need no internal synchronization.
///
/// # Examples
///
/// ```
/// use hakit_bridge::{ChannelId, DeviceOperation, RawValue, Result};
///
/// struct Constant(RawValue);
///
/// impl DeviceOperation for Constant {
///     fn family(&self) -> &str {
///         "constant"
///     }
///
///     fn channel_count(&self) -> usize {
///         1
///     }
///
///     fn read(&mut self, _channel: ChannelId) -> Result<RawValue> {
///         Ok(self.0)
///     }
/// }
/// ```
pub trait DeviceOperation: Send + 'static {
    /// Sensor family name, used in log messages (e.g. `"mcp3008"`).
    fn family(&self) -> &str;

    /// Number of addressable channels. Valid ids are `0..channel_count()`.
    fn channel_count(&self) -> usize;

    /// Read one channel.
    ///
    /// # Errors
    ///
    /// Returns an error when the transaction fails or the device reports
    /// that the sample is not trustworthy. The worker turns any error into
    /// an invalid response for this channel and keeps running.
    fn read(&mut self, channel: ChannelId) -> Result<RawValue>;

    /// Names of the settings accepted by [`write`](Self::write).
    fn settings(&self) -> &'static [&'static str] {
        &[]
    }

    /// Apply a device setting.
    ///
    /// # Errors
    ///
    /// The default implementation returns `Error::Unsupported`.
    fn write(&mut self, setting: &str, value: i32) -> Result<()> {
        let _ = value;
        Err(Error::unsupported(format!(
            "{} has no setting '{setting}'",
            self.family()
        )))
    }
}

impl<D: DeviceOperation + ?Sized> DeviceOperation for Box<D> {
    fn family(&self) -> &str {
        (**self).family()
    }

    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }

    fn read(&mut self, channel: ChannelId) -> Result<RawValue> {
        (**self).read(channel)
    }

    fn settings(&self) -> &'static [&'static str] {
        (**self).settings()
    }

    fn write(&mut self, setting: &str, value: i32) -> Result<()> {
        (**self).write(setting, value)
    }
}

/// Downstream side of a driver: the host engine's output pads.
///
/// Called on the event loop only.
pub trait Publisher {
    /// Deliver a new value for `channel`.
    fn publish(&mut self, channel: &str, value: &str);

    /// Whether anything consumes `channel`.
    ///
    /// The periodic trigger skips channels nobody listens to. The default
    /// treats every channel as connected.
    fn is_connected(&self, channel: &str) -> bool {
        let _ = channel;
        true
    }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&mut self, channel: &str, value: &str) {
        (**self).publish(channel, value);
    }

    fn is_connected(&self, channel: &str) -> bool {
        (**self).is_connected(channel)
    }
}

impl<P: Publisher + ?Sized> Publisher for &mut P {
    fn publish(&mut self, channel: &str, value: &str) {
        (**self).publish(channel, value);
    }

    fn is_connected(&self, channel: &str) -> bool {
        (**self).is_connected(channel)
    }
}
