//! Request sources: trigger inputs and the periodic timer.
//!
//! Neither source touches the device. They only decide *when* the driver
//! enqueues read requests.

use crate::dispatch::ChannelSpec;
use hakit_core::constants::TRIGGER_ALL_INPUT;
use hakit_core::{ChannelId, Error, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Parse an input value the way the host engine's integer inputs do.
///
/// Leading whitespace and an optional sign are accepted, parsing stops at the
/// first non-digit, and text without leading digits is 0. Out-of-range values
/// saturate.
///
/// # Examples
///
/// ```
/// use hakit_bridge::trigger::parse_level;
///
/// assert_eq!(parse_level("1"), 1);
/// assert_eq!(parse_level(" -12abc"), -12);
/// assert_eq!(parse_level("on"), 0);
/// ```
pub fn parse_level(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });

    if negative { -magnitude } else { magnitude }
}

/// Whether a trigger input level requests a refresh.
///
/// Every non-zero level does; the engine sends a fresh event per pulse, so
/// no previous level is kept.
pub fn is_triggered(level: i64) -> bool {
    level != 0
}

/// What an input is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRoute {
    /// The global `trig` input: read every channel.
    TriggerAll,

    /// A per-channel trigger input.
    TriggerChannel(ChannelId),

    /// A device setting, forwarded to the worker on every event.
    Setting(&'static str),
}

/// Mapping from input names to their routes.
#[derive(Debug, Clone, Default)]
pub struct InputMap {
    routes: HashMap<String, InputRoute>,
}

impl InputMap {
    /// Build the input map of a driver.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if two inputs share a name.
    pub fn new<'a>(
        channels: impl IntoIterator<Item = &'a ChannelSpec>,
        settings: &[&'static str],
    ) -> Result<Self> {
        let mut map = Self::default();
        map.insert(TRIGGER_ALL_INPUT, InputRoute::TriggerAll)?;
        for spec in channels {
            if let Some(trigger) = &spec.trigger {
                map.insert(trigger, InputRoute::TriggerChannel(spec.id))?;
            }
        }
        for setting in settings {
            map.insert(setting, InputRoute::Setting(setting))?;
        }
        Ok(map)
    }

    fn insert(&mut self, name: &str, route: InputRoute) -> Result<()> {
        if self.routes.insert(name.to_string(), route).is_some() {
            return Err(Error::configuration(format!("duplicate input '{name}'")));
        }
        Ok(())
    }

    pub fn route(&self, name: &str) -> Option<InputRoute> {
        self.routes.get(name).copied()
    }

    /// Input names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

/// Optional recurring timer.
///
/// A disarmed timer never fires, so it can sit in a `select!` unconditionally.
#[derive(Debug, Default)]
pub struct PeriodicTimer {
    interval: Option<Interval>,
}

impl PeriodicTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every `period`, starting one period from now.
    ///
    /// Late ticks are delayed rather than bunched up. Must be called from
    /// within a tokio runtime.
    pub fn arm(&mut self, period: Duration) {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn disarm(&mut self) {
        self.interval = None;
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Wait for the next firing. Pends forever while disarmed.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}
