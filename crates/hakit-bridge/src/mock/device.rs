//! Scriptable device operation.
//!
//! [`MockSensor`] is moved into a poll worker like any real device while the
//! paired [`MockSensorHandle`] stays with the test. The handle scripts what
//! each read returns and can hold the worker inside a read to simulate a
//! slow bus.

use crate::traits::DeviceOperation;
use hakit_core::{ChannelId, Error, RawValue, Result};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Script {
    /// Value returned once the queued results of a channel are used up.
    values: HashMap<ChannelId, RawValue>,
    /// One-shot results, `None` being a failed read.
    queued: HashMap<ChannelId, VecDeque<Option<RawValue>>>,
    reads: Vec<ChannelId>,
    writes: Vec<(String, i32)>,
    paused: bool,
    entered: usize,
    dropped: bool,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<Script>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mock multi-channel sensor.
///
/// A read of a channel returns, in order of precedence:
///
/// 1. the next result queued with [`MockSensorHandle::push_value`] or
///    [`MockSensorHandle::push_failure`],
/// 2. the value set with [`MockSensorHandle::set_value`],
/// 3. `Error::NotReady` otherwise.
///
/// # Examples
///
/// ```
/// use hakit_bridge::mock::MockSensor;
/// use hakit_bridge::{ChannelId, DeviceOperation};
///
/// let (mut sensor, handle) = MockSensor::new(2);
/// let ch0 = ChannelId::new(0).unwrap();
///
/// handle.set_value(ch0, 12);
/// handle.push_failure(ch0);
///
/// assert!(sensor.read(ch0).is_err());
/// assert_eq!(sensor.read(ch0).unwrap(), 12);
/// assert_eq!(handle.read_count(), 2);
/// ```
pub struct MockSensor {
    shared: Arc<Shared>,
    channels: usize,
    settings: &'static [&'static str],
    on_read: Option<Box<dyn FnMut() + Send>>,
}

impl MockSensor {
    /// Create a sensor with `channels` channels and its control handle.
    pub fn new(channels: usize) -> (Self, MockSensorHandle) {
        let shared = Arc::new(Shared::default());
        let sensor = Self {
            shared: shared.clone(),
            channels,
            settings: &[],
            on_read: None,
        };
        (sensor, MockSensorHandle { shared })
    }

    /// Accept writes to the named settings.
    pub fn with_settings(mut self, settings: &'static [&'static str]) -> Self {
        self.settings = settings;
        self
    }

    /// Run `hook` on the worker thread at the start of every read.
    pub fn on_read(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_read = Some(Box::new(hook));
        self
    }
}

impl Drop for MockSensor {
    fn drop(&mut self) {
        self.shared.lock().dropped = true;
    }
}

impl fmt::Debug for MockSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSensor")
            .field("channels", &self.channels)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DeviceOperation for MockSensor {
    fn family(&self) -> &str {
        "mock"
    }

    fn channel_count(&self) -> usize {
        self.channels
    }

    fn read(&mut self, channel: ChannelId) -> Result<RawValue> {
        if let Some(hook) = self.on_read.as_mut() {
            hook();
        }

        let mut script = self.shared.lock();
        script.entered += 1;
        self.shared.changed.notify_all();
        while script.paused {
            script = self
                .shared
                .changed
                .wait(script)
                .unwrap_or_else(PoisonError::into_inner);
        }
        script.reads.push(channel);

        if channel.index() >= self.channels {
            return Err(Error::invalid_channel(channel, "no such mock channel"));
        }

        let queued = script.queued.get_mut(&channel).and_then(VecDeque::pop_front);
        match queued {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(Error::transfer("scripted failure")),
            None => script
                .values
                .get(&channel)
                .copied()
                .ok_or_else(|| Error::not_ready(format!("no value for channel {channel}"))),
        }
    }

    fn settings(&self) -> &'static [&'static str] {
        self.settings
    }

    fn write(&mut self, setting: &str, value: i32) -> Result<()> {
        if !self.settings.iter().any(|name| *name == setting) {
            return Err(Error::unsupported(format!("mock has no setting '{setting}'")));
        }
        self.shared.lock().writes.push((setting.to_string(), value));
        Ok(())
    }
}

/// Control side of a [`MockSensor`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    shared: Arc<Shared>,
}

impl MockSensorHandle {
    /// Set the steady value of `channel`.
    pub fn set_value(&self, channel: ChannelId, value: RawValue) {
        self.shared.lock().values.insert(channel, value);
    }

    /// Forget the steady value of `channel`; later reads fail as not ready.
    pub fn clear_value(&self, channel: ChannelId) {
        self.shared.lock().values.remove(&channel);
    }

    /// Queue a one-shot value for the next read of `channel`.
    pub fn push_value(&self, channel: ChannelId, value: RawValue) {
        self.shared
            .lock()
            .queued
            .entry(channel)
            .or_default()
            .push_back(Some(value));
    }

    /// Queue a one-shot failure for the next read of `channel`.
    pub fn push_failure(&self, channel: ChannelId) {
        self.shared.lock().queued.entry(channel).or_default().push_back(None);
    }

    /// Hold every read that starts from now on until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.shared.lock().paused = true;
    }

    pub fn resume(&self) {
        self.shared.lock().paused = false;
        self.shared.changed.notify_all();
    }

    /// Block until at least `count` reads have started, or `timeout` elapses.
    ///
    /// Returns whether the count was reached.
    pub fn wait_entered(&self, count: usize, timeout: Duration) -> bool {
        let script = self.shared.lock();
        let (script, _) = self
            .shared
            .changed
            .wait_timeout_while(script, timeout, |s| s.entered < count)
            .unwrap_or_else(PoisonError::into_inner);
        script.entered >= count
    }

    /// Channels read so far, in order.
    pub fn reads(&self) -> Vec<ChannelId> {
        self.shared.lock().reads.clone()
    }

    /// Number of completed reads.
    pub fn read_count(&self) -> usize {
        self.shared.lock().reads.len()
    }

    /// Settings written so far, in order.
    pub fn writes(&self) -> Vec<(String, i32)> {
        self.shared.lock().writes.clone()
    }

    /// Whether the sensor itself has been dropped.
    pub fn is_dropped(&self) -> bool {
        self.shared.lock().dropped
    }
}
