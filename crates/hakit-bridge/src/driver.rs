//! Driver instance: one device, one worker thread, two queues.
//!
//! A [`Driver`] is what the host engine holds per configured sensor. It
//! lives on the event loop and owns everything except the device itself,
//! which is moved into the poll worker at construction.
//!
//! # Lifecycle
//!
//! 1. [`Driver::spawn`] validates the configuration, creates both queues and
//!    starts the worker. Any failure here leaves nothing running.
//! 2. [`Driver::start`] issues a forced read of every channel and arms the
//!    periodic timer.
//! 3. The event loop calls [`Driver::tick`] (or [`Driver::run_until`]) to
//!    dispatch responses and fire periodic reads, and forwards engine inputs
//!    through [`Driver::input`].
//! 4. [`Driver::shutdown`] sends `Close`, dispatches the last responses and
//!    joins the worker.
//!
//! # Examples
//!
//! ```
//! use hakit_bridge::mock::{MockSensor, RecordingPublisher};
//! use hakit_bridge::{ChannelId, ChannelSpec, Driver, DriverConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> hakit_bridge::Result<()> {
//!     let ch0 = ChannelId::new(0)?;
//!     let (sensor, handle) = MockSensor::new(1);
//!     handle.set_value(ch0, 42);
//!
//!     let config = DriverConfig::new("adc").with_channel(ChannelSpec::new(ch0, "out0"));
//!     let mut driver = Driver::spawn(config, sensor, RecordingPublisher::new())?;
//!
//!     driver.start()?;
//!     driver.tick().await?;
//!     assert_eq!(driver.publisher().values_for("out0"), vec!["42"]);
//!
//!     driver.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::dispatch::{ChannelSpec, ChannelState, ChannelTable, Outcome};
use crate::queue::{RequestSender, ResponseReceiver, request_queue, response_queue};
use crate::traits::{DeviceOperation, Publisher};
use crate::trigger::{InputMap, InputRoute, PeriodicTimer, is_triggered, parse_level};
use crate::worker::{PollWorker, WorkerExit};
use hakit_core::constants::DEFAULT_QUEUE_CAPACITY;
use hakit_core::{ChannelId, Command, Error, Request, Response, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Wait between attempts to queue `Close` while dropping a driver.
const CLOSE_RETRY: Duration = Duration::from_millis(1);

/// Configuration of one driver instance.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Instance name, used for the worker thread and in logs.
    pub name: String,

    pub channels: Vec<ChannelSpec>,

    /// Periodic read interval. `None` disables the timer.
    pub period: Option<Duration>,

    /// Capacity of each queue. Raised to the channel count if smaller.
    pub queue_capacity: usize,

    /// Read every channel with `force` set when the driver starts.
    pub force_on_start: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: "hakit".to_string(),
            channels: Vec::new(),
            period: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            force_on_start: true,
        }
    }
}

impl DriverConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: ChannelSpec) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_channels(mut self, channels: impl IntoIterator<Item = ChannelSpec>) -> Self {
        self.channels.extend(channels);
        self
    }

    pub fn with_period(mut self, period: Option<Duration>) -> Self {
        self.period = period.filter(|p| !p.is_zero());
        self
    }

    /// Set the period from a millisecond count; zero or negative disables it.
    pub fn with_period_ms(self, period_ms: i64) -> Self {
        let period = u64::try_from(period_ms).ok().map(Duration::from_millis);
        self.with_period(period)
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_force_on_start(mut self, force: bool) -> Self {
        self.force_on_start = force;
        self
    }

    /// Capacity actually used for both queues.
    ///
    /// Never below the channel count, so a full fan-out always fits.
    pub fn effective_capacity(&self) -> usize {
        self.queue_capacity.max(self.channels.len()).max(1)
    }

    /// Check the configuration against a device with `device_channels`
    /// channels.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty name, or an invalid channel
    /// error for a channel the device does not have.
    pub fn validate(&self, device_channels: usize) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("driver name is empty"));
        }
        for spec in &self.channels {
            if spec.id.index() >= device_channels {
                return Err(Error::invalid_channel(
                    spec.id,
                    format!("device has {device_channels} channels"),
                ));
            }
        }
        Ok(())
    }
}

/// Counters kept by a driver for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStats {
    /// Read requests enqueued.
    pub requests: u64,

    /// Read requests refused because the request queue was full.
    pub rejected: u64,

    /// Responses received from the worker.
    pub responses: u64,

    /// Values handed to the publisher.
    pub published: u64,

    /// Valid responses dropped as duplicates.
    pub suppressed: u64,

    /// Failed reads.
    pub invalid: u64,

    /// Periodic timer firings.
    pub periodic_ticks: u64,
}

/// What a call to [`Driver::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Responses were dispatched.
    Responses(usize),

    /// The periodic timer fired and this many reads were enqueued.
    Periodic(usize),
}

/// One running driver instance.
pub struct Driver<P: Publisher> {
    name: String,
    requests: RequestSender,
    responses: ResponseReceiver,
    worker: Option<JoinHandle<WorkerExit>>,
    channels: ChannelTable,
    inputs: InputMap,
    timer: PeriodicTimer,
    period: Option<Duration>,
    force_on_start: bool,
    started: bool,
    publisher: P,
    stats: DriverStats,
}

impl<P: Publisher> Driver<P> {
    /// Validate `config`, then start a poll worker owning `device`.
    ///
    /// # Errors
    ///
    /// Returns a construction error if the configuration does not fit the
    /// device or the worker thread cannot be created. The device is dropped
    /// and no thread is left running.
    pub fn spawn<D: DeviceOperation>(config: DriverConfig, device: D, publisher: P) -> Result<Self> {
        config.validate(device.channel_count())?;

        let capacity = config.effective_capacity();
        let DriverConfig {
            name,
            channels,
            period,
            force_on_start,
            ..
        } = config;

        let channels = ChannelTable::new(channels)?;
        let inputs = InputMap::new(channels.specs(), device.settings())?;

        let family = device.family().to_string();
        let (requests, request_rx) = request_queue(capacity);
        let (response_tx, responses) = response_queue(capacity);
        let worker = PollWorker::new(name.clone(), device, request_rx, response_tx).spawn()?;

        info!(
            driver = %name,
            family = %family,
            channels = channels.len(),
            capacity,
            period_ms = period.map(|p| p.as_millis() as u64),
            "Driver created"
        );

        Ok(Self {
            name,
            requests,
            responses,
            worker: Some(worker),
            channels,
            inputs,
            timer: PeriodicTimer::new(),
            period,
            force_on_start,
            started: false,
            publisher,
            stats: DriverStats::default(),
        })
    }

    /// Issue the initial forced reads and arm the periodic timer.
    ///
    /// Calling it again once it succeeded has no effect.
    ///
    /// # Errors
    ///
    /// Returns the error of the first read that could not be enqueued. The
    /// driver then stays unstarted and `start` may be retried; channels
    /// enqueued before the failure are read again.
    ///
    /// # Panics
    ///
    /// Panics if a period is configured and this is called outside a tokio
    /// runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        if self.force_on_start {
            self.trigger_all(true)?;
        }
        if let Some(period) = self.period {
            self.timer.arm(period);
        }
        self.started = true;
        debug!(driver = %self.name, "Driver started");
        Ok(())
    }

    /// Enqueue a read of one channel.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidChannel` if the channel is not configured.
    /// - `Error::QueueFull` if the request queue is full.
    /// - `Error::WorkerTerminated` if the worker is gone.
    pub fn trigger(&mut self, channel: ChannelId, force: bool) -> Result<()> {
        if !self.channels.contains(channel) {
            return Err(Error::invalid_channel(channel, "not configured"));
        }

        self.channels.note_request(channel, force);
        let request = Request { channel, force };
        match self.requests.send(Command::Read(request)) {
            Ok(()) => {
                self.stats.requests += 1;
                trace!(driver = %self.name, channel = %channel, force, "Request queued");
                Ok(())
            }
            Err(e) => {
                self.channels.cancel_request(channel, force);
                if matches!(e, Error::QueueFull { .. }) {
                    self.stats.rejected += 1;
                }
                warn!(driver = %self.name, channel = %channel, error = %e, "Cannot queue request");
                Err(e)
            }
        }
    }

    /// Enqueue a read of every configured channel, in configuration order.
    ///
    /// Stops at the first channel that cannot be enqueued.
    pub fn trigger_all(&mut self, force: bool) -> Result<()> {
        for index in 0..self.channels.len() {
            let channel = self.channels.ids()[index];
            self.trigger(channel, force)?;
        }
        Ok(())
    }

    /// Enqueue a non-forced read of every channel with a consumer.
    ///
    /// Returns the number of reads enqueued.
    pub fn trigger_periodic(&mut self) -> Result<usize> {
        self.stats.periodic_ticks += 1;

        let connected: Vec<ChannelId> = self
            .channels
            .specs()
            .filter(|spec| self.publisher.is_connected(&spec.name))
            .map(|spec| spec.id)
            .collect();

        for channel in &connected {
            self.trigger(*channel, false)?;
        }
        Ok(connected.len())
    }

    /// Handle an engine input event.
    ///
    /// Trigger inputs issue forced reads on every non-zero level, so a
    /// repeated `1` refreshes again. Setting inputs forward the parsed value
    /// to the worker on every event. Returns whether the event caused a
    /// request.
    ///
    /// # Errors
    ///
    /// Propagates queueing errors.
    pub fn input(&mut self, signal: &str, raw: &str) -> Result<bool> {
        let Some(route) = self.inputs.route(signal) else {
            debug!(driver = %self.name, signal, "Ignoring unknown input");
            return Ok(false);
        };

        let level = parse_level(raw);
        match route {
            InputRoute::TriggerAll => {
                if !is_triggered(level) {
                    return Ok(false);
                }
                self.trigger_all(true)?;
            }
            InputRoute::TriggerChannel(channel) => {
                if !is_triggered(level) {
                    return Ok(false);
                }
                self.trigger(channel, true)?;
            }
            InputRoute::Setting(setting) => {
                let value = i32::try_from(level).unwrap_or(if level < 0 { i32::MIN } else { i32::MAX });
                self.requests.send(Command::Write { setting, value })?;
                debug!(driver = %self.name, setting, value, "Setting queued");
            }
        }
        Ok(true)
    }

    /// Dispatch every response already waiting, without blocking.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkerTerminated` when nothing was waiting and the
    /// worker is gone.
    pub fn poll(&mut self) -> Result<usize> {
        let mut handled = 0;
        loop {
            match self.responses.try_recv() {
                Ok(Some(response)) => {
                    self.dispatch(response);
                    handled += 1;
                }
                Ok(None) => return Ok(handled),
                Err(e) if handled == 0 => return Err(e),
                Err(_) => return Ok(handled),
            }
        }
    }

    /// Wait for the next thing to do and do it.
    ///
    /// Responses take precedence over the timer. When a response arrives,
    /// every response already waiting is dispatched with it.
    ///
    /// # Errors
    ///
    /// - `Error::WorkerTerminated` once the worker is gone and every response
    ///   has been dispatched.
    /// - Queueing errors from the periodic trigger.
    pub async fn tick(&mut self) -> Result<Activity> {
        tokio::select! {
            biased;

            response = self.responses.recv() => {
                let Some(response) = response else {
                    return Err(Error::WorkerTerminated);
                };
                self.dispatch(response);
                let more = self.poll().unwrap_or(0);
                Ok(Activity::Responses(1 + more))
            }

            () = self.timer.tick() => {
                trace!(driver = %self.name, "Periodic trigger");
                self.trigger_periodic().map(Activity::Periodic)
            }
        }
    }

    /// Run [`tick`](Self::tick) until `stop` completes.
    ///
    /// A full request queue is logged and does not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns any other error from `tick`, typically
    /// `Error::WorkerTerminated`.
    pub async fn run_until<F>(&mut self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);
        loop {
            tokio::select! {
                biased;

                () = &mut stop => return Ok(()),

                activity = self.tick() => match activity {
                    Ok(_) | Err(Error::QueueFull { .. }) => {}
                    Err(e) => return Err(e),
                },
            }
        }
    }

    /// Stop the worker and release the device.
    ///
    /// Sends `Close`, dispatches the responses to requests queued before it
    /// and joins the worker thread.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkerTerminated` if the worker thread panicked.
    pub async fn shutdown(mut self) -> Result<WorkerExit> {
        let Some(worker) = self.worker.take() else {
            return Err(Error::WorkerTerminated);
        };
        self.timer.disarm();

        loop {
            match self.requests.send(Command::Close) {
                Ok(()) => break,
                // Every response received lets the worker move on to the next request
                Err(Error::QueueFull { .. }) => match self.responses.recv().await {
                    Some(response) => self.dispatch(response),
                    None => break,
                },
                Err(_) => break,
            }
        }

        while let Some(response) = self.responses.recv().await {
            self.dispatch(response);
        }

        match worker.join() {
            Ok(exit) => {
                info!(driver = %self.name, exit = ?exit, stats = ?self.stats, "Driver shut down");
                Ok(exit)
            }
            Err(_) => {
                error!(driver = %self.name, "Poll worker panicked");
                Err(Error::WorkerTerminated)
            }
        }
    }

    fn dispatch(&mut self, response: Response) {
        self.stats.responses += 1;
        match self.channels.apply(response) {
            Outcome::Published(publication) => {
                self.stats.published += 1;
                debug!(
                    driver = %self.name,
                    channel = publication.channel,
                    value = %publication.value,
                    "Publish"
                );
                self.publisher.publish(publication.channel, &publication.value);
            }
            Outcome::Suppressed => {
                self.stats.suppressed += 1;
                trace!(driver = %self.name, channel = %response.channel, "Unchanged");
            }
            Outcome::Invalid => {
                self.stats.invalid += 1;
                debug!(driver = %self.name, channel = %response.channel, "Invalid response");
            }
            Outcome::Unknown => {
                error!(driver = %self.name, channel = %response.channel, "Response for unknown channel");
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub fn channel_state(&self, channel: ChannelId) -> Option<&ChannelState> {
        self.channels.state(channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelSpec> {
        self.channels.specs()
    }

    /// Input names this driver reacts to.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs.names()
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether the worker thread is still running.
    pub fn is_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }
}

/// Dropping a driver without [`Driver::shutdown`] discards the responses
/// still queued and blocks until the worker finishes its current command.
/// The device is released before `drop` returns.
impl<P: Publisher> Drop for Driver<P> {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        // The worker exits at its next response, or at Close once queued
        self.responses.close();
        loop {
            match self.requests.send(Command::Close) {
                Err(Error::QueueFull { .. }) => std::thread::sleep(CLOSE_RETRY),
                Ok(()) | Err(_) => break,
            }
        }

        match worker.join() {
            Ok(exit) => debug!(driver = %self.name, exit = ?exit, "Driver dropped without shutdown"),
            Err(_) => error!(driver = %self.name, "Poll worker panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSensor, RecordingPublisher};

    fn ch(id: u8) -> ChannelId {
        ChannelId::new(id).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = DriverConfig::default();
        assert!(config.force_on_start);
        assert_eq!(config.period, None);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_config_period_ms() {
        assert_eq!(DriverConfig::default().with_period_ms(0).period, None);
        assert_eq!(DriverConfig::default().with_period_ms(-5).period, None);
        assert_eq!(
            DriverConfig::default().with_period_ms(250).period,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_config_capacity_covers_fan_out() {
        let config = DriverConfig::new("x")
            .with_queue_capacity(2)
            .with_channels((0..5).map(|i| ChannelSpec::new(ch(i), format!("out{i}"))));
        assert_eq!(config.effective_capacity(), 5);
        assert_eq!(DriverConfig::new("x").with_queue_capacity(0).effective_capacity(), 1);
    }

    #[test]
    fn test_spawn_rejects_channel_beyond_device() {
        let (sensor, _handle) = MockSensor::new(2);
        let config = DriverConfig::new("adc").with_channel(ChannelSpec::new(ch(2), "out2"));
        let result = Driver::spawn(config, sensor, RecordingPublisher::new());
        assert!(matches!(result, Err(Error::InvalidChannel { .. })));
    }

    #[test]
    fn test_spawn_rejects_empty_channel_list() {
        let (sensor, _handle) = MockSensor::new(2);
        let result = Driver::spawn(DriverConfig::new("adc"), sensor, RecordingPublisher::new());
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_trigger_unknown_channel() {
        let (sensor, _handle) = MockSensor::new(4);
        let config = DriverConfig::new("adc").with_channel(ChannelSpec::new(ch(0), "out0"));
        let mut driver = Driver::spawn(config, sensor, RecordingPublisher::new()).unwrap();

        assert!(matches!(
            driver.trigger(ch(3), false),
            Err(Error::InvalidChannel { .. })
        ));
        assert_eq!(driver.stats().requests, 0);
        driver.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (sensor, handle) = MockSensor::new(1);
        handle.set_value(ch(0), 1);
        let config = DriverConfig::new("t").with_channel(ChannelSpec::new(ch(0), "out"));
        let mut driver = Driver::spawn(config, sensor, RecordingPublisher::new()).unwrap();

        driver.start().unwrap();
        driver.start().unwrap();
        assert_eq!(driver.stats().requests, 1);
        assert_eq!(driver.channel_state(ch(0)).unwrap().pending_force, 1);

        let exit = driver.shutdown().await.unwrap();
        assert_eq!(exit, WorkerExit::Closed);
    }

    #[tokio::test]
    async fn test_start_without_force() {
        let (sensor, handle) = MockSensor::new(1);
        handle.set_value(ch(0), 1);
        let config = DriverConfig::new("t")
            .with_channel(ChannelSpec::new(ch(0), "out"))
            .with_force_on_start(false);
        let mut driver = Driver::spawn(config, sensor, RecordingPublisher::new()).unwrap();

        driver.start().unwrap();
        assert_eq!(driver.stats().requests, 0);
        driver.shutdown().await.unwrap();
        assert_eq!(handle.read_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_input_is_ignored() {
        let (sensor, _handle) = MockSensor::new(1);
        let config = DriverConfig::new("t").with_channel(ChannelSpec::new(ch(0), "out"));
        let mut driver = Driver::spawn(config, sensor, RecordingPublisher::new()).unwrap();

        assert!(!driver.input("bogus", "1").unwrap());
        let mut inputs: Vec<&str> = driver.inputs().collect();
        inputs.sort_unstable();
        assert_eq!(inputs, vec!["trig"]);
        driver.shutdown().await.unwrap();
    }

    #[test]
    fn test_drop_stops_worker() {
        let (sensor, handle) = MockSensor::new(1);
        handle.set_value(ch(0), 1);
        let config = DriverConfig::new("t").with_channel(ChannelSpec::new(ch(0), "out"));
        let driver = Driver::spawn(config, sensor, RecordingPublisher::new()).unwrap();
        assert!(driver.is_alive());
        drop(driver);
        assert_eq!(handle.read_count(), 0);
        assert!(handle.is_dropped());
    }

    #[test]
    fn test_drop_waits_for_read_in_progress() {
        let (sensor, handle) = MockSensor::new(1);
        handle.set_value(ch(0), 1);
        handle.pause();
        let config = DriverConfig::new("t")
            .with_channel(ChannelSpec::new(ch(0), "out"))
            .with_queue_capacity(1);
        let mut driver = Driver::spawn(config, sensor, RecordingPublisher::new()).unwrap();

        driver.start().unwrap();
        assert!(handle.wait_entered(1, Duration::from_secs(5)));
        // The request queue is full again behind the blocked read
        driver.trigger(ch(0), false).unwrap();

        let dropper = std::thread::spawn(move || drop(driver));
        std::thread::sleep(Duration::from_millis(50));
        assert!(!dropper.is_finished());
        assert!(!handle.is_dropped());

        handle.resume();
        dropper.join().unwrap();
        assert!(handle.is_dropped());
        assert_eq!(handle.read_count(), 1);
    }

    #[test]
    fn test_drop_unblocks_worker_on_full_response_queue() {
        let (sensor, handle) = MockSensor::new(2);
        handle.set_value(ch(0), 1);
        handle.set_value(ch(1), 2);
        let config = DriverConfig::new("t")
            .with_channels([ChannelSpec::new(ch(0), "out0"), ChannelSpec::new(ch(1), "out1")])
            .with_queue_capacity(2);
        let mut driver = Driver::spawn(config, sensor, RecordingPublisher::new()).unwrap();

        // Two responses fill the queue, the third read blocks on delivery
        driver.start().unwrap();
        assert!(handle.wait_entered(2, Duration::from_secs(5)));
        driver.trigger(ch(0), false).unwrap();
        assert!(handle.wait_entered(3, Duration::from_secs(5)));

        drop(driver);
        assert!(handle.is_dropped());
    }

    #[tokio::test]
    async fn test_start_can_be_retried_after_full_queue() {
        let (sensor, handle) = MockSensor::new(1);
        handle.set_value(ch(0), 1);
        handle.pause();
        let config = DriverConfig::new("t")
            .with_channel(ChannelSpec::new(ch(0), "out"))
            .with_queue_capacity(1);
        let mut driver = Driver::spawn(config, sensor, RecordingPublisher::new()).unwrap();

        driver.trigger(ch(0), false).unwrap();
        assert!(handle.wait_entered(1, Duration::from_secs(5)));
        driver.trigger(ch(0), false).unwrap();

        assert!(matches!(driver.start(), Err(Error::QueueFull { .. })));
        assert!(!driver.is_started());

        handle.resume();
        tokio::time::timeout(Duration::from_secs(5), async {
            while driver.stats().responses < 2 {
                driver.tick().await.unwrap();
            }
        })
        .await
        .unwrap();

        driver.start().unwrap();
        assert!(driver.is_started());
        assert_eq!(driver.stats().requests, 3);
        assert_eq!(driver.channel_state(ch(0)).unwrap().pending_force, 1);
        driver.shutdown().await.unwrap();
    }
}
