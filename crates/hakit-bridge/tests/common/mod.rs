//! Shared helpers for the bridge integration tests.
//!
//! Every helper drives a real poll worker thread through the public
//! [`Driver`] API; nothing here reaches into the queues directly.

#![allow(dead_code)]

use hakit_bridge::mock::{MockSensor, MockSensorHandle, RecordingPublisher};
use hakit_bridge::{ChannelId, ChannelSpec, Driver, DriverConfig};
use std::time::Duration;
use tokio::time::timeout;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

pub type TestDriver = Driver<RecordingPublisher>;

pub fn ch(id: u8) -> ChannelId {
    ChannelId::new(id).unwrap()
}

/// `out<N>` channel specs for the given ids, MCP3008 style.
pub fn outputs(ids: &[u8]) -> Vec<ChannelSpec> {
    ids.iter()
        .map(|&id| ChannelSpec::new(ch(id), format!("out{id}")).with_trigger(format!("trig{id}")))
        .collect()
}

/// Config for an eight-channel ADC-like device.
pub fn adc_config(ids: &[u8]) -> DriverConfig {
    DriverConfig::new("adc").with_channels(outputs(ids))
}

/// Spawn a driver over an eight-channel mock sensor.
pub fn spawn(config: DriverConfig) -> (TestDriver, MockSensorHandle) {
    let (sensor, handle) = MockSensor::new(8);
    let driver = Driver::spawn(config, sensor, RecordingPublisher::new()).unwrap();
    (driver, handle)
}

/// Tick until the driver has received at least `count` responses in total.
pub async fn settle(driver: &mut TestDriver, count: u64) {
    timeout(WAIT, async {
        while driver.stats().responses < count {
            driver.tick().await.unwrap();
        }
    })
    .await
    .expect("responses did not arrive in time");
}

/// Poll `condition` on the test thread until it holds.
pub fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + WAIT;
    while !condition() {
        assert!(std::time::Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}
