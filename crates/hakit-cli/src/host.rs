//! Stand-in for the home-automation engine: builds the configured drivers
//! and runs them on one event loop.

use crate::config::DriverEntry;
use anyhow::Context;
use hakit_bridge::mock::MockSensor;
use hakit_bridge::trigger::parse_level;
use hakit_bridge::{ChannelId, ChannelSpec, Driver, DriverConfig, DriverStats, Publisher};
use hakit_sensors::{Blueprint, Properties, build, props};
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{error, info};

pub const MOCK_CLASS: &str = "mock";

/// Logs every published value.
#[derive(Debug)]
pub struct LogPublisher {
    driver: String,
    published: u64,
}

impl LogPublisher {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            published: 0,
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl Publisher for LogPublisher {
    fn publish(&mut self, channel: &str, value: &str) {
        self.published += 1;
        info!(driver = %self.driver, channel, value, "update");
    }
}

/// Scripted sensor for trying a configuration without hardware.
///
/// `channels` sets the number of `out<N>` outputs (default 1) and `values`
/// the comma separated value each one reads.
fn mock_blueprint(properties: &Properties) -> anyhow::Result<Blueprint> {
    let count = props::int(properties, "channels").clamp(1, 8) as u8;
    let (sensor, handle) = MockSensor::new(usize::from(count));

    let values: Vec<_> = props::text(properties, "values")
        .map(|text| props::list(text).map(parse_level).collect())
        .unwrap_or_default();

    let mut specs = Vec::with_capacity(usize::from(count));
    for n in 0..count {
        let id = ChannelId::new(n)?;
        let value = values.get(usize::from(n)).copied().unwrap_or(0);
        handle.set_value(id, i32::try_from(value).unwrap_or(i32::MAX));
        specs.push(ChannelSpec::new(id, format!("out{n}")).with_trigger(format!("trig{n}")));
    }

    let config = DriverConfig::new(MOCK_CLASS)
        .with_channels(specs)
        .with_period_ms(props::int(properties, "period"));
    Ok(Blueprint::new(sensor, config))
}

/// Build and start the driver for one configuration entry.
pub fn open(entry: &DriverEntry) -> anyhow::Result<Driver<LogPublisher>> {
    let properties = entry.properties()?;
    let blueprint = if entry.class == MOCK_CLASS {
        mock_blueprint(&properties)?
    } else {
        build(&entry.class, &properties)?
    };

    let mut blueprint = blueprint.named(&entry.name);
    if let Some(capacity) = entry.queue_capacity {
        blueprint.config = blueprint.config.with_queue_capacity(capacity);
    }

    let mut driver = Driver::spawn(
        blueprint.config,
        blueprint.device,
        LogPublisher::new(&entry.name),
    )?;
    driver.start()?;
    Ok(driver)
}

/// Run every driver until `stop` resolves, then shut them all down.
///
/// Returns the statistics of each driver, by name. A driver whose worker
/// dies is shut down on its own while the others keep running.
pub async fn run<F>(
    entries: &[DriverEntry],
    stop: F,
) -> anyhow::Result<Vec<(String, DriverStats)>>
where
    F: Future<Output = ()>,
{
    let mut drivers = Vec::with_capacity(entries.len());
    for entry in entries {
        let driver = open(entry)
            .with_context(|| format!("driver '{}' ({})", entry.name, entry.class))?;
        drivers.push(driver);
    }

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let mut tasks = JoinSet::new();
    for mut driver in drivers {
        let mut stop_rx = stop_rx.clone();
        tasks.spawn(async move {
            let stopped = async move {
                let _ = stop_rx.wait_for(|stop| *stop).await;
            };
            if let Err(e) = driver.run_until(stopped).await {
                error!(driver = %driver.name(), error = %e, "driver stopped");
            }
            let name = driver.name().to_string();
            let published = driver.publisher().published();
            let stats = driver.stats();
            if let Err(e) = driver.shutdown().await {
                error!(driver = %name, error = %e, "shutdown failed");
            }
            info!(driver = %name, published, "driver closed");
            (name, stats)
        });
    }

    stop.await;
    info!("stopping drivers");
    let _ = stop_tx.send(true);

    let mut results = Vec::with_capacity(entries.len());
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("driver task failed")?);
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}
