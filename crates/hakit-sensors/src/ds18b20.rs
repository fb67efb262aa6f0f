//! DS18B20 1-wire temperature sensor, read through the Linux `w1` sysfs
//! interface.
//!
//! The kernel driver exposes each probe as a directory named after its
//! 64-bit id (`28-000005e2fdc3`) under `/sys/bus/w1/devices/`. Reading its
//! `w1_slave` file performs a conversion and returns two lines:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The temperature is only trusted when the CRC line says `YES`. The raw
//! value is in thousandths of a degree; the adapter reports tenths so the
//! published text reads `23.1`.

use crate::props::{self, Properties};
use hakit_bridge::trigger::parse_level;
use hakit_bridge::{ChannelId, ChannelSpec, DeviceOperation, DriverConfig, RawValue};
use hakit_core::{Error, Result, ValueFormat};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CLASS_NAME: &str = "ds18b20";

/// Default location of the 1-wire device directories.
pub const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";

const SLAVE_FILE: &str = "w1_slave";

/// Properties of a `ds18b20` instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Ds18b20Config {
    /// Probe id. `None` selects the first probe found.
    pub id: Option<String>,

    /// Periodic read interval in milliseconds, 0 or less disables it.
    pub period: i64,

    pub devices_dir: PathBuf,
}

impl Default for Ds18b20Config {
    fn default() -> Self {
        Self {
            id: None,
            period: 0,
            devices_dir: PathBuf::from(W1_DEVICES_DIR),
        }
    }
}

impl Ds18b20Config {
    pub fn from_properties(props: &Properties) -> Self {
        Self {
            id: props::text(props, "id")
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            period: props::int(props, "period"),
            ..Self::default()
        }
    }

    /// Single `out` channel with a global `trig` input.
    pub fn driver_config(&self, name: &str) -> DriverConfig {
        let out = ChannelSpec::new(ChannelId::default(), "out")
            .with_format(ValueFormat::Decimal { places: 1 });
        DriverConfig::new(name)
            .with_channel(out)
            .with_period_ms(self.period)
    }
}

/// Locate the probe directory.
///
/// Only entries starting with a digit are probes; the bus master
/// (`w1_bus_master1`) is skipped. Without an id the first probe in directory
/// order is used.
///
/// # Errors
///
/// Returns `Error::DeviceNotFound` if the directory is missing, holds no
/// probe, or does not hold the requested one.
pub fn discover(devices_dir: &Path, id: Option<&str>) -> Result<String> {
    let entries = fs::read_dir(devices_dir).map_err(|e| {
        Error::device_not_found(format!("{}: {e}", devices_dir.display()))
    })?;

    let mut probes: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(|c: char| c.is_ascii_digit()))
        .collect();
    probes.sort();

    debug!(dir = %devices_dir.display(), probes = ?probes, "1-wire device list");

    let found = match id {
        Some(id) => probes.into_iter().find(|name| name == id),
        None => probes.into_iter().next(),
    };

    found.ok_or_else(|| match id {
        Some(id) => Error::device_not_found(format!("1-wire device {id}")),
        None => Error::device_not_found("no 1-wire device"),
    })
}

/// Extract the temperature from `w1_slave` text, in thousandths of a degree.
///
/// Returns `None` unless a `crc=` line containing `YES` precedes a line
/// holding `t=`.
pub fn parse_w1_slave(text: &str) -> Option<i64> {
    let mut crc_ok = false;
    for line in text.lines() {
        if let Some(pos) = line.find("crc=") {
            if line[pos..].contains("YES") {
                crc_ok = true;
            }
        } else if crc_ok && let Some(pos) = line.find("t=") {
            return Some(parse_level(&line[pos + 2..]));
        }
    }
    None
}

/// DS18B20 probe behind the `w1_slave` file.
#[derive(Debug)]
pub struct Ds18b20 {
    id: String,
    path: PathBuf,
}

impl Ds18b20 {
    /// Find the probe and remember its data file.
    ///
    /// # Errors
    ///
    /// See [`discover`].
    pub fn open(config: &Ds18b20Config) -> Result<Self> {
        let id = discover(&config.devices_dir, config.id.as_deref())?;
        let path = config.devices_dir.join(&id).join(SLAVE_FILE);
        info!(id = %id, path = %path.display(), "1-wire temperature probe found");
        Ok(Self { id, path })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl DeviceOperation for Ds18b20 {
    fn family(&self) -> &str {
        CLASS_NAME
    }

    fn channel_count(&self) -> usize {
        1
    }

    fn read(&mut self, _channel: ChannelId) -> Result<RawValue> {
        let text = fs::read_to_string(&self.path)?;
        let millis = parse_w1_slave(&text)
            .ok_or_else(|| Error::not_ready(format!("{}: no valid conversion", self.id)))?;
        RawValue::try_from(millis / 100)
            .map_err(|_| Error::invalid_data(format!("{}: t={millis}", self.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    const GOOD: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n\
                        72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    fn bus(probes: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("w1_bus_master1")).unwrap();
        for (id, content) in probes {
            let probe = dir.path().join(id);
            fs::create_dir(&probe).unwrap();
            fs::write(probe.join(SLAVE_FILE), content).unwrap();
        }
        dir
    }

    fn config(dir: &TempDir, id: Option<&str>) -> Ds18b20Config {
        Ds18b20Config {
            id: id.map(str::to_string),
            devices_dir: dir.path().to_path_buf(),
            ..Ds18b20Config::default()
        }
    }

    #[rstest]
    #[case(GOOD, Some(23125))]
    #[case("ff ff : crc=ff YES\nff ff t=-500\n", Some(-500))]
    #[case("72 01 : crc=57 NO\n72 01 t=23125\n", None)]
    #[case("72 01 t=23125\n", None)]
    #[case("72 01 : crc=57 YES\n", None)]
    #[case("", None)]
    fn test_parse_w1_slave(#[case] text: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_w1_slave(text), expected);
    }

    #[test]
    fn test_discover_first_probe() {
        let dir = bus(&[("28-000005e2fdc3", GOOD), ("10-000801b5a7e4", GOOD)]);
        assert_eq!(discover(dir.path(), None).unwrap(), "10-000801b5a7e4");
    }

    #[test]
    fn test_discover_by_id() {
        let dir = bus(&[("28-000005e2fdc3", GOOD), ("10-000801b5a7e4", GOOD)]);
        let found = discover(dir.path(), Some("28-000005e2fdc3")).unwrap();
        assert_eq!(found, "28-000005e2fdc3");
    }

    #[test]
    fn test_discover_unknown_id() {
        let dir = bus(&[("28-000005e2fdc3", GOOD)]);
        let err = discover(dir.path(), Some("28-ffffffffffff")).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
        assert!(err.is_construction_fatal());
    }

    #[test]
    fn test_discover_skips_bus_master() {
        let dir = bus(&[]);
        let err = discover(dir.path(), None).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }

    #[test]
    fn test_missing_bus_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("devices"), None).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }

    #[test]
    fn test_read_reports_tenths() {
        let dir = bus(&[("28-000005e2fdc3", GOOD)]);
        let mut probe = Ds18b20::open(&config(&dir, None)).unwrap();
        assert_eq!(probe.read(ChannelId::default()).unwrap(), 231);
    }

    #[test]
    fn test_read_crc_failure_is_not_ready() {
        let dir = bus(&[("28-000005e2fdc3", "72 01 : crc=57 NO\n72 01 t=23125\n")]);
        let mut probe = Ds18b20::open(&config(&dir, None)).unwrap();
        let err = probe.read(ChannelId::default()).unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_read_vanished_probe_is_io_error() {
        let dir = bus(&[("28-000005e2fdc3", GOOD)]);
        let mut probe = Ds18b20::open(&config(&dir, None)).unwrap();
        fs::remove_file(dir.path().join("28-000005e2fdc3").join(SLAVE_FILE)).unwrap();
        assert!(matches!(probe.read(ChannelId::default()), Err(Error::Io(_))));
    }

    #[test]
    fn test_from_properties() {
        let props: Properties = [("id", " 28-000005e2fdc3 "), ("period", "5000")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Ds18b20Config::from_properties(&props);
        assert_eq!(config.id.as_deref(), Some("28-000005e2fdc3"));
        assert_eq!(config.period, 5000);
        assert_eq!(config.devices_dir, Path::new(W1_DEVICES_DIR));

        let driver = config.driver_config("outside");
        assert_eq!(driver.channels.len(), 1);
        assert_eq!(driver.channels[0].name, "out");
        assert_eq!(driver.period, Some(std::time::Duration::from_secs(5)));
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: Ds18b20Config = serde_json::from_str(r#"{"period": 1000}"#).unwrap();
        assert_eq!(config.id, None);
        assert_eq!(config.devices_dir, Path::new(W1_DEVICES_DIR));
    }
}
