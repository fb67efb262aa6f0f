//! Sensor adapters for the HAKit poll bridge.
//!
//! Each module implements [`DeviceOperation`](hakit_bridge::DeviceOperation)
//! for one sensor family and parses that family's instance properties:
//!
//! | Class | Bus | Outputs |
//! |-------|-----|---------|
//! | [`ds18b20`] | 1-wire (sysfs) | `out` (°C, one decimal) |
//! | [`mcp3008`] | SPI | `out0`..`out7` |
//! | [`ina219`] | I2C | `current` (mA), `voltage` (mV) |
//! | [`ina3221`] | I2C | `current1..3` (mA), `voltage1..3` (mV) |
//! | [`tcs34725`] | I2C | `c`, `r`, `g`, `b` |
//!
//! I2C and SPI adapters are generic over the `embedded-hal` 1.0 bus traits.
//! The `linux-hal` feature adds [`linux`], which opens the Linux device
//! nodes, and lets [`devices::build`] construct those classes.
//!
//! # Examples
//!
//! ```no_run
//! use hakit_bridge::Driver;
//! use hakit_bridge::mock::RecordingPublisher;
//! use hakit_sensors::{Properties, build};
//!
//! # fn main() -> hakit_sensors::Result<()> {
//! let mut properties = Properties::new();
//! properties.insert("period".into(), "10000".into());
//!
//! let blueprint = build("ds18b20", &properties)?.named("outside");
//! let driver = Driver::spawn(blueprint.config, blueprint.device, RecordingPublisher::new())?;
//! # drop(driver);
//! # Ok(())
//! # }
//! ```

mod bus;
pub mod devices;
pub mod ds18b20;
pub mod ina219;
pub mod ina3221;
#[cfg(feature = "linux-hal")]
pub mod linux;
pub mod mcp3008;
pub mod props;
pub mod tcs34725;

pub use devices::{Blueprint, CLASSES, ClassConfig, build};
pub use ds18b20::{Ds18b20, Ds18b20Config};
pub use ina219::{Ina219, Ina219Config, Ina219Range};
pub use ina3221::{Ina3221, Ina3221Config};
pub use mcp3008::{Mcp3008, Mcp3008Config};
pub use props::Properties;
pub use tcs34725::{Tcs34725, Tcs34725Config};

pub use hakit_core::{Error, Result};
