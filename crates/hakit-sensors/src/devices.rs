//! Driver factory keyed by class name.
//!
//! The host engine knows an instance by its class (`"mcp3008"`) and its
//! text properties. [`build`] turns those into a boxed device and the
//! matching [`DriverConfig`], ready for [`Driver::spawn`].
//!
//! Bus-attached classes need the `linux-hal` feature to open their device
//! node. Without it their properties are still parsed, so configuration
//! mistakes surface first, and then construction fails.
//!
//! [`Driver::spawn`]: hakit_bridge::Driver::spawn

use crate::ds18b20::{self, Ds18b20, Ds18b20Config};
use crate::ina219::{self, Ina219Config};
use crate::ina3221::{self, Ina3221Config};
use crate::mcp3008::{self, Mcp3008Config};
use crate::props::Properties;
use crate::tcs34725::{self, Tcs34725Config};
use hakit_bridge::{DeviceOperation, DriverConfig};
use hakit_core::{Error, Result};
use tracing::info;

/// Every class [`build`] knows.
pub const CLASSES: [&str; 5] = [
    ds18b20::CLASS_NAME,
    mcp3008::CLASS_NAME,
    ina219::CLASS_NAME,
    ina3221::CLASS_NAME,
    tcs34725::CLASS_NAME,
];

/// A constructed device and the driver configuration that goes with it.
pub struct Blueprint {
    pub device: Box<dyn DeviceOperation>,
    pub config: DriverConfig,
}

impl Blueprint {
    pub fn new(device: impl DeviceOperation, config: DriverConfig) -> Self {
        Self {
            device: Box::new(device),
            config,
        }
    }

    /// Rename the driver instance.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }
}

impl std::fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint")
            .field("family", &self.device.family())
            .field("config", &self.config)
            .finish()
    }
}

/// Parsed properties of any known class.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassConfig {
    Ds18b20(Ds18b20Config),
    Mcp3008(Mcp3008Config),
    Ina219(Ina219Config),
    Ina3221(Ina3221Config),
    Tcs34725(Tcs34725Config),
}

impl ClassConfig {
    /// Parse `properties` for `class`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown class or invalid
    /// properties.
    pub fn parse(class: &str, properties: &Properties) -> Result<Self> {
        Ok(match class {
            ds18b20::CLASS_NAME => Self::Ds18b20(Ds18b20Config::from_properties(properties)),
            mcp3008::CLASS_NAME => Self::Mcp3008(Mcp3008Config::from_properties(properties)?),
            ina219::CLASS_NAME => Self::Ina219(Ina219Config::from_properties(properties)),
            ina3221::CLASS_NAME => Self::Ina3221(Ina3221Config::from_properties(properties)?),
            tcs34725::CLASS_NAME => Self::Tcs34725(Tcs34725Config::from_properties(properties)),
            _ => {
                return Err(Error::configuration(format!(
                    "unknown class '{class}' (known: {})",
                    CLASSES.join(", ")
                )));
            }
        })
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Ds18b20(_) => ds18b20::CLASS_NAME,
            Self::Mcp3008(_) => mcp3008::CLASS_NAME,
            Self::Ina219(_) => ina219::CLASS_NAME,
            Self::Ina3221(_) => ina3221::CLASS_NAME,
            Self::Tcs34725(_) => tcs34725::CLASS_NAME,
        }
    }

    /// Driver configuration named `name`.
    pub fn driver_config(&self, name: &str) -> Result<DriverConfig> {
        match self {
            Self::Ds18b20(config) => Ok(config.driver_config(name)),
            Self::Mcp3008(config) => config.driver_config(name),
            Self::Ina219(config) => config.driver_config(name),
            Self::Ina3221(config) => config.driver_config(name),
            Self::Tcs34725(config) => config.driver_config(name),
        }
    }
}

/// Build the device and driver configuration for `class`.
///
/// The driver is named after the class; use [`Blueprint::named`] to give it
/// the instance name.
///
/// # Errors
///
/// Returns a construction error: unknown class, invalid properties, device
/// absent or failing its setup.
pub fn build(class: &str, properties: &Properties) -> Result<Blueprint> {
    let parsed = ClassConfig::parse(class, properties)?;
    let config = parsed.driver_config(class)?;

    let blueprint = match &parsed {
        ClassConfig::Ds18b20(ds) => Blueprint::new(Ds18b20::open(ds)?, config),
        _ => open_bus_device(&parsed, config)?,
    };

    info!(
        class,
        channels = blueprint.config.channels.len(),
        period = ?blueprint.config.period,
        "device ready"
    );
    Ok(blueprint)
}

#[cfg(feature = "linux-hal")]
fn open_bus_device(parsed: &ClassConfig, config: DriverConfig) -> Result<Blueprint> {
    use crate::ina219::Ina219;
    use crate::ina3221::Ina3221;
    use crate::linux::{open_i2c, open_spi};
    use crate::mcp3008::Mcp3008;
    use crate::tcs34725::Tcs34725;
    use hakit_bridge::Averaging;

    Ok(match parsed {
        ClassConfig::Mcp3008(adc) => {
            let device = Mcp3008::new(open_spi(&adc.id)?, &adc.channels);
            Blueprint::new(Averaging::new(device, adc.mean)?, config)
        }
        ClassConfig::Ina219(ina) => Blueprint::new(Ina219::new(open_i2c(ina.bus)?, ina)?, config),
        ClassConfig::Ina3221(ina) => Blueprint::new(Ina3221::new(open_i2c(ina.bus)?, ina)?, config),
        ClassConfig::Tcs34725(tcs) => {
            Blueprint::new(Tcs34725::new(open_i2c(tcs.num)?, tcs)?, config)
        }
        ClassConfig::Ds18b20(ds) => Blueprint::new(Ds18b20::open(ds)?, config),
    })
}

#[cfg(not(feature = "linux-hal"))]
fn open_bus_device(parsed: &ClassConfig, _config: DriverConfig) -> Result<Blueprint> {
    Err(Error::configuration(format!(
        "{}: bus devices need the linux-hal feature",
        parsed.class()
    )))
}
