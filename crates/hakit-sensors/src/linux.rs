//! Linux bus devices through `linux-embedded-hal`.

use crate::mcp3008::SPI_SPEED_HZ;
use hakit_core::{Error, Result};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{I2cdev, SpidevDevice};
use tracing::debug;

/// Open `/dev/i2c-<bus>`.
///
/// # Errors
///
/// Returns `Error::DeviceNotFound` if the device node cannot be opened.
pub fn open_i2c(bus: u32) -> Result<I2cdev> {
    let path = format!("/dev/i2c-{bus}");
    debug!(path = %path, "opening I2C bus");
    I2cdev::new(&path).map_err(|e| Error::device_not_found(format!("{path}: {e}")))
}

/// Open `/dev/spidev<id>` (`id` is `B.C`) in mode 0, 8 bits per word.
///
/// # Errors
///
/// Returns `Error::DeviceNotFound` if the device node cannot be opened and
/// `Error::InitializationFailed` if it rejects the configuration.
pub fn open_spi(id: &str) -> Result<SpidevDevice> {
    let path = format!("/dev/spidev{id}");
    debug!(path = %path, speed_hz = SPI_SPEED_HZ, "opening SPI device");

    let mut spi = SpidevDevice::open(&path)
        .map_err(|e| Error::device_not_found(format!("{path}: {e:?}")))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(SPI_SPEED_HZ)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.0
        .configure(&options)
        .map_err(|e| Error::initialization_failed(format!("{path}: {e}")))?;
    Ok(spi)
}
