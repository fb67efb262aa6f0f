//! End-to-end tests: sensor adapters running behind a real poll worker.

use embedded_hal::spi::{self, ErrorType, Operation, SpiDevice};
use hakit_bridge::mock::RecordingPublisher;
use hakit_bridge::{Averaging, ChannelId, Driver};
use hakit_sensors::ds18b20::W1_DEVICES_DIR;
use hakit_sensors::{Ds18b20, Ds18b20Config, Mcp3008, Mcp3008Config, Properties};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const PROBE: &str = "28-000005e2fdc3";

fn props(pairs: &[(&str, &str)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn settle(driver: &mut Driver<RecordingPublisher>, count: u64) {
    timeout(WAIT, async {
        while driver.stats().responses < count {
            driver.tick().await.unwrap();
        }
    })
    .await
    .expect("responses did not arrive in time");
}

// ============================================================================
// DS18B20 over a fake sysfs tree
// ============================================================================

fn w1_slave(dir: &Path, content: &str) {
    fs::write(dir.join(PROBE).join("w1_slave"), content).unwrap();
}

fn w1_bus() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join(PROBE)).unwrap();
    dir
}

#[tokio::test]
async fn test_temperature_published_once_crc_passes() {
    let dir = w1_bus();
    w1_slave(dir.path(), "50 05 4b 46 7f ff 0c 10 1c : crc=1c NO\n50 05 t=21500\n");

    let config = Ds18b20Config {
        devices_dir: dir.path().to_path_buf(),
        ..Ds18b20Config::from_properties(&props(&[]))
    };
    assert_ne!(config.devices_dir, Path::new(W1_DEVICES_DIR));

    let probe = Ds18b20::open(&config).unwrap();
    let mut driver = Driver::spawn(
        config.driver_config("outside"),
        probe,
        RecordingPublisher::new(),
    )
    .unwrap();

    driver.start().unwrap();
    settle(&mut driver, 1).await;
    assert!(driver.publisher().events().is_empty());
    assert_eq!(driver.stats().invalid, 1);

    w1_slave(dir.path(), "50 05 4b 46 7f ff 0c 10 1c : crc=1c YES\n50 05 t=21500\n");
    driver.input("trig", "1").unwrap();
    settle(&mut driver, 2).await;
    assert_eq!(driver.publisher().values_for("out"), vec!["21.5"]);

    w1_slave(dir.path(), "ff ff 4b 46 7f ff 0c 10 1c : crc=1c YES\nff ff t=-1250\n");
    driver.trigger_all(false).unwrap();
    settle(&mut driver, 3).await;
    assert_eq!(driver.publisher().values_for("out"), vec!["21.5", "-1.2"]);

    driver.shutdown().await.unwrap();
}

// ============================================================================
// MCP3008 over a scripted SPI device
// ============================================================================

/// Answers every conversion with the next code from a per-channel script.
#[derive(Clone, Default)]
struct ScriptedAdc {
    codes: Arc<Mutex<[VecDeque<u16>; 8]>>,
}

impl ScriptedAdc {
    fn push(&self, channel: usize, codes: &[u16]) {
        assert!(
            codes.iter().all(|&code| code <= 0x3FF),
            "MCP3008 codes are 10 bits"
        );
        self.codes.lock().unwrap()[channel].extend(codes);
    }
}

#[derive(Debug)]
struct NoMoreCodes;

impl spi::Error for NoMoreCodes {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

impl ErrorType for ScriptedAdc {
    type Error = NoMoreCodes;
}

impl SpiDevice for ScriptedAdc {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), NoMoreCodes> {
        for op in operations {
            if let Operation::TransferInPlace(frame) = op {
                let channel = usize::from((frame[1] >> 4) & 0x07);
                let code = self.codes.lock().unwrap()[channel]
                    .pop_front()
                    .ok_or(NoMoreCodes)?;
                frame[1] = (code >> 8) as u8 & 0x03;
                frame[2] = code as u8;
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_adc_averaged_and_scaled() {
    let config = Mcp3008Config::from_properties(&props(&[
        ("channels", "0,*1"),
        ("scale", ",1"),
        ("mean", "4"),
    ]))
    .unwrap();

    let spi = ScriptedAdc::default();
    spi.push(0, &[1000, 1005, 1010, 1015]);
    spi.push(1, &[7, 9, 8, 8]);

    let device = Averaging::new(Mcp3008::new(spi, &config.channels), config.mean).unwrap();
    let mut driver = Driver::spawn(
        config.driver_config("adc").unwrap(),
        device,
        RecordingPublisher::new(),
    )
    .unwrap();

    driver.start().unwrap();
    settle(&mut driver, 2).await;

    // mean 1007 * 3300 / 1024 = 3245.2...
    assert_eq!(driver.publisher().values_for("out0"), vec!["3245"]);
    assert_eq!(driver.publisher().values_for("out1"), vec!["8"]);

    // Script exhausted: the read fails and the last value stays published
    driver.input("trig0", "1").unwrap();
    settle(&mut driver, 3).await;
    assert_eq!(driver.publisher().values_for("out0"), vec!["3245"]);
    let state = driver.channel_state(ChannelId::new(0).unwrap()).unwrap();
    assert_eq!(state.last_published, Some(3245));

    driver.shutdown().await.unwrap();
}
