//! Oversampling wrapper.

use crate::traits::DeviceOperation;
use hakit_core::constants::MAX_AVERAGING;
use hakit_core::{ChannelId, Error, RawValue, Result};

/// Averages several consecutive reads of the wrapped device.
///
/// Sampling stops at the first failed read; the mean of the samples taken
/// so far is returned. The read fails only when the very first sample
/// fails. The mean is an integer division, rounding toward zero.
///
/// # Examples
///
/// ```
/// use hakit_bridge::mock::MockSensor;
/// use hakit_bridge::{Averaging, ChannelId, DeviceOperation};
///
/// let (sensor, handle) = MockSensor::new(1);
/// let ch0 = ChannelId::new(0).unwrap();
/// for value in [10, 11, 13] {
///     handle.push_value(ch0, value);
/// }
///
/// let mut averaged = Averaging::new(sensor, 3).unwrap();
/// assert_eq!(averaged.read(ch0).unwrap(), 11);
/// ```
#[derive(Debug)]
pub struct Averaging<D> {
    inner: D,
    count: u32,
}

impl<D: DeviceOperation> Averaging<D> {
    /// Wrap `inner`, taking `count` samples per read. A count of 0 is 1.
    ///
    /// # Errors
    ///
    /// Returns a configuration error above [`MAX_AVERAGING`] samples.
    pub fn new(inner: D, count: u32) -> Result<Self> {
        if count > MAX_AVERAGING {
            return Err(Error::configuration(format!(
                "averaging count {count} exceeds {MAX_AVERAGING}"
            )));
        }
        Ok(Self {
            inner,
            count: count.max(1),
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: DeviceOperation> DeviceOperation for Averaging<D> {
    fn family(&self) -> &str {
        self.inner.family()
    }

    fn channel_count(&self) -> usize {
        self.inner.channel_count()
    }

    fn read(&mut self, channel: ChannelId) -> Result<RawValue> {
        let mut sum = i64::from(self.inner.read(channel)?);
        let mut taken = 1i64;

        for _ in 1..self.count {
            match self.inner.read(channel) {
                Ok(value) => {
                    sum += i64::from(value);
                    taken += 1;
                }
                Err(_) => break,
            }
        }

        // The mean of i32 samples always fits back into an i32.
        Ok(RawValue::try_from(sum / taken).unwrap_or(RawValue::MAX))
    }

    fn settings(&self) -> &'static [&'static str] {
        self.inner.settings()
    }

    fn write(&mut self, setting: &str, value: i32) -> Result<()> {
        self.inner.write(setting, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSensor;

    fn ch0() -> ChannelId {
        ChannelId::new(0).unwrap()
    }

    #[test]
    fn test_zero_count_is_single_sample() {
        let (sensor, handle) = MockSensor::new(1);
        handle.set_value(ch0(), 5);
        let mut averaged = Averaging::new(sensor, 0).unwrap();
        assert_eq!(averaged.count(), 1);
        assert_eq!(averaged.read(ch0()).unwrap(), 5);
        assert_eq!(handle.read_count(), 1);
    }

    #[test]
    fn test_count_limit() {
        let (sensor, _handle) = MockSensor::new(1);
        assert!(matches!(
            Averaging::new(sensor, MAX_AVERAGING + 1),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_stops_at_first_failure() {
        let (sensor, handle) = MockSensor::new(1);
        handle.push_value(ch0(), 100);
        handle.push_value(ch0(), 201);
        handle.push_failure(ch0());
        handle.push_value(ch0(), 1000);

        let mut averaged = Averaging::new(sensor, 4).unwrap();
        assert_eq!(averaged.read(ch0()).unwrap(), 150);
        assert_eq!(handle.read_count(), 3);
    }

    #[test]
    fn test_first_failure_fails_read() {
        let (sensor, handle) = MockSensor::new(1);
        handle.push_failure(ch0());
        handle.push_value(ch0(), 1);

        let mut averaged = Averaging::new(sensor, 4).unwrap();
        assert!(averaged.read(ch0()).is_err());
        assert_eq!(handle.read_count(), 1);
    }

    #[test]
    fn test_negative_mean_rounds_toward_zero() {
        let (sensor, handle) = MockSensor::new(1);
        handle.push_value(ch0(), -1);
        handle.push_value(ch0(), -2);

        let mut averaged = Averaging::new(sensor, 2).unwrap();
        assert_eq!(averaged.read(ch0()).unwrap(), -1);
    }
}
