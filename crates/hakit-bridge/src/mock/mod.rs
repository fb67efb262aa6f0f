//! Mock collaborators for testing and bring-up without hardware.

pub mod device;
pub mod publisher;

pub use device::{MockSensor, MockSensorHandle};
pub use publisher::RecordingPublisher;
