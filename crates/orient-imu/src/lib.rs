//! Orientation conditioning and recording.
//!
//! Raw quaternion readings enter through [`Driver::sensor_changed`], are rate
//! limited, re-centered on the tare reference, and, when they move far enough,
//! published to subscribers through a [`Gateway`]. While a recording is active
//! for a sensor, its calibrated readings are median-filtered and resampled at a
//! fixed step into a curve returned when the recording stops.

pub mod clock;
pub mod driver;
pub mod error;
pub mod median;
pub mod pipeline;
pub mod quat;
pub mod recorder;
pub mod registry;
pub mod service;
pub mod types;
pub mod wire;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{Driver, DriverSettings, Gateway, Listener, ListenerAddr, Notification};
pub use error::{DriverError, FilterError, NotifyError, WireError};
pub use median::MedianFilter;
pub use recorder::Recorder;
pub use registry::{RecordingOptions, RecordingRegistry, DEFAULT_STEP};
pub use service::{Call, CallContext, Caller, Response};
pub use types::{Sample, SensorData};

pub use glam::{DQuat, DVec3};
