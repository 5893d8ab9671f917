use crate::error::DriverError;
use crate::recorder::Recorder;
use crate::types::Sample;
use glam::DQuat;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Resample step used when a recording is started without one (ms).
pub const DEFAULT_STEP: i64 = 16;

/// Parameters of a new recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingOptions {
    /// Resample step in milliseconds; [`DEFAULT_STEP`] when `None`.
    pub step: Option<i64>,
    pub interpolate: bool,
}

#[derive(Default)]
struct SensorSlot {
    active: Option<Recorder>,
    last_completed: Option<Vec<Sample>>,
}

/// Active and completed recordings, keyed by sensor id.
///
/// The set of sensor ids is fixed at construction and each id owns its own
/// lock, so recordings on different sensors never contend while start, stop,
/// and feed on the same sensor are serialized.
pub struct RecordingRegistry {
    slots: HashMap<String, Mutex<SensorSlot>>,
    median_window: usize,
}

impl RecordingRegistry {
    pub fn new<I, S>(sensor_ids: I, median_window: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = sensor_ids
            .into_iter()
            .map(|id| (id.into(), Mutex::new(SensorSlot::default())))
            .collect();
        Self {
            slots,
            median_window,
        }
    }

    fn slot(&self, sensor_id: &str) -> Result<&Mutex<SensorSlot>, DriverError> {
        self.slots
            .get(sensor_id)
            .ok_or_else(|| DriverError::invalid_argument("invalid or unknown sensor id"))
    }

    /// Begin recording `sensor_id` and return the new recording's id.
    pub fn start(&self, sensor_id: &str, options: RecordingOptions) -> Result<String, DriverError> {
        let mut slot = self.slot(sensor_id)?.lock();
        if slot.active.is_some() {
            return Err(DriverError::invalid_argument(
                "already recording this sensor id",
            ));
        }
        let step = options.step.unwrap_or(DEFAULT_STEP);
        if step <= 0 {
            return Err(DriverError::invalid_argument("non-positive step time"));
        }

        let recording_id = Uuid::new_v4().to_string();
        let recorder = Recorder::new(
            recording_id.clone(),
            step,
            options.interpolate,
            self.median_window,
        )?;
        slot.active = Some(recorder);
        info!(
            sensor_id,
            %recording_id,
            step,
            interpolate = options.interpolate,
            "Recording started"
        );
        Ok(recording_id)
    }

    /// End the recording `recording_id` on `sensor_id` and return its curve.
    ///
    /// A mismatched id leaves the active recording untouched.
    pub fn stop(&self, sensor_id: &str, recording_id: &str) -> Result<Vec<Sample>, DriverError> {
        let mut slot = self.slot(sensor_id)?.lock();
        match &slot.active {
            None => {
                return Err(DriverError::invalid_argument(
                    "not currently recording this sensor id",
                ))
            }
            Some(recorder) if recorder.id() != recording_id => {
                return Err(DriverError::invalid_argument(
                    "invalid or unknown record id",
                ))
            }
            Some(_) => {}
        }

        let data = slot
            .active
            .take()
            .map(Recorder::finish)
            .unwrap_or_default();
        slot.last_completed = Some(data.clone());
        info!(sensor_id, recording_id, samples = data.len(), "Recording stopped");
        Ok(data)
    }

    /// Forward a calibrated reading to the sensor's active recorder, if any.
    ///
    /// Returns whether a recorder consumed it.
    pub fn feed(&self, sensor_id: &str, timestamp: i64, q: DQuat) -> bool {
        let Some(slot) = self.slots.get(sensor_id) else {
            return false;
        };
        let mut slot = slot.lock();
        match slot.active.as_mut() {
            Some(recorder) => {
                recorder.add(timestamp, q);
                debug!(sensor_id, timestamp, points = recorder.len(), "Recorded sample");
                true
            }
            None => false,
        }
    }

    pub fn is_recording(&self, sensor_id: &str) -> bool {
        self.slots
            .get(sensor_id)
            .is_some_and(|slot| slot.lock().active.is_some())
    }

    /// Snapshot of the active recording's curve.
    pub fn current_data(&self, sensor_id: &str) -> Option<Vec<Sample>> {
        self.slots
            .get(sensor_id)
            .and_then(|slot| slot.lock().active.as_ref().map(Recorder::data))
    }

    /// The most recently completed curve for `sensor_id`.
    pub fn last_recording(&self, sensor_id: &str) -> Result<Option<Vec<Sample>>, DriverError> {
        Ok(self.slot(sensor_id)?.lock().last_completed.clone())
    }
}
