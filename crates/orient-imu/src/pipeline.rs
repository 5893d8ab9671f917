use crate::quat;
use glam::DQuat;
use parking_lot::Mutex;
use tracing::{debug, info};

/// Outcome of a reading that passed the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Update {
    /// The reading re-centered on the tare reference and normalized.
    pub calibrated: DQuat,
    /// Whether the raw reading moved far enough from the last notified one.
    pub significant: bool,
}

struct PipelineState {
    /// Time of the last accepted reading.
    last_update: Option<i64>,
    /// Last raw reading accepted past the rate limiter.
    last_raw: Option<DQuat>,
    /// Raw reading of the last notification.
    last_notified: DQuat,
    /// Tare reference; only its vector part is used.
    reference: DQuat,
}

/// Per-reading conditioning: rate limiting, calibration, significance gating.
///
/// The state is session-wide and guarded by one lock; each reading takes it
/// exactly once.
pub struct ChangePipeline {
    sensitivity: f64,
    min_update_interval: i64,
    state: Mutex<PipelineState>,
}

impl ChangePipeline {
    pub fn new(sensitivity: f64, min_update_interval: u64) -> Self {
        Self {
            sensitivity,
            min_update_interval: i64::try_from(min_update_interval).unwrap_or(i64::MAX),
            state: Mutex::new(PipelineState {
                last_update: None,
                last_raw: None,
                last_notified: DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0),
                reference: DQuat::IDENTITY,
            }),
        }
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    pub fn min_update_interval(&self) -> i64 {
        self.min_update_interval
    }

    /// Condition one raw reading taken at `now`.
    ///
    /// Returns `None`, leaving every piece of state untouched, when the
    /// reading arrives within the minimum update interval of the previous
    /// accepted one.
    pub fn update(&self, raw: DQuat, now: i64) -> Option<Update> {
        let mut state = self.state.lock();
        if let Some(last) = state.last_update {
            if now.saturating_sub(last) < self.min_update_interval {
                return None;
            }
        }
        state.last_update = Some(now);
        state.last_raw = Some(raw);

        let calibrated = quat::calibrate(raw, state.reference);

        // Gate on the raw readings, not the calibrated ones.
        let significant = quat::max_offset(raw, state.last_notified) >= self.sensitivity;
        if significant {
            state.last_notified = raw;
        }
        debug!(now, significant, "Reading accepted");

        Some(Update {
            calibrated,
            significant,
        })
    }

    /// Re-center future readings on the last raw reading seen.
    pub fn tare(&self) {
        let mut state = self.state.lock();
        if let Some(raw) = state.last_raw {
            state.reference = raw;
            info!(x = raw.x, y = raw.y, z = raw.z, "Tare reference set");
        }
    }

    pub fn reference(&self) -> DQuat {
        self.state.lock().reference
    }

    pub fn last_update(&self) -> Option<i64> {
        self.state.lock().last_update
    }
}
