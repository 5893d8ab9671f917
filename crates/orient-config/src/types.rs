use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_SENSOR_ID: &str = "0";
pub const DEFAULT_SENSITIVITY: f64 = 0.0;
pub const DEFAULT_MIN_UPDATE_INTERVAL_MS: i64 = 10;
pub const DEFAULT_MEDIAN_WINDOW: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Identifier of this driver instance, reported in notifications.
    pub instance_id: Option<String>,
    /// Sensor driver configuration.
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Sensor id used when a reading does not name one.
    pub default_sensor_id: String,
    /// Additional accepted sensor ids, comma-separated.
    pub valid_ids: String,
    /// Minimum per-component change of the raw reading that triggers a
    /// notification. 0.0 notifies on every accepted reading.
    pub sensitivity: f64,
    /// Readings closer together than this many milliseconds are dropped.
    pub min_update_interval_ms: i64,
    /// Median filter window applied to recorded readings (at least 3).
    pub median_window: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            default_sensor_id: DEFAULT_SENSOR_ID.to_string(),
            valid_ids: String::new(),
            sensitivity: DEFAULT_SENSITIVITY,
            min_update_interval_ms: DEFAULT_MIN_UPDATE_INTERVAL_MS,
            median_window: DEFAULT_MEDIAN_WINDOW,
        }
    }
}

impl DriverConfig {
    /// Replace out-of-range values with their defaults, logging each one.
    pub fn sanitized(&self) -> Self {
        let mut config = self.clone();

        config.default_sensor_id = config.default_sensor_id.trim().to_string();
        if config.default_sensor_id.is_empty() {
            config.default_sensor_id = DEFAULT_SENSOR_ID.to_string();
        }

        if config.sensitivity.is_nan() || config.sensitivity < 0.0 {
            warn!(
                sensitivity = config.sensitivity,
                "Invalid sensitivity provided, using default"
            );
            config.sensitivity = DEFAULT_SENSITIVITY;
        }

        if config.min_update_interval_ms < 0 {
            warn!(
                min_update_interval_ms = config.min_update_interval_ms,
                "Invalid min update interval provided, using default"
            );
            config.min_update_interval_ms = DEFAULT_MIN_UPDATE_INTERVAL_MS;
        }

        if config.median_window < DEFAULT_MEDIAN_WINDOW {
            warn!(
                median_window = config.median_window,
                "Median window too small, using default"
            );
            config.median_window = DEFAULT_MEDIAN_WINDOW;
        }

        config
    }

    /// Every accepted sensor id: the default first, then the additional ids in
    /// configured order with blanks and duplicates skipped.
    pub fn sensor_ids(&self) -> Vec<String> {
        let default = match self.default_sensor_id.trim() {
            "" => DEFAULT_SENSOR_ID,
            id => id,
        };
        let mut ids = vec![default.to_string()];
        for id in self.valid_ids.split(',').map(str::trim) {
            if !id.is_empty() && !ids.iter().any(|known| known == id) {
                ids.push(id.to_string());
            }
        }
        ids
    }
}
