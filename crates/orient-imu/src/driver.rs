use crate::clock::{Clock, SystemClock};
use crate::error::{DriverError, NotifyError};
use crate::median::{DEFAULT_MEDIAN_WINDOW, MIN_WINDOW};
use crate::pipeline::ChangePipeline;
use crate::registry::{RecordingOptions, RecordingRegistry};
use crate::types::{Sample, SensorData};
use glam::DQuat;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Name under which the driver publishes its events.
pub const DRIVER_NAME: &str = "orient.ImuDriver";
/// Event key of the orientation change notification.
pub const CHANGE_EVENT: &str = "change";
/// Notification parameter carrying the [`SensorData`].
pub const NEW_DATA_PARAM: &str = "newData";

/// Resolved driver settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    pub default_sensor_id: String,
    /// Every accepted sensor id; must contain the default id.
    pub valid_ids: Vec<String>,
    /// Minimum per-component change of the raw reading that triggers a notification.
    pub sensitivity: f64,
    /// Readings closer together than this (ms) are dropped.
    pub min_update_interval: u64,
    /// Median filter window used by recorders.
    pub median_window: usize,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            default_sensor_id: "0".to_string(),
            valid_ids: vec!["0".to_string()],
            sensitivity: 0.0,
            min_update_interval: 10,
            median_window: DEFAULT_MEDIAN_WINDOW,
        }
    }
}

impl DriverSettings {
    /// Replace a negative or NaN sensitivity with 0.0, logging the substitution.
    fn sanitized(mut self) -> Self {
        if self.sensitivity.is_nan() || self.sensitivity < 0.0 {
            warn!(
                sensitivity = self.sensitivity,
                "Invalid sensitivity provided, using default"
            );
            self.sensitivity = 0.0;
        }
        self
    }

    fn validate(&self) -> Result<(), DriverError> {
        if self.default_sensor_id.trim().is_empty() {
            return Err(DriverError::InvalidConfiguration(
                "default sensor id is empty".into(),
            ));
        }
        if !self.valid_ids.contains(&self.default_sensor_id) {
            return Err(DriverError::InvalidConfiguration(
                "default sensor id is not a valid id".into(),
            ));
        }
        if self.median_window < MIN_WINDOW {
            return Err(DriverError::InvalidConfiguration(format!(
                "median window must be at least {MIN_WINDOW}, got {}",
                self.median_window
            )));
        }
        Ok(())
    }
}

/// Network identity of a remote listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerAddr {
    pub network_type: String,
    pub host: String,
}

impl ListenerAddr {
    /// Build an address from a caller's `host:port` device name; the port is dropped.
    pub fn from_caller(network_type: &str, device_name: &str) -> Self {
        let host = device_name
            .rsplit_once(':')
            .map_or(device_name, |(host, _port)| host);
        Self {
            network_type: network_type.to_string(),
            host: host.to_string(),
        }
    }
}

impl fmt::Display for ListenerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network_type, self.host)
    }
}

/// A registered subscriber of change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub addr: ListenerAddr,
    pub device_name: String,
}

/// An outbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub driver: String,
    pub event_key: String,
    pub instance_id: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Delivery side of the host middleware.
pub trait Gateway: Send + Sync {
    /// Deliver `notification` to `target`, or to the local host when `None`.
    fn notify(&self, notification: &Notification, target: Option<&Listener>)
        -> Result<(), NotifyError>;
}

/// One orientation-sensor session.
///
/// Owns the conditioning pipeline, the recording registry, and the listener
/// set. All operations are synchronous and safe to call from several threads.
pub struct Driver {
    instance_id: String,
    settings: DriverSettings,
    pipeline: ChangePipeline,
    registry: RecordingRegistry,
    listeners: Mutex<HashMap<ListenerAddr, Listener>>,
    gateway: Arc<dyn Gateway>,
    clock: Arc<dyn Clock>,
}

impl Driver {
    pub fn new(
        settings: DriverSettings,
        gateway: Arc<dyn Gateway>,
        instance_id: impl Into<String>,
    ) -> Result<Self, DriverError> {
        Self::with_clock(settings, gateway, instance_id, Arc::new(SystemClock))
    }

    pub fn with_clock(
        settings: DriverSettings,
        gateway: Arc<dyn Gateway>,
        instance_id: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DriverError> {
        let settings = settings.sanitized();
        settings.validate()?;
        let instance_id = instance_id.into();
        info!(
            %instance_id,
            default_sensor_id = %settings.default_sensor_id,
            valid_ids = %settings.valid_ids.join(","),
            sensitivity = settings.sensitivity,
            min_update_interval = settings.min_update_interval,
            "Driver initialized"
        );
        Ok(Self {
            pipeline: ChangePipeline::new(settings.sensitivity, settings.min_update_interval),
            registry: RecordingRegistry::new(settings.valid_ids.iter().cloned(), settings.median_window),
            listeners: Mutex::new(HashMap::new()),
            instance_id,
            settings,
            gateway,
            clock,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn default_sensor_id(&self) -> &str {
        &self.settings.default_sensor_id
    }

    /// Every accepted sensor id, default first.
    pub fn list_ids(&self) -> Vec<String> {
        self.settings.valid_ids.clone()
    }

    pub fn sensitivity(&self) -> f64 {
        self.pipeline.sensitivity()
    }

    /// Re-center calibration on the last raw reading seen.
    pub fn tare(&self) {
        self.pipeline.tare();
    }

    fn valid_id<'a>(&'a self, sensor_id: &str) -> Result<&'a str, DriverError> {
        self.settings
            .valid_ids
            .iter()
            .find(|id| id.as_str() == sensor_id)
            .map(String::as_str)
            .ok_or_else(|| DriverError::invalid_argument("invalid or unknown sensor id"))
    }

    /// Push a new raw reading from the sensor feed.
    ///
    /// `sensor_id` defaults to the configured default id and `timestamp`
    /// (used only in the notification) to the current time.
    pub fn sensor_changed(
        &self,
        raw: DQuat,
        sensor_id: Option<&str>,
        timestamp: Option<i64>,
    ) -> Result<(), DriverError> {
        let sensor_id = match sensor_id {
            None => self.settings.default_sensor_id.as_str(),
            Some(id) => self
                .valid_id(id)
                .map_err(|_| DriverError::invalid_argument("invalid sensor id"))?,
        };

        let now = self.clock.now_millis();
        let Some(update) = self.pipeline.update(raw, now) else {
            trace!(sensor_id, now, "Reading throttled");
            return Ok(());
        };

        self.registry.feed(sensor_id, now, update.calibrated);

        if update.significant {
            let data = SensorData::new(sensor_id, timestamp.unwrap_or(now), update.calibrated);
            self.notify_change(&data);
        }
        Ok(())
    }

    /// Deliver a change event to the local host and every registered listener.
    fn notify_change(&self, data: &SensorData) {
        let payload = match serde_json::to_value(data) {
            Ok(payload) => payload,
            Err(e) => {
                error!(?e, "Failed to encode sensor data");
                return;
            }
        };
        let mut parameters = Map::new();
        parameters.insert(NEW_DATA_PARAM.to_string(), payload);
        let notification = Notification {
            driver: DRIVER_NAME.to_string(),
            event_key: CHANGE_EVENT.to_string(),
            instance_id: self.instance_id.clone(),
            parameters,
        };

        if let Err(e) = self.gateway.notify(&notification, None) {
            error!(%e, "Failed to notify local host");
        }

        // Deliver outside the lock so a slow listener cannot block registration.
        let listeners: Vec<Listener> = self.listeners.lock().values().cloned().collect();
        for listener in &listeners {
            if let Err(e) = self.gateway.notify(&notification, Some(listener)) {
                error!(
                    listener = %listener.addr,
                    device = %listener.device_name,
                    %e,
                    "Failed to notify listener"
                );
            }
        }
        debug!(sensor_id = %data.id, listeners = listeners.len(), "Change notified");
    }

    pub fn start_recording(
        &self,
        sensor_id: &str,
        options: RecordingOptions,
    ) -> Result<String, DriverError> {
        let sensor_id = self.valid_id(sensor_id)?;
        self.registry.start(sensor_id, options)
    }

    pub fn stop_recording(
        &self,
        sensor_id: &str,
        recording_id: &str,
    ) -> Result<Vec<Sample>, DriverError> {
        let sensor_id = self.valid_id(sensor_id)?;
        self.registry.stop(sensor_id, recording_id)
    }

    pub fn is_recording(&self, sensor_id: &str) -> bool {
        self.registry.is_recording(sensor_id)
    }

    /// The most recently completed recording of `sensor_id`, if any.
    pub fn last_recording(&self, sensor_id: &str) -> Result<Option<Vec<Sample>>, DriverError> {
        let sensor_id = self.valid_id(sensor_id)?;
        self.registry.last_recording(sensor_id)
    }

    /// Subscribe a caller to change notifications. Registering twice is a no-op.
    pub fn register_listener(&self, addr: ListenerAddr, device_name: &str) {
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(&addr) {
            debug!(listener = %addr, "Listener already registered");
            return;
        }
        info!(listener = %addr, device = device_name, "Registered listener");
        listeners.insert(
            addr.clone(),
            Listener {
                addr,
                device_name: device_name.to_string(),
            },
        );
    }

    /// Remove a subscription. Unknown callers are ignored.
    pub fn unregister_listener(&self, addr: &ListenerAddr) {
        match self.listeners.lock().remove(addr) {
            Some(listener) => {
                info!(listener = %addr, device = %listener.device_name, "Unregistered listener")
            }
            None => info!(listener = %addr, "No listener registered for caller"),
        }
    }

    pub fn listeners(&self) -> Vec<Listener> {
        self.listeners.lock().values().cloned().collect()
    }

    /// Drop every subscription; called when the session ends.
    pub fn destroy(&self) {
        self.listeners.lock().clear();
        info!(instance_id = %self.instance_id, "Driver destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullGateway;

    impl Gateway for NullGateway {
        fn notify(&self, _: &Notification, _: Option<&Listener>) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    fn driver(settings: DriverSettings) -> Result<Driver, DriverError> {
        Driver::new(settings, Arc::new(NullGateway), "test")
    }

    #[test]
    fn rejects_inconsistent_settings() {
        let settings = DriverSettings {
            valid_ids: vec!["1".into()],
            ..Default::default()
        };
        assert!(matches!(
            driver(settings),
            Err(DriverError::InvalidConfiguration(_))
        ));


        let settings = DriverSettings {
            median_window: 2,
            ..Default::default()
        };
        assert!(driver(settings).is_err());
    }

    #[test]
    fn invalid_sensitivity_falls_back_to_default() {
        for sensitivity in [-0.5, f64::NAN] {
            let settings = DriverSettings {
                sensitivity,
                ..Default::default()
            };
            assert_eq!(driver(settings).unwrap().sensitivity(), 0.0);
        }

        let settings = DriverSettings {
            sensitivity: 0.25,
            ..Default::default()
        };
        assert_eq!(driver(settings).unwrap().sensitivity(), 0.25);
    }

    #[test]
    fn listener_addr_drops_port() {
        let addr = ListenerAddr::from_caller("Ethernet:TCP", "10.0.0.7:14984");
        assert_eq!(addr.host, "10.0.0.7");
        assert_eq!(addr.to_string(), "Ethernet:TCP:10.0.0.7");
        assert_eq!(ListenerAddr::from_caller("tcp", "phone").host, "phone");
    }

    #[test]
    fn listener_registration_is_idempotent() {
        let driver = driver(DriverSettings::default()).unwrap();
        let addr = ListenerAddr::from_caller("tcp", "10.0.0.7:1");
        driver.register_listener(addr.clone(), "phone");
        driver.register_listener(ListenerAddr::from_caller("tcp", "10.0.0.7:2"), "phone");
        assert_eq!(driver.listeners().len(), 1);

        driver.unregister_listener(&addr);
        driver.unregister_listener(&addr);
        assert!(driver.listeners().is_empty());
    }

    #[test]
    fn unknown_sensor_is_rejected() {
        let driver = driver(DriverSettings::default()).unwrap();
        assert_eq!(
            driver.sensor_changed(DQuat::IDENTITY, Some("7"), None),
            Err(DriverError::InvalidArgument("invalid sensor id".into()))
        );
        assert!(driver.start_recording("7", RecordingOptions::default()).is_err());
        assert!(driver.last_recording("7").is_err());
    }
}
