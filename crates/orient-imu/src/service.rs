//! Named-parameter request surface of the driver.
//!
//! A [`Call`] names a service and carries JSON parameters; [`dispatch`] runs it
//! against a [`Driver`] and fills a [`Response`]. Caller mistakes become
//! `Response::error`, never a panic or a partial state change.

use crate::driver::{Driver, ListenerAddr};
use crate::error::DriverError;
use crate::registry::RecordingOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

pub const LIST_IDS: &str = "listIds";
pub const GET_SENSITIVITY: &str = "getSensitivity";
pub const TARE: &str = "tare";
pub const START_RECORDING: &str = "startRecording";
pub const STOP_RECORDING: &str = "stopRecording";
pub const LAST_RECORDING: &str = "lastRecording";
pub const REGISTER_LISTENER: &str = "registerListener";
pub const UNREGISTER_LISTENER: &str = "unregisterListener";

pub const IDS_PARAM: &str = "ids";
pub const SENSITIVITY_PARAM: &str = "sensitivity";
pub const SENSOR_ID_PARAM: &str = "sensorId";
pub const STEP_TIME_PARAM: &str = "stepTime";
pub const INTERPOLATE_PARAM: &str = "interpolate";
pub const RECORD_ID_PARAM: &str = "recordId";
pub const RECORD_DATA_PARAM: &str = "recordData";

/// A request for one driver service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub service: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Call {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }
}

/// Reply to a [`Call`]: either response data or an error message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: Map::new(),
            error: Some(message.into()),
        }
    }

    pub fn add(&mut self, name: &str, value: impl Into<Value>) {
        self.data.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The network identity a call arrived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub network_type: String,
    /// `host:port` of the calling device.
    pub device_name: String,
}

/// Per-call information supplied by the host middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Option<Caller>,
}

/// Run `call` against `driver`.
pub fn dispatch(driver: &Driver, call: &Call, context: &CallContext) -> Response {
    debug!(service = %call.service, "Dispatching call");
    let result = match call.service.as_str() {
        LIST_IDS => list_ids(driver),
        GET_SENSITIVITY => get_sensitivity(driver),
        TARE => {
            driver.tare();
            Ok(Response::default())
        }
        START_RECORDING => start_recording(driver, call),
        STOP_RECORDING => stop_recording(driver, call),
        LAST_RECORDING => last_recording(driver, call),
        REGISTER_LISTENER => {
            match &context.caller {
                Some(caller) => driver.register_listener(
                    ListenerAddr::from_caller(&caller.network_type, &caller.device_name),
                    &caller.device_name,
                ),
                None => warn!("registerListener without caller identity"),
            }
            Ok(Response::default())
        }
        UNREGISTER_LISTENER => {
            if let Some(caller) = &context.caller {
                driver.unregister_listener(&ListenerAddr::from_caller(
                    &caller.network_type,
                    &caller.device_name,
                ));
            }
            Ok(Response::default())
        }
        other => Err(DriverError::InvalidArgument(format!(
            "unknown service '{other}'"
        ))),
    };

    result.unwrap_or_else(|e| {
        debug!(service = %call.service, error = %e, "Call rejected");
        Response::error(e.to_string())
    })
}

fn list_ids(driver: &Driver) -> Result<Response, DriverError> {
    let mut response = Response::default();
    response.add(IDS_PARAM, driver.list_ids());
    Ok(response)
}

fn get_sensitivity(driver: &Driver) -> Result<Response, DriverError> {
    let mut response = Response::default();
    response.add(SENSITIVITY_PARAM, driver.sensitivity());
    Ok(response)
}

fn start_recording(driver: &Driver, call: &Call) -> Result<Response, DriverError> {
    let sensor_id = sensor_id_param(call)?;
    let options = RecordingOptions {
        step: call.param(STEP_TIME_PARAM).map(parse_step).transpose()?,
        interpolate: call
            .param(INTERPOLATE_PARAM)
            .map(parse_flag)
            .transpose()?
            .unwrap_or(false),
    };
    let recording_id = driver.start_recording(&sensor_id, options)?;

    let mut response = Response::default();
    response.add(RECORD_ID_PARAM, recording_id);
    Ok(response)
}

fn stop_recording(driver: &Driver, call: &Call) -> Result<Response, DriverError> {
    let recording_id = call
        .param(RECORD_ID_PARAM)
        .map(param_to_string)
        .ok_or_else(|| DriverError::invalid_argument("no record id provided"))?;
    let sensor_id = sensor_id_param(call)?;
    let data = driver.stop_recording(&sensor_id, &recording_id)?;

    let mut response = Response::default();
    response.add(RECORD_DATA_PARAM, encode(&data)?);
    Ok(response)
}

fn last_recording(driver: &Driver, call: &Call) -> Result<Response, DriverError> {
    let sensor_id = sensor_id_param(call)?;
    let mut response = Response::default();
    if let Some(data) = driver.last_recording(&sensor_id)? {
        response.add(RECORD_DATA_PARAM, encode(&data)?);
    }
    Ok(response)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, DriverError> {
    serde_json::to_value(value).map_err(|e| {
        error!(?e, "Failed to encode response");
        DriverError::Internal(format!("failed to encode response: {e}"))
    })
}

fn sensor_id_param(call: &Call) -> Result<String, DriverError> {
    call.param(SENSOR_ID_PARAM)
        .map(param_to_string)
        .ok_or_else(|| DriverError::invalid_argument("no sensor id provided"))
}

/// Strings are taken verbatim; other scalars use their JSON text, so a numeric
/// id `0` matches the sensor id `"0"`.
fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_step(value: &Value) -> Result<i64, DriverError> {
    let step = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    step.ok_or_else(|| DriverError::invalid_argument("invalid time step"))
}

fn parse_flag(value: &Value) -> Result<bool, DriverError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| DriverError::invalid_argument("invalid interpolate flag")),
        _ => Err(DriverError::invalid_argument("invalid interpolate flag")),
    }
}
