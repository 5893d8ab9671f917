//! Client-side decoding of driver payloads.
//!
//! Parameters may arrive either as structured JSON or as a JSON document
//! encoded in a string, depending on the transport; both are accepted.

use crate::driver::{Notification, CHANGE_EVENT, DRIVER_NAME, NEW_DATA_PARAM};
use crate::error::WireError;
use crate::service::{Response, IDS_PARAM, RECORD_DATA_PARAM};
use crate::types::{quat_serde, Sample, SensorData};
use glam::DQuat;
use serde::de::DeserializeOwned;
use serde_json::Value;

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, WireError> {
    Ok(match value {
        Value::String(json) => serde_json::from_str(json)?,
        other => serde_json::from_value(other.clone())?,
    })
}

/// Sensor ids from a `listIds` response.
pub fn extract_id_list(response: &Response) -> Result<Vec<String>, WireError> {
    let param = response
        .get(IDS_PARAM)
        .ok_or(WireError::MissingParameter("id list"))?;
    decode(param)
}

/// The [`SensorData`] carried by a change notification.
pub fn extract_sensor_data(notification: &Notification) -> Result<SensorData, WireError> {
    if notification.driver != DRIVER_NAME || notification.event_key != CHANGE_EVENT {
        return Err(WireError::UnexpectedEvent);
    }
    let param = notification
        .parameters
        .get(NEW_DATA_PARAM)
        .ok_or(WireError::MissingParameter("event data"))?;
    let data: SensorData = decode(param)?;
    if data.id.trim().is_empty() {
        return Err(WireError::BlankSensorId);
    }
    Ok(data)
}

/// The curve from a `stopRecording` or `lastRecording` response.
pub fn extract_recorded_data(response: &Response) -> Result<Vec<Sample>, WireError> {
    let param = response
        .get(RECORD_DATA_PARAM)
        .ok_or(WireError::MissingParameter("sample list"))?;
    decode(param)
}

/// A curve serialized as a JSON array of samples.
pub fn parse_recorded_data(json: &str) -> Result<Vec<Sample>, WireError> {
    Ok(serde_json::from_str(json)?)
}

/// A quaternion in its `{w, x, y, z}` wire form.
pub fn quaternion_from_value(value: Value) -> Result<DQuat, WireError> {
    Ok(quat_serde::deserialize(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn change(data: Value) -> Notification {
        let mut parameters = Map::new();
        parameters.insert(NEW_DATA_PARAM.to_string(), data);
        Notification {
            driver: DRIVER_NAME.to_string(),
            event_key: CHANGE_EVENT.to_string(),
            instance_id: "i".to_string(),
            parameters,
        }
    }

    fn sensor_json(id: &str) -> Value {
        json!({
            "id": id,
            "timestamp": 5,
            "quaternion": { "w": 1.0, "x": 0.0, "y": 0.0, "z": 0.0 }
        })
    }

    #[test]
    fn sensor_data_from_structured_and_string_params() {
        let data = extract_sensor_data(&change(sensor_json("0"))).unwrap();
        assert_eq!(data, SensorData::new("0", 5, DQuat::IDENTITY));

        let encoded = Value::String(sensor_json("1").to_string());
        assert_eq!(extract_sensor_data(&change(encoded)).unwrap().id, "1");
    }

    #[test]
    fn sensor_data_rejects_foreign_or_blank_events() {
        let mut foreign = change(sensor_json("0"));
        foreign.event_key = "other".to_string();
        assert!(matches!(
            extract_sensor_data(&foreign),
            Err(WireError::UnexpectedEvent)
        ));
        assert!(matches!(
            extract_sensor_data(&change(sensor_json("  "))),
            Err(WireError::BlankSensorId)
        ));

        let mut empty = change(Value::Null);
        empty.parameters.clear();
        assert!(matches!(
            extract_sensor_data(&empty),
            Err(WireError::MissingParameter(_))
        ));
    }

    #[test]
    fn id_list_and_curve_from_response() {
        let mut response = Response::default();
        response.add(IDS_PARAM, json!(["0", "left"]));
        response.add(
            RECORD_DATA_PARAM,
            json!([{ "timestamp": 0, "quaternion": { "w": 1.0, "x": 0.0, "y": 0.0, "z": 0.0 } }]),
        );
        assert_eq!(extract_id_list(&response).unwrap(), vec!["0", "left"]);
        assert_eq!(
            extract_recorded_data(&response).unwrap(),
            vec![Sample::new(0, DQuat::IDENTITY)]
        );
        assert!(extract_recorded_data(&Response::default()).is_err());
    }

    #[test]
    fn curve_from_string() {
        let curve = parse_recorded_data(
            r#"[{"timestamp": 3, "quaternion": {"w": 0.0, "x": 1.0, "y": 0.0, "z": 0.0}}]"#,
        )
        .unwrap();
        assert_eq!(curve[0].timestamp(), 3);
        assert_eq!(curve[0].quaternion(), DQuat::from_xyzw(1.0, 0.0, 0.0, 0.0));
        assert!(parse_recorded_data(r#"[{"timestamp": 3}]"#).is_err());
    }

    #[test]
    fn quaternion_requires_all_components() {
        let q = quaternion_from_value(json!({ "w": 1, "x": 0, "y": 0, "z": 0 })).unwrap();
        assert_eq!(q, DQuat::IDENTITY);
        assert!(quaternion_from_value(json!({ "w": 1.0, "x": 0.0, "y": 0.0 })).is_err());
    }
}
