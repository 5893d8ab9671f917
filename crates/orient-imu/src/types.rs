use glam::DQuat;
use serde::{Deserialize, Serialize};

/// One point of an orientation curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Capture time in milliseconds.
    timestamp: i64,
    #[serde(with = "quat_serde")]
    quaternion: DQuat,
}

impl Sample {
    pub fn new(timestamp: i64, quaternion: DQuat) -> Self {
        Self {
            timestamp,
            quaternion,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn quaternion(&self) -> DQuat {
        self.quaternion
    }
}

/// A sample tagged with the sensor it came from.
///
/// This is the payload of the outbound `change` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    pub id: String,
    #[serde(flatten)]
    pub sample: Sample,
}

impl SensorData {
    pub fn new(id: impl Into<String>, timestamp: i64, quaternion: DQuat) -> Self {
        Self {
            id: id.into(),
            sample: Sample::new(timestamp, quaternion),
        }
    }
}

/// Serde helpers for `DQuat` using named `w, x, y, z` fields.
///
/// All four components are required when decoding.
pub mod quat_serde {
    use glam::DQuat;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Components {
        w: f64,
        x: f64,
        y: f64,
        z: f64,
    }

    pub fn serialize<S: Serializer>(q: &DQuat, s: S) -> Result<S::Ok, S::Error> {
        Components {
            w: q.w,
            x: q.x,
            y: q.y,
            z: q.z,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DQuat, D::Error> {
        let Components { w, x, y, z } = Components::deserialize(d)?;
        Ok(DQuat::from_xyzw(x, y, z, w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sample_uses_named_components() {
        let sample = Sample::new(42, DQuat::from_xyzw(0.1, 0.2, 0.3, 0.9));
        let value = serde_json::to_value(sample).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": 42,
                "quaternion": { "w": 0.9, "x": 0.1, "y": 0.2, "z": 0.3 }
            })
        );
    }

    #[test]
    fn quaternion_missing_component_is_rejected() {
        let value = json!({
            "timestamp": 1,
            "quaternion": { "w": 1.0, "x": 0.0, "y": 0.0 }
        });
        assert!(serde_json::from_value::<Sample>(value).is_err());
    }

    #[test]
    fn quaternion_non_numeric_component_is_rejected() {
        let value = json!({
            "timestamp": 1,
            "quaternion": { "w": 1.0, "x": "0", "y": 0.0, "z": 0.0 }
        });
        assert!(serde_json::from_value::<Sample>(value).is_err());
    }

    #[test]
    fn sensor_data_flattens_sample() {
        let data = SensorData::new("left", 7, DQuat::IDENTITY);
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["id"], "left");
        assert_eq!(value["timestamp"], 7);
        assert_eq!(value["quaternion"]["w"], 1.0);

        let back: SensorData = serde_json::from_value(value).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn sensor_data_requires_timestamp() {
        let value = json!({
            "id": "0",
            "quaternion": { "w": 1.0, "x": 0.0, "y": 0.0, "z": 0.0 }
        });
        assert!(serde_json::from_value::<SensorData>(value).is_err());
    }
}
