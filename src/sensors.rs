//! Lookups over the raw `/query/sensors` list.
//!
//! Older firmware leaves out the `type` field. The type is then taken from
//! the sensor name: first the fixed name table, then the name itself if it
//! is a type token (a sensor called "Outdoor" is an outdoor sensor). An
//! explicit `type` always wins over either.

use serde_json::Value;

use crate::types::{SensorReading, SensorType};

const NAME_CATEGORIES: &[(&str, SensorType)] = &[
    ("Thermostat", SensorType::Control),
    ("Space Temp", SensorType::Control),
    ("Local Sensor", SensorType::Local),
];

pub(crate) fn infer_from_name(name: &str) -> Option<SensorType> {
    NAME_CATEGORIES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, t)| *t)
        .or_else(|| SensorType::from_api_str(name))
}

fn name_of(sensor: &Value) -> Option<&str> {
    sensor.get("name").and_then(|v| v.as_str())
}

pub(crate) fn sensor_type(sensor: &Value) -> Option<SensorType> {
    match sensor.get("type").and_then(|v| v.as_str()) {
        Some(explicit) => SensorType::from_api_str(explicit),
        None => name_of(sensor).and_then(infer_from_name),
    }
}

pub(crate) fn find<'a>(sensors: &'a [Value], name: &str) -> Option<&'a Value> {
    sensors.iter().find(|s| name_of(s) == Some(name))
}

pub(crate) fn attribute(sensors: &[Value], name: &str, attr: &str) -> Option<Value> {
    let sensor = find(sensors, name)?;
    match sensor.get(attr) {
        Some(v) if !v.is_null() => Some(v.clone()),
        _ if attr == "type" => infer_from_name(name).map(|t| Value::from(t.as_api_str())),
        _ => None,
    }
}

pub(crate) fn names(sensors: &[Value], filter: Option<SensorType>) -> Vec<String> {
    sensors
        .iter()
        .filter(|s| filter.is_none_or(|t| sensor_type(s) == Some(t)))
        .filter_map(|s| name_of(s).map(str::to_string))
        .collect()
}

fn first_with(sensors: &[Value], kind: SensorType, attr: &str) -> Option<f64> {
    sensors
        .iter()
        .filter(|s| sensor_type(s) == Some(kind))
        .find_map(|s| s.get(attr).and_then(|v| v.as_f64()))
}

/// Indoor values come from the control sensor when there is one, otherwise
/// from the thermostat's local sensor.
pub(crate) fn indoor(sensors: &[Value], attr: &str) -> Option<f64> {
    first_with(sensors, SensorType::Control, attr).or_else(|| first_with(sensors, SensorType::Local, attr))
}

pub(crate) fn outdoor(sensors: &[Value], attr: &str) -> Option<f64> {
    first_with(sensors, SensorType::Outdoor, attr)
}

pub(crate) fn reading(sensor: &Value) -> Option<SensorReading> {
    Some(SensorReading {
        name: name_of(sensor)?.to_string(),
        sensor_type: sensor_type(sensor),
        temperature: sensor.get("temp").and_then(|v| v.as_f64()),
        humidity: sensor.get("hum").and_then(|v| v.as_f64()),
        battery: sensor.get("battery").and_then(|v| v.as_f64()),
    })
}
