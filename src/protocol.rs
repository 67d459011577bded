use serde_json::Value;
use tracing::warn;

use crate::types::*;
use crate::{Error, Result};

pub const MIN_API_VER: u64 = 3;
pub const DEFAULT_MODEL: &str = "COLORTOUCH";

pub const PATH_ROOT: &str = "/";
pub const PATH_INFO: &str = "/query/info";
pub const PATH_SENSORS: &str = "/query/sensors";
pub const PATH_RUNTIMES: &str = "/query/runtimes";
pub const PATH_ALERTS: &str = "/query/alerts";
pub const PATH_CONTROL: &str = "/control";
pub const PATH_SETTINGS: &str = "/settings";

/// Keys that some models only expose through `/settings?q=<key>`.
pub const SETTINGS_KEYS: &[&str] = &["tempunits", "away", "schedule", "hum_setpoint", "dehum_setpoint"];

/// Keys a model may legitimately lack; absence means the feature is missing.
pub const OPTIONAL_SETTINGS_KEYS: &[&str] = &["hum_setpoint", "dehum_setpoint"];

pub type Form = Vec<(&'static str, String)>;

fn flag(on: bool) -> String {
    u8::from(on).to_string()
}

pub fn setpoints_form(heat: f64, cool: f64) -> Form {
    vec![("heattemp", heat.to_string()), ("cooltemp", cool.to_string())]
}

/// Mode changes must re-assert both setpoints.
pub fn mode_form(mode: Mode, heat: f64, cool: f64) -> Form {
    vec![
        ("mode", mode.as_api().to_string()),
        ("heattemp", heat.to_string()),
        ("cooltemp", cool.to_string()),
    ]
}

pub fn fan_form(fan: FanMode) -> Form {
    vec![("fan", fan.as_api().to_string())]
}

/// Unsupported humidity setpoints are left out rather than sent empty.
pub fn settings_form(units: TempUnits, hum: Option<f64>, dehum: Option<f64>) -> Form {
    let mut form = vec![("tempunits", units.as_api().to_string())];
    if let Some(h) = hum {
        form.push(("hum_setpoint", h.to_string()));
    }
    if let Some(d) = dehum {
        form.push(("dehum_setpoint", d.to_string()));
    }
    form
}

pub fn away_form(away: bool) -> Form {
    vec![("away", flag(away))]
}

pub fn schedule_form(schedule: bool) -> Form {
    vec![("schedule", flag(schedule))]
}

pub fn security_form(on: bool) -> Form {
    vec![("security", flag(on))]
}

pub fn setpoint_limits_form(max: Option<f64>, min: Option<f64>) -> Form {
    let mut form = Vec::new();
    if let Some(max) = max {
        form.push(("setpointmax", max.to_string()));
    }
    if let Some(min) = min {
        form.push(("setpointmin", min.to_string()));
    }
    form
}

pub fn write_succeeded(body: &Value) -> bool {
    body.get("success").is_some()
}

pub fn failure_reason(body: &Value) -> Option<&str> {
    body.get("reason").and_then(|v| v.as_str())
}

fn present<'a>(data: &'a Value, field: &'static str) -> Option<&'a Value> {
    data.get(field).filter(|v| !v.is_null())
}

fn required_u64(data: &Value, field: &'static str) -> Result<u64> {
    let v = present(data, field).ok_or(Error::MissingField(field))?;
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
        .ok_or_else(|| Error::InvalidField { field, value: v.clone() })
}

fn required_f64(data: &Value, field: &'static str) -> Result<f64> {
    let v = present(data, field).ok_or(Error::MissingField(field))?;
    v.as_f64().ok_or_else(|| Error::InvalidField { field, value: v.clone() })
}

fn optional_f64(data: &Value, field: &'static str) -> Option<f64> {
    present(data, field).and_then(|v| v.as_f64())
}

fn optional_flag(data: &Value, field: &'static str) -> Option<bool> {
    present(data, field).and_then(|v| v.as_bool().or_else(|| v.as_u64().map(|n| n != 0)))
}

fn required_flag(data: &Value, field: &'static str) -> Result<bool> {
    let v = present(data, field).ok_or(Error::MissingField(field))?;
    v.as_bool()
        .or_else(|| v.as_u64().map(|n| n != 0))
        .ok_or_else(|| Error::InvalidField { field, value: v.clone() })
}

fn enum_field<T>(data: &Value, field: &'static str, from_api: fn(u64) -> Option<T>) -> Result<T> {
    let raw = required_u64(data, field)?;
    from_api(raw).ok_or_else(|| Error::InvalidField { field, value: Value::from(raw) })
}

/// Firmware is normally a dotted string such as `"5.28"`. A fractional JSON
/// number has already lost its trailing zeros (`5.30` reads back as `5.3`),
/// so only whole numbers are accepted in that form.
fn parse_firmware(data: &Value) -> FirmwareVersion {
    let parsed = match present(data, "firmware") {
        Some(Value::String(s)) => FirmwareVersion::parse(s),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|major| u32::try_from(major).ok())
            .map(|major| FirmwareVersion::new(major, 0)),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        if let Some(raw) = present(data, "firmware") {
            warn!(firmware = %raw, "unparseable firmware version, treating as 0.0");
        }
        FirmwareVersion::default()
    })
}

pub fn parse_identity(data: &Value) -> Result<DeviceIdentity> {
    let api_version = required_u64(data, "api_ver")?;
    if api_version < MIN_API_VER {
        return Err(Error::Incompatible { api_ver: api_version, min: MIN_API_VER });
    }
    let type_value = present(data, "type").ok_or(Error::MissingField("type"))?;
    let thermostat_type = type_value
        .as_str()
        .and_then(ThermostatType::from_api)
        .ok_or_else(|| Error::InvalidField { field: "type", value: type_value.clone() })?;
    let model = present(data, "model")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_MODEL)
        .to_string();

    Ok(DeviceIdentity {
        api_version,
        thermostat_type,
        model,
        firmware: parse_firmware(data),
    })
}

pub fn parse_control(info: &Value) -> Result<ControlState> {
    Ok(ControlState {
        mode: enum_field(info, "mode", Mode::from_api)?,
        fan: enum_field(info, "fan", FanMode::from_api)?,
        fan_state: match present(info, "fanstate") {
            Some(_) => enum_field(info, "fanstate", FanState::from_api)?,
            None => FanState::default(),
        },
        state: match present(info, "state") {
            Some(_) => enum_field(info, "state", RunState::from_api)?,
            None => RunState::default(),
        },
        space_temp: optional_f64(info, "spacetemp"),
        heat_temp: required_f64(info, "heattemp")?,
        cool_temp: required_f64(info, "cooltemp")?,
        setpoint_delta: required_f64(info, "setpointdelta")?,
        heat_temp_min: optional_f64(info, "heattempmin"),
        heat_temp_max: optional_f64(info, "heattempmax"),
        cool_temp_min: optional_f64(info, "cooltempmin"),
        cool_temp_max: optional_f64(info, "cooltempmax"),
    })
}

/// Expects the settings keys to already be merged into `info`.
pub fn parse_settings(info: &Value, kind: ThermostatType, api_units: TempUnits) -> Result<SettingsState> {
    let away = match kind {
        ThermostatType::Residential => Some(required_flag(info, "away")?),
        ThermostatType::Commercial => None,
    };
    Ok(SettingsState {
        name: present(info, "name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        display_units: enum_field(info, "tempunits", TempUnits::from_api)?,
        api_units,
        away,
        schedule: required_flag(info, "schedule")?,
        schedule_part: present(info, "schedulepart")
            .and_then(|v| v.as_u64())
            .and_then(SchedulePart::from_api),
        hum_setpoint: optional_f64(info, "hum_setpoint"),
        dehum_setpoint: optional_f64(info, "dehum_setpoint"),
        hum_active: optional_flag(info, "hum_active").unwrap_or(false),
        security: optional_flag(info, "security"),
        setpoint_max: optional_f64(info, "setpointmax"),
        setpoint_min: optional_f64(info, "setpointmin"),
    })
}

pub fn display_units(info: &Value) -> Result<TempUnits> {
    enum_field(info, "tempunits", TempUnits::from_api)
}

/// Pull a list out of a `{"<key>": [...]}` query response.
pub fn parse_list(body: &Value, key: &'static str) -> Result<Vec<Value>> {
    match present(body, key) {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(Error::InvalidField { field: key, value: other.clone() }),
        None => Err(Error::MissingField(key)),
    }
}
