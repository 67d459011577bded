use std::fmt;

use serde::Serialize;

/// Temperature stored as Celsius internally.
/// The thermostat works in whole degrees F or 0.5 degree C steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    pub fn from_fahrenheit(f: f64) -> Self {
        Self((f - 32.0) * (5.0 / 9.0))
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    pub fn fahrenheit(&self) -> f64 {
        self.0 * (9.0 / 5.0) + 32.0
    }

    /// Interpret a raw API value in the given scale.
    pub fn from_api(value: f64, units: TempUnits) -> Self {
        match units {
            TempUnits::Fahrenheit => Self::from_fahrenheit(value),
            TempUnits::Celsius => Self::from_celsius(value),
        }
    }

    /// Convert to an API value in the given scale, rounded to device precision.
    pub fn to_api(&self, units: TempUnits) -> f64 {
        match units {
            TempUnits::Fahrenheit => self.fahrenheit().round(),
            TempUnits::Celsius => (self.0 * 2.0).round() / 2.0,
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Off,
    Heat,
    Cool,
    Auto,
}

impl Mode {
    pub fn as_api(&self) -> u8 {
        match self {
            Mode::Off => 0,
            Mode::Heat => 1,
            Mode::Cool => 2,
            Mode::Auto => 3,
        }
    }

    pub fn from_api(v: u64) -> Option<Self> {
        match v {
            0 => Some(Mode::Off),
            1 => Some(Mode::Heat),
            2 => Some(Mode::Cool),
            3 => Some(Mode::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FanMode {
    Auto,
    On,
}

impl FanMode {
    pub fn as_api(&self) -> u8 {
        match self {
            FanMode::Auto => 0,
            FanMode::On => 1,
        }
    }

    pub fn from_api(v: u64) -> Option<Self> {
        match v {
            0 => Some(FanMode::Auto),
            1 => Some(FanMode::On),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FanState {
    #[default]
    Off,
    On,
}

impl FanState {
    pub fn from_api(v: u64) -> Option<Self> {
        match v {
            0 => Some(FanState::Off),
            1 => Some(FanState::On),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RunState {
    #[default]
    Idle,
    Heating,
    Cooling,
    Lockout,
    Error,
}

impl RunState {
    pub fn from_api(v: u64) -> Option<Self> {
        match v {
            0 => Some(RunState::Idle),
            1 => Some(RunState::Heating),
            2 => Some(RunState::Cooling),
            3 => Some(RunState::Lockout),
            4 => Some(RunState::Error),
            _ => None,
        }
    }
}

/// Which program period the schedule is in; `Inactive` when no schedule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulePart {
    Morning,
    Day,
    Evening,
    Night,
    Inactive,
}

impl SchedulePart {
    pub fn from_api(v: u64) -> Option<Self> {
        match v {
            0 => Some(SchedulePart::Morning),
            1 => Some(SchedulePart::Day),
            2 => Some(SchedulePart::Evening),
            3 => Some(SchedulePart::Night),
            255 => Some(SchedulePart::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TempUnits {
    Fahrenheit,
    Celsius,
}

impl TempUnits {
    pub fn as_api(&self) -> u8 {
        match self {
            TempUnits::Fahrenheit => 0,
            TempUnits::Celsius => 1,
        }
    }

    pub fn from_api(v: u64) -> Option<Self> {
        match v {
            0 => Some(TempUnits::Fahrenheit),
            1 => Some(TempUnits::Celsius),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThermostatType {
    Residential,
    Commercial,
}

impl ThermostatType {
    pub fn from_api(s: &str) -> Option<Self> {
        match s {
            "residential" => Some(ThermostatType::Residential),
            "commercial" => Some(ThermostatType::Commercial),
            _ => None,
        }
    }
}

/// Firmware version as `(major, minor)`. Ordering is integer-wise on the
/// pair, so `5.3 < 5.28`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
}

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a dotted version such as `"5.28"` or `"6.10.1"`. Components past
    /// the minor are ignored; a missing minor is 0.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.trim().parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.trim().parse().ok()?,
            None => 0,
        };
        Some(Self { major, minor })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceIdentity {
    pub api_version: u64,
    pub thermostat_type: ThermostatType,
    pub model: String,
    pub firmware: FirmwareVersion,
}

/// Values mirrored from the `/control` side of the info payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    pub mode: Mode,
    pub fan: FanMode,
    pub fan_state: FanState,
    pub state: RunState,
    /// Thermostat's own reading, in API units.
    pub space_temp: Option<f64>,
    pub heat_temp: f64,
    pub cool_temp: f64,
    pub setpoint_delta: f64,
    pub heat_temp_min: Option<f64>,
    pub heat_temp_max: Option<f64>,
    pub cool_temp_min: Option<f64>,
    pub cool_temp_max: Option<f64>,
}

/// Values mirrored from the `/settings` side of the info payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsState {
    pub name: String,
    /// Display setting, echoed back on every settings write.
    pub display_units: TempUnits,
    /// Scale the API actually reports setpoints and readings in.
    pub api_units: TempUnits,
    /// `None` on commercial thermostats.
    pub away: Option<bool>,
    pub schedule: bool,
    pub schedule_part: Option<SchedulePart>,
    /// `None` when the model has no humidifier support.
    pub hum_setpoint: Option<f64>,
    /// `None` when the model has no dehumidifier support.
    pub dehum_setpoint: Option<f64>,
    pub hum_active: bool,
    pub security: Option<bool>,
    pub setpoint_max: Option<f64>,
    pub setpoint_min: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SensorType {
    Control,
    Local,
    Outdoor,
    Remote,
    Return,
    Supply,
}

impl SensorType {
    pub const ALL: [SensorType; 6] = [
        SensorType::Control,
        SensorType::Local,
        SensorType::Outdoor,
        SensorType::Remote,
        SensorType::Return,
        SensorType::Supply,
    ];

    pub fn as_api_str(&self) -> &'static str {
        match self {
            SensorType::Control => "Control",
            SensorType::Local => "Local",
            SensorType::Outdoor => "Outdoor",
            SensorType::Remote => "Remote",
            SensorType::Return => "Return",
            SensorType::Supply => "Supply",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_api_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub name: String,
    pub sensor_type: Option<SensorType>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub battery: Option<f64>,
}
