use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::digest::{Challenge, DigestAuth};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{self, Form};
use crate::quirks::{resolve_api_units, UnitInputs, UnitSource};
use crate::sensors;
use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Connection parameters. Fixed for the lifetime of a client.
#[derive(Clone)]
pub struct Session {
    pub address: String,
    pub protocol: Protocol,
    pub timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Four-digit screen PIN, sent as the `pin` query parameter.
    pub pin: Option<String>,
    /// The thermostat ships a self-signed certificate, so this is off by default.
    pub verify_tls: bool,
}

impl Session {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            protocol: Protocol::default(),
            timeout: DEFAULT_TIMEOUT,
            username: None,
            password: None,
            pin: None,
            verify_tls: false,
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol.scheme(), self.address)
    }

    fn validate(&self) -> Result<Option<DigestAuth>> {
        if let Some(pin) = &self.pin
            && !(pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(Error::InvalidConfig("PIN must be exactly 4 digits".to_string()));
        }
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Ok(Some(DigestAuth::new(user.as_str(), pass.as_str()))),
            (None, None) => Ok(None),
            _ => Err(Error::InvalidConfig(
                "username and password must be given together".to_string(),
            )),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("protocol", &self.protocol)
            .field("timeout", &self.timeout)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pin", &self.pin.as_ref().map(|_| "<redacted>"))
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

pub struct ColorTouchClientBuilder {
    session: Session,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl ColorTouchClientBuilder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            session: Session::new(address),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.session.protocol = protocol;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.session.timeout = timeout;
        self
    }

    /// Enables HTTP Digest authentication.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.session.username = Some(username.into());
        self.session.password = Some(password.into());
        self
    }

    pub fn pin(mut self, pin: impl Into<String>) -> Self {
        self.session.pin = Some(pin.into());
        self
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.session.verify_tls = verify;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ColorTouchClient> {
        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };
        ColorTouchClient::with_logger(self.session, logger)
    }
}

/// Last known device state. Each group is `None` until its first
/// successful read.
#[derive(Debug, Default)]
struct StateCache {
    info: Option<Value>,
    control: Option<ControlState>,
    settings: Option<SettingsState>,
    sensors: Option<Vec<Value>>,
    runtimes: Option<Vec<Value>>,
    alerts: Option<Vec<Value>>,
    /// Settings keys the device has answered without a value; not asked again.
    absent_settings: HashSet<&'static str>,
}

pub struct ColorTouchClient {
    http: reqwest::Client,
    session: Session,
    base_url: String,
    digest: Option<DigestAuth>,
    identity: Option<DeviceIdentity>,
    cache: StateCache,
    logger: Option<MessageLogger>,
}

impl ColorTouchClient {
    pub fn builder(address: impl Into<String>) -> ColorTouchClientBuilder {
        ColorTouchClientBuilder::new(address)
    }

    pub fn new(session: Session) -> Result<Self> {
        Self::with_logger(session, None)
    }

    fn with_logger(session: Session, logger: Option<MessageLogger>) -> Result<Self> {
        let digest = session.validate()?;
        let http = reqwest::Client::builder()
            .timeout(session.timeout)
            .danger_accept_invalid_certs(!session.verify_tls)
            .build()?;

        Ok(Self {
            http,
            base_url: session.base_url(),
            session,
            digest,
            identity: None,
            cache: StateCache::default(),
            logger,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // -- Transport --

    fn request_target(&self, path: &str) -> String {
        match &self.session.pin {
            Some(pin) if path.contains('?') => format!("{path}&pin={pin}"),
            Some(pin) => format!("{path}?pin={pin}"),
            None => path.to_string(),
        }
    }

    async fn send(&mut self, method: &Method, target: &str, form: Option<&Form>) -> Result<reqwest::Response> {
        let uri = format!("{}{}", self.base_url, target);
        let mut req = self.http.request(method.clone(), &uri);
        if let Some(form) = form {
            req = req.form(form);
        }
        if let Some(auth) = self
            .digest
            .as_mut()
            .and_then(|d| d.authorization(method.as_str(), target))
        {
            req = req.header(AUTHORIZATION, auth);
        }
        req.send().await.map_err(|e| {
            error!(uri = %uri, error = %e, "request to thermostat failed");
            Error::Http(e)
        })
    }

    /// One request/response exchange. Answers a Digest challenge once; never
    /// retries anything else.
    async fn perform(&mut self, method: Method, path: &str, form: Option<&Form>) -> Result<Value> {
        let target = self.request_target(path);
        let uri = format!("{}{}", self.base_url, path);
        trace!(method = %method, uri = %uri, "request");

        if let Some(ref mut logger) = self.logger {
            logger.log_request(method.as_str(), path, form.map(Vec::as_slice));
        }

        let mut resp = self.send(&method, &target, form).await?;

        if resp.status() == StatusCode::UNAUTHORIZED && self.digest.is_some() {
            let challenge = resp
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|h| h.to_str().ok())
                .and_then(Challenge::parse)
                .ok_or_else(|| {
                    error!(uri = %uri, "401 without a usable Digest challenge");
                    Error::Auth("no Digest challenge in 401 response".to_string())
                })?;
            if let Some(ref mut digest) = self.digest {
                digest.set_challenge(challenge);
            }
            resp = self.send(&method, &target, form).await?;
            if resp.status() == StatusCode::UNAUTHORIZED {
                if let Some(ref mut digest) = self.digest {
                    digest.clear_challenge();
                }
                error!(uri = %uri, "credentials rejected");
                return Err(Error::Auth("credentials rejected".to_string()));
            }
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(uri = %uri, status = status.as_u16(), body = %body, "thermostat returned an error status");
            if let Some(ref mut logger) = self.logger {
                logger.log_unparsed(path, status.as_u16(), &body);
            }
            return Err(Error::Status { uri, status: status.as_u16() });
        }

        let body = resp.text().await.map_err(|e| {
            error!(uri = %uri, error = %e, "failed to read response body");
            Error::Http(e)
        })?;
        let value: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(source) => {
                error!(uri = %uri, error = %source, body = %body, "response is not valid JSON");
                if let Some(ref mut logger) = self.logger {
                    logger.log_unparsed(path, status.as_u16(), &body);
                }
                return Err(Error::Decode { uri, source });
            }
        };

        if let Some(ref mut logger) = self.logger {
            logger.log_response(path, status.as_u16(), &value);
        }
        Ok(value)
    }

    // -- Reads --

    pub async fn login(&mut self) -> Result<()> {
        let body = self.perform(Method::GET, protocol::PATH_ROOT, None).await?;
        let identity = protocol::parse_identity(&body).inspect_err(|e| {
            error!(error = %e, "login failed");
        })?;
        debug!(
            api_ver = identity.api_version,
            model = %identity.model,
            firmware = %identity.firmware,
            kind = ?identity.thermostat_type,
            "logged in"
        );
        self.identity = Some(identity);
        Ok(())
    }

    /// Forget the device identity so the next read logs in again.
    pub fn reset_identity(&mut self) {
        self.identity = None;
    }

    async fn ensure_identity(&mut self) -> Result<DeviceIdentity> {
        if self.identity.is_none() {
            self.login().await?;
        }
        self.identity.clone().ok_or(Error::NotLoaded("device identity"))
    }

    async fn fetch_setting(&mut self, key: &'static str) -> Result<Option<Value>> {
        let path = format!("{}?q={key}", protocol::PATH_SETTINGS);
        let body = self.perform(Method::GET, &path, None).await?;
        Ok(body.get(key).filter(|v| !v.is_null()).cloned())
    }

    /// Refresh control and settings state. Nothing in the cache changes
    /// unless every request and every required field succeeds.
    pub async fn update_info(&mut self) -> Result<()> {
        let identity = self.ensure_identity().await?;
        let mut info = self.perform(Method::GET, protocol::PATH_INFO, None).await?;
        if !info.is_object() {
            error!(body = %info, "info response is not an object");
            return Err(Error::InvalidField { field: "info", value: info });
        }

        let mut newly_absent = HashSet::new();
        for &key in protocol::SETTINGS_KEYS {
            if key == "away" && identity.thermostat_type == ThermostatType::Commercial {
                continue;
            }
            if info.get(key).is_some() || self.cache.absent_settings.contains(key) {
                continue;
            }
            let optional = protocol::OPTIONAL_SETTINGS_KEYS.contains(&key);
            match self.fetch_setting(key).await {
                Ok(Some(value)) => {
                    trace!(key, "merged setting into info");
                    info[key] = value;
                }
                Ok(None) if optional => {
                    debug!(key, "thermostat does not report this setting");
                    newly_absent.insert(key);
                }
                Ok(None) => {
                    error!(key, "required setting missing");
                    return Err(Error::MissingField(key));
                }
                Err(e) if optional => {
                    debug!(key, error = %e, "optional setting unavailable");
                }
                Err(e) => return Err(e),
            }
        }

        let control = protocol::parse_control(&info).inspect_err(|e| {
            error!(error = %e, "unusable control fields in info");
        })?;
        let display_units = protocol::display_units(&info)?;

        let resolution = resolve_api_units(&UnitInputs {
            model: &identity.model,
            firmware: identity.firmware,
            display_units,
            heat_temp_max: control.heat_temp_max,
        });
        match resolution.source {
            UnitSource::FirmwareQuirk => debug!(
                model = %identity.model,
                firmware = %identity.firmware,
                "firmware reports Celsius regardless of display units"
            ),
            UnitSource::Inferred => warn!(
                model = %identity.model,
                heat_temp_max = ?control.heat_temp_max,
                units = ?resolution.units,
                "unknown model, inferring API temperature units from setpoint range"
            ),
            UnitSource::Assumed => warn!(
                model = %identity.model,
                units = ?resolution.units,
                "unknown model, assuming API temperature units match the display"
            ),
            UnitSource::DisplaySetting => {}
        }

        let settings = protocol::parse_settings(&info, identity.thermostat_type, resolution.units)
            .inspect_err(|e| {
                error!(error = %e, "unusable settings fields in info");
            })?;

        self.cache.info = Some(info);
        self.cache.control = Some(control);
        self.cache.settings = Some(settings);
        self.cache.absent_settings.extend(newly_absent);
        Ok(())
    }

    pub async fn update_sensors(&mut self) -> Result<()> {
        self.ensure_identity().await?;
        let body = self.perform(Method::GET, protocol::PATH_SENSORS, None).await?;
        let list = protocol::parse_list(&body, "sensors")?;
        debug!(count = list.len(), "sensors updated");
        self.cache.sensors = Some(list);
        Ok(())
    }

    /// Daily runtime records, oldest first. An empty history is `Ok`.
    pub async fn update_runtimes(&mut self) -> Result<&[Value]> {
        self.ensure_identity().await?;
        let body = self.perform(Method::GET, protocol::PATH_RUNTIMES, None).await?;
        let list = protocol::parse_list(&body, "runtimes")?;
        debug!(count = list.len(), "runtimes updated");
        Ok(self.cache.runtimes.insert(list).as_slice())
    }

    pub async fn update_alerts(&mut self) -> Result<&[Value]> {
        self.ensure_identity().await?;
        let body = self.perform(Method::GET, protocol::PATH_ALERTS, None).await?;
        let list = protocol::parse_list(&body, "alerts")?;
        debug!(count = list.len(), "alerts updated");
        Ok(self.cache.alerts.insert(list).as_slice())
    }

    // -- Cached state --

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    pub fn control(&self) -> Option<&ControlState> {
        self.cache.control.as_ref()
    }

    pub fn settings(&self) -> Option<&SettingsState> {
        self.cache.settings.as_ref()
    }

    /// Raw value from the last info payload, including settings fetched
    /// separately.
    pub fn get_info(&self, key: &str) -> Option<&Value> {
        self.cache.info.as_ref().and_then(|info| info.get(key))
    }

    pub fn api_units(&self) -> Option<TempUnits> {
        self.cache.settings.as_ref().map(|s| s.api_units)
    }

    pub fn runtimes(&self) -> Option<&[Value]> {
        self.cache.runtimes.as_deref()
    }

    pub fn alerts(&self) -> Option<&[Value]> {
        self.cache.alerts.as_deref()
    }

    fn raw_sensors(&self) -> &[Value] {
        self.cache.sensors.as_deref().unwrap_or_default()
    }

    pub fn sensors(&self) -> Vec<SensorReading> {
        self.raw_sensors().iter().filter_map(sensors::reading).collect()
    }

    pub fn get_sensor(&self, name: &str, attr: &str) -> Option<Value> {
        sensors::attribute(self.raw_sensors(), name, attr)
    }

    pub fn get_sensor_list(&self, filter: Option<SensorType>) -> Vec<String> {
        sensors::names(self.raw_sensors(), filter)
    }

    pub fn indoor_temp(&self) -> Option<f64> {
        sensors::indoor(self.raw_sensors(), "temp")
    }

    pub fn indoor_humidity(&self) -> Option<f64> {
        sensors::indoor(self.raw_sensors(), "hum")
    }

    pub fn outdoor_temp(&self) -> Option<f64> {
        sensors::outdoor(self.raw_sensors(), "temp")
    }

    pub fn indoor_temperature(&self) -> Option<Temperature> {
        Some(Temperature::from_api(self.indoor_temp()?, self.api_units()?))
    }

    pub fn outdoor_temperature(&self) -> Option<Temperature> {
        Some(Temperature::from_api(self.outdoor_temp()?, self.api_units()?))
    }

    // -- Writes --

    fn loaded_control(&self) -> Result<ControlState> {
        self.cache.control.clone().ok_or(Error::NotLoaded("control state"))
    }

    fn loaded_settings(&self) -> Result<SettingsState> {
        self.cache.settings.clone().ok_or(Error::NotLoaded("settings"))
    }

    async fn write(&mut self, action: &'static str, path: &'static str, form: Form) -> Result<()> {
        debug!(action, ?form, "sending write");
        let body = self.perform(Method::POST, path, Some(&form)).await?;
        if protocol::write_succeeded(&body) {
            debug!(action, "write accepted");
            return Ok(());
        }
        let raw = body.to_string();
        warn!(
            action,
            reason = protocol::failure_reason(&body).unwrap_or("none given"),
            body = %raw,
            "write rejected"
        );
        Err(Error::Rejected { action, body: raw })
    }

    /// Bring the cache in line with what the device accepted. The write
    /// already succeeded, so a failed refresh is only logged.
    async fn reconcile(&mut self, action: &'static str) {
        if let Err(e) = self.update_info().await {
            warn!(action, error = %e, "refresh after write failed; cache reflects the request");
        }
    }

    /// In auto mode the cool setpoint must sit at least `setpointdelta`
    /// above the heat setpoint.
    pub async fn set_setpoints(&mut self, heat: f64, cool: f64) -> Result<()> {
        let mut control = self.loaded_control()?;
        if control.mode == Mode::Auto && heat + control.setpoint_delta > cool {
            warn!(
                heat,
                cool,
                delta = control.setpoint_delta,
                "setpoints too close for auto mode"
            );
            return Err(Error::InvalidSetpoints {
                heat,
                cool,
                delta: control.setpoint_delta,
            });
        }
        self.write("set_setpoints", protocol::PATH_CONTROL, protocol::setpoints_form(heat, cool))
            .await?;
        control.heat_temp = heat;
        control.cool_temp = cool;
        self.cache.control = Some(control);
        Ok(())
    }

    /// Like [`set_setpoints`](Self::set_setpoints), converting to the scale the
    /// API uses on this device.
    pub async fn set_setpoints_temperature(&mut self, heat: Temperature, cool: Temperature) -> Result<()> {
        let units = self.api_units().ok_or(Error::NotLoaded("settings"))?;
        self.set_setpoints(heat.to_api(units), cool.to_api(units)).await
    }

    pub async fn set_mode(&mut self, mode: Mode) -> Result<()> {
        let mut control = self.loaded_control()?;
        let form = protocol::mode_form(mode, control.heat_temp, control.cool_temp);
        self.write("set_mode", protocol::PATH_CONTROL, form).await?;
        control.mode = mode;
        self.cache.control = Some(control);
        Ok(())
    }

    pub async fn set_fan(&mut self, fan: FanMode) -> Result<()> {
        let mut control = self.loaded_control()?;
        self.write("set_fan", protocol::PATH_CONTROL, protocol::fan_form(fan)).await?;
        control.fan = fan;
        self.cache.control = Some(control);
        Ok(())
    }

    async fn send_settings(&mut self, settings: SettingsState) -> Result<()> {
        let form = protocol::settings_form(
            settings.display_units,
            settings.hum_setpoint,
            settings.dehum_setpoint,
        );
        self.write("set_settings", protocol::PATH_SETTINGS, form).await?;
        self.cache.settings = Some(settings);
        Ok(())
    }

    /// Re-send display units and humidity setpoints from the cache.
    pub async fn set_settings(&mut self) -> Result<()> {
        let settings = self.loaded_settings()?;
        self.send_settings(settings).await
    }

    /// Changing the display units can change the API scale, so the cache is
    /// refreshed afterwards.
    pub async fn set_tempunits(&mut self, units: TempUnits) -> Result<()> {
        let mut settings = self.loaded_settings()?;
        settings.display_units = units;
        self.send_settings(settings).await?;
        self.reconcile("set_tempunits").await;
        Ok(())
    }

    pub async fn set_hum_setpoint(&mut self, value: f64) -> Result<()> {
        let mut settings = self.loaded_settings()?;
        if settings.hum_setpoint.is_none() {
            warn!(value, "thermostat has no humidify setpoint");
            return Err(Error::Unsupported("humidify setpoint"));
        }
        settings.hum_setpoint = Some(value);
        self.send_settings(settings).await
    }

    pub async fn set_dehum_setpoint(&mut self, value: f64) -> Result<()> {
        let mut settings = self.loaded_settings()?;
        if settings.dehum_setpoint.is_none() {
            warn!(value, "thermostat has no dehumidify setpoint");
            return Err(Error::Unsupported("dehumidify setpoint"));
        }
        settings.dehum_setpoint = Some(value);
        self.send_settings(settings).await
    }

    /// Residential only. An active schedule is switched off first, since the
    /// device refuses away while it runs.
    pub async fn set_away(&mut self, away: bool) -> Result<()> {
        let settings = self.loaded_settings()?;
        if self
            .identity
            .as_ref()
            .is_some_and(|id| id.thermostat_type == ThermostatType::Commercial)
            || settings.away.is_none()
        {
            warn!("away mode is not available on commercial thermostats");
            return Err(Error::Unsupported("away mode on commercial thermostats"));
        }
        if settings.away == Some(away) {
            trace!(away, "away already set");
            return Ok(());
        }
        if settings.schedule {
            debug!("disabling schedule before changing away");
            self.set_schedule(false).await?;
        }

        self.write("set_away", protocol::PATH_SETTINGS, protocol::away_form(away))
            .await?;
        if let Some(ref mut settings) = self.cache.settings {
            settings.away = Some(away);
        }
        self.reconcile("set_away").await;
        Ok(())
    }

    /// Any schedule change is refused while away is active.
    pub async fn set_schedule(&mut self, schedule: bool) -> Result<()> {
        let settings = self.loaded_settings()?;
        if settings.schedule == schedule {
            trace!(schedule, "schedule already set");
            return Ok(());
        }
        if settings.away == Some(true) {
            warn!(schedule, "cannot change schedule while away");
            return Err(Error::AwayActive);
        }

        self.write("set_schedule", protocol::PATH_SETTINGS, protocol::schedule_form(schedule))
            .await?;
        if let Some(ref mut settings) = self.cache.settings {
            settings.schedule = schedule;
        }
        self.reconcile("set_schedule").await;
        Ok(())
    }

    pub async fn set_security(&mut self, on: bool) -> Result<()> {
        let mut settings = self.loaded_settings()?;
        self.write("set_security", protocol::PATH_SETTINGS, protocol::security_form(on))
            .await?;
        settings.security = Some(on);
        self.cache.settings = Some(settings);
        Ok(())
    }

    /// Setpoint limits only take effect with security on, so it is enabled
    /// first when needed.
    pub async fn set_setpoint_limits(&mut self, max: Option<f64>, min: Option<f64>) -> Result<()> {
        let settings = self.loaded_settings()?;
        let changed = max.is_some_and(|m| settings.setpoint_max != Some(m))
            || min.is_some_and(|m| settings.setpoint_min != Some(m));
        if !changed {
            trace!(?max, ?min, "setpoint limits unchanged");
            return Ok(());
        }
        if settings.security != Some(true) {
            debug!("enabling security before setting limits");
            self.set_security(true).await?;
        }

        self.write(
            "set_setpoint_limits",
            protocol::PATH_SETTINGS,
            protocol::setpoint_limits_form(max, min),
        )
        .await?;
        if let Some(ref mut settings) = self.cache.settings {
            if max.is_some() {
                settings.setpoint_max = max;
            }
            if min.is_some() {
                settings.setpoint_min = min;
            }
        }
        Ok(())
    }
}
