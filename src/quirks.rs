//! Which temperature scale the API reports in, per model and firmware.
//!
//! The display setting (`tempunits`) is usually also the API scale, but not
//! always: early T3xxx firmware reports Celsius no matter what the display
//! shows, and for models we don't recognise the only hint is the magnitude of
//! the setpoint limits. Rules are evaluated in table order; the first match
//! wins.

use crate::types::{FirmwareVersion, TempUnits};

pub const LEGACY_MODEL_PREFIX: &str = "T3";

/// First legacy firmware that reports in the display scale.
pub const LEGACY_FIXED_FIRMWARE: FirmwareVersion = FirmwareVersion::new(5, 28);

pub const KNOWN_MODELS: &[&str] = &[
    "T2000", "T4800", "T4900", "T5800", "T5900", "T6800", "T6900", "T7850", "T7900", "T8850",
    "T8900",
];

/// A maximum heat setpoint at or above this can only be Fahrenheit.
const FAHRENHEIT_MAGNITUDE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSource {
    /// Forced by a known firmware bug.
    FirmwareQuirk,
    /// Trusted display setting on a recognised model.
    DisplaySetting,
    /// Guessed from the maximum heat setpoint.
    Inferred,
    /// Unrecognised model without limits to infer from; display setting used.
    Assumed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitResolution {
    pub units: TempUnits,
    pub source: UnitSource,
}

#[derive(Debug, Clone, Copy)]
pub struct UnitInputs<'a> {
    pub model: &'a str,
    pub firmware: FirmwareVersion,
    pub display_units: TempUnits,
    pub heat_temp_max: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    LegacyFirmware,
    KnownModel,
    Magnitude,
}

const RULES: [Rule; 3] = [Rule::LegacyFirmware, Rule::KnownModel, Rule::Magnitude];

impl Rule {
    fn apply(self, input: &UnitInputs<'_>) -> Option<UnitResolution> {
        match self {
            Rule::LegacyFirmware => (is_legacy(input.model)
                && input.firmware < LEGACY_FIXED_FIRMWARE)
                .then_some(UnitResolution {
                    units: TempUnits::Celsius,
                    source: UnitSource::FirmwareQuirk,
                }),
            Rule::KnownModel => (is_legacy(input.model) || KNOWN_MODELS.contains(&input.model))
                .then_some(UnitResolution {
                    units: input.display_units,
                    source: UnitSource::DisplaySetting,
                }),
            Rule::Magnitude => input.heat_temp_max.map(|max| UnitResolution {
                units: if max >= FAHRENHEIT_MAGNITUDE {
                    TempUnits::Fahrenheit
                } else {
                    TempUnits::Celsius
                },
                source: UnitSource::Inferred,
            }),
        }
    }
}

fn is_legacy(model: &str) -> bool {
    model.starts_with(LEGACY_MODEL_PREFIX)
}

pub fn resolve_api_units(input: &UnitInputs<'_>) -> UnitResolution {
    RULES
        .iter()
        .find_map(|rule| rule.apply(input))
        .unwrap_or(UnitResolution {
            units: input.display_units,
            source: UnitSource::Assumed,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(model: &str, fw: (u32, u32), display: TempUnits, max: Option<f64>) -> UnitInputs<'_> {
        UnitInputs {
            model,
            firmware: FirmwareVersion::new(fw.0, fw.1),
            display_units: display,
            heat_temp_max: max,
        }
    }

    #[test]
    fn legacy_model_on_buggy_firmware_is_always_celsius() {
        let r = resolve_api_units(&inputs("T3000", (5, 20), TempUnits::Fahrenheit, Some(90.0)));
        assert_eq!(r.units, TempUnits::Celsius);
        assert_eq!(r.source, UnitSource::FirmwareQuirk);
    }

    #[test]
    fn legacy_model_on_fixed_firmware_follows_display() {
        let r = resolve_api_units(&inputs("T3900", (5, 28), TempUnits::Fahrenheit, None));
        assert_eq!(r.units, TempUnits::Fahrenheit);
        assert_eq!(r.source, UnitSource::DisplaySetting);

        let r = resolve_api_units(&inputs("T3900", (6, 0), TempUnits::Celsius, None));
        assert_eq!(r.units, TempUnits::Celsius);
    }

    #[test]
    fn minor_version_compares_as_integer() {
        // 5.3 is older than 5.28 even though "5.3" > "5.28" as text.
        let r = resolve_api_units(&inputs("T3000", (5, 3), TempUnits::Fahrenheit, None));
        assert_eq!(r.source, UnitSource::FirmwareQuirk);
        let r = resolve_api_units(&inputs("T3000", (5, 100), TempUnits::Fahrenheit, None));
        assert_eq!(r.source, UnitSource::DisplaySetting);
    }

    #[test]
    fn known_model_follows_display_regardless_of_firmware() {
        let r = resolve_api_units(&inputs("T7900", (1, 0), TempUnits::Fahrenheit, Some(20.0)));
        assert_eq!(r.units, TempUnits::Fahrenheit);
        assert_eq!(r.source, UnitSource::DisplaySetting);
    }

    #[test]
    fn unknown_model_infers_from_heat_max() {
        let r = resolve_api_units(&inputs("UNKNOWNXYZ", (0, 0), TempUnits::Celsius, Some(45.0)));
        assert_eq!(r.units, TempUnits::Fahrenheit);
        assert_eq!(r.source, UnitSource::Inferred);

        let r = resolve_api_units(&inputs("UNKNOWNXYZ", (0, 0), TempUnits::Fahrenheit, Some(32.0)));
        assert_eq!(r.units, TempUnits::Celsius);
        assert_eq!(r.source, UnitSource::Inferred);

        let r = resolve_api_units(&inputs("UNKNOWNXYZ", (0, 0), TempUnits::Celsius, Some(40.0)));
        assert_eq!(r.units, TempUnits::Fahrenheit);
    }

    #[test]
    fn unknown_model_without_limits_assumes_display() {
        let r = resolve_api_units(&inputs("COLORTOUCH", (0, 0), TempUnits::Celsius, None));
        assert_eq!(r.units, TempUnits::Celsius);
        assert_eq!(r.source, UnitSource::Assumed);
    }

    #[test]
    fn firmware_order_matches_tuple_order() {
        let versions = [(0, 0), (1, 9), (1, 10), (5, 3), (5, 27), (5, 28), (6, 0)];
        for a in versions {
            for b in versions {
                let va = FirmwareVersion::new(a.0, a.1);
                let vb = FirmwareVersion::new(b.0, b.1);
                assert_eq!(va.cmp(&vb), a.cmp(&b), "{va} vs {vb}");
            }
        }
    }

    #[test]
    fn firmware_parse() {
        assert_eq!(FirmwareVersion::parse("5.28"), Some(FirmwareVersion::new(5, 28)));
        assert_eq!(FirmwareVersion::parse("6"), Some(FirmwareVersion::new(6, 0)));
        assert_eq!(FirmwareVersion::parse("6.10.2"), Some(FirmwareVersion::new(6, 10)));
        assert_eq!(FirmwareVersion::parse("beta"), None);
    }
}
