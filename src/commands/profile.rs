//! TOML settings profiles
//!
//! A profile stores settings by the same keys `pavr2 apply` accepts, so a
//! profile can be partial and gets layered over the device's settings.

use std::path::Path;

use pavr2_core::protocol::line_function_name;
use pavr2_core::protocol::RegulatorMode;
use pavr2_core::Settings;
use serde::{Deserialize, Serialize};

/// Settings as stored in a profile file
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SettingsProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp_frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regulator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcc_output: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcc_indicator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_b: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_major: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_minor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcc_vdd_max_range: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcc_3v3_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcc_3v3_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcc_5v_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcc_5v_max: Option<u32>,
}

impl SettingsProfile {
    /// Capture a complete settings record
    pub fn from_settings(settings: &Settings) -> Self {
        let regulator = RegulatorMode::from_raw(settings.regulator_mode)
            .map(|mode| mode.to_string())
            .unwrap_or_else(|| settings.regulator_mode.to_string());

        Self {
            max_frequency: settings.max_isp_frequency_name().ok().map(str::to_string),
            isp_frequency: settings.isp_frequency_name().ok().map(str::to_string),
            regulator: Some(regulator),
            vcc_output: Some(settings.vcc_output_enabled),
            vcc_indicator: Some(settings.vcc_output_indicator.to_string()),
            line_a: Some(line_function_name(settings.line_a_function).to_string()),
            line_b: Some(line_function_name(settings.line_b_function).to_string()),
            sw_major: Some(settings.software_version_major),
            sw_minor: Some(settings.software_version_minor),
            hw_version: Some(settings.hardware_version),
            vcc_vdd_max_range: Some(settings.vcc_vdd_max_range),
            vcc_3v3_min: Some(settings.vcc_3v3_min),
            vcc_3v3_max: Some(settings.vcc_3v3_max),
            vcc_5v_min: Some(settings.vcc_5v_min),
            vcc_5v_max: Some(settings.vcc_5v_max),
        }
    }

    /// Convert to `key=value` pairs in the order they must be applied
    ///
    /// The max frequency comes first because a fast ISP frequency also
    /// moves it.
    pub fn to_options(&self) -> Vec<(String, String)> {
        let mut options = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                options.push((key.to_string(), value));
            }
        };
        let num = |v: Option<u32>| v.map(|v| v.to_string());

        push("max-frequency", self.max_frequency.clone());
        push("isp-frequency", self.isp_frequency.clone());
        push("regulator", self.regulator.clone());
        push("vcc-output", self.vcc_output.map(|v| v.to_string()));
        push("vcc-indicator", self.vcc_indicator.clone());
        push("line-a", self.line_a.clone());
        push("line-b", self.line_b.clone());
        push("sw-major", num(self.sw_major));
        push("sw-minor", num(self.sw_minor));
        push("hw-version", num(self.hw_version));
        push("vcc-vdd-max-range", num(self.vcc_vdd_max_range));
        push("vcc-3v3-min", num(self.vcc_3v3_min));
        push("vcc-3v3-max", num(self.vcc_3v3_max));
        push("vcc-5v-min", num(self.vcc_5v_min));
        push("vcc-5v-max", num(self.vcc_5v_max));
        options
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let profile = toml::from_str(&text)
            .map_err(|e| format!("Invalid profile {}: {}", path.display(), e))?;
        Ok(profile)
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let text = toml::to_string(self)?;
        std::fs::write(path, text)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::settings::apply_options;

    fn factory() -> Settings {
        Settings {
            sck_duration: 6,
            isp_fastest_period: 8,
            line_b_function: 2,
            vcc_vdd_max_range: 320,
            vcc_3v3_min: 2720,
            vcc_3v3_max: 3968,
            vcc_5v_min: 4000,
            vcc_5v_max: 5504,
            ..Default::default()
        }
    }

    #[test]
    fn test_profile_reproduces_settings() {
        let original = factory();
        let profile = SettingsProfile::from_settings(&original);
        let text = toml::to_string(&profile).unwrap();
        assert!(text.contains("isp-frequency = \"105\""));
        assert!(text.contains("line-b = \"RTS\""));

        let parsed: SettingsProfile = toml::from_str(&text).unwrap();
        let options = parsed.to_options();
        let pairs: Vec<(&str, &str)> = options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut rebuilt = Settings::default();
        apply_options(&mut rebuilt, &pairs).unwrap();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_partial_profile() {
        let profile: SettingsProfile = toml::from_str("vcc-output = true\n").unwrap();
        assert_eq!(
            profile.to_options(),
            vec![("vcc-output".to_string(), "true".to_string())]
        );
        assert!(toml::from_str::<SettingsProfile>("bogus = 1\n").is_err());
    }
}
