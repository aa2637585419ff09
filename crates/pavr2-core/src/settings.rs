//! Programmer settings and their synchronization with the device
//!
//! Settings live in the programmer's EEPROM as single bytes. [`Settings`]
//! is the decoded record; [`Programmer::read_settings`] and
//! [`Programmer::apply_settings`] move it across the wire one byte at a time.

use std::thread;
use std::time::Instant;

use crate::config::RestoreTiming;
use crate::error::{Error, Result, ValidationError};
use crate::frequency::{self, IspClock};
use crate::programmer::Programmer;
use crate::protocol::*;

/// Decoded programmer settings
///
/// Numeric fields are wider than their wire encoding so that out-of-range
/// values typed by a user survive until [`Settings::validate`] rejects them.
/// Voltages are in millivolts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings {
    pub sck_duration: u32,
    pub isp_fastest_period: u32,
    pub regulator_mode: u8,
    pub vcc_output_enabled: bool,
    pub vcc_output_indicator: VccOutputIndicator,
    pub line_a_function: u8,
    pub line_b_function: u8,
    pub software_version_major: u32,
    pub software_version_minor: u32,
    pub hardware_version: u32,
    pub vcc_vdd_max_range: u32,
    pub vcc_3v3_min: u32,
    pub vcc_3v3_max: u32,
    pub vcc_5v_min: u32,
    pub vcc_5v_max: u32,
}

fn check(ok: bool, error: ValidationError) -> core::result::Result<(), ValidationError> {
    if ok {
        Ok(())
    } else {
        Err(error)
    }
}

impl Settings {
    /// Check the record against the device's rules, reporting the first
    /// violation
    pub fn validate(&self) -> core::result::Result<(), ValidationError> {
        use ValidationError as V;

        check(self.sck_duration <= 0xFF, V::SckDuration)?;
        check(
            (ISP_FASTEST_PERIOD_MIN..=ISP_FASTEST_PERIOD_MAX).contains(&self.isp_fastest_period),
            V::IspFastestPeriod,
        )?;

        let regulator_mode = RegulatorMode::from_raw(self.regulator_mode).ok_or(V::RegulatorMode)?;
        check(
            !(self.vcc_output_enabled && regulator_mode == RegulatorMode::Auto),
            V::VccOutputWithAutoRegulator,
        )?;

        check(self.line_a_function <= LineFunction::MAX, V::LineAFunction)?;
        check(self.line_a_function != LineFunction::Clock as u8, V::LineAClock)?;
        check(self.line_b_function <= LineFunction::MAX, V::LineBFunction)?;

        check(self.software_version_major <= 0xFF, V::SoftwareVersionMajor)?;
        check(self.software_version_minor <= 0xFF, V::SoftwareVersionMinor)?;
        check(self.hardware_version <= 0xFF, V::HardwareVersion)?;

        check(self.vcc_vdd_max_range <= MAX_REPRESENTABLE_VOLTAGE, V::VccVddMaxRange)?;
        check(self.vcc_3v3_min <= MAX_REPRESENTABLE_VOLTAGE, V::Vcc3v3Min)?;
        check(self.vcc_3v3_max <= MAX_REPRESENTABLE_VOLTAGE, V::Vcc3v3Max)?;
        check(self.vcc_5v_min <= MAX_REPRESENTABLE_VOLTAGE, V::Vcc5vMin)?;
        check(self.vcc_5v_max <= MAX_REPRESENTABLE_VOLTAGE, V::Vcc5vMax)?;
        check(self.vcc_3v3_min <= self.vcc_3v3_max, V::Vcc3v3Range)?;
        check(self.vcc_5v_min <= self.vcc_5v_max, V::Vcc5vRange)?;

        Ok(())
    }

    /// Name of the ISP frequency these settings select
    pub fn isp_frequency_name(&self) -> Result<&'static str> {
        frequency::frequency_name_for_raw(self.sck_duration, self.isp_fastest_period)
    }

    /// Name of the max ISP frequency these settings select
    pub fn max_isp_frequency_name(&self) -> Result<&'static str> {
        frequency::max_frequency_name(self.isp_fastest_period)
    }

    /// Select an ISP frequency by name
    ///
    /// STK500 frequencies only change SCK_DURATION. Faster ones clear it and
    /// set ISP_FASTEST_PERIOD instead, which also moves the max frequency.
    pub fn set_isp_frequency(&mut self, name: &str) -> Result<()> {
        match frequency::raw_for_frequency_name(name)? {
            IspClock::Stk500(sck_duration) => self.sck_duration = sck_duration,
            IspClock::FastestPeriod(period) => {
                self.sck_duration = 0;
                self.isp_fastest_period = period;
            }
        }
        Ok(())
    }

    /// Select a max ISP frequency by name
    pub fn set_max_isp_frequency(&mut self, name: &str) -> Result<()> {
        self.isp_fastest_period = frequency::raw_for_max_frequency_name(name)?;
        Ok(())
    }
}

fn byte(value: u32) -> u8 {
    value.min(0xFF) as u8
}

impl Programmer {
    /// Read every setting from the device
    pub fn read_settings(&mut self) -> Result<Settings> {
        Ok(Settings {
            sck_duration: self.get_raw_setting(SETTING_SCK_DURATION)? as u32,
            isp_fastest_period: self.get_raw_setting(SETTING_ISP_FASTEST_PERIOD)? as u32,
            regulator_mode: self.get_raw_setting(SETTING_REGULATOR_MODE)?,
            vcc_output_enabled: self.get_raw_setting(SETTING_VCC_OUTPUT_ENABLED)? != 0,
            vcc_output_indicator: VccOutputIndicator::from_raw(
                self.get_raw_setting(SETTING_VCC_OUTPUT_INDICATOR)?,
            ),
            line_a_function: self.get_raw_setting(SETTING_LINE_A_FUNCTION)?,
            line_b_function: self.get_raw_setting(SETTING_LINE_B_FUNCTION)?,
            software_version_major: self.get_raw_setting(SETTING_SOFTWARE_VERSION_MAJOR)? as u32,
            software_version_minor: self.get_raw_setting(SETTING_SOFTWARE_VERSION_MINOR)? as u32,
            hardware_version: self.get_raw_setting(SETTING_HARDWARE_VERSION)? as u32,
            vcc_vdd_max_range: raw_to_mv(self.get_raw_setting(SETTING_VCC_VDD_MAX_RANGE)?),
            vcc_3v3_min: raw_to_mv(self.get_raw_setting(SETTING_VCC_3V3_MIN)?),
            vcc_3v3_max: raw_to_mv(self.get_raw_setting(SETTING_VCC_3V3_MAX)?),
            vcc_5v_min: raw_to_mv(self.get_raw_setting(SETTING_VCC_5V_MIN)?),
            vcc_5v_max: raw_to_mv(self.get_raw_setting(SETTING_VCC_5V_MAX)?),
        })
    }

    /// Validate and write every setting to the device
    ///
    /// The VCC output is turned off before anything else changes and only
    /// turned on once everything else has been written, so the target never
    /// sees power from a half-applied configuration.
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<()> {
        settings.validate()?;

        if !settings.vcc_output_enabled {
            self.set_raw_setting(SETTING_VCC_OUTPUT_ENABLED, 0)?;
        }

        self.set_raw_setting(SETTING_SCK_DURATION, byte(settings.sck_duration))?;
        self.set_raw_setting(SETTING_ISP_FASTEST_PERIOD, byte(settings.isp_fastest_period))?;
        self.set_raw_setting(SETTING_REGULATOR_MODE, settings.regulator_mode)?;
        self.set_raw_setting(
            SETTING_VCC_OUTPUT_INDICATOR,
            settings.vcc_output_indicator.raw(),
        )?;
        self.set_raw_setting(SETTING_LINE_A_FUNCTION, settings.line_a_function)?;
        self.set_raw_setting(SETTING_LINE_B_FUNCTION, settings.line_b_function)?;
        self.set_raw_setting(
            SETTING_SOFTWARE_VERSION_MAJOR,
            byte(settings.software_version_major),
        )?;
        self.set_raw_setting(
            SETTING_SOFTWARE_VERSION_MINOR,
            byte(settings.software_version_minor),
        )?;
        self.set_raw_setting(SETTING_HARDWARE_VERSION, byte(settings.hardware_version))?;
        self.set_raw_setting(SETTING_VCC_VDD_MAX_RANGE, mv_to_raw(settings.vcc_vdd_max_range))?;
        self.set_raw_setting(SETTING_VCC_3V3_MIN, mv_to_raw(settings.vcc_3v3_min))?;
        self.set_raw_setting(SETTING_VCC_3V3_MAX, mv_to_raw(settings.vcc_3v3_max))?;
        self.set_raw_setting(SETTING_VCC_5V_MIN, mv_to_raw(settings.vcc_5v_min))?;
        self.set_raw_setting(SETTING_VCC_5V_MAX, mv_to_raw(settings.vcc_5v_max))?;

        if settings.vcc_output_enabled {
            self.set_raw_setting(SETTING_VCC_OUTPUT_ENABLED, 1)?;
        }

        log::debug!("Applied settings: {:?}", settings);
        Ok(())
    }

    /// Ask the firmware to reset its settings to factory defaults and wait
    /// for it to finish
    pub fn restore_defaults(&mut self, timing: &RestoreTiming) -> Result<()> {
        self.set_raw_setting(SETTING_NOT_INITIALIZED, 0xFF)?;

        let start = Instant::now();
        loop {
            thread::sleep(timing.poll_interval);

            if self.get_raw_setting(SETTING_NOT_INITIALIZED)? == 0 {
                log::debug!("Settings reinitialized after {:?}", start.elapsed());
                return Ok(());
            }

            if start.elapsed() >= timing.timeout {
                return Err(Error::Timeout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programmer::testing::programmer;
    use std::time::Duration;

    fn valid() -> Settings {
        Settings {
            sck_duration: 6,
            isp_fastest_period: 8,
            regulator_mode: 0,
            vcc_output_enabled: false,
            vcc_output_indicator: VccOutputIndicator::Blinking,
            line_a_function: 0,
            line_b_function: 0,
            software_version_major: 2,
            software_version_minor: 10,
            hardware_version: 15,
            vcc_vdd_max_range: 896,
            vcc_3v3_min: 2688,
            vcc_3v3_max: 4000,
            vcc_5v_min: 4192,
            vcc_5v_max: 5504,
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rules() {
        fn case(
            mutate: fn(&mut Settings),
            error: ValidationError,
        ) -> (fn(&mut Settings), ValidationError) {
            (mutate, error)
        }

        let cases = [
            case(|s| s.sck_duration = 256, ValidationError::SckDuration),
            case(|s| s.isp_fastest_period = 1, ValidationError::IspFastestPeriod),
            case(|s| s.isp_fastest_period = 27, ValidationError::IspFastestPeriod),
            case(|s| s.regulator_mode = 4, ValidationError::RegulatorMode),
            case(|s| s.vcc_output_enabled = true, ValidationError::VccOutputWithAutoRegulator),
            case(|s| s.line_a_function = 7, ValidationError::LineAFunction),
            case(|s| s.line_a_function = 5, ValidationError::LineAClock),
            case(|s| s.line_b_function = 9, ValidationError::LineBFunction),
            case(|s| s.software_version_major = 256, ValidationError::SoftwareVersionMajor),
            case(|s| s.software_version_minor = 300, ValidationError::SoftwareVersionMinor),
            case(|s| s.hardware_version = 1000, ValidationError::HardwareVersion),
            case(|s| s.vcc_vdd_max_range = 8161, ValidationError::VccVddMaxRange),
            case(|s| s.vcc_3v3_min = 4001, ValidationError::Vcc3v3Range),
            case(|s| s.vcc_5v_max = 9000, ValidationError::Vcc5vMax),
            case(|s| s.vcc_5v_min = 6000, ValidationError::Vcc5vRange),
        ];

        for (mutate, expected) in cases {
            let mut s = valid();
            mutate(&mut s);
            assert_eq!(s.validate(), Err(expected));
        }
    }

    #[test]
    fn test_validate_boundaries() {
        let mut s = valid();
        s.sck_duration = 255;
        s.isp_fastest_period = 26;
        s.regulator_mode = 5;
        s.vcc_output_enabled = true;
        s.line_b_function = 5;
        s.vcc_5v_max = 8160;
        s.vcc_3v3_min = s.vcc_3v3_max;
        assert_eq!(s.validate(), Ok(()));
    }

    #[test]
    fn test_validate_reports_first_violation() {
        let mut s = valid();
        s.sck_duration = 300;
        s.line_a_function = 5;
        assert_eq!(s.validate(), Err(ValidationError::SckDuration));
    }

    #[test]
    fn test_frequency_helpers() {
        let mut s = valid();
        assert_eq!(s.isp_frequency_name().unwrap(), "105");
        assert_eq!(s.max_isp_frequency_name().unwrap(), "1500");

        s.set_isp_frequency("57.4").unwrap();
        assert_eq!(s.sck_duration, 11);
        assert_eq!(s.isp_fastest_period, 8);

        s.set_isp_frequency("2000").unwrap();
        assert_eq!(s.sck_duration, 0);
        assert_eq!(s.isp_fastest_period, 6);
        assert_eq!(s.isp_frequency_name().unwrap(), "2000");

        s.set_max_isp_frequency("1500").unwrap();
        assert_eq!(s.isp_fastest_period, 8);
        assert!(s.set_max_isp_frequency("444").is_err());
    }

    #[test]
    fn test_apply_vcc_off_first() {
        let (mut pgm, regs) = programmer();
        pgm.apply_settings(&valid()).unwrap();

        let log = regs.borrow().log.clone();
        assert_eq!(log.len(), 15);
        assert_eq!((log[0].index, log[0].value), (SETTING_VCC_OUTPUT_ENABLED as u16, 0));
        assert!(log.iter().all(|t| t.request_type == 0x40 && t.request == 0x82));
        assert!(log[1..]
            .iter()
            .all(|t| t.index != SETTING_VCC_OUTPUT_ENABLED as u16));
    }

    #[test]
    fn test_apply_vcc_on_last() {
        let (mut pgm, regs) = programmer();
        let mut s = valid();
        s.regulator_mode = 5;
        s.vcc_output_enabled = true;
        pgm.apply_settings(&s).unwrap();

        let log = regs.borrow().log.clone();
        assert_eq!(log.len(), 15);
        let last = log.last().unwrap();
        assert_eq!((last.index, last.value), (SETTING_VCC_OUTPUT_ENABLED as u16, 1));
        assert!(log[..14]
            .iter()
            .all(|t| t.index != SETTING_VCC_OUTPUT_ENABLED as u16));
    }

    #[test]
    fn test_apply_invalid_writes_nothing() {
        let (mut pgm, regs) = programmer();
        let mut s = valid();
        s.line_a_function = 5;
        let err = pgm.apply_settings(&s).unwrap_err();
        assert_eq!(err.to_string(), "Line A cannot be a clock output.");
        assert!(regs.borrow().log.is_empty());
    }

    #[test]
    fn test_apply_then_read_round_trip() {
        let (mut pgm, _regs) = programmer();
        let mut s = valid();
        s.regulator_mode = 3;
        s.vcc_output_enabled = true;
        s.vcc_output_indicator = VccOutputIndicator::Steady;
        s.line_b_function = LineFunction::Clock as u8;
        pgm.apply_settings(&s).unwrap();
        assert_eq!(pgm.read_settings().unwrap(), s);
    }

    #[test]
    fn test_voltages_are_quantized() {
        let (mut pgm, regs) = programmer();
        let mut s = valid();
        s.vcc_3v3_min = 3000;
        pgm.apply_settings(&s).unwrap();
        assert_eq!(regs.borrow().settings[SETTING_VCC_3V3_MIN as usize], 94);
        assert_eq!(pgm.read_settings().unwrap().vcc_3v3_min, 3008);
    }

    #[test]
    fn test_restore_defaults_timeout() {
        let (mut pgm, regs) = programmer();
        let timing = RestoreTiming {
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_millis(20),
        };
        // The fake device keeps whatever was written, so NOT_INITIALIZED stays 0xFF.
        assert_eq!(pgm.restore_defaults(&timing), Err(Error::Timeout));
        let log = regs.borrow().log.clone();
        assert_eq!((log[0].index, log[0].value), (0, 0xFF));
        assert!(log.len() > 2);
    }
}
