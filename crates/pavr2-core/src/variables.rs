//! Programmer status variables

use crate::error::Result;
use crate::programmer::Programmer;
use crate::protocol::*;

/// Minimum-extremum value meaning "never measured"
const MEASURED_MIN_UNSET: u32 = raw_to_mv(0xFF);
/// Maximum-extremum value meaning "never measured"
const MEASURED_MAX_UNSET: u32 = 0;

/// Snapshot of the programmer's status. Voltages are in millivolts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Variables {
    pub last_device_reset: u8,
    pub programming_error: u8,
    pub target_vcc_measured_min: u32,
    pub target_vcc_measured_max: u32,
    pub programmer_vdd_measured_min: u32,
    pub programmer_vdd_measured_max: u32,
    pub target_vcc: u32,
    pub programmer_vdd: u32,
    pub regulator_level: u8,
    pub in_programming_mode: bool,
    /// False until a programming cycle has finished since the last reset
    pub has_results_from_last_programming: bool,
}

impl Variables {
    /// Whether the error code or measured extrema show a completed
    /// programming cycle. Extrema still at their reset values mean no
    /// measurement was ever taken.
    pub fn compute_has_results(&self) -> bool {
        self.programming_error != 0
            || self.target_vcc_measured_min != MEASURED_MIN_UNSET
            || self.target_vcc_measured_max != MEASURED_MAX_UNSET
            || self.programmer_vdd_measured_min != MEASURED_MIN_UNSET
            || self.programmer_vdd_measured_max != MEASURED_MAX_UNSET
    }

    pub fn last_device_reset_name(&self) -> String {
        device_reset_name(self.last_device_reset)
    }

    pub fn programming_error_name(&self) -> String {
        programming_error_short(self.programming_error)
    }

    pub fn regulator_level_name(&self) -> String {
        regulator_level_name(self.regulator_level)
    }
}

impl Programmer {
    /// Read every status variable from the device
    pub fn read_variables(&mut self) -> Result<Variables> {
        let mut vars = Variables {
            last_device_reset: self.get_raw_variable(VARIABLE_LAST_DEVICE_RESET)?,
            programming_error: self.get_raw_variable(VARIABLE_PROGRAMMING_ERROR)?,
            target_vcc_measured_min: raw_to_mv(
                self.get_raw_variable(VARIABLE_TARGET_VCC_MEASURED_MIN)?,
            ),
            target_vcc_measured_max: raw_to_mv(
                self.get_raw_variable(VARIABLE_TARGET_VCC_MEASURED_MAX)?,
            ),
            programmer_vdd_measured_min: raw_to_mv(
                self.get_raw_variable(VARIABLE_PROGRAMMER_VDD_MEASURED_MIN)?,
            ),
            programmer_vdd_measured_max: raw_to_mv(
                self.get_raw_variable(VARIABLE_PROGRAMMER_VDD_MEASURED_MAX)?,
            ),
            target_vcc: raw_to_mv(self.get_raw_variable(VARIABLE_TARGET_VCC)?),
            programmer_vdd: raw_to_mv(self.get_raw_variable(VARIABLE_PROGRAMMER_VDD)?),
            regulator_level: self.get_raw_variable(VARIABLE_REGULATOR_LEVEL)?,
            in_programming_mode: self.get_raw_variable(VARIABLE_IN_PROGRAMMING_MODE)? != 0,
            has_results_from_last_programming: false,
        };
        vars.has_results_from_last_programming = vars.compute_has_results();
        Ok(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programmer::testing::programmer;

    fn unset_registers() -> [u8; VARIABLE_COUNT] {
        let mut v = [0u8; VARIABLE_COUNT];
        v[VARIABLE_TARGET_VCC_MEASURED_MIN as usize] = 0xFF;
        v[VARIABLE_PROGRAMMER_VDD_MEASURED_MIN as usize] = 0xFF;
        v[VARIABLE_TARGET_VCC as usize] = 156;
        v[VARIABLE_PROGRAMMER_VDD as usize] = 157;
        v[VARIABLE_REGULATOR_LEVEL as usize] = 5;
        v
    }

    #[test]
    fn test_read_order_and_decoding() {
        let (mut pgm, regs) = programmer();
        regs.borrow_mut().variables = unset_registers();
        let vars = pgm.read_variables().unwrap();

        assert_eq!(vars.target_vcc, 4992);
        assert_eq!(vars.programmer_vdd, 5024);
        assert_eq!(vars.target_vcc_measured_min, 8160);
        assert_eq!(vars.regulator_level_name(), "5 V");
        assert!(!vars.in_programming_mode);

        let indices: Vec<u16> = regs.borrow().log.iter().map(|t| t.index).collect();
        assert_eq!(indices, (1..=10).collect::<Vec<u16>>());
        assert!(regs.borrow().log.iter().all(|t| t.request == 0x83));
    }

    #[test]
    fn test_no_results_when_all_sentinels() {
        let (mut pgm, regs) = programmer();
        regs.borrow_mut().variables = unset_registers();
        assert!(!pgm.read_variables().unwrap().has_results_from_last_programming);
    }

    #[test]
    fn test_any_measurement_means_results() {
        let cases = [
            (VARIABLE_PROGRAMMING_ERROR, 2),
            (VARIABLE_TARGET_VCC_MEASURED_MIN, 0xFE),
            (VARIABLE_TARGET_VCC_MEASURED_MAX, 1),
            (VARIABLE_PROGRAMMER_VDD_MEASURED_MIN, 150),
            (VARIABLE_PROGRAMMER_VDD_MEASURED_MAX, 160),
        ];

        for (id, raw) in cases {
            let (mut pgm, regs) = programmer();
            let mut v = unset_registers();
            v[id as usize] = raw;
            regs.borrow_mut().variables = v;
            assert!(
                pgm.read_variables().unwrap().has_results_from_last_programming,
                "variable {} = {}",
                id,
                raw
            );
        }
    }

    #[test]
    fn test_read_failure_propagates() {
        let (mut pgm, regs) = programmer();
        regs.borrow_mut().short_reads = true;
        assert!(pgm.read_variables().is_err());
    }
}
