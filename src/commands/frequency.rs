//! Frequency table commands (no device needed)

use pavr2_core::frequency::{
    allowed_isp_table, allowed_max_table, suggested_isp_table, suggested_max_table,
    FrequencyValidator, InputState,
};

use super::CmdResult;

pub fn cmd_frequencies(max: bool, all: bool) -> CmdResult {
    let (table, validator) = match (max, all) {
        (false, false) => (suggested_isp_table(), FrequencyValidator::isp()),
        (false, true) => (allowed_isp_table(), FrequencyValidator::isp()),
        (true, false) => (suggested_max_table(), FrequencyValidator::max_isp()),
        (true, true) => (allowed_max_table(), FrequencyValidator::max_isp()),
    };
    let default = validator.default_entry();

    for entry in table {
        let marker = if entry.period == default.period && entry.name == default.name {
            " (default)"
        } else {
            ""
        };
        println!("{:>12}{}", entry.display(), marker);
    }
    Ok(())
}

pub fn cmd_frequency(text: &str, max: bool) -> CmdResult {
    let validator = if max {
        FrequencyValidator::max_isp()
    } else {
        FrequencyValidator::isp()
    };

    match validator.classify(text) {
        InputState::Acceptable => println!("{}", text),
        InputState::Intermediate => println!("{}", validator.normalize(text)),
        InputState::Invalid => return Err(format!("'{}' is not a frequency", text).into()),
    }
    Ok(())
}
