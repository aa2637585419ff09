//! ISP frequency tables and conversions
//!
//! The programmer stores its ISP clock as one of two raw values:
//!
//! - `SCK_DURATION` (1..=255): an STK500-compatible clock period selector
//! - `ISP_FASTEST_PERIOD`: used when `SCK_DURATION` is 0, a period in units
//!   of 1/12 µs, so the frequency in kHz is `12000 / period`
//!
//! Every table here is ordered by ascending period (descending frequency).
//! The normalization algorithm relies on that ordering.

use once_cell::sync::Lazy;

use crate::error::{Error, Result, ValidationError};
use crate::protocol::{ISP_FASTEST_PERIOD_MAX, ISP_FASTEST_PERIOD_MIN};

/// Period units per kHz: one period unit is 1/12 µs
pub const PERIOD_UNITS_KHZ: f64 = 12000.0;

/// Slack applied when comparing a computed period against table periods
const PERIOD_TOLERANCE: f64 = 0.00001;

/// Display unit appended to every frequency name in user-facing text
pub const UNIT_SUFFIX: &str = " kHz";

/// A selectable frequency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyEntry {
    /// Frequency in kHz without the unit (e.g. "57.4")
    pub name: String,
    /// Period in units of 1/12 µs
    pub period: u32,
}

impl FrequencyEntry {
    fn from_period(period: u32) -> Self {
        Self {
            name: frequency_name(period),
            period,
        }
    }

    /// Name with the unit suffix, as shown to the user
    pub fn display(&self) -> String {
        format!("{}{}", self.name, UNIT_SUFFIX)
    }
}

/// Format the frequency for a period: whole kHz from 100 kHz up,
/// otherwise three significant figures.
fn frequency_name(period: u32) -> String {
    let khz = PERIOD_UNITS_KHZ / period.max(1) as f64;
    if khz >= 100.0 {
        format!("{:.0}", khz)
    } else if khz >= 10.0 {
        format!("{:.1}", khz)
    } else {
        format!("{:.2}", khz)
    }
}

/// Period produced by an STK500 SCK duration selector
///
/// Index 0 never selects this table (it defers to ISP_FASTEST_PERIOD), so
/// its entry is a placeholder carrying the fastest possible period.
fn stk500_period(sck_duration: u32) -> u32 {
    match sck_duration {
        0 => ISP_FASTEST_PERIOD_MIN,
        1 => 27,
        d => 19 * d,
    }
}

static STK500_TABLE: Lazy<Vec<FrequencyEntry>> = Lazy::new(|| {
    (0..=255u32)
        .map(|d| FrequencyEntry::from_period(stk500_period(d)))
        .collect()
});

static FULL_MAX_TABLE: Lazy<Vec<FrequencyEntry>> = Lazy::new(|| {
    (0..=255u32)
        .map(|p| FrequencyEntry {
            // Periods below the minimum behave like the minimum.
            name: frequency_name(p.max(ISP_FASTEST_PERIOD_MIN)),
            period: p,
        })
        .collect()
});

static ALLOWED_MAX_TABLE: Lazy<Vec<FrequencyEntry>> = Lazy::new(|| {
    (ISP_FASTEST_PERIOD_MIN..=ISP_FASTEST_PERIOD_MAX)
        .map(|p| FULL_MAX_TABLE[p as usize].clone())
        .collect()
});

static ALLOWED_ISP_TABLE: Lazy<Vec<FrequencyEntry>> = Lazy::new(|| {
    ALLOWED_MAX_TABLE
        .iter()
        .chain(STK500_TABLE[1..].iter())
        .cloned()
        .collect()
});

// Periods offered in the shortlists
const SUGGESTED_ISP_PERIODS: &[u32] = &[6, 8, 12, 27, 57, 114, 209, 418, 836, 1672];
const SUGGESTED_MAX_PERIODS: &[u32] = &[2, 3, 4, 6, 8, 12, 16, 24];

static SUGGESTED_ISP_TABLE: Lazy<Vec<FrequencyEntry>> = Lazy::new(|| {
    ALLOWED_ISP_TABLE
        .iter()
        .filter(|f| SUGGESTED_ISP_PERIODS.contains(&f.period))
        .cloned()
        .collect()
});

static SUGGESTED_MAX_TABLE: Lazy<Vec<FrequencyEntry>> = Lazy::new(|| {
    ALLOWED_MAX_TABLE
        .iter()
        .filter(|f| SUGGESTED_MAX_PERIODS.contains(&f.period))
        .cloned()
        .collect()
});

/// STK500 SCK duration used by default (period 114, "105" kHz)
pub const DEFAULT_SCK_DURATION: u32 = 6;

/// ISP_FASTEST_PERIOD used by default ("1500" kHz)
pub const DEFAULT_ISP_FASTEST_PERIOD: u32 = 8;

/// All 256 STK500 selector entries, indexed by SCK duration
pub fn stk500_table() -> &'static [FrequencyEntry] {
    &STK500_TABLE
}

/// All 256 max-frequency entries, indexed by ISP_FASTEST_PERIOD
pub fn full_max_table() -> &'static [FrequencyEntry] {
    &FULL_MAX_TABLE
}

/// Max ISP frequencies a user may select
pub fn allowed_max_table() -> &'static [FrequencyEntry] {
    &ALLOWED_MAX_TABLE
}

/// ISP frequencies a user may select
pub fn allowed_isp_table() -> &'static [FrequencyEntry] {
    &ALLOWED_ISP_TABLE
}

/// Shortlist of ISP frequencies for menus
pub fn suggested_isp_table() -> &'static [FrequencyEntry] {
    &SUGGESTED_ISP_TABLE
}

/// Shortlist of max ISP frequencies for menus
pub fn suggested_max_table() -> &'static [FrequencyEntry] {
    &SUGGESTED_MAX_TABLE
}

/// Raw settings needed to produce a named ISP frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IspClock {
    /// SCK_DURATION set to this STK500 selector (never 0)
    Stk500(u32),
    /// SCK_DURATION set to 0 and ISP_FASTEST_PERIOD to this period
    FastestPeriod(u32),
}

fn find_by_name(table: &[FrequencyEntry], name: &str) -> Option<usize> {
    table.iter().position(|f| f.name == name)
}

/// Name of the max ISP frequency for an ISP_FASTEST_PERIOD value
pub fn max_frequency_name(isp_fastest_period: u32) -> Result<&'static str> {
    full_max_table()
        .get(isp_fastest_period as usize)
        .map(|f| f.name.as_str())
        .ok_or(Error::Validation(ValidationError::IspFastestPeriod))
}

/// Name of the ISP frequency produced by a pair of raw settings
pub fn frequency_name_for_raw(sck_duration: u32, isp_fastest_period: u32) -> Result<&'static str> {
    if sck_duration == 0 {
        // The frequency is governed by ISP_FASTEST_PERIOD.
        return max_frequency_name(isp_fastest_period);
    }
    stk500_table()
        .get(sck_duration as usize)
        .map(|f| f.name.as_str())
        .ok_or(Error::Validation(ValidationError::SckDuration))
}

/// Raw settings for a named ISP frequency
pub fn raw_for_frequency_name(name: &str) -> Result<IspClock> {
    // A hit at index 0 is the placeholder and does not count.
    if let Some(index) = find_by_name(stk500_table(), name).filter(|&i| i > 0) {
        return Ok(IspClock::Stk500(index as u32));
    }

    if let Some(index) = find_by_name(allowed_max_table(), name) {
        return Ok(IspClock::FastestPeriod(allowed_max_table()[index].period));
    }

    Err(Error::NotFound {
        kind: "frequency",
        name: name.to_string(),
    })
}

/// ISP_FASTEST_PERIOD for a named max ISP frequency
pub fn raw_for_max_frequency_name(name: &str) -> Result<u32> {
    find_by_name(allowed_max_table(), name)
        .map(|i| allowed_max_table()[i].period)
        .ok_or_else(|| Error::NotFound {
            kind: "maximum frequency",
            name: name.to_string(),
        })
}

/// Result of checking partially typed input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    /// Exactly one of the allowed entries, unit included
    Acceptable,
    /// Could become valid after normalization
    Intermediate,
    /// Contains characters that can never be part of a frequency
    Invalid,
}

/// Classifies and normalizes free-form frequency input against one table
#[derive(Debug, Clone, Copy)]
pub struct FrequencyValidator {
    allowed: &'static [FrequencyEntry],
    default: &'static FrequencyEntry,
}

impl FrequencyValidator {
    /// `allowed` must be ordered by ascending period and non-empty
    pub fn new(allowed: &'static [FrequencyEntry], default: &'static FrequencyEntry) -> Self {
        debug_assert!(!allowed.is_empty());
        debug_assert!(allowed.windows(2).all(|w| w[0].period <= w[1].period));
        Self { allowed, default }
    }

    /// Validator for the "ISP frequency" field
    pub fn isp() -> Self {
        Self::new(
            allowed_isp_table(),
            &stk500_table()[DEFAULT_SCK_DURATION as usize],
        )
    }

    /// Validator for the "Max ISP frequency" field
    pub fn max_isp() -> Self {
        Self::new(
            allowed_max_table(),
            &full_max_table()[DEFAULT_ISP_FASTEST_PERIOD as usize],
        )
    }

    pub fn default_entry(&self) -> &'static FrequencyEntry {
        self.default
    }

    /// Check input while it is being typed
    pub fn classify(&self, text: &str) -> InputState {
        if self.allowed.iter().any(|f| f.display() == text) {
            return InputState::Acceptable;
        }

        let allowed_char = |c: char| {
            c.is_ascii_digit() || matches!(c, '.' | ' ' | 'k' | 'K' | 'm' | 'M' | 'h' | 'H' | 'z')
        };
        if !text.chars().all(allowed_char) {
            return InputState::Invalid;
        }

        InputState::Intermediate
    }

    /// Snap committed input to the display string of an allowed entry
    pub fn normalize(&self, text: &str) -> String {
        let Some((mut value, end)) = parse_leading_number(text) else {
            return self.default.display();
        };

        let value_str = &text[..end];
        let mhz = is_mhz_suffix(&text[end..]);
        if mhz {
            value *= 1000.0;
        } else {
            // Prefer an exact name match so "57.4" stays 57.4 kHz instead of
            // landing on the next computed step.
            if let Some(f) = self.allowed.iter().find(|f| f.name == value_str) {
                return f.display();
            }
        }

        let period = PERIOD_UNITS_KHZ / value;
        self.allowed
            .iter()
            .find(|f| f.period as f64 >= period - PERIOD_TOLERANCE)
            .unwrap_or_else(|| self.slowest())
            .display()
    }

    fn slowest(&self) -> &'static FrequencyEntry {
        // Non-empty by construction
        &self.allowed[self.allowed.len() - 1]
    }
}

/// Whether a typed suffix means MHz (anything else means kHz)
fn is_mhz_suffix(suffix: &str) -> bool {
    let suffix: String = suffix
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    matches!(suffix.as_str(), "mhz" | "mh" | "m" | "mz")
}

/// Parse a decimal number at the start of `s`, allowing leading whitespace,
/// a sign, a fraction and an exponent. Returns the value and the byte offset
/// just past the number.
fn parse_leading_number(s: &str) -> Option<(f64, usize)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    // An exponent only counts if at least one digit follows it.
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    let value: f64 = s[..i].trim_start().parse().ok()?;
    value.is_finite().then_some((value, i))
}
