//! Error types for pavr2-core
//!
//! Every hardware-facing call returns one of these. The session manager is
//! the only place that turns them into user-facing messages.

use thiserror::Error;

use crate::protocol::FIRMWARE_VERSION_MAJOR_MAX;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Enumeration, open or transfer failure in the USB layer
    #[error("{0}")]
    Transport(String),

    /// The device returned the wrong number of bytes
    #[error("{context}  Expected {expected} byte{}, got {actual}.", plural(.expected))]
    Protocol {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A settings record broke one of the validation rules
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Restoring the default settings did not finish in time
    #[error("A timeout occurred while resetting to default settings.")]
    Timeout,

    /// A frequency name is not in any of the relevant tables
    #[error("Invalid {kind} name: '{name}'.")]
    NotFound { kind: &'static str, name: String },

    /// The device runs firmware newer than this software understands
    #[error(
        "The device has new firmware (major version {major}, supported up to {}) that is not \
         supported by this software.  Try using the latest version of this software.",
        FIRMWARE_VERSION_MAJOR_MAX
    )]
    UnsupportedFirmware { major: u8 },
}

impl Error {
    /// Wrap a lower-level message with the name of the failed step
    pub fn transport(context: &str, message: impl core::fmt::Display) -> Self {
        Error::Transport(format!("{}  {}", context, message))
    }
}

fn plural(n: &usize) -> &'static str {
    if *n == 1 {
        ""
    } else {
        "s"
    }
}

/// The first settings rule a record violates, in checking order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The SCK duration should be at most 255.")]
    SckDuration,
    #[error("The ISP fastest period is not valid.")]
    IspFastestPeriod,
    #[error("Invalid regulator mode.")]
    RegulatorMode,
    #[error("VCC cannot be an output if the regulator mode is auto.")]
    VccOutputWithAutoRegulator,
    #[error("Invalid line A function.")]
    LineAFunction,
    #[error("Line A cannot be a clock output.")]
    LineAClock,
    #[error("Invalid line B function.")]
    LineBFunction,
    #[error("Invalid software major version.")]
    SoftwareVersionMajor,
    #[error("Invalid software minor version.")]
    SoftwareVersionMinor,
    #[error("Invalid hardware version.")]
    HardwareVersion,
    #[error("The VCC/VDD maximum range cannot be larger than 8160 mV.")]
    VccVddMaxRange,
    #[error("The VCC 3.3 V minimum cannot be larger than 8160 mV.")]
    Vcc3v3Min,
    #[error("The VCC 3.3 V maximum cannot be larger than 8160 mV.")]
    Vcc3v3Max,
    #[error("The VCC 5 V minimum cannot be larger than 8160 mV.")]
    Vcc5vMin,
    #[error("The VCC 5 V maximum cannot be larger than 8160 mV.")]
    Vcc5vMax,
    #[error("The VCC 3.3 V minimum cannot be greater than the maximum.")]
    Vcc3v3Range,
    #[error("The VCC 5 V minimum cannot be greater than the maximum.")]
    Vcc5vRange,
}

/// Result type alias for pavr2 operations
pub type Result<T> = core::result::Result<T, Error>;
