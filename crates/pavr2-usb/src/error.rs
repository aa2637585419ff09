//! Error types for the USB transport

use thiserror::Error;

/// Result type for USB operations
pub type Result<T> = std::result::Result<T, UsbError>;

/// Errors from the USB layer
#[derive(Debug, Error)]
pub enum UsbError {
    /// Enumeration failed
    #[error("Failed to list USB devices: {0}")]
    ListFailed(String),
    /// The device from the last enumeration is gone
    #[error("Device not found (it may have been unplugged)")]
    DeviceNotFound,
    /// Failed to open device
    #[error("Failed to open device: {0}")]
    OpenFailed(String),
    /// Failed to claim interface
    #[error("Failed to claim interface: {0}")]
    ClaimFailed(String),
    /// Control transfer failed
    #[error("USB transfer failed: {0}")]
    TransferFailed(String),
}

impl From<UsbError> for pavr2_core::Error {
    fn from(e: UsbError) -> Self {
        pavr2_core::Error::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_transport_error() {
        let e: pavr2_core::Error = UsbError::TransferFailed("stall".to_string()).into();
        assert_eq!(
            e,
            pavr2_core::Error::Transport("USB transfer failed: stall".to_string())
        );
    }
}
