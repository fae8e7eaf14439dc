//! USB port reset through libusb.
//!
//! Some hosts refuse the reset while the printer keeps working, so the
//! result is reported rather than raised and callers are free to ignore it.

use crate::domain::UsbId;

/// What happened when a reset was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Device was found and reset.
    Reset,
    /// No device with that VID:PID is attached (or it cannot be opened).
    NotFound,
    /// The device refused the reset.
    Refused(String),
}

impl ResetOutcome {
    #[must_use]
    pub const fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }
}

/// Best-effort USB device control.
pub trait UsbControl {
    /// Reset the device with this VID:PID.
    fn reset(&self, id: UsbId) -> ResetOutcome;
}

/// libusb-backed implementation.
#[derive(Debug, Default)]
pub struct LibUsb;

impl UsbControl for LibUsb {
    fn reset(&self, id: UsbId) -> ResetOutcome {
        let Some(mut handle) = rusb::open_device_with_vid_pid(id.vendor, id.product) else {
            tracing::debug!(device = %id, "USB device not found for reset");
            return ResetOutcome::NotFound;
        };

        match handle.reset() {
            Ok(()) => {
                tracing::debug!(device = %id, "USB device reset");
                ResetOutcome::Reset
            }
            Err(e) => {
                tracing::debug!(device = %id, error = %e, "USB reset refused");
                ResetOutcome::Refused(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_outcome() {
        assert!(ResetOutcome::Reset.is_reset());
        assert!(!ResetOutcome::NotFound.is_reset());
        assert!(!ResetOutcome::Refused("Access denied".into()).is_reset());
    }
}
