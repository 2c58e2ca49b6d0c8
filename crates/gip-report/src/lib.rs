//! GIP (Gaming Input Protocol) controller report
//!
//! A GIP input frame is a fixed 14-byte report. This crate models that report
//! as an opaque byte buffer and gives meaning only to the flag bits of byte 0,
//! which the mapper uses as an in-band termination channel:
//!
//! - bit `0x02` is unused by the protocol and carries the instrument's
//!   guide/home button
//! - bits `0x04 | 0x08` are menu (start) and view (select); holding both is a
//!   chord that also requests termination
//!
//! The remaining bytes are written by device-specific converters and are never
//! interpreted here.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod flags;
pub mod report;
pub mod sentinel;

pub use flags::GipFlags;
pub use report::GipReport;
pub use sentinel::TerminationRequest;

use thiserror::Error;

/// Size of a GIP input report in bytes.
pub const GIP_REPORT_LEN: usize = 0x0E;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GipReportError {
    #[error("Invalid report size: expected {expected}, got {actual}")]
    InvalidReportSize { expected: usize, actual: usize },
}

pub type GipReportResult<T> = Result<T, GipReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(GIP_REPORT_LEN, 14);
    }

    #[test]
    fn test_error_display() {
        let err = GipReportError::InvalidReportSize {
            expected: GIP_REPORT_LEN,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Invalid report size: expected 14, got 3");
    }
}
