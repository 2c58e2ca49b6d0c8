//! The 14-byte GIP input report buffer

use crate::{GIP_REPORT_LEN, GipFlags, GipReportError, GipReportResult, TerminationRequest};
use serde::{Deserialize, Serialize};

/// One GIP input frame.
///
/// The buffer is allocated once per mapper run and overwritten in place by
/// the converter on every iteration, so nothing here clears it implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GipReport([u8; GIP_REPORT_LEN]);

impl GipReport {
    /// All-zero report.
    pub const fn zeroed() -> Self {
        Self([0; GIP_REPORT_LEN])
    }

    pub const fn from_bytes(bytes: [u8; GIP_REPORT_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy a report out of a slice that must be exactly [`GIP_REPORT_LEN`] long.
    pub fn from_slice(data: &[u8]) -> GipReportResult<Self> {
        let Ok(bytes) = <[u8; GIP_REPORT_LEN]>::try_from(data) else {
            return Err(GipReportError::InvalidReportSize {
                expected: GIP_REPORT_LEN,
                actual: data.len(),
            });
        };
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; GIP_REPORT_LEN] {
        &self.0
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8; GIP_REPORT_LEN] {
        &mut self.0
    }

    pub fn clear(&mut self) {
        self.0 = [0; GIP_REPORT_LEN];
    }

    /// Raw value of byte 0.
    pub fn flag_byte(&self) -> u8 {
        let [flags, ..] = self.0;
        flags
    }

    pub fn flags(&self) -> GipFlags {
        GipFlags::from_bits_retain(self.flag_byte())
    }

    pub fn set_flags(&mut self, flags: GipFlags) {
        let [first, ..] = &mut self.0;
        *first = flags.bits();
    }

    /// Termination sentinel carried by this report, if any.
    pub fn termination_request(&self) -> Option<TerminationRequest> {
        TerminationRequest::detect(self.flag_byte())
    }
}

impl From<[u8; GIP_REPORT_LEN]> for GipReport {
    fn from(bytes: [u8; GIP_REPORT_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for GipReport {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for GipReport {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_report_has_no_flags() {
        let report = GipReport::zeroed();
        assert_eq!(report.as_bytes(), &[0u8; GIP_REPORT_LEN]);
        assert!(report.flags().is_empty());
        assert_eq!(report.termination_request(), None);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let err = GipReport::from_slice(&[0u8; 4]);
        assert_eq!(
            err,
            Err(GipReportError::InvalidReportSize {
                expected: GIP_REPORT_LEN,
                actual: 4
            })
        );
        assert!(GipReport::from_slice(&[0u8; GIP_REPORT_LEN + 1]).is_err());
    }

    #[test]
    fn test_set_flags_only_touches_byte_zero() -> GipReportResult<()> {
        let mut report = GipReport::from_slice(&[0xAA; GIP_REPORT_LEN])?;
        report.set_flags(GipFlags::GUIDE);

        assert_eq!(report.flag_byte(), 0x02);
        assert!(report.as_bytes().iter().skip(1).all(|&b| b == 0xAA));
        Ok(())
    }

    #[test]
    fn test_clear_resets_every_byte() {
        let mut report = GipReport::from_bytes([0xFF; GIP_REPORT_LEN]);
        report.clear();
        assert_eq!(report, GipReport::zeroed());
    }

    #[test]
    fn test_mutation_through_as_mut() {
        let mut report = GipReport::zeroed();
        report.as_mut().copy_from_slice(&[0x0C; GIP_REPORT_LEN]);
        assert_eq!(
            report.termination_request(),
            Some(TerminationRequest::MenuViewChord)
        );
    }
}
