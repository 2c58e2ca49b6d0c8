//! Property-based tests for GIP sentinel detection.

use gip_report::{GIP_REPORT_LEN, GipFlags, GipReport, TerminationRequest};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(500))]

    /// Detection agrees with the two documented masks for every flag byte.
    #[test]
    fn prop_detect_matches_masks(byte in any::<u8>()) {
        let expected_stop = (byte & 0x02) != 0 || (byte & 0x0C) == 0x0C;
        prop_assert_eq!(TerminationRequest::detect(byte).is_some(), expected_stop);
    }

    /// Only byte 0 of a report participates in detection.
    #[test]
    fn prop_trailing_bytes_never_terminate(
        tail in proptest::collection::vec(any::<u8>(), GIP_REPORT_LEN - 1),
    ) {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&tail);
        let report = GipReport::from_slice(&bytes).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(report.termination_request(), None);
    }

    /// A single chord bit never terminates unless the guide bit is also set.
    #[test]
    fn prop_half_chord_does_not_terminate(
        rest in any::<u8>(),
        use_menu in any::<bool>(),
    ) {
        let half = if use_menu { GipFlags::MENU } else { GipFlags::VIEW };
        let flags = (GipFlags::from_bits_retain(rest) - GipFlags::GUIDE - GipFlags::MENU_VIEW_CHORD) | half;
        prop_assert_eq!(TerminationRequest::detect(flags.bits()), None);
    }

    /// from_slice accepts exactly the report length and nothing else.
    #[test]
    fn prop_from_slice_length(data in proptest::collection::vec(any::<u8>(), 0..=32usize)) {
        let result = GipReport::from_slice(&data);
        prop_assert_eq!(result.is_ok(), data.len() == GIP_REPORT_LEN);
    }
}
