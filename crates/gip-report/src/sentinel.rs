//! In-band termination sentinels
//!
//! The mapper inspects every converted report for one of two bit patterns in
//! byte 0. Detection runs on the converted report so it does not depend on
//! how a particular instrument encodes its buttons.

use crate::GipFlags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a converted report asked the mapper loop to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationRequest {
    /// Guide/home bit (`0x02`) set.
    Guide,
    /// Menu and view (`0x0C`) both set.
    MenuViewChord,
}

impl TerminationRequest {
    /// Inspect a report's flag byte.
    ///
    /// The guide bit wins when both patterns are present.
    pub fn detect(flag_byte: u8) -> Option<Self> {
        let flags = GipFlags::from_bits_retain(flag_byte);
        if flags.contains(GipFlags::GUIDE) {
            Some(Self::Guide)
        } else if flags.contains(GipFlags::MENU_VIEW_CHORD) {
            Some(Self::MenuViewChord)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guide => "guide button",
            Self::MenuViewChord => "menu+view chord",
        }
    }
}

impl fmt::Display for TerminationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
