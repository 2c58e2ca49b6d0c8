//! Byte-0 flag bits of a GIP input report

use bitflags::bitflags;

bitflags! {
    /// Flags carried in the first byte of a GIP input report.
    ///
    /// `GUIDE` occupies a bit the protocol leaves unused; converters set it
    /// when the instrument's guide/home button is pressed so the mapper can
    /// see it without a side channel.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GipFlags: u8 {
        /// Synchronisation bit
        const SYNC  = 0x01;

        /// Guide/home button (repurposed unused bit)
        const GUIDE = 0x02;

        /// Menu (start) button
        const MENU  = 0x04;

        /// View (select) button
        const VIEW  = 0x08;

        /// Face button A
        const A     = 0x10;

        /// Face button B
        const B     = 0x20;

        /// Face button X
        const X     = 0x40;

        /// Face button Y
        const Y     = 0x80;
    }
}

impl GipFlags {
    /// Menu and view held together.
    pub const MENU_VIEW_CHORD: Self = Self::MENU.union(Self::VIEW);
}
